pub mod nominatim;
pub mod overpass;

pub use nominatim::{GeocodeError, GeocodeResult, NominatimClient};
pub use overpass::{
    Center, ElementKind, EndpointFailure, OverpassClient, OverpassResponse, RawElement,
    SearchOutcome, SearchStatus,
};

use serde::Deserialize;
use thiserror::Error;

use crate::api::GeocodeResult;

/// Meters per degree of latitude (constant everywhere on the sphere)
pub const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// Equatorial circumference of the Earth in meters
pub const EARTH_CIRCUMFERENCE_M: f64 = 40_075_000.0;

/// Default search radius around a geocoded point.
///
/// Geocoder bounding boxes for streets and districts are often several
/// kilometers wide, which makes Overpass time out. A few hundred meters keeps
/// the query cheap while still covering a city block.
pub const DEFAULT_RADIUS_M: f64 = 350.0;

#[derive(Debug, Error, PartialEq)]
pub enum AreaError {
    #[error("malformed bounding box: expected 4 coordinates, got {0}")]
    MissingCoordinates(usize),

    #[error("malformed bounding box: {value:?} is not a number")]
    InvalidCoordinate { value: String },
}

/// Rectangular query area in WGS84 degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryArea {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl QueryArea {
    /// Parse a Nominatim `boundingbox` array verbatim.
    ///
    /// Nominatim orders the values as `[lat_min, lat_max, lon_min, lon_max]`.
    /// Extra trailing values are ignored.
    pub fn from_bounding_box<S: AsRef<str>>(bbox: &[S]) -> Result<Self, AreaError> {
        if bbox.len() < 4 {
            return Err(AreaError::MissingCoordinates(bbox.len()));
        }

        let parse = |raw: &S| -> Result<f64, AreaError> {
            let raw = raw.as_ref();
            raw.trim()
                .parse::<f64>()
                .map_err(|_| AreaError::InvalidCoordinate {
                    value: raw.to_string(),
                })
        };

        Ok(Self {
            south: parse(&bbox[0])?,
            north: parse(&bbox[1])?,
            west: parse(&bbox[2])?,
            east: parse(&bbox[3])?,
        })
    }

    /// Square area of `radius_m` meters in each direction around `center`.
    ///
    /// # Arguments
    /// * `center` - (lat, lon) in WGS84
    /// * `radius_m` - Half-width of the square in meters
    ///
    /// Longitude degrees shrink with cos(lat), so the longitude delta grows
    /// toward the poles to cover the same ground distance.
    pub fn from_radius(center: (f64, f64), radius_m: f64) -> Self {
        let (lat, lon) = center;

        let lat_delta = radius_m / METERS_PER_DEGREE_LAT;
        let lon_delta = radius_m / (EARTH_CIRCUMFERENCE_M * lat.to_radians().cos() / 360.0);

        Self {
            south: lat - lat_delta,
            west: lon - lon_delta,
            north: lat + lat_delta,
            east: lon + lon_delta,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.south < self.north && self.west < self.east)
    }

    /// Overpass bbox filter body: `south,west,north,east`
    pub fn to_overpass_bbox(&self) -> String {
        format!("{},{},{},{}", self.south, self.west, self.north, self.east)
    }
}

/// How the query area is derived from a geocoding result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AreaStrategy {
    /// Fixed-radius square around the geocoded point
    #[default]
    Radius,
    /// The geocoder's own bounding box, unchanged
    #[serde(alias = "bounding_box")]
    #[value(alias = "bounding-box")]
    Bbox,
}

impl AreaStrategy {
    pub fn derive(self, geocoded: &GeocodeResult, radius_m: f64) -> Result<QueryArea, AreaError> {
        match self {
            AreaStrategy::Radius => Ok(QueryArea::from_radius(geocoded.reference_point, radius_m)),
            AreaStrategy::Bbox => QueryArea::from_bounding_box(&geocoded.raw_bounding_box),
        }
    }
}

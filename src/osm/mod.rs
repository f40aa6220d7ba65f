pub mod normalize;

pub use normalize::{format_timestamp, normalize, normalize_all};

pub mod area;

pub use area::{AreaError, AreaStrategy, DEFAULT_RADIUS_M, QueryArea};

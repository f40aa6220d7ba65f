pub mod business;
pub mod tag;

pub use business::{BusinessRecord, COLUMNS};
pub use tag::Tag;

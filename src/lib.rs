//! poiscout - Find businesses around an address in OpenStreetMap and export them to CSV

pub mod api;
pub mod config;
pub mod domain;
pub mod geometry;
pub mod osm;
pub mod output;
pub mod pipeline;

pub use pipeline::{Pipeline, PipelineError, RunEvent, RunOutcome, RunSummary, SearchRequest, run};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::api::{
    GeocodeError, GeocodeResult, NominatimClient, OverpassClient, SearchOutcome, SearchStatus,
};
use crate::config::{ConfigError, Settings};
use crate::domain::Tag;
use crate::geometry::{AreaError, AreaStrategy, QueryArea};
use crate::osm::normalize_all;
use crate::output::{CsvFileSink, RecordSink, SinkError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to create HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("geocoding failed: {0}")]
    Geocode(#[source] GeocodeError),

    #[error(transparent)]
    Area(#[from] AreaError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// What to look for, and where
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub address: String,
    pub tag: Tag,
    pub max_results: u32,
}

impl SearchRequest {
    pub fn new(address: impl Into<String>, tag: Tag, max_results: u32) -> Self {
        Self {
            address: address.into(),
            tag,
            max_results,
        }
    }
}

/// Summary of a run that reached the sink
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub geocoded: GeocodeResult,
    pub area: QueryArea,
    /// Number of records handed to the sink
    pub records: usize,
    pub status: SearchStatus,
    /// Endpoints that failed before one answered (or all of them)
    pub failed_endpoints: usize,
    /// Shared `date_scraped` of every record in this run
    pub observed_at: DateTime<Utc>,
}

/// Progress reported by [`Pipeline::run_with_progress`], in pipeline order
#[derive(Debug)]
pub enum RunEvent<'a> {
    Geocoding { address: &'a str },
    Geocoded(&'a GeocodeResult),
    AreaDerived(&'a QueryArea),
    Searching { tag: &'a Tag },
    Searched(&'a SearchOutcome),
    Written { records: usize },
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The geocoder had no match; nothing was written
    AddressNotFound { address: String },
    Completed(RunSummary),
}

/// Address → area → POIs → records → sink, for a single address
pub struct Pipeline {
    geocoder: NominatimClient,
    overpass: OverpassClient,
    strategy: AreaStrategy,
    radius_m: f64,
}

impl Pipeline {
    pub fn new(
        geocoder: NominatimClient,
        overpass: OverpassClient,
        strategy: AreaStrategy,
        radius_m: f64,
    ) -> Self {
        Self {
            geocoder,
            overpass,
            strategy,
            radius_m,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, PipelineError> {
        settings.validate()?;

        let geocoder = NominatimClient::new(&settings.nominatim)?;
        let overpass = OverpassClient::new(&settings.overpass, &settings.nominatim.user_agent)?;

        Ok(Self::new(
            geocoder,
            overpass,
            settings.strategy,
            settings.radius_m,
        ))
    }

    pub fn geocode(&self, address: &str) -> Result<Option<GeocodeResult>, PipelineError> {
        match self.geocoder.geocode(address) {
            Ok(result) => Ok(Some(result)),
            Err(GeocodeError::NotFound { .. }) => Ok(None),
            Err(e) => Err(PipelineError::Geocode(e)),
        }
    }

    pub fn derive_area(&self, geocoded: &GeocodeResult) -> Result<QueryArea, AreaError> {
        self.strategy.derive(geocoded, self.radius_m)
    }

    pub fn search(&self, area: &QueryArea, request: &SearchRequest) -> SearchOutcome {
        self.overpass
            .search(area, &request.tag, request.max_results)
    }

    /// Run the whole pipeline for one address.
    ///
    /// An address the geocoder cannot find is not an error: the run stops
    /// with [`RunOutcome::AddressNotFound`] and the sink is never touched.
    /// When every Overpass endpoint fails the sink still receives an empty
    /// record list; check [`RunSummary::status`] to tell the cases apart.
    pub fn run<S: RecordSink>(
        &self,
        request: &SearchRequest,
        sink: &mut S,
    ) -> Result<RunOutcome, PipelineError> {
        self.run_with_progress(request, sink, |_| {})
    }

    /// Same as [`Self::run`], calling `on_event` as each stage starts or ends
    pub fn run_with_progress<S, F>(
        &self,
        request: &SearchRequest,
        sink: &mut S,
        mut on_event: F,
    ) -> Result<RunOutcome, PipelineError>
    where
        S: RecordSink,
        F: FnMut(RunEvent<'_>),
    {
        on_event(RunEvent::Geocoding {
            address: &request.address,
        });
        let Some(geocoded) = self.geocode(&request.address)? else {
            tracing::warn!(address = %request.address, "address not found");
            return Ok(RunOutcome::AddressNotFound {
                address: request.address.clone(),
            });
        };
        on_event(RunEvent::Geocoded(&geocoded));

        let area = self.derive_area(&geocoded)?;
        tracing::debug!(?area, strategy = ?self.strategy, "derived query area");
        on_event(RunEvent::AreaDerived(&area));

        on_event(RunEvent::Searching { tag: &request.tag });
        let outcome = self.search(&area, request);
        on_event(RunEvent::Searched(&outcome));

        let observed_at = Utc::now();
        let records = normalize_all(&outcome.elements, observed_at);
        sink.write_records(&records)?;
        on_event(RunEvent::Written {
            records: records.len(),
        });

        Ok(RunOutcome::Completed(RunSummary {
            geocoded,
            area,
            records: records.len(),
            status: outcome.status,
            failed_endpoints: outcome.failures.len(),
            observed_at,
        }))
    }
}

/// One-shot search with default settings, writing `results.csv`
pub fn run(
    address: &str,
    tag_key: &str,
    tag_value: &str,
    max_results: u32,
) -> Result<RunOutcome, PipelineError> {
    let pipeline = Pipeline::from_settings(&Settings::default())?;
    let request = SearchRequest::new(address, Tag::new(tag_key, tag_value), max_results);
    pipeline.run(&request, &mut CsvFileSink::default())
}

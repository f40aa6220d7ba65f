use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::config::OverpassConfig;
use crate::domain::Tag;
use crate::geometry::QueryArea;

/// Raw Overpass API response
#[derive(Debug, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<RawElement>,
    /// Set by Overpass when the query was aborted or hit a limit
    #[serde(default)]
    pub remark: Option<String>,
}

impl OverpassResponse {
    /// Overpass reports a server-side abort (e.g. `[timeout:N]` exceeded) as
    /// a 200 with a `runtime error` remark and whatever elements it had so far.
    pub fn runtime_error(&self) -> Option<&str> {
        self.remark
            .as_deref()
            .filter(|remark| remark.trim_start().starts_with("runtime error"))
    }
}

/// The three OSM geometry kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Node,
    Way,
    Relation,
}

impl ElementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::Node => "node",
            ElementKind::Way => "way",
            ElementKind::Relation => "relation",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Centroid Overpass computes for ways and relations with `out center`
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Center {
    pub lat: f64,
    pub lon: f64,
}

/// A single element from Overpass (node, way or relation)
#[derive(Debug, Clone, Deserialize)]
pub struct RawElement {
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub id: u64,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub center: Option<Center>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl RawElement {
    /// `node/123`-style identifier
    pub fn external_id(&self) -> String {
        format!("{}/{}", self.kind, self.id)
    }

    /// Position of the element.
    ///
    /// Nodes carry `lat`/`lon` directly. Ways and relations only have the
    /// `center` that `out center` adds, so each coordinate falls back to it.
    pub fn coordinates(&self) -> (Option<f64>, Option<f64>) {
        let center = self.center.as_ref();
        (
            self.lat.or_else(|| center.map(|c| c.lat)),
            self.lon.or_else(|| center.map(|c| c.lon)),
        )
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Why a single endpoint attempt failed
#[derive(Debug, Error)]
pub enum EndpointFailure {
    #[error("request timed out")]
    Timeout,

    #[error("HTTP error status: {status}")]
    Http { status: reqwest::StatusCode },

    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("unparseable response: {0}")]
    Decode(String),

    #[error("server aborted the query: {0}")]
    Runtime(String),
}

impl From<reqwest::Error> for EndpointFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EndpointFailure::Timeout
        } else if let Some(status) = err.status() {
            EndpointFailure::Http { status }
        } else {
            EndpointFailure::Transport(err)
        }
    }
}

/// Which endpoint, if any, answered a search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStatus {
    Answered { endpoint: String },
    /// Every endpoint failed; the element list is empty by policy
    Exhausted,
}

/// Result of a search across all configured endpoints
#[derive(Debug)]
pub struct SearchOutcome {
    pub elements: Vec<RawElement>,
    pub status: SearchStatus,
    /// Classified failures, in the order the endpoints were attempted
    pub failures: Vec<(String, EndpointFailure)>,
}

impl SearchOutcome {
    pub fn is_exhausted(&self) -> bool {
        self.status == SearchStatus::Exhausted
    }
}

/// Blocking Overpass client that fails over across mirror endpoints
pub struct OverpassClient {
    client: reqwest::blocking::Client,
    endpoints: Vec<String>,
    server_timeout_secs: u64,
}

impl OverpassClient {
    pub fn new(config: &OverpassConfig, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self::with_client(
            client,
            config.urls.clone(),
            config.server_timeout_secs,
        ))
    }

    /// Build from a preconfigured HTTP client (custom timeouts, proxies)
    pub fn with_client(
        client: reqwest::blocking::Client,
        endpoints: Vec<String>,
        server_timeout_secs: u64,
    ) -> Self {
        Self {
            client,
            endpoints,
            server_timeout_secs,
        }
    }

    /// Fetch POIs tagged `tag` inside `area`.
    ///
    /// Returns an empty list when every endpoint fails. Use [`Self::search`]
    /// to tell that apart from an area with no matches.
    pub fn search_pois(&self, area: &QueryArea, tag: &Tag, max_results: u32) -> Vec<RawElement> {
        self.search(area, tag, max_results).elements
    }

    /// Fetch POIs, trying each endpoint once, in order, until one answers.
    pub fn search(&self, area: &QueryArea, tag: &Tag, max_results: u32) -> SearchOutcome {
        let query = build_query(area, tag, max_results, self.server_timeout_secs);
        tracing::debug!(%query, "built Overpass query");

        let mut failures = Vec::new();

        for endpoint in &self.endpoints {
            tracing::info!(endpoint = %endpoint, "trying Overpass server");

            match self.attempt(endpoint, &query) {
                Ok(response) => {
                    tracing::info!(
                        endpoint = %endpoint,
                        elements = response.elements.len(),
                        "Overpass server answered"
                    );
                    return SearchOutcome {
                        elements: response.elements,
                        status: SearchStatus::Answered {
                            endpoint: endpoint.clone(),
                        },
                        failures,
                    };
                }
                Err(failure) => {
                    tracing::warn!(
                        endpoint = %endpoint,
                        error = %failure,
                        "Overpass server failed, trying next server"
                    );
                    failures.push((endpoint.clone(), failure));
                }
            }
        }

        tracing::warn!(
            attempted = self.endpoints.len(),
            "all Overpass servers failed, returning no elements"
        );

        SearchOutcome {
            elements: Vec::new(),
            status: SearchStatus::Exhausted,
            failures,
        }
    }

    fn attempt(&self, endpoint: &str, query: &str) -> Result<OverpassResponse, EndpointFailure> {
        // Overpass expects form-encoded POST data: data=<query>
        let response = self
            .client
            .post(endpoint)
            .form(&[("data", query)])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(EndpointFailure::Http { status });
        }

        let body = response.text()?;
        let parsed: OverpassResponse =
            serde_json::from_str(&body).map_err(|e| EndpointFailure::Decode(e.to_string()))?;

        if let Some(remark) = parsed.runtime_error() {
            return Err(EndpointFailure::Runtime(remark.to_string()));
        }
        if let Some(remark) = &parsed.remark {
            tracing::info!(endpoint, remark = %remark, "Overpass remark");
        }

        Ok(parsed)
    }
}

/// Build the Overpass QL union over nodes, ways and relations.
///
/// `out center` makes Overpass attach a centroid to ways and relations, and
/// the trailing count caps the number of returned elements.
pub fn build_query(area: &QueryArea, tag: &Tag, max_results: u32, server_timeout_secs: u64) -> String {
    let bbox = area.to_overpass_bbox();
    let filter = format!(
        r#"["{}"="{}"]"#,
        escape_ql(&tag.key),
        escape_ql(&tag.value)
    );

    format!(
        r#"[out:json][timeout:{server_timeout_secs}];
(
  node{filter}({bbox});
  way{filter}({bbox});
  relation{filter}({bbox});
);
out center {max_results};"#
    )
}

fn escape_ql(raw: &str) -> String {
    raw.replace('\\', r"\\").replace('"', r#"\""#)
}

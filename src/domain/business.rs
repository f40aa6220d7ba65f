use serde::Serialize;

/// Column header of the CSV output, in field order
pub const COLUMNS: [&str; 12] = [
    "osm_id",
    "name",
    "street",
    "housenumber",
    "postcode",
    "city",
    "email",
    "phone",
    "website",
    "lat",
    "lon",
    "date_scraped",
];

/// One business found in OpenStreetMap, flattened for tabular output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusinessRecord {
    /// `<kind>/<id>`, e.g. `node/123456`
    pub osm_id: String,
    pub name: Option<String>,
    pub street: Option<String>,
    pub housenumber: Option<String>,
    pub postcode: Option<String>,
    pub city: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// UTC, ISO-8601 with second precision
    pub date_scraped: String,
}

use chrono::{DateTime, Utc};

use crate::api::RawElement;
use crate::domain::BusinessRecord;

/// Format a timestamp as `2024-05-01T12:30:00Z`
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Flatten a raw Overpass element into a business record.
///
/// Never fails: tags that are missing simply leave the field empty.
///
/// # Field fallbacks
/// - `email`: `contact:email`, then `email`
/// - `website`: `website`, then `contact:website`
/// - `lat`/`lon`: the element's own position, then its `center`
pub fn normalize(element: &RawElement, observed_at: DateTime<Utc>) -> BusinessRecord {
    let tag = |key: &str| element.tag(key).map(str::to_string);
    let first_tag = |keys: &[&str]| keys.iter().find_map(|&key| tag(key));
    let (lat, lon) = element.coordinates();

    BusinessRecord {
        osm_id: element.external_id(),
        name: tag("name"),
        street: tag("addr:street"),
        housenumber: tag("addr:housenumber"),
        postcode: tag("addr:postcode"),
        city: tag("addr:city"),
        email: first_tag(&["contact:email", "email"]),
        phone: tag("phone"),
        website: first_tag(&["website", "contact:website"]),
        lat,
        lon,
        date_scraped: format_timestamp(observed_at),
    }
}

/// Normalize every element, keeping the backend's order
pub fn normalize_all(elements: &[RawElement], observed_at: DateTime<Utc>) -> Vec<BusinessRecord> {
    elements
        .iter()
        .map(|element| normalize(element, observed_at))
        .collect()
}

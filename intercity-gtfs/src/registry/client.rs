//! OpenStreetMap Overpass client for railway stops.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::domain::{BoundingBox, Coord};

use super::error::RegistryError;
use super::snapshot::RegistryStop;

/// Default Overpass interpreter endpoint.
const DEFAULT_BASE_URL: &str = "https://overpass-api.de/api/interpreter";

/// Server-side timeout for the query, in seconds.
const QUERY_TIMEOUT_SECS: u64 = 600;

/// Raw Overpass response.
#[derive(Debug, Deserialize)]
struct OverpassResponse {
    elements: Vec<OverpassElement>,
}

/// A node or way, with its centre for ways.
#[derive(Debug, Deserialize)]
struct OverpassElement {
    #[serde(rename = "type")]
    kind: String,
    id: i64,
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<OverpassCenter>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct OverpassCenter {
    lat: f64,
    lon: f64,
}

/// A stop added by hand, for places the map does not tag as stations.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualStop {
    pub name: String,
    pub coord: Coord,
    pub codes: Vec<String>,
}

impl ManualStop {
    pub fn new(name: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            name: name.into(),
            coord: Coord::new(lat, lon),
            codes: Vec::new(),
        }
    }
}

/// Configuration for the Overpass client.
#[derive(Debug, Clone)]
pub struct RegistryClientConfig {
    /// Overpass interpreter URL
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Area to query
    pub bbox: BoundingBox,
    /// Tags holding operator stop codes, tried in order.
    pub code_tags: Vec<String>,
    /// Elements operated by these are not railway stops the operator serves.
    pub excluded_operators: Vec<String>,
    /// Element ids to leave out, e.g. a halt sharing its name with a
    /// station abroad.
    pub excluded_ids: Vec<i64>,
    pub manual_stops: Vec<ManualStop>,
}

impl RegistryClientConfig {
    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = bbox;
        self
    }

    pub fn with_manual_stop(mut self, stop: ManualStop) -> Self {
        self.manual_stops.push(stop);
        self
    }

    /// The Overpass QL query for stations and halts in the configured area.
    pub fn query(&self) -> String {
        format!(
            "[out:json][timeout:{QUERY_TIMEOUT_SECS}][bbox:{}];\
             (node[railway=station];way[railway=station];\
             node[railway=halt];way[railway=halt];);\
             out center;",
            self.bbox
        )
    }
}

impl Default for RegistryClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: QUERY_TIMEOUT_SECS + 30,
            bbox: BoundingBox::new(46.4, 12.0, 55.0, 30.0),
            code_tags: vec!["ref:pkpic".to_string(), "railway:ref".to_string()],
            excluded_operators: vec!["MPK Poznań".to_string()],
            excluded_ids: vec![2146607462],
            manual_stops: vec![
                ManualStop::new("Warszawa Zachodnia (Peron 8)", 52.221609, 20.961388),
                ManualStop::new("Zduńska Wola Karsznice", 51.58046, 19.00512),
            ],
        }
    }
}

/// Client for the Overpass API.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    http: reqwest::Client,
    config: RegistryClientConfig,
}

impl RegistryClient {
    /// Create a new Overpass client.
    pub fn new(config: RegistryClientConfig) -> Result<Self, RegistryError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { http, config })
    }

    /// Download every station and halt in the configured area.
    pub async fn fetch_all(&self) -> Result<Vec<RegistryStop>, RegistryError> {
        let query = self.config.query();
        debug!(url = %self.config.base_url, "querying Overpass");

        let response = self
            .http
            .get(&self.config.base_url)
            .query(&[("data", query.as_str())])
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        let stops = parse_response(&body, &self.config)?;
        info!(stops = stops.len(), "downloaded stop registry");
        Ok(stops)
    }
}

/// Turn an Overpass JSON body into registry stops.
fn parse_response(
    body: &str,
    config: &RegistryClientConfig,
) -> Result<Vec<RegistryStop>, RegistryError> {
    let response: OverpassResponse =
        serde_json::from_str(body).map_err(|e| RegistryError::Json {
            message: e.to_string(),
        })?;

    let mut stops = Vec::with_capacity(response.elements.len());
    let mut seen_names: HashMap<String, usize> = HashMap::new();

    for element in response.elements {
        let Some(stop) = stop_from_element(element, config) else {
            continue;
        };
        *seen_names.entry(stop.name.clone()).or_default() += 1;
        stops.push(stop);
    }

    for (name, count) in seen_names.iter().filter(|(_, n)| **n > 1) {
        warn!(%name, count, "duplicate stop name in registry");
    }

    for (idx, manual) in config.manual_stops.iter().enumerate() {
        stops.push(RegistryStop {
            id: format!("manual/{}", idx + 1),
            name: manual.name.to_uppercase(),
            coord: manual.coord,
            codes: manual.codes.clone(),
        });
    }

    Ok(stops)
}

fn stop_from_element(element: OverpassElement, config: &RegistryClientConfig) -> Option<RegistryStop> {
    let tags = &element.tags;
    let name = tags.get("name:pl").or_else(|| tags.get("name"))?.to_uppercase();

    if tags
        .get("operator")
        .is_some_and(|op| config.excluded_operators.iter().any(|ex| ex == op))
    {
        return None;
    }
    if config.excluded_ids.contains(&element.id) {
        return None;
    }

    let coord = match (&element.center, element.lat, element.lon) {
        (Some(center), _, _) => Coord::new(center.lat, center.lon),
        (None, Some(lat), Some(lon)) => Coord::new(lat, lon),
        _ => return None,
    };

    let codes = config
        .code_tags
        .iter()
        .filter_map(|tag| tags.get(tag))
        .flat_map(|value| value.split(';'))
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string)
        .collect();

    Some(RegistryStop {
        id: format!("{}/{}", element.kind, element.id),
        name,
        coord,
        codes,
    })
}

//! Stop identity types.

use std::fmt;

/// Error returned when parsing an invalid operator stop code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid stop code: {reason}")]
pub struct InvalidStopCode {
    reason: &'static str,
}

/// An operator stop code, as it appears in the raw schedule export.
///
/// Codes are non-empty and contain no whitespace. Leading and trailing
/// whitespace is trimmed on parse.
///
/// # Examples
///
/// ```
/// use intercity_gtfs::domain::StopCode;
///
/// let code = StopCode::parse(" 33605 ").unwrap();
/// assert_eq!(code.as_str(), "33605");
///
/// assert!(StopCode::parse("").is_err());
/// assert!(StopCode::parse("12 34").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StopCode(String);

impl StopCode {
    /// Parse a stop code from a string.
    pub fn parse(s: &str) -> Result<Self, InvalidStopCode> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(InvalidStopCode {
                reason: "must not be empty",
            });
        }

        if trimmed.chars().any(char::is_whitespace) {
            return Err(InvalidStopCode {
                reason: "must not contain whitespace",
            });
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StopCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StopCode({})", self.0)
    }
}

impl fmt::Display for StopCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

impl Coord {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance in metres.
    pub fn haversine_distance(&self, other: &Coord) -> f64 {
        const EARTH_RADIUS: f64 = 6371.0; // Earth radius in kilometers

        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();

        let a = (d_lat / 2.0).sin() * (d_lat / 2.0).sin()
            + self.lat.to_radians().cos()
                * other.lat.to_radians().cos()
                * (d_lon / 2.0).sin()
                * (d_lon / 2.0).sin();

        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS * c * 1000.0
    }

    /// Arithmetic mean of a set of positions, if any.
    pub fn centroid<'a>(coords: impl IntoIterator<Item = &'a Coord>) -> Option<Coord> {
        let (mut lat, mut lon, mut n) = (0.0, 0.0, 0usize);
        for c in coords {
            lat += c.lat;
            lon += c.lon;
            n += 1;
        }
        (n > 0).then(|| Coord::new(lat / n as f64, lon / n as f64))
    }
}

/// Display form of a name: first letter of every word upper-cased, the
/// rest lower-cased.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// Metres per degree of latitude, close enough for search windows.
const METRES_PER_DEGREE: f64 = 111_320.0;

/// An axis-aligned latitude/longitude box.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }

    /// Smallest box holding every coordinate, grown by `radius_m` on each
    /// side. `None` when there are no coordinates.
    pub fn around<'a>(coords: impl IntoIterator<Item = &'a Coord>, radius_m: f64) -> Option<Self> {
        let mut coords = coords.into_iter();
        let first = coords.next()?;
        let mut bbox = Self::new(first.lat, first.lon, first.lat, first.lon);
        for c in coords {
            bbox.min_lat = bbox.min_lat.min(c.lat);
            bbox.min_lon = bbox.min_lon.min(c.lon);
            bbox.max_lat = bbox.max_lat.max(c.lat);
            bbox.max_lon = bbox.max_lon.max(c.lon);
        }

        let d_lat = radius_m / METRES_PER_DEGREE;
        let mid_lat = ((bbox.min_lat + bbox.max_lat) / 2.0).to_radians();
        let d_lon = radius_m / (METRES_PER_DEGREE * mid_lat.cos().max(0.01));

        Some(Self::new(
            bbox.min_lat - d_lat,
            bbox.min_lon - d_lon,
            bbox.max_lat + d_lat,
            bbox.max_lon + d_lon,
        ))
    }

    /// Whether `coord` lies inside the box, edges included.
    pub fn contains(&self, coord: &Coord) -> bool {
        (self.min_lat..=self.max_lat).contains(&coord.lat)
            && (self.min_lon..=self.max_lon).contains(&coord.lon)
    }
}

impl fmt::Display for BoundingBox {
    /// Overpass order: south, west, north, east.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_lat, self.min_lon, self.max_lat, self.max_lon
        )
    }
}

/// How a canonical stop was obtained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Confidence {
    /// Matched against the registry with the given score (1.0 for an exact
    /// code match).
    Matched { score: f64 },
    /// Not found in the registry; the geometry is a stand-in.
    Placeholder,
}

impl Confidence {
    pub fn is_matched(&self) -> bool {
        matches!(self, Confidence::Matched { .. })
    }
}

/// A geographically anchored stop, as emitted into `stops.txt`.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalStop {
    /// Stable identifier (registry id, or a code-derived placeholder id).
    pub id: String,
    /// Display name.
    pub name: String,
    pub coord: Coord,
    pub confidence: Confidence,
}

impl CanonicalStop {
    pub fn is_placeholder(&self) -> bool {
        !self.confidence.is_matched()
    }
}

/// An operator stop code that could not be reconciled.
#[derive(Debug, Clone, PartialEq)]
pub struct UnmatchedStop {
    pub code: StopCode,
    /// Name as given by the operator.
    pub raw_name: String,
    /// Best available location guess.
    pub location_hint: Option<Coord>,
    /// Ids of the train runs calling at this stop, in first-seen order.
    pub train_runs: Vec<String>,
}

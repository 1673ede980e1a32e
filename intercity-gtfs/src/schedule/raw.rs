//! Raw export rows.
//!
//! The export is a semicolon-separated table with one row per train call,
//! in the operator's own column naming. Optional columns default to empty
//! strings when absent from the header or left blank.

use serde::Deserialize;
use tracing::warn;

use super::error::ParseError;

/// Columns without which no train can be built.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "DataOdjazdu",
    "NrPociagu",
    "KategoriaHandlowa",
    "Lp",
    "NumerStacji",
    "NazwaStacji",
    "Przyjazd",
    "Odjazd",
];

/// Column flagging calls where passengers may board or alight.
pub const PASSENGER_COLUMN: &str = "StacjaHandlowa";

/// One row of the export: a single call of a train on a single date.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRow {
    /// Departure date of the train from its origin (YYYY-MM-DD).
    #[serde(rename = "DataOdjazdu")]
    pub date: String,

    /// Operational train number; may contain a `/` when the number changes
    /// en route.
    #[serde(rename = "NrPociagu")]
    pub train_number: String,

    /// Number shown to passengers.
    #[serde(rename = "NrPociaguHandlowy", default)]
    pub commercial_number: String,

    #[serde(rename = "KategoriaHandlowa")]
    pub category: String,

    #[serde(rename = "NazwaPociagu", default)]
    pub train_name: String,

    /// Ordinal of the call within the train.
    #[serde(rename = "Lp")]
    pub ordinal: String,

    #[serde(rename = "NumerStacji")]
    pub stop_code: String,

    #[serde(rename = "NazwaStacji")]
    pub stop_name: String,

    /// "1" for calls open to passengers.
    #[serde(rename = "StacjaHandlowa", default)]
    pub passenger_stop: String,

    #[serde(rename = "Przyjazd")]
    pub arrival: String,

    #[serde(rename = "Odjazd")]
    pub departure: String,

    #[serde(rename = "PeronWjazd", default)]
    pub arrival_platform: String,

    #[serde(rename = "PeronWyjazd", default)]
    pub departure_platform: String,

    #[serde(rename = "TorWjazd", default)]
    pub arrival_track: String,

    #[serde(rename = "TorWyjazd", default)]
    pub departure_track: String,

    /// "1" when this call is served by a replacement bus.
    #[serde(rename = "BUS", default)]
    pub bus: String,

    /// Cumulative distance from the origin, in metres.
    #[serde(rename = "DrogaKumulowanaMetry", default)]
    pub distance_m: String,

    /// Comma-separated numbers of trains this one is coupled with.
    #[serde(rename = "PolaczenieZ", default)]
    pub coupled_with: String,
}

/// Text encoding of the export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputEncoding {
    /// Windows-1250, as the operator publishes it. A UTF-8 byte order mark
    /// overrides this.
    #[default]
    Windows1250,
    Utf8,
}

impl InputEncoding {
    fn name(&self) -> &'static str {
        match self {
            InputEncoding::Windows1250 => "windows-1250",
            InputEncoding::Utf8 => "UTF-8",
        }
    }
}

/// Decode raw export bytes into text.
pub fn decode(bytes: &[u8], encoding: InputEncoding) -> Result<String, ParseError> {
    if bytes.is_empty() {
        return Err(ParseError::Empty);
    }

    match encoding {
        InputEncoding::Utf8 => {
            let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
            std::str::from_utf8(bytes)
                .map(str::to_string)
                .map_err(|_| ParseError::Encoding {
                    encoding: encoding.name(),
                })
        }
        InputEncoding::Windows1250 => {
            let (text, actual, had_errors) = encoding_rs::WINDOWS_1250.decode(bytes);
            if had_errors {
                // Unmapped bytes only damage names, not structure.
                warn!(encoding = actual.name(), "undecodable bytes replaced in export");
            }
            Ok(text.into_owned())
        }
    }
}

/// Check that every required column is present.
pub fn check_header(headers: &csv::StringRecord) -> Result<(), ParseError> {
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == *column) {
            return Err(ParseError::MissingColumn(column));
        }
    }
    Ok(())
}

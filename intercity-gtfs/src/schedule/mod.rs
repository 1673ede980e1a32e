//! Reading the operator's schedule export.
//!
//! The export arrives as a semicolon-separated table in Windows-1250, one
//! row per train call. [`ScheduleParser`] turns it into [`TrainRun`]s.
//!
//! [`TrainRun`]: crate::domain::TrainRun

mod error;
mod parse;
mod raw;

pub use error::ParseError;
pub use parse::{ParserConfig, ScheduleParser};
pub use raw::{InputEncoding, RawRow};

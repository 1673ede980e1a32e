//! Writing the feed to disk.
//!
//! [`FeedWriter`] turns an [`AssembledFeed`] into a GTFS zip archive.
//! [`write_missing_report`] lists the operator stops that could not be
//! placed. Both can be staged first and committed together, so a failure
//! while preparing either leaves the previous outputs as they were.
//!
//! [`AssembledFeed`]: crate::assemble::AssembledFeed

mod error;
mod records;
mod report;
mod staged;
mod writer;

pub use error::FeedError;
pub use report::{StagedReport, stage_missing_report, write_missing_report};
pub use staged::StagedFile;
pub use writer::{FeedConfig, FeedStats, FeedWriter};

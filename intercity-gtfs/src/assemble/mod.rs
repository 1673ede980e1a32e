//! Trip assembly.
//!
//! Turns reconciled, time-resolved runs into the entities of the feed:
//! trips with their stop times, the calendars and routes they share, and
//! the stops they call at.

mod assembler;
mod coverage;
mod routes;

pub use assembler::{AssembleError, AssembledFeed, TripAssembler};
pub use coverage::CoverageRegion;
pub use routes::route_for;

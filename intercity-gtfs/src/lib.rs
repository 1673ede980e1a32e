//! PKP Intercity schedule export to GTFS.
//!
//! Reads the operator's timetable export, places its stops using an
//! OpenStreetMap-derived registry, resolves local times against the zone's
//! clock changes and writes a static GTFS feed.

pub mod assemble;
pub mod config;
pub mod diagnostics;
pub mod domain;
pub mod feed;
pub mod pipeline;
pub mod reconcile;
pub mod registry;
pub mod schedule;
pub mod temporal;

#[cfg(test)]
mod pipeline_tests;

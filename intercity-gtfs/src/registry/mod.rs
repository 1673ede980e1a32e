//! External stop registry.
//!
//! Railway stations and halts come from OpenStreetMap via Overpass. The
//! download is cached on disk and served from memory through the
//! [`StopRegistry`] trait.

mod cache;
mod client;
mod error;
mod snapshot;

pub use cache::{RegistryCache, RegistryCacheConfig};
pub use client::{ManualStop, RegistryClient, RegistryClientConfig};
pub use error::RegistryError;
pub use snapshot::{RegistrySnapshot, RegistryStop, StopRegistry};

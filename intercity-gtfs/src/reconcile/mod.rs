//! Stop reconciliation.
//!
//! Operator stop codes are mapped onto registry stops: by code when the
//! registry knows it, otherwise by name near the stops around it on the
//! route. Codes that cannot be placed get a placeholder stop and are
//! reported.

mod matcher;
mod reconciler;

pub use matcher::{AliasTable, dice_similarity, normalize_name, proximity_factor};
pub use reconciler::{
    ReconcileError, ReconcilerConfig, Resolution, ResolveHint, StopReconciler,
};

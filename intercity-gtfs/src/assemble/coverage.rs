//! Region the schedule export describes in full.

use crate::domain::{BoundingBox, CanonicalStop};

/// Area within which the operator publishes complete stop detail.
///
/// International trains carry a few foreign calls in the export, with
/// timings that cannot be trusted. Stops outside the region are dropped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverageRegion {
    bbox: BoundingBox,
}

impl Default for CoverageRegion {
    /// Poland.
    fn default() -> Self {
        Self::new(BoundingBox::new(48.9, 14.0, 55.0, 24.3))
    }
}

impl CoverageRegion {
    pub fn new(bbox: BoundingBox) -> Self {
        Self { bbox }
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = bbox;
        self
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    /// Whether a stop stays in trips. Placeholders have no real position
    /// and are always kept.
    pub fn retains(&self, stop: &CanonicalStop) -> bool {
        stop.is_placeholder() || self.bbox.contains(&stop.coord)
    }
}

//! Footprint filtering.
//!
//! The catalog matches on bounding boxes only, so a scene whose box overlaps
//! the area of interest may have a footprint that does not. This stage keeps
//! the scenes whose footprint shares at least one point with the area.

use tracing::debug;

use crate::catalog::SceneSet;
use crate::geo::Geometry;

/// Scenes retained by [`filter`] and the counts before and after.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterResult {
    pub scenes: SceneSet,
    pub received: usize,
    pub filtered: usize,
}

impl FilterResult {
    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

/// Keeps the scenes whose footprint intersects `area`, in their original
/// order.
pub fn filter(scenes: SceneSet, area: &Geometry) -> FilterResult {
    let received = scenes.len();
    let scenes: SceneSet = scenes
        .into_iter()
        .filter(|scene| scene.footprint.intersects(area))
        .collect();
    let filtered = scenes.len();

    debug!(received, filtered, "Filtered scenes by footprint");

    FilterResult {
        scenes,
        received,
        filtered,
    }
}

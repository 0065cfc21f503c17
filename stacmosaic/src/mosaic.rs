//! Mosaic grouping.
//!
//! Scenes acquired on the same day, on the same orbit and in the same CRS
//! tile together seamlessly, so each such set becomes one mosaic.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;

use crate::catalog::{Scene, SceneSet};

/// Identity of a mosaic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MosaicKey {
    pub date: NaiveDate,
    pub orbit: String,
    pub crs: String,
}

impl MosaicKey {
    pub fn of(scene: &Scene) -> Self {
        Self {
            date: scene.date,
            orbit: scene.orbit.clone(),
            crs: scene.crs.clone(),
        }
    }

    /// `<date>_<orbit>_<crs code>`, e.g. `2024-01-02_157_32723`.
    pub fn tag(&self) -> String {
        let code = self.crs.rsplit(':').next().unwrap_or(&self.crs);
        format!("{}_{}_{}", self.date, self.orbit, code)
    }
}

impl fmt::Display for MosaicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} orbit {} {}", self.date, self.orbit, self.crs)
    }
}

/// Scenes sharing a [`MosaicKey`], borrowed from the filtered scene set.
#[derive(Debug, Clone, PartialEq)]
pub struct MosaicGroup<'a> {
    pub key: MosaicKey,
    /// Members in the order they were received.
    pub members: Vec<&'a Scene>,
    /// Finest native resolution among the members.
    pub resolution: Option<f64>,
}

impl<'a> MosaicGroup<'a> {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member_ids(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|s| s.id.as_str())
    }
}

/// Partitions `scenes` by (date, orbit, CRS).
///
/// Groups appear in order of their first member; every scene lands in
/// exactly one group.
pub fn group(scenes: &SceneSet) -> Vec<MosaicGroup<'_>> {
    let mut index: HashMap<MosaicKey, usize> = HashMap::new();
    let mut groups: Vec<MosaicGroup<'_>> = Vec::new();

    for scene in scenes {
        let key = MosaicKey::of(scene);
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(MosaicGroup {
                key,
                members: Vec::new(),
                resolution: None,
            });
            groups.len() - 1
        });

        let group = &mut groups[slot];
        group.members.push(scene);
        group.resolution = match (group.resolution, scene.resolution) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
    }

    groups
}

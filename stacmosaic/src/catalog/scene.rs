//! Scenes and de-duplicated scene sets.

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::geo::Geometry;

/// Tolerance when comparing spatial resolutions.
pub(crate) const RESOLUTION_EPSILON: f64 = 1e-6;

/// Placeholder for an orbit or CRS the catalog does not report.
pub const UNKNOWN: &str = "unknown";

/// A single raster band of a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    /// Asset key in the catalog item (usually the band name).
    pub key: String,
    pub href: String,
    /// Ground sample distance, when known.
    pub resolution: Option<f64>,
}

/// One catalog item: a single acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub id: String,
    pub date: NaiveDate,
    pub orbit: String,
    /// Coordinate reference system, e.g. `EPSG:32723`.
    pub crs: String,
    pub footprint: Geometry,
    pub assets: Vec<Asset>,
    /// Finest resolution across the assets.
    pub resolution: Option<f64>,
}

impl Scene {
    /// Assets available at `resolution`; all assets when no resolution is
    /// given. Assets of unknown resolution always match.
    pub fn assets_at(&self, resolution: Option<f64>) -> Vec<&Asset> {
        self.assets
            .iter()
            .filter(|a| match (resolution, a.resolution) {
                (Some(want), Some(have)) => (want - have).abs() < RESOLUTION_EPSILON,
                _ => true,
            })
            .collect()
    }
}

/// Scenes in first-seen order, unique by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneSet {
    scenes: Vec<Scene>,
    ids: HashSet<String>,
}

impl SceneSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a scene unless one with the same id is present.
    ///
    /// Returns false for duplicates.
    pub fn push(&mut self, scene: Scene) -> bool {
        if !self.ids.insert(scene.id.clone()) {
            return false;
        }
        self.scenes.push(scene);
        true
    }

    /// Adds scenes, skipping duplicates. Returns how many were added.
    pub fn extend(&mut self, scenes: impl IntoIterator<Item = Scene>) -> usize {
        scenes
            .into_iter()
            .map(|s| self.push(s))
            .filter(|added| *added)
            .count()
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Scene> {
        self.scenes.iter()
    }

    pub fn as_slice(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn into_vec(self) -> Vec<Scene> {
        self.scenes
    }
}

impl FromIterator<Scene> for SceneSet {
    fn from_iter<I: IntoIterator<Item = Scene>>(iter: I) -> Self {
        let mut set = SceneSet::new();
        for scene in iter {
            set.push(scene);
        }
        set
    }
}

impl IntoIterator for SceneSet {
    type Item = Scene;
    type IntoIter = std::vec::IntoIter<Scene>;

    fn into_iter(self) -> Self::IntoIter {
        self.scenes.into_iter()
    }
}

impl<'a> IntoIterator for &'a SceneSet {
    type Item = &'a Scene;
    type IntoIter = std::slice::Iter<'a, Scene>;

    fn into_iter(self) -> Self::IntoIter {
        self.scenes.iter()
    }
}

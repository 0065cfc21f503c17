//! Scene and mosaic virtual raster construction.

use std::collections::HashSet;
use std::fs;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::sidecar::{write_sidecar, Sidecar, SourceType};
use super::{BuildResult, OutputLayout, RasterVirtualizer, VrtOptions};
use crate::catalog::{Asset, Scene};
use crate::config::CollectionConfig;
use crate::executor::{ItemStatus, ProgressSink};
use crate::mosaic::MosaicGroup;

/// Results of building a list of mosaics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    /// One result per mosaic attempted.
    pub mosaics: Vec<BuildResult>,
    pub scenes: Vec<BuildResult>,
    /// Cancellation stopped the walk before every mosaic was attempted.
    pub cancelled: bool,
}

/// Builds per-scene and per-mosaic virtual rasters for one search.
pub struct VirtualRasterBuilder<'a, V: ?Sized> {
    virtualizer: &'a V,
    layout: &'a OutputLayout,
    collection: &'a CollectionConfig,
    resolution: Option<f64>,
}

impl<'a, V: RasterVirtualizer + ?Sized> VirtualRasterBuilder<'a, V> {
    pub fn new(
        virtualizer: &'a V,
        layout: &'a OutputLayout,
        collection: &'a CollectionConfig,
        resolution: Option<f64>,
    ) -> Self {
        Self {
            virtualizer,
            layout,
            collection,
            resolution,
        }
    }

    /// Assets of `scene` in band order.
    ///
    /// Composite bands configured for the requested resolution come first in
    /// their configured order; the rest keep catalog order.
    pub fn band_sources<'s>(&self, scene: &'s Scene) -> Vec<&'s Asset> {
        let mut assets = scene.assets_at(self.resolution);
        if let Some(composite) = self.collection.composite_for(self.resolution) {
            assets.sort_by_key(|a| {
                composite
                    .iter()
                    .position(|band| *band == a.key)
                    .unwrap_or(composite.len())
            });
        }
        assets
    }

    /// Asset keys of `scene` in band order.
    pub fn band_names(&self, scene: &Scene) -> Vec<String> {
        self.band_sources(scene)
            .into_iter()
            .map(|a| a.key.clone())
            .collect()
    }

    /// Output names for `groups`, unique within the search.
    ///
    /// Distinct keys can sanitize to the same name; later groups get a
    /// numeric suffix.
    pub fn mosaic_names(&self, groups: &[MosaicGroup<'_>]) -> Vec<String> {
        let mut used = HashSet::new();
        groups
            .iter()
            .map(|group| {
                let base = self.layout.mosaic_name(&group.key);
                let mut name = base.clone();
                let mut n = 1;
                while !used.insert(name.clone()) {
                    n += 1;
                    name = format!("{}_{}", base, n);
                }
                if n > 1 {
                    warn!(key = %group.key, mosaic = %name, "Mosaic name already used, renamed");
                }
                name
            })
            .collect()
    }

    /// Writes the virtual raster of one scene inside mosaic `mosaic_name`.
    pub fn build_scene(&self, scene: &Scene, mosaic_name: &str) -> BuildResult {
        let path = self.layout.scene_path(mosaic_name, scene);
        let assets = self.band_sources(scene);
        if assets.is_empty() {
            let reason = match self.resolution {
                Some(r) => format!("no raster assets at resolution {}", r),
                None => "no raster assets".to_string(),
            };
            warn!(scene = %scene.id, reason = %reason, "Error building VRT for scene");
            return BuildResult::failed(&scene.id, reason);
        }

        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(scene = %scene.id, error = %e, "Error building VRT for scene");
                return BuildResult::failed(&scene.id, e.to_string());
            }
        }

        let sources: Vec<String> = assets.iter().map(|a| a.href.clone()).collect();
        let options = VrtOptions::scene(self.collection.nodata)
            .with_band_names(assets.iter().map(|a| a.key.clone()).collect());
        if let Err(e) = self.virtualizer.build(&sources, &path, &options) {
            warn!(scene = %scene.id, error = %e, "Error building VRT for scene");
            return BuildResult::failed(&scene.id, e.to_string());
        }

        self.write_sidecar(&path, SourceType::Url);
        debug!(scene = %scene.id, bands = sources.len(), "Built scene VRT");
        BuildResult::built(&scene.id, path)
    }

    /// Writes the mosaic of a group's scene rasters as `name`.
    ///
    /// Every member is referenced, whether or not its own build succeeded.
    /// Bands are named after the first member that has any.
    pub fn build_mosaic(&self, group: &MosaicGroup<'_>, name: &str) -> BuildResult {
        let path = self.layout.mosaic_path(name);
        let sources: Vec<String> = group
            .members
            .iter()
            .map(|scene| {
                self.layout
                    .scene_path(name, scene)
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();

        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(mosaic = %name, error = %e, "Error building mosaic VRT");
                return BuildResult::failed(name, e.to_string());
            }
        }

        let band_names = group
            .members
            .iter()
            .map(|scene| self.band_names(scene))
            .find(|names| !names.is_empty())
            .unwrap_or_default();
        let options = VrtOptions::mosaic(self.collection.nodata).with_band_names(band_names);
        if let Err(e) = self.virtualizer.build(&sources, &path, &options) {
            warn!(mosaic = %name, error = %e, "Error building mosaic VRT");
            return BuildResult::failed(name, e.to_string());
        }

        self.write_sidecar(&path, SourceType::Vrt);
        BuildResult::built(name, path)
    }

    /// Builds every group in order: member scenes first, then the mosaic.
    ///
    /// Emits one progress event per mosaic. Cancellation is checked before
    /// each scene and each mosaic.
    pub fn build_all(
        &self,
        groups: &[MosaicGroup<'_>],
        cancel: &CancellationToken,
        progress: &ProgressSink,
    ) -> BuildReport {
        let mut report = BuildReport::default();
        let total = groups.len();
        let names = self.mosaic_names(groups);

        for (i, (group, name)) in groups.iter().zip(&names).enumerate() {
            let mut failed = 0;
            for scene in &group.members {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    return report;
                }
                let result = self.build_scene(scene, name);
                if !result.is_success() {
                    failed += 1;
                }
                report.scenes.push(result);
            }

            if cancel.is_cancelled() {
                report.cancelled = true;
                return report;
            }
            let result = self.build_mosaic(group, name);
            let status = match &result.output {
                Ok(_) => ItemStatus::Built {
                    scenes: group.len(),
                    failed,
                },
                Err(reason) => ItemStatus::Failed {
                    reason: reason.clone(),
                },
            };
            info!(
                "Mosaic {} of {}: {} ({})",
                i + 1,
                total,
                result.target,
                status
            );
            progress.build_progress(i + 1, total, result.target.clone(), status);
            report.mosaics.push(result);
        }

        report
    }

    fn write_sidecar(&self, raster: &std::path::Path, source_type: SourceType) {
        let sidecar = Sidecar {
            collection_id: self.collection.id.clone(),
            source_type,
        };
        if let Err(e) = write_sidecar(raster, &sidecar) {
            warn!(raster = %raster.display(), error = %e, "Failed to write sidecar");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{test_scene as scene, SceneSet, SearchRequest};
    use crate::executor::TaskEvent;
    use crate::geo::BoundingBox;
    use crate::mosaic;
    use crate::vrt::VirtualizerError;
    use chrono::NaiveDate;
    use parking_lot::Mutex;
    use std::path::{Path, PathBuf};

    /// Records invocations and writes an empty file; fails for listed outputs.
    #[derive(Default)]
    struct RecordingVirtualizer {
        calls: Mutex<Vec<(Vec<String>, PathBuf, VrtOptions)>>,
        fail_containing: Option<String>,
    }

    impl RasterVirtualizer for RecordingVirtualizer {
        fn build(
            &self,
            sources: &[String],
            output: &Path,
            options: &VrtOptions,
        ) -> Result<(), VirtualizerError> {
            self.calls
                .lock()
                .push((sources.to_vec(), output.to_path_buf(), options.clone()));
            if let Some(pattern) = &self.fail_containing {
                if output.to_string_lossy().contains(pattern.as_str()) {
                    return Err(VirtualizerError::Failed {
                        program: "mock".to_string(),
                        code: Some(1),
                        stderr: "boom".to_string(),
                    });
                }
            }
            fs::write(output, "<VRTDataset/>").map_err(|e| VirtualizerError::Launch {
                program: "mock".to_string(),
                reason: e.to_string(),
            })
        }
    }

    fn layout(root: &Path, resolution: Option<f64>) -> OutputLayout {
        let day = |s| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let area = BoundingBox::new(0.0, 0.0, 5.0, 5.0).unwrap().into();
        let mut request = SearchRequest::new("C", day("2024-01-01"), day("2024-01-31"), area).unwrap();
        if let Some(r) = resolution {
            request = request.with_resolution(r).unwrap();
        }
        OutputLayout::new(root, &request, "C")
    }

    #[test]
    fn test_band_order_puts_composite_first() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path(), None);
        let mut s = scene("a", "2024-01-02", "1", 0.0, 0.0);
        for key in ["B3", "B4"] {
            s.assets.push(Asset {
                key: key.to_string(),
                href: format!("https://x/{}.tif", key),
                resolution: Some(10.0),
            });
        }
        let collection = CollectionConfig::new("C").with_composite(10.0, &["B4", "B3"]);
        let virtualizer = RecordingVirtualizer::default();

        let builder = VirtualRasterBuilder::new(&virtualizer, &layout, &collection, Some(10.0));
        let keys: Vec<_> = builder
            .band_sources(&s)
            .iter()
            .map(|a| a.key.as_str())
            .collect();
        // B2 is 20m and dropped; B1 keeps catalog order after the composite
        assert_eq!(keys, vec!["B4", "B3", "B1"]);
    }

    #[test]
    fn test_build_scene_writes_vrt_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path(), None);
        let collection = CollectionConfig::new("C").with_nodata(0.0);
        let virtualizer = RecordingVirtualizer::default();
        let builder = VirtualRasterBuilder::new(&virtualizer, &layout, &collection, None);

        let s = scene("a", "2024-01-02", "1", 0.0, 0.0);
        let result = builder.build_scene(&s, "m");

        assert!(result.is_success());
        let path = result.path().unwrap().to_path_buf();
        assert_eq!(path, layout.scene_path("m", &s));
        assert!(path.exists());
        assert!(crate::vrt::sidecar_path(&path).exists());

        let calls = virtualizer.calls.lock();
        assert_eq!(calls[0].0.len(), 2);
        assert_eq!(
            calls[0].2,
            VrtOptions::scene(Some(0.0)).with_band_names(vec!["B1".to_string(), "B2".to_string()])
        );
    }

    #[test]
    fn test_build_scene_without_matching_assets() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path(), Some(64.0));
        let collection = CollectionConfig::new("C");
        let virtualizer = RecordingVirtualizer::default();
        let builder = VirtualRasterBuilder::new(&virtualizer, &layout, &collection, Some(64.0));

        let result = builder.build_scene(&scene("a", "2024-01-02", "1", 0.0, 0.0), "m");
        assert!(!result.is_success());
        assert!(virtualizer.calls.lock().is_empty());
    }

    #[test]
    fn test_build_all_continues_after_scene_failure() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path(), None);
        let collection = CollectionConfig::new("C");
        let virtualizer = RecordingVirtualizer {
            fail_containing: Some("bad_native".to_string()),
            ..Default::default()
        };
        let builder = VirtualRasterBuilder::new(&virtualizer, &layout, &collection, None);

        let scenes: SceneSet = vec![
            scene("good", "2024-01-02", "1", 0.0, 0.0),
            scene("bad", "2024-01-02", "1", 1.0, 0.0),
            scene("other", "2024-01-03", "1", 0.0, 0.0),
        ]
        .into_iter()
        .collect();
        let groups = mosaic::group(&scenes);
        let (sink, mut events) = ProgressSink::channel();

        let report = builder.build_all(&groups, &CancellationToken::new(), &sink);

        assert!(!report.cancelled);
        assert_eq!(report.scenes.len(), 3);
        assert_eq!(report.mosaics.len(), 2);
        assert!(report.mosaics.iter().all(BuildResult::is_success));
        assert_eq!(report.scenes.iter().filter(|r| !r.is_success()).count(), 1);

        // The mosaic still references both member rasters
        let calls = virtualizer.calls.lock();
        let mosaic_call = calls.iter().find(|c| !c.2.separate).unwrap();
        assert_eq!(mosaic_call.0.len(), 2);

        match events.try_recv().unwrap() {
            TaskEvent::BuildProgress {
                index,
                total,
                status,
                ..
            } => {
                assert_eq!((index, total), (1, 2));
                assert_eq!(
                    status,
                    ItemStatus::Built {
                        scenes: 2,
                        failed: 1
                    }
                );
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_build_all_stops_when_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path(), None);
        let collection = CollectionConfig::new("C");
        let virtualizer = RecordingVirtualizer::default();
        let builder = VirtualRasterBuilder::new(&virtualizer, &layout, &collection, None);

        let scenes: SceneSet = vec![scene("a", "2024-01-02", "1", 0.0, 0.0)]
            .into_iter()
            .collect();
        let groups = mosaic::group(&scenes);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = builder.build_all(&groups, &cancel, &ProgressSink::disabled());
        assert!(report.cancelled);
        assert!(report.mosaics.is_empty());
        assert!(virtualizer.calls.lock().is_empty());
    }

    #[test]
    fn test_band_names_follow_composite_order() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path(), Some(10.0));
        let collection = CollectionConfig::new("C").with_composite(10.0, &["B4", "B1"]);
        let virtualizer = RecordingVirtualizer::default();
        let builder = VirtualRasterBuilder::new(&virtualizer, &layout, &collection, Some(10.0));

        let mut with_bands = scene("a", "2024-01-02", "1", 0.0, 0.0);
        with_bands.assets.push(Asset {
            key: "B4".to_string(),
            href: "https://x/a/B4.tif".to_string(),
            resolution: Some(10.0),
        });
        let mut without_bands = scene("b", "2024-01-02", "1", 1.0, 0.0);
        without_bands.assets.clear();
        let scenes: SceneSet = vec![without_bands, with_bands].into_iter().collect();
        let groups = mosaic::group(&scenes);

        let report = builder.build_all(&groups, &CancellationToken::new(), &ProgressSink::disabled());
        assert!(report.mosaics[0].is_success());

        let calls = virtualizer.calls.lock();
        let scene_call = calls.iter().find(|c| c.2.separate).unwrap();
        assert_eq!(scene_call.2.band_names, vec!["B4", "B1"]);
        assert_eq!(scene_call.0, vec!["https://x/a/B4.tif", "https://example.com/a/B1.tif"]);
        // The mosaic takes its names from the first member that has bands
        let mosaic_call = calls.iter().find(|c| !c.2.separate).unwrap();
        assert_eq!(mosaic_call.2.band_names, vec!["B4", "B1"]);
    }

    #[test]
    fn test_colliding_mosaic_names_get_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path(), None);
        let collection = CollectionConfig::new("C");
        let virtualizer = RecordingVirtualizer::default();
        let builder = VirtualRasterBuilder::new(&virtualizer, &layout, &collection, None);

        let mut ogc = scene("c", "2024-01-02", "7", 0.0, 0.0);
        ogc.crs = "OGC:4326".to_string();
        let scenes: SceneSet = vec![
            scene("a", "2024-01-02", "1/2", 0.0, 0.0),
            scene("b", "2024-01-02", "1-2", 0.0, 0.0),
            scene("d", "2024-01-02", "7", 0.0, 0.0),
            ogc,
        ]
        .into_iter()
        .collect();
        let groups = mosaic::group(&scenes);
        assert_eq!(groups.len(), 4);

        let names = builder.mosaic_names(&groups);
        assert_eq!(names[0], "C.2024-01-02_1-2_4326_native");
        assert_eq!(names[1], "C.2024-01-02_1-2_4326_native_2");
        assert_eq!(names[2], "C.2024-01-02_7_4326_native");
        assert_eq!(names[3], "C.2024-01-02_7_4326_native_2");

        let report = builder.build_all(&groups, &CancellationToken::new(), &ProgressSink::disabled());
        let paths: HashSet<_> = report.mosaics.iter().filter_map(BuildResult::path).collect();
        assert_eq!(paths.len(), 4);
        for result in &report.scenes {
            assert!(result.path().unwrap().exists());
        }
        // Each mosaic references only its own scene
        let calls = virtualizer.calls.lock();
        let mosaic_sources: HashSet<_> = calls
            .iter()
            .filter(|c| !c.2.separate)
            .map(|c| c.0[0].clone())
            .collect();
        assert_eq!(mosaic_sources.len(), 4);
    }
}

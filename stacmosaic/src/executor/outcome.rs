//! Terminal results of a run.

use std::fmt;
use std::path::PathBuf;

use super::RunState;
use crate::catalog::SceneSet;
use crate::error::PipelineError;
use crate::vrt::BuildResult;

/// Totals of a run that reached the end of the build stage.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Unique scenes returned by the catalog.
    pub received: usize,
    /// Scenes whose footprint intersects the area of interest.
    pub filtered: usize,
    pub mosaics: usize,
    /// One result per mosaic, in build order.
    pub results: Vec<BuildResult>,
    /// One result per scene virtual raster.
    pub scene_results: Vec<BuildResult>,
    /// Directory holding this search's rasters.
    pub output_dir: PathBuf,
    /// The catalog and filter stages were skipped in favor of the last search.
    pub reused_search: bool,
}

impl RunSummary {
    /// Scene and mosaic builds that failed.
    pub fn failures(&self) -> impl Iterator<Item = &BuildResult> {
        self.scene_results
            .iter()
            .chain(self.results.iter())
            .filter(|r| !r.is_success())
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Completed(RunSummary),

    /// The catalog returned no scenes at all.
    NoScenesFound { collection: String },

    /// Scenes were found but none intersect the area of interest.
    NoScenesAfterFilter { received: usize },

    /// Cancelled between pages or build items. `results` holds the mosaics
    /// built before the cancellation was observed.
    Cancelled {
        scenes: SceneSet,
        results: Vec<BuildResult>,
    },

    /// `scenes` holds what was collected before the failure.
    Failed {
        error: PipelineError,
        scenes: SceneSet,
    },
}

impl TaskOutcome {
    /// State the runner moves to when a run ends this way.
    pub fn state(&self) -> RunState {
        match self {
            TaskOutcome::Completed(_)
            | TaskOutcome::NoScenesFound { .. }
            | TaskOutcome::NoScenesAfterFilter { .. } => RunState::Completed,
            TaskOutcome::Cancelled { .. } => RunState::Cancelled,
            TaskOutcome::Failed { .. } => RunState::Failed,
        }
    }

    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            TaskOutcome::Completed(summary) => Some(summary),
            _ => None,
        }
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutcome::Completed(s) => write!(
                f,
                "Success - {} scenes - {} mosaics",
                s.filtered, s.mosaics
            ),
            TaskOutcome::NoScenesFound { collection } => {
                write!(f, "No scenes found in collection {}", collection)
            }
            TaskOutcome::NoScenesAfterFilter { received } => write!(
                f,
                "None of the {} scenes received intersect the area of interest",
                received
            ),
            TaskOutcome::Cancelled { scenes, results } => write!(
                f,
                "Cancelled - {} scenes - {} mosaics built",
                scenes.len(),
                results.iter().filter(|r| r.is_success()).count()
            ),
            TaskOutcome::Failed { error, .. } => write!(f, "Failed - {}", error),
        }
    }
}

//! Background execution of a search-filter-group-build run.

use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{ProgressSink, RunSummary, TaskOutcome};
use crate::catalog::{CatalogClient, HttpClient, SceneSet, SearchRequest, SearchStatus};
use crate::config::CollectionRegistry;
use crate::error::PipelineError;
use crate::filter;
use crate::mosaic;
use crate::vrt::{write_footprints, OutputLayout, RasterVirtualizer, VirtualRasterBuilder};

/// Lifecycle of the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Cancelled | RunState::Failed
        )
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RunnerError {
    #[error("A run is already in progress")]
    AlreadyRunning,

    #[error("No run in progress")]
    NotRunning,

    #[error("Failed to start run thread: {0}")]
    Spawn(String),
}

/// Runner settings.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Root directory for virtual rasters.
    pub output_dir: PathBuf,
    pub registry: CollectionRegistry,
    /// Skip the catalog when the same search succeeded last time.
    pub reuse_last_search: bool,
}

impl RunnerConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            registry: CollectionRegistry::new(),
            reuse_last_search: true,
        }
    }

    pub fn with_registry(mut self, registry: CollectionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_reuse_last_search(mut self, reuse: bool) -> Self {
        self.reuse_last_search = reuse;
        self
    }
}

/// Filtered scenes of the last successful search.
struct LastSearch {
    request: SearchRequest,
    scenes: Arc<SceneSet>,
    received: usize,
}

struct Inner<C, V> {
    catalog: CatalogClient<C>,
    virtualizer: V,
    config: RunnerConfig,
    state: Mutex<RunState>,
    cancel: Mutex<Option<CancellationToken>>,
    last_search: Mutex<Option<LastSearch>>,
}

/// Runs one pipeline at a time on a background thread.
///
/// Cloning yields another handle to the same runner.
pub struct TaskRunner<C, V> {
    inner: Arc<Inner<C, V>>,
}

impl<C, V> Clone for TaskRunner<C, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C, V> TaskRunner<C, V>
where
    C: HttpClient + 'static,
    V: RasterVirtualizer + 'static,
{
    pub fn new(catalog: CatalogClient<C>, virtualizer: V, config: RunnerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                catalog,
                virtualizer,
                config,
                state: Mutex::new(RunState::Idle),
                cancel: Mutex::new(None),
                last_search: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> RunState {
        *self.inner.state.lock()
    }

    /// Starts a run. Events for it are sent to `progress`, ending with
    /// [`TaskEvent::Finished`](super::TaskEvent::Finished).
    ///
    /// # Errors
    ///
    /// [`RunnerError::AlreadyRunning`] while another run is active.
    pub fn start(
        &self,
        request: SearchRequest,
        progress: ProgressSink,
    ) -> Result<TaskHandle, RunnerError> {
        let cancel = {
            let mut state = self.inner.state.lock();
            if *state == RunState::Running {
                return Err(RunnerError::AlreadyRunning);
            }
            *state = RunState::Running;
            let token = CancellationToken::new();
            *self.inner.cancel.lock() = Some(token.clone());
            token
        };

        let inner = Arc::clone(&self.inner);
        let token = cancel.clone();
        let spawned = thread::Builder::new()
            .name("stacmosaic-run".to_string())
            .spawn(move || inner.run(request, token, progress));

        match spawned {
            Ok(thread) => Ok(TaskHandle { thread, cancel }),
            Err(e) => {
                *self.inner.cancel.lock() = None;
                *self.inner.state.lock() = RunState::Idle;
                Err(RunnerError::Spawn(e.to_string()))
            }
        }
    }

    /// Requests cancellation of the active run.
    ///
    /// The run stops at its next checkpoint: before a catalog page or between
    /// build items.
    pub fn cancel(&self) -> Result<(), RunnerError> {
        match self.inner.cancel.lock().as_ref() {
            Some(token) => {
                info!("Cancellation requested");
                token.cancel();
                Ok(())
            }
            None => Err(RunnerError::NotRunning),
        }
    }

    /// Forgets the cached result of the last search.
    pub fn clear_last_search(&self) {
        *self.inner.last_search.lock() = None;
    }
}

impl<C, V> Inner<C, V>
where
    C: HttpClient,
    V: RasterVirtualizer,
{
    fn run(
        &self,
        request: SearchRequest,
        cancel: CancellationToken,
        progress: ProgressSink,
    ) -> TaskOutcome {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.execute(&request, &cancel, &progress)
        }))
        .unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            error!(error = %message, "Run panicked");
            TaskOutcome::Failed {
                error: PipelineError::Panicked(message),
                scenes: SceneSet::new(),
            }
        });

        *self.cancel.lock() = None;
        *self.state.lock() = outcome.state();
        info!(outcome = %outcome, "Run finished");
        progress.finished(outcome.clone());
        outcome
    }

    fn execute(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
        progress: &ProgressSink,
    ) -> TaskOutcome {
        let collection = self.config.registry.resolve(request.collection());
        info!(
            collection = %collection.id,
            start = %request.start(),
            end = %request.end(),
            "Starting run"
        );

        let cached = if self.config.reuse_last_search {
            self.last_search
                .lock()
                .as_ref()
                .filter(|last| last.request.same_search(request))
                .map(|last| (Arc::clone(&last.scenes), last.received))
        } else {
            None
        };
        let reused_search = cached.is_some();

        let (scenes, received) = match cached {
            Some((scenes, received)) => {
                info!(scenes = scenes.len(), "Search unchanged, reusing last result");
                progress.filter_summary(received, scenes.len());
                (scenes, received)
            }
            None => {
                let outcome = self.catalog.search(request, &collection, cancel, progress);
                match outcome.status {
                    SearchStatus::Complete => {}
                    SearchStatus::NoScenesFound => {
                        return TaskOutcome::NoScenesFound {
                            collection: collection.id.clone(),
                        }
                    }
                    SearchStatus::Cancelled => {
                        return TaskOutcome::Cancelled {
                            scenes: outcome.scenes,
                            results: Vec::new(),
                        }
                    }
                    SearchStatus::TimedOut { page, attempts } => {
                        return TaskOutcome::Failed {
                            error: PipelineError::Timeout { page, attempts },
                            scenes: outcome.scenes,
                        }
                    }
                    SearchStatus::Failed(e) => {
                        return TaskOutcome::Failed {
                            error: e.into(),
                            scenes: outcome.scenes,
                        }
                    }
                }

                let filtered = filter::filter(outcome.scenes, request.area());
                info!(
                    received = filtered.received,
                    filtered = filtered.filtered,
                    "Filtered scenes by footprint"
                );
                progress.filter_summary(filtered.received, filtered.filtered);
                if filtered.is_empty() {
                    return TaskOutcome::NoScenesAfterFilter {
                        received: filtered.received,
                    };
                }

                let scenes = Arc::new(filtered.scenes);
                *self.last_search.lock() = Some(LastSearch {
                    request: request.clone(),
                    scenes: Arc::clone(&scenes),
                    received: filtered.received,
                });
                (scenes, filtered.received)
            }
        };

        if cancel.is_cancelled() {
            return TaskOutcome::Cancelled {
                scenes: (*scenes).clone(),
                results: Vec::new(),
            };
        }

        let groups = mosaic::group(&scenes);
        info!(mosaics = groups.len(), resolution = ?request.resolution(), "Grouped scenes into mosaics");

        let layout = OutputLayout::new(&self.config.output_dir, request, &collection.id);
        let search_dir = layout.search_dir();
        if let Err(e) = fs::create_dir_all(&search_dir) {
            return TaskOutcome::Failed {
                error: PipelineError::output(search_dir, e),
                scenes: (*scenes).clone(),
            };
        }
        let footprints = layout.footprint_path();
        if let Err(e) = write_footprints(&footprints, &collection.id, &scenes) {
            return TaskOutcome::Failed {
                error: PipelineError::output(footprints, e),
                scenes: (*scenes).clone(),
            };
        }

        let builder = VirtualRasterBuilder::new(
            &self.virtualizer,
            &layout,
            &collection,
            request.resolution(),
        );
        let report = builder.build_all(&groups, cancel, progress);
        let failed = report.mosaics.iter().filter(|r| !r.is_success()).count();
        if failed > 0 {
            warn!(failed, "Some mosaics could not be built");
        }

        if report.cancelled {
            return TaskOutcome::Cancelled {
                scenes: (*scenes).clone(),
                results: report.mosaics,
            };
        }

        TaskOutcome::Completed(RunSummary {
            received,
            filtered: scenes.len(),
            mosaics: groups.len(),
            results: report.mosaics,
            scene_results: report.scenes,
            output_dir: search_dir,
            reused_search,
        })
    }
}

/// Handle to a started run.
pub struct TaskHandle {
    thread: JoinHandle<TaskOutcome>,
    cancel: CancellationToken,
}

impl TaskHandle {
    /// Requests cancellation of this run.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this run when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Blocks until the run ends.
    pub fn join(self) -> TaskOutcome {
        self.thread.join().unwrap_or_else(|payload| TaskOutcome::Failed {
            error: PipelineError::Panicked(panic_message(payload.as_ref())),
            scenes: SceneSet::new(),
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

//! Run orchestration.
//!
//! A run moves through four stages on a dedicated thread:
//!
//! 1. catalog search (paged, cancellable, one retry on timeout)
//! 2. footprint filtering
//! 3. mosaic grouping
//! 4. virtual raster building
//!
//! Progress is reported as [`TaskEvent`]s on an unbounded channel; the last
//! event of every run is [`TaskEvent::Finished`] carrying the [`TaskOutcome`].
//!
//! # Example
//!
//! ```no_run
//! use stacmosaic::catalog::{CatalogClient, CatalogConfig, SearchRequest};
//! use stacmosaic::executor::{ProgressSink, RunnerConfig, TaskEvent, TaskRunner};
//! use stacmosaic::geo::BoundingBox;
//! use stacmosaic::vrt::GdalBuildVrt;
//!
//! let catalog = CatalogClient::from_config(CatalogConfig::default()).unwrap();
//! let runner = TaskRunner::new(catalog, GdalBuildVrt::new(), RunnerConfig::new("/tmp/mosaics"));
//!
//! let area = BoundingBox::new(-48.0, -16.0, -47.0, -15.0).unwrap();
//! let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let end = chrono::NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
//! let request = SearchRequest::new("CB4-16D-2", start, end, area.into()).unwrap();
//!
//! let (sink, mut events) = ProgressSink::channel();
//! let handle = runner.start(request, sink).unwrap();
//! while let Some(event) = events.blocking_recv() {
//!     println!("{}", event);
//!     if matches!(event, TaskEvent::Finished(_)) {
//!         break;
//!     }
//! }
//! handle.join();
//! ```

mod outcome;
mod policy;
mod progress;
mod runner;

pub use outcome::{RunSummary, TaskOutcome};
pub use policy::{
    RetryPolicy, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_DELAY_SECS,
};
pub use progress::{ItemStatus, ProgressSink, TaskEvent};
pub use runner::{RunState, RunnerConfig, RunnerError, TaskHandle, TaskRunner};

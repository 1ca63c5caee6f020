//! Integration worker.
//!
//! ```text
//! period export → ReconciliationMapper → pending items → year-fallback fetch
//!               → hash dedup → DocumentSink → audit
//! ```

pub mod artifacts;
pub mod background;
pub mod error;
pub mod retrieval;
pub mod runner;
pub mod traits;
pub mod types;

pub use background::{start_scheduler, SchedulerHandle};
pub use error::ItemError;
pub use retrieval::{retrieve_with_fallback, YearFallback};
pub use runner::{IntegrationWorker, WorkerStores};
pub use traits::*;
pub use types::*;

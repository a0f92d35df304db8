//! Application use cases / business logic

pub mod coordinator;
pub mod dedup;
pub mod pipeline;
pub mod render;
pub mod schedule;

pub use coordinator::{RunCoordinator, RunState, StartOutcome, StartRunError, StopOutcome};
pub use dedup::DedupGate;
pub use pipeline::{Pipeline, RunError};
pub use render::{AssetCatalog, RenderConfig, Renderer, make_slug};
pub use schedule::{Scheduler, compute_next_run};

//! Persisted pipeline state and the stage orchestrator.

pub mod orchestrator;
pub mod state;

pub use orchestrator::{
    ConsoleReviewGate, PipelineOptions, PipelineOrchestrator, ReviewGate, StaticReviewGate,
};
pub use state::{PipelineState, StateError};

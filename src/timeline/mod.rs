//! Persisted timeline snapshots.

pub mod state;

pub use state::{CompositionState, DescriptorState, SourceState, TimelineState};

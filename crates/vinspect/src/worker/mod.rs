//! Worker: the queue loop that drives inspection job chains.

pub mod dispatch;

pub use dispatch::{start_inspection, AdvanceSignal, ChainWorker, WorkerHandle};

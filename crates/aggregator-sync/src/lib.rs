mod engine;
mod reconciler;
mod sink;
mod store;

pub use engine::AggregatorEngine;
pub use reconciler::{Cursor, GapReconciler, MAX_BACKFILL_BLOCKS};
pub use sink::{AcceptedBlock, BlockSink, CompositeSink, LogSink};
pub use store::{ChainStats, ChainStore};

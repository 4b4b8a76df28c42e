//! Trace-driven simulator of a four-processor, directory-based coherence
//! protocol on a unidirectional ring, with per-processor prefetch buffers.

pub mod address;
pub mod cache;
pub mod config;
pub mod directory;
pub mod ring;
pub mod simulator;
pub mod stats;
pub mod trace;
pub mod victim;

/// Simulated clock cycles.
pub type Cycles = u64;

pub use config::SimConfig;
pub use simulator::{SimulationContext, Simulator};
pub use stats::Summary;
pub use trace::TraceFile;

pub mod engine;
pub mod scenario_runner;
pub mod trace;

pub use engine::{DEFAULT_MAX_DURATION_MS, NodeId, SimulationError, Simulator};
pub use trace::{SimulationReport, TraceEntry};

use gbn_lab_abstract::{ArqEvent, LinkStats, SimConfig};
use serde::Serialize;

use crate::engine::NodeId;

/// One observed event, stamped with simulated time and the node it concerns.
#[derive(Debug, Clone, Serialize)]
pub struct TraceEntry {
    pub time: u64,
    pub node: NodeId,
    pub event: ArqEvent,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: SimConfig,
    pub duration_ms: u64,
    pub delivered_data: Vec<Vec<u8>>,
    pub sender_frame_count: u32,
    pub sender_stats: LinkStats,
    pub receiver_stats: LinkStats,
    pub sender_done: bool,
    pub trace: Vec<TraceEntry>,
}

impl SimulationReport {
    /// Everything the receiving application got, concatenated.
    pub fn delivered_bytes(&self) -> Vec<u8> {
        self.delivered_data.concat()
    }

    /// Events of one node, in order.
    pub fn events_of(&self, node: NodeId) -> impl Iterator<Item = &ArqEvent> {
        self.trace
            .iter()
            .filter(move |entry| entry.node == node)
            .map(|entry| &entry.event)
    }
}

use crate::trace::{SimulationReport, TraceEntry};
use gbn_lab_abstract::{ArqEvent, Frame, LinkContext, LinkProtocol, ProtocolError, SimConfig};
use gbn_lab_protocol::FaultInjector;
use rand::Rng;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Simulated time allowed to a run unless [`Simulator::set_max_duration`] says otherwise.
pub const DEFAULT_MAX_DURATION_MS: u64 = 60_000;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("simulation timed out after {ms} ms with the sender still busy")]
    TimedOut { ms: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeId {
    Sender,
    Receiver,
}

impl NodeId {
    pub fn peer(&self) -> Self {
        match self {
            NodeId::Sender => NodeId::Receiver,
            NodeId::Receiver => NodeId::Sender,
        }
    }
}

#[derive(Debug)]
pub enum EventType {
    FrameArrival {
        to: NodeId,
        frame: Frame,
    },
    TimerExpiry {
        node: NodeId,
        timer_id: u32,
        generation: u64,
    },
    AppSend {
        data: Vec<u8>,
    },
    AppClose,
}

#[derive(Debug)]
struct Event {
    time: u64,
    event_type: EventType,
    id: u64, // Unique ID to differentiate events at same time
}

// Custom Ord for Min-Heap (smallest time pops first)
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse comparison for time: smallest time is Greater in BinaryHeap
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

#[derive(Debug, Clone, Copy)]
enum TimerOp {
    Start { delay: u64, id: u32 },
    Cancel { id: u32 },
}

/// Requests buffered while one endpoint handles one event
#[derive(Default)]
struct ActionBuffer {
    outgoing_frames: Vec<Frame>,
    timer_ops: Vec<TimerOp>,
    delivered_data: Vec<Vec<u8>>,
    events: Vec<ArqEvent>,
}

/// Context handed to an endpoint for the duration of one callback
struct ScopedContext<'a> {
    buffer: &'a mut ActionBuffer,
    now: u64,
}

impl<'a> LinkContext for ScopedContext<'a> {
    fn send_frame(&mut self, frame: Frame) {
        self.buffer.outgoing_frames.push(frame);
    }

    fn start_timer(&mut self, delay_ms: u64, timer_id: u32) {
        self.buffer.timer_ops.push(TimerOp::Start {
            delay: delay_ms,
            id: timer_id,
        });
    }

    fn cancel_timer(&mut self, timer_id: u32) {
        self.buffer.timer_ops.push(TimerOp::Cancel { id: timer_id });
    }

    fn deliver_data(&mut self, data: &[u8]) {
        self.buffer.delivered_data.push(data.to_vec());
    }

    fn emit(&mut self, event: ArqEvent) {
        self.buffer.events.push(event);
    }

    fn now(&self) -> u64 {
        self.now
    }
}

/// Discrete-event simulation of one sender and one receiver joined by a
/// lossy, delaying channel.
pub struct Simulator {
    time: u64,
    event_queue: BinaryHeap<Event>,
    event_id_counter: u64,

    config: SimConfig,
    /// Latency draws; fault decisions use the injector's own source.
    rng: rand::rngs::StdRng,
    injector: FaultInjector,

    pub sender: Box<dyn LinkProtocol>,
    pub receiver: Box<dyn LinkProtocol>,

    pub delivered_data: Vec<Vec<u8>>,
    pub sender_frame_count: u32,

    /// Every protocol and channel event, in simulated-time order.
    pub trace: Vec<TraceEntry>,

    /// Timer generations to handle cancellation and replacement.
    /// Key: (node, timer_id), Value: generation counter
    timer_generations: HashMap<(NodeId, u32), u64>,

    /// Latest arrival scheduled towards each node. The channel is FIFO per
    /// direction: a frame never arrives before one sent earlier.
    last_arrival: HashMap<NodeId, u64>,

    max_duration: u64,
}

impl Simulator {
    /// `config` is expected to be validated by the caller.
    pub fn new(
        config: SimConfig,
        sender: Box<dyn LinkProtocol>,
        receiver: Box<dyn LinkProtocol>,
    ) -> Self {
        use rand::SeedableRng;
        let rng = rand::rngs::StdRng::seed_from_u64(config.faults.seed.wrapping_add(1));
        let injector = FaultInjector::new(config.faults.clone());

        Self {
            time: 0,
            event_queue: BinaryHeap::new(),
            event_id_counter: 0,
            config,
            rng,
            injector,
            sender,
            receiver,
            delivered_data: Vec::new(),
            sender_frame_count: 0,
            trace: Vec::new(),
            timer_generations: HashMap::new(),
            last_arrival: HashMap::new(),
            max_duration: DEFAULT_MAX_DURATION_MS,
        }
    }

    /// Simulated-time limit for [`Simulator::run_until_complete`].
    pub fn set_max_duration(&mut self, ms: u64) {
        self.max_duration = ms;
    }

    /// Register a deterministic fault: drop the first DATA frame whose seq equals `seq`.
    pub fn add_drop_data_seq_once(&mut self, seq: u32) {
        self.injector.script_drop_data(seq);
    }

    /// Register a deterministic fault: drop the first ACK whose ack number equals `ack`.
    pub fn add_drop_ack_once(&mut self, ack: u32) {
        self.injector.script_drop_ack(ack);
    }

    /// Register a deterministic fault: corrupt the first DATA frame whose seq equals `seq`.
    pub fn add_corrupt_data_seq_once(&mut self, seq: u32) {
        self.injector.script_corrupt_data(seq);
    }

    fn push_event(&mut self, time: u64, event_type: EventType) {
        self.event_queue.push(Event {
            time,
            event_type,
            id: self.event_id_counter,
        });
        self.event_id_counter += 1;
    }

    pub fn schedule_app_send(&mut self, time: u64, data: Vec<u8>) {
        self.push_event(time, EventType::AppSend { data });
    }

    pub fn schedule_app_close(&mut self, time: u64) {
        self.push_event(time, EventType::AppClose);
    }

    pub fn init(&mut self) {
        let mut buffer = ActionBuffer::default();
        let mut ctx = ScopedContext {
            buffer: &mut buffer,
            now: self.time,
        };
        self.sender.init(&mut ctx);
        self.process_actions(NodeId::Sender, buffer);

        let mut buffer = ActionBuffer::default();
        let mut ctx = ScopedContext {
            buffer: &mut buffer,
            now: self.time,
        };
        self.receiver.init(&mut ctx);
        self.process_actions(NodeId::Receiver, buffer);
    }

    pub fn current_time(&self) -> u64 {
        self.time
    }

    /// Process the next event. Returns `Ok(false)` once the queue is empty.
    pub fn step(&mut self) -> Result<bool, ProtocolError> {
        let event = match self.event_queue.pop() {
            Some(e) => e,
            None => return Ok(false),
        };

        self.time = event.time;
        debug!("Processing event at {}: {:?}", self.time, event.event_type);

        let mut buffer = ActionBuffer::default();
        let node = {
            let mut ctx = ScopedContext {
                buffer: &mut buffer,
                now: self.time,
            };
            match event.event_type {
                EventType::FrameArrival { to, frame } => {
                    match to {
                        NodeId::Sender => self.sender.on_frame(&mut ctx, frame)?,
                        NodeId::Receiver => self.receiver.on_frame(&mut ctx, frame)?,
                    }
                    to
                }
                EventType::TimerExpiry {
                    node,
                    timer_id,
                    generation,
                } => {
                    // A newer start or a cancel bumped the generation.
                    let current = self.timer_generations.get(&(node, timer_id)).copied();
                    if current != Some(generation) {
                        debug!("Skipping stale timer event for timer_id={}", timer_id);
                        return Ok(true);
                    }
                    match node {
                        NodeId::Sender => self.sender.on_timer(&mut ctx, timer_id),
                        NodeId::Receiver => self.receiver.on_timer(&mut ctx, timer_id),
                    }
                    node
                }
                EventType::AppSend { data } => {
                    self.sender.on_app_data(&mut ctx, &data);
                    NodeId::Sender
                }
                EventType::AppClose => {
                    self.sender.on_app_close(&mut ctx);
                    NodeId::Sender
                }
            }
        };
        self.process_actions(node, buffer);
        Ok(true)
    }

    /// Produce a serializable snapshot of the current simulation state.
    pub fn export_report(&self) -> SimulationReport {
        SimulationReport {
            config: self.config.clone(),
            duration_ms: self.time,
            delivered_data: self.delivered_data.clone(),
            sender_frame_count: self.sender_frame_count,
            sender_stats: self.sender.stats(),
            receiver_stats: self.receiver.stats(),
            sender_done: self.sender.is_done(),
            trace: self.trace.clone(),
        }
    }

    /// Run until the queue drains. Fails once simulated time passes the
    /// budget while the sender still has work.
    pub fn run_until_complete(&mut self) -> Result<(), SimulationError> {
        self.init();
        while self.step()? {
            if self.time > self.max_duration && !self.sender.is_done() {
                warn!(
                    "Giving up at {} ms: {} chunks delivered so far",
                    self.time,
                    self.delivered_data.len()
                );
                return Err(SimulationError::TimedOut {
                    ms: self.max_duration,
                });
            }
        }
        info!(
            "Simulation finished at {} ms: {} frames sent, {} chunks delivered",
            self.time,
            self.sender_frame_count,
            self.delivered_data.len()
        );
        Ok(())
    }

    fn record(&mut self, node: NodeId, event: ArqEvent) {
        debug!("[{:?}] {:?}", node, event);
        self.trace.push(TraceEntry {
            time: self.time,
            node,
            event,
        });
    }

    fn process_actions(&mut self, source_node: NodeId, buffer: ActionBuffer) {
        for event in buffer.events {
            self.record(source_node, event);
        }

        for data in buffer.delivered_data {
            info!("[{:?}] DELIVERED DATA: {} bytes", source_node, data.len());
            self.delivered_data.push(data);
        }

        // Every start or cancel bumps the generation, so a restart
        // invalidates the expiry that was already queued.
        for op in buffer.timer_ops {
            match op {
                TimerOp::Cancel { id } => {
                    *self.timer_generations.entry((source_node, id)).or_insert(0) += 1;
                }
                TimerOp::Start { delay, id } => {
                    let generation = self.timer_generations.entry((source_node, id)).or_insert(0);
                    *generation += 1;
                    let generation = *generation;
                    self.push_event(
                        self.time + delay,
                        EventType::TimerExpiry {
                            node: source_node,
                            timer_id: id,
                            generation,
                        },
                    );
                }
            }
        }

        // Channel
        for frame in buffer.outgoing_frames {
            if source_node == NodeId::Sender {
                self.sender_frame_count += 1;
            }

            let outcome = self.injector.apply(frame);
            if let Some(event) = outcome.event() {
                self.record(source_node, event);
            }
            let Some(frame) = outcome.into_delivered() else {
                continue;
            };

            let latency = self
                .rng
                .random_range(self.config.min_latency..=self.config.max_latency);
            let target_node = source_node.peer();
            let last = self.last_arrival.entry(target_node).or_insert(0);
            let arrival = (self.time + latency).max(*last);
            *last = arrival;
            debug!(
                "[{:?}->{:?}] seq={} kind={:?} latency={}ms",
                source_node,
                target_node,
                frame.seq(),
                frame.kind(),
                latency
            );

            self.push_event(
                arrival,
                EventType::FrameArrival {
                    to: target_node,
                    frame,
                },
            );
        }
    }
}

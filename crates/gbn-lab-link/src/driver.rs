//! Runs one protocol endpoint as an async task over a [`Channel`].
//!
//! The endpoint itself stays synchronous. Each callback writes its requests
//! into an [`Actions`] buffer; the driver then applies them: events are
//! logged, timers go into a deadline table, and outbound frames pass the
//! fault injector and the codec before they reach the channel.

use std::collections::HashMap;
use std::future::pending;
use std::time::Duration;

use gbn_lab_abstract::{
    ArqConfig, ArqEvent, FaultConfig, Frame, LinkContext, LinkProtocol, LinkStats, ProtocolError,
};
use gbn_lab_protocol::{FaultInjector, FrameCodec};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::channel::Channel;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("link task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("sender stopped with frames still unacknowledged")]
    Incomplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Role {
    Sender,
    Receiver,
}

/// An event stamped with the milliseconds elapsed since the driver started.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedEvent {
    pub elapsed_ms: u64,
    pub event: ArqEvent,
}

/// What one endpoint did over its lifetime.
#[derive(Debug, Clone, Serialize)]
pub struct LinkOutcome {
    pub role: Role,
    pub delivered: Vec<Vec<u8>>,
    pub events: Vec<TimedEvent>,
    pub stats: LinkStats,
    /// `is_done()` of the endpoint when the driver stopped.
    pub completed: bool,
}

#[derive(Debug, Clone, Copy)]
enum TimerOp {
    Start { delay: u64, id: u32 },
    Cancel { id: u32 },
}

#[derive(Default)]
struct Actions {
    outgoing: Vec<Frame>,
    timer_ops: Vec<TimerOp>,
    delivered: Vec<Vec<u8>>,
    events: Vec<ArqEvent>,
}

struct LiveContext<'a> {
    actions: &'a mut Actions,
    now: u64,
}

impl LinkContext for LiveContext<'_> {
    fn send_frame(&mut self, frame: Frame) {
        self.actions.outgoing.push(frame);
    }

    fn start_timer(&mut self, delay_ms: u64, timer_id: u32) {
        self.actions.timer_ops.push(TimerOp::Start {
            delay: delay_ms,
            id: timer_id,
        });
    }

    fn cancel_timer(&mut self, timer_id: u32) {
        self.actions.timer_ops.push(TimerOp::Cancel { id: timer_id });
    }

    fn deliver_data(&mut self, data: &[u8]) {
        self.actions.delivered.push(data.to_vec());
    }

    fn emit(&mut self, event: ArqEvent) {
        self.actions.events.push(event);
    }

    fn now(&self) -> u64 {
        self.now
    }
}

pub struct LinkDriver<C> {
    role: Role,
    protocol: Box<dyn LinkProtocol + Send>,
    channel: C,
    codec: FrameCodec,
    injector: FaultInjector,
    /// Application input; `None` once closed or for a receiving endpoint.
    app: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
    /// Armed timers. Inserting under a running id replaces its deadline.
    timers: HashMap<u32, Instant>,
    started: Instant,
    peer_gone: bool,
    delivered: Vec<Vec<u8>>,
    events: Vec<TimedEvent>,
}

impl<C: Channel> LinkDriver<C> {
    /// Driver over a perfect channel. Use [`LinkDriver::with_faults`] to
    /// make the outbound direction unreliable.
    pub fn new(
        role: Role,
        protocol: Box<dyn LinkProtocol + Send>,
        channel: C,
        config: &ArqConfig,
    ) -> Self {
        Self {
            role,
            protocol,
            channel,
            codec: FrameCodec::new(config),
            injector: FaultInjector::new(FaultConfig::lossless()),
            app: None,
            timers: HashMap::new(),
            started: Instant::now(),
            peer_gone: false,
            delivered: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Apply `injector` to every frame this endpoint sends.
    pub fn with_faults(mut self, injector: FaultInjector) -> Self {
        self.injector = injector;
        self
    }

    /// Feed application data from `app`; closing it closes the stream.
    pub fn with_app_input(mut self, app: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        self.app = Some(app);
        self
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Drive the endpoint until it is done or the peer goes away.
    pub async fn run(mut self) -> Result<LinkOutcome, LinkError> {
        self.started = Instant::now();
        self.dispatch(|protocol, ctx| {
            protocol.init(ctx);
            Ok(())
        })?;

        while !self.protocol.is_done() && !self.peer_gone {
            let deadline = self.timers.values().min().copied();
            let sleep = tokio::time::sleep_until(
                deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600)),
            );

            // Frames win ties, so overdue timers are also checked after each one.
            tokio::select! {
                biased;

                block = self.channel.receive() => {
                    let Some(block) = block else {
                        debug!("[{:?}] peer hung up", self.role);
                        break;
                    };
                    let frame = self.codec.decode(&block)?;
                    self.dispatch(|protocol, ctx| protocol.on_frame(ctx, frame))?;
                    if !self.protocol.is_done() {
                        self.fire_expired_timers()?;
                    }
                }

                _ = sleep, if deadline.is_some() => {
                    self.fire_expired_timers()?;
                }

                data = next_app_data(&mut self.app), if self.app.is_some() => {
                    match data {
                        Some(data) => {
                            self.dispatch(|protocol, ctx| {
                                protocol.on_app_data(ctx, &data);
                                Ok(())
                            })?;
                        }
                        None => {
                            self.app = None;
                            self.dispatch(|protocol, ctx| {
                                protocol.on_app_close(ctx);
                                Ok(())
                            })?;
                        }
                    }
                }
            }
        }

        let completed = self.protocol.is_done();
        info!(
            "[{:?}] stopped after {} ms (done: {})",
            self.role,
            self.elapsed_ms(),
            completed
        );
        Ok(LinkOutcome {
            role: self.role,
            delivered: self.delivered,
            events: self.events,
            stats: self.protocol.stats(),
            completed,
        })
    }

    fn fire_expired_timers(&mut self) -> Result<(), LinkError> {
        let now = Instant::now();
        let mut expired: Vec<u32> = self
            .timers
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        expired.sort_unstable();
        for id in expired {
            // An earlier expiry in this batch may have restarted or cancelled it.
            if self.timers.get(&id).is_none_or(|deadline| *deadline > now) {
                continue;
            }
            self.timers.remove(&id);
            self.dispatch(|protocol, ctx| {
                protocol.on_timer(ctx, id);
                Ok(())
            })?;
        }
        Ok(())
    }

    /// Run one endpoint callback and apply whatever it requested.
    fn dispatch<F>(&mut self, callback: F) -> Result<(), LinkError>
    where
        F: FnOnce(&mut (dyn LinkProtocol + Send), &mut dyn LinkContext) -> Result<(), ProtocolError>,
    {
        let mut actions = Actions::default();
        let mut ctx = LiveContext {
            actions: &mut actions,
            now: self.elapsed_ms(),
        };
        callback(self.protocol.as_mut(), &mut ctx)?;
        self.apply(actions);
        Ok(())
    }

    fn apply(&mut self, actions: Actions) {
        let elapsed_ms = self.elapsed_ms();
        for event in actions.events {
            self.record(elapsed_ms, event);
        }

        for data in actions.delivered {
            info!("[{:?}] DELIVERED DATA: {} bytes", self.role, data.len());
            self.delivered.push(data);
        }

        for op in actions.timer_ops {
            match op {
                TimerOp::Start { delay, id } => {
                    self.timers
                        .insert(id, Instant::now() + Duration::from_millis(delay));
                }
                TimerOp::Cancel { id } => {
                    self.timers.remove(&id);
                }
            }
        }

        for frame in actions.outgoing {
            let outcome = self.injector.apply(frame);
            if let Some(event) = outcome.event() {
                self.record(elapsed_ms, event);
            }
            let Some(frame) = outcome.into_delivered() else {
                continue;
            };
            if self.channel.send(self.codec.encode(&frame)).is_err() {
                debug!("[{:?}] peer closed, frame {} not sent", self.role, frame.seq());
                self.peer_gone = true;
                break;
            }
        }
    }

    fn record(&mut self, elapsed_ms: u64, event: ArqEvent) {
        debug!("[{:?}] {:?}", self.role, event);
        self.events.push(TimedEvent { elapsed_ms, event });
    }
}

async fn next_app_data(app: &mut Option<mpsc::UnboundedReceiver<Vec<u8>>>) -> Option<Vec<u8>> {
    match app {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}

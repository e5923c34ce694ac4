//! Background frame pump.
//!
//! The pump owns one [`FrameSource`], reads it on a fixed cadence from a
//! tokio task and forwards frames over a bounded channel. When the consumer
//! falls behind, new frames are dropped instead of queued, so whatever the
//! consumer reads next is recent.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use super::{Frame, FrameSource, DEFAULT_FRAME_INTERVAL};

/// Default number of frames buffered between pump and consumer.
const DEFAULT_CAPACITY: usize = 2;

/// What the pump tells its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum PumpEvent {
    /// A new frame.
    Frame(Frame),
    /// The source failed to open or read; the pump has stopped.
    Error(String),
    /// The source ran out of frames; the pump has stopped.
    Finished,
}

/// Counters reported when the pump exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Frames handed to the consumer.
    pub delivered: u64,
    /// Frames discarded because the consumer was behind.
    pub dropped: u64,
}

/// A cloneable handle to stop and observe a running pump.
#[derive(Debug, Clone)]
pub struct PumpHandle {
    running: Arc<AtomicBool>,
    stop_signal: Arc<AtomicBool>,
    stop_notify: Arc<Notify>,
    delivered: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
}

impl PumpHandle {
    fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            stop_signal: Arc::new(AtomicBool::new(false)),
            stop_notify: Arc::new(Notify::new()),
            delivered: Arc::new(AtomicU64::new(0)),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Ask the pump to stop after the current read.
    ///
    /// A pump blocked handing its final event to a full channel gives up on
    /// that event and exits.
    pub fn stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        self.stop_notify.notify_one();
    }

    /// Resolve once [`PumpHandle::stop`] has been called.
    async fn stopped(&self) {
        if self.should_stop() {
            return;
        }
        self.stop_notify.notified().await;
    }

    /// Check if the stop signal has been sent.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.stop_signal.load(Ordering::SeqCst)
    }

    /// Whether the pump task is still reading frames.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> PumpStats {
        PumpStats {
            delivered: self.delivered.load(Ordering::SeqCst),
            dropped: self.dropped.load(Ordering::SeqCst),
        }
    }
}

/// Polls a frame source on a background task.
pub struct FramePump {
    source: Box<dyn FrameSource>,
    frame_interval: Duration,
    capacity: usize,
    handle: PumpHandle,
}

impl std::fmt::Debug for FramePump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePump")
            .field("source", &self.source.name())
            .field("frame_interval", &self.frame_interval)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl FramePump {
    /// Create a pump for `source` with the default cadence.
    #[must_use]
    pub fn new(source: Box<dyn FrameSource>) -> Self {
        Self {
            source,
            frame_interval: DEFAULT_FRAME_INTERVAL,
            capacity: DEFAULT_CAPACITY,
            handle: PumpHandle::new(),
        }
    }

    /// Set the delay between reads.
    #[must_use]
    pub fn with_interval(mut self, frame_interval: Duration) -> Self {
        self.frame_interval = frame_interval;
        self
    }

    /// Set how many frames may wait for the consumer (at least one).
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// A handle for stopping the pump once started.
    #[must_use]
    pub fn handle(&self) -> PumpHandle {
        self.handle.clone()
    }

    /// Spawn the pump on the current tokio runtime.
    ///
    /// Returns the event receiver and the task, which resolves to the final
    /// counters once the source is closed.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn start(self) -> (mpsc::Receiver<PumpEvent>, JoinHandle<PumpStats>) {
        let (tx, rx) = mpsc::channel(self.capacity);
        let Self {
            mut source,
            frame_interval,
            handle,
            ..
        } = self;

        handle.running.store(true, Ordering::SeqCst);
        let task = tokio::spawn(async move {
            pump_frames(source.as_mut(), &tx, &handle, frame_interval).await
        });
        (rx, task)
    }
}

/// Read frames from `source` until stopped, exhausted, failed or abandoned.
///
/// The source is always closed before returning.
async fn pump_frames(
    source: &mut dyn FrameSource,
    tx: &mpsc::Sender<PumpEvent>,
    handle: &PumpHandle,
    frame_interval: Duration,
) -> PumpStats {
    handle.running.store(true, Ordering::SeqCst);

    if let Err(e) = source.open().await {
        warn!(source = source.name(), error = %e, "Frame source failed to open");
        send_final(tx, handle, PumpEvent::Error(e.to_string())).await;
        source.close().await;
        handle.running.store(false, Ordering::SeqCst);
        return handle.stats();
    }

    let (width, height) = source.resolution();
    info!(
        source = source.name(),
        width,
        height,
        interval_ms = frame_interval.as_millis(),
        "Frame pump started"
    );

    let mut ticker = interval(frame_interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    while !handle.should_stop() {
        ticker.tick().await;
        if handle.should_stop() {
            break;
        }

        match source.next_frame().await {
            Ok(Some(frame)) => {
                let sequence = frame.sequence;
                match tx.try_send(PumpEvent::Frame(frame)) {
                    Ok(()) => {
                        handle.delivered.fetch_add(1, Ordering::SeqCst);
                        trace!(sequence, "Frame delivered");
                    }
                    Err(TrySendError::Full(_)) => {
                        handle.dropped.fetch_add(1, Ordering::SeqCst);
                        trace!(sequence, "Consumer behind, frame dropped");
                    }
                    Err(TrySendError::Closed(_)) => {
                        debug!("Frame receiver dropped, stopping pump");
                        break;
                    }
                }
            }
            Ok(None) => {
                debug!(source = source.name(), "Frame source exhausted");
                send_final(tx, handle, PumpEvent::Finished).await;
                break;
            }
            Err(e) => {
                warn!(source = source.name(), error = %e, "Frame read failed");
                send_final(tx, handle, PumpEvent::Error(e.to_string())).await;
                break;
            }
        }
    }

    source.close().await;
    handle.running.store(false, Ordering::SeqCst);

    let stats = handle.stats();
    info!(
        source = source.name(),
        read = source.frame_count(),
        delivered = stats.delivered,
        dropped = stats.dropped,
        "Frame pump stopped"
    );
    stats
}

/// Deliver the last event unless the pump is stopped first.
///
/// Unlike frames, the final event waits for room in the channel, but only
/// until a stop is requested.
async fn send_final(tx: &mpsc::Sender<PumpEvent>, handle: &PumpHandle, event: PumpEvent) {
    tokio::select! {
        sent = tx.send(event) => {
            if sent.is_err() {
                debug!("Frame receiver dropped before final event");
            }
        }
        () = handle.stopped() => debug!("Pump stopped with final event undelivered"),
    }
}

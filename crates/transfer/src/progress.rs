use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info};

/// Receives byte-level progress for each transfer.
///
/// Purely observational: implementations must never influence the
/// transfer, and must tolerate concurrent transfers each holding their
/// own [`TransferProgress`] handle.
pub trait ProgressSink: Send + Sync {
    /// Called when a transfer of `total` bytes begins.
    fn on_start(&self, total: u64, label: &str) -> Box<dyn TransferProgress>;
}

/// Progress handle for one active transfer.
pub trait TransferProgress: Send {
    /// Cumulative bytes transferred so far.
    fn on_progress(&mut self, transferred: u64);

    /// The transfer finished, successfully or not.
    fn on_end(self: Box<Self>);
}

// ---------------------------------------------------------------------------
// NoProgress
// ---------------------------------------------------------------------------

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_start(&self, _total: u64, _label: &str) -> Box<dyn TransferProgress> {
        Box::new(NoProgress)
    }
}

impl TransferProgress for NoProgress {
    fn on_progress(&mut self, _transferred: u64) {}

    fn on_end(self: Box<Self>) {}
}

// ---------------------------------------------------------------------------
// LogProgress
// ---------------------------------------------------------------------------

/// Default interval between intermediate progress log lines.
const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(2);

/// Reports transfers through `tracing` with a throughput estimate.
#[derive(Debug, Clone)]
pub struct LogProgress {
    interval: Duration,
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new(None)
    }
}

impl LogProgress {
    /// If `interval` is `None`, defaults to 2 s.
    pub fn new(interval: Option<Duration>) -> Self {
        Self {
            interval: interval.unwrap_or(DEFAULT_LOG_INTERVAL),
        }
    }
}

impl ProgressSink for LogProgress {
    fn on_start(&self, total: u64, label: &str) -> Box<dyn TransferProgress> {
        debug!(file = %label, total, "transfer started");
        Box::new(LogHandle {
            label: label.to_string(),
            total,
            transferred: 0,
            interval: self.interval,
            last_logged: Instant::now(),
            speed: SpeedCalculator::new(None, None),
        })
    }
}

struct LogHandle {
    label: String,
    total: u64,
    transferred: u64,
    interval: Duration,
    last_logged: Instant,
    speed: SpeedCalculator,
}

impl TransferProgress for LogHandle {
    fn on_progress(&mut self, transferred: u64) {
        self.speed
            .add_sample(transferred.saturating_sub(self.transferred));
        self.transferred = transferred;

        if self.last_logged.elapsed() >= self.interval {
            self.last_logged = Instant::now();
            let eta = self
                .speed
                .eta(self.total.saturating_sub(transferred))
                .map(|d| d.as_secs());
            debug!(
                file = %self.label,
                transferred,
                total = self.total,
                bytes_per_sec = self.speed.bytes_per_second() as u64,
                eta_secs = ?eta,
                "transfer progress"
            );
        }
    }

    fn on_end(self: Box<Self>) {
        info!(file = %self.label, bytes = self.transferred, "transfer finished");
    }
}

// ---------------------------------------------------------------------------
// ChannelProgress
// ---------------------------------------------------------------------------

/// Progress event forwarded by [`ChannelProgress`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    Started { label: String, total: u64 },
    Progress { label: String, transferred: u64 },
    Finished { label: String },
}

/// Forwards events to an mpsc channel, dropping them when it is full.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::Sender<TransferEvent>,
}

impl ChannelProgress {
    pub fn new(tx: mpsc::Sender<TransferEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgress {
    fn on_start(&self, total: u64, label: &str) -> Box<dyn TransferProgress> {
        let _ = self.tx.try_send(TransferEvent::Started {
            label: label.to_string(),
            total,
        });
        Box::new(ChannelHandle {
            label: label.to_string(),
            tx: self.tx.clone(),
        })
    }
}

struct ChannelHandle {
    label: String,
    tx: mpsc::Sender<TransferEvent>,
}

impl TransferProgress for ChannelHandle {
    fn on_progress(&mut self, transferred: u64) {
        let _ = self.tx.try_send(TransferEvent::Progress {
            label: self.label.clone(),
            transferred,
        });
    }

    fn on_end(self: Box<Self>) {
        let _ = self.tx.try_send(TransferEvent::Finished { label: self.label });
    }
}

// ---------------------------------------------------------------------------
// SpeedCalculator
// ---------------------------------------------------------------------------

/// Calculates transfer speed over a sliding window of samples.
#[derive(Debug)]
pub struct SpeedCalculator {
    samples: VecDeque<(Instant, u64)>,
    max_samples: usize,
    window_size: Duration,
}

impl SpeedCalculator {
    /// - `window_size`: time window for speed calculation (default 5 s).
    /// - `max_samples`: maximum retained samples (default 100).
    pub fn new(window_size: Option<Duration>, max_samples: Option<usize>) -> Self {
        Self {
            samples: VecDeque::new(),
            max_samples: max_samples.unwrap_or(100),
            window_size: window_size.unwrap_or(Duration::from_secs(5)),
        }
    }

    /// Records `bytes` transferred at the current instant.
    pub fn add_sample(&mut self, bytes: u64) {
        self.add_sample_at(Instant::now(), bytes);
    }

    fn add_sample_at(&mut self, now: Instant, bytes: u64) {
        self.samples.push_back((now, bytes));

        while let Some(&(at, _)) = self.samples.front() {
            if now.duration_since(at) > self.window_size || self.samples.len() > self.max_samples
            {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Average bytes/second within the window; 0.0 with fewer than 2 samples.
    pub fn bytes_per_second(&self) -> f64 {
        let (Some(first), Some(last)) = (self.samples.front(), self.samples.back()) else {
            return 0.0;
        };
        if self.samples.len() < 2 {
            return 0.0;
        }
        let elapsed = last.0.duration_since(first.0);
        if elapsed.is_zero() {
            return 0.0;
        }
        // The first sample's bytes predate the measured interval.
        let total: u64 = self.samples.iter().skip(1).map(|(_, b)| b).sum();
        total as f64 / elapsed.as_secs_f64()
    }

    /// Estimated time to move `remaining_bytes`; `None` while speed is zero.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining_bytes as f64 / speed))
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }
}

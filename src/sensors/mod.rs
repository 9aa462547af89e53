//! Sensor readers: GNSS receiver, SEAKER acoustic unit, depth sounder
//!
//! Each reader is a [`SentenceReader`] around a sensor-specific
//! [`SentenceHandler`] that folds decoded sentences into a state record.

pub mod gnss;
pub mod acoustic;
pub mod depth;

pub use gnss::{GnssFixBuilder, GnssReader};
pub use acoustic::{tat_accepted, AcousticParser, AcousticReader};
pub use depth::{DepthParser, DepthReader};

use crate::hardware::{ByteSource, RecoveryStrategy};
use crate::processing::sentence::{drain, DecoderStats, LineBuffer, SentenceHandler};
use log::{debug, warn};

/// Bytes decoded per poll unless configured otherwise; covers a
/// 115200 baud receiver polled every 100 ms with room to spare
pub const DEFAULT_POLL_BUDGET: usize = 4096;

/// Non-blocking line reader feeding one handler.
///
/// A poll decodes only bytes that are already available; a partial line
/// waits in the carry-over buffer for the next poll.
pub struct SentenceReader<H> {
    name: &'static str,
    handler: H,
    lines: LineBuffer,
    budget: usize,
    stats: DecoderStats,
    retry_at_ms: Option<u64>,
}

impl<H: SentenceHandler> SentenceReader<H> {
    pub fn new(name: &'static str, handler: H) -> Self {
        Self {
            name,
            handler,
            lines: LineBuffer::new(),
            budget: DEFAULT_POLL_BUDGET,
            stats: DecoderStats::default(),
            retry_at_ms: None,
        }
    }

    /// Limit the bytes decoded per poll
    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = budget.max(1);
        self
    }

    /// Decode whatever the source has ready, up to the budget; returns
    /// this poll's counters
    pub fn poll(&mut self, source: &mut dyn ByteSource, now_ms: u64) -> DecoderStats {
        let mut stats = DecoderStats::default();
        loop {
            let refilled = self.refill(source, now_ms);
            let remaining = self.budget - stats.bytes as usize;
            let pass = drain(source, &mut self.lines, &mut self.handler, remaining, now_ms);
            stats.merge(pass);
            if !refilled || pass.bytes == 0 || stats.bytes as usize >= self.budget {
                break;
            }
        }
        self.stats.merge(stats);
        stats
    }

    /// Pull pending transport bytes; false while backing off or on error
    fn refill(&mut self, source: &mut dyn ByteSource, now_ms: u64) -> bool {
        if matches!(self.retry_at_ms, Some(at) if now_ms < at) {
            return false;
        }
        self.retry_at_ms = None;

        let Err(e) = source.refill() else { return true };
        match e.recovery_strategy() {
            RecoveryStrategy::RetryWithDelay { delay_ms } => {
                debug!("{}: {}, retrying in {} ms", self.name, e, delay_ms);
                self.retry_at_ms = Some(now_ms + u64::from(delay_ms));
            }
            RecoveryStrategy::Retry => debug!("{}: {}", self.name, e),
            RecoveryStrategy::Skip => warn!("{}: {}", self.name, e),
        }
        false
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Lifetime decoder counters
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Drop a partially received line
    pub fn discard_partial(&mut self) {
        self.lines.clear();
    }
}

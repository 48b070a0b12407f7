//! Update sink: the single writer of the link region.
//!
//! Every connection funnels its messages through one [`UpdateSink`]. The
//! sink's mutex covers the whole encode-then-write step, so two clients can
//! never interleave bytes in the record and no tick is ever lost.
//!
//! When the region is missing the sink stays usable in no-op mode and, if a
//! relink interval is configured, tries to acquire the region again on a
//! later `apply` once the interval has elapsed.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::link::record::TICK_OFFSET;
use crate::link::{open_region, LinkLocation, LinkRegion, PositionMessage, RecordEncoder};
use crate::{BridgeError, Result};

/// Outcome of a single [`UpdateSink::try_apply`] call.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ApplyOutcome {
    /// The record was written and flushed with this tick.
    Written(u32),
    /// No region is attached; the update was dropped.
    Detached,
}

struct SinkState {
    region: Option<Box<dyn LinkRegion>>,
    tick: u32,
    last_attempt: Option<Instant>,
}

/// Serialized encoder + region pair.
pub struct UpdateSink {
    encoder: RecordEncoder,
    location: Option<LinkLocation>,
    relink_interval: Option<Duration>,
    state: Mutex<SinkState>,
}

impl std::fmt::Debug for UpdateSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateSink")
            .field("location", &self.location)
            .field("relink_interval", &self.relink_interval)
            .field("linked", &self.is_linked())
            .finish_non_exhaustive()
    }
}

impl UpdateSink {
    /// Open the region at `location`, falling back to no-op mode.
    ///
    /// A missing region is logged as a warning, never returned as an error.
    #[must_use]
    pub fn open(
        location: LinkLocation,
        encoder: RecordEncoder,
        relink_interval: Option<Duration>,
    ) -> Self {
        let sink = Self {
            encoder,
            location: Some(location),
            relink_interval,
            state: Mutex::new(SinkState {
                region: None,
                tick: 0,
                last_attempt: None,
            }),
        };

        {
            let mut state = sink.lock();
            sink.attach(&mut state);
        }

        sink
    }

    /// Wrap an already-open region. No relinking is ever attempted.
    #[must_use]
    pub fn with_region(region: Box<dyn LinkRegion>, encoder: RecordEncoder) -> Self {
        let tick = read_tick(region.as_ref());
        info!(location = %region.location(), tick, "link region attached");
        Self {
            encoder,
            location: None,
            relink_interval: None,
            state: Mutex::new(SinkState {
                region: Some(region),
                tick,
                last_attempt: None,
            }),
        }
    }

    /// Whether a region is currently attached.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.lock().region.is_some()
    }

    /// Tick of the last record written (or seeded from the region).
    #[must_use]
    pub fn tick(&self) -> u32 {
        self.lock().tick
    }

    /// Encode and write `message`, logging instead of returning errors.
    pub fn apply(&self, message: &PositionMessage) {
        match self.try_apply(message) {
            Ok(ApplyOutcome::Written(tick)) => {
                debug!(name = message.display_name(), tick, "link record updated");
            }
            Ok(ApplyOutcome::Detached) => {
                debug!("link region not attached; update dropped");
            }
            Err(err) => {
                error!(%err, "failed to update link record");
            }
        }
    }

    /// Encode and write `message`.
    ///
    /// The tick advances as soon as the record bytes reach the region, even
    /// if the following flush fails: the consumer may already see them.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Region` if writing or flushing fails. The
    /// region stays attached for the next update.
    pub fn try_apply(&self, message: &PositionMessage) -> Result<ApplyOutcome> {
        let mut state = self.lock();

        if state.region.is_none() && self.relink_due(&state) {
            self.attach(&mut state);
        }

        let previous_tick = state.tick;
        let Some(region) = state.region.as_mut() else {
            return Ok(ApplyOutcome::Detached);
        };

        let (record, tick) = self.encoder.encode(message, previous_tick);
        region.write_at(0, record.as_bytes())?;
        let flushed = region.flush();
        state.tick = tick;
        flushed?;

        Ok(ApplyOutcome::Written(tick))
    }

    /// Release the region. Later updates are dropped and never relink.
    pub fn close(&self) {
        let mut state = self.lock();
        if let Some(region) = state.region.take() {
            info!(location = %region.location(), "link region released");
        }
        state.last_attempt = None;
        drop(state);
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn relink_due(&self, state: &SinkState) -> bool {
        let Some(interval) = self.relink_interval else {
            return false;
        };
        state
            .last_attempt
            .is_some_and(|last| last.elapsed() >= interval)
    }

    fn attach(&self, state: &mut SinkState) {
        let Some(ref location) = self.location else {
            return;
        };
        state.last_attempt = Some(Instant::now());

        match open_region(location) {
            Ok(region) => {
                let tick = read_tick(region.as_ref());
                info!(%location, tick, "link region attached");
                state.tick = tick;
                state.region = Some(region);
            }
            Err(BridgeError::NotFound(msg)) => {
                warn!(
                    %location,
                    reason = %msg,
                    "Mumble Link not found; make sure Mumble is running with the Link plugin enabled"
                );
            }
            Err(err) => {
                error!(%location, %err, "failed to open link region");
            }
        }
    }
}

fn read_tick(region: &dyn LinkRegion) -> u32 {
    let mut raw = [0u8; 4];
    match region.read_at(TICK_OFFSET, &mut raw) {
        Ok(()) => u32::from_le_bytes(raw),
        Err(err) => {
            warn!(%err, "could not read existing tick; starting at zero");
            0
        }
    }
}

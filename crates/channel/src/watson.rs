//! Sampling-gated crash report channel.
//!
//! Bounds the volume and cost of expensive crash/fault reporting under
//! fault storms. Sample percent, the lifetime report budget and the
//! minimum spacing between reports are channel defaults, each overridable
//! per event through reserved properties for diagnostics and testing.
//!
//! The throttle state is process-wide, not per channel instance: every
//! [`WatsonReporter`] in the process shares the same counters, so the
//! budget bounds total reporting volume across the whole process.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use beacon_events::{reserved, FaultEvent, TelemetryEvent};

use crate::channel::TelemetryChannel;
use crate::error::Result;
use crate::lifecycle::Lifecycle;
use crate::properties::ChannelProperties;

/// Process-wide throttle state shared by every crash report channel.
///
/// Lifetime is the process lifetime; counters reset only at process
/// start. Injected explicitly into each channel instance rather than
/// accessed as a hidden global - [`WatsonThrottle::process`] is the
/// conventional source.
#[derive(Debug, Default)]
pub struct WatsonThrottle {
    /// Reports accepted in this process so far
    reports_this_session: AtomicU32,
    /// Unix milliseconds of the last accepted report, 0 = never
    last_report_unix_ms: AtomicU64,
}

impl WatsonThrottle {
    /// Fresh throttle state (for tests and explicit injection).
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide instance, initialized once at first use.
    pub fn process() -> Arc<WatsonThrottle> {
        static PROCESS: OnceLock<Arc<WatsonThrottle>> = OnceLock::new();
        Arc::clone(PROCESS.get_or_init(|| Arc::new(WatsonThrottle::new())))
    }

    /// Reports accepted so far in this process.
    pub fn reports_this_session(&self) -> u32 {
        self.reports_this_session.load(Ordering::Acquire)
    }

    /// Try to take one unit of report budget.
    ///
    /// Succeeds only when fewer than `max_reports` have been taken in this
    /// process and at least `min_interval` has passed since the last
    /// accepted report. Both checks use compare-and-swap so the budget is
    /// a hard bound under concurrency.
    pub fn try_take_report(&self, max_reports: u32, min_interval: Duration, now_ms: u64) -> bool {
        let min_ms = min_interval.as_millis() as u64;
        loop {
            // The budget is the hard bound: it only ever increments on the
            // CAS below, so no more than max_reports can succeed.
            let taken = self.reports_this_session.load(Ordering::Acquire);
            if taken >= max_reports {
                return false;
            }

            let last = self.last_report_unix_ms.load(Ordering::Acquire);
            if last != 0 && now_ms.saturating_sub(last) < min_ms {
                return false;
            }

            if self
                .reports_this_session
                .compare_exchange(taken, taken + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.last_report_unix_ms.store(now_ms, Ordering::Release);
                return true;
            }
        }
    }
}

/// Configuration for the crash report channel.
#[derive(Debug, Clone)]
pub struct WatsonConfig {
    /// Default sample percent, 0-100
    pub sample_percent: u8,
    /// Default maximum reports for the process lifetime
    pub max_reports: u32,
    /// Default minimum spacing between two reports
    pub min_interval: Duration,
}

impl Default for WatsonConfig {
    fn default() -> Self {
        Self {
            sample_percent: 10,
            max_reports: 10,
            min_interval: Duration::from_secs(600),
        }
    }
}

/// The sampling-gated crash report channel.
///
/// Regular telemetry events pass through untouched; the interesting
/// surface is [`WatsonReporter::evaluate_fault`], which stamps the Watson
/// inclusion decision onto a [`FaultEvent`].
pub struct WatsonReporter {
    config: WatsonConfig,
    throttle: Arc<WatsonThrottle>,
    /// Telemetry opt-in flag shared with the owning session
    opted_in: Arc<AtomicBool>,
    lifecycle: Lifecycle,
}

impl WatsonReporter {
    /// Stable id of the crash report channel.
    pub const CHANNEL_ID: &'static str = "watson";

    /// Create a reporter bound to the given throttle and opt-in flag.
    pub fn new(config: WatsonConfig, throttle: Arc<WatsonThrottle>, opted_in: Arc<AtomicBool>) -> Self {
        Self {
            config,
            throttle,
            opted_in,
            lifecycle: Lifecycle::new(),
        }
    }

    /// Evaluate the Watson inclusion decision for a fault event.
    ///
    /// Idempotent: a pre-existing decision is respected and only its
    /// provenance recorded. Skips entirely - no draw, no counters - when
    /// the session is not opted into telemetry collection.
    pub fn evaluate_fault(&self, fault: &mut FaultEvent) -> Result<()> {
        self.lifecycle.require_started()?;

        if !self.opted_in.load(Ordering::Acquire) {
            trace!(channel = Self::CHANNEL_ID, "session not opted in, fault skipped");
            return Ok(());
        }

        if fault.is_included_in_watson_sample().is_some() {
            fault.record_sample_decision(true, "preset");
            return Ok(());
        }

        let event = fault.event();
        let percent = reserved_u32(event, reserved::WATSON_SAMPLE_PERCENT)
            .map(|v| v.min(100) as u8)
            .unwrap_or(self.config.sample_percent);
        let max_reports =
            reserved_u32(event, reserved::WATSON_MAX_REPORTS).unwrap_or(self.config.max_reports);
        let min_interval = reserved_u32(event, reserved::WATSON_MIN_SECONDS)
            .map(|s| Duration::from_secs(s as u64))
            .unwrap_or(self.config.min_interval);

        let draw: u8 = rand::thread_rng().gen_range(0..100);
        let sampled_in = draw < percent;

        if !sampled_in {
            fault.record_sample_decision(false, "sampled");
            return Ok(());
        }

        // A positive draw still needs budget; exhaustion forces exclusion.
        let now_ms = unix_millis();
        if self.throttle.try_take_report(max_reports, min_interval, now_ms) {
            fault.record_sample_decision(true, "sampled");
        } else {
            fault.record_sample_decision(false, "budget");
        }

        debug!(
            channel = Self::CHANNEL_ID,
            included = fault.is_included_in_watson_sample(),
            reports = self.throttle.reports_this_session(),
            "watson decision recorded"
        );
        Ok(())
    }
}

#[async_trait]
impl TelemetryChannel for WatsonReporter {
    fn channel_id(&self) -> &str {
        Self::CHANNEL_ID
    }

    fn properties(&self) -> ChannelProperties {
        ChannelProperties::DEFAULT
    }

    fn is_started(&self) -> bool {
        self.lifecycle.is_started()
    }

    fn start(&self, session_id: &str) -> Result<()> {
        self.lifecycle.begin_start()?;
        debug!(channel = Self::CHANNEL_ID, session_id, "watson reporter started");
        Ok(())
    }

    fn post_event(&self, event: Arc<TelemetryEvent>) -> Result<()> {
        // Only fault events concern this channel; the plain stream is
        // ignored but still bound by the lifecycle contract.
        self.lifecycle.require_started()?;
        trace!(channel = Self::CHANNEL_ID, event = event.name(), "non-fault event ignored");
        Ok(())
    }

    async fn dispose_and_transmit(&self, _token: CancellationToken) -> Result<()> {
        self.lifecycle.mark_disposed();
        Ok(())
    }
}

/// Reserved property interpreted as a non-negative u32.
fn reserved_u32(event: &TelemetryEvent, key: &str) -> Option<u32> {
    event
        .reserved_integer(key)
        .and_then(|v| u32::try_from(v).ok())
}

/// Current wall clock as unix milliseconds.
fn unix_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "watson_test.rs"]
mod watson_test;

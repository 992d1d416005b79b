//! Null output: discards samples at the real playback rate
//!
//! Each submission blocks for as long as the hardware would take to play it,
//! so the pump runs at the same cadence as on a device. Useful for headless
//! runs and for exercising the driver without audio hardware.

use crate::audio::platform::{OutputChannel, Platform, PlatformError};
use crate::audio::types::PanVolume;
use mvoc_common::NativeFormat;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Platform whose channels play into nothing
#[derive(Debug, Default)]
pub struct NullPlatform {
    submissions: Arc<AtomicU64>,
}

impl NullPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submissions accepted across all channels reserved from this platform
    pub fn submissions(&self) -> u64 {
        self.submissions.load(Ordering::Relaxed)
    }
}

impl Platform for NullPlatform {
    fn reserve_channel(
        &self,
        frames: usize,
        format: NativeFormat,
    ) -> Result<Arc<dyn OutputChannel>, PlatformError> {
        if frames == 0 {
            return Err(PlatformError::new("zero-length submission unit"));
        }
        let period = Duration::from_nanos(format.frames_to_nanos(frames));
        debug!(frames, ?period, "Reserved null output channel");
        Ok(Arc::new(NullChannel {
            period,
            samples_per_unit: format.samples_per(frames),
            next_deadline: Mutex::new(None),
            submissions: Arc::clone(&self.submissions),
        }))
    }
}

struct NullChannel {
    period: Duration,
    samples_per_unit: usize,
    next_deadline: Mutex<Option<Instant>>,
    submissions: Arc<AtomicU64>,
}

impl OutputChannel for NullChannel {
    fn output_blocking(&self, _volume: PanVolume, samples: &[i16]) {
        debug_assert_eq!(samples.len(), self.samples_per_unit);

        // Deadlines advance by whole periods so sleep jitter does not accumulate
        let deadline = {
            let mut next = self
                .next_deadline
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let now = Instant::now();
            let deadline = match *next {
                Some(d) if d + self.period > now => d + self.period,
                _ => now + self.period,
            };
            *next = Some(deadline);
            deadline
        };

        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
        self.submissions.fetch_add(1, Ordering::Relaxed);
    }
}

impl Drop for NullChannel {
    fn drop(&mut self) {
        debug!("Released null output channel");
    }
}

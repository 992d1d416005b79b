//! PCM output driver lifecycle
//!
//! One [`PcmDriver`] owns every resource the output path needs: the hardware
//! channel, the mix lock, the output pump, the volume pair, and the error
//! latch. The mixing engine drives it through an explicit lifecycle:
//!
//! ```text
//!   Uninitialized ──init──> Initialized ──begin_playback──> Playing
//!        ^                      ^    <──stop_playback──        │
//!        └──────────────── shutdown (from any state) ──────────┘
//! ```
//!
//! Dropping the driver shuts it down.

use crate::audio::platform::{OutputChannel, Platform};
use crate::audio::types::{PanVolume, SharedVolume};
use crate::error::{Error, ErrorCode, ErrorLatch, Result};
use crate::playback::guard::{HoldInterval, Holder, MixGuard};
use crate::playback::pump::OutputPump;
use crate::playback::ring::{DivisionSource, MixBuffer, MixState, RingConsumer, SharedMix};
use mvoc_common::{NativeFormat, OutputParams};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Uninitialized,
    Initialized,
    Playing,
}

impl std::fmt::Display for DriverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initialized => write!(f, "initialized"),
            Self::Playing => write!(f, "playing"),
        }
    }
}

/// Resources held between init and shutdown
struct Acquired {
    channel: Arc<dyn OutputChannel>,
    shared: Arc<SharedMix>,
}

/// Real-time PCM output driver
pub struct PcmDriver {
    platform: Arc<dyn Platform>,
    params: OutputParams,
    acquired: Option<Acquired>,
    pump: Option<OutputPump>,
    volume: Arc<SharedVolume>,
    latch: ErrorLatch,
    trace_guard: bool,
}

impl PcmDriver {
    /// Create an uninitialized driver with default parameters
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self::build(platform, OutputParams::default())
    }

    /// Create an uninitialized driver with custom parameters
    ///
    /// # Errors
    /// `Config` if any parameter is out of range
    pub fn with_params(platform: Arc<dyn Platform>, params: OutputParams) -> Result<Self> {
        params.validate()?;
        Ok(Self::build(platform, params))
    }

    fn build(platform: Arc<dyn Platform>, params: OutputParams) -> Self {
        let volume = PanVolume::clamped(params.volume_left, params.volume_right);
        Self {
            platform,
            params,
            acquired: None,
            pump: None,
            volume: Arc::new(SharedVolume::new(volume)),
            latch: ErrorLatch::new(),
            trace_guard: false,
        }
    }

    pub fn params(&self) -> &OutputParams {
        &self.params
    }

    pub fn state(&self) -> DriverState {
        match (&self.acquired, &self.pump) {
            (None, _) => DriverState::Uninitialized,
            (Some(_), None) => DriverState::Initialized,
            (Some(_), Some(_)) => DriverState::Playing,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.acquired.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.pump.is_some()
    }

    /// Acquire the hardware channel and create the mix lock
    ///
    /// The device plays one fixed format. `sample_rate` and `channels` carry
    /// the caller's request in and the format actually used out. An already
    /// initialized driver is shut down first.
    ///
    /// # Errors
    /// - `ChannelReserve` if no hardware channel could be reserved
    /// - `SemaphoreCreate` if the mix lock could not be created
    ///
    /// On error the driver is left uninitialized with nothing held.
    pub fn init(&mut self, sample_rate: &mut u32, channels: &mut u16) -> Result<()> {
        if self.is_initialized() {
            debug!("Re-initializing output driver");
            self.shutdown();
        }

        let format = NativeFormat::native();
        if *sample_rate != format.sample_rate || *channels != format.channels {
            warn!(
                "Requested {} Hz x{} normalized to native {} Hz x{}",
                sample_rate, channels, format.sample_rate, format.channels
            );
        }
        *sample_rate = format.sample_rate;
        *channels = format.channels;

        let channel = self
            .platform
            .reserve_channel(self.params.frames_per_submission, format)
            .map_err(|e| {
                error!("Failed to reserve output channel: {}", e);
                self.latch.record(Error::ChannelReserve(e.to_string()))
            })?;

        // The reserved channel is released on drop if this fails
        let shared = self
            .platform
            .create_guard(self.trace_guard)
            .map_err(|e| {
                error!("Failed to create mix guard: {}", e);
                self.latch.record(Error::SemaphoreCreate(e.to_string()))
            })?;

        self.acquired = Some(Acquired {
            channel,
            shared: Arc::new(shared),
        });

        info!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            frames = self.params.frames_per_submission,
            "Output driver initialized"
        );
        Ok(())
    }

    /// Stop playback and release every resource
    ///
    /// Idempotent; a no-op on an uninitialized driver.
    pub fn shutdown(&mut self) {
        if !self.is_initialized() {
            return;
        }

        if let Some(pump) = self.pump.take() {
            pump.stop();
        }

        // Drops the mix lock (with any installed buffer) and releases the channel
        self.acquired = None;
        info!("Output driver shut down");
    }

    /// Start continuous playback of `buffer`
    ///
    /// Division 0 must already hold the first samples. `source` is called each
    /// time a division is drained to refill its successor. Playing drivers are
    /// stopped first. On success the read cursor is at division 0, offset 0.
    ///
    /// # Errors
    /// - `NotInitialized` before a successful `init`
    /// - `ThreadCreate` / `ThreadStart` if the pump could not be started
    ///
    /// Failure leaves the driver initialized and not playing; `buffer` and
    /// `source` are dropped.
    pub fn begin_playback<S>(&mut self, buffer: MixBuffer, source: S) -> Result<()>
    where
        S: DivisionSource + 'static,
    {
        let Some(acquired) = &self.acquired else {
            return Err(self.latch.record(Error::NotInitialized));
        };
        let shared = Arc::clone(&acquired.shared);
        let channel = Arc::clone(&acquired.channel);

        if self.is_playing() {
            self.stop_playback();
        }

        debug!(
            division_size = buffer.division_size(),
            division_count = buffer.division_count(),
            "Installing mix buffer"
        );
        shared
            .acquire(Holder::Collaborator)
            .install(RingConsumer::new(buffer, Box::new(source)));

        match OutputPump::start(
            self.platform.as_ref(),
            &self.params,
            Arc::clone(&shared),
            channel,
            Arc::clone(&self.volume),
        ) {
            Ok(pump) => {
                self.pump = Some(pump);
                info!("Playback started");
                Ok(())
            }
            Err(e) => {
                shared.acquire(Holder::Collaborator).take();
                error!("Failed to start playback: {}", e);
                Err(self.latch.record(e))
            }
        }
    }

    /// Stop the pump and hand the mix buffer back
    ///
    /// Blocks for up to one submission period. Returns `None` (and does
    /// nothing) when not playing.
    pub fn stop_playback(&mut self) -> Option<MixBuffer> {
        let pump = self.pump.take()?;
        pump.stop();

        let ring = self
            .acquired
            .as_ref()
            .and_then(|acquired| acquired.shared.acquire(Holder::Collaborator).take());
        info!("Playback stopped");
        ring.map(RingConsumer::into_buffer)
    }

    /// Lock the mix buffer for in-place writes
    ///
    /// Blocks while the pump is copying. The returned guard dereferences to
    /// [`MixState`]; dropping it (or calling `unlock`) releases the lock.
    /// The guard must not be held across another `lock` call on the same
    /// thread.
    ///
    /// # Errors
    /// `NotInitialized` before a successful `init`
    pub fn lock(&self) -> Result<MixGuard<'_, MixState>> {
        match &self.acquired {
            Some(acquired) => Ok(acquired.shared.acquire(Holder::Collaborator)),
            None => Err(self.latch.record(Error::NotInitialized)),
        }
    }

    /// Lock the mix buffer only if the pump is not holding it
    ///
    /// # Errors
    /// `NotInitialized` before a successful `init`
    pub fn try_lock(&self) -> Result<Option<MixGuard<'_, MixState>>> {
        match &self.acquired {
            Some(acquired) => Ok(acquired.shared.try_acquire(Holder::Collaborator)),
            None => Err(self.latch.record(Error::NotInitialized)),
        }
    }

    /// Set the panned output volume, clamped to `[0, VOLUME_MAX]`
    ///
    /// Takes effect from the next hardware submission.
    pub fn set_volume(&self, left: u32, right: u32) {
        let volume = PanVolume::clamped(left, right);
        self.volume.store(volume);
        debug!(left = volume.left, right = volume.right, "Volume set");
    }

    pub fn volume(&self) -> PanVolume {
        self.volume.load()
    }

    /// Hardware submissions made by the current pump
    pub fn submissions(&self) -> u64 {
        self.pump.as_ref().map_or(0, OutputPump::submissions)
    }

    /// Most recent failure code
    pub fn last_error(&self) -> ErrorCode {
        self.latch.get()
    }

    /// Human-readable text for `code`
    ///
    /// `Warning` and `GenericError` describe the latched code.
    pub fn error_string(&self, code: ErrorCode) -> &'static str {
        self.latch.describe(code)
    }

    /// Record mix lock hold intervals from the next `init` on
    pub fn enable_guard_trace(&mut self) {
        self.trace_guard = true;
    }

    /// Hold intervals recorded by the current mix lock
    pub fn guard_trace(&self) -> Vec<HoldInterval> {
        self.acquired
            .as_ref()
            .map(|acquired| acquired.shared.hold_intervals())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for PcmDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcmDriver")
            .field("state", &self.state())
            .field("params", &self.params)
            .field("volume", &self.volume.load())
            .field("last_error", &self.latch.get())
            .finish()
    }
}

impl Drop for PcmDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

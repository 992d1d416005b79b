//! Shared test utilities for mvoc-out integration tests
//!
//! Provides a recording platform with fault injection:
//! - Failures at each acquisition step (channel, guard, thread create, thread start)
//! - Capture of the first submissions made to the hardware channel
//! - Reserve/release accounting to check nothing leaks

#![allow(dead_code)]

use mvoc_common::format::NATIVE_CHANNELS;
use mvoc_common::{NativeFormat, OutputParams};
use mvoc_out::audio::{OutputChannel, PanVolume, Platform, PlatformError};
use mvoc_out::playback::{MixLock, MixState, SharedMix};
use mvoc_out::PcmDriver;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Frames per submission used by the tests (256 bytes)
pub const TEST_FRAMES: usize = 64;

/// Bytes per submission at `TEST_FRAMES`
pub const TEST_SUBMISSION_BYTES: usize = TEST_FRAMES * 4;

/// Which acquisition steps should fail
#[derive(Debug, Default, Clone, Copy)]
pub struct FaultPlan {
    pub fail_reserve: bool,
    pub fail_guard: bool,
    pub fail_spawn: bool,
    pub fail_enter_pump: bool,
}

/// One captured hardware submission
#[derive(Debug, Clone)]
pub struct Submission {
    pub volume: PanVolume,
    pub samples: Vec<i16>,
}

/// Shared record of everything the channels saw
#[derive(Debug)]
pub struct ChannelLog {
    reserves: AtomicUsize,
    releases: AtomicUsize,
    submitted: AtomicU64,
    captured: Mutex<Vec<Submission>>,
    capture_limit: usize,
}

impl ChannelLog {
    pub fn reserves(&self) -> usize {
        self.reserves.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::SeqCst)
    }

    /// Captured submissions so far
    pub fn captured(&self) -> Vec<Submission> {
        self.captured.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.captured.lock().unwrap().clear();
    }
}

/// Platform that records submissions and fails on demand
pub struct RecordingPlatform {
    faults: Mutex<FaultPlan>,
    log: Arc<ChannelLog>,
    pace: Duration,
}

impl RecordingPlatform {
    pub fn new() -> Arc<Self> {
        Self::with_capture(64)
    }

    /// Capture up to `limit` submissions
    pub fn with_capture(limit: usize) -> Arc<Self> {
        Arc::new(Self {
            faults: Mutex::new(FaultPlan::default()),
            log: Arc::new(ChannelLog {
                reserves: AtomicUsize::new(0),
                releases: AtomicUsize::new(0),
                submitted: AtomicU64::new(0),
                captured: Mutex::new(Vec::new()),
                capture_limit: limit,
            }),
            pace: Duration::from_millis(1),
        })
    }

    pub fn set_faults(&self, plan: FaultPlan) {
        *self.faults.lock().unwrap() = plan;
    }

    pub fn clear_faults(&self) {
        self.set_faults(FaultPlan::default());
    }

    pub fn log(&self) -> &ChannelLog {
        &self.log
    }

    fn faults(&self) -> FaultPlan {
        *self.faults.lock().unwrap()
    }
}

impl Platform for RecordingPlatform {
    fn reserve_channel(
        &self,
        frames: usize,
        format: NativeFormat,
    ) -> Result<Arc<dyn OutputChannel>, PlatformError> {
        if self.faults().fail_reserve {
            return Err(PlatformError::new("injected: no free channel"));
        }
        assert_eq!(format.channels, NATIVE_CHANNELS);
        self.log.reserves.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(RecordingChannel {
            log: Arc::clone(&self.log),
            samples_per_unit: format.samples_per(frames),
            fail_enter: AtomicBool::new(self.faults().fail_enter_pump),
            pace: self.pace,
        }))
    }

    fn create_guard(&self, traced: bool) -> Result<SharedMix, PlatformError> {
        if self.faults().fail_guard {
            return Err(PlatformError::new("injected: no semaphore"));
        }
        let state = MixState::default();
        Ok(if traced {
            MixLock::traced(state)
        } else {
            MixLock::new(state)
        })
    }

    fn spawn_pump(
        &self,
        name: String,
        stack_size: usize,
        body: Box<dyn FnOnce() + Send + 'static>,
    ) -> std::io::Result<JoinHandle<()>> {
        if self.faults().fail_spawn {
            return Err(std::io::Error::other("injected: thread limit reached"));
        }
        std::thread::Builder::new()
            .name(name)
            .stack_size(stack_size)
            .spawn(body)
    }
}

struct RecordingChannel {
    log: Arc<ChannelLog>,
    samples_per_unit: usize,
    fail_enter: AtomicBool,
    pace: Duration,
}

impl OutputChannel for RecordingChannel {
    fn enter_pump(&self) -> Result<(), PlatformError> {
        // Reads the plan captured at reserve time
        if self.fail_enter.swap(false, Ordering::SeqCst) {
            return Err(PlatformError::new("injected: thread priority denied"));
        }
        Ok(())
    }

    fn output_blocking(&self, volume: PanVolume, samples: &[i16]) {
        assert_eq!(samples.len(), self.samples_per_unit);
        {
            let mut captured = self.log.captured.lock().unwrap();
            if captured.len() < self.log.capture_limit {
                captured.push(Submission {
                    volume,
                    samples: samples.to_vec(),
                });
            }
        }
        self.log.submitted.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.pace);
    }
}

impl Drop for RecordingChannel {
    fn drop(&mut self) {
        self.log.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Parameters giving one 256-byte submission per unit
pub fn test_params() -> OutputParams {
    OutputParams {
        frames_per_submission: TEST_FRAMES,
        ..OutputParams::default()
    }
}

/// Driver over `platform`, not yet initialized
pub fn driver_on(platform: &Arc<RecordingPlatform>) -> PcmDriver {
    let platform: Arc<dyn Platform> = platform.clone();
    PcmDriver::with_params(platform, test_params()).unwrap()
}

/// Driver over `platform`, initialized at the native format
pub fn initialized_driver(platform: &Arc<RecordingPlatform>) -> PcmDriver {
    let mut driver = driver_on(platform);
    let (mut rate, mut channels) = (44_100, 2);
    driver.init(&mut rate, &mut channels).unwrap();
    driver
}

/// Sample value of a run of identical bytes
pub fn uniform_sample(byte: u8) -> i16 {
    i16::from_ne_bytes([byte, byte])
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

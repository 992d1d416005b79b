//! Output pump: the background thread that keeps the hardware fed
//!
//! ```text
//!   loop while running:
//!     refill(ping/pong[i])  ── mix lock held for the whole copy
//!     output_blocking(ping/pong[i])  ── returns once hardware consumed it
//!     i ^= 1
//! ```
//!
//! Stopping is cooperative: clearing the running flag takes effect after the
//! current blocking submission returns, so stop latency is at most one
//! submission period.

use crate::audio::platform::{OutputChannel, Platform};
use crate::audio::types::{HwBuffer, SharedVolume};
use crate::error::{Error, Result};
use crate::playback::guard::Holder;
use crate::playback::ring::{self, SharedMix};
use mvoc_common::OutputParams;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, trace, warn};

/// Everything the pump thread owns or shares
struct PumpContext {
    shared: Arc<SharedMix>,
    channel: Arc<dyn OutputChannel>,
    volume: Arc<SharedVolume>,
    running: Arc<AtomicBool>,
    submissions: Arc<AtomicU64>,
    samples_per_buffer: usize,
}

/// Handle to a running output pump
#[derive(Debug)]
pub struct OutputPump {
    running: Arc<AtomicBool>,
    submissions: Arc<AtomicU64>,
    thread: Option<JoinHandle<()>>,
}

impl OutputPump {
    /// Spawn the pump thread and wait until it has entered its loop
    ///
    /// # Arguments
    /// - `platform`: Provides the thread
    /// - `params`: Submission size and thread name/stack
    /// - `shared`: Mix lock protecting the ring consumer
    /// - `channel`: Reserved hardware channel
    /// - `volume`: Panned volume read before every submission
    ///
    /// # Errors
    /// - `ThreadCreate` if the platform could not create the thread
    /// - `ThreadStart` if the thread exited before reaching its loop
    ///
    /// On error the running flag is cleared and any created thread is joined.
    pub fn start(
        platform: &dyn Platform,
        params: &OutputParams,
        shared: Arc<SharedMix>,
        channel: Arc<dyn OutputChannel>,
        volume: Arc<SharedVolume>,
    ) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let submissions = Arc::new(AtomicU64::new(0));
        let (started_tx, started_rx) = mpsc::sync_channel(1);

        let context = PumpContext {
            shared,
            channel,
            volume,
            running: Arc::clone(&running),
            submissions: Arc::clone(&submissions),
            samples_per_buffer: params.submission_samples(),
        };

        let thread = match platform.spawn_pump(
            params.pump_thread_name.clone(),
            params.pump_stack_size,
            Box::new(move || pump_main(context, started_tx)),
        ) {
            Ok(thread) => thread,
            Err(e) => {
                running.store(false, Ordering::Release);
                return Err(Error::ThreadCreate(e));
            }
        };

        let failure = match started_rx.recv() {
            Ok(Ok(())) => None,
            Ok(Err(reason)) => Some(reason),
            Err(_) => Some("pump thread exited before entering its loop".to_string()),
        };

        if let Some(reason) = failure {
            running.store(false, Ordering::Release);
            if thread.join().is_err() {
                warn!("Output pump thread panicked during start");
            }
            return Err(Error::ThreadStart(reason));
        }

        debug!(
            samples = params.submission_samples(),
            thread = %params.pump_thread_name,
            "Output pump started"
        );

        Ok(Self {
            running,
            submissions,
            thread: Some(thread),
        })
    }

    /// Whether the pump has been asked to keep running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Hardware submissions completed so far
    pub fn submissions(&self) -> u64 {
        self.submissions.load(Ordering::Relaxed)
    }

    /// Clear the running flag and wait for the thread to return
    ///
    /// Blocks for up to one submission period.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);

        if let Some(thread) = self.thread.take() {
            match thread.join() {
                Ok(()) => debug!(
                    submissions = self.submissions(),
                    "Output pump joined"
                ),
                Err(_) => error!("Output pump thread panicked"),
            }
        }
    }
}

impl Drop for OutputPump {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn pump_main(context: PumpContext, started: SyncSender<std::result::Result<(), String>>) {
    if let Err(e) = context.channel.enter_pump() {
        let _ = started.send(Err(e.to_string()));
        return;
    }

    // Both halves start silent
    let mut buffers = [
        HwBuffer::zeroed(context.samples_per_buffer),
        HwBuffer::zeroed(context.samples_per_buffer),
    ];
    let _ = started.send(Ok(()));
    drop(started);

    let mut index = 0;
    while context.running.load(Ordering::Acquire) {
        let buffer = &mut buffers[index];
        ring::refill(&context.shared, buffer.as_bytes_mut(), Holder::Pump);
        context
            .channel
            .output_blocking(context.volume.load(), buffer.samples());

        let count = context.submissions.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(index, count, "Submitted output buffer");
        index ^= 1;
    }

    debug!("Output pump loop exited");
}

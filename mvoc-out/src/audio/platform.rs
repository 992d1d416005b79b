//! Hardware abstraction for the output driver
//!
//! The driver needs three kernel-level resources: a hardware output channel,
//! the mix guard, and a thread for the output pump. A [`Platform`] hands them
//! out; each acquisition either succeeds or fails, nothing more.

use crate::audio::types::PanVolume;
use crate::playback::guard::MixLock;
use crate::playback::ring::{MixState, SharedMix};
use mvoc_common::NativeFormat;
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;

/// Resource acquisition failure reported by a platform
#[derive(Debug, Error)]
#[error("{message}")]
pub struct PlatformError {
    message: String,
}

impl PlatformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A reserved hardware output channel
///
/// Dropping the last reference releases the channel.
pub trait OutputChannel: Send + Sync {
    /// Called once on the pump thread before the first submission
    ///
    /// A failure here aborts playback start.
    fn enter_pump(&self) -> Result<(), PlatformError> {
        Ok(())
    }

    /// Submit one unit of interleaved samples
    ///
    /// Blocks until the hardware has consumed the buffer; the caller is free
    /// to overwrite `samples` once this returns.
    fn output_blocking(&self, volume: PanVolume, samples: &[i16]);
}

/// Source of hardware resources
pub trait Platform: Send + Sync {
    /// Reserve an output channel playing `frames`-frame units in `format`
    fn reserve_channel(
        &self,
        frames: usize,
        format: NativeFormat,
    ) -> Result<Arc<dyn OutputChannel>, PlatformError>;

    /// Create the mix guard
    fn create_guard(&self, traced: bool) -> Result<SharedMix, PlatformError> {
        let state = MixState::default();
        Ok(if traced {
            MixLock::traced(state)
        } else {
            MixLock::new(state)
        })
    }

    /// Create and start a thread running `body`
    fn spawn_pump(
        &self,
        name: String,
        stack_size: usize,
        body: Box<dyn FnOnce() + Send + 'static>,
    ) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name(name)
            .stack_size(stack_size)
            .spawn(body)
    }
}

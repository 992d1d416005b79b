//! mvoc-out: real-time PCM output driver
//!
//! Feeds a hardware output channel from a segmented mix buffer that a mixing
//! engine writes concurrently.
//!
//! **Architecture:**
//! - Ring consumer: drains the mix buffer division by division and asks the
//!   engine to refill each division as it empties
//! - Mix guard: binary lock serializing engine writes against pump reads
//! - Output pump: background thread alternating two hardware buffers through
//!   blocking submissions
//! - Error latch: most recent failure code, queryable as text
//!
//! **Backends:**
//! - [`audio::NullPlatform`]: discards samples at real-time pace
//! - `audio::HostPlatform` (feature `host-audio`): the host's audio device via cpal
//!
//! # Usage
//!
//! ```rust,no_run
//! use mvoc_out::audio::NullPlatform;
//! use mvoc_out::{MixBuffer, NextDivision, PcmDriver};
//! use std::sync::Arc;
//!
//! # fn main() -> mvoc_out::Result<()> {
//! let mut driver = PcmDriver::new(Arc::new(NullPlatform::new()));
//! let (mut rate, mut channels) = (44_100, 2);
//! driver.init(&mut rate, &mut channels)?;
//!
//! let buffer = MixBuffer::new(4096, 4)?;
//! driver.begin_playback(buffer, |mut next: NextDivision<'_>| next.fill(0))?;
//!
//! // Engine writes under the lock
//! if let Some(division) = driver.lock()?.division_mut(2) {
//!     division.fill(0);
//! }
//!
//! let buffer = driver.stop_playback();
//! driver.shutdown();
//! # drop(buffer);
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod driver;
pub mod error;
pub mod playback;

pub use driver::{DriverState, PcmDriver};
pub use error::{Error, ErrorCode, ErrorLatch, Result};
pub use playback::{
    DivisionSource, HoldInterval, Holder, MixBuffer, MixGuard, MixState, NextDivision, ReadCursor,
};

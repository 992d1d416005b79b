//! Audio data types shared by the pump and the platforms
//!
//! Provides the hardware ping/pong buffer and the panned volume pair.

use mvoc_common::format::VOLUME_MAX;
use std::sync::atomic::{AtomicU32, Ordering};

/// One hardware submission unit of interleaved native samples
///
/// Stored as `i16` so the hardware sees correctly aligned samples; the ring
/// consumer fills it through its byte view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HwBuffer {
    samples: Box<[i16]>,
}

impl HwBuffer {
    /// Silent buffer of `samples` samples (not frames)
    pub fn zeroed(samples: usize) -> Self {
        Self {
            samples: vec![0i16; samples].into_boxed_slice(),
        }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Native-endian byte view for the ring consumer to copy into
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.samples)
    }

    /// Size of the buffer in bytes
    pub fn byte_len(&self) -> usize {
        std::mem::size_of_val(&*self.samples)
    }
}

/// Left/right gain applied by the hardware submission call
///
/// Each side ranges over `[0, VOLUME_MAX]`. No ramping is done here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanVolume {
    pub left: u32,
    pub right: u32,
}

impl PanVolume {
    pub const MAX: PanVolume = PanVolume {
        left: VOLUME_MAX,
        right: VOLUME_MAX,
    };

    /// Build a volume pair, clamping each side into range
    pub fn clamped(left: u32, right: u32) -> Self {
        Self {
            left: left.min(VOLUME_MAX),
            right: right.min(VOLUME_MAX),
        }
    }

    /// Scale one interleaved stereo frame in place
    pub fn apply(&self, frame: &mut [i16]) {
        if let [left, right] = frame {
            *left = scale(*left, self.left);
            *right = scale(*right, self.right);
        }
    }
}

impl Default for PanVolume {
    fn default() -> Self {
        Self::MAX
    }
}

fn scale(sample: i16, volume: u32) -> i16 {
    ((sample as i64 * volume as i64) / VOLUME_MAX as i64) as i16
}

/// Volume pair shared between the driver and the pump thread
///
/// The two sides are independent atomics; a reader may observe a new left
/// with an old right for one submission.
#[derive(Debug)]
pub struct SharedVolume {
    left: AtomicU32,
    right: AtomicU32,
}

impl SharedVolume {
    pub fn new(volume: PanVolume) -> Self {
        Self {
            left: AtomicU32::new(volume.left),
            right: AtomicU32::new(volume.right),
        }
    }

    pub fn load(&self) -> PanVolume {
        PanVolume {
            left: self.left.load(Ordering::Relaxed),
            right: self.right.load(Ordering::Relaxed),
        }
    }

    pub fn store(&self, volume: PanVolume) {
        self.left.store(volume.left, Ordering::Relaxed);
        self.right.store(volume.right, Ordering::Relaxed);
    }
}

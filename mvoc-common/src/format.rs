//! Native output format of the device
//!
//! The hardware channel accepts exactly one format. Whatever the mixing engine
//! asks for at init time, it is told to produce this.

/// Native output sample rate in Hz
pub const NATIVE_SAMPLE_RATE: u32 = 44_100;

/// Native output channel count (interleaved stereo)
pub const NATIVE_CHANNELS: u16 = 2;

/// Bytes per single-channel sample (signed 16-bit)
pub const BYTES_PER_SAMPLE: usize = 2;

/// Maximum per-side volume accepted by the hardware submission call
pub const VOLUME_MAX: u32 = 0x8000;

/// Submission units must be a multiple of this many frames
pub const FRAME_ALIGNMENT: usize = 64;

/// Largest submission unit the hardware accepts, in frames
pub const MAX_FRAMES_PER_SUBMISSION: usize = 65_472;

/// Default submission unit, in frames
pub const DEFAULT_FRAMES_PER_SUBMISSION: usize = 1024;

/// Sample layout of a hardware output channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl NativeFormat {
    /// The only format the device plays
    pub const fn native() -> Self {
        Self {
            sample_rate: NATIVE_SAMPLE_RATE,
            channels: NATIVE_CHANNELS,
        }
    }

    /// Bytes occupied by one interleaved frame
    pub const fn frame_bytes(&self) -> usize {
        self.channels as usize * BYTES_PER_SAMPLE
    }

    /// Samples (not frames) in a submission unit of `frames` frames
    pub const fn samples_per(&self, frames: usize) -> usize {
        frames * self.channels as usize
    }

    /// Playback duration of `frames` frames, in nanoseconds
    pub fn frames_to_nanos(&self, frames: usize) -> u64 {
        frames as u64 * 1_000_000_000 / self.sample_rate as u64
    }
}

impl Default for NativeFormat {
    fn default() -> Self {
        Self::native()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_frame_geometry() {
        let format = NativeFormat::native();
        assert_eq!(format.frame_bytes(), 4);
        assert_eq!(format.samples_per(DEFAULT_FRAMES_PER_SUBMISSION), 2048);
    }

    #[test]
    fn test_frames_to_nanos() {
        let format = NativeFormat::native();
        assert_eq!(format.frames_to_nanos(44_100), 1_000_000_000);
        // 1024 frames is just over 23ms
        assert_eq!(format.frames_to_nanos(1024) / 1_000_000, 23);
    }
}

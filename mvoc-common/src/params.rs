//! Tunable output parameters
//!
//! The hardware format itself is fixed (see [`crate::format`]); what remains
//! tunable is the submission unit size, the pump thread's name and stack, and
//! the initial panned volume.
//!
//! # Usage
//!
//! ```rust
//! use mvoc_common::params::OutputParams;
//!
//! let params = OutputParams {
//!     frames_per_submission: 512,
//!     ..OutputParams::default()
//! };
//! params.validate().unwrap();
//! assert_eq!(params.submission_bytes(), 2048);
//! ```

use crate::format::{
    NativeFormat, DEFAULT_FRAMES_PER_SUBMISSION, FRAME_ALIGNMENT, MAX_FRAMES_PER_SUBMISSION,
    VOLUME_MAX,
};
use crate::{Error, Result};
use serde::Deserialize;

/// Default pump thread stack size in bytes
pub const DEFAULT_PUMP_STACK_SIZE: usize = 0x8000;

/// Smallest stack we let the pump thread run on
pub const MIN_PUMP_STACK_SIZE: usize = 0x4000;

/// Default pump thread name
pub const DEFAULT_PUMP_THREAD_NAME: &str = "sound_thread";

/// Output driver parameters
///
/// Deserializes from the `[output]` table of the configuration file. Missing
/// keys fall back to the built-in defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OutputParams {
    /// Frames handed to the hardware per blocking submission
    ///
    /// Valid range: [64, 65472], multiple of 64
    /// Default: 1024 frames (23.2ms @ 44.1kHz)
    pub frames_per_submission: usize,

    /// Stack size of the output pump thread in bytes
    ///
    /// Valid range: >= 16 KiB
    /// Default: 32 KiB
    pub pump_stack_size: usize,

    /// Name given to the output pump thread
    pub pump_thread_name: String,

    /// Initial left-channel volume, [0, 0x8000]
    pub volume_left: u32,

    /// Initial right-channel volume, [0, 0x8000]
    pub volume_right: u32,
}

impl Default for OutputParams {
    fn default() -> Self {
        Self {
            frames_per_submission: DEFAULT_FRAMES_PER_SUBMISSION,
            pump_stack_size: DEFAULT_PUMP_STACK_SIZE,
            pump_thread_name: DEFAULT_PUMP_THREAD_NAME.to_string(),
            volume_left: VOLUME_MAX,
            volume_right: VOLUME_MAX,
        }
    }
}

/// Validation rule for one parameter
struct ParamRule {
    key: &'static str,
    check: fn(&OutputParams) -> std::result::Result<(), String>,
}

const RULES: &[ParamRule] = &[
    ParamRule {
        key: "frames_per_submission",
        check: |p| {
            let frames = p.frames_per_submission;
            if !(FRAME_ALIGNMENT..=MAX_FRAMES_PER_SUBMISSION).contains(&frames) {
                return Err(format!(
                    "{} outside [{}, {}]",
                    frames, FRAME_ALIGNMENT, MAX_FRAMES_PER_SUBMISSION
                ));
            }
            if frames % FRAME_ALIGNMENT != 0 {
                return Err(format!("{} is not a multiple of {}", frames, FRAME_ALIGNMENT));
            }
            Ok(())
        },
    },
    ParamRule {
        key: "pump_stack_size",
        check: |p| {
            if p.pump_stack_size < MIN_PUMP_STACK_SIZE {
                return Err(format!(
                    "{} bytes is below the {} byte minimum",
                    p.pump_stack_size, MIN_PUMP_STACK_SIZE
                ));
            }
            Ok(())
        },
    },
    ParamRule {
        key: "pump_thread_name",
        check: |p| {
            if p.pump_thread_name.is_empty() || p.pump_thread_name.contains('\0') {
                return Err("must be non-empty and contain no NUL bytes".to_string());
            }
            Ok(())
        },
    },
    ParamRule {
        key: "volume_left",
        check: |p| check_volume(p.volume_left),
    },
    ParamRule {
        key: "volume_right",
        check: |p| check_volume(p.volume_right),
    },
];

fn check_volume(volume: u32) -> std::result::Result<(), String> {
    if volume > VOLUME_MAX {
        return Err(format!("{} exceeds maximum {}", volume, VOLUME_MAX));
    }
    Ok(())
}

impl OutputParams {
    /// Check every parameter against its valid range
    ///
    /// # Errors
    /// [`Error::InvalidParam`] naming the first offending parameter
    pub fn validate(&self) -> Result<()> {
        for rule in RULES {
            (rule.check)(self).map_err(|reason| Error::InvalidParam {
                name: rule.key,
                reason,
            })?;
        }
        Ok(())
    }

    /// Size in bytes of one ping/pong hardware buffer
    pub fn submission_bytes(&self) -> usize {
        self.frames_per_submission * NativeFormat::native().frame_bytes()
    }

    /// Number of i16 samples in one ping/pong hardware buffer
    pub fn submission_samples(&self) -> usize {
        NativeFormat::native().samples_per(self.frames_per_submission)
    }
}

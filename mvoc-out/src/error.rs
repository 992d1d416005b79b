//! Error types for mvoc-out
//!
//! Two layers, matching how the mixing engine consumes failures:
//! - [`Error`]: rich `thiserror` error returned from every fallible call
//! - [`ErrorCode`] + [`ErrorLatch`]: the closed numeric code set, with the most
//!   recent failure latched so it can be queried after the fact

use std::sync::atomic::{AtomicI32, Ordering};
use thiserror::Error;

/// Main error type for the output driver
#[derive(Error, Debug)]
pub enum Error {
    /// Playback operation attempted before a successful init
    #[error("Output driver not initialized")]
    NotInitialized,

    /// Hardware output channel could not be reserved
    #[error("Channel reserve failed: {0}")]
    ChannelReserve(String),

    /// Mix guard could not be created
    #[error("Mix guard creation failed: {0}")]
    SemaphoreCreate(String),

    /// Output pump thread could not be created
    #[error("Output pump thread creation failed")]
    ThreadCreate(#[source] std::io::Error),

    /// Output pump thread was created but never reached its loop
    #[error("Output pump thread failed to start: {0}")]
    ThreadStart(String),

    /// Segmented mix buffer geometry is unusable
    #[error("Invalid mix buffer: {0}")]
    InvalidBuffer(String),

    /// Configuration or parameter error
    #[error(transparent)]
    Config(#[from] mvoc_common::Error),
}

/// Convenience Result type using the driver Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The latched code for this error
    ///
    /// Buffer geometry and configuration problems have no dedicated code in
    /// the closed set and report as `GenericError`.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::NotInitialized => ErrorCode::NotInitialized,
            Error::ChannelReserve(_) => ErrorCode::ChannelReserveFailed,
            Error::SemaphoreCreate(_) => ErrorCode::SemaphoreCreateFailed,
            Error::ThreadCreate(_) => ErrorCode::ThreadCreateFailed,
            Error::ThreadStart(_) => ErrorCode::ThreadStartFailed,
            Error::InvalidBuffer(_) | Error::Config(_) => ErrorCode::GenericError,
        }
    }
}

/// Closed set of driver status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    Warning = -2,
    GenericError = -1,
    Ok = 0,
    NotInitialized = 1,
    ChannelReserveFailed = 2,
    SemaphoreCreateFailed = 3,
    ThreadCreateFailed = 4,
    ThreadStartFailed = 5,
}

const UNKNOWN_CODE_TEXT: &str = "Unknown output driver error code.";

impl ErrorCode {
    /// Decode a raw status value
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            -2 => Some(Self::Warning),
            -1 => Some(Self::GenericError),
            0 => Some(Self::Ok),
            1 => Some(Self::NotInitialized),
            2 => Some(Self::ChannelReserveFailed),
            3 => Some(Self::SemaphoreCreateFailed),
            4 => Some(Self::ThreadCreateFailed),
            5 => Some(Self::ThreadStartFailed),
            _ => None,
        }
    }

    /// Raw status value
    pub fn raw(self) -> i32 {
        self as i32
    }

    /// Fixed text for a specific code
    ///
    /// `Warning` and `GenericError` are placeholders for "whatever failed
    /// last"; they have no text of their own here and resolve through
    /// [`ErrorLatch::describe`].
    fn specific_text(self) -> Option<&'static str> {
        match self {
            Self::Warning | Self::GenericError => None,
            Self::Ok => Some("Output driver ok."),
            Self::NotInitialized => Some("Output driver uninitialised."),
            Self::ChannelReserveFailed => Some("Output driver: channel reserve failed."),
            Self::SemaphoreCreateFailed => Some("Output driver: failed creating mix guard."),
            Self::ThreadCreateFailed => Some("Output driver: failed creating mix thread."),
            Self::ThreadStartFailed => Some("Output driver: failed starting mix thread."),
        }
    }
}

/// Most recent failure code
///
/// Written by failing operations, read on demand. Only specific codes are
/// ever stored; the latch starts at `Ok`.
#[derive(Debug)]
pub struct ErrorLatch {
    code: AtomicI32,
}

impl ErrorLatch {
    pub fn new() -> Self {
        Self {
            code: AtomicI32::new(ErrorCode::Ok.raw()),
        }
    }

    /// Record `error` as the most recent failure and hand it back
    pub fn record(&self, error: Error) -> Error {
        self.set(error.code());
        error
    }

    /// Overwrite the latch with `code`
    ///
    /// The indirect codes are never latched; they collapse to their own
    /// meaning through whatever specific code is already there.
    pub fn set(&self, code: ErrorCode) {
        if matches!(code, ErrorCode::Warning | ErrorCode::GenericError) {
            return;
        }
        self.code.store(code.raw(), Ordering::Release);
    }

    /// Current latched code
    pub fn get(&self) -> ErrorCode {
        ErrorCode::from_raw(self.code.load(Ordering::Acquire)).unwrap_or(ErrorCode::GenericError)
    }

    /// Human-readable text for `code`
    ///
    /// `Warning` and `GenericError` report whatever the latch currently holds.
    pub fn describe(&self, code: ErrorCode) -> &'static str {
        code.specific_text()
            .or_else(|| self.get().specific_text())
            .unwrap_or(UNKNOWN_CODE_TEXT)
    }

    /// Human-readable text for a raw status value
    pub fn describe_raw(&self, raw: i32) -> &'static str {
        match ErrorCode::from_raw(raw) {
            Some(code) => self.describe(code),
            None => UNKNOWN_CODE_TEXT,
        }
    }
}

impl Default for ErrorLatch {
    fn default() -> Self {
        Self::new()
    }
}

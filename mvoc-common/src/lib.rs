//! # MultiVoc Common Library
//!
//! Hardware-independent pieces shared by the PCM output driver and its tools:
//! - Native output format constants
//! - Tunable output parameters with range validation
//! - Configuration file resolution and loading

pub mod config;
pub mod error;
pub mod format;
pub mod params;

pub use error::{Error, Result};
pub use format::NativeFormat;
pub use params::OutputParams;

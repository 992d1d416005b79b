//! Hardware side of the driver: platforms, channels, and sample buffers

#[cfg(feature = "host-audio")]
pub mod host;
pub mod null;
pub mod platform;
pub mod types;

#[cfg(feature = "host-audio")]
pub use host::HostPlatform;
pub use null::NullPlatform;
pub use platform::{OutputChannel, Platform, PlatformError};
pub use types::{HwBuffer, PanVolume, SharedVolume};

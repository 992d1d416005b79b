//! Playback side of the driver: mix guard, ring consumer, and output pump

pub mod guard;
pub mod pump;
pub mod ring;

pub use guard::{HoldInterval, Holder, MixGuard, MixLock};
pub use pump::OutputPump;
pub use ring::{DivisionSource, MixBuffer, MixState, NextDivision, ReadCursor, RingConsumer, SharedMix};

//! Ring consumer: drains the segmented mix buffer division by division
//!
//! The mixing engine owns the *content* of the mix buffer; the driver owns the
//! buffer itself while playing. The buffer is split into `division_count`
//! divisions of `division_size` bytes and read strictly in order, wrapping
//! from the last division back to the first.
//!
//! ## Design
//!
//! ```text
//!  MixBuffer:  | div 0 | div 1 | div 2 | div 3 |
//!                  ^cursor (division, used)
//!
//!  fill(dest):
//!    division drained? ── yes ─> source.refill(next division) ; cursor = (next, 0)
//!           │ no
//!           v
//!    copy min(remaining, division_size - used) bytes into dest
//! ```
//!
//! The refill source is invoked synchronously on the pump thread, with the
//! mix lock held, exactly once per drained division and before that
//! division's successor is read. It is handed the successor's bytes and
//! nothing else, so it cannot reach the lock it is running under.

use crate::error::{Error, Result};
use crate::playback::guard::{Holder, MixLock};
use std::ops::{Deref, DerefMut, Range};
use tracing::trace;

/// Segmented mix buffer
///
/// Contiguous bytes logically divided into equal divisions. Geometry is fixed
/// at construction.
#[derive(Clone, PartialEq, Eq)]
pub struct MixBuffer {
    bytes: Box<[u8]>,
    division_size: usize,
    division_count: usize,
}

impl MixBuffer {
    /// Allocate a zeroed buffer of `division_count` divisions
    ///
    /// # Errors
    /// [`Error::InvalidBuffer`] if either dimension is zero
    pub fn new(division_size: usize, division_count: usize) -> Result<Self> {
        if division_size == 0 || division_count == 0 {
            return Err(Error::InvalidBuffer(format!(
                "{} divisions of {} bytes",
                division_count, division_size
            )));
        }
        let total = division_size.checked_mul(division_count).ok_or_else(|| {
            Error::InvalidBuffer(format!(
                "{} divisions of {} bytes overflows",
                division_count, division_size
            ))
        })?;
        Ok(Self {
            bytes: vec![0u8; total].into_boxed_slice(),
            division_size,
            division_count,
        })
    }

    /// Adopt existing bytes, split into `division_count` equal divisions
    ///
    /// # Errors
    /// [`Error::InvalidBuffer`] if the bytes are empty or do not split evenly
    pub fn from_bytes(bytes: Vec<u8>, division_count: usize) -> Result<Self> {
        if bytes.is_empty() || division_count == 0 || bytes.len() % division_count != 0 {
            return Err(Error::InvalidBuffer(format!(
                "{} bytes cannot be split into {} equal divisions",
                bytes.len(),
                division_count
            )));
        }
        Ok(Self {
            division_size: bytes.len() / division_count,
            division_count,
            bytes: bytes.into_boxed_slice(),
        })
    }

    pub fn division_size(&self) -> usize {
        self.division_size
    }

    pub fn division_count(&self) -> usize {
        self.division_count
    }

    /// Total size in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; a mix buffer has at least one non-empty division
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Bytes of division `index`, or `None` if out of range
    pub fn division(&self, index: usize) -> Option<&[u8]> {
        self.division_range(index).map(|range| &self.bytes[range])
    }

    /// Mutable bytes of division `index`, or `None` if out of range
    pub fn division_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        self.division_range(index).map(move |range| &mut self.bytes[range])
    }

    /// Give the storage back
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes.into_vec()
    }

    fn division_range(&self, index: usize) -> Option<Range<usize>> {
        (index < self.division_count).then(|| {
            let start = index * self.division_size;
            start..start + self.division_size
        })
    }
}

impl std::fmt::Debug for MixBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MixBuffer")
            .field("division_size", &self.division_size)
            .field("division_count", &self.division_count)
            .finish()
    }
}

/// Read position within the mix buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadCursor {
    /// Division currently being read, in `[0, division_count)`
    pub division: usize,
    /// Bytes already read from that division, in `[0, division_size]`
    pub used: usize,
}

/// The division about to become current, handed to the refill source
pub struct NextDivision<'a> {
    index: usize,
    bytes: &'a mut [u8],
}

impl NextDivision<'_> {
    /// Index of the division within the mix buffer
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Deref for NextDivision<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.bytes
    }
}

impl DerefMut for NextDivision<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.bytes
    }
}

/// Produces the next division's samples when the current one is drained
///
/// Called on the output pump thread with the mix lock held. Implementations
/// must not block on the driver (locking it, stopping it) from here.
pub trait DivisionSource: Send {
    /// Write fresh samples into `next` before it is read
    fn refill(&mut self, next: NextDivision<'_>);
}

impl<F> DivisionSource for F
where
    F: FnMut(NextDivision<'_>) + Send,
{
    fn refill(&mut self, next: NextDivision<'_>) {
        self(next)
    }
}

/// Pulls bytes out of a mix buffer, refilling divisions as they drain
pub struct RingConsumer {
    buffer: MixBuffer,
    cursor: ReadCursor,
    source: Box<dyn DivisionSource>,
    refills: u64,
}

impl RingConsumer {
    /// Start reading `buffer` at division 0, offset 0
    ///
    /// Division 0 is read as it stands; the first refill happens when it is
    /// drained.
    pub fn new(buffer: MixBuffer, source: Box<dyn DivisionSource>) -> Self {
        Self {
            buffer,
            cursor: ReadCursor::default(),
            source,
            refills: 0,
        }
    }

    /// Copy exactly `dest.len()` bytes out of the mix buffer, in order
    ///
    /// Crosses as many division boundaries as needed, invoking the refill
    /// source once per drained division.
    pub fn fill(&mut self, dest: &mut [u8]) {
        let division_size = self.buffer.division_size;
        let division_count = self.buffer.division_count;
        let mut written = 0;

        while written < dest.len() {
            if self.cursor.used == division_size {
                let next = (self.cursor.division + 1) % division_count;
                let start = next * division_size;
                self.source.refill(NextDivision {
                    index: next,
                    bytes: &mut self.buffer.bytes[start..start + division_size],
                });
                self.refills += 1;
                self.cursor = ReadCursor {
                    division: next,
                    used: 0,
                };
            }

            let len = (dest.len() - written).min(division_size - self.cursor.used);
            let src = self.cursor.division * division_size + self.cursor.used;
            dest[written..written + len].copy_from_slice(&self.buffer.bytes[src..src + len]);

            self.cursor.used += len;
            written += len;
        }
    }

    pub fn cursor(&self) -> ReadCursor {
        self.cursor
    }

    pub fn buffer(&self) -> &MixBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut MixBuffer {
        &mut self.buffer
    }

    /// Number of times the refill source has been invoked
    pub fn refill_count(&self) -> u64 {
        self.refills
    }

    /// Take the buffer back, discarding the cursor and the source
    pub fn into_buffer(self) -> MixBuffer {
        self.buffer
    }
}

impl std::fmt::Debug for RingConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingConsumer")
            .field("buffer", &self.buffer)
            .field("cursor", &self.cursor)
            .field("refills", &self.refills)
            .finish()
    }
}

/// State protected by the mix lock
///
/// Empty until playback begins. While empty, refills are no-ops and the
/// accessors return `None`.
#[derive(Debug, Default)]
pub struct MixState {
    ring: Option<RingConsumer>,
}

/// The mix lock as shared between driver and pump
pub type SharedMix = MixLock<MixState>;

impl MixState {
    /// Whether a mix buffer and refill source are installed
    pub fn is_configured(&self) -> bool {
        self.ring.is_some()
    }

    /// Current read position
    pub fn cursor(&self) -> Option<ReadCursor> {
        self.ring.as_ref().map(RingConsumer::cursor)
    }

    /// The installed mix buffer
    pub fn buffer(&self) -> Option<&MixBuffer> {
        self.ring.as_ref().map(RingConsumer::buffer)
    }

    /// Whole mix buffer, for in-place writes
    pub fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        self.ring.as_mut().map(|ring| ring.buffer_mut().as_bytes_mut())
    }

    /// One division, for in-place writes
    pub fn division_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        self.ring
            .as_mut()
            .and_then(|ring| ring.buffer_mut().division_mut(index))
    }

    /// Refill source invocations since playback began
    pub fn refill_count(&self) -> u64 {
        self.ring.as_ref().map_or(0, RingConsumer::refill_count)
    }

    pub(crate) fn install(&mut self, ring: RingConsumer) {
        self.ring = Some(ring);
    }

    pub(crate) fn take(&mut self) -> Option<RingConsumer> {
        self.ring.take()
    }
}

/// Fill `dest` from the shared mix buffer under one guard hold
///
/// Silent no-op (dest untouched) when playback is not configured.
///
/// # Returns
/// Whether anything was copied
pub fn refill(shared: &SharedMix, dest: &mut [u8], holder: Holder) -> bool {
    let mut guard = shared.acquire(holder);
    match guard.ring.as_mut() {
        Some(ring) => {
            ring.fill(dest);
            trace!(cursor = ?ring.cursor(), bytes = dest.len(), "Refilled output buffer");
            true
        }
        None => false,
    }
}

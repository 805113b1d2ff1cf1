//! Circular stream buffer over external SRAM.
//!
//! [`StreamBuffer`] queues the bytes the network task pulls from a station
//! until the decoder feed wants them. The payload lives off-chip in the
//! 23LC1024; only the two cursors and the capacity stay in on-chip RAM.
//!
//! ```text
//! network task ──write()──▶ ┌──────────────┐ ──read()──▶ decoder feed
//!   (cooperative)           │ StreamBuffer │             (timer callback,
//!                           │  W, R, cap   │              may preempt)
//!                           └──────┬───────┘
//!                                  │ spans + framed SPI transactions
//!                           ┌──────▼───────┐
//!                           │   23LC1024   │
//!                           └──────────────┘
//! ```
//!
//! # Concurrency
//!
//! Exactly one producer advances the write cursor and exactly one consumer
//! advances the read cursor; the consumer may preempt the producer at any
//! instruction boundary but never runs in parallel with it. Each cursor is
//! a single-word atomic written by one side only, so fill and space counts
//! need no lock. The shared SPI bus does: every physical transaction runs
//! inside a `critical_section` scope, which masks the consumer's preemption
//! for the bounded duration of one transfer unit and is released on every
//! exit path, including transport failure.
//!
//! # Backpressure
//!
//! `write` and `read` never block. The producer polls [`free_bytes`] (or
//! [`has_chunk_space`]) before writing; the decoder feed polls
//! [`filled_bytes`] and substitutes silence on underrun. Both calls return
//! immediately with a reject status when the buffer cannot take or supply
//! the requested bytes; retry scheduling belongs to the calling loops.
//!
//! [`free_bytes`]: StreamBuffer::free_bytes
//! [`has_chunk_space`]: StreamBuffer::has_chunk_space
//! [`filled_bytes`]: StreamBuffer::filled_bytes

use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, Ordering};

use critical_section::Mutex;
use embedded_hal::spi::SpiDevice;
use thiserror_no_std::Error;

use crate::span::wrap_spans;
use crate::sram_config::SramConfig;
use crate::transport::{Sram23x, SramError};

/// Transfer unit in bytes: the burst the decoder chip accepts per
/// chip-select assertion, and the largest block one `write`/`read` moves.
pub const CHUNK_BYTES: usize = 32;

#[allow(clippy::cast_possible_truncation)] // 32 fits every integer width in play
const CHUNK_BYTES_U32: u32 = CHUNK_BYTES as u32;

/// Rejected buffer operation.
#[derive(Error, Debug)]
pub enum BufferError<E> {
    /// Not enough free space for the whole block. Routine under a fast
    /// station; the producer retries after the decoder drains.
    #[error("buffer full: {requested} bytes requested, {free} free")]
    Full {
        /// Bytes the write asked for.
        requested: u32,
        /// Bytes currently writable.
        free: u32,
    },
    /// Not enough buffered bytes for the whole read. Routine under a
    /// network stall; the consumer substitutes silence.
    #[error("buffer underrun: {requested} bytes requested, {filled} buffered")]
    Underrun {
        /// Bytes the read asked for.
        requested: u32,
        /// Bytes currently buffered.
        filled: u32,
    },
    /// The block exceeds the transfer unit.
    #[error("block of {len} bytes exceeds the {max}-byte transfer unit")]
    BlockTooLarge {
        /// Rejected block length.
        len: usize,
        /// Transfer-unit limit ([`CHUNK_BYTES`]).
        max: usize,
    },
    /// The underlying device failed. Distinct from full/empty so repeated
    /// occurrences can escalate to the fatal bring-up path.
    #[error("external memory failure")]
    Sram(#[from] SramError<E>),
}

/// FIFO byte queue backed by external SRAM.
///
/// One instance exists per installed part, constructed once at boot by
/// [`StreamBuffer::initialize`] and then shared by reference with the
/// producer and consumer call sites. All operations take `&self`.
///
/// One byte of capacity is permanently reserved so a full buffer is
/// distinguishable from an empty one: `filled + free == capacity - 1`.
pub struct StreamBuffer<SPI> {
    sram: Mutex<RefCell<Sram23x<SPI>>>,
    capacity: u32,
    /// Next physical address to write. Producer-owned.
    wr: AtomicU32,
    /// Next physical address to read. Consumer-owned.
    rd: AtomicU32,
}

impl<SPI: SpiDevice> StreamBuffer<SPI> {
    /// Bring up the device and hand back an empty, ready buffer.
    ///
    /// # Errors
    ///
    /// Propagates the fatal bring-up failures of [`Sram23x::new`]; there
    /// is no degraded mode without the external buffer.
    pub fn initialize(spi: SPI, config: SramConfig) -> Result<Self, SramError<SPI::Error>> {
        let sram = Sram23x::new(spi, config)?;
        Ok(Self {
            capacity: sram.capacity(),
            sram: Mutex::new(RefCell::new(sram)),
            wr: AtomicU32::new(0),
            rd: AtomicU32::new(0),
        })
    }

    /// Device capacity in bytes (one of which stays reserved).
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Discard all buffered bytes and return both cursors to zero.
    ///
    /// Called by the control loop on stream restart, before the producer
    /// is pointed at a new source. The pair of stores runs inside a
    /// critical section so the decoder feed never observes one cursor
    /// moved and the other not.
    pub fn reset(&self) {
        critical_section::with(|_cs| {
            self.wr.store(0, Ordering::Release);
            self.rd.store(0, Ordering::Release);
        });
    }

    /// Number of buffered bytes available to read.
    #[allow(clippy::arithmetic_side_effects)] // Safety: ring arithmetic; both cursors always < capacity
    pub fn filled_bytes(&self) -> u32 {
        let wr = self.wr.load(Ordering::Acquire);
        let rd = self.rd.load(Ordering::Acquire);
        if wr >= rd {
            wr - rd
        } else {
            self.capacity - rd + wr
        }
    }

    /// Number of bytes that may be written without overtaking the reader.
    #[allow(clippy::arithmetic_side_effects)] // Safety: filled_bytes() <= capacity - 1 by the ring invariant
    pub fn free_bytes(&self) -> u32 {
        self.capacity - self.filled_bytes() - 1
    }

    /// Whether a whole transfer unit fits right now.
    pub fn has_chunk_space(&self) -> bool {
        self.free_bytes() >= CHUNK_BYTES_U32
    }

    /// Buffered data, in whole transfer units.
    #[allow(clippy::arithmetic_side_effects)] // Safety: CHUNK_BYTES_U32 is a nonzero constant
    pub fn filled_chunks(&self) -> u32 {
        self.filled_bytes() / CHUNK_BYTES_U32
    }

    /// Free space, in whole transfer units.
    #[allow(clippy::arithmetic_side_effects)] // Safety: CHUNK_BYTES_U32 is a nonzero constant
    pub fn free_chunks(&self) -> u32 {
        self.free_bytes() / CHUNK_BYTES_U32
    }

    /// Enqueue one block of at most [`CHUNK_BYTES`] bytes.
    ///
    /// The block is persisted through one or two bus transactions (two
    /// when it straddles the capacity boundary), then the write cursor
    /// advances. On any rejection or transport failure the cursor is
    /// untouched, so a retry rewrites the unit from its start and the
    /// consumer can never observe a partial block.
    ///
    /// Producer context only.
    ///
    /// # Errors
    ///
    /// [`BufferError::BlockTooLarge`], [`BufferError::Full`], or
    /// [`BufferError::Sram`] on transport failure.
    pub fn write(&self, block: &[u8]) -> Result<(), BufferError<SPI::Error>> {
        if block.is_empty() {
            return Ok(());
        }
        if block.len() > CHUNK_BYTES {
            return Err(BufferError::BlockTooLarge {
                len: block.len(),
                max: CHUNK_BYTES,
            });
        }
        #[allow(clippy::cast_possible_truncation)] // bounds-checked against CHUNK_BYTES above
        let len = block.len() as u32;
        let free = self.free_bytes();
        if free < len {
            return Err(BufferError::Full {
                requested: len,
                free,
            });
        }

        // Relaxed: this word is only ever stored from the producer context.
        let wr = self.wr.load(Ordering::Relaxed);
        let (first, rest) = wrap_spans(wr, len, self.capacity);
        #[allow(clippy::cast_possible_truncation)] // first.len <= CHUNK_BYTES
        let (head, tail) = block.split_at(first.len as usize);
        critical_section::with(|cs| -> Result<(), SramError<SPI::Error>> {
            let mut sram = self.sram.borrow_ref_mut(cs);
            sram.write_bytes(first.addr, head)?;
            if let Some(span) = rest {
                sram.write_bytes(span.addr, tail)?;
            }
            Ok(())
        })?;

        // Advance only after the transport confirmed the whole unit.
        self.wr.store(self.advance(wr, len), Ordering::Release);
        Ok(())
    }

    /// Dequeue exactly `out.len()` bytes (at most [`CHUNK_BYTES`]).
    ///
    /// All-or-nothing: `out` is either filled completely and the read
    /// cursor advanced, or the call fails and the cursor is untouched.
    ///
    /// Consumer context only.
    ///
    /// # Errors
    ///
    /// [`BufferError::BlockTooLarge`], [`BufferError::Underrun`], or
    /// [`BufferError::Sram`] on transport failure.
    pub fn read(&self, out: &mut [u8]) -> Result<(), BufferError<SPI::Error>> {
        if out.is_empty() {
            return Ok(());
        }
        if out.len() > CHUNK_BYTES {
            return Err(BufferError::BlockTooLarge {
                len: out.len(),
                max: CHUNK_BYTES,
            });
        }
        #[allow(clippy::cast_possible_truncation)] // bounds-checked against CHUNK_BYTES above
        let len = out.len() as u32;
        let filled = self.filled_bytes();
        if filled < len {
            return Err(BufferError::Underrun {
                requested: len,
                filled,
            });
        }

        // Relaxed: this word is only ever stored from the consumer context.
        let rd = self.rd.load(Ordering::Relaxed);
        let (first, rest) = wrap_spans(rd, len, self.capacity);
        #[allow(clippy::cast_possible_truncation)] // first.len <= CHUNK_BYTES
        let (head, tail) = out.split_at_mut(first.len as usize);
        critical_section::with(|cs| -> Result<(), SramError<SPI::Error>> {
            let mut sram = self.sram.borrow_ref_mut(cs);
            sram.read_bytes(first.addr, head)?;
            if let Some(span) = rest {
                sram.read_bytes(span.addr, tail)?;
            }
            Ok(())
        })?;

        self.rd.store(self.advance(rd, len), Ordering::Release);
        Ok(())
    }

    #[allow(clippy::arithmetic_side_effects)] // Safety: cursor < capacity and len <= capacity, sum < 2^25
    fn advance(&self, cursor: u32, len: u32) -> u32 {
        (cursor + len) % self.capacity
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

//! External-SRAM jitter buffer for the net-radio playback pipeline.
//!
//! The radio pulls a station's byte stream over Wi-Fi in irregular bursts
//! while the audio decoder wants a steady trickle. The microcontroller has
//! nowhere near enough internal RAM to bridge the two, so the stream is
//! parked in an off-chip 23LC1024 SPI SRAM and drained on the decoder's
//! clock. This crate is that bridge: a lossless, in-order FIFO byte queue
//! whose payload lives on the external part and whose bookkeeping is two
//! cursors in on-chip RAM.
//!
//! # Architecture Layers
//!
//! ```text
//! Control loops (network ingest, decoder feed)
//!         ↓
//! Circular buffer engine ([`StreamBuffer`])
//!         ↓
//! Address translation ([`span`]) + SRAM driver ([`Sram23x`])
//!         ↓
//! SPI HAL (any blocking [`embedded_hal::spi::SpiDevice`])
//! ```
//!
//! # Example
//!
//! ```no_run
//! use streambuf::{SramConfig, StreamBuffer, CHUNK_BYTES};
//!
//! fn bring_up<SPI: embedded_hal::spi::SpiDevice>(spi: SPI) {
//!     let buffer = match StreamBuffer::initialize(spi, SramConfig::default()) {
//!         Ok(buffer) => buffer,
//!         Err(_) => return, // no buffered playback without the part
//!     };
//!     if buffer.has_chunk_space() {
//!         let burst = [0u8; CHUNK_BYTES];
//!         let _ = buffer.write(&burst);
//!     }
//! }
//! ```
//!
//! # Features
//!
//! - `defmt`: Enable defmt::Format derives on public types

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
// Pedantic lints suppressed for this crate:
#![allow(clippy::doc_markdown)] // hex opcodes and part numbers in doc comments
#![allow(clippy::missing_panics_doc)] // debug_assert on internal contracts only
#![allow(clippy::must_use_candidate)] // accessors — callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod ring;
pub mod span;
pub mod sram_config;
pub mod transport;

pub use ring::{BufferError, StreamBuffer, CHUNK_BYTES};
pub use span::{wrap_spans, Span};
pub use sram_config::{ConfigError, SramConfig};
pub use transport::{Sram23x, SramError};

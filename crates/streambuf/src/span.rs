//! Logical-to-physical address translation for the circular buffer.
//!
//! Stream cursors grow without bound in logical terms; the SRAM array is a
//! fixed linear window. A transfer that straddles the end of the array is
//! issued as two bus transactions, trailing piece first, so byte order on
//! the wire matches byte order in the stream.

/// One contiguous physical range inside the SRAM array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Span {
    /// First physical byte address of the range.
    pub addr: u32,
    /// Length of the range in bytes.
    pub len: u32,
}

/// Map a logical offset and length onto one or two physical spans.
///
/// The first span starts at `offset mod capacity`. A second span is
/// returned exactly when the transfer crosses the capacity boundary; it
/// always starts at physical address 0 and carries the overflow. Callers
/// must issue the spans in order to preserve the byte stream.
///
/// `len` must not exceed `capacity`; the buffer engine rejects oversized
/// transfers before translation.
#[must_use]
#[allow(clippy::arithmetic_side_effects)] // Safety: start < capacity and len <= capacity <= 2^24, so no overflow/underflow
pub fn wrap_spans(offset: u32, len: u32, capacity: u32) -> (Span, Option<Span>) {
    debug_assert!(capacity > 0);
    debug_assert!(len <= capacity);

    let start = offset % capacity;
    if start + len <= capacity {
        (Span { addr: start, len }, None)
    } else {
        let trailing = capacity - start;
        (
            Span {
                addr: start,
                len: trailing,
            },
            Some(Span {
                addr: 0,
                len: len - trailing,
            }),
        )
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

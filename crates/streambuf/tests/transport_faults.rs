//! Transport-failure behavior: a failed transaction must never corrupt
//! the queue. Cursors advance only after the transport confirms a whole
//! unit, so every fault here is followed by a clean retry.

#![allow(clippy::unwrap_used)]
#![allow(clippy::arithmetic_side_effects)]

use sram_emulator::{EmulatedSram, SharedSram};
use streambuf::{BufferError, ConfigError, SramConfig, SramError, StreamBuffer};

fn buffer(capacity: u32) -> (StreamBuffer<SharedSram>, SharedSram) {
    let config = SramConfig {
        capacity,
        ..SramConfig::default()
    };
    let handle = SharedSram::new(EmulatedSram::with_capacity(capacity as usize));
    let buf = StreamBuffer::initialize(handle.clone(), config).unwrap();
    (buf, handle)
}

#[test]
fn failed_write_leaves_queue_intact_and_retry_succeeds() {
    let (buf, sram) = buffer(64);
    buf.write(b"first-block").unwrap();

    sram.with(|s| s.inject_faults(0, 1));
    assert!(matches!(
        buf.write(b"second"),
        Err(BufferError::Sram(SramError::Bus(_)))
    ));
    assert_eq!(buf.filled_bytes(), 11);

    buf.write(b"second").unwrap();
    let mut out = [0u8; 17];
    buf.read(&mut out).unwrap();
    assert_eq!(&out, b"first-blocksecond");
}

/// A unit straddling the wrap boundary takes two transactions. When the
/// second one fails, the whole unit is rewound and the retry rewrites it
/// from the start.
#[test]
fn failure_on_second_span_rewinds_the_whole_unit() {
    let (buf, sram) = buffer(16);

    // Park both cursors at 12 so an 8-byte unit spans 12..16 and 0..4.
    buf.write(&[0u8; 12]).unwrap();
    let mut drain = [0u8; 12];
    buf.read(&mut drain).unwrap();
    assert_eq!(buf.filled_bytes(), 0);

    sram.with(|s| s.inject_faults(1, 1)); // first span lands, second fails
    assert!(matches!(
        buf.write(b"CDEFGHIJ"),
        Err(BufferError::Sram(SramError::Bus(_)))
    ));
    assert_eq!(buf.filled_bytes(), 0);

    buf.write(b"CDEFGHIJ").unwrap();
    let mut out = [0u8; 8];
    buf.read(&mut out).unwrap();
    assert_eq!(&out, b"CDEFGHIJ");
}

#[test]
fn failed_read_keeps_data_available() {
    let (buf, sram) = buffer(64);
    buf.write(b"payload!").unwrap();

    sram.with(|s| s.inject_faults(0, 1));
    let mut out = [0u8; 8];
    assert!(matches!(
        buf.read(&mut out),
        Err(BufferError::Sram(SramError::Bus(_)))
    ));
    assert_eq!(buf.filled_bytes(), 8);

    buf.read(&mut out).unwrap();
    assert_eq!(&out, b"payload!");
}

/// An unpopulated footprint floats the data line high; bring-up must
/// refuse it rather than hand out a buffer that stores nothing.
#[test]
fn absent_part_fails_bring_up() {
    let result = StreamBuffer::initialize(EmulatedSram::absent(), SramConfig::default());
    assert!(matches!(
        result,
        Err(SramError::ModeMismatch { read: 0xFF, .. })
    ));
}

#[test]
fn rejected_config_never_touches_the_bus() {
    let handle = SharedSram::new(EmulatedSram::new());
    let config = SramConfig {
        clock_hz: 0,
        ..SramConfig::default()
    };
    let result = StreamBuffer::initialize(handle.clone(), config);
    assert!(matches!(
        result,
        Err(SramError::Config(ConfigError::ClockZero))
    ));
    assert_eq!(handle.with(|s| s.transaction_count()), 0);
}

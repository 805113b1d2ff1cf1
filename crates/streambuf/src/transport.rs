//! 23LC1024 SPI transaction layer.
//!
//! [`Sram23x`] owns the [`SpiDevice`] handle for the SRAM and performs the
//! framed transactions the part understands: instruction byte, 24-bit
//! big-endian address, then the data phase, all inside one chip-select
//! assertion. The `SpiDevice` contract supplies the select/deselect
//! bracketing and exclusive bus arbitration, so two transactions can never
//! overlap on the same device.
//!
//! Bring-up ([`Sram23x::new`]) validates the configured clock, forces the
//! mode register to sequential and reads it back, then runs a benign
//! read-modify-read self-test at a fixed address. A part that is missing,
//! miswired, or wedged fails one of those checks before any stream data is
//! trusted to it.

use embedded_hal::spi::{Operation, SpiDevice};
use thiserror_no_std::Error;

use crate::sram_config::{
    ConfigError, SramConfig, SRAM_CMD_RDMR, SRAM_CMD_READ, SRAM_CMD_WRITE, SRAM_CMD_WRMR,
    SRAM_MODE_SEQUENTIAL,
};

/// Fixed address used by the bring-up self-test. The original byte is
/// restored before bring-up completes.
pub const PROBE_ADDR: u32 = 0;

/// External SRAM transaction or bring-up failure.
#[derive(Error, Debug)]
pub enum SramError<E> {
    /// The configuration violates the installed part's limits.
    #[error("configuration rejected: {0}")]
    Config(#[from] ConfigError),
    /// The bus transaction itself failed (device not responding, bus
    /// timeout). The cursors of any in-flight buffer operation are left
    /// unchanged by the caller.
    #[error("bus transport failure: {0:?}")]
    Bus(E),
    /// The mode register did not read back as written: device absent or
    /// not in a sane state.
    #[error("mode register mismatch: wrote {wrote:#04x}, read back {read:#04x}")]
    ModeMismatch {
        /// Value written with WRMR.
        wrote: u8,
        /// Value read back with RDMR.
        read: u8,
    },
    /// The self-test byte did not read back as written.
    #[error("probe mismatch at {addr:#07x}: wrote {wrote:#04x}, read back {read:#04x}")]
    ProbeMismatch {
        /// Probe address.
        addr: u32,
        /// Test pattern written.
        wrote: u8,
        /// Pattern read back.
        read: u8,
    },
    /// The requested range does not fit inside the device. The buffer
    /// engine never produces such a range; hitting this is a caller bug.
    #[error("range {addr:#x}+{len} exceeds capacity {capacity}")]
    OutOfRange {
        /// Requested start address.
        addr: u32,
        /// Requested length in bytes.
        len: usize,
        /// Device capacity in bytes.
        capacity: u32,
    },
}

/// Instruction header: opcode plus 24-bit big-endian address.
#[allow(clippy::cast_possible_truncation)] // intentional byte extraction
const fn frame_header(opcode: u8, addr: u32) -> [u8; 4] {
    [opcode, (addr >> 16) as u8, (addr >> 8) as u8, addr as u8]
}

/// Driver for a 23LC1024-class SPI SRAM.
///
/// Generic over any blocking [`SpiDevice`]; the handle carries the
/// select-line identity and the configured clock rate. Construction is the
/// only way to obtain a value, so a held `Sram23x` is always a probed,
/// sequential-mode device.
pub struct Sram23x<SPI> {
    spi: SPI,
    capacity: u32,
}

impl<SPI: SpiDevice> Sram23x<SPI> {
    /// Bring up and probe the device.
    ///
    /// Validates `config`, switches the part to sequential mode, verifies
    /// the mode register, and runs the read-modify-read self-test at
    /// [`PROBE_ADDR`] (original contents restored).
    ///
    /// # Errors
    ///
    /// Any failure here is fatal for buffered playback: the caller should
    /// surface it to the operator rather than degrade silently.
    pub fn new(spi: SPI, config: SramConfig) -> Result<Self, SramError<SPI::Error>> {
        config.validate()?;
        let mut dev = Self {
            spi,
            capacity: config.capacity,
        };
        dev.write_mode_register(SRAM_MODE_SEQUENTIAL)?;
        let mode = dev.read_mode_register()?;
        if mode != SRAM_MODE_SEQUENTIAL {
            return Err(SramError::ModeMismatch {
                wrote: SRAM_MODE_SEQUENTIAL,
                read: mode,
            });
        }
        dev.probe()?;
        Ok(dev)
    }

    /// Device capacity in bytes.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Read `buf.len()` bytes starting at physical address `addr`.
    ///
    /// One framed transaction; the full range is transferred or the call
    /// fails without side effects on driver state.
    ///
    /// # Errors
    ///
    /// [`SramError::OutOfRange`] before any bus traffic, or
    /// [`SramError::Bus`] if the transaction fails.
    pub fn read_bytes(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), SramError<SPI::Error>> {
        self.check_range(addr, buf.len())?;
        if buf.is_empty() {
            return Ok(());
        }
        let header = frame_header(SRAM_CMD_READ, addr);
        self.spi
            .transaction(&mut [Operation::Write(&header), Operation::Read(buf)])
            .map_err(SramError::Bus)
    }

    /// Write `data` starting at physical address `addr`.
    ///
    /// # Errors
    ///
    /// [`SramError::OutOfRange`] before any bus traffic, or
    /// [`SramError::Bus`] if the transaction fails.
    pub fn write_bytes(&mut self, addr: u32, data: &[u8]) -> Result<(), SramError<SPI::Error>> {
        self.check_range(addr, data.len())?;
        if data.is_empty() {
            return Ok(());
        }
        let header = frame_header(SRAM_CMD_WRITE, addr);
        self.spi
            .transaction(&mut [Operation::Write(&header), Operation::Write(data)])
            .map_err(SramError::Bus)
    }

    /// Write the mode register (WRMR).
    fn write_mode_register(&mut self, mode: u8) -> Result<(), SramError<SPI::Error>> {
        self.spi
            .write(&[SRAM_CMD_WRMR, mode])
            .map_err(SramError::Bus)
    }

    /// Read the mode register (RDMR).
    fn read_mode_register(&mut self) -> Result<u8, SramError<SPI::Error>> {
        let mut out = [0u8; 1];
        self.spi
            .transaction(&mut [
                Operation::Write(&[SRAM_CMD_RDMR]),
                Operation::Read(&mut out),
            ])
            .map_err(SramError::Bus)?;
        let [mode] = out;
        Ok(mode)
    }

    /// Read-modify-read presence check at [`PROBE_ADDR`].
    ///
    /// Writes the complement of the current byte, verifies it, then
    /// restores the original so the test is invisible to later traffic.
    fn probe(&mut self) -> Result<(), SramError<SPI::Error>> {
        let mut cell = [0u8; 1];
        self.read_bytes(PROBE_ADDR, &mut cell)?;
        let [original] = cell;
        let pattern = !original;

        self.write_bytes(PROBE_ADDR, &[pattern])?;
        self.read_bytes(PROBE_ADDR, &mut cell)?;
        let [echoed] = cell;
        if echoed != pattern {
            return Err(SramError::ProbeMismatch {
                addr: PROBE_ADDR,
                wrote: pattern,
                read: echoed,
            });
        }

        self.write_bytes(PROBE_ADDR, &[original])
    }

    fn check_range(&self, addr: u32, len: usize) -> Result<(), SramError<SPI::Error>> {
        let end = u64::from(addr).saturating_add(u64::try_from(len).unwrap_or(u64::MAX));
        if addr >= self.capacity || end > u64::from(self.capacity) {
            return Err(SramError::OutOfRange {
                addr,
                len,
                capacity: self.capacity,
            });
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use sram_emulator::EmulatedSram;
    use std::collections::VecDeque;

    /// Records every transaction's written bytes and answers reads from a
    /// scripted byte queue (zeros once the script runs dry).
    #[derive(Default)]
    struct CaptureSpi {
        frames: Vec<Vec<u8>>,
        script: VecDeque<u8>,
    }

    impl CaptureSpi {
        fn scripted(bytes: &[u8]) -> Self {
            Self {
                frames: Vec::new(),
                script: bytes.iter().copied().collect(),
            }
        }
    }

    impl embedded_hal::spi::ErrorType for CaptureSpi {
        type Error = core::convert::Infallible;
    }

    impl SpiDevice for CaptureSpi {
        fn transaction(
            &mut self,
            operations: &mut [Operation<'_, u8>],
        ) -> Result<(), Self::Error> {
            let mut frame = Vec::new();
            for op in operations.iter_mut() {
                match op {
                    Operation::Write(data) => frame.extend_from_slice(data),
                    Operation::Read(buf) => {
                        for slot in buf.iter_mut() {
                            *slot = self.script.pop_front().unwrap_or(0);
                        }
                    }
                    _ => {}
                }
            }
            self.frames.push(frame);
            Ok(())
        }
    }

    fn probed(spi: CaptureSpi) -> Sram23x<CaptureSpi> {
        Sram23x::new(spi, SramConfig::default()).unwrap()
    }

    /// Script that satisfies bring-up: RDMR echoes sequential mode, the
    /// probe reads 0x12, then its complement 0xED.
    const BRING_UP_SCRIPT: [u8; 3] = [SRAM_MODE_SEQUENTIAL, 0x12, 0xED];

    #[test]
    fn bring_up_frames_follow_the_datasheet() {
        let dev = probed(CaptureSpi::scripted(&BRING_UP_SCRIPT));
        let frames = &dev.spi.frames;
        // WRMR sequential, RDMR, probe read, probe write, verify read, restore write
        assert_eq!(frames.len(), 6);
        assert_eq!(frames[0], [SRAM_CMD_WRMR, SRAM_MODE_SEQUENTIAL]);
        assert_eq!(frames[1], [SRAM_CMD_RDMR]);
        assert_eq!(frames[2], [SRAM_CMD_READ, 0, 0, 0]);
        assert_eq!(frames[3], [SRAM_CMD_WRITE, 0, 0, 0, !0x12]);
        assert_eq!(frames[4], [SRAM_CMD_READ, 0, 0, 0]);
        assert_eq!(frames[5], [SRAM_CMD_WRITE, 0, 0, 0, 0x12]);
    }

    #[test]
    fn write_frame_carries_opcode_address_and_data() {
        let mut dev = probed(CaptureSpi::scripted(&BRING_UP_SCRIPT));
        dev.write_bytes(0x01_0203, &[1, 2, 3]).unwrap();
        let frame = dev.spi.frames.last().unwrap();
        assert_eq!(frame.as_slice(), &[SRAM_CMD_WRITE, 0x01, 0x02, 0x03, 1, 2, 3]);
    }

    #[test]
    fn read_frame_carries_opcode_and_big_endian_address() {
        let mut dev = probed(CaptureSpi::scripted(&BRING_UP_SCRIPT));
        let mut buf = [0u8; 2];
        dev.read_bytes(0x01_0203, &mut buf).unwrap();
        let frame = dev.spi.frames.last().unwrap();
        assert_eq!(frame.as_slice(), &[SRAM_CMD_READ, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn mode_mismatch_fails_bring_up() {
        // RDMR answers 0x00: device absent or ignoring WRMR.
        let spi = CaptureSpi::scripted(&[0x00]);
        let result = Sram23x::new(spi, SramConfig::default());
        assert!(matches!(
            result,
            Err(SramError::ModeMismatch {
                wrote: SRAM_MODE_SEQUENTIAL,
                read: 0x00,
            })
        ));
    }

    #[test]
    fn probe_mismatch_fails_bring_up() {
        // Mode verifies, but the probe byte never changes: stuck data line.
        let spi = CaptureSpi::scripted(&[SRAM_MODE_SEQUENTIAL, 0x12, 0x12]);
        let result = Sram23x::new(spi, SramConfig::default());
        assert!(matches!(result, Err(SramError::ProbeMismatch { addr: 0, .. })));
    }

    #[test]
    fn invalid_config_fails_before_bus_traffic() {
        let spi = CaptureSpi::default();
        let config = SramConfig {
            clock_hz: 25_000_000,
            ..SramConfig::default()
        };
        let result = Sram23x::new(spi, config);
        assert!(matches!(
            result,
            Err(SramError::Config(ConfigError::ClockTooFast { .. }))
        ));
    }

    #[test]
    fn out_of_range_requests_are_rejected_without_bus_traffic() {
        let mut dev = probed(CaptureSpi::scripted(&BRING_UP_SCRIPT));
        let frames_before = dev.spi.frames.len();
        let mut buf = [0u8; 8];
        let result = dev.read_bytes(SramConfig::default().capacity - 4, &mut buf);
        assert!(matches!(result, Err(SramError::OutOfRange { .. })));
        assert_eq!(dev.spi.frames.len(), frames_before);
    }

    #[test]
    fn zero_length_transfers_touch_no_bus() {
        let mut dev = probed(CaptureSpi::scripted(&BRING_UP_SCRIPT));
        let frames_before = dev.spi.frames.len();
        dev.write_bytes(10, &[]).unwrap();
        dev.read_bytes(10, &mut []).unwrap();
        assert_eq!(dev.spi.frames.len(), frames_before);
    }

    /// Round-trip against the wire-level chip model.
    #[test]
    fn emulated_chip_round_trips_data() {
        let mut dev = Sram23x::new(EmulatedSram::new(), SramConfig::default()).unwrap();
        let data: Vec<u8> = (0u16..64).map(|b| (b * 3) as u8).collect();
        dev.write_bytes(131_000, &data[..64]).unwrap();
        let mut back = vec![0u8; 64];
        dev.read_bytes(131_000, &mut back).unwrap();
        assert_eq!(back, data);
    }
}

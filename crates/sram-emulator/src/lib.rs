//! Wire-level 23LC1024 emulator for desktop tests.
//!
//! [`EmulatedSram`] implements [`embedded_hal::spi::SpiDevice`] and decodes
//! the byte stream a driver puts on the bus (instruction opcode, 24-bit
//! big-endian address, data phase) against a plain in-memory array. Tests
//! exercise the real driver and buffer code against the same frames the
//! physical part would see, without hardware on the desk.
//!
//! Beyond the happy path the emulator models the failure shapes the
//! firmware must survive:
//!
//! - **Fault injection** ([`EmulatedSram::inject_faults`]): a scheduled
//!   window of transactions fails with a bus error, for exercising the
//!   cursors-unchanged-on-transport-failure contract.
//! - **Absent device** ([`EmulatedSram::absent`]): writes vanish and reads
//!   float high (0xFF), which is what an unpopulated footprint looks like
//!   electrically; bring-up must catch it via the mode register.
//! - **Mode discipline**: multi-byte bursts outside sequential mode are a
//!   protocol violation and fail the transaction, so a driver that forgets
//!   to program the mode register cannot pass the test suite.
//!
//! Capacity is configurable down to a few bytes so invariant tests can run
//! at toy sizes; [`EmulatedSram::new`] models the real 128 KB part.

// Desktop test crate: array indices are reduced modulo the array length
// before use, and test-support arithmetic is not audited per-site.
#![allow(clippy::indexing_slicing)]
#![allow(clippy::arithmetic_side_effects)]

use embedded_hal::spi::{ErrorKind, ErrorType, Operation, SpiDevice};

/// READ instruction opcode (datasheet DS20005142, Table 2-1).
const CMD_READ: u8 = 0x03;
/// WRITE instruction opcode.
const CMD_WRITE: u8 = 0x02;
/// RDMR instruction opcode.
const CMD_RDMR: u8 = 0x05;
/// WRMR instruction opcode.
const CMD_WRMR: u8 = 0x01;

/// Mode-register value for sequential mode (bits 7:6 = `01`); also the
/// part's power-on default.
const MODE_SEQUENTIAL: u8 = 0x40;

/// Capacity of the real 23LC1024 in bytes.
pub const PART_CAPACITY: usize = 131_072;

/// What went wrong on the emulated bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmulatorError {
    /// A scheduled fault window consumed this transaction.
    InjectedFault,
    /// First opcode byte is not a 23LC1024 instruction.
    UnknownOpcode(u8),
    /// Operation list does not match the instruction's frame shape.
    MalformedFrame,
    /// Multi-byte data phase while the mode register selects byte mode.
    BurstOutsideSequentialMode,
}

impl core::fmt::Display for EmulatorError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InjectedFault => write!(f, "injected bus fault"),
            Self::UnknownOpcode(op) => write!(f, "unknown opcode {op:#04x}"),
            Self::MalformedFrame => write!(f, "malformed instruction frame"),
            Self::BurstOutsideSequentialMode => {
                write!(f, "multi-byte burst outside sequential mode")
            }
        }
    }
}

impl std::error::Error for EmulatorError {}

impl embedded_hal::spi::Error for EmulatorError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Behavioral model of a 23LC1024 on an exclusive SPI bus.
///
/// Each [`SpiDevice::transaction`] call is one chip-select frame; the
/// emulator counts them so tests can assert framing discipline.
pub struct EmulatedSram {
    mem: Vec<u8>,
    mode: u8,
    absent: bool,
    transactions: u64,
    ok_before_fault: u64,
    faults_pending: u64,
}

impl Default for EmulatedSram {
    fn default() -> Self {
        Self::new()
    }
}

impl EmulatedSram {
    /// A full-size 23LC1024, zero-filled, in sequential mode.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(PART_CAPACITY)
    }

    /// A part with an arbitrary capacity (minimum 1 byte), for invariant
    /// tests at toy sizes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            mem: vec![0; capacity.max(1)],
            mode: MODE_SEQUENTIAL,
            absent: false,
            transactions: 0,
            ok_before_fault: 0,
            faults_pending: 0,
        }
    }

    /// An unpopulated footprint: writes are ignored, reads float high.
    #[must_use]
    pub fn absent() -> Self {
        Self {
            absent: true,
            ..Self::new()
        }
    }

    /// Schedule a fault window: the next `after_ok` transactions succeed,
    /// the `count` after that fail with [`EmulatorError::InjectedFault`],
    /// then the bus recovers.
    pub fn inject_faults(&mut self, after_ok: u64, count: u64) {
        self.ok_before_fault = after_ok;
        self.faults_pending = count;
    }

    /// Chip-select frames seen so far (including faulted ones).
    #[must_use]
    pub fn transaction_count(&self) -> u64 {
        self.transactions
    }

    /// Current mode-register value.
    #[must_use]
    pub fn mode(&self) -> u8 {
        self.mode
    }

    /// Emulated array capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.mem.len()
    }

    /// The backing array, for asserting physical byte placement.
    #[must_use]
    pub fn mem(&self) -> &[u8] {
        &self.mem
    }

    fn take_fault(&mut self) -> bool {
        if self.ok_before_fault > 0 {
            self.ok_before_fault -= 1;
            return false;
        }
        if self.faults_pending > 0 {
            self.faults_pending -= 1;
            return true;
        }
        false
    }

    fn data_phase(
        &mut self,
        opcode: u8,
        mut cursor: usize,
        operations: &mut [Operation<'_, u8>],
    ) -> Result<(), EmulatorError> {
        let total: usize = operations
            .iter()
            .map(|op| match op {
                Operation::Read(buf) => buf.len(),
                Operation::Write(data) => data.len(),
                Operation::TransferInPlace(buf) => buf.len(),
                Operation::Transfer(read, write) => read.len().max(write.len()),
                Operation::DelayNs(_) => 0,
            })
            .sum();
        if self.mode != MODE_SEQUENTIAL && total > 1 {
            return Err(EmulatorError::BurstOutsideSequentialMode);
        }

        for op in operations.iter_mut() {
            match (opcode, op) {
                (CMD_READ, Operation::Read(buf)) => {
                    for slot in buf.iter_mut() {
                        *slot = if self.absent { 0xFF } else { self.mem[cursor] };
                        cursor = (cursor + 1) % self.mem.len();
                    }
                }
                (CMD_WRITE, Operation::Write(data)) => {
                    for &byte in data.iter() {
                        if !self.absent {
                            self.mem[cursor] = byte;
                        }
                        cursor = (cursor + 1) % self.mem.len();
                    }
                }
                (_, Operation::DelayNs(_)) => {}
                _ => return Err(EmulatorError::MalformedFrame),
            }
        }
        Ok(())
    }

    fn decode(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), EmulatorError> {
        let Some((header_op, rest)) = operations.split_first_mut() else {
            return Err(EmulatorError::MalformedFrame);
        };
        let Operation::Write(header) = header_op else {
            return Err(EmulatorError::MalformedFrame);
        };
        let Some((&opcode, addr_bytes)) = header.split_first() else {
            return Err(EmulatorError::MalformedFrame);
        };

        match opcode {
            CMD_WRMR => {
                let [mode] = addr_bytes else {
                    return Err(EmulatorError::MalformedFrame);
                };
                if !rest.is_empty() {
                    return Err(EmulatorError::MalformedFrame);
                }
                if !self.absent {
                    self.mode = *mode;
                }
                Ok(())
            }
            CMD_RDMR => {
                if !addr_bytes.is_empty() {
                    return Err(EmulatorError::MalformedFrame);
                }
                let [Operation::Read(buf)] = rest else {
                    return Err(EmulatorError::MalformedFrame);
                };
                let answer = if self.absent { 0xFF } else { self.mode };
                buf.fill(answer);
                Ok(())
            }
            CMD_READ | CMD_WRITE => {
                let [hi, mid, lo] = addr_bytes else {
                    return Err(EmulatorError::MalformedFrame);
                };
                let addr = usize::from(*hi) << 16 | usize::from(*mid) << 8 | usize::from(*lo);
                let cursor = addr % self.mem.len();
                self.data_phase(opcode, cursor, rest)
            }
            other => Err(EmulatorError::UnknownOpcode(other)),
        }
    }
}

impl ErrorType for EmulatedSram {
    type Error = EmulatorError;
}

impl SpiDevice for EmulatedSram {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        self.transactions += 1;
        if self.take_fault() {
            return Err(EmulatorError::InjectedFault);
        }
        self.decode(operations)
    }
}

/// Shareable handle around an [`EmulatedSram`].
///
/// The buffer engine consumes its `SpiDevice` by value; tests that need to
/// poke the emulator afterwards (inject faults, inspect the array) hand
/// the engine a `SharedSram` and keep a clone for themselves.
#[derive(Clone)]
pub struct SharedSram {
    inner: std::rc::Rc<std::cell::RefCell<EmulatedSram>>,
}

impl SharedSram {
    /// Wrap an emulator in a shareable handle.
    #[must_use]
    pub fn new(sram: EmulatedSram) -> Self {
        Self {
            inner: std::rc::Rc::new(std::cell::RefCell::new(sram)),
        }
    }

    /// Run `f` with exclusive access to the emulator.
    pub fn with<R>(&self, f: impl FnOnce(&mut EmulatedSram) -> R) -> R {
        f(&mut self.inner.borrow_mut())
    }
}

impl ErrorType for SharedSram {
    type Error = EmulatorError;
}

impl SpiDevice for SharedSram {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        self.inner.borrow_mut().transaction(operations)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

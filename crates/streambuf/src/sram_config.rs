//! 23LC1024 serial SRAM constants and bus configuration.
//!
//! The jitter buffer is backed by a Microchip 23LC1024 — 1 Mbit (128 KB)
//! SPI serial SRAM, SOIC-8/PDIP-8, unlimited write endurance.
//!
//! # Hardware
//!
//! **SRAM chip:** 23LC1024 (Microchip) — 131,072 × 8 bit, 20 MHz max
//!
//! **Instruction set (23LC1024 datasheet DS20005142, Table 2-1):**
//! - `READ (0x03)` — 24-bit address, then data out; address auto-increments
//! - `WRITE (0x02)` — 24-bit address, then data in; address auto-increments
//! - `RDMR (0x05)` — read the mode register
//! - `WRMR (0x01)` — write the mode register
//!
//! Only bits 16:0 of the address are decoded; the upper 7 bits are
//! don't-care. Auto-increment wraps at the end of the array in sequential
//! mode, so a burst never has to be broken up for the chip's sake; the
//! buffer layer splits bursts only at its own capacity boundary.
//!
//! The reference board wires the chip to the shared SPI bus with a
//! dedicated select line (GPIO10) and clocks it at 13 MHz, comfortably
//! below the 20 MHz rating to absorb wiring and level-shifter slack.

use thiserror_no_std::Error;

/// READ instruction: 24-bit address follows, data streams out.
pub const SRAM_CMD_READ: u8 = 0x03;
/// WRITE instruction: 24-bit address follows, data streams in.
pub const SRAM_CMD_WRITE: u8 = 0x02;
/// RDMR instruction: read the one-byte mode register.
pub const SRAM_CMD_RDMR: u8 = 0x05;
/// WRMR instruction: write the one-byte mode register.
pub const SRAM_CMD_WRMR: u8 = 0x01;

/// Mode register value for byte mode (bits 7:6 = `00`): one byte per frame.
pub const SRAM_MODE_BYTE: u8 = 0x00;
/// Mode register value for page mode (bits 7:6 = `10`): 32-byte page wrap.
pub const SRAM_MODE_PAGE: u8 = 0x80;
/// Mode register value for sequential mode (bits 7:6 = `01`).
///
/// Sequential mode auto-increments across the whole array; it is the only
/// mode this driver operates in, and is written and verified at bring-up.
pub const SRAM_MODE_SEQUENTIAL: u8 = 0x40;

/// Total capacity of the 23LC1024 in bytes (1 Mbit).
pub const SRAM_CAPACITY_BYTES: u32 = 131_072;

/// 23LC1024 maximum rated SPI clock (Hz), VCC ≥ 2.5 V (datasheet §1.0).
pub const SRAM_MAX_FREQ_HZ: u32 = 20_000_000;

/// Reference-design SPI clock (Hz): 13 MHz leaves margin under the 20 MHz
/// rating for board wiring and transaction overhead.
pub const SRAM_FREQ_HZ: u32 = 13_000_000;

/// Widest address the 3-byte instruction field can carry.
pub const SRAM_ADDR_FIELD_LIMIT: u32 = 1 << 24;

/// Invalid buffer-bus configuration.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The requested SPI clock exceeds the SRAM's rated maximum.
    #[error("bus clock {requested_hz} Hz exceeds the rated maximum {max_hz} Hz")]
    ClockTooFast {
        /// Clock the caller asked for, in Hz.
        requested_hz: u32,
        /// Rated maximum of the part, in Hz.
        max_hz: u32,
    },
    /// A zero clock rate means the bus was never configured.
    #[error("bus clock must be nonzero")]
    ClockZero,
    /// Capacity must hold at least one data byte plus the reserved byte.
    #[error("capacity {capacity} is too small (minimum 2 bytes)")]
    CapacityTooSmall {
        /// Rejected capacity value.
        capacity: u32,
    },
    /// Capacity must be reachable through the 24-bit address field.
    #[error("capacity {capacity} exceeds the 24-bit instruction address field")]
    CapacityNotAddressable {
        /// Rejected capacity value.
        capacity: u32,
    },
}

/// Buffer-device configuration, fixed for the life of the process.
///
/// The select-line identity is not part of this struct: it is bound into
/// the [`embedded_hal::spi::SpiDevice`] handle the caller constructs (e.g.
/// via `embedded-hal-bus`'s `ExclusiveDevice`), which asserts and deasserts
/// it around every transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SramConfig {
    /// SPI clock the bus was configured for, in Hz. Validated against
    /// [`SRAM_MAX_FREQ_HZ`]; the HAL applies the actual rate.
    pub clock_hz: u32,
    /// Addressable capacity of the installed part, in bytes.
    pub capacity: u32,
}

impl Default for SramConfig {
    /// Reference design: 23LC1024 at 13 MHz.
    fn default() -> Self {
        Self {
            clock_hz: SRAM_FREQ_HZ,
            capacity: SRAM_CAPACITY_BYTES,
        }
    }
}

impl SramConfig {
    /// Check the configuration against the installed part's limits.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the first violated limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock_hz == 0 {
            return Err(ConfigError::ClockZero);
        }
        if self.clock_hz > SRAM_MAX_FREQ_HZ {
            return Err(ConfigError::ClockTooFast {
                requested_hz: self.clock_hz,
                max_hz: SRAM_MAX_FREQ_HZ,
            });
        }
        if self.capacity < 2 {
            return Err(ConfigError::CapacityTooSmall {
                capacity: self.capacity,
            });
        }
        if self.capacity > SRAM_ADDR_FIELD_LIMIT {
            return Err(ConfigError::CapacityNotAddressable {
                capacity: self.capacity,
            });
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn instruction_opcodes_match_datasheet() {
        assert_eq!(SRAM_CMD_READ, 0x03);
        assert_eq!(SRAM_CMD_WRITE, 0x02);
        assert_eq!(SRAM_CMD_RDMR, 0x05);
        assert_eq!(SRAM_CMD_WRMR, 0x01);
    }

    #[test]
    fn mode_register_values_occupy_bits_7_6_only() {
        for mode in [SRAM_MODE_BYTE, SRAM_MODE_PAGE, SRAM_MODE_SEQUENTIAL] {
            assert_eq!(mode & 0b0011_1111, 0, "mode bits live in 7:6");
        }
    }

    #[test]
    fn mode_register_values_are_distinct() {
        assert_ne!(SRAM_MODE_BYTE, SRAM_MODE_PAGE);
        assert_ne!(SRAM_MODE_BYTE, SRAM_MODE_SEQUENTIAL);
        assert_ne!(SRAM_MODE_PAGE, SRAM_MODE_SEQUENTIAL);
    }

    #[test]
    fn capacity_is_one_megabit() {
        assert_eq!(SRAM_CAPACITY_BYTES, 1024 * 1024 / 8);
    }

    /// Reference clock must sit under the rated maximum with real margin.
    #[test]
    fn reference_clock_is_below_rated_maximum() {
        assert!(SRAM_FREQ_HZ < SRAM_MAX_FREQ_HZ);
    }

    #[test]
    fn default_config_validates() {
        assert_eq!(SramConfig::default().validate(), Ok(()));
    }

    #[test]
    fn overclocked_config_is_rejected() {
        let config = SramConfig {
            clock_hz: 25_000_000,
            ..SramConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ClockTooFast {
                requested_hz: 25_000_000,
                max_hz: SRAM_MAX_FREQ_HZ,
            })
        );
    }

    #[test]
    fn zero_clock_is_rejected() {
        let config = SramConfig {
            clock_hz: 0,
            ..SramConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ClockZero));
    }

    /// Capacity 1 cannot hold the reserved byte plus any data.
    #[test]
    fn degenerate_capacity_is_rejected() {
        for capacity in [0, 1] {
            let config = SramConfig {
                capacity,
                ..SramConfig::default()
            };
            assert_eq!(
                config.validate(),
                Err(ConfigError::CapacityTooSmall { capacity })
            );
        }
    }

    #[test]
    fn capacity_beyond_address_field_is_rejected() {
        let config = SramConfig {
            capacity: SRAM_ADDR_FIELD_LIMIT + 1,
            ..SramConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::CapacityNotAddressable {
                capacity: SRAM_ADDR_FIELD_LIMIT + 1,
            })
        );
    }
}

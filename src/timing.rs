//! Bit-timing calculation for the ECAN baud-rate generator.
//!
//! One CAN bit is always segmented into 16 time quanta here (1 sync + 4
//! propagation + 8 phase-1 + 3 phase-2), which places the sample point at
//! 80% of bit time as the datasheet recommends. With the segmentation
//! fixed, only the baud-rate prescaler has to be computed:
//!
//! ```text
//! TBIT = 1000 / bit_rate_kbps µs = 16 TQ
//! TQ (µs) = 2 * (BRP + 1) / clock_mhz
//! => BRP = (1000 * clock_mhz) / (32 * bit_rate_kbps) - 1
//! ```
//!
//! e.g. 125 kbps at 40 MHz gives BRP = 9, 250 kbps gives BRP = 4.
//!
//! The calculator is pure and `const`-capable, so timings can be computed
//! at compile time for a fixed board configuration.

use crate::consts::{BRGCON2_FIXED, BRGCON3_FIXED, PRESCALER_MASK};

/// The three baud-rate generator register values for one bus speed.
///
/// Only `brgcon1` varies with the requested bit rate; the other two
/// registers carry the permanent 16-TQ segmentation and are the same for
/// every configuration.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct BitTiming {
    /// BRGCON1: SJW = 1 in the top two bits, prescaler in the low six.
    pub brgcon1: u8,
    /// BRGCON2: propagation and phase-1 segment configuration.
    pub brgcon2: u8,
    /// BRGCON3: phase-2 segment configuration.
    pub brgcon3: u8,
}

impl BitTiming {
    /// Computes the register values for the given bus bit rate and
    /// peripheral clock.
    ///
    /// # Arguments
    /// - `bit_rate_kbps`: target bit rate in kbit/s. Must be nonzero; the
    ///   16-TQ segmentation supports at most 500 kbps.
    /// - `clock_mhz`: peripheral clock in MHz (mind that PLL settings may
    ///   affect this).
    ///
    /// The prescaler is masked to its six-bit field; a combination that
    /// does not fit wraps silently rather than erroring, like every other
    /// codec in this crate.
    pub const fn new(bit_rate_kbps: u16, clock_mhz: u16) -> Self {
        let brp = (1000 * clock_mhz as u32) / (32 * bit_rate_kbps as u32) - 1;
        Self {
            brgcon1: (brp as u8) & PRESCALER_MASK,
            brgcon2: BRGCON2_FIXED,
            brgcon3: BRGCON3_FIXED,
        }
    }
}

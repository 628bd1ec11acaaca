//! Constants shared across the ECAN driver.
//!
//! This module collects the fixed register values and protocol-wide limits
//! used by the driver: the two acceptance-mask patterns, the permanent
//! bit-timing segmentation, and the small tuning knobs of the mode
//! handshake.
//!
//! ## Key Concepts
//!
//! - **Acceptance masks**: a mask bit set to 1 means the corresponding
//!   identifier bit must match the filter bank's stored value. The mask is
//!   a single shared hardware resource (see
//!   [`CanDriver::set_strict_filter`](crate::driver::CanDriver::set_strict_filter)).
//! - **Bit segmentation**: one CAN bit is always composed of 16 time
//!   quanta here; only the prescaler is computed per configuration.
//! - **Settle cycles**: idle cycles inserted between mode re-assertions,
//!   because the peripheral may take a few cycles to honor a request.

/// Maximum data payload of a single CAN frame, in bytes.
pub const MAX_DATA_LEN: usize = 8;

/// High mask byte for a strict receive filter: identifier bits \[10:3\]
/// must all match.
pub const STRICT_MASK_HIGH: u8 = 0b1111_1111;

/// Low mask byte for a strict receive filter: identifier bits \[2:0\] must
/// match, and bit 3 keeps the standard/extended format selector in the
/// comparison so extended frames never slip through.
pub const STRICT_MASK_LOW: u8 = 0b1110_1000;

/// High mask byte for a first-bit node filter: only the three message-type
/// bits and the most significant node-id bit must match. The remaining
/// seven node-id bits are wildcarded, admitting a contiguous half-range of
/// node ids.
pub const FIRST_BIT_MASK_HIGH: u8 = 0b1111_0000;

/// Low mask byte for a first-bit node filter. Keeps the format selector
/// bit in the comparison, everything else wildcarded.
pub const FIRST_BIT_MASK_LOW: u8 = 0b0000_1000;

/// Number of time quanta in one bit period: 1 sync + 4 propagation +
/// 8 phase-1 + 3 phase-2, placing the sample point at 80% of bit time.
pub const TQ_PER_BIT: u16 = 16;

/// Fixed BRGCON2 value: phase-2 programmable, sampled once, phase-1
/// segment = 8 TQ, propagation segment = 4 TQ.
pub const BRGCON2_FIXED: u8 = 0b1011_1011;

/// Fixed BRGCON3 value: wake-up enabled, no line filter, phase-2
/// segment = 3 TQ.
pub const BRGCON3_FIXED: u8 = 0b0000_0010;

/// The baud-rate prescaler occupies the low six bits of BRGCON1; the two
/// high bits select SJW = 1.
pub const PRESCALER_MASK: u8 = 0b0011_1111;

/// Idle cycles between re-asserting a mode request and re-reading the
/// status register.
pub const MODE_SETTLE_CYCLES: u8 = 5;

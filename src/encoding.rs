//! Identifier and payload-byte codecs for the ECAN message protocol.
//!
//! This module implements the bit-exact mapping between the logical
//! protocol header (node id + message type) and the two hardware
//! identifier registers, plus the packing of the single status byte
//! carried in normal and heartbeat frames.
//!
//! ## Identifier layout
//!
//! The 11-bit standard identifier is built as
//! `id = (message_type << 8) | node_id`. The message type deliberately
//! occupies the high bits so that receive filters can match on it cheaply.
//! The two identifier registers then hold:
//!
//! - high byte: identifier bits \[10:3\]
//! - low byte: identifier bits \[2:0\] in bits \[7:5\]; bits \[4:0\] are
//!   written as 0, which also clears the extended-format selector so only
//!   standard identifiers are ever produced.
//!
//! ## Status byte layout
//!
//! | bits | field |
//! |------|------------------|
//! | 7:6  | [`Operation`] |
//! | 5    | CAN error flag |
//! | 4:3  | firmware version |
//! | 2:0  | switch counter |
//!
//! ## Truncation, not validation
//!
//! Every encoder masks each field to its declared width before placement.
//! Out-of-range inputs wrap silently; there is no error path. This keeps
//! the codecs branch-free for use on the receive interrupt path.

use embedded_can::StandardId;

/// Type of a CAN message, carried in the high three identifier bits.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
#[repr(u8)]
pub enum MessageType {
    /// A message sent by a node to reveal some action it performed.
    #[default]
    Normal = 0,
    /// Sent by a node on a timer to signal liveness.
    Heartbeat = 1,
    /// Typically sent by a master node to set up the receiving node.
    Config = 2,
    /// Carries a multi-frame command, extending [`MessageType::Normal`].
    Complex = 3,
    /// Reply to a [`MessageType::Complex`] message.
    ComplexReply = 4,
}

impl MessageType {
    /// Returns the three-bit wire value of this message type.
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Maps a raw three-bit value back to a message type.
    ///
    /// The input is masked to three bits first. The three patterns with no
    /// assigned meaning (5 through 7) fold to [`MessageType::Normal`];
    /// they never appear on a conforming bus.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            1 => Self::Heartbeat,
            2 => Self::Config,
            3 => Self::Complex,
            4 => Self::ComplexReply,
            _ => Self::Normal,
        }
    }
}

/// Operation requested of (or reported by) a node, carried in the top two
/// bits of the status byte.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
#[repr(u8)]
pub enum Operation {
    /// Toggle the output.
    #[default]
    Toggle = 0b00,
    /// Switch the output on.
    On = 0b01,
    /// Switch the output off.
    Off = 0b10,
    /// Query the output state.
    Get = 0b11,
}

impl Operation {
    /// Returns the two-bit wire value of this operation.
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Maps a raw two-bit value back to an operation. All four patterns
    /// are assigned, so this is total.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b01 => Self::On,
            0b10 => Self::Off,
            0b11 => Self::Get,
            _ => Self::Toggle,
        }
    }
}

/// Logical header of a CAN message: which node it concerns and what kind
/// of message it is. Bijectively maps to the 11-bit bus identifier.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Header {
    /// The node id. Occupies the low eight identifier bits.
    pub node_id: u8,
    /// The message type. Occupies the high three identifier bits.
    pub message_type: MessageType,
}

impl Header {
    /// Creates a header for the given node and message type.
    pub const fn new(node_id: u8, message_type: MessageType) -> Self {
        Self {
            node_id,
            message_type,
        }
    }

    /// Returns the 11-bit bus identifier for this header.
    pub const fn can_id(self) -> u16 {
        ((self.message_type.bits() as u16) << 8) | self.node_id as u16
    }

    /// Encodes this header into the (high, low) identifier register pair.
    ///
    /// The high byte takes identifier bits \[10:3\]; the low byte takes
    /// bits \[2:0\] shifted into its top three bits. The low five bits of
    /// the low byte are written as 0, selecting the standard identifier
    /// format (never the extended one).
    pub const fn to_id_bytes(self) -> (u8, u8) {
        let id = self.can_id();
        let high = (id >> 3) as u8;
        let low = ((id & 0b111) << 5) as u8;
        (high, low)
    }

    /// Decodes the (high, low) identifier register pair back into a
    /// header. Exact inverse of [`Header::to_id_bytes`] for every value
    /// that function can produce.
    pub const fn from_id_bytes(high: u8, low: u8) -> Self {
        let id = (((high as u16) << 8) | low as u16) >> 5;
        Self {
            node_id: id as u8,
            message_type: MessageType::from_bits((id >> 8) as u8),
        }
    }

    /// Returns this header's identifier as an [`embedded_can::StandardId`].
    pub const fn standard_id(self) -> StandardId {
        // SAFETY: can_id() is at most (0b111 << 8) | 0xFF = 0x7FF, which
        // is StandardId::MAX.
        unsafe { StandardId::new_unchecked(self.can_id()) }
    }
}

impl From<Header> for StandardId {
    fn from(header: Header) -> Self {
        header.standard_id()
    }
}

impl From<StandardId> for Header {
    fn from(id: StandardId) -> Self {
        let raw = id.as_raw();
        Self {
            node_id: raw as u8,
            message_type: MessageType::from_bits((raw >> 8) as u8),
        }
    }
}

/// Packs the protocol status byte from its four fields.
///
/// Each field is masked to its declared width before placement, so
/// over-wide values wrap instead of erroring.
pub const fn encode_status_byte(
    operation: Operation,
    can_error: bool,
    firmware_version: u8,
    switch_counter: u8,
) -> u8 {
    ((operation.bits() & 0b11) << 6)
        | ((can_error as u8) << 5)
        | ((firmware_version & 0b11) << 3)
        | (switch_counter & 0b111)
}

/// Extracts the [`Operation`] from a received status byte.
///
/// The operation sits in the top two bits, so a plain right shift is
/// enough; no mask is needed. The other fields are write-only from this
/// node's perspective and have no decoder.
pub const fn decode_operation(byte: u8) -> Operation {
    Operation::from_bits(byte >> 6)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips_for_all_valid_inputs() {
        for raw_type in 0u8..=4 {
            for node_id in 0u8..=255 {
                let header = Header::new(node_id, MessageType::from_bits(raw_type));
                let (high, low) = header.to_id_bytes();
                assert_eq!(Header::from_id_bytes(high, low), header);
            }
        }
    }

    #[test]
    fn id_bytes_match_register_layout() {
        // id = (2 << 8) | 5 = 0b010_0000_0101
        let header = Header::new(5, MessageType::Config);
        let (high, low) = header.to_id_bytes();
        assert_eq!(high, 0b0100_0000);
        assert_eq!(low, 0b1010_0000);
    }

    #[test]
    fn low_id_byte_keeps_standard_format_selector_clear() {
        for node_id in 0u8..=255 {
            let (_, low) = Header::new(node_id, MessageType::ComplexReply).to_id_bytes();
            assert_eq!(low & 0b0001_1111, 0);
        }
    }

    #[test]
    fn standard_id_carries_the_full_eleven_bits() {
        let header = Header::new(0xFF, MessageType::ComplexReply);
        assert_eq!(header.standard_id().as_raw(), 0x4FF);
        assert_eq!(Header::from(header.standard_id()), header);
    }

    #[test]
    fn operation_round_trips_through_status_byte() {
        for raw_op in 0u8..=3 {
            for error in [false, true] {
                for firmware in 0u8..=3 {
                    for counter in 0u8..=7 {
                        let operation = Operation::from_bits(raw_op);
                        let byte = encode_status_byte(operation, error, firmware, counter);
                        assert_eq!(decode_operation(byte), operation);
                    }
                }
            }
        }
    }

    #[test]
    fn status_byte_fields_land_at_their_offsets() {
        let byte = encode_status_byte(Operation::Off, true, 0b01, 0b101);
        assert_eq!(byte, 0b10_1_01_101);
    }

    #[test]
    fn status_byte_truncates_wide_fields() {
        // firmware 0b111 wraps to 0b11, counter 0b1111 wraps to 0b111
        let byte = encode_status_byte(Operation::Toggle, false, 0b111, 0b1111);
        assert_eq!(byte, 0b00_0_11_111);
    }

    #[test]
    fn undefined_message_type_patterns_fold_to_normal() {
        for raw in 5u8..=7 {
            assert_eq!(MessageType::from_bits(raw), MessageType::Normal);
        }
        assert_eq!(MessageType::from_bits(0b1000 | 2), MessageType::Config);
    }
}

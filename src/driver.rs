//! CAN driver for the ECAN peripheral.
//!
//! This module provides the [`CanDriver`] struct, which owns a
//! [`CanRegisters`] register bank and sequences the peripheral through
//! initialization, operating-mode changes, bit-timing setup, receive
//! filtering and frame transmission.
//!
//! ## Control flow
//!
//! An application initializes the driver once, configures the bus speed
//! and target mode (usually through [`CanDriver::configure`]), arms zero
//! to two receive filters, and then hands frames to
//! [`CanDriver::send`] or [`CanDriver::send_synchronous`] as they come
//! up. Received frames are consumed from the receive interrupt through
//! [`CanDriver::read_received`].
//!
//! ## Example
//!
//! ```rust
//! use ecan18::driver::{CanDriver, CanMessage, Settings};
//! use ecan18::encoding::{Header, MessageType};
//! use ecan18::mock::MockRegisters;
//! use ecan18::regs::PinRouting;
//!
//! let mut driver = CanDriver::new(MockRegisters::new(), PinRouting::Primary);
//! driver.configure(&Settings::default());
//!
//! let header = Header::new(0x12, MessageType::Normal);
//! driver.send(&CanMessage::new(header, &[0x42]));
//! ```
//!
//! ## Blocking behavior
//!
//! All waiting in this driver is an unbounded busy-spin on a hardware
//! flag; there is no sleep or yield on this platform and no timeout. A
//! wedged peripheral therefore hangs the caller, which the datasheet
//! accepts as a hardware-fault condition. Callers that need bounded waits
//! must wrap these operations externally.
//!
//! ## Interrupt model
//!
//! The driver masks no interrupts around its register sequences; the
//! receive interrupt may run between any two of them. Cross-context
//! sharing of the driver object itself is provided by the helpers in
//! [`crate::isr`]. The one field both contexts write is
//! [`CanDriver::status`]: the driver only ever stores
//! [`StatusCode::Sending`] and [`StatusCode::NothingSent`]; moving on to
//! [`StatusCode::Ok`] or [`StatusCode::Error`] is the application's job
//! once it has observed the hardware outcome, via
//! [`CanDriver::complete_send`].

use crate::consts::{
    FIRST_BIT_MASK_HIGH, FIRST_BIT_MASK_LOW, MAX_DATA_LEN, MODE_SETTLE_CYCLES, STRICT_MASK_HIGH,
    STRICT_MASK_LOW,
};
use crate::encoding::Header;
use crate::regs::{CanRegisters, FilterBank, PinRouting};
use crate::timing::BitTiming;
use embedded_can::{Frame, Id};
use heapless::Vec;
use nb::block;

use core::convert::Infallible;

/// Operating modes of the ECAN peripheral.
///
/// The discriminants are the hardware REQOP/OPMODE codes and must be kept
/// bit-for-bit; they go straight into the mode request register.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
#[repr(u8)]
pub enum OpMode {
    /// Configuration mode. Bit timing and filters may only be changed
    /// here. This is also the peripheral's power-on state.
    #[default]
    Config = 0b100,
    /// Loopback mode: frames are routed back internally without touching
    /// the bus.
    Loopback = 0b010,
    /// Sleep mode.
    Sleep = 0b001,
    /// Normal bus operation.
    Normal = 0b000,
}

impl OpMode {
    /// Returns the three-bit hardware code of this mode.
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

/// Result code of the last requested transmission.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
#[repr(u8)]
pub enum StatusCode {
    /// The frame was confirmed sent. Never written by the driver itself;
    /// set by the application after observing hardware completion.
    Ok = 0,
    /// The send failed. Never written by the driver itself.
    Error = 1,
    /// A send has been handed to the hardware and has not been confirmed
    /// yet.
    Sending = 2,
    /// No send was requested since the last reset.
    #[default]
    NothingSent = 3,
}

/// Status and time of the last CAN send.
///
/// The driver only ever stores [`StatusCode::NothingSent`] (at reset) and
/// [`StatusCode::Sending`] (when a transmit is handed off). Keeping the
/// record up to date afterwards, including the timestamp, is the
/// application's responsibility.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct MessageStatus {
    /// Result code of the last send.
    pub code: StatusCode,
    /// Time of the last update, in whatever unit the application chooses.
    pub timestamp: u16,
}

/// A CAN frame in this protocol: a [`Header`] plus up to eight data
/// bytes.
#[derive(PartialEq, Eq, Clone, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct CanMessage {
    /// Logical header; becomes the 11-bit bus identifier.
    pub header: Header,
    /// Data payload. Only the bytes actually present are ever written to
    /// the transmit registers.
    pub data: Vec<u8, MAX_DATA_LEN>,
}

impl CanMessage {
    /// Creates a message for the given header, copying at most
    /// [`MAX_DATA_LEN`] bytes of `data`. Longer input is silently
    /// truncated, in line with the rest of the protocol's codecs.
    pub fn new(header: Header, data: &[u8]) -> Self {
        let take = data.len().min(MAX_DATA_LEN);
        let mut buf = Vec::new();
        let _ = buf.extend_from_slice(&data[..take]);
        Self { header, data: buf }
    }
}

impl Frame for CanMessage {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > MAX_DATA_LEN {
            return None;
        }
        match id.into() {
            // This protocol only speaks standard identifiers.
            Id::Standard(id) => Some(Self::new(Header::from(id), data)),
            Id::Extended(_) => None,
        }
    }

    fn new_remote(_id: impl Into<Id>, _dlc: usize) -> Option<Self> {
        // Remote frames are not part of this protocol.
        None
    }

    fn is_extended(&self) -> bool {
        false
    }

    fn is_remote_frame(&self) -> bool {
        false
    }

    fn id(&self) -> Id {
        Id::Standard(self.header.standard_id())
    }

    fn dlc(&self) -> usize {
        self.data.len()
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Bus settings applied by [`CanDriver::configure`].
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Settings {
    /// Operating mode to enter once the bus is configured.
    pub mode: OpMode,
    /// Bus bit rate in kbit/s (at most 500 with this segmentation).
    pub bit_rate_kbps: u16,
    /// Peripheral clock in MHz.
    pub clock_mhz: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: OpMode::Normal,
            bit_rate_kbps: 125,
            clock_mhz: 40,
        }
    }
}

/// Driver for one ECAN peripheral.
///
/// Generic over the [`CanRegisters`] register bank so the same logic runs
/// against real memory-mapped registers on target and against the
/// in-memory `mock::MockRegisters` bank in tests.
#[derive(Debug)]
pub struct CanDriver<R: CanRegisters> {
    /// The register bank. Public so the application's receive interrupt
    /// can reach registers the driver does not manage.
    pub regs: R,
    /// Status of the last send. See [`MessageStatus`] for the ownership
    /// split between driver and application.
    pub status: MessageStatus,
    routing: PinRouting,
    filter_count: u8,
}

impl<R: CanRegisters> CanDriver<R> {
    /// Creates a driver and initializes the peripheral: configures the
    /// pin directions for `routing`, sets the drive-high stability bit
    /// and resets all driver-owned state.
    pub fn new(regs: R, routing: PinRouting) -> Self {
        let mut driver = Self {
            regs,
            status: MessageStatus::default(),
            routing,
            filter_count: 0,
        };
        driver.reset();
        driver
    }

    /// Re-runs initialization as a full state reset. Idempotent and safe
    /// to call at any time; filters must be armed again afterwards.
    pub fn reset(&mut self) {
        self.regs.configure_pins(self.routing);
        self.regs.enable_drive_high();
        self.status = MessageStatus {
            code: StatusCode::NothingSent,
            timestamp: 0,
        };
        self.filter_count = 0;
    }

    /// Number of receive filters armed since the last reset.
    pub fn filters_configured(&self) -> u8 {
        self.filter_count
    }

    /// Drives the peripheral into `mode`, blocking until the status
    /// register reports it.
    ///
    /// If the peripheral already reports `mode` this is a no-op with zero
    /// hardware writes; re-requesting the active mode has been observed
    /// to silently fail. Otherwise the request is re-asserted every few
    /// settle cycles until the status catches up, because a single
    /// request is not reliably acknowledged either. The wait is
    /// unbounded.
    pub fn set_mode(&mut self, mode: OpMode) {
        if self.regs.op_mode() == mode.bits() {
            return;
        }

        #[cfg(feature = "log")]
        log::trace!("requesting op mode {:?}", mode);

        loop {
            self.regs.request_op_mode(mode.bits());
            for _ in 0..MODE_SETTLE_CYCLES {
                self.regs.idle();
            }
            if self.regs.op_mode() == mode.bits() {
                break;
            }
        }
    }

    /// Writes precomputed bit-timing registers. The peripheral must be in
    /// [`OpMode::Config`] for the write to take effect.
    pub fn set_bit_timing(&mut self, timing: BitTiming) {
        self.regs.write_bit_timing(&timing);
    }

    /// Computes and writes the bit timing for the given bus speed and
    /// clock. See [`BitTiming::new`] for the derivation.
    pub fn set_baud_rate(&mut self, bit_rate_kbps: u16, clock_mhz: u16) {
        self.set_bit_timing(BitTiming::new(bit_rate_kbps, clock_mhz));
    }

    /// Applies `settings` in the required order: enter configuration
    /// mode, write the bit timing, then enter the requested operating
    /// mode. Receive filters, if any, should be armed while still in
    /// [`OpMode::Config`], so arm them before calling this or use the
    /// individual steps directly.
    pub fn configure(&mut self, settings: &Settings) {
        self.set_mode(OpMode::Config);
        self.set_baud_rate(settings.bit_rate_kbps, settings.clock_mhz);
        self.set_mode(settings.mode);
    }

    /// Arms the next free filter bank to accept only frames whose
    /// identifier matches `header` exactly.
    ///
    /// The first call since reset uses bank 0, every later call bank 1 —
    /// a hard two-bank ceiling. The bank is enabled, the shared
    /// acceptance mask is set to require all eleven identifier bits plus
    /// the format-selector bit, and the receive-complete interrupt for
    /// buffer 0 is enabled.
    ///
    /// The acceptance mask is one shared hardware resource, not per-bank
    /// state: whichever filter setup runs last owns it, and an earlier
    /// strict filter is silently loosened by a later
    /// [`CanDriver::set_first_bit_id_filter`]. That is the intended
    /// protocol behavior.
    pub fn set_strict_filter(&mut self, header: Header) {
        let bank = if self.filter_count == 0 {
            FilterBank::B0
        } else {
            FilterBank::B1
        };
        let (high, low) = header.to_id_bytes();
        self.regs.write_filter(bank, high, low);
        self.regs.enable_filter(bank);
        self.filter_count = self.filter_count.saturating_add(1);

        self.regs.write_mask(STRICT_MASK_HIGH, STRICT_MASK_LOW);

        // Strict matches are rare, so interrupting per frame is cheap.
        self.regs.enable_rx_interrupt();

        #[cfg(feature = "log")]
        log::debug!("filter bank {:?} armed for node {}", bank, header.node_id);
    }

    /// Arms a filter like [`CanDriver::set_strict_filter`], then loosens
    /// the shared acceptance mask to require only the message-type bits
    /// and the most significant node-id bit. This admits the contiguous
    /// half-range of node ids sharing that top bit, at the price of
    /// loosening every other armed filter too (see the shared-mask note
    /// on [`CanDriver::set_strict_filter`]).
    pub fn set_first_bit_id_filter(&mut self, header: Header) {
        self.set_strict_filter(header);
        self.regs.write_mask(FIRST_BIT_MASK_HIGH, FIRST_BIT_MASK_LOW);
    }

    fn transmit_idle(&mut self) -> nb::Result<(), Infallible> {
        if self.regs.tx_requested() {
            if self.regs.tx_errored() {
                // Abort is a nudge, not an exit: it should make the
                // hardware drop TXREQ, but the wait only ends once the
                // flag actually clears.
                self.regs.abort_transmissions();
            }
            Err(nb::Error::WouldBlock)
        } else {
            Ok(())
        }
    }

    /// Spins until the transmit buffer is free, requesting an abort
    /// whenever the transmit-error flag is seen during the wait.
    /// Unbounded, like every wait in this driver.
    pub fn wait_for_previous_send(&mut self) {
        let _ = block!(self.transmit_idle());
    }

    /// Hands `message` to the hardware for transmission and returns
    /// without waiting for completion.
    ///
    /// Marks the status [`StatusCode::Sending`], waits out any previous
    /// send still in the buffer, writes the identifier and exactly
    /// `message.data.len()` data registers (the rest keep their old
    /// contents), and sets the transmit-request flag. The status stays
    /// `Sending` until the application confirms the outcome with
    /// [`CanDriver::complete_send`].
    pub fn send(&mut self, message: &CanMessage) {
        self.status.code = StatusCode::Sending;

        self.wait_for_previous_send();

        let (high, low) = message.header.to_id_bytes();
        self.regs.write_tx_id(high, low);
        self.regs.write_tx_data_len(message.data.len() as u8);
        for (index, byte) in message.data.iter().enumerate() {
            self.regs.write_tx_data(index as u8, *byte);
        }

        self.regs.request_transmit();
    }

    /// Like [`CanDriver::send`], but additionally waits until the
    /// hardware clears the transmit-request flag before returning. The
    /// status is still left at [`StatusCode::Sending`]; completion
    /// bookkeeping stays with the application even here.
    pub fn send_synchronous(&mut self, message: &CanMessage) {
        self.send(message);
        self.wait_for_previous_send();
    }

    /// Records the outcome of the last send. Meant to be called from the
    /// application or its interrupt handler after it has inspected the
    /// hardware result; the driver never moves the status past
    /// [`StatusCode::Sending`] on its own.
    pub fn complete_send(&mut self, code: StatusCode, timestamp: u16) {
        self.status = MessageStatus { code, timestamp };
    }

    /// Reads the frame sitting in receive buffer 0 and clears its
    /// interrupt flag. Meant to be called from the receive interrupt
    /// handler once the hardware has flagged a completed reception.
    pub fn read_received(&mut self) -> CanMessage {
        let (high, low) = self.regs.rx_id();
        let header = Header::from_id_bytes(high, low);

        let len = (self.regs.rx_data_len() as usize & 0x0F).min(MAX_DATA_LEN);
        let mut data = Vec::new();
        for index in 0..len {
            let _ = data.push(self.regs.rx_data(index as u8));
        }

        self.regs.clear_rx_interrupt();
        CanMessage { header, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{BRGCON2_FIXED, BRGCON3_FIXED};
    use crate::encoding::MessageType;
    use crate::mock::MockRegisters;
    use embedded_can::{ExtendedId, StandardId};

    fn driver() -> CanDriver<MockRegisters> {
        CanDriver::new(MockRegisters::new(), PinRouting::Primary)
    }

    #[test]
    fn new_initializes_the_peripheral() {
        let driver = driver();
        assert_eq!(driver.regs.pin_routing, Some(PinRouting::Primary));
        assert!(driver.regs.drive_high_enabled);
        assert_eq!(driver.status.code, StatusCode::NothingSent);
        assert_eq!(driver.filters_configured(), 0);
    }

    #[test]
    fn reset_clears_driver_state_again() {
        let mut driver = driver();
        driver.set_strict_filter(Header::new(1, MessageType::Config));
        driver.status.code = StatusCode::Ok;

        driver.reset();
        assert_eq!(driver.status.code, StatusCode::NothingSent);
        assert_eq!(driver.filters_configured(), 0);
    }

    #[test]
    fn set_mode_when_already_active_writes_nothing() {
        let mut driver = driver();
        driver.set_mode(OpMode::Normal);
        assert_eq!(driver.regs.op_mode, OpMode::Normal.bits());

        let writes = driver.regs.writes;
        driver.set_mode(OpMode::Normal);
        assert_eq!(driver.regs.writes, writes);
    }

    #[test]
    fn set_mode_reasserts_until_acknowledged() {
        let mut driver = driver();
        driver.regs.mode_latency = 3;

        driver.set_mode(OpMode::Loopback);
        assert_eq!(driver.regs.op_mode, OpMode::Loopback.bits());
        assert_eq!(driver.regs.mode_requests, 4);
        assert_eq!(driver.regs.idle_cycles, 4 * 5);
    }

    #[test]
    fn configure_enters_config_mode_for_the_timing_write() {
        let mut driver = driver();
        driver.configure(&Settings::default());

        assert_eq!(driver.regs.op_mode, OpMode::Normal.bits());
        let timing = driver.regs.bit_timing.unwrap();
        assert_eq!(timing.brgcon1, 9);
        assert_eq!(timing.brgcon2, BRGCON2_FIXED);
        assert_eq!(timing.brgcon3, BRGCON3_FIXED);
    }

    #[test]
    fn strict_filter_arms_bank_mask_and_interrupt() {
        let mut driver = driver();
        let header = Header::new(0x23, MessageType::Heartbeat);
        driver.set_strict_filter(header);

        assert_eq!(driver.regs.filters[0], Some(header.to_id_bytes()));
        assert!(driver.regs.filter_enabled[0]);
        assert_eq!(driver.regs.mask, Some((STRICT_MASK_HIGH, STRICT_MASK_LOW)));
        assert!(driver.regs.rx_interrupt_enabled);
        assert_eq!(driver.filters_configured(), 1);
    }

    #[test]
    fn second_filter_lands_in_bank_one() {
        let mut driver = driver();
        let first = Header::new(1, MessageType::Normal);
        let second = Header::new(2, MessageType::Config);
        driver.set_strict_filter(first);
        driver.set_strict_filter(second);

        assert_eq!(driver.regs.filters[0], Some(first.to_id_bytes()));
        assert_eq!(driver.regs.filters[1], Some(second.to_id_bytes()));
        assert_eq!(driver.filters_configured(), 2);

        // There is no third bank; a further call overwrites bank 1.
        let third = Header::new(3, MessageType::Complex);
        driver.set_strict_filter(third);
        assert_eq!(driver.regs.filters[1], Some(third.to_id_bytes()));
        assert_eq!(driver.filters_configured(), 3);
    }

    #[test]
    fn later_first_bit_filter_loosens_the_shared_mask() {
        let mut driver = driver();
        driver.set_strict_filter(Header::new(0x10, MessageType::Config));
        driver.set_first_bit_id_filter(Header::new(0x80, MessageType::Normal));

        // The subrange mask is the one left active, for both banks.
        assert_eq!(
            driver.regs.mask,
            Some((FIRST_BIT_MASK_HIGH, FIRST_BIT_MASK_LOW))
        );
    }

    #[test]
    fn send_writes_exactly_the_payload_length() {
        let mut driver = driver();
        let header = Header::new(7, MessageType::Normal);
        driver.send(&CanMessage::new(header, &[0xAA, 0xBB, 0xCC]));

        assert_eq!(driver.regs.tx_id, Some(header.to_id_bytes()));
        assert_eq!(driver.regs.tx_dlc, Some(3));
        assert_eq!(driver.regs.tx_data[0], Some(0xAA));
        assert_eq!(driver.regs.tx_data[1], Some(0xBB));
        assert_eq!(driver.regs.tx_data[2], Some(0xCC));
        for slot in &driver.regs.tx_data[3..] {
            assert_eq!(*slot, None);
        }
        assert_eq!(driver.status.code, StatusCode::Sending);
    }

    #[test]
    fn empty_send_touches_no_data_registers() {
        let mut driver = driver();
        driver.send(&CanMessage::new(Header::default(), &[]));

        assert_eq!(driver.regs.tx_dlc, Some(0));
        assert!(driver.regs.tx_data.iter().all(Option::is_none));
    }

    #[test]
    fn send_returns_before_the_hardware_finishes() {
        let mut driver = driver();
        driver.regs.tx_completes_after = Some(10);

        driver.send(&CanMessage::new(Header::default(), &[1, 2]));

        // The request flag is still set when send() hands back control.
        assert!(driver.regs.transmit_pending());
        assert_eq!(driver.status.code, StatusCode::Sending);
    }

    #[test]
    fn send_synchronous_waits_for_the_request_flag_to_clear() {
        let mut driver = driver();
        driver.regs.tx_completes_after = Some(10);

        driver.send_synchronous(&CanMessage::new(Header::default(), &[1, 2]));

        assert!(!driver.regs.transmit_pending());
        // Completion bookkeeping still belongs to the caller.
        assert_eq!(driver.status.code, StatusCode::Sending);
    }

    #[test]
    fn pending_send_is_waited_out_before_loading_the_buffer() {
        let mut driver = driver();
        driver.regs.set_pending_transmit(Some(4));

        driver.send(&CanMessage::new(Header::default(), &[9]));

        // The old frame got its 4 polls before the new one was loaded.
        assert!(driver.regs.tx_polls.get() >= 4);
        assert_eq!(driver.regs.tx_dlc, Some(1));
    }

    #[test]
    fn transmit_error_during_wait_triggers_an_abort() {
        let mut driver = driver();
        driver.regs.set_pending_transmit(None);
        driver.regs.tx_error.set(true);
        driver.regs.abort_clears = true;

        driver.wait_for_previous_send();
        assert_eq!(driver.regs.aborts, 1);
        assert!(!driver.regs.transmit_pending());
    }

    #[test]
    fn complete_send_is_the_only_path_to_ok() {
        let mut driver = driver();
        driver.regs.tx_completes_after = Some(1);
        driver.send_synchronous(&CanMessage::new(Header::default(), &[]));
        assert_eq!(driver.status.code, StatusCode::Sending);

        driver.complete_send(StatusCode::Ok, 1234);
        assert_eq!(driver.status.code, StatusCode::Ok);
        assert_eq!(driver.status.timestamp, 1234);
    }

    #[test]
    fn read_received_decodes_buffer_zero() {
        let mut driver = driver();
        let header = Header::new(0x42, MessageType::ComplexReply);
        let (high, low) = header.to_id_bytes();
        driver.regs.rx_id = (high, low);
        driver.regs.rx_dlc = 2;
        driver.regs.rx_data = [0xDE, 0xAD, 0, 0, 0, 0, 0, 0];
        driver.regs.rx_interrupt_flag = true;

        let message = driver.read_received();
        assert_eq!(message.header, header);
        assert_eq!(message.data.as_slice(), &[0xDE, 0xAD]);
        assert!(!driver.regs.rx_interrupt_flag);
    }

    #[test]
    fn message_truncates_oversized_payloads() {
        let message = CanMessage::new(Header::default(), &[0; 12]);
        assert_eq!(message.data.len(), MAX_DATA_LEN);
    }

    #[test]
    fn frame_impl_speaks_standard_ids_only() {
        let id = StandardId::new(0x123).unwrap();
        let frame = <CanMessage as Frame>::new(id, &[1, 2, 3]).unwrap();
        assert_eq!(frame.header, Header::new(0x23, MessageType::Heartbeat));
        assert_eq!(frame.dlc(), 3);
        assert!(!frame.is_extended());
        assert!(!frame.is_remote_frame());

        let extended = ExtendedId::new(0x1234).unwrap();
        assert!(<CanMessage as Frame>::new(extended, &[]).is_none());
        assert!(<CanMessage as Frame>::new_remote(id, 4).is_none());
        assert!(<CanMessage as Frame>::new(id, &[0; 9]).is_none());
    }
}

//! In-memory register bank for host-side testing.
//!
//! [`MockRegisters`] implements [`CanRegisters`](crate::regs::CanRegisters)
//! with plain memory instead of memory-mapped I/O, so the driver's
//! behavior can be exercised without hardware:
//!
//! - every mutating register access bumps [`MockRegisters::writes`], which
//!   lets tests prove a code path performed *zero* hardware writes;
//! - mode requests latch only after a configurable number of attempts
//!   ([`MockRegisters::mode_latency`]), modeling the peripheral's habit of
//!   ignoring a single request;
//! - the transmit-request flag clears after a configurable number of
//!   polls, so the driver's unbounded busy-waits become bounded and
//!   deterministic in tests;
//! - written registers are captured as `Option`s, so "this register was
//!   never touched" is observable, not just "it is still zero".
//!
//! Poll counters live in [`Cell`]s because reads are `&self` on real
//! hardware and must stay `&self` here.

use crate::regs::{CanRegisters, FilterBank, PinRouting};
use crate::timing::BitTiming;

use core::cell::Cell;

/// A fake ECAN register bank backed by plain memory.
#[derive(Debug, Default)]
pub struct MockRegisters {
    /// Pin routing last configured, if any.
    pub pin_routing: Option<PinRouting>,
    /// Whether the drive-high stability bit is set.
    pub drive_high_enabled: bool,

    /// Mode the simulated peripheral currently reports (CANSTAT.OPMODE).
    pub op_mode: u8,
    /// Number of mode requests the peripheral swallows before it latches
    /// the next one. Models the unacknowledged-request hardware quirk.
    pub mode_latency: u8,
    /// Total mode requests seen.
    pub mode_requests: u32,

    /// Captured bit-timing registers, if written.
    pub bit_timing: Option<BitTiming>,

    /// Captured filter identifier pairs per bank.
    pub filters: [Option<(u8, u8)>; 2],
    /// Per-bank enable bits.
    pub filter_enabled: [bool; 2],
    /// The shared acceptance mask, if written.
    pub mask: Option<(u8, u8)>,
    /// Whether the buffer-0 receive interrupt is enabled.
    pub rx_interrupt_enabled: bool,

    /// Captured transmit identifier pair, if written.
    pub tx_id: Option<(u8, u8)>,
    /// Captured transmit data length, if written.
    pub tx_dlc: Option<u8>,
    /// Captured transmit data registers; `None` means never touched.
    pub tx_data: [Option<u8>; 8],
    /// Polls the hardware takes to finish a transmission once requested;
    /// `None` keeps the request flag set forever (or until aborted).
    pub tx_completes_after: Option<u32>,
    /// Number of times the transmit-request flag was polled.
    pub tx_polls: Cell<u32>,
    /// The transmit-error flag (TXB0CON.TXERR).
    pub tx_error: Cell<bool>,
    /// Whether an abort request clears the pending transmission.
    pub abort_clears: bool,
    /// Number of abort requests seen.
    pub aborts: u32,

    /// Receive identifier pair presented to the driver.
    pub rx_id: (u8, u8),
    /// Receive data length presented to the driver.
    pub rx_dlc: u8,
    /// Receive data registers presented to the driver.
    pub rx_data: [u8; 8],
    /// The receive-complete interrupt flag (PIR5.RXB0IF).
    pub rx_interrupt_flag: bool,

    /// Number of mutating register accesses performed.
    pub writes: u32,
    /// Number of settle cycles the driver burned.
    pub idle_cycles: u32,

    tx_request: Cell<bool>,
    tx_countdown: Cell<Option<u32>>,
}

impl MockRegisters {
    /// Creates a mock peripheral in its power-on state: configuration
    /// mode, no pending transmission, nothing configured.
    pub fn new() -> Self {
        Self {
            op_mode: 0b100,
            ..Self::default()
        }
    }

    /// Pretends a previous transmission is still sitting in the buffer.
    /// It completes after `completes_after` polls of the request flag;
    /// `None` keeps it pending until aborted.
    pub fn set_pending_transmit(&mut self, completes_after: Option<u32>) {
        self.tx_request.set(true);
        self.tx_countdown.set(completes_after);
    }

    /// Whether the transmit-request flag is currently set. Unlike
    /// [`CanRegisters::tx_requested`] this does not advance the
    /// simulated hardware.
    pub fn transmit_pending(&self) -> bool {
        self.tx_request.get()
    }
}

impl CanRegisters for MockRegisters {
    fn configure_pins(&mut self, routing: PinRouting) {
        self.writes += 1;
        self.pin_routing = Some(routing);
    }

    fn enable_drive_high(&mut self) {
        self.writes += 1;
        self.drive_high_enabled = true;
    }

    fn op_mode(&self) -> u8 {
        self.op_mode
    }

    fn request_op_mode(&mut self, code: u8) {
        self.writes += 1;
        self.mode_requests += 1;
        if self.mode_latency > 0 {
            self.mode_latency -= 1;
        } else {
            self.op_mode = code;
        }
    }

    fn abort_transmissions(&mut self) {
        self.writes += 1;
        self.aborts += 1;
        if self.abort_clears {
            self.tx_request.set(false);
            self.tx_error.set(false);
        }
    }

    fn write_bit_timing(&mut self, timing: &BitTiming) {
        self.writes += 1;
        self.bit_timing = Some(*timing);
    }

    fn write_filter(&mut self, bank: FilterBank, high: u8, low: u8) {
        self.writes += 1;
        let slot = match bank {
            FilterBank::B0 => 0,
            FilterBank::B1 => 1,
        };
        self.filters[slot] = Some((high, low));
    }

    fn enable_filter(&mut self, bank: FilterBank) {
        self.writes += 1;
        let slot = match bank {
            FilterBank::B0 => 0,
            FilterBank::B1 => 1,
        };
        self.filter_enabled[slot] = true;
    }

    fn write_mask(&mut self, high: u8, low: u8) {
        self.writes += 1;
        self.mask = Some((high, low));
    }

    fn enable_rx_interrupt(&mut self) {
        self.writes += 1;
        self.rx_interrupt_enabled = true;
    }

    fn tx_requested(&self) -> bool {
        self.tx_polls.set(self.tx_polls.get() + 1);
        if self.tx_request.get() {
            match self.tx_countdown.get() {
                Some(0) => self.tx_request.set(false),
                Some(n) => self.tx_countdown.set(Some(n - 1)),
                None => {}
            }
        }
        self.tx_request.get()
    }

    fn tx_errored(&self) -> bool {
        self.tx_error.get()
    }

    fn request_transmit(&mut self) {
        self.writes += 1;
        self.tx_request.set(true);
        self.tx_countdown.set(self.tx_completes_after);
    }

    fn write_tx_id(&mut self, high: u8, low: u8) {
        self.writes += 1;
        self.tx_id = Some((high, low));
    }

    fn write_tx_data_len(&mut self, len: u8) {
        self.writes += 1;
        self.tx_dlc = Some(len);
    }

    fn write_tx_data(&mut self, index: u8, byte: u8) {
        self.writes += 1;
        self.tx_data[index as usize] = Some(byte);
    }

    fn rx_id(&self) -> (u8, u8) {
        self.rx_id
    }

    fn rx_data_len(&self) -> u8 {
        self.rx_dlc
    }

    fn rx_data(&self, index: u8) -> u8 {
        self.rx_data[index as usize]
    }

    fn clear_rx_interrupt(&mut self) {
        self.writes += 1;
        self.rx_interrupt_flag = false;
    }

    fn idle(&mut self) {
        self.idle_cycles += 1;
    }
}

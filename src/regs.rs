//! Register-bank interface to the ECAN peripheral.
//!
//! The driver never touches memory-mapped I/O directly. Every hardware
//! access goes through the [`CanRegisters`] trait, which exposes one typed
//! operation per register touch the driver makes. A HAL or board crate
//! implements it with volatile reads and writes of the real special
//! function registers; the [`mock`](crate::mock) implementation backs it
//! with plain memory so the driver's behavior can be tested on the host.
//!
//! The documentation of each method names the PIC18F2xKxx register and bit
//! it stands for, so an implementation is a line-per-method affair.

use crate::timing::BitTiming;

/// Which of the two usable receive filter banks to address.
///
/// The peripheral documentation mentions a third bank, but no code path
/// has ever used it and the driver enforces a hard two-bank ceiling.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum FilterBank {
    /// First filter bank (RXF0).
    B0,
    /// Second filter bank (RXF1).
    B1,
}

/// Which pin pair the CAN transceiver is wired to.
///
/// The two routings are mutually exclusive; the alternate routing also
/// requires the matching CANMX configuration fuse.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum PinRouting {
    /// TX on RB2, RX on RB3.
    #[default]
    Primary,
    /// TX on RC6, RX on RC7.
    Alternate,
}

/// One typed operation per hardware register touch the driver performs.
///
/// Read methods take `&self` because on real hardware they are volatile
/// loads; a mock may still mutate interior state (poll counters) behind
/// them.
pub trait CanRegisters {
    /// Marks the transmit pin as output and the receive pin as input for
    /// the given routing (TRISB2/TRISB3 or TRISC6/TRISC7).
    fn configure_pins(&mut self, routing: PinRouting);

    /// Sets the Enable Drive High bit (CIOCON.ENDRHI), which helps with
    /// line stability.
    fn enable_drive_high(&mut self);

    /// Reads the operating mode the peripheral currently reports
    /// (CANSTAT.OPMODE, three bits).
    fn op_mode(&self) -> u8;

    /// Requests an operating-mode change (CANCON.REQOP). The peripheral
    /// acknowledges asynchronously through [`CanRegisters::op_mode`].
    fn request_op_mode(&mut self, code: u8);

    /// Requests abort of all pending transmissions (CANCON.ABAT).
    fn abort_transmissions(&mut self);

    /// Writes the three baud-rate generator registers (BRGCON1..3).
    fn write_bit_timing(&mut self, timing: &BitTiming);

    /// Writes a filter bank's identifier pair (RXFnSIDH/RXFnSIDL).
    fn write_filter(&mut self, bank: FilterBank, high: u8, low: u8);

    /// Enables a filter bank (RXFCON0.RXFnEN).
    fn enable_filter(&mut self, bank: FilterBank);

    /// Writes the shared acceptance mask (RXM0SIDH/RXM0SIDL). There is
    /// only one mask; whichever filter setup ran last owns it.
    fn write_mask(&mut self, high: u8, low: u8);

    /// Enables the receive-complete interrupt for buffer 0 (PIE5.RXB0IE).
    fn enable_rx_interrupt(&mut self);

    /// Reads the transmit-request flag (TXB0CON.TXREQ). Set by software
    /// to hand a frame to the hardware, cleared by the hardware when the
    /// frame has left the node (or the transmission was aborted).
    fn tx_requested(&self) -> bool;

    /// Reads the transmit-error flag (TXB0CON.TXERR).
    fn tx_errored(&self) -> bool;

    /// Sets the transmit-request flag (TXB0CON.TXREQ = 1).
    fn request_transmit(&mut self);

    /// Writes the transmit identifier pair (TXB0SIDH/TXB0SIDL).
    fn write_tx_id(&mut self, high: u8, low: u8);

    /// Writes the transmit data length (TXB0DLC).
    fn write_tx_data_len(&mut self, len: u8);

    /// Writes one transmit data register (TXB0Dn for `index` = n).
    fn write_tx_data(&mut self, index: u8, byte: u8);

    /// Reads the receive identifier pair (RXB0SIDH/RXB0SIDL).
    fn rx_id(&self) -> (u8, u8);

    /// Reads the received data length (RXB0DLC).
    fn rx_data_len(&self) -> u8;

    /// Reads one receive data register (RXB0Dn for `index` = n).
    fn rx_data(&self, index: u8) -> u8;

    /// Clears the receive-complete interrupt flag (PIR5.RXB0IF).
    fn clear_rx_interrupt(&mut self);

    /// Burns one settle cycle between a mode re-assertion and the next
    /// status poll. Defaults to a CPU spin hint; mocks override it to
    /// advance simulated hardware instead.
    fn idle(&mut self) {
        core::hint::spin_loop();
    }
}

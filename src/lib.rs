//! # ecan18
//!
//! A portable, no_std Rust driver for the ECAN CAN-bus peripheral found
//! on PIC18F2xKxx-class microcontrollers (and, per the datasheet family,
//! other chips carrying the same module).
//!
//! This driver implements the register-level CAN protocol stack of a
//! small bus node:
//! - bit-exact identifier and status-byte codecs for an 11-bit
//!   (node, message-type) addressing scheme
//! - the operating-mode handshake, with the re-assert-until-acknowledged
//!   workaround the hardware needs
//! - bit-timing calculation for a fixed 16-TQ bit segmentation
//! - receive filter banks over a single shared acceptance mask
//! - transmission with busy-wait sequencing and error-triggered abort
//!
//! All hardware access goes through the [`regs::CanRegisters`] trait, so
//! the same driver runs against memory-mapped registers on target and
//! against the in-memory `mock::MockRegisters` bank on the host.
//!
//! ## Crate features
//! | Feature         | Description |
//! |-----------------|-------------|
//! | `std`           | Disables `#![no_std]` support (host-side tests) |
//! | `isr` (default) | Global driver cell + helpers via `critical-section` |
//! | `mock`          | Exposes the in-memory register bank for tests |
//! | `defmt-0-3`     | Derives `defmt::Format` on public types |
//! | `log`           | Emits `log` records from the mode and filter paths |
//!
//! ## Usage
//!
//! ```rust
//! use ecan18::driver::{CanDriver, CanMessage, Settings};
//! use ecan18::encoding::{Header, MessageType};
//! use ecan18::mock::MockRegisters;
//! use ecan18::regs::PinRouting;
//!
//! // On target, a board crate's CanRegisters implementation replaces
//! // the mock.
//! let mut driver = CanDriver::new(MockRegisters::new(), PinRouting::Primary);
//! driver.set_strict_filter(Header::new(0x21, MessageType::Config));
//! driver.configure(&Settings::default());
//!
//! let heartbeat = Header::new(0x21, MessageType::Heartbeat);
//! driver.send(&CanMessage::new(heartbeat, &[0x80]));
//! ```
//!
//! ## Integration Notes
//!
//! - Every wait is an unbounded busy-spin on a hardware flag; there is no
//!   timeout and no sleep on this platform. See the notes on
//!   [`driver::CanDriver`].
//! - The driver never resolves a transmission to OK or error on its own;
//!   the application observes the hardware outcome and records it via
//!   [`driver::CanDriver::complete_send`].
//! - The receive interrupt handler itself is application code; this crate
//!   only configures what triggers it and decodes what it reads.
//!
//! --
//! Designed for `#![no_std]` use in resource-constrained embedded
//! environments.

#![deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "isr")]
pub use critical_section;

pub use embedded_can;
pub use heapless;

pub mod consts;
pub mod driver;
pub mod encoding;
#[cfg(feature = "isr")]
pub mod isr;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod regs;
pub mod timing;

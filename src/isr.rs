//! Interrupt-sharing helpers for the CAN driver.
//!
//! The receive side of this protocol runs in an interrupt handler: the
//! driver enables the buffer-0 receive interrupt, and the application's
//! ISR pulls frames out with
//! [`CanDriver::read_received`](crate::driver::CanDriver::read_received)
//! and records transmit outcomes with
//! [`CanDriver::complete_send`](crate::driver::CanDriver::complete_send).
//! That means main-line code and the ISR share one driver object.
//!
//! These helpers wrap the driver in a `critical_section::Mutex` so both
//! contexts can borrow it safely:
//!
//! - [`global_can_driver_init`] / [`init_can_driver!`](crate::init_can_driver)
//!   declare the global cell
//! - [`global_can_driver_setup`] fills it at startup
//! - [`with_can_driver`] borrows it for one operation from either context
//!
//! The driver itself masks no interrupts around its register sequences
//! (the hardware has never required it); the critical section here only
//! guards the Rust-level borrow of the driver object.

use crate::driver::CanDriver;
use crate::regs::{CanRegisters, PinRouting};
use core::cell::RefCell;
use critical_section::Mutex;

/// Creates the empty global driver cell.
///
/// # Example
/// ```rust
/// use core::cell::RefCell;
/// use critical_section::Mutex;
/// use ecan18::driver::CanDriver;
/// use ecan18::isr::global_can_driver_init;
/// use ecan18::mock::MockRegisters;
///
/// static CAN_DRIVER: Mutex<RefCell<Option<CanDriver<MockRegisters>>>> =
///     global_can_driver_init::<MockRegisters>();
/// ```
pub const fn global_can_driver_init<R: CanRegisters>() -> Mutex<RefCell<Option<CanDriver<R>>>> {
    Mutex::new(RefCell::new(None))
}

/// Initializes the global driver cell with a freshly constructed driver.
///
/// Call once at startup, before enabling the CAN interrupts that borrow
/// the driver.
pub fn global_can_driver_setup<R: CanRegisters>(
    global_driver: &'static Mutex<RefCell<Option<CanDriver<R>>>>,
    regs: R,
    routing: PinRouting,
) {
    critical_section::with(|cs| {
        let _ = global_driver
            .borrow(cs)
            .replace(Some(CanDriver::new(regs, routing)));
    });
}

/// Borrows the global driver for one operation, from main-line code or
/// from an interrupt handler.
///
/// Returns `None` when [`global_can_driver_setup`] has not run yet.
///
/// # Example
/// ```rust
/// # use core::cell::RefCell;
/// # use critical_section::Mutex;
/// # use ecan18::driver::CanDriver;
/// # use ecan18::isr::{global_can_driver_init, global_can_driver_setup, with_can_driver};
/// # use ecan18::mock::MockRegisters;
/// # use ecan18::regs::PinRouting;
/// # static CAN_DRIVER: Mutex<RefCell<Option<CanDriver<MockRegisters>>>> =
/// #     global_can_driver_init::<MockRegisters>();
/// # global_can_driver_setup(&CAN_DRIVER, MockRegisters::new(), PinRouting::Primary);
/// // inside the receive ISR:
/// let message = with_can_driver(&CAN_DRIVER, |driver| driver.read_received());
/// ```
pub fn with_can_driver<R: CanRegisters, T>(
    global_driver: &'static Mutex<RefCell<Option<CanDriver<R>>>>,
    f: impl FnOnce(&mut CanDriver<R>) -> T,
) -> Option<T> {
    critical_section::with(|cs| global_driver.borrow(cs).borrow_mut().as_mut().map(f))
}

/// Declares a `pub static CAN_DRIVER` cell for the given register-bank
/// type, ready for [`global_can_driver_setup`].
///
/// # Example
/// ```rust
/// use ecan18::init_can_driver;
/// use ecan18::mock::MockRegisters;
///
/// init_can_driver!(MockRegisters);
/// # fn main() {}
/// ```
#[macro_export]
macro_rules! init_can_driver {
    ( $regs:ty ) => {
        pub static CAN_DRIVER: $crate::critical_section::Mutex<
            core::cell::RefCell<Option<$crate::driver::CanDriver<$regs>>>,
        > = $crate::critical_section::Mutex::new(core::cell::RefCell::new(None));
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::StatusCode;
    use crate::mock::MockRegisters;

    #[test]
    fn with_can_driver_before_setup_returns_none() {
        static DRIVER: Mutex<RefCell<Option<CanDriver<MockRegisters>>>> =
            global_can_driver_init::<MockRegisters>();

        assert!(with_can_driver(&DRIVER, |_| ()).is_none());
    }

    #[test]
    fn setup_then_borrow_from_both_contexts() {
        static DRIVER: Mutex<RefCell<Option<CanDriver<MockRegisters>>>> =
            global_can_driver_init::<MockRegisters>();

        global_can_driver_setup(&DRIVER, MockRegisters::new(), PinRouting::Alternate);

        // "ISR" records a completion, "main" observes it.
        let _ = with_can_driver(&DRIVER, |driver| driver.complete_send(StatusCode::Ok, 7));
        let status = with_can_driver(&DRIVER, |driver| driver.status).unwrap();
        assert_eq!(status.code, StatusCode::Ok);
        assert_eq!(status.timestamp, 7);
    }
}

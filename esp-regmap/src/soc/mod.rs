//! Generated register maps, one module per chip.
//!
//! Each module holds, for every register of the chip:
//!
//! - `DR_REG_<PERIPHERAL>_BASE` and `<PERIPHERAL>_<REGISTER>_REG` addresses,
//! - `<FIELD>_V`, `<FIELD>_S` and `<FIELD>_M` for every field, with
//!   `_M == _V << _S`,
//! - a typed [`Field`](crate::register::Field) constant per field,
//! - one module per register array, e.g. `gpio_pin`, with the template fields
//!   of the array,
//! - [`REGISTERS`](esp32c5::REGISTERS), every register sorted by address.
//!
//! The GPIO and TEE layouts used by [`crate::gpio`] and [`crate::tee`] are
//! generated next to them.

#![allow(missing_docs, clippy::identity_op, clippy::erasing_op)]

/// ESP32-C5: GPIO, TEE and LP_TEE.
pub mod esp32c5 {
    include!(concat!(env!("OUT_DIR"), "/_generated_esp32c5.rs"));

    /// A simulated register file of the chip.
    pub type Simulator = crate::sim::SimBus<REGISTER_COUNT>;
}

/// ESP32-P4: GPIO.
pub mod esp32p4 {
    include!(concat!(env!("OUT_DIR"), "/_generated_esp32p4.rs"));

    /// A simulated register file of the chip.
    pub type Simulator = crate::sim::SimBus<REGISTER_COUNT>;
}

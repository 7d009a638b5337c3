//! Register maps of the GPIO, TEE and LP_TEE peripherals of Espressif
//! devices, and drivers working at the level of those registers.
//!
//! ## Overview
//!
//! The [`soc`] module holds one generated module per chip with the address,
//! shift, value mask and mask of every register field, as found in the
//! vendor's C headers. The drivers on top take those tables and a
//! [`RegisterBus`](register::RegisterBus):
//!
//! - [`register::Regs`]: field reads and writes that honour the access mode
//!   of each field, and the W1TS/W1TC companions.
//! - [`gpio::Gpio`]: pin levels, interrupts and the GPIO matrix.
//! - [`tee::Tee`]: security modes of bus masters and peripheral permissions.
//!
//! [`register::Mmio`] accesses the real registers. [`sim::SimBus`] simulates
//! them on the host.
//!
//! ```rust
//! use esp_regmap::{gpio::Gpio, soc::esp32c5};
//!
//! let bus = esp32c5::Simulator::new(esp32c5::REGISTERS)?;
//! let mut gpio = Gpio::new(bus, &esp32c5::GPIO_LAYOUT, esp32c5::REGISTERS);
//!
//! gpio.enable_output(4)?;
//! gpio.set_output_high(4)?;
//! assert!(gpio.is_output_set(4)?);
//! # Ok::<(), Box<dyn core::error::Error>>(())
//! ```
//!
//! ## Configuration
//!
//! Set `ESP_REGMAP_CONFIG_<OPTION>` when building:
//!
//! | Option             | Default  | Effect                                                   |
//! |--------------------|----------|----------------------------------------------------------|
//! | `STRICT_ACCESS`    | `true`   | Fail writes to RO, HRO and WT fields instead of skipping |
//! | `TRACE_WRITES`     | `false`  | Log every register write                                 |
//! | `SIM_FAULT_POLICY` | `record` | `panic` on unmapped simulator accesses (unstable)        |
//!
//! ## Feature Flags
#![doc = document_features::document_features!()]
#![doc(html_logo_url = "https://avatars.githubusercontent.com/u/46717278")]
#![cfg_attr(not(test), no_std)]

// MUST be the first module
mod fmt;

pub mod gpio;
pub mod register;
pub mod sim;
pub mod soc;
pub mod tee;

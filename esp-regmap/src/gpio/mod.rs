//! # General Purpose Input/Output
//!
//! Pin-level access through the bank registers (`OUT`, `ENABLE`, `IN`,
//! `STATUS`) and the per-pin `PINn` configuration registers.
//!
//! Output levels, output enables and interrupt status bits are only changed
//! through the W1TS/W1TC companions of their bank register. Hardware sets
//! status bits at any time, and a read-modify-write of `STATUS` would clear
//! any bit raised between the read and the write.
//!
//! Pins 32 and up live in bank 1 (`OUT1`, `ENABLE1`, ...) on chips that have
//! more than 32 pins.

use crate::register::{Field, RegisterArray, RegisterBus, RegisterInfo, Regs};

pub mod matrix;

pub use matrix::{InputRoute, InputSource, OutputRoute};

/// Addresses of the bank registers covering 32 pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioBankRegisters {
    pub out: u32,
    pub out_w1ts: u32,
    pub out_w1tc: u32,
    pub enable: u32,
    pub enable_w1ts: u32,
    pub enable_w1tc: u32,
    pub input: u32,
    pub status: u32,
    pub status_w1ts: u32,
    pub status_w1tc: u32,
}

/// Generated register layout of a chip's GPIO peripheral.
#[derive(Debug, Clone, Copy)]
pub struct GpioLayout {
    pub pin_count: u8,
    pub banks: &'static [GpioBankRegisters],

    pub pin: RegisterArray,
    pub int_type: Field,
    pub pad_driver: Field,
    pub wakeup_enable: Field,
    pub int_ena: Field,

    pub func_in: RegisterArray,
    pub in_sel: Field,
    pub in_inv_sel: Field,
    pub sig_in_sel: Field,

    pub func_out: RegisterArray,
    pub out_sel: Field,
    pub out_inv_sel: Field,
    pub oen_sel: Field,
    pub oen_inv_sel: Field,

    pub constant_0_input: u32,
    pub constant_1_input: u32,
    pub input_signal_max: u32,
    pub output_signal_max: u32,
}

/// Digital input or output level.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    /// Low
    Low,
    /// High
    High,
}

impl core::ops::Not for Level {
    type Output = Self;

    fn not(self) -> Self {
        match self {
            Self::Low => Self::High,
            Self::High => Self::Low,
        }
    }
}

impl From<bool> for Level {
    fn from(val: bool) -> Self {
        match val {
            true => Self::High,
            false => Self::Low,
        }
    }
}

impl From<Level> for bool {
    fn from(level: Level) -> bool {
        match level {
            Level::Low => false,
            Level::High => true,
        }
    }
}

/// Event used to trigger interrupts.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// Interrupts trigger on rising pin edge.
    RisingEdge  = 1,
    /// Interrupts trigger on falling pin edge.
    FallingEdge = 2,
    /// Interrupts trigger on either rising or falling pin edges.
    AnyEdge     = 3,
    /// Interrupts trigger on low level
    LowLevel    = 4,
    /// Interrupts trigger on high level
    HighLevel   = 5,
}

/// The set of bank registers a pin is controlled through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpioBank {
    /// GPIO0 to GPIO31.
    Bank0,
    /// GPIO32 and up.
    Bank1,
}

impl GpioBank {
    /// The bank and bit of a pin. Doesn't check the pin against a chip.
    pub const fn of(pin: u8) -> (Self, u32) {
        if pin < 32 {
            (GpioBank::Bank0, pin as u32)
        } else {
            (GpioBank::Bank1, pin as u32 - 32)
        }
    }

    const fn index(self) -> usize {
        match self {
            GpioBank::Bank0 => 0,
            GpioBank::Bank1 => 1,
        }
    }
}

/// GPIO errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The chip has no such pin.
    InvalidPin(u8),
    /// The chip has no such peripheral signal.
    InvalidSignal(u32),
    /// A selector that is neither a pin nor a constant.
    InvalidSelector(u32),
    /// A register access failed.
    Register(crate::register::Error),
}

impl From<crate::register::Error> for Error {
    fn from(error: crate::register::Error) -> Self {
        Self::Register(error)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::InvalidPin(pin) => write!(f, "GPIO{pin} does not exist"),
            Error::InvalidSignal(signal) => write!(f, "Signal {signal} is not routable"),
            Error::InvalidSelector(selector) => {
                write!(f, "Selector {selector:#x} is neither a pin nor a constant")
            }
            Error::Register(error) => write!(f, "{error}"),
        }
    }
}

impl core::error::Error for Error {}

/// Driver for the GPIO peripheral of one chip.
pub struct Gpio<B> {
    regs: Regs<B>,
    layout: &'static GpioLayout,
}

impl<B> Gpio<B>
where
    B: RegisterBus,
{
    /// `layout` and `table` are the chip's generated `GPIO_LAYOUT` and
    /// `REGISTERS`.
    pub fn new(bus: B, layout: &'static GpioLayout, table: &'static [RegisterInfo]) -> Self {
        Self {
            regs: Regs::new(bus, table),
            layout,
        }
    }

    pub fn layout(&self) -> &'static GpioLayout {
        self.layout
    }

    pub fn regs(&mut self) -> &mut Regs<B> {
        &mut self.regs
    }

    pub fn into_inner(self) -> B {
        self.regs.into_inner()
    }

    pub fn pin_count(&self) -> u8 {
        self.layout.pin_count
    }

    fn bank(&self, pin: u8) -> Result<(&'static GpioBankRegisters, u32), Error> {
        if pin >= self.layout.pin_count {
            return Err(Error::InvalidPin(pin));
        }

        let (bank, bit) = GpioBank::of(pin);
        let layout = self.layout;
        let registers = layout
            .banks
            .get(bank.index())
            .ok_or(Error::InvalidPin(pin))?;

        Ok((registers, bit))
    }

    fn pin_field(&self, template: Field, pin: u8) -> Result<Field, Error> {
        if pin >= self.layout.pin_count {
            return Err(Error::InvalidPin(pin));
        }

        self.layout
            .pin
            .field(template, pin as u32)
            .ok_or(Error::InvalidPin(pin))
    }

    pub fn set_output_high(&mut self, pin: u8) -> Result<(), Error> {
        let (bank, bit) = self.bank(pin)?;
        self.regs.set_bits(bank.out_w1ts, 1 << bit)?;
        Ok(())
    }

    pub fn set_output_low(&mut self, pin: u8) -> Result<(), Error> {
        let (bank, bit) = self.bank(pin)?;
        self.regs.clear_bits(bank.out_w1tc, 1 << bit)?;
        Ok(())
    }

    pub fn set_output_level(&mut self, pin: u8, level: Level) -> Result<(), Error> {
        match level {
            Level::High => self.set_output_high(pin),
            Level::Low => self.set_output_low(pin),
        }
    }

    pub fn enable_output(&mut self, pin: u8) -> Result<(), Error> {
        let (bank, bit) = self.bank(pin)?;
        self.regs.set_bits(bank.enable_w1ts, 1 << bit)?;
        Ok(())
    }

    pub fn disable_output(&mut self, pin: u8) -> Result<(), Error> {
        let (bank, bit) = self.bank(pin)?;
        self.regs.clear_bits(bank.enable_w1tc, 1 << bit)?;
        Ok(())
    }

    /// Whether the output driver of the pin is enabled.
    pub fn is_output_enabled(&mut self, pin: u8) -> Result<bool, Error> {
        let (bank, bit) = self.bank(pin)?;
        Ok(self.regs.read_register(bank.enable) & (1 << bit) != 0)
    }

    /// The level at the pad.
    pub fn is_input_high(&mut self, pin: u8) -> Result<bool, Error> {
        let (bank, bit) = self.bank(pin)?;
        Ok(self.regs.read_register(bank.input) & (1 << bit) != 0)
    }

    /// The level the pin is set to drive.
    pub fn is_output_set(&mut self, pin: u8) -> Result<bool, Error> {
        let (bank, bit) = self.bank(pin)?;
        Ok(self.regs.read_register(bank.out) & (1 << bit) != 0)
    }

    /// Whether the pin's interrupt status bit is raised.
    pub fn interrupt_status(&mut self, pin: u8) -> Result<bool, Error> {
        let (bank, bit) = self.bank(pin)?;
        Ok(self.regs.read_register(bank.status) & (1 << bit) != 0)
    }

    /// The raw interrupt status of a bank.
    pub fn bank_interrupt_status(&mut self, bank: GpioBank) -> Option<u32> {
        let registers = self.layout.banks.get(bank.index())?;
        Some(self.regs.read_register(registers.status))
    }

    /// Clears the pin's interrupt status bit through `STATUS_W1TC`. Other
    /// status bits are untouched, including those hardware raises meanwhile.
    pub fn clear_interrupt(&mut self, pin: u8) -> Result<(), Error> {
        let (bank, bit) = self.bank(pin)?;
        self.regs.clear_status(bank.status_w1tc, bit)?;
        Ok(())
    }

    /// Raises the pin's interrupt status bit from software.
    pub fn trigger_interrupt(&mut self, pin: u8) -> Result<(), Error> {
        let (bank, bit) = self.bank(pin)?;
        self.regs.set_bits(bank.status_w1ts, 1 << bit)?;
        Ok(())
    }

    /// Selects the interrupt event of a pin, `None` disabling the interrupt.
    /// `int_ena` selects the CPU interrupt lines, as in `PINn_INT_ENA`.
    pub fn set_interrupt_type(
        &mut self,
        pin: u8,
        event: Option<Event>,
        int_ena: u32,
    ) -> Result<(), Error> {
        let int_type = self.pin_field(self.layout.int_type, pin)?;
        let enable = self.pin_field(self.layout.int_ena, pin)?;

        let (event, int_ena) = match event {
            Some(event) => (event as u32, int_ena),
            None => (0, 0),
        };

        // Check both values before writing either field.
        for (field, value) in [(int_type, event), (enable, int_ena)] {
            if value > field.mask_v() {
                return Err(Error::Register(crate::register::Error::ValueTooWide {
                    max: field.mask_v(),
                }));
            }
        }

        self.regs.write_field(int_type, event)?;
        self.regs.write_field(enable, int_ena)?;

        debug!("GPIO{} interrupt type {}", pin, event);

        Ok(())
    }

    pub fn set_open_drain(&mut self, pin: u8, open_drain: bool) -> Result<(), Error> {
        let pad_driver = self.pin_field(self.layout.pad_driver, pin)?;
        self.regs.write_field(pad_driver, open_drain as u32)?;
        Ok(())
    }

    /// Enables waking the CPU from light sleep on the pin's interrupt event.
    pub fn set_wakeup(&mut self, pin: u8, enable: bool) -> Result<(), Error> {
        let wakeup = self.pin_field(self.layout.wakeup_enable, pin)?;
        self.regs.write_field(wakeup, enable as u32)?;
        Ok(())
    }

    /// Reads a field of the pin's `PINn` register.
    pub fn pin_config(&mut self, pin: u8, template: Field) -> Result<u32, Error> {
        let field = self.pin_field(template, pin)?;
        Ok(self.regs.read_field(field))
    }
}

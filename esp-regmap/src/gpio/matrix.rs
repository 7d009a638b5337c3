//! # GPIO matrix
//!
//! The matrix connects pins and peripheral signals through selector
//! registers.
//!
//! - `FUNCn_IN_SEL_CFG` routes peripheral input signal `n`. Its `IN_SEL`
//!   holds a pin number or one of two constant selectors that tie the signal
//!   low or high. Any number of signals may read the same pin.
//! - `FUNCn_OUT_SEL_CFG` routes pin `n`. Its `OUT_SEL` holds the peripheral
//!   output signal driving the pin, or `output_signal_max` for the plain GPIO
//!   output from `GPIO_OUT_REG`. A pin is driven by one signal at a time; the
//!   last [`Gpio::connect_output`] wins.
//!
//! On chips where only some input signals are routable, the others have no
//! `FUNCn_IN_SEL_CFG` register and are rejected with
//! [`Error::InvalidSignal`].

use super::{Error, Gpio, GpioLayout, Level};
use crate::register::RegisterBus;

/// Where a peripheral input signal reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputSource {
    /// A GPIO pin.
    Pin(u8),
    /// A constant level, selected by one of the chip's constant selectors.
    Constant(Level),
}

impl InputSource {
    /// The `IN_SEL` value selecting this source.
    pub fn selector(self, layout: &GpioLayout) -> Result<u32, Error> {
        match self {
            InputSource::Pin(pin) if pin < layout.pin_count => Ok(pin as u32),
            InputSource::Pin(pin) => Err(Error::InvalidPin(pin)),
            InputSource::Constant(Level::Low) => Ok(layout.constant_0_input),
            InputSource::Constant(Level::High) => Ok(layout.constant_1_input),
        }
    }

    /// Decodes an `IN_SEL` value. Constant selectors never decode as pins.
    pub fn from_selector(layout: &GpioLayout, selector: u32) -> Result<Self, Error> {
        if selector == layout.constant_0_input {
            Ok(InputSource::Constant(Level::Low))
        } else if selector == layout.constant_1_input {
            Ok(InputSource::Constant(Level::High))
        } else if selector < layout.pin_count as u32 {
            Ok(InputSource::Pin(selector as u8))
        } else {
            Err(Error::InvalidSelector(selector))
        }
    }
}

/// Configuration of one peripheral input signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InputRoute {
    pub source: InputSource,
    /// Invert the level before it reaches the peripheral.
    pub inverted: bool,
    /// Route through the matrix (`SIGn_IN_SEL` set) instead of the IO MUX.
    pub through_matrix: bool,
}

impl InputRoute {
    /// Reads `pin` through the matrix, not inverted.
    pub const fn pin(pin: u8) -> Self {
        Self {
            source: InputSource::Pin(pin),
            inverted: false,
            through_matrix: true,
        }
    }

    /// Ties the signal to a constant level.
    pub const fn constant(level: Level) -> Self {
        Self {
            source: InputSource::Constant(level),
            inverted: false,
            through_matrix: true,
        }
    }

    pub const fn inverted(mut self) -> Self {
        self.inverted = !self.inverted;
        self
    }
}

/// Configuration of one output pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutputRoute {
    /// The peripheral output signal, or `output_signal_max` for the GPIO
    /// output register.
    pub signal: u32,
    pub invert: bool,
    /// Take the output enable from `GPIO_ENABLE_REG` instead of the
    /// peripheral.
    pub enable_from_gpio: bool,
    pub invert_enable: bool,
}

impl OutputRoute {
    /// Drives the pin from peripheral output `signal`.
    pub const fn signal(signal: u32) -> Self {
        Self {
            signal,
            invert: false,
            enable_from_gpio: false,
            invert_enable: false,
        }
    }

    /// Drives the pin from `GPIO_OUT_REG`, enabled by `GPIO_ENABLE_REG`.
    pub const fn gpio(layout: &GpioLayout) -> Self {
        Self {
            signal: layout.output_signal_max,
            invert: false,
            enable_from_gpio: true,
            invert_enable: false,
        }
    }
}

impl<B> Gpio<B>
where
    B: RegisterBus,
{
    fn func_in(&self, signal: u32) -> Result<u32, Error> {
        self.layout
            .func_in
            .address(signal)
            .ok_or(Error::InvalidSignal(signal))
    }

    fn func_out(&self, pin: u8) -> Result<u32, Error> {
        if pin >= self.layout.pin_count {
            return Err(Error::InvalidPin(pin));
        }

        self.layout
            .func_out
            .address(pin as u32)
            .ok_or(Error::InvalidPin(pin))
    }

    /// Routes peripheral input `signal`.
    pub fn connect_input(&mut self, signal: u32, route: InputRoute) -> Result<(), Error> {
        let register = self.func_in(signal)?;
        let selector = route.source.selector(self.layout)?;
        let layout = self.layout;

        self.regs.write_field(layout.in_sel.at(register), selector)?;
        self.regs
            .write_field(layout.in_inv_sel.at(register), route.inverted as u32)?;
        self.regs
            .write_field(layout.sig_in_sel.at(register), route.through_matrix as u32)?;

        debug!("Input signal {} <- selector {}", signal, selector);

        Ok(())
    }

    /// Ties peripheral input `signal` to a constant level.
    pub fn disconnect_input(&mut self, signal: u32, level: Level) -> Result<(), Error> {
        self.connect_input(signal, InputRoute::constant(level))
    }

    /// Reads back the route of peripheral input `signal`.
    pub fn input_route(&mut self, signal: u32) -> Result<InputRoute, Error> {
        let register = self.func_in(signal)?;
        let layout = self.layout;

        let selector = self.regs.read_field(layout.in_sel.at(register));
        let inverted = self.regs.read_field(layout.in_inv_sel.at(register)) != 0;
        let through_matrix = self.regs.read_field(layout.sig_in_sel.at(register)) != 0;

        Ok(InputRoute {
            source: InputSource::from_selector(layout, selector)?,
            inverted,
            through_matrix,
        })
    }

    /// Routes output `pin`. The previous route of the pin is replaced.
    pub fn connect_output(&mut self, pin: u8, route: OutputRoute) -> Result<(), Error> {
        let register = self.func_out(pin)?;
        let layout = self.layout;

        if route.signal > layout.output_signal_max {
            return Err(Error::InvalidSignal(route.signal));
        }

        self.regs.write_field(layout.out_sel.at(register), route.signal)?;
        self.regs
            .write_field(layout.out_inv_sel.at(register), route.invert as u32)?;
        self.regs
            .write_field(layout.oen_sel.at(register), route.enable_from_gpio as u32)?;
        self.regs
            .write_field(layout.oen_inv_sel.at(register), route.invert_enable as u32)?;

        debug!("GPIO{} <- output signal {}", pin, route.signal);

        Ok(())
    }

    /// Reads back the route of output `pin`.
    pub fn output_route(&mut self, pin: u8) -> Result<OutputRoute, Error> {
        let register = self.func_out(pin)?;
        let layout = self.layout;

        Ok(OutputRoute {
            signal: self.regs.read_field(layout.out_sel.at(register)),
            invert: self.regs.read_field(layout.out_inv_sel.at(register)) != 0,
            enable_from_gpio: self.regs.read_field(layout.oen_sel.at(register)) != 0,
            invert_enable: self.regs.read_field(layout.oen_inv_sel.at(register)) != 0,
        })
    }

    /// Returns output `pin` to the plain GPIO output.
    pub fn disconnect_output(&mut self, pin: u8) -> Result<(), Error> {
        let route = OutputRoute::gpio(self.layout);
        self.connect_output(pin, route)
    }

    /// The input signals reading `pin` through the matrix.
    pub fn inputs_from_pin(&mut self, pin: u8) -> Result<InputsFromPin<'_, B>, Error> {
        if pin >= self.layout.pin_count {
            return Err(Error::InvalidPin(pin));
        }

        Ok(InputsFromPin {
            gpio: self,
            pin,
            position: 0,
        })
    }
}

/// Iterator returned by [`Gpio::inputs_from_pin`].
pub struct InputsFromPin<'a, B> {
    gpio: &'a mut Gpio<B>,
    pin: u8,
    position: usize,
}

impl<B> Iterator for InputsFromPin<'_, B>
where
    B: RegisterBus,
{
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let signals = self.gpio.layout.func_in.indices();

        while let Some(&signal) = signals.get(self.position) {
            self.position += 1;

            let Ok(route) = self.gpio.input_route(signal) else {
                continue;
            };
            if route.through_matrix && route.source == InputSource::Pin(self.pin) {
                return Some(signal);
            }
        }

        None
    }
}

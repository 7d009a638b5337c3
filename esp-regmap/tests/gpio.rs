use esp_regmap::{
    gpio::{Error, Event, Gpio, GpioBank, InputRoute, InputSource, Level, OutputRoute},
    register::{Error as RegisterError, RegisterBus},
    soc::{esp32c5, esp32p4},
};
use quickcheck_macros::quickcheck;

fn c5() -> Gpio<esp32c5::Simulator> {
    let bus = esp32c5::Simulator::new(esp32c5::REGISTERS).unwrap();
    Gpio::new(bus, &esp32c5::GPIO_LAYOUT, esp32c5::REGISTERS)
}

fn p4() -> Gpio<esp32p4::Simulator> {
    let bus = esp32p4::Simulator::new(esp32p4::REGISTERS).unwrap();
    Gpio::new(bus, &esp32p4::GPIO_LAYOUT, esp32p4::REGISTERS)
}

#[test]
fn output_level_through_companions() {
    let mut gpio = c5();

    gpio.enable_output(5).unwrap();
    gpio.set_output_high(5).unwrap();
    assert!(gpio.is_output_enabled(5).unwrap());
    assert!(gpio.is_output_set(5).unwrap());

    gpio.set_output_level(5, Level::Low).unwrap();
    assert!(!gpio.is_output_set(5).unwrap());

    let mut bus = gpio.into_inner();
    assert_eq!(bus.read(esp32c5::GPIO_OUT_REG), 0);
    assert_eq!(bus.read(esp32c5::GPIO_ENABLE_REG), 1 << 5);
    assert_eq!(bus.fault_count(), 0);
}

#[test]
fn second_bank_on_p4() {
    let mut gpio = p4();

    gpio.set_output_high(40).unwrap();
    gpio.enable_output(56).unwrap();

    let mut bus = gpio.into_inner();
    assert_eq!(bus.read(esp32p4::GPIO_OUT1_REG), 1 << 8);
    assert_eq!(bus.read(esp32p4::GPIO_OUT_REG), 0);
    assert_eq!(bus.read(esp32p4::GPIO_ENABLE1_REG), 1 << 24);
}

#[test]
fn invalid_pins_are_rejected() {
    let mut gpio = c5();

    assert_eq!(gpio.set_output_high(31), Err(Error::InvalidPin(31)));
    assert_eq!(gpio.is_input_high(40), Err(Error::InvalidPin(40)));
    assert_eq!(gpio.set_open_drain(31, true), Err(Error::InvalidPin(31)));
    assert_eq!(gpio.bank_interrupt_status(GpioBank::Bank1), None);

    let mut gpio = p4();
    assert_eq!(gpio.enable_output(57), Err(Error::InvalidPin(57)));
}

#[test]
fn input_level_follows_the_pad() {
    let mut gpio = p4();

    gpio.regs()
        .bus_mut()
        .hw_set(esp32p4::GPIO_IN1_REG, 1 << 2)
        .unwrap();

    assert!(gpio.is_input_high(34).unwrap());
    assert!(!gpio.is_input_high(2).unwrap());
}

#[test]
fn clearing_an_interrupt_keeps_other_raised_bits() {
    let mut gpio = c5();

    gpio.trigger_interrupt(3).unwrap();
    assert!(gpio.interrupt_status(3).unwrap());

    // Hardware raises GPIO7 before software clears GPIO3.
    gpio.regs()
        .bus_mut()
        .hw_set(esp32c5::GPIO_STATUS_REG, 1 << 7)
        .unwrap();
    gpio.clear_interrupt(3).unwrap();

    assert!(!gpio.interrupt_status(3).unwrap());
    assert!(gpio.interrupt_status(7).unwrap());
    assert_eq!(gpio.bank_interrupt_status(GpioBank::Bank0), Some(1 << 7));
}

#[test]
fn pin_configuration() {
    let mut gpio = c5();
    let layout = gpio.layout();

    gpio.set_interrupt_type(4, Some(Event::AnyEdge), 1).unwrap();
    gpio.set_open_drain(4, true).unwrap();
    gpio.set_wakeup(4, true).unwrap();

    assert_eq!(gpio.pin_config(4, layout.int_type).unwrap(), 3);
    assert_eq!(gpio.pin_config(4, layout.int_ena).unwrap(), 1);
    assert_eq!(gpio.pin_config(4, layout.pad_driver).unwrap(), 1);
    assert_eq!(gpio.pin_config(4, layout.wakeup_enable).unwrap(), 1);

    gpio.set_interrupt_type(4, None, 1).unwrap();
    assert_eq!(gpio.pin_config(4, layout.int_type).unwrap(), 0);
    assert_eq!(gpio.pin_config(4, layout.int_ena).unwrap(), 0);

    let mut bus = gpio.into_inner();
    let raw = bus.read(esp32c5::GPIO_PIN4_REG);
    assert_eq!(raw & esp32c5::GPIO_PIN4_PAD_DRIVER_M, esp32c5::GPIO_PIN4_PAD_DRIVER_M);
    assert_eq!(bus.read(esp32c5::GPIO_PIN5_REG), 0);
}

#[test]
fn too_wide_interrupt_enable_is_rejected() {
    let mut gpio = c5();
    let layout = &esp32c5::GPIO_LAYOUT;

    gpio.set_interrupt_type(0, Some(Event::RisingEdge), 1).unwrap();

    assert_eq!(
        gpio.set_interrupt_type(0, Some(Event::HighLevel), 0x20),
        Err(Error::Register(RegisterError::ValueTooWide { max: 0x1f }))
    );
    assert_eq!(gpio.pin_config(0, layout.int_type).unwrap(), Event::RisingEdge as u32);
    assert_eq!(gpio.pin_config(0, layout.int_ena).unwrap(), 1);
}

#[test]
fn set_then_clear_leaves_the_bit_cleared() {
    let mut gpio = p4();

    for _ in 0..2 {
        gpio.enable_output(12).unwrap();
        gpio.disable_output(12).unwrap();
        assert!(!gpio.is_output_enabled(12).unwrap());
    }
}

// Setting and clearing one bit through W1TS/W1TC leaves it at 0, and never
// disturbs other bits, whatever hardware does to them meanwhile.
#[quickcheck]
fn companion_writes_only_touch_their_bit(pin: u8, hw_before: u32, hw_between: u32, repeat: u8) {
    let mut gpio = p4();
    let pin = pin % esp32p4::GPIO_PIN_COUNT;
    let (bank, bit) = GpioBank::of(pin);
    let enable = match bank {
        GpioBank::Bank0 => esp32p4::GPIO_ENABLE_REG,
        GpioBank::Bank1 => esp32p4::GPIO_ENABLE1_REG,
    };
    let others = !(1u32 << bit);

    gpio.regs().bus_mut().hw_set(enable, hw_before & others).unwrap();
    let before = gpio.regs().read_register(enable);

    for _ in 0..=(repeat % 3) {
        gpio.enable_output(pin).unwrap();
        assert!(gpio.is_output_enabled(pin).unwrap());
    }

    gpio.regs().bus_mut().hw_set(enable, hw_between & others).unwrap();
    let expected = gpio.regs().read_register(enable) & others;

    for _ in 0..=(repeat % 3) {
        gpio.disable_output(pin).unwrap();
    }

    let after = gpio.regs().read_register(enable);
    assert_eq!(after & !others, 0);
    assert_eq!(after & others, expected);
    assert_eq!(before & expected, before & others);
}

#[test]
fn inputs_reset_to_constants() {
    let mut gpio = c5();

    assert_eq!(gpio.input_route(0).unwrap().source, InputSource::Constant(Level::Low));
    assert_eq!(gpio.input_route(9).unwrap().source, InputSource::Constant(Level::High));

    let mut gpio = p4();
    assert_eq!(
        gpio.input_route(255).unwrap().source,
        InputSource::Constant(Level::Low)
    );
}

#[test]
fn connect_and_read_back_inputs() {
    let mut gpio = c5();

    gpio.connect_input(6, InputRoute::pin(12).inverted()).unwrap();
    let route = gpio.input_route(6).unwrap();
    assert_eq!(route.source, InputSource::Pin(12));
    assert!(route.inverted);
    assert!(route.through_matrix);

    let raw = gpio.regs().read_register(esp32c5::GPIO_FUNC6_IN_SEL_CFG_REG);
    assert_eq!(raw & esp32c5::GPIO_FUNC6_IN_SEL_M, 12);

    gpio.disconnect_input(6, Level::High).unwrap();
    let raw = gpio.regs().read_register(esp32c5::GPIO_FUNC6_IN_SEL_CFG_REG);
    assert_eq!(raw & esp32c5::GPIO_FUNC6_IN_SEL_M, esp32c5::GPIO_CONSTANT_1_INPUT);
    assert_eq!(
        gpio.input_route(6).unwrap().source,
        InputSource::Constant(Level::High)
    );
}

#[test]
fn unroutable_signals_are_rejected() {
    let mut gpio = c5();

    // C5 has no FUNC1_IN_SEL_CFG.
    assert_eq!(
        gpio.connect_input(1, InputRoute::pin(0)),
        Err(Error::InvalidSignal(1))
    );
    assert_eq!(gpio.input_route(125), Err(Error::InvalidSignal(125)));
    assert_eq!(
        gpio.connect_input(0, InputRoute::pin(31)),
        Err(Error::InvalidPin(31))
    );
}

#[test]
fn stray_selector_is_not_a_pin() {
    let mut gpio = p4();
    let register = esp32p4::GPIO_FUNC10_IN_SEL_CFG_REG;

    // Selector 0x3A is neither a pin below 57 nor a constant.
    gpio.regs()
        .bus_mut()
        .hw_clear(register, esp32p4::GPIO_FUNC10_IN_SEL_M)
        .unwrap();
    gpio.regs().bus_mut().hw_set(register, 0x3A).unwrap();

    assert_eq!(gpio.input_route(10), Err(Error::InvalidSelector(0x3A)));
}

#[quickcheck]
fn selectors_decode_to_pins_or_constants(selector: u8) {
    for layout in [&esp32c5::GPIO_LAYOUT, &esp32p4::GPIO_LAYOUT] {
        let selector = selector as u32 & layout.in_sel.mask_v();

        match InputSource::from_selector(layout, selector) {
            Ok(InputSource::Pin(pin)) => {
                assert!(pin < layout.pin_count);
                assert_eq!(selector, pin as u32);
            }
            Ok(InputSource::Constant(level)) => {
                let expected = match level {
                    Level::Low => layout.constant_0_input,
                    Level::High => layout.constant_1_input,
                };
                assert_eq!(selector, expected);
            }
            Err(error) => {
                assert_eq!(error, Error::InvalidSelector(selector));
                assert!(selector >= layout.pin_count as u32);
            }
        }
    }
}

#[quickcheck]
fn connected_routes_read_back(signal: u8, pin: u8, inverted: bool, constant: Option<bool>) {
    let mut gpio = p4();
    let pin = pin % esp32p4::GPIO_PIN_COUNT;
    let signal = signal as u32;

    let route = match constant {
        Some(high) => InputRoute::constant(Level::from(high)),
        None => InputRoute::pin(pin),
    };
    let route = if inverted { route.inverted() } else { route };

    gpio.connect_input(signal, route).unwrap();
    let read_back = gpio.input_route(signal).unwrap();
    assert_eq!(read_back, route);

    let selector = gpio.regs().read_field(
        esp32p4::GPIO_LAYOUT
            .func_in
            .field(esp32p4::GPIO_LAYOUT.in_sel, signal)
            .unwrap(),
    );
    assert!(
        selector < esp32p4::GPIO_PIN_COUNT as u32
            || selector == esp32p4::GPIO_CONSTANT_0_INPUT
            || selector == esp32p4::GPIO_CONSTANT_1_INPUT
    );
}

#[test]
fn inputs_fan_out_from_one_pin() {
    let mut gpio = c5();

    for signal in [6, 7, 40] {
        gpio.connect_input(signal, InputRoute::pin(2)).unwrap();
    }
    gpio.connect_input(8, InputRoute::pin(3)).unwrap();

    let signals = gpio.inputs_from_pin(2).unwrap().collect::<Vec<_>>();
    assert_eq!(signals, [6, 7, 40]);

    gpio.disconnect_input(7, Level::Low).unwrap();
    let signals = gpio.inputs_from_pin(2).unwrap().collect::<Vec<_>>();
    assert_eq!(signals, [6, 40]);

    assert!(gpio.inputs_from_pin(31).is_err());
}

#[test]
fn last_output_route_wins() {
    let mut gpio = c5();
    let layout = gpio.layout();

    assert_eq!(gpio.output_route(4).unwrap(), OutputRoute {
        signal: layout.output_signal_max,
        invert: false,
        enable_from_gpio: false,
        invert_enable: false,
    });

    gpio.connect_output(4, OutputRoute::signal(10)).unwrap();
    gpio.connect_output(
        4,
        OutputRoute {
            invert: true,
            ..OutputRoute::signal(20)
        },
    )
    .unwrap();

    let route = gpio.output_route(4).unwrap();
    assert_eq!(route.signal, 20);
    assert!(route.invert);

    gpio.disconnect_output(4).unwrap();
    assert_eq!(gpio.output_route(4).unwrap(), OutputRoute::gpio(layout));
}

#[test]
fn output_signals_are_bounded() {
    let mut gpio = c5();
    assert_eq!(
        gpio.connect_output(0, OutputRoute::signal(129)),
        Err(Error::InvalidSignal(129))
    );

    let mut gpio = p4();
    gpio.connect_output(56, OutputRoute::signal(255)).unwrap();
    assert_eq!(gpio.output_route(56).unwrap().signal, 255);
    assert_eq!(gpio.connect_output(57, OutputRoute::signal(0)), Err(Error::InvalidPin(57)));
}

#[test]
fn access_modes_through_the_register_layer() {
    use esp_regmap::register::{Access, Regs};

    let bus = esp32p4::Simulator::new(esp32p4::REGISTERS).unwrap();
    let mut regs = Regs::new(bus, esp32p4::REGISTERS);

    // Raised by hardware, cleared by writing 1.
    regs.bus_mut()
        .hw_set(esp32p4::GPIO_INT_RAW_REG, esp32p4::GPIO_COMP0_POS_INT_RAW_M)
        .unwrap();
    assert_eq!(regs.read_field(esp32p4::GPIO_COMP0_POS_INT_RAW), 1);
    assert_eq!(
        regs.write_field(esp32p4::GPIO_COMP0_POS_INT_RAW, 0),
        Err(RegisterError::NotWritable(Access::ReadW1cSelfSet))
    );
    assert_eq!(
        regs.write_field(esp32p4::GPIO_COMP0_POS_INT_ST, 1),
        Err(RegisterError::NotWritable(Access::ReadOnly))
    );

    regs.write_field(esp32p4::GPIO_COMP0_POS_INT_ENA, 1).unwrap();
    assert_eq!(
        regs.read_register(esp32p4::GPIO_INT_ENA_REG),
        esp32p4::GPIO_COMP0_POS_INT_ENA_M
    );

    // Write-only fields read back as 0 and are only written on their own.
    regs.pulse(esp32p4::GPIO_COMP0_POS_INT_CLR, 1).unwrap();
    assert_eq!(regs.read_field(esp32p4::GPIO_COMP0_POS_INT_CLR), 0);
    assert_eq!(
        regs.write_field(esp32p4::GPIO_BIST_START, 1),
        Err(RegisterError::NotWritable(Access::WriteOnly))
    );
    regs.write_field(esp32p4::GPIO_BIST_PAD_OE, 1).unwrap();
    assert_eq!(regs.read_register(esp32p4::GPIO_BIST_CTRL_REG), 1);
    // A pulse writes the whole register.
    regs.pulse(esp32p4::GPIO_BIST_START, 1).unwrap();
    assert_eq!(regs.read_register(esp32p4::GPIO_BIST_CTRL_REG), 0);
    assert_eq!(
        regs.pulse(esp32p4::GPIO_BIST_PAD_OE, 1),
        Err(RegisterError::NotWriteOnly(Access::ReadWrite))
    );

    assert_eq!(
        regs.set_bits(esp32p4::GPIO_OUT_W1TC_REG, 1),
        Err(RegisterError::NotACompanion(esp32p4::GPIO_OUT_W1TC_REG))
    );
    assert_eq!(
        regs.clear_bits(esp32p4::GPIO_OUT_REG, 1),
        Err(RegisterError::NotACompanion(esp32p4::GPIO_OUT_REG))
    );
    assert_eq!(regs.bus().fault_count(), 0);
}

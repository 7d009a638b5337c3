use esp_regmap::{
    register::RegisterBus,
    soc::esp32c5,
    tee::{Error, Permission, SecurityMode, Tee},
};

fn lp_tee() -> Tee<esp32c5::Simulator> {
    let bus = esp32c5::Simulator::new(esp32c5::REGISTERS).unwrap();
    Tee::new(bus, &esp32c5::LP_TEE_LAYOUT, esp32c5::REGISTERS)
}

fn tee() -> Tee<esp32c5::Simulator> {
    let bus = esp32c5::Simulator::new(esp32c5::REGISTERS).unwrap();
    Tee::new(bus, &esp32c5::TEE_LAYOUT, esp32c5::REGISTERS)
}

#[test]
fn lp_cpu_starts_in_ree2_unlocked() {
    let mut tee = lp_tee();

    assert_eq!(tee.master_mode(0), Ok(SecurityMode::Ree2));
    assert_eq!(tee.is_locked(0), Ok(false));
    assert_eq!(tee.master_mode(1), Err(Error::InvalidMaster(1)));
}

#[test]
fn hp_masters_start_in_tee() {
    let mut tee = tee();

    for master in 0..32 {
        assert_eq!(tee.master_mode(master), Ok(SecurityMode::Tee));
    }
    assert_eq!(tee.master_mode(32), Err(Error::InvalidMaster(32)));
}

#[test]
fn locked_mode_cannot_change() {
    let mut tee = lp_tee();

    tee.set_master_mode(0, SecurityMode::Tee).unwrap();
    assert_eq!(tee.master_mode(0), Ok(SecurityMode::Tee));

    tee.lock_master(0).unwrap();
    assert_eq!(tee.is_locked(0), Ok(true));
    assert_eq!(
        tee.set_master_mode(0, SecurityMode::Ree0),
        Err(Error::Locked(0))
    );
    assert_eq!(tee.master_mode(0), Ok(SecurityMode::Tee));

    let mut bus = tee.into_inner();
    assert_eq!(bus.read(esp32c5::LP_TEE_M0_MODE_CTRL_REG), 0b100);
}

#[test]
fn locking_one_master_leaves_the_others() {
    let mut tee = tee();

    tee.lock_master(3).unwrap();
    tee.set_master_mode(4, SecurityMode::Ree1).unwrap();

    assert_eq!(tee.master_mode(4), Ok(SecurityMode::Ree1));
    assert_eq!(tee.is_locked(4), Ok(false));
    assert_eq!(tee.set_master_mode(3, SecurityMode::Ree1), Err(Error::Locked(3)));
}

#[test]
fn permissions_reset_to_tee_only() {
    let mut tee = lp_tee();

    assert_eq!(tee.permission("EFUSE", SecurityMode::Tee), Ok(Permission::READ_WRITE));
    for mode in [SecurityMode::Ree0, SecurityMode::Ree1, SecurityMode::Ree2] {
        assert_eq!(tee.permission("efuse", mode), Ok(Permission::NONE));
    }
    assert_eq!(
        tee.permission("UART0", SecurityMode::Tee),
        Err(Error::UnknownTarget)
    );
}

#[test]
fn grant_permission_to_ree() {
    let mut tee = lp_tee();

    tee.set_permission("EFUSE", SecurityMode::Ree0, Permission {
        read: true,
        write: false,
    })
    .unwrap();

    assert_eq!(
        tee.permission("EFUSE", SecurityMode::Ree0),
        Ok(Permission {
            read: true,
            write: false,
        })
    );
    assert_eq!(tee.permission("EFUSE", SecurityMode::Ree1), Ok(Permission::NONE));

    let mut bus = tee.into_inner();
    assert_eq!(bus.read(esp32c5::LP_TEE_EFUSE_CTRL_REG), 0b0001_0011);
}

#[test]
fn hp_peripheral_permissions() {
    let mut tee = tee();

    assert_eq!(tee.permission("UART0", SecurityMode::Tee), Ok(Permission::READ_WRITE));

    tee.set_permission("UART0", SecurityMode::Ree2, Permission::READ_WRITE)
        .unwrap();
    tee.set_permission("UART0", SecurityMode::Tee, Permission::NONE)
        .unwrap();

    let mut bus = tee.into_inner();
    assert_eq!(bus.read(esp32c5::TEE_UART0_CTRL_REG), 0b1000_1000);
}

#[test]
fn reserved_permissions_are_refused() {
    let mut tee = lp_tee();

    assert_eq!(
        tee.set_permission("LP_TEE", SecurityMode::Ree0, Permission::READ_WRITE),
        Err(Error::Reserved)
    );
    assert_eq!(tee.permission("LP_TEE", SecurityMode::Ree0), Ok(Permission::NONE));
    assert_eq!(tee.permission("LP_TEE", SecurityMode::Tee), Ok(Permission::READ_WRITE));

    let mut bus = tee.into_inner();
    assert_eq!(bus.read(esp32c5::LP_TEE_LP_TEE_CTRL_REG), 0b0001_0001);
}

#[test]
fn reserved_bits_ignore_raw_writes() {
    let mut bus = esp32c5::Simulator::new(esp32c5::REGISTERS).unwrap();

    bus.write(esp32c5::LP_TEE_LP_TEE_CTRL_REG, 0xFF);
    assert_eq!(bus.read(esp32c5::LP_TEE_LP_TEE_CTRL_REG), 0x11);

    bus.write(esp32c5::TEE_TEE_CTRL_REG, 0xEE);
    assert_eq!(bus.read(esp32c5::TEE_TEE_CTRL_REG), 0x00);
    assert_eq!(bus.fault_count(), 0);
}

#[test]
fn controller_registers() {
    let mut tee = lp_tee();

    assert_eq!(tee.date(), Ok(35725664));
    assert_eq!(tee.date(), Ok(esp32c5::LP_TEE_DATE.reset()));

    tee.set_bus_error_response(true).unwrap();
    tee.clock_always_on(false).unwrap();
    tee.set_force_hp_memory_access(true).unwrap();

    let mut bus = tee.into_inner();
    assert_eq!(bus.read(esp32c5::LP_TEE_BUS_ERR_CONF_REG), 1);
    assert_eq!(bus.read(esp32c5::LP_TEE_CLOCK_GATE_REG), 0);
    assert_eq!(bus.read(esp32c5::LP_TEE_FORCE_ACC_HP_REG), 1);
}

#[test]
fn hp_controller_has_no_force_access() {
    let mut tee = tee();

    assert_eq!(tee.set_force_hp_memory_access(true), Err(Error::Unsupported));
    assert_eq!(tee.date(), Ok(esp32c5::TEE_DATE.reset()));
}

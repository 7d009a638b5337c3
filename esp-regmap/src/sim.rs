//! # Simulated register bus
//!
//! [`SimBus`] holds one word per register of a generated `REGISTERS` table
//! and applies the write semantics of each field's access mode. It is what
//! the host-side tests run the drivers against.
//!
//! | Access                             | Effect of a write         |
//! |------------------------------------|---------------------------|
//! | RO, HRO                            | none                      |
//! | WT                                 | none, reads back 0        |
//! | R/W, R/W/SC, R/W/WTC, R/W/SC/WTC   | stored                    |
//! | R/WTC/SS                           | a written 1 clears the bit|
//!
//! Writing a W1TS/W1TC companion sets/clears the written bits of its primary
//! register. Accesses to addresses missing from the table are faults. They
//! are recorded, or panic when the crate is built with
//! `ESP_REGMAP_CONFIG_SIM_FAULT_POLICY=panic`.

use crate::register::{Access, RegisterBus, RegisterInfo, Shadow};

/// Number of faults kept by [`SimBus::faults`]. Later faults are only
/// counted.
pub const MAX_FAULTS: usize = 16;

/// Simulator errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The register table has a different length than the simulator.
    TableSize {
        /// The length of the table.
        table: usize,
        /// The number of registers the simulator holds.
        simulator: usize,
    },
    /// The register table is not sorted by address.
    Unsorted(u32),
    /// No register at this address.
    UnknownRegister(u32),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::TableSize { table, simulator } => write!(
                f,
                "The register table has {table} entries, the simulator holds {simulator}"
            ),
            Error::Unsorted(address) => {
                write!(f, "The register table is not sorted at {address:#010x}")
            }
            Error::UnknownRegister(address) => write!(f, "No register at {address:#010x}"),
        }
    }
}

impl core::error::Error for Error {}

/// An access to an address without a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Fault {
    pub address: u32,
    /// The written value, `None` for reads.
    pub value: Option<u32>,
}

/// Register file of one chip, `N` being the chip's `REGISTER_COUNT`.
pub struct SimBus<const N: usize> {
    table: &'static [RegisterInfo],
    values: [u32; N],
    faults: [Fault; MAX_FAULTS],
    fault_count: usize,
}

impl<const N: usize> SimBus<N> {
    /// Creates a register file in its reset state.
    pub fn new(table: &'static [RegisterInfo]) -> Result<Self, Error> {
        if table.len() != N {
            return Err(Error::TableSize {
                table: table.len(),
                simulator: N,
            });
        }
        if let Some(pair) = table.windows(2).find(|w| w[0].address >= w[1].address) {
            return Err(Error::Unsorted(pair[1].address));
        }

        let mut bus = Self {
            table,
            values: [0; N],
            faults: [Fault {
                address: 0,
                value: None,
            }; MAX_FAULTS],
            fault_count: 0,
        };
        bus.reset();

        Ok(bus)
    }

    /// Restores every register to its reset value and forgets the faults.
    pub fn reset(&mut self) {
        for (value, reg) in self.values.iter_mut().zip(self.table) {
            *value = reg.reset;
        }
        self.fault_count = 0;
    }

    fn index(&self, address: u32) -> Option<usize> {
        self.table
            .binary_search_by_key(&address, |r| r.address)
            .ok()
    }

    fn index_or_err(&self, address: u32) -> Result<usize, Error> {
        self.index(address).ok_or(Error::UnknownRegister(address))
    }

    /// The stored value, as hardware would see it. Unlike a bus read, this
    /// does not hide write-only fields.
    pub fn peek(&self, address: u32) -> Result<u32, Error> {
        Ok(self.values[self.index_or_err(address)?])
    }

    /// Emulates hardware setting bits, regardless of access mode.
    pub fn hw_set(&mut self, address: u32, mask: u32) -> Result<(), Error> {
        let i = self.index_or_err(address)?;
        self.values[i] |= mask & self.table[i].defined_mask();
        Ok(())
    }

    /// Emulates hardware clearing bits, regardless of access mode.
    pub fn hw_clear(&mut self, address: u32, mask: u32) -> Result<(), Error> {
        let i = self.index_or_err(address)?;
        self.values[i] &= !mask;
        Ok(())
    }

    /// Emulates hardware completing the action requested through the
    /// self-clearing fields of a register. They return to their reset value.
    pub fn complete_self_clear(&mut self, address: u32) -> Result<(), Error> {
        let i = self.index_or_err(address)?;
        let reg = &self.table[i];

        for info in reg.fields {
            if info.field.access().is_self_clearing() {
                self.values[i] = info.field.insert(self.values[i], info.field.reset());
            }
        }

        Ok(())
    }

    /// The recorded faults, oldest first.
    pub fn faults(&self) -> &[Fault] {
        &self.faults[..self.fault_count.min(MAX_FAULTS)]
    }

    /// The number of faults since the last reset, including those not kept.
    pub fn fault_count(&self) -> usize {
        self.fault_count
    }

    fn fault(&mut self, address: u32, value: Option<u32>) {
        cfg_if::cfg_if! {
            if #[cfg(sim_fault_policy_panic)] {
                panic!("Access to unmapped address {:#010x}", address);
            } else {
                warn!("Access to unmapped address {:#010x}", address);
            }
        }

        if self.fault_count < MAX_FAULTS {
            self.faults[self.fault_count] = Fault { address, value };
        }
        self.fault_count += 1;
    }

    // The value the register holds after software writes `value` to it.
    fn written(reg: &RegisterInfo, current: u32, value: u32) -> u32 {
        reg.fields.iter().fold(current, |acc, info| {
            let field = info.field;
            match field.access() {
                Access::ReadOnly | Access::HardwareReadOnly => acc,
                Access::WriteOnly => acc & !field.mask(),
                Access::ReadW1cSelfSet => acc & !(value & field.mask()),
                Access::ReadWrite
                | Access::ReadWriteSelfClear
                | Access::ReadWriteW1tc
                | Access::ReadWriteSelfClearW1tc => (acc & !field.mask()) | (value & field.mask()),
            }
        })
    }
}

impl<const N: usize> RegisterBus for SimBus<N> {
    fn read(&mut self, address: u32) -> u32 {
        let Some(i) = self.index(address) else {
            self.fault(address, None);
            return 0;
        };

        self.values[i] & !self.table[i].access_mask(Access::WriteOnly)
    }

    fn write(&mut self, address: u32, value: u32) {
        let Some(i) = self.index(address) else {
            self.fault(address, Some(value));
            return;
        };
        let reg = &self.table[i];

        match reg.shadow_of {
            Some(Shadow::Set(primary)) => {
                if let Some(p) = self.index(primary) {
                    self.values[p] |= value & self.table[p].defined_mask();
                }
            }
            Some(Shadow::Clear(primary)) => {
                if let Some(p) = self.index(primary) {
                    self.values[p] &= !value;
                }
            }
            None => {}
        }

        self.values[i] = Self::written(reg, self.values[i], value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::{Field, FieldInfo};

    const STATUS: u32 = 0x100;
    const STATUS_W1TS: u32 = 0x104;
    const STATUS_W1TC: u32 = 0x108;
    const CONF: u32 = 0x10C;

    static TABLE: [RegisterInfo; 4] = [
        RegisterInfo {
            name: "T_STATUS",
            address: STATUS,
            reset: 0,
            fields: &[FieldInfo {
                name: "T_STATUS_INTERRUPT",
                field: Field::new(STATUS, 0, 8, Access::ReadWriteW1tc, 0),
            }],
            w1ts: Some(STATUS_W1TS),
            w1tc: Some(STATUS_W1TC),
            shadow_of: None,
        },
        RegisterInfo {
            name: "T_STATUS_W1TS",
            address: STATUS_W1TS,
            reset: 0,
            fields: &[FieldInfo {
                name: "T_STATUS_W1TS",
                field: Field::new(STATUS_W1TS, 0, 8, Access::WriteOnly, 0),
            }],
            w1ts: None,
            w1tc: None,
            shadow_of: Some(Shadow::Set(STATUS)),
        },
        RegisterInfo {
            name: "T_STATUS_W1TC",
            address: STATUS_W1TC,
            reset: 0,
            fields: &[FieldInfo {
                name: "T_STATUS_W1TC",
                field: Field::new(STATUS_W1TC, 0, 8, Access::WriteOnly, 0),
            }],
            w1ts: None,
            w1tc: None,
            shadow_of: Some(Shadow::Clear(STATUS)),
        },
        RegisterInfo {
            name: "T_CONF",
            address: CONF,
            reset: 0x31,
            fields: &[
                FieldInfo {
                    name: "T_MODE",
                    field: Field::new(CONF, 0, 2, Access::ReadWrite, 1),
                },
                FieldInfo {
                    name: "T_START",
                    field: Field::new(CONF, 2, 1, Access::WriteOnly, 0),
                },
                FieldInfo {
                    name: "T_VERSION",
                    field: Field::new(CONF, 4, 2, Access::ReadOnly, 3),
                },
                FieldInfo {
                    name: "T_RAW",
                    field: Field::new(CONF, 8, 1, Access::ReadW1cSelfSet, 0),
                },
                FieldInfo {
                    name: "T_BUSY",
                    field: Field::new(CONF, 9, 1, Access::ReadWriteSelfClear, 0),
                },
            ],
            w1ts: None,
            w1tc: None,
            shadow_of: None,
        },
    ];

    fn sim() -> SimBus<4> {
        SimBus::new(&TABLE).unwrap()
    }

    #[test]
    fn starts_at_reset() {
        let mut bus = sim();
        assert_eq!(bus.read(CONF), 0x31);
        assert_eq!(bus.read(STATUS), 0);
    }

    #[test]
    fn table_length_must_match() {
        assert_eq!(
            SimBus::<3>::new(&TABLE).err(),
            Some(Error::TableSize {
                table: 4,
                simulator: 3
            })
        );
    }

    #[test]
    fn write_semantics_follow_access() {
        let mut bus = sim();

        // MODE stored, START not kept, VERSION untouched.
        bus.write(CONF, 0x06);
        assert_eq!(bus.read(CONF), 0x32);

        // Writing 1 clears the hardware-set bit.
        bus.hw_set(CONF, 1 << 8).unwrap();
        assert_eq!(bus.read(CONF) & (1 << 8), 1 << 8);
        bus.write(CONF, 0x32 | (1 << 8));
        assert_eq!(bus.read(CONF) & (1 << 8), 0);
    }

    #[test]
    fn companions_modify_the_primary() {
        let mut bus = sim();

        bus.write(STATUS_W1TS, 0b1010);
        assert_eq!(bus.read(STATUS), 0b1010);
        assert_eq!(bus.read(STATUS_W1TS), 0);

        bus.write(STATUS_W1TC, 0b0010);
        assert_eq!(bus.read(STATUS), 0b1000);
    }

    #[test]
    fn self_clearing_fields_return_to_reset() {
        let mut bus = sim();

        bus.write(CONF, 0x31 | (1 << 9));
        assert_eq!(bus.read(CONF) & (1 << 9), 1 << 9);

        bus.complete_self_clear(CONF).unwrap();
        assert_eq!(bus.read(CONF), 0x31);
    }

    #[test]
    fn unmapped_accesses_are_recorded() {
        let mut bus = sim();

        assert_eq!(bus.read(0x200), 0);
        bus.write(0x204, 7);

        assert_eq!(bus.fault_count(), 2);
        assert_eq!(
            bus.faults()[1],
            Fault {
                address: 0x204,
                value: Some(7)
            }
        );

        bus.reset();
        assert!(bus.faults().is_empty());
    }

    #[test]
    fn hardware_helpers_reject_unknown_registers() {
        let mut bus = sim();
        assert_eq!(bus.hw_set(0x300, 1), Err(Error::UnknownRegister(0x300)));
    }
}

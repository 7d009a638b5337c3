//! # TEE and LP_TEE permission controllers
//!
//! Each bus master runs in one of four security modes, set in its
//! `Mn_MODE_CTRL` register. Every peripheral behind the controller has a
//! permission register with one read bit and one write bit per mode:
//!
//! | Bit | 0        | 1         | 2         | 3         | 4         | 5          | 6          | 7          |
//! |-----|----------|-----------|-----------|-----------|-----------|------------|------------|------------|
//! |     | READ_TEE | READ_REE0 | READ_REE1 | READ_REE2 | WRITE_TEE | WRITE_REE0 | WRITE_REE1 | WRITE_REE2 |
//!
//! Some permission bits are `HRO` on a given chip: they exist in the map but
//! hardware ignores them. [`Tee::set_permission`] refuses to change those.

use crate::register::{Access, Field, RegisterArray, RegisterBus, RegisterInfo, Regs};

/// Security mode of a bus master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SecurityMode {
    /// Trusted execution environment.
    Tee  = 0,
    /// Rich execution environment 0.
    Ree0 = 1,
    /// Rich execution environment 1.
    Ree1 = 2,
    /// Rich execution environment 2.
    Ree2 = 3,
}

impl SecurityMode {
    /// All modes, in register bit order.
    pub const ALL: [SecurityMode; 4] = [
        SecurityMode::Tee,
        SecurityMode::Ree0,
        SecurityMode::Ree1,
        SecurityMode::Ree2,
    ];

    /// Decodes the two bits of `Mn_MODE`.
    pub const fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0 => SecurityMode::Tee,
            1 => SecurityMode::Ree0,
            2 => SecurityMode::Ree1,
            _ => SecurityMode::Ree2,
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Access rights of one security mode to one peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Permission {
    pub read: bool,
    pub write: bool,
}

impl Permission {
    pub const NONE: Self = Self {
        read: false,
        write: false,
    };

    pub const READ_WRITE: Self = Self {
        read: true,
        write: true,
    };
}

/// A peripheral guarded by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeeTarget {
    /// The peripheral, e.g. `EFUSE`.
    pub name: &'static str,
    /// Address of the permission register.
    pub register: u32,
    /// `READ_<MODE>_<NAME>`, indexed by [`SecurityMode`].
    pub read: [Field; 4],
    /// `WRITE_<MODE>_<NAME>`, indexed by [`SecurityMode`].
    pub write: [Field; 4],
}

/// Generated register layout of a TEE controller.
#[derive(Debug, Clone, Copy)]
pub struct TeeLayout {
    pub name: &'static str,
    /// `Mn_MODE_CTRL`
    pub masters: RegisterArray,
    /// Template `Mn_MODE` field of [`TeeLayout::masters`].
    pub mode: Field,
    /// Template `Mn_LOCK` field of [`TeeLayout::masters`].
    pub lock: Field,
    pub targets: &'static [TeeTarget],
    pub bus_err_resp_en: Option<Field>,
    pub clk_en: Option<Field>,
    pub date: Option<Field>,
    /// Only present on LP_TEE.
    pub force_hp_mem: Option<Field>,
}

impl TeeLayout {
    /// Looks up a permission target by peripheral name.
    pub fn target(&self, name: &str) -> Option<&'static TeeTarget> {
        let targets = self.targets;
        targets.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }
}

/// TEE errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The controller has no such master.
    InvalidMaster(u32),
    /// `Mn_LOCK` is set, the mode can't change until reset.
    Locked(u32),
    /// The controller guards no peripheral of that name.
    UnknownTarget,
    /// The permission bit is reserved (`HRO`) on this chip.
    Reserved,
    /// The controller doesn't have the register.
    Unsupported,
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
            Error::InvalidMaster(m) => write!(f, "Master {m} does not exist"),
            Error::Locked(m) => write!(f, "The security mode of master {m} is locked"),
            Error::UnknownTarget => write!(f, "Unknown permission target"),
            Error::Reserved => write!(f, "The permission bit is reserved on this chip"),
            Error::Unsupported => write!(f, "The controller does not have this register"),
            Error::Register(error) => write!(f, "{error}"),
        }
    }
}

impl core::error::Error for Error {}

/// Driver for one TEE controller.
pub struct Tee<B> {
    regs: Regs<B>,
    layout: &'static TeeLayout,
}

impl<B> Tee<B>
where
    B: RegisterBus,
{
    /// `layout` is one of the chip's generated `<P>_LAYOUT` statics.
    pub fn new(bus: B, layout: &'static TeeLayout, table: &'static [RegisterInfo]) -> Self {
        Self {
            regs: Regs::new(bus, table),
            layout,
        }
    }

    pub fn layout(&self) -> &'static TeeLayout {
        self.layout
    }

    pub fn into_inner(self) -> B {
        self.regs.into_inner()
    }

    fn master_field(&self, template: Field, master: u32) -> Result<Field, Error> {
        self.layout
            .masters
            .field(template, master)
            .ok_or(Error::InvalidMaster(master))
    }

    fn target(&self, name: &str) -> Result<&'static TeeTarget, Error> {
        self.layout.target(name).ok_or(Error::UnknownTarget)
    }

    fn optional(&self, field: Option<Field>) -> Result<Field, Error> {
        field.ok_or(Error::Unsupported)
    }

    pub fn master_mode(&mut self, master: u32) -> Result<SecurityMode, Error> {
        let mode = self.master_field(self.layout.mode, master)?;
        Ok(SecurityMode::from_bits(self.regs.read_field(mode)))
    }

    pub fn is_locked(&mut self, master: u32) -> Result<bool, Error> {
        let lock = self.master_field(self.layout.lock, master)?;
        Ok(self.regs.read_field(lock) != 0)
    }

    pub fn set_master_mode(&mut self, master: u32, mode: SecurityMode) -> Result<(), Error> {
        let field = self.master_field(self.layout.mode, master)?;
        if self.is_locked(master)? {
            return Err(Error::Locked(master));
        }

        self.regs.write_field(field, mode as u32)?;
        debug!("{} master {} -> mode {}", self.layout.name, master, mode as u32);

        Ok(())
    }

    /// Locks the security mode of a master until the next reset.
    pub fn lock_master(&mut self, master: u32) -> Result<(), Error> {
        let lock = self.master_field(self.layout.lock, master)?;
        self.regs.write_field(lock, 1)?;
        Ok(())
    }

    pub fn permission(&mut self, target: &str, mode: SecurityMode) -> Result<Permission, Error> {
        let target = self.target(target)?;

        Ok(Permission {
            read: self.regs.read_field(target.read[mode.index()]) != 0,
            write: self.regs.read_field(target.write[mode.index()]) != 0,
        })
    }

    /// Fails without writing anything if either bit is reserved.
    pub fn set_permission(
        &mut self,
        target: &str,
        mode: SecurityMode,
        permission: Permission,
    ) -> Result<(), Error> {
        let target = self.target(target)?;
        let read = target.read[mode.index()];
        let write = target.write[mode.index()];

        if [read, write]
            .iter()
            .any(|f| f.access() == Access::HardwareReadOnly)
        {
            return Err(Error::Reserved);
        }

        self.regs.write_field(read, permission.read as u32)?;
        self.regs.write_field(write, permission.write as u32)?;

        Ok(())
    }

    /// Whether blocked accesses return a bus error to the CPU.
    pub fn set_bus_error_response(&mut self, enable: bool) -> Result<(), Error> {
        let field = self.optional(self.layout.bus_err_resp_en)?;
        self.regs.write_field(field, enable as u32)?;
        Ok(())
    }

    /// Keeps the controller clock running instead of gating it automatically.
    pub fn clock_always_on(&mut self, enable: bool) -> Result<(), Error> {
        let field = self.optional(self.layout.clk_en)?;
        self.regs.write_field(field, enable as u32)?;
        Ok(())
    }

    /// The version register.
    pub fn date(&mut self) -> Result<u32, Error> {
        let field = self.optional(self.layout.date)?;
        Ok(self.regs.read_field(field))
    }

    /// Lets the LP CPU access HP memory regardless of the permission
    /// registers.
    pub fn set_force_hp_memory_access(&mut self, enable: bool) -> Result<(), Error> {
        let field = self.optional(self.layout.force_hp_mem)?;
        self.regs.write_field(field, enable as u32)?;
        Ok(())
    }
}

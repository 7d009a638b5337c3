//! # Register access
//!
//! Every field of every register is described by a [`Field`], generated per
//! chip into [`crate::soc`]. The descriptors carry the same information as the
//! `_S`, `_V` and `_M` constants next to them, plus the access mode, so that
//! [`Regs`] can refuse writes that hardware would ignore or misinterpret.
//!
//! Bits of a register that is shared with hardware should be changed through
//! the register's write-1-to-set and write-1-to-clear companions where they
//! exist ([`Regs::set_bits`], [`Regs::clear_bits`], [`Regs::clear_status`]).
//! Those writes only touch the bits that are 1 in the written value, so they
//! can't race against hardware setting other bits of the same register.

/// Access mode of a register field, as tagged in the reference manual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Access {
    /// `RO`
    ReadOnly,
    /// `R/W`
    ReadWrite,
    /// `WT`: write-only, reads back as 0.
    WriteOnly,
    /// `R/W/SC`: cleared by hardware once the requested action completes.
    ReadWriteSelfClear,
    /// `R/W/WTC`: also cleared through a write-1-to-clear companion.
    ReadWriteW1tc,
    /// `R/W/SC/WTC`
    ReadWriteSelfClearW1tc,
    /// `R/WTC/SS`: set by hardware, cleared by writing 1.
    ReadW1cSelfSet,
    /// `HRO`: reserved on this chip. Writes have no effect.
    HardwareReadOnly,
}

impl Access {
    /// The vendor tag.
    pub const fn tag(self) -> &'static str {
        match self {
            Access::ReadOnly => "RO",
            Access::ReadWrite => "R/W",
            Access::WriteOnly => "WT",
            Access::ReadWriteSelfClear => "R/W/SC",
            Access::ReadWriteW1tc => "R/W/WTC",
            Access::ReadWriteSelfClearW1tc => "R/W/SC/WTC",
            Access::ReadW1cSelfSet => "R/WTC/SS",
            Access::HardwareReadOnly => "HRO",
        }
    }

    /// Whether reading the field returns state.
    pub const fn is_readable(self) -> bool {
        !matches!(self, Access::WriteOnly)
    }

    /// Whether software writes have any effect on the field.
    pub const fn is_writable(self) -> bool {
        !matches!(self, Access::ReadOnly | Access::HardwareReadOnly)
    }

    /// Whether the field may be changed with a read-modify-write of its
    /// register.
    pub const fn allows_read_modify_write(self) -> bool {
        matches!(
            self,
            Access::ReadWrite
                | Access::ReadWriteSelfClear
                | Access::ReadWriteW1tc
                | Access::ReadWriteSelfClearW1tc
        )
    }

    /// Whether hardware clears the field on its own.
    pub const fn is_self_clearing(self) -> bool {
        matches!(
            self,
            Access::ReadWriteSelfClear | Access::ReadWriteSelfClearW1tc
        )
    }
}

impl core::fmt::Display for Access {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.tag())
    }
}

/// A bit field of a 32-bit register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Field {
    register: u32,
    shift: u8,
    width: u8,
    access: Access,
    reset: u32,
}

impl Field {
    /// Describes `width` bits starting at bit `shift` of the register at
    /// `register`.
    pub const fn new(register: u32, shift: u8, width: u8, access: Access, reset: u32) -> Self {
        ::core::assert!(width > 0 && shift as u32 + width as u32 <= 32);

        Self {
            register,
            shift,
            width,
            access,
            reset,
        }
    }

    /// The address of the register holding the field.
    pub const fn register(&self) -> u32 {
        self.register
    }

    /// `_S`
    pub const fn shift(&self) -> u32 {
        self.shift as u32
    }

    pub const fn width(&self) -> u32 {
        self.width as u32
    }

    pub const fn access(&self) -> Access {
        self.access
    }

    /// The field value after reset, unshifted.
    pub const fn reset(&self) -> u32 {
        self.reset
    }

    /// `_V`, the largest value the field holds.
    pub const fn mask_v(&self) -> u32 {
        if self.width == 32 {
            u32::MAX
        } else {
            (1 << self.width) - 1
        }
    }

    /// `_M`, the bits of the register covered by the field.
    pub const fn mask(&self) -> u32 {
        self.mask_v() << self.shift
    }

    /// Extracts the field from a raw register value.
    pub const fn extract(&self, raw: u32) -> u32 {
        (raw >> self.shift) & self.mask_v()
    }

    /// Replaces the field in a raw register value. `value` is truncated to
    /// the field width.
    pub const fn insert(&self, raw: u32, value: u32) -> u32 {
        (raw & !self.mask()) | ((value & self.mask_v()) << self.shift)
    }

    /// The same field in another register, used to move the template fields
    /// of a register array to a concrete instance.
    pub const fn at(self, register: u32) -> Self {
        Self { register, ..self }
    }
}

/// A named field, as listed in [`RegisterInfo::fields`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: &'static str,
    pub field: Field,
}

/// The register a W1TS/W1TC companion modifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Shadow {
    /// Writing 1 sets the bit in the register at this address.
    Set(u32),
    /// Writing 1 clears the bit in the register at this address.
    Clear(u32),
}

/// Generated description of one register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterInfo {
    pub name: &'static str,
    pub address: u32,
    pub reset: u32,
    pub fields: &'static [FieldInfo],
    /// Address of the write-1-to-set companion.
    pub w1ts: Option<u32>,
    /// Address of the write-1-to-clear companion.
    pub w1tc: Option<u32>,
    /// Set for the companions themselves.
    pub shadow_of: Option<Shadow>,
}

impl RegisterInfo {
    /// Looks up a register in a table sorted by address.
    pub fn find(table: &'static [RegisterInfo], address: u32) -> Option<&'static RegisterInfo> {
        table
            .binary_search_by_key(&address, |r| r.address)
            .ok()
            .map(|i| &table[i])
    }

    /// The bits covered by fields with the given access.
    pub fn access_mask(&self, access: Access) -> u32 {
        self.fields
            .iter()
            .filter(|f| f.field.access() == access)
            .fold(0, |acc, f| acc | f.field.mask())
    }

    /// The bits covered by any field.
    pub fn defined_mask(&self) -> u32 {
        self.fields.iter().fold(0, |acc, f| acc | f.field.mask())
    }

    /// Looks up a field by its full name.
    pub fn field(&self, name: &str) -> Option<Field> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.field)
    }
}

/// A register array such as `GPIO_PIN{n}`. Instances may be sparse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterArray {
    name: &'static str,
    base: u32,
    stride: u32,
    indices: &'static [u32],
}

impl RegisterArray {
    pub const fn new(name: &'static str, base: u32, stride: u32, indices: &'static [u32]) -> Self {
        Self {
            name,
            base,
            stride,
            indices,
        }
    }

    /// The template name, e.g. `GPIO_PIN{n}`.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The indices that exist, ascending.
    pub const fn indices(&self) -> &'static [u32] {
        self.indices
    }

    pub const fn len(&self) -> usize {
        self.indices.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn contains(&self, n: u32) -> bool {
        self.indices.binary_search(&n).is_ok()
    }

    /// The address of instance `n`, if it exists.
    pub fn address(&self, n: u32) -> Option<u32> {
        self.contains(n).then(|| self.base + n * self.stride)
    }

    /// Moves a template field of this array to instance `n`.
    pub fn field(&self, template: Field, n: u32) -> Option<Field> {
        self.address(n).map(|address| template.at(address))
    }
}

/// Register access errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The field can't be changed with a read-modify-write.
    NotWritable(Access),
    /// Only write-only fields are pulsed.
    NotWriteOnly(Access),
    /// The value does not fit in the field.
    ValueTooWide {
        /// The largest value the field holds.
        max: u32,
    },
    /// Bit numbers run from 0 to 31.
    BitOutOfRange(u32),
    /// The address is not a W1TS/W1TC companion of the expected kind.
    NotACompanion(u32),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::NotWritable(access) => write!(f, "{access} fields can't be modified"),
            Error::NotWriteOnly(access) => {
                write!(f, "Only WT fields can be pulsed, this one is {access}")
            }
            Error::ValueTooWide { max } => write!(f, "Value exceeds the field maximum {max:#x}"),
            Error::BitOutOfRange(bit) => write!(f, "Bit {bit} is outside of a 32-bit register"),
            Error::NotACompanion(address) => {
                write!(f, "{address:#010x} is not a matching W1TS/W1TC register")
            }
        }
    }
}

impl core::error::Error for Error {}

/// Raw 32-bit register access.
pub trait RegisterBus {
    fn read(&mut self, address: u32) -> u32;

    fn write(&mut self, address: u32, value: u32);
}

impl<B> RegisterBus for &mut B
where
    B: RegisterBus + ?Sized,
{
    fn read(&mut self, address: u32) -> u32 {
        (**self).read(address)
    }

    fn write(&mut self, address: u32, value: u32) {
        (**self).write(address, value)
    }
}

/// Volatile access to the memory-mapped registers of the running chip.
#[derive(Debug)]
#[non_exhaustive]
pub struct Mmio;

impl Mmio {
    /// # Safety
    ///
    /// The caller must run on the chip the register tables were generated
    /// for, and must ensure that no other driver owns the registers accessed
    /// through this bus.
    pub unsafe fn new() -> Self {
        Self
    }
}

impl RegisterBus for Mmio {
    fn read(&mut self, address: u32) -> u32 {
        unsafe { (address as usize as *const u32).read_volatile() }
    }

    fn write(&mut self, address: u32, value: u32) {
        unsafe { (address as usize as *mut u32).write_volatile(value) }
    }
}

/// Field-level access to the registers of one chip.
pub struct Regs<B> {
    bus: B,
    table: &'static [RegisterInfo],
}

impl<B> Regs<B>
where
    B: RegisterBus,
{
    /// `table` is the chip's generated `REGISTERS`.
    pub fn new(bus: B, table: &'static [RegisterInfo]) -> Self {
        Self { bus, table }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn into_inner(self) -> B {
        self.bus
    }

    pub fn table(&self) -> &'static [RegisterInfo] {
        self.table
    }

    pub fn read_register(&mut self, address: u32) -> u32 {
        self.bus.read(address)
    }

    /// Reads a field. Write-only fields read as 0 without touching the bus.
    pub fn read_field(&mut self, field: Field) -> u32 {
        if !field.access().is_readable() {
            return 0;
        }

        field.extract(self.bus.read(field.register()))
    }

    /// Read-modify-write of a single field.
    ///
    /// Write-1-to-clear bits of the same register are written back as 0, so a
    /// status bit raised by hardware between the read and the write survives.
    pub fn write_field(&mut self, field: Field, value: u32) -> Result<(), Error> {
        if value > field.mask_v() {
            return Err(Error::ValueTooWide {
                max: field.mask_v(),
            });
        }

        if !field.access().allows_read_modify_write() {
            cfg_if::cfg_if! {
                if #[cfg(strict_access)] {
                    return Err(Error::NotWritable(field.access()));
                } else {
                    warn!(
                        "Skipping write to {} field at {:#010x}",
                        field.access().tag(),
                        field.register()
                    );
                    return Ok(());
                }
            }
        }

        let address = field.register();
        let w1c = RegisterInfo::find(self.table, address)
            .map(|reg| reg.access_mask(Access::ReadW1cSelfSet))
            .unwrap_or(0);

        let raw = self.bus.read(address) & !w1c;
        self.write(address, field.insert(raw, value));

        Ok(())
    }

    /// Writes a write-only field on its own, with every other bit 0.
    pub fn pulse(&mut self, field: Field, value: u32) -> Result<(), Error> {
        if field.access() != Access::WriteOnly {
            return Err(Error::NotWriteOnly(field.access()));
        }
        if value > field.mask_v() {
            return Err(Error::ValueTooWide {
                max: field.mask_v(),
            });
        }

        self.write(field.register(), field.insert(0, value));

        Ok(())
    }

    /// Clears one status bit through the W1TC companion of the status
    /// register.
    pub fn clear_status(&mut self, w1tc: u32, bit: u32) -> Result<(), Error> {
        if bit >= 32 {
            return Err(Error::BitOutOfRange(bit));
        }

        self.clear_bits(w1tc, 1 << bit)
    }

    /// Sets the bits of `mask` in the primary register of a W1TS companion.
    pub fn set_bits(&mut self, w1ts: u32, mask: u32) -> Result<(), Error> {
        self.companion_write(w1ts, mask, |shadow| matches!(shadow, Shadow::Set(_)))
    }

    /// Clears the bits of `mask` in the primary register of a W1TC companion.
    pub fn clear_bits(&mut self, w1tc: u32, mask: u32) -> Result<(), Error> {
        self.companion_write(w1tc, mask, |shadow| matches!(shadow, Shadow::Clear(_)))
    }

    fn companion_write(
        &mut self,
        address: u32,
        mask: u32,
        expected: impl Fn(Shadow) -> bool,
    ) -> Result<(), Error> {
        let is_companion = RegisterInfo::find(self.table, address)
            .and_then(|reg| reg.shadow_of)
            .is_some_and(expected);
        if !is_companion {
            return Err(Error::NotACompanion(address));
        }

        self.write(address, mask);

        Ok(())
    }

    fn write(&mut self, address: u32, value: u32) {
        #[cfg(trace_writes)]
        trace!("{:#010x} <- {:#010x}", address, value);

        self.bus.write(address, value);
    }
}

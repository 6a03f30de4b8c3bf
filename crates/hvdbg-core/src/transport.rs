use crate::{Dtb, Error, Pa, Va, VcpuId};

/// A VCPU register exposed by the transport.
///
/// Only the registers consumed by the introspection core are listed;
/// `CR3` carries the current directory table base, `CR8` the task
/// priority (IRQL on NT) and `CS` the code-segment selector used for the
/// privilege-level check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Current directory table base.
    Cr3,

    /// Task-priority register.
    Cr8,

    /// Code-segment selector.
    Cs,
}

/// An interrupt to inject into a virtual CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupt {
    /// Vector number of the interrupt.
    pub vector: u8,

    /// Error code pushed by the interrupt.
    pub error_code: u32,

    /// Faulting linear address, loaded into `CR2` before delivery.
    pub cr2: Va,
}

/// The hypervisor shared-memory channel.
///
/// This is the only path to the guest: physical memory moves, register
/// reads and VCPU control all go through it. Implementations wrap a
/// handle opened by name (a UTF-8 shared-memory identifier) and hold it
/// for the lifetime of the session.
///
/// All operations are synchronous and blocking; the introspector assumes
/// exclusive control of the paused VM while a call is in flight. Timeouts
/// are the transport's responsibility.
pub trait Transport {
    /// Reads `buffer.len()` bytes of guest memory at the physical address
    /// `pa`.
    fn read_physical(&self, pa: Pa, buffer: &mut [u8]) -> Result<(), Error>;

    /// Writes `buffer` into guest memory at the physical address `pa`.
    fn write_physical(&self, pa: Pa, buffer: &[u8]) -> Result<(), Error>;

    /// Reads guest memory at the virtual address `va`, translated by the
    /// transport's own MMU walk under `dtb`.
    ///
    /// The introspection core only uses this after a successful fault
    /// injection, when the paging structures for `va` are known to be
    /// populated.
    fn read_virtual(&self, dtb: Dtb, va: Va, buffer: &mut [u8]) -> Result<(), Error>;

    /// Writes guest memory at the virtual address `va`, translated by the
    /// transport's own MMU walk under `dtb`.
    fn write_virtual(&self, dtb: Dtb, va: Va, buffer: &[u8]) -> Result<(), Error>;

    /// Reads a register of the given virtual CPU.
    fn register(&self, vcpu: VcpuId, register: Register) -> Result<u64, Error>;

    /// Injects an interrupt into the given virtual CPU.
    ///
    /// The interrupt is delivered when the VCPU next resumes.
    fn inject_interrupt(&self, vcpu: VcpuId, interrupt: Interrupt) -> Result<(), Error>;

    /// Resumes the VM until the VCPU's instruction pointer returns to its
    /// value at call entry, then pauses it again.
    ///
    /// This lets an injected handler execute to completion inside the
    /// guest. `reason` tags the operation for the transport's diagnostics.
    fn run_to_current(&self, vcpu: VcpuId, reason: &str) -> Result<(), Error>;

    /// Pauses the virtual machine.
    fn pause(&self) -> Result<(), Error>;

    /// Resumes the virtual machine.
    fn resume(&self) -> Result<(), Error>;
}

//! Guest operating system contracts.
//!
//! The introspection core does not enumerate processes or walk the
//! guest's memory-map structures itself; it consumes the contracts in
//! this module. The [`ProcessOracle`] supplies process context and VMA
//! lookups, and [`GuestOs`] is the paged-memory accessor seam the
//! [`Session`] facade drives.
//!
//! [`Session`]: crate::Session

use serde::{Deserialize, Serialize};

use crate::{Dtb, Error, PageBuffer, Pa, Transport, Va};

/// A process object within the guest.
///
/// Equivalent to an `EPROCESS*` on Windows.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ProcessObject(pub Va);

impl ProcessObject {
    /// Checks if the process object is a null reference.
    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }
}

impl From<Va> for ProcessObject {
    fn from(va: Va) -> Self {
        Self(va)
    }
}

impl From<ProcessObject> for Va {
    fn from(value: ProcessObject) -> Self {
        value.0
    }
}

impl std::fmt::Display for ProcessObject {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A process handle: the opaque process object plus its translation
/// roots.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Process {
    /// The process object.
    pub object: ProcessObject,

    /// Kernel-side directory table base.
    pub kdtb: Dtb,

    /// User-side directory table base.
    ///
    /// Equals [`kdtb`] on guests without kernel page-table isolation.
    ///
    /// [`kdtb`]: Self::kdtb
    pub udtb: Dtb,
}

/// An opaque handle to a virtual memory area within a process.
///
/// Equivalent to a VAD node address on Windows.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct VmArea(pub Va);

/// The contiguous extent of a virtual memory area.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct VmAreaSpan {
    /// The start address of the area.
    pub start: Va,

    /// The size of the area in bytes.
    pub size: u64,
}

impl VmAreaSpan {
    /// The first address past the end of the area.
    pub fn end(&self) -> Va {
        self.start + self.size
    }
}

/// Information about a module loaded in a process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// The base address of the module.
    pub base_address: Va,

    /// The size of the module in bytes.
    pub size: u64,

    /// The short name of the module.
    pub name: String,
}

/// Supplies process context and memory-map lookups for the guest.
///
/// Implementations read guest kernel structures (or a cached view of
/// them); all methods must be pure with respect to the paused VM:
/// repeated calls with the same arguments return equal results until the
/// VM resumes.
pub trait ProcessOracle {
    /// Returns the process the VCPU is currently executing in, if known.
    fn current_process(&self) -> Result<Option<Process>, Error>;

    /// Enumerates the processes of the guest.
    fn processes(&self) -> Result<Vec<Process>, Error>;

    /// Enumerates the modules loaded in `process`.
    fn modules(&self, process: &Process) -> Result<Vec<ModuleInfo>, Error>;

    /// Point lookup in the process's memory map.
    fn vm_area_find(&self, process: &Process, address: Va) -> Result<Option<VmArea>, Error>;

    /// Returns the contiguous extent of `area`.
    fn vm_area_span(&self, process: &Process, area: &VmArea) -> Result<Option<VmAreaSpan>, Error>;
}

/// The paged-memory accessor seam consumed by the [`Session`] facade.
///
/// Every operation moves exactly one page and takes the `(process, dtb)`
/// context the translation runs under. `process` may be absent when the
/// caller only holds a raw DTB; fault injection is then refused and
/// unresolved translations surface as [`Error::PageFault`].
///
/// [`Session`]: crate::Session
pub trait GuestOs<T>
where
    T: Transport,
{
    /// Reads the page containing `va` into `dst`.
    fn read_page(
        &self,
        transport: &T,
        dst: &mut PageBuffer,
        va: Va,
        process: Option<&Process>,
        dtb: Dtb,
    ) -> Result<(), Error>;

    /// Writes `src` over the page containing `va`.
    fn write_page(
        &self,
        transport: &T,
        va: Va,
        src: &PageBuffer,
        process: Option<&Process>,
        dtb: Dtb,
    ) -> Result<(), Error>;

    /// Translates `va` to a physical address, coercing the guest to fault
    /// the page in when necessary and allowed.
    fn virtual_to_physical(
        &self,
        transport: &T,
        va: Va,
        process: Option<&Process>,
        dtb: Dtb,
    ) -> Result<Pa, Error>;

    /// Returns the process the VCPU is currently executing in, if known.
    fn current_process(&self) -> Result<Option<Process>, Error>;

    /// Enumerates the processes of the guest.
    fn processes(&self) -> Result<Vec<Process>, Error>;

    /// Enumerates the modules loaded in `process`.
    fn modules(&self, process: &Process) -> Result<Vec<ModuleInfo>, Error>;
}

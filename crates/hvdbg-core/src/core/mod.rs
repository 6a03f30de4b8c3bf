pub(crate) mod macros;

use self::macros::impl_addr;

impl_addr!(Va, "guest virtual address");
impl_addr!(Pa, "guest physical address");
impl_addr!(Gfn, "guest frame number");
impl_addr!(Dtb, "directory table base (physical address of a PML4)");

impl Va {
    /// Checks if the virtual address is NULL.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl Dtb {
    /// Builds a DTB from a raw `CR3` value.
    ///
    /// Bits [51:12] address the PML4 page; the low 12 bits (PCID et al.)
    /// are ignored on walk entry, so the raw value is carried as-is.
    pub const fn from_cr3(cr3: u64) -> Self {
        Self(cr3)
    }
}

/// The size of a guest base page in bytes.
pub const PAGE_SIZE: usize = 0x1000;

/// log2 of [`PAGE_SIZE`].
pub const PAGE_SHIFT: u32 = 12;

/// A page-aligned, page-sized buffer.
///
/// The paged-memory accessor moves guest memory in whole pages; callers
/// that need sub-page or cross-page access split their requests at 4 KiB
/// boundaries (the [`Session`] read/write wrappers do exactly that).
///
/// [`Session`]: crate::Session
pub type PageBuffer = [u8; PAGE_SIZE];

/// A virtual CPU identifier.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    ::serde::Serialize,
    ::serde::Deserialize,
)]
pub struct VcpuId(pub u16);

impl From<u16> for VcpuId {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl From<VcpuId> for u16 {
    fn from(value: VcpuId) -> Self {
        value.0
    }
}

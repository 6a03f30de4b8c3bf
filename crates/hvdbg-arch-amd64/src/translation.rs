use hvdbg_core::{Dtb, Error, Pa, Transport, Va};

use super::{Amd64, PageTableEntry, PageTableLevel};

/// The outcome of a guest page-table walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Translation {
    /// The address maps to a physical page.
    Resolved(Pa),

    /// The address maps to the demand-zero page.
    ///
    /// Reserved for forward compatibility; the current walker never
    /// produces it.
    ResolvedZero,

    /// A non-present entry terminated the walk. The guest has to fault
    /// the page in before the address can be accessed.
    FaultRequired,
}

impl Translation {
    /// Returns the physical address if the translation resolved to a
    /// mapped page.
    pub fn pa(self) -> Option<Pa> {
        match self {
            Self::Resolved(pa) => Some(pa),
            _ => None,
        }
    }

    /// Checks if the walk ended on a non-present entry.
    pub fn fault_required(self) -> bool {
        matches!(self, Self::FaultRequired)
    }
}

const fn mask(bits: u32) -> u64 {
    !(!0u64 << bits)
}

/// Reads one 8-byte paging-structure entry at `pa`.
fn read_entry<T>(transport: &T, pa: Pa) -> Result<PageTableEntry, Error>
where
    T: Transport,
{
    let mut entry = [0u8; 8];
    transport.read_physical(pa, &mut entry)?;
    Ok(PageTableEntry(u64::from_le_bytes(entry)))
}

impl Amd64 {
    /// Walks the four-level paging hierarchy for `va` under `dtb`.
    ///
    /// Each level costs exactly one 8-byte physical read through the
    /// transport. Entries are not cached: the guest may have repopulated
    /// them since the previous walk (e.g. after a fault injection). The
    /// walk reads guest memory but never mutates it.
    ///
    /// A transport failure surfaces as `Err`; a non-present entry at any
    /// level ends the walk with [`Translation::FaultRequired`] and no
    /// further reads. 1 GiB (PDPT) and 2 MiB (PD) large-page entries
    /// shortcut the remaining levels.
    pub fn translate<T>(transport: &T, va: Va, dtb: Dtb) -> Result<Translation, Error>
    where
        T: Transport,
    {
        // The incoming address is taken as a little-endian 64-bit value;
        // a no-op on little-endian hosts.
        let va = Va(u64::from_le(va.0));

        let pml4e_base = Pa(dtb.0 & (mask(40) << 12));
        let pml4e_addr = pml4e_base + Self::va_index_for(va, PageTableLevel::Pml4) * 8;
        let pml4e = read_entry(transport, pml4e_addr)?;
        if !pml4e.present() {
            return Ok(Translation::FaultRequired);
        }

        let pdpte_addr =
            Self::pa_from_gfn(pml4e.pfn()) + Self::va_index_for(va, PageTableLevel::Pdpt) * 8;
        let pdpte = read_entry(transport, pdpte_addr)?;
        if !pdpte.present() {
            return Ok(Translation::FaultRequired);
        }

        // 1 GiB page.
        if pdpte.large() {
            let base = pdpte.0 & (mask(22) << 30);
            return Ok(Translation::Resolved(Pa(
                base | Self::va_offset_for(va, PageTableLevel::Pdpt)
            )));
        }

        let pde_addr =
            Self::pa_from_gfn(pdpte.pfn()) + Self::va_index_for(va, PageTableLevel::Pd) * 8;
        let pde = read_entry(transport, pde_addr)?;
        if !pde.present() {
            return Ok(Translation::FaultRequired);
        }

        // 2 MiB page.
        if pde.large() {
            let base = pde.0 & (mask(31) << 21);
            return Ok(Translation::Resolved(Pa(
                base | Self::va_offset_for(va, PageTableLevel::Pd)
            )));
        }

        let pte_addr =
            Self::pa_from_gfn(pde.pfn()) + Self::va_index_for(va, PageTableLevel::Pt) * 8;
        let pte = read_entry(transport, pte_addr)?;
        if !pte.present() {
            return Ok(Translation::FaultRequired);
        }

        Ok(Translation::Resolved(
            Self::pa_from_gfn(pte.pfn()) + Self::va_offset_for(va, PageTableLevel::Pt),
        ))
    }
}

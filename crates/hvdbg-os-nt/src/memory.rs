use std::sync::atomic::Ordering;

use hvdbg_arch_amd64::{page_fault, pf_error, Amd64, Cr3, Cr8, Irql, Selector, Translation};
use hvdbg_core::{
    Dtb, Error, GuestOs, ModuleInfo, PageBuffer, Pa, Process, ProcessOracle, Register, Transport,
    Va, VcpuId, PAGE_SIZE,
};

use crate::{is_kernel_address, is_user_mode, NtOs};

// Single-VCPU design; multi-VCPU introspection is a future extension.
const VCPU: VcpuId = VcpuId(0);

impl<O> NtOs<O>
where
    O: ProcessOracle,
{
    /// Decides whether a synthetic #PF for `va` is legal in the current
    /// guest context and, if so, performs the injection and waits for the
    /// guest's handler to return.
    ///
    /// The predicates run in order and the first failure refuses the
    /// injection (`Ok(false)`); refusals are expected and common, so they
    /// are not logged. The fault counter is bumped exactly once per
    /// accepted attempt, before the injection primitive runs.
    fn try_inject_page_fault<T>(
        &self,
        transport: &T,
        process: Option<&Process>,
        _dtb: Dtb,
        va: Va,
    ) -> Result<bool, Error>
    where
        T: Transport,
    {
        // Never ask the kernel to demand-page its own mappings.
        if is_kernel_address(va) {
            return Ok(false);
        }

        // Without a process there is no memory map to validate against.
        let process = match process {
            Some(process) => process,
            None => return Ok(false),
        };

        // Page faults at or above dispatch level bugcheck the guest.
        let irql = Irql::from_cr8(Cr8(transport.register(VCPU, Register::Cr8)?));
        if irql >= Irql::Dispatch {
            return Ok(false);
        }

        // The guest must currently be executing in the address space
        // under introspection.
        let cr3 = Cr3::from(transport.register(VCPU, Register::Cr3)?);
        let current = Dtb::from(cr3);
        if current != process.kdtb && current != process.udtb {
            return Ok(false);
        }

        // The whole page must lie inside a mapped VMA.
        let area = match self.oracle().vm_area_find(process, va)? {
            Some(area) => area,
            None => return Ok(false),
        };

        let span = match self.oracle().vm_area_span(process, &area)? {
            Some(span) => span,
            None => return Ok(false),
        };

        if va + PAGE_SIZE as u64 > span.end() {
            return Ok(false);
        }

        // TODO check the VMA access rights before faulting the page in

        self.num_page_faults.fetch_add(1, Ordering::Relaxed);

        let cs = Selector::from(transport.register(VCPU, Register::Cs)?);
        let error_code = if is_user_mode(cs) { pf_error::USER } else { 0 };

        if let Err(err) = transport.inject_interrupt(VCPU, page_fault(va, error_code)) {
            tracing::error!(%va, ?err, "unable to inject page fault");
            return Err(Error::Injection);
        }

        // Let the guest's #PF handler execute and return to the same
        // instruction.
        transport.run_to_current(VCPU, "inject_pf")?;
        Ok(true)
    }

    /// Reads the page containing `va` into `dst`.
    ///
    /// A resolved translation is served straight from physical memory; a
    /// paged-out page is faulted in through the guest (when the policy
    /// allows) and then read through the transport's own MMU walk, which
    /// observes the freshly populated tables.
    pub fn read_page<T>(
        &self,
        transport: &T,
        dst: &mut PageBuffer,
        va: Va,
        process: Option<&Process>,
        dtb: Dtb,
    ) -> Result<(), Error>
    where
        T: Transport,
    {
        match Amd64::translate(transport, va, dtb)? {
            Translation::Resolved(pa) => transport.read_physical(pa, dst),
            Translation::ResolvedZero => {
                dst.fill(0);
                Ok(())
            }
            Translation::FaultRequired => {
                if !self.try_inject_page_fault(transport, process, dtb, va)? {
                    return Err(Error::page_fault((va, dtb)));
                }

                transport.read_virtual(dtb, va, dst)
            }
        }
    }

    /// Writes `src` over the page containing `va`.
    ///
    /// No zero-page shortcut: a demand-zero mapping has to be
    /// materialized by the guest before it can take a write.
    pub fn write_page<T>(
        &self,
        transport: &T,
        va: Va,
        src: &PageBuffer,
        process: Option<&Process>,
        dtb: Dtb,
    ) -> Result<(), Error>
    where
        T: Transport,
    {
        match Amd64::translate(transport, va, dtb)? {
            Translation::Resolved(pa) => transport.write_physical(pa, src),
            Translation::ResolvedZero | Translation::FaultRequired => {
                if !self.try_inject_page_fault(transport, process, dtb, va)? {
                    return Err(Error::page_fault((va, dtb)));
                }

                transport.write_virtual(dtb, va, src)
            }
        }
    }

    /// Translates `va` to a physical address.
    ///
    /// When the first walk ends on a non-present entry, the page is
    /// faulted in through the guest and the tables are walked again;
    /// there is no physical address to report without a successful walk,
    /// so this never falls back to the transport's virtualised path.
    pub fn virtual_to_physical<T>(
        &self,
        transport: &T,
        va: Va,
        process: Option<&Process>,
        dtb: Dtb,
    ) -> Result<Pa, Error>
    where
        T: Transport,
    {
        if let Some(pa) = Amd64::translate(transport, va, dtb)?.pa() {
            return Ok(pa);
        }

        if !self.try_inject_page_fault(transport, process, dtb, va)? {
            return Err(Error::page_fault((va, dtb)));
        }

        match Amd64::translate(transport, va, dtb)?.pa() {
            Some(pa) => Ok(pa),
            None => Err(Error::page_fault((va, dtb))),
        }
    }
}

impl<T, O> GuestOs<T> for NtOs<O>
where
    T: Transport,
    O: ProcessOracle,
{
    fn read_page(
        &self,
        transport: &T,
        dst: &mut PageBuffer,
        va: Va,
        process: Option<&Process>,
        dtb: Dtb,
    ) -> Result<(), Error> {
        self.read_page(transport, dst, va, process, dtb)
    }

    fn write_page(
        &self,
        transport: &T,
        va: Va,
        src: &PageBuffer,
        process: Option<&Process>,
        dtb: Dtb,
    ) -> Result<(), Error> {
        self.write_page(transport, va, src, process, dtb)
    }

    fn virtual_to_physical(
        &self,
        transport: &T,
        va: Va,
        process: Option<&Process>,
        dtb: Dtb,
    ) -> Result<Pa, Error> {
        self.virtual_to_physical(transport, va, process, dtb)
    }

    fn current_process(&self) -> Result<Option<Process>, Error> {
        self.oracle().current_process()
    }

    fn processes(&self) -> Result<Vec<Process>, Error> {
        self.oracle().processes()
    }

    fn modules(&self, process: &Process) -> Result<Vec<ModuleInfo>, Error> {
        self.oracle().modules(process)
    }
}

use std::cell::RefCell;

use zerocopy::{FromBytes, IntoBytes};

use crate::{
    Dtb, Error, GuestOs, ModuleInfo, PageBuffer, Pa, Process, Register, Transport, Va, VcpuId,
    PAGE_SIZE,
};

// Single-VCPU design; multi-VCPU introspection is a future extension.
const VCPU: VcpuId = VcpuId(0);

/// The process/DTB context a session is bound to.
#[derive(Debug, Clone, Copy)]
struct Binding {
    process: Process,
    dtb: Dtb,
}

/// A debugger session over a paused guest.
///
/// The session owns the hypervisor transport for its whole lifetime and
/// borrows it into every call; it combines the transport with an
/// OS-specific paged-memory accessor to provide virtual reads and writes
/// of guest memory.
///
/// Reads and writes run in the context of the currently bound process
/// (see [`switch_process`]). An unbound session falls back to the address
/// space the VCPU is executing in, with no process context.
///
/// [`switch_process`]: Self::switch_process
pub struct Session<T, Os>
where
    T: Transport,
    Os: GuestOs<T>,
{
    transport: T,
    os: Os,
    binding: RefCell<Option<Binding>>,
}

impl<T, Os> Session<T, Os>
where
    T: Transport,
    Os: GuestOs<T>,
{
    /// Creates a new session over `transport`.
    pub fn new(transport: T, os: Os) -> Self {
        Self {
            transport,
            os,
            binding: RefCell::new(None),
        }
    }

    /// Returns the transport used by this session.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the underlying OS-specific implementation.
    pub fn underlying_os(&self) -> &Os {
        &self.os
    }

    /// Returns the process this session is currently bound to.
    pub fn bound_process(&self) -> Option<Process> {
        self.binding.borrow().map(|binding| binding.process)
    }

    /// Binds the session to `process` and returns a guard that restores
    /// the previous binding when dropped.
    ///
    /// While the guard is alive, reads and writes translate under the
    /// process's kernel directory table base and fault injection runs
    /// with the process's context. The restore happens on every exit
    /// path, including unwinding.
    pub fn switch_process(&self, process: Process) -> ProcessContext<'_, T, Os> {
        tracing::trace!(object = %process.object, "switching process");

        let saved = self.binding.replace(Some(Binding {
            process,
            dtb: process.kdtb,
        }));

        ProcessContext {
            session: self,
            saved,
        }
    }

    /// Pauses the virtual machine.
    pub fn pause(&self) -> Result<(), Error> {
        self.transport.pause()
    }

    /// Resumes the virtual machine.
    pub fn resume(&self) -> Result<(), Error> {
        self.transport.resume()
    }

    /// Returns the process the VCPU is currently executing in, if known.
    pub fn current_process(&self) -> Result<Option<Process>, Error> {
        self.os.current_process()
    }

    /// Enumerates the processes of the guest.
    pub fn processes(&self) -> Result<Vec<Process>, Error> {
        self.os.processes()
    }

    /// Enumerates the modules loaded in `process`.
    pub fn modules(&self, process: &Process) -> Result<Vec<ModuleInfo>, Error> {
        self.os.modules(process)
    }

    /// Translates a virtual address to a physical address under `dtb`,
    /// in the context of the bound process (if any).
    pub fn virtual_to_physical(&self, va: Va, dtb: Dtb) -> Result<Pa, Error> {
        let process = self.bound_process();
        self.os
            .virtual_to_physical(&self.transport, va, process.as_ref(), dtb)
    }

    /// Reads guest memory at the virtual address `va`.
    ///
    /// The request is split at page boundaries and served one page at a
    /// time through the accessor; a page is delivered whole or not at
    /// all, so a failed read leaves `buffer` partially overwritten but
    /// reports the failure.
    pub fn read(&self, va: Va, buffer: &mut [u8]) -> Result<(), Error> {
        let (process, dtb) = self.context()?;

        let mut position = 0usize;
        while position < buffer.len() {
            let address = va + position as u64;
            let base = address & !(PAGE_SIZE as u64 - 1);
            let offset = (address - base).0 as usize;

            let mut page = [0u8; PAGE_SIZE];
            self.os
                .read_page(&self.transport, &mut page, base, process.as_ref(), dtb)?;

            let size = std::cmp::min(buffer.len() - position, PAGE_SIZE - offset);
            buffer[position..position + size].copy_from_slice(&page[offset..offset + size]);

            position += size;
        }

        Ok(())
    }

    /// Writes guest memory at the virtual address `va`.
    ///
    /// Whole covered pages are written directly; partially covered pages
    /// are read, patched and written back.
    pub fn write(&self, va: Va, buffer: &[u8]) -> Result<(), Error> {
        let (process, dtb) = self.context()?;

        let mut position = 0usize;
        while position < buffer.len() {
            let address = va + position as u64;
            let base = address & !(PAGE_SIZE as u64 - 1);
            let offset = (address - base).0 as usize;
            let size = std::cmp::min(buffer.len() - position, PAGE_SIZE - offset);

            let mut page: PageBuffer = [0u8; PAGE_SIZE];
            if size != PAGE_SIZE {
                self.os
                    .read_page(&self.transport, &mut page, base, process.as_ref(), dtb)?;
            }
            page[offset..offset + size].copy_from_slice(&buffer[position..position + size]);

            self.os
                .write_page(&self.transport, base, &page, process.as_ref(), dtb)?;

            position += size;
        }

        Ok(())
    }

    /// Reads a 32-bit unsigned integer from guest memory.
    pub fn read_u32(&self, va: Va) -> Result<u32, Error> {
        let mut buffer = [0u8; 4];
        self.read(va, &mut buffer)?;
        Ok(u32::from_le_bytes(buffer))
    }

    /// Reads a 64-bit unsigned integer from guest memory.
    pub fn read_u64(&self, va: Va) -> Result<u64, Error> {
        let mut buffer = [0u8; 8];
        self.read(va, &mut buffer)?;
        Ok(u64::from_le_bytes(buffer))
    }

    /// Reads a struct from guest memory.
    pub fn read_struct<S>(&self, va: Va) -> Result<S, Error>
    where
        S: FromBytes + IntoBytes,
    {
        let mut result = S::new_zeroed();
        self.read(va, result.as_mut_bytes())?;
        Ok(result)
    }

    /// Resolves the `(process, dtb)` context for an access.
    fn context(&self) -> Result<(Option<Process>, Dtb), Error> {
        if let Some(binding) = *self.binding.borrow() {
            return Ok((Some(binding.process), binding.dtb));
        }

        // No bound process: use whatever address space the VCPU is in.
        let cr3 = self.transport.register(VCPU, Register::Cr3)?;
        Ok((None, Dtb::from_cr3(cr3)))
    }
}

/// A guard that restores the session's previous process binding when
/// dropped.
pub struct ProcessContext<'a, T, Os>
where
    T: Transport,
    Os: GuestOs<T>,
{
    session: &'a Session<T, Os>,
    saved: Option<Binding>,
}

impl<T, Os> Drop for ProcessContext<'_, T, Os>
where
    T: Transport,
    Os: GuestOs<T>,
{
    fn drop(&mut self) {
        *self.session.binding.borrow_mut() = self.saved.take();
    }
}

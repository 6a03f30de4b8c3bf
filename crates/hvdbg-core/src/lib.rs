//! Core types and contracts for hypervisor-based guest introspection.
//!
//! This crate carries the pieces every other crate in the workspace
//! agrees on: the address newtypes, the hypervisor [`Transport`]
//! contract, the guest-OS contracts ([`GuestOs`], [`ProcessOracle`]),
//! the error taxonomy and the [`Session`] facade tying them together.

mod core;
mod error;
pub mod os;
mod session;
mod transport;

pub use self::{
    core::{Dtb, Gfn, PageBuffer, Pa, Va, VcpuId, PAGE_SHIFT, PAGE_SIZE},
    error::{Error, PageFault, PageFaults},
    os::{GuestOs, ModuleInfo, Process, ProcessObject, ProcessOracle, VmArea, VmAreaSpan},
    session::{ProcessContext, Session},
    transport::{Interrupt, Register, Transport},
};

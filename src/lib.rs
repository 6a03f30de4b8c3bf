//! Hypervisor-based debugger for Windows-NT guests.
//!
//! This umbrella crate re-exports the public surface of the workspace:
//! the core types and contracts ([`hvdbg_core`]), the AMD64 architecture
//! definitions ([`hvdbg_arch_amd64`]) and the Windows-NT guest logic
//! ([`hvdbg_os_nt`]).

/// Architecture definitions.
pub mod arch {
    /// AMD64 architecture definitions.
    pub mod amd64 {
        pub use hvdbg_arch_amd64::*;
    }
}

/// Guest operating system support.
pub mod os {
    /// Windows-NT guest support.
    pub mod nt {
        pub use hvdbg_os_nt::*;
    }
}

pub use hvdbg_core::*;

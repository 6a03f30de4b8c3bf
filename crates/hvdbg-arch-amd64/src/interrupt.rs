use hvdbg_core::{Interrupt, Va};

/// Exception vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionVector(pub u8);

#[expect(non_upper_case_globals)]
impl ExceptionVector {
    /// Debug (#DB).
    pub const DebugException: Self = Self(1);

    /// Breakpoint (#BP), raised by INT3.
    pub const Breakpoint: Self = Self(3);

    /// Invalid Opcode (#UD).
    pub const InvalidOpcode: Self = Self(6);

    /// Double Fault (#DF).
    pub const DoubleFault: Self = Self(8);

    /// General Protection Fault (#GP).
    pub const GeneralProtection: Self = Self(13);

    /// Page Fault (#PF).
    pub const PageFault: Self = Self(14);
}

impl From<ExceptionVector> for u8 {
    fn from(value: ExceptionVector) -> Self {
        value.0
    }
}

/// Page-fault error code bits (Intel SDM Vol. 3A, §4.7).
pub mod pf_error {
    /// The fault was caused by a protection violation (set) or a
    /// non-present page (clear).
    pub const PRESENT: u32 = 1 << 0;

    /// The access causing the fault was a write.
    pub const WRITE: u32 = 1 << 1;

    /// The access originated in user mode.
    pub const USER: u32 = 1 << 2;

    /// A reserved bit was set in a paging-structure entry.
    pub const RESERVED: u32 = 1 << 3;

    /// The fault occurred during an instruction fetch.
    pub const INSTRUCTION_FETCH: u32 = 1 << 4;
}

/// Describes a page fault at `cr2` for injection.
pub fn page_fault(cr2: Va, error_code: u32) -> Interrupt {
    Interrupt {
        vector: ExceptionVector::PageFault.into(),
        error_code,
        cr2,
    }
}

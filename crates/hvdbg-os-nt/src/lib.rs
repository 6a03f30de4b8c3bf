//! Windows-NT guest support.
//!
//! [`NtOs`] implements the paged-memory accessor over a Windows-NT
//! guest: it resolves virtual addresses through the guest's own paging
//! structures and, when a legitimately mapped page is paged out, coerces
//! the guest into faulting it in by injecting a synthetic #PF and
//! letting the guest's handler run to completion.

mod memory;

use std::sync::atomic::{AtomicU64, Ordering};

use hvdbg_arch_amd64::Selector;
use hvdbg_core::Va;

/// Windows-NT guest introspection logic.
///
/// Generic over the [`ProcessOracle`] that supplies process context and
/// memory-map lookups. Carries the session-scoped count of injected page
/// faults.
///
/// [`ProcessOracle`]: hvdbg_core::ProcessOracle
pub struct NtOs<O> {
    oracle: O,
    num_page_faults: AtomicU64,
}

impl<O> NtOs<O> {
    /// Creates a new instance over the given oracle.
    pub fn new(oracle: O) -> Self {
        Self {
            oracle,
            num_page_faults: AtomicU64::new(0),
        }
    }

    /// Returns the oracle.
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// The number of synthetic page faults injected in this session.
    ///
    /// Monotonic; counts injection attempts that passed the policy,
    /// whether or not the subsequent retry succeeded.
    pub fn num_page_faults(&self) -> u64 {
        self.num_page_faults.load(Ordering::Relaxed)
    }
}

/// Checks whether `va` falls into the kernel half of the NT address
/// space.
///
/// Kernel-half mappings are typically non-paged pool or system PTEs;
/// asking the guest to demand-page them from an asynchronous observer is
/// not safe.
pub fn is_kernel_address(va: Va) -> bool {
    va.0 & 0xfff0_0000_0000_0000 != 0
}

/// Checks whether the code-segment selector describes user-mode
/// execution.
pub fn is_user_mode(cs: Selector) -> bool {
    cs.request_privilege_level() == 3
}

use crate::{Dtb, Va};

/// An error that can occur while introspecting the guest.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The hypervisor transport failed a physical access, a register read
    /// or a VCPU control operation.
    #[error(transparent)]
    Transport(Box<dyn std::error::Error + Send + Sync>),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A translation is unavailable: the page is not present and no
    /// synthetic fault could be (or was allowed to be) injected.
    #[error("Page not present ({:?}, len: {})", .0[0], .0.len())]
    PageFault(PageFaults),

    /// The injection policy accepted but the injection primitive failed.
    #[error("Unable to inject page fault")]
    Injection,

    /// Other error.
    #[error("{0}")]
    Other(&'static str),
}

/// A page not present in guest physical memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageFault {
    /// The virtual address whose translation failed.
    pub address: Va,

    /// The directory table base the walk ran under.
    pub dtb: Dtb,
}

/// A collection of page faults.
pub type PageFaults = smallvec::SmallVec<[PageFault; 1]>;

impl From<(Va, Dtb)> for PageFault {
    fn from((address, dtb): (Va, Dtb)) -> Self {
        Self { address, dtb }
    }
}

impl Error {
    /// Creates a new transport error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Box::new(err))
    }

    /// Creates a new page fault error.
    pub fn page_fault(pf: impl Into<PageFault>) -> Self {
        Self::PageFault(smallvec::smallvec![pf.into()])
    }

    /// Creates a new page fault error with multiple page faults.
    pub fn page_faults(pfs: impl IntoIterator<Item = PageFault>) -> Self {
        Self::PageFault(pfs.into_iter().collect())
    }
}

//! Memory region enumeration.
//!
//! Signature scans walk the committed regions of the target's address space.
//! Guard pages, `PAGE_NOACCESS` pages and reserved/free ranges are never
//! reported.

use serde::{Deserialize, Serialize};

/// Backing class of a memory region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionKind {
    /// Mapped from an executable image (exe/dll sections).
    Image,
    /// Mapped view of a file or section.
    Mapped,
    /// Private allocation (heaps, GC segments, JIT code).
    Private,
}

/// A committed, readable region of the target address space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRegion {
    pub base: u64,
    pub size: u64,
    pub kind: RegionKind,
    pub executable: bool,
    pub writable: bool,
}

impl MemoryRegion {
    pub fn end(&self) -> u64 {
        self.base.saturating_add(self.size)
    }

    pub fn contains(&self, address: u64) -> bool {
        address >= self.base && address < self.end()
    }
}

/// Which regions a scan should visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegionFilter {
    #[default]
    All,
    Image,
    Private,
    /// Executable pages of any kind (JIT output lives in private executable memory).
    Executable,
}

impl RegionFilter {
    pub fn accepts(&self, region: &MemoryRegion) -> bool {
        match self {
            Self::All => true,
            Self::Image => region.kind == RegionKind::Image,
            Self::Private => region.kind == RegionKind::Private,
            Self::Executable => region.executable,
        }
    }
}

/// Enumerate committed, accessible regions of a process.
#[cfg(target_os = "windows")]
pub(crate) fn enumerate_regions(
    handle: windows::Win32::Foundation::HANDLE,
    max_address: u64,
) -> Vec<MemoryRegion> {
    use windows::Win32::System::Memory::{
        MEM_COMMIT, MEM_IMAGE, MEM_MAPPED, MEMORY_BASIC_INFORMATION, PAGE_EXECUTE,
        PAGE_EXECUTE_READ, PAGE_EXECUTE_READWRITE, PAGE_EXECUTE_WRITECOPY, PAGE_GUARD,
        PAGE_NOACCESS, PAGE_READWRITE, PAGE_WRITECOPY, VirtualQueryEx,
    };

    let mut regions = Vec::new();
    let mut address: u64 = 0;
    let info_size = std::mem::size_of::<MEMORY_BASIC_INFORMATION>();

    while address < max_address {
        let mut info = MEMORY_BASIC_INFORMATION::default();
        // SAFETY: VirtualQueryEx is called with a handle opened with query rights and
        // a properly sized MEMORY_BASIC_INFORMATION buffer. A zero return ends the walk.
        let written = unsafe {
            VirtualQueryEx(
                handle,
                Some(address as *const std::ffi::c_void),
                &mut info,
                info_size,
            )
        };
        if written == 0 {
            break;
        }

        let base = info.BaseAddress as u64;
        let size = info.RegionSize as u64;
        if size == 0 {
            break;
        }

        let protect = info.Protect.0;
        let accessible = info.State == MEM_COMMIT
            && protect & PAGE_GUARD.0 == 0
            && protect & PAGE_NOACCESS.0 == 0
            && protect != 0;

        if accessible {
            let kind = if info.Type == MEM_IMAGE {
                RegionKind::Image
            } else if info.Type == MEM_MAPPED {
                RegionKind::Mapped
            } else {
                RegionKind::Private
            };
            let executable = protect
                & (PAGE_EXECUTE.0
                    | PAGE_EXECUTE_READ.0
                    | PAGE_EXECUTE_READWRITE.0
                    | PAGE_EXECUTE_WRITECOPY.0)
                != 0;
            let writable = protect
                & (PAGE_READWRITE.0 | PAGE_WRITECOPY.0 | PAGE_EXECUTE_READWRITE.0)
                != 0;
            regions.push(MemoryRegion {
                base,
                size,
                kind,
                executable,
                writable,
            });
        }

        address = match base.checked_add(size) {
            Some(next) => next,
            None => break,
        };
    }

    regions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(kind: RegionKind, executable: bool) -> MemoryRegion {
        MemoryRegion {
            base: 0x10000,
            size: 0x1000,
            kind,
            executable,
            writable: false,
        }
    }

    #[test]
    fn test_contains() {
        let r = region(RegionKind::Private, false);
        assert!(r.contains(0x10000));
        assert!(r.contains(0x10FFF));
        assert!(!r.contains(0x11000));
        assert!(!r.contains(0xFFFF));
    }

    #[test]
    fn test_filters() {
        let image = region(RegionKind::Image, true);
        let private = region(RegionKind::Private, false);
        let jit = region(RegionKind::Private, true);

        assert!(RegionFilter::All.accepts(&image));
        assert!(RegionFilter::Image.accepts(&image));
        assert!(!RegionFilter::Image.accepts(&private));
        assert!(RegionFilter::Private.accepts(&private));
        assert!(RegionFilter::Executable.accepts(&jit));
        assert!(!RegionFilter::Executable.accepts(&private));
    }
}

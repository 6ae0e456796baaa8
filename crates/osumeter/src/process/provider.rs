//! Seams between client readers and the operating system.
//!
//! Readers only see [`ProcessProvider`] and [`ProcessInfo`], so the same
//! reader code runs against a live client or a scripted mock.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::error::Result;
use crate::process::ReadMemory;

/// Pointer width of the target process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, IntoStaticStr)]
pub enum Architecture {
    #[strum(serialize = "x86")]
    X86,
    #[strum(serialize = "x64")]
    X64,
}

impl Architecture {
    /// Size of a pointer in the target address space.
    pub fn pointer_size(&self) -> usize {
        match self {
            Self::X86 => 4,
            Self::X64 => 8,
        }
    }

    /// Highest user-mode address worth enumerating.
    pub fn max_user_address(&self) -> u64 {
        match self {
            Self::X86 => 0xFFFF_FFFF,
            Self::X64 => 0x7FFF_FFFF_FFFF,
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name: &'static str = self.into();
        f.write_str(name)
    }
}

/// Identity and liveness of an opened client.
pub trait ProcessInfo {
    fn pid(&self) -> u32;

    /// Load address of the main executable image.
    fn base_address(&self) -> u64;

    fn module_size(&self) -> u32;

    /// False once the client has exited; readers drop the binding then.
    fn is_alive(&self) -> bool;

    fn architecture(&self) -> Architecture;

    /// Used to locate the install folder (songs, replays) of a stable client.
    fn executable_path(&self) -> Option<PathBuf>;
}

/// Opens clients by image name.
pub trait ProcessProvider {
    type Process: ProcessInfo + ReadMemory;

    /// Find and open the first process whose image name matches one of `names`
    /// and whose pointer width is `arch`.
    fn find_process(&self, names: &[&str], arch: Architecture) -> Result<Self::Process>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_is_32_bit() {
        assert_eq!(Architecture::X86.pointer_size(), 4);
        assert!(Architecture::X86.max_user_address() <= u64::from(u32::MAX));
        assert_eq!(Architecture::X86.to_string(), "x86");
    }

    #[test]
    fn test_lazer_is_64_bit() {
        assert_eq!(Architecture::X64.pointer_size(), 8);
        assert_eq!(Architecture::X64.to_string(), "x64");
    }
}

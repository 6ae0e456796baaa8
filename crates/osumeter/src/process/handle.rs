//! Live osu! processes opened through Win32.
//!
//! The client can run as `osu!.exe` (stable, WOW64) or `osu!.exe`/`osu.exe`
//! (lazer, native x64), so discovery matches on several image names and
//! keeps only the candidate with the requested pointer width.

#![cfg_attr(not(target_os = "windows"), allow(dead_code, unused_variables))]

use std::path::PathBuf;

use tracing::debug;

use crate::error::{Error, Result};
use crate::process::provider::{Architecture, ProcessInfo, ProcessProvider};
use crate::process::{MemoryRegion, ReadMemory};

/// A client process opened with query and `VM_READ` rights.
pub struct OsProcess {
    #[cfg(target_os = "windows")]
    handle: windows::Win32::Foundation::HANDLE,
    pid: u32,
    image_base: u64,
    image_size: u32,
    architecture: Architecture,
    executable_path: Option<PathBuf>,
}

impl OsProcess {
    /// First process named one of `names` whose pointer width is `arch`.
    pub fn open_matching(names: &[&str], arch: Architecture) -> Result<Self> {
        let mut open_error = None;
        for pid in sys::pids_named(names)? {
            match Self::open(pid) {
                Ok(process) if process.architecture == arch => return Ok(process),
                Ok(process) => debug!(pid, found = %process.architecture, wanted = %arch, "Wrong pointer width"),
                Err(e) => {
                    debug!(pid, "Open failed: {}", e);
                    open_error = Some(e);
                }
            }
        }
        Err(open_error
            .unwrap_or_else(|| Error::ProcessNotFound(format!("No {arch} client among {names:?}"))))
    }

    #[cfg(target_os = "windows")]
    pub fn open(pid: u32) -> Result<Self> {
        let handle = sys::open(pid)?;
        let process = sys::main_module(handle).map(|(module, image_base, image_size)| Self {
            handle,
            pid,
            image_base,
            image_size,
            architecture: sys::pointer_width(handle),
            executable_path: sys::module_path(handle, module),
        });
        if process.is_err() {
            sys::close(handle);
        }
        process
    }

    #[cfg(not(target_os = "windows"))]
    pub fn open(_pid: u32) -> Result<Self> {
        Err(Error::ProcessNotFound(sys::UNSUPPORTED.to_string()))
    }
}

impl ProcessInfo for OsProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn base_address(&self) -> u64 {
        self.image_base
    }

    fn module_size(&self) -> u32 {
        self.image_size
    }

    #[cfg(target_os = "windows")]
    fn is_alive(&self) -> bool {
        sys::still_active(self.handle)
    }

    #[cfg(not(target_os = "windows"))]
    fn is_alive(&self) -> bool {
        false
    }

    fn architecture(&self) -> Architecture {
        self.architecture
    }

    fn executable_path(&self) -> Option<PathBuf> {
        self.executable_path.clone()
    }
}

impl ReadMemory for OsProcess {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        if address == 0 {
            return Err(Error::memory_read(address, "null address"));
        }
        #[cfg(target_os = "windows")]
        return sys::read(self.handle, address, size);
        #[cfg(not(target_os = "windows"))]
        Err(Error::memory_read(address, sys::UNSUPPORTED))
    }

    fn base_address(&self) -> u64 {
        self.image_base
    }

    fn regions(&self) -> Vec<MemoryRegion> {
        #[cfg(target_os = "windows")]
        return crate::process::region::enumerate_regions(
            self.handle,
            self.architecture.max_user_address(),
        );
        #[cfg(not(target_os = "windows"))]
        Vec::new()
    }
}

#[cfg(target_os = "windows")]
impl Drop for OsProcess {
    fn drop(&mut self) {
        if !self.handle.is_invalid() {
            sys::close(self.handle);
        }
    }
}

/// Finds clients among the processes running on this machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessProvider;

impl ProcessProvider for SystemProcessProvider {
    type Process = OsProcess;

    fn find_process(&self, names: &[&str], arch: Architecture) -> Result<Self::Process> {
        OsProcess::open_matching(names, arch)
    }
}

#[cfg(not(target_os = "windows"))]
mod sys {
    use crate::error::{Error, Result};

    pub const UNSUPPORTED: &str = "process memory access requires Windows";

    pub fn pids_named(_names: &[&str]) -> Result<Vec<u32>> {
        Err(Error::ProcessNotFound(UNSUPPORTED.to_string()))
    }
}

#[cfg(target_os = "windows")]
mod sys {
    use std::ffi::OsString;
    use std::mem::size_of;
    use std::os::windows::ffi::OsStringExt;
    use std::path::PathBuf;

    use tracing::{debug, warn};
    use windows::Win32::Foundation::{BOOL, CloseHandle, HANDLE, HMODULE};
    use windows::Win32::System::Diagnostics::Debug::ReadProcessMemory;
    use windows::Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, PROCESSENTRY32W, Process32FirstW, Process32NextW,
        TH32CS_SNAPPROCESS,
    };
    use windows::Win32::System::ProcessStatus::{
        EnumProcessModulesEx, GetModuleFileNameExW, GetModuleInformation, LIST_MODULES_ALL,
        MODULEINFO,
    };
    use windows::Win32::System::Threading::{
        GetExitCodeProcess, IsWow64Process, OpenProcess, PROCESS_QUERY_INFORMATION,
        PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_VM_READ,
    };

    use crate::error::{Error, Result};
    use crate::process::provider::Architecture;

    const STILL_ACTIVE: u32 = 259;

    fn wide_to_string(units: &[u16]) -> String {
        let len = units.iter().position(|&c| c == 0).unwrap_or(units.len());
        OsString::from_wide(&units[..len]).to_string_lossy().into_owned()
    }

    pub fn pids_named(names: &[&str]) -> Result<Vec<u32>> {
        // SAFETY: the snapshot handle is closed before returning.
        let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) }
            .map_err(|e| Error::ProcessNotFound(e.to_string()))?;

        let mut entry = PROCESSENTRY32W {
            dwSize: size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };
        let mut pids = Vec::new();

        // SAFETY: `entry` is initialized with its size and `snapshot` is live.
        let mut more = unsafe { Process32FirstW(snapshot, &mut entry) }.is_ok();
        while more {
            let image = wide_to_string(&entry.szExeFile);
            if names.iter().any(|n| image.eq_ignore_ascii_case(n)) {
                pids.push(entry.th32ProcessID);
            }
            // SAFETY: as above.
            more = unsafe { Process32NextW(snapshot, &mut entry) }.is_ok();
        }
        close(snapshot);

        if pids.is_empty() {
            return Err(Error::ProcessNotFound(format!("No process named {names:?}")));
        }
        Ok(pids)
    }

    /// Full query rights enable region walks; limited rights still read an elevated client.
    pub fn open(pid: u32) -> Result<HANDLE> {
        let rights = [
            PROCESS_QUERY_INFORMATION | PROCESS_VM_READ,
            PROCESS_QUERY_LIMITED_INFORMATION | PROCESS_VM_READ,
        ];
        let mut last = None;
        for access in rights {
            // SAFETY: the returned handle is owned by the caller.
            match unsafe { OpenProcess(access, false, pid) } {
                Ok(handle) => return Ok(handle),
                Err(e) => last = Some(e.to_string()),
            }
        }
        Err(Error::ProcessOpenFailed(last.unwrap_or_default()))
    }

    pub fn close(handle: HANDLE) {
        // SAFETY: callers pass a handle they own and never use it afterwards.
        if let Err(e) = unsafe { CloseHandle(handle) } {
            warn!("CloseHandle failed: {}", e);
        }
    }

    /// Main executable module with its load address and image size.
    pub fn main_module(handle: HANDLE) -> Result<(HMODULE, u64, u32)> {
        let mut modules = [HMODULE::default(); 256];
        let mut needed = 0u32;
        // SAFETY: the buffer size is passed in bytes.
        unsafe {
            EnumProcessModulesEx(
                handle,
                modules.as_mut_ptr(),
                size_of_val(&modules) as u32,
                &mut needed,
                LIST_MODULES_ALL,
            )
        }
        .map_err(|e| Error::ProcessOpenFailed(format!("Module enumeration failed: {e}")))?;
        if needed == 0 {
            return Err(Error::ProcessOpenFailed("Process has no modules".to_string()));
        }

        let module = modules[0];
        let mut info = MODULEINFO::default();
        // SAFETY: `module` came from the enumeration above.
        unsafe { GetModuleInformation(handle, module, &mut info, size_of::<MODULEINFO>() as u32) }
            .map_err(|e| Error::ProcessOpenFailed(format!("Module info failed: {e}")))?;
        Ok((module, info.lpBaseOfDll as u64, info.SizeOfImage))
    }

    pub fn pointer_width(handle: HANDLE) -> Architecture {
        let mut wow64 = BOOL::default();
        // SAFETY: writes one BOOL.
        match unsafe { IsWow64Process(handle, &mut wow64) } {
            Ok(()) if wow64.as_bool() => Architecture::X86,
            Ok(()) => Architecture::X64,
            Err(e) => {
                debug!("IsWow64Process failed, assuming x64: {}", e);
                Architecture::X64
            }
        }
    }

    pub fn module_path(handle: HANDLE, module: HMODULE) -> Option<PathBuf> {
        let mut buffer = [0u16; 1024];
        // SAFETY: writes at most `buffer.len()` units.
        let len = unsafe { GetModuleFileNameExW(handle, module, &mut buffer) } as usize;
        (len > 0).then(|| PathBuf::from(wide_to_string(&buffer[..len])))
    }

    pub fn still_active(handle: HANDLE) -> bool {
        let mut code = 0u32;
        // SAFETY: writes one u32 for a live handle.
        unsafe { GetExitCodeProcess(handle, &mut code) }.is_ok() && code == STILL_ACTIVE
    }

    pub fn read(handle: HANDLE, address: u64, size: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; size];
        let mut copied = 0usize;
        // SAFETY: `buffer` holds `size` bytes; unmapped addresses fail with an error.
        unsafe {
            ReadProcessMemory(
                handle,
                address as *const _,
                buffer.as_mut_ptr().cast(),
                size,
                Some(&mut copied),
            )
        }
        .map_err(|e| Error::memory_read(address, e.to_string()))?;

        if copied != size {
            return Err(Error::memory_read(
                address,
                format!("short read: {copied} of {size} bytes"),
            ));
        }
        Ok(buffer)
    }
}

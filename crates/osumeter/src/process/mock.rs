//! Mock memory reader and process for testing
//!
//! Provides a configurable in-memory address space implementing [`ReadMemory`],
//! plus a mock process/provider pair so client readers can be exercised
//! without a running game.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::process::provider::{Architecture, ProcessInfo, ProcessProvider};
use crate::process::{MemoryRegion, ReadMemory, RegionKind};

/// Mock memory reader for testing
///
/// The whole buffer is exposed as a single committed region starting at `base`.
#[derive(Debug, Clone)]
pub struct MockMemoryReader {
    data: Arc<Vec<u8>>,
    base: u64,
    region_kind: RegionKind,
}

impl MockMemoryReader {
    /// Create a new mock reader with the given data at base address 0x1000
    pub fn new(data: Vec<u8>) -> Self {
        Self::with_base(data, 0x1000)
    }

    /// Create a new mock reader with custom base address
    pub fn with_base(data: Vec<u8>, base: u64) -> Self {
        Self {
            data: Arc::new(data),
            base,
            region_kind: RegionKind::Private,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl ReadMemory for MockMemoryReader {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        if address < self.base {
            return Err(Error::memory_read(
                address,
                format!("Address below base (base=0x{:X})", self.base),
            ));
        }
        let offset = (address - self.base) as usize;
        match offset.checked_add(size) {
            Some(end) if end <= self.data.len() => Ok(self.data[offset..end].to_vec()),
            _ => Err(Error::memory_read(
                address,
                format!(
                    "Out of bounds: offset={}, size={}, len={}",
                    offset,
                    size,
                    self.data.len()
                ),
            )),
        }
    }

    fn base_address(&self) -> u64 {
        self.base
    }

    fn regions(&self) -> Vec<MemoryRegion> {
        if self.data.is_empty() {
            return Vec::new();
        }
        vec![MemoryRegion {
            base: self.base,
            size: self.data.len() as u64,
            kind: self.region_kind,
            executable: true,
            writable: true,
        }]
    }
}

/// Builder for creating test memory buffers
///
/// Offsets passed to the writers are relative to the base address; use
/// [`MockMemoryBuilder::addr`] to turn an offset into an absolute address
/// when laying out pointers.
#[derive(Debug, Clone)]
pub struct MockMemoryBuilder {
    data: Vec<u8>,
    base: u64,
    architecture: Architecture,
    region_kind: RegionKind,
}

impl Default for MockMemoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMemoryBuilder {
    /// Create a new builder with default base address (0x1000) and 64-bit pointers
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            base: 0x1000,
            architecture: Architecture::X64,
            region_kind: RegionKind::Private,
        }
    }

    /// Set the base address for the mock reader
    pub fn base(mut self, base: u64) -> Self {
        self.base = base;
        self
    }

    /// Pointer width used by `write_ptr` and `write_dotnet_string`
    pub fn architecture(mut self, architecture: Architecture) -> Self {
        self.architecture = architecture;
        self
    }

    pub fn region_kind(mut self, kind: RegionKind) -> Self {
        self.region_kind = kind;
        self
    }

    /// Pre-allocate buffer with zeros up to the specified size
    pub fn with_size(mut self, size: usize) -> Self {
        self.ensure_size(size);
        self
    }

    /// Absolute address of an offset into the buffer
    pub fn addr(&self, offset: usize) -> u64 {
        self.base + offset as u64
    }

    pub fn write_u8(self, offset: usize, value: u8) -> Self {
        self.write_bytes(offset, &[value])
    }

    pub fn write_i16(self, offset: usize, value: i16) -> Self {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    pub fn write_u16(self, offset: usize, value: u16) -> Self {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    pub fn write_i32(self, offset: usize, value: i32) -> Self {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    pub fn write_u32(self, offset: usize, value: u32) -> Self {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    pub fn write_i64(self, offset: usize, value: i64) -> Self {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    pub fn write_u64(self, offset: usize, value: u64) -> Self {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    pub fn write_f32(self, offset: usize, value: f32) -> Self {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    pub fn write_f64(self, offset: usize, value: f64) -> Self {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    /// Write a pointer of the configured width
    pub fn write_ptr(self, offset: usize, value: u64) -> Self {
        match self.architecture {
            Architecture::X86 => self.write_u32(offset, value as u32),
            Architecture::X64 => self.write_u64(offset, value),
        }
    }

    /// Write a pointer to another offset in the buffer
    pub fn write_ref(self, offset: usize, target_offset: usize) -> Self {
        let target = self.addr(target_offset);
        self.write_ptr(offset, target)
    }

    /// Write a .NET string object at `offset`: method table, i32 length, UTF-16 chars
    pub fn write_dotnet_string(self, offset: usize, text: &str) -> Self {
        let ptr_size = self.architecture.pointer_size();
        let units: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
        let len = text.encode_utf16().count() as i32;
        self.write_ptr(offset, 0xDEAD_0000)
            .write_i32(offset + ptr_size, len)
            .write_bytes(offset + ptr_size + 4, &units)
    }

    /// Write raw bytes at the specified offset from base
    pub fn write_bytes(mut self, offset: usize, bytes: &[u8]) -> Self {
        self.ensure_size(offset + bytes.len());
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        self
    }

    /// Build the MockMemoryReader
    pub fn build(self) -> MockMemoryReader {
        MockMemoryReader {
            data: Arc::new(self.data),
            base: self.base,
            region_kind: self.region_kind,
        }
    }

    /// Build a process wrapping this memory
    pub fn build_process(self) -> MockProcess {
        let architecture = self.architecture;
        MockProcess::new(self.build(), architecture)
    }

    fn ensure_size(&mut self, required: usize) {
        if self.data.len() < required {
            self.data.resize(required, 0);
        }
    }
}

/// A fake process backed by a [`MockMemoryReader`].
///
/// Clones share the liveness flag, so a test can keep one clone and call
/// [`MockProcess::kill`] to simulate the game exiting.
#[derive(Debug, Clone)]
pub struct MockProcess {
    memory: MockMemoryReader,
    architecture: Architecture,
    alive: Arc<AtomicBool>,
    executable_path: Option<PathBuf>,
    pid: u32,
}

impl MockProcess {
    pub fn new(memory: MockMemoryReader, architecture: Architecture) -> Self {
        Self {
            memory,
            architecture,
            alive: Arc::new(AtomicBool::new(true)),
            executable_path: None,
            pid: 4242,
        }
    }

    pub fn with_executable_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable_path = Some(path.into());
        self
    }

    pub fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

impl ProcessInfo for MockProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn base_address(&self) -> u64 {
        self.memory.base
    }

    fn module_size(&self) -> u32 {
        self.memory.len() as u32
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn architecture(&self) -> Architecture {
        self.architecture
    }

    fn executable_path(&self) -> Option<PathBuf> {
        self.executable_path.clone()
    }
}

impl ReadMemory for MockProcess {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        if !self.is_alive() {
            return Err(Error::memory_read(address, "process exited"));
        }
        self.memory.read_bytes(address, size)
    }

    fn base_address(&self) -> u64 {
        self.memory.base
    }

    fn regions(&self) -> Vec<MemoryRegion> {
        if !self.is_alive() {
            return Vec::new();
        }
        self.memory.regions()
    }
}

/// Provider handing out pre-built mock processes by architecture.
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    processes: Vec<MockProcess>,
    lookups: Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_process(mut self, process: MockProcess) -> Self {
        self.processes.push(process);
        self
    }

    /// Number of `find_process` calls made so far
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl ProcessProvider for MockProvider {
    type Process = MockProcess;

    fn find_process(&self, names: &[&str], arch: Architecture) -> Result<Self::Process> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.processes
            .iter()
            .find(|p| p.architecture == arch && p.is_alive())
            .cloned()
            .ok_or_else(|| Error::ProcessNotFound(format!("No {} process named {:?}", arch, names)))
    }
}

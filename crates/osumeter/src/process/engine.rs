//! Memory access engine.
//!
//! Wraps a [`ReadMemory`] source with the "zero means unknown" contract used by
//! the client readers: every typed read returns the type's zero value on
//! failure instead of an error, and pointer reads follow the target's pointer
//! width. Signature scans walk committed regions in overlapping chunks.

use tracing::{debug, trace};

use crate::config::memory::{MAX_STRING_CHARS, SCAN_CHUNK_SIZE};
use crate::process::scan_window::ScanWindows;
use crate::process::provider::Architecture;
use crate::process::{ReadMemory, RegionFilter, Signature, decode_utf16le};

pub struct MemoryEngine<R: ReadMemory> {
    source: R,
    architecture: Architecture,
    chunk_size: usize,
}

impl<R: ReadMemory> MemoryEngine<R> {
    pub fn new(source: R, architecture: Architecture) -> Self {
        Self {
            source,
            architecture,
            chunk_size: SCAN_CHUNK_SIZE,
        }
    }

    /// Override the scan chunk size (tests use small chunks to cover boundaries).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn source(&self) -> &R {
        &self.source
    }

    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    pub fn pointer_size(&self) -> u64 {
        self.architecture.pointer_size() as u64
    }

    /// Plausible user-mode pointer for this target.
    pub fn is_valid_pointer(&self, address: u64) -> bool {
        address >= 0x10000 && address <= self.architecture.max_user_address()
    }

    pub fn read_bytes(&self, address: u64, size: usize) -> Option<Vec<u8>> {
        if address == 0 || size == 0 {
            return None;
        }
        match self.source.read_bytes(address, size) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                trace!("{}", e);
                None
            }
        }
    }

    fn read_array<const N: usize>(&self, address: u64) -> [u8; N] {
        let mut out = [0u8; N];
        if let Some(bytes) = self.read_bytes(address, N) {
            out.copy_from_slice(&bytes);
        }
        out
    }

    pub fn read_u8(&self, address: u64) -> u8 {
        self.read_array::<1>(address)[0]
    }

    pub fn read_bool(&self, address: u64) -> bool {
        self.read_u8(address) != 0
    }

    pub fn read_i16(&self, address: u64) -> i16 {
        i16::from_le_bytes(self.read_array(address))
    }

    pub fn read_u16(&self, address: u64) -> u16 {
        u16::from_le_bytes(self.read_array(address))
    }

    pub fn read_i32(&self, address: u64) -> i32 {
        i32::from_le_bytes(self.read_array(address))
    }

    pub fn read_u32(&self, address: u64) -> u32 {
        u32::from_le_bytes(self.read_array(address))
    }

    pub fn read_i64(&self, address: u64) -> i64 {
        i64::from_le_bytes(self.read_array(address))
    }

    pub fn read_u64(&self, address: u64) -> u64 {
        u64::from_le_bytes(self.read_array(address))
    }

    pub fn read_f32(&self, address: u64) -> f32 {
        let value = f32::from_le_bytes(self.read_array(address));
        if value.is_finite() { value } else { 0.0 }
    }

    pub fn read_f64(&self, address: u64) -> f64 {
        let value = f64::from_le_bytes(self.read_array(address));
        if value.is_finite() { value } else { 0.0 }
    }

    /// Like [`read_f64`](Self::read_f64), but `None` when the read fails
    /// instead of a zero that would look like a real value.
    pub fn try_read_f64(&self, address: u64) -> Option<f64> {
        let bytes: [u8; 8] = self.read_bytes(address, 8)?.try_into().ok()?;
        Some(f64::from_le_bytes(bytes)).filter(|v| v.is_finite())
    }

    /// Read a pointer of the target's width.
    pub fn read_ptr(&self, address: u64) -> u64 {
        match self.architecture {
            Architecture::X86 => u64::from(self.read_u32(address)),
            Architecture::X64 => self.read_u64(address),
        }
    }

    /// Walk a pointer chain: `address = *(address + offset)` for each offset.
    ///
    /// Returns 0 as soon as any link is null.
    pub fn follow(&self, base: u64, offsets: &[i64]) -> u64 {
        let mut address = base;
        for &offset in offsets {
            if address == 0 {
                return 0;
            }
            address = self.read_ptr(address.wrapping_add_signed(offset));
        }
        address
    }

    /// Read the string object at `object` (length at one pointer in, UTF-16 after).
    ///
    /// Lengths are capped at `MAX_STRING_CHARS`; negative lengths read as empty.
    pub fn read_string(&self, object: u64) -> String {
        let Some(length_address) = object
            .checked_add(self.pointer_size())
            .filter(|_| object != 0)
        else {
            return String::new();
        };
        let length = self.read_i32(length_address);
        if length <= 0 {
            return String::new();
        }
        let chars = (length as usize).min(MAX_STRING_CHARS);
        let Some(first_char) = length_address.checked_add(4) else {
            return String::new();
        };
        self.read_bytes(first_char, chars * 2)
            .map(|bytes| decode_utf16le(&bytes))
            .unwrap_or_default()
    }

    /// Dereference a string field and read it.
    pub fn read_string_field(&self, address: u64) -> String {
        self.read_string(self.read_ptr(address))
    }

    /// Address of the first match of `signature` in accepted regions.
    pub fn scan_first(&self, signature: &Signature, filter: RegionFilter) -> Option<u64> {
        self.scan(signature, filter, true).into_iter().next()
    }

    /// Addresses of every match of `signature` in accepted regions, ascending.
    pub fn scan_all(&self, signature: &Signature, filter: RegionFilter) -> Vec<u64> {
        self.scan(signature, filter, false)
    }

    fn scan(&self, signature: &Signature, filter: RegionFilter, first_only: bool) -> Vec<u64> {
        let mut results = Vec::new();
        if signature.is_empty() {
            return results;
        }
        let overlap = signature.len() - 1;
        let mut unreadable = 0usize;

        let mut regions = self.source.regions();
        regions.retain(|r| filter.accepts(r));
        regions.sort_by_key(|r| r.base);

        for region in &regions {
            let chunks =
                ScanWindows::new(&self.source, region.base, region.end(), self.chunk_size, overlap);

            for chunk in chunks {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(_) => {
                        unreadable += 1;
                        continue;
                    }
                };

                if first_only {
                    if let Some(pos) = signature.find_first(&chunk.data) {
                        results.push(chunk.address + pos as u64);
                        return results;
                    }
                } else {
                    for pos in signature.find_all(&chunk.data) {
                        let address = chunk.address + pos as u64;
                        // Matches inside the overlap tail show up again in the next chunk
                        if results.last().is_none_or(|&last| address > last) {
                            results.push(address);
                        }
                    }
                }
            }
        }

        if unreadable > 0 {
            debug!(
                "Signature scan skipped {} unreadable chunks ({})",
                unreadable, signature
            );
        }
        results
    }
}

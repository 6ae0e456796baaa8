//! Overlapping read windows for signature scans.
//!
//! A region is walked in `stride`-sized steps. Every window extends `tail`
//! bytes past its stride so a signature straddling two steps is whole in
//! the earlier window.

use super::ReadMemory;
use crate::error::Result;

/// Bytes per scan step when nothing else is configured.
pub const DEFAULT_SCAN_CHUNK: usize = 4 * 1024 * 1024;

/// Bytes copied out of the target for one scan step.
#[derive(Debug)]
pub struct ScanWindow {
    pub address: u64,
    pub data: Vec<u8>,
}

/// Walks `[start, end)` of a [`ReadMemory`] in overlapping windows.
pub struct ScanWindows<'a, R: ReadMemory> {
    source: &'a R,
    cursor: u64,
    end: u64,
    stride: u64,
    tail: u64,
}

impl<'a, R: ReadMemory> ScanWindows<'a, R> {
    /// `tail` is usually the signature length minus one.
    pub fn new(source: &'a R, start: u64, end: u64, stride: usize, tail: usize) -> Self {
        Self {
            source,
            cursor: start,
            end,
            stride: stride.max(1) as u64,
            tail: tail as u64,
        }
    }
}

impl<R: ReadMemory> Iterator for ScanWindows<'_, R> {
    type Item = Result<ScanWindow>;

    fn next(&mut self) -> Option<Self::Item> {
        let address = self.cursor;
        if address >= self.end {
            return None;
        }

        let left = self.end - address;
        self.cursor += self.stride.min(left);
        let len = (self.stride + self.tail).min(left) as usize;

        Some(
            self.source
                .read_bytes(address, len)
                .map(|data| ScanWindow { address, data }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::mock::MockMemoryBuilder;

    fn windows(bytes: &[u8], stride: usize, tail: usize) -> Vec<(u64, Vec<u8>)> {
        let memory = MockMemoryBuilder::new().write_bytes(0, bytes).build();
        let end = 0x1000 + bytes.len() as u64;
        ScanWindows::new(&memory, 0x1000, end, stride, tail)
            .map(|w| w.map(|w| (w.address, w.data)))
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_short_region_is_one_window() {
        let got = windows(&[9, 8, 7], 16, 4);
        assert_eq!(got, vec![(0x1000, vec![9, 8, 7])]);
    }

    #[test]
    fn test_last_window_is_truncated() {
        let got = windows(&[1, 2, 3, 4, 5], 4, 0);
        assert_eq!(got, vec![(0x1000, vec![1, 2, 3, 4]), (0x1004, vec![5])]);
    }

    #[test]
    fn test_tail_repeats_next_window_head() {
        let got = windows(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10], 4, 2);
        assert_eq!(
            got,
            vec![
                (0x1000, vec![1, 2, 3, 4, 5, 6]),
                (0x1004, vec![5, 6, 7, 8, 9, 10]),
                (0x1008, vec![9, 10]),
            ]
        );
    }

    #[test]
    fn test_empty_region_yields_nothing() {
        let memory = MockMemoryBuilder::new().write_bytes(0, &[1]).build();
        assert!(ScanWindows::new(&memory, 0x1000, 0x1000, 4, 0).next().is_none());
    }
}

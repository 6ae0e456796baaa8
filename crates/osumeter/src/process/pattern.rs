//! Byte signatures with wildcards.
//!
//! Signatures are written as space separated hex bytes with `??` (or `?`) for
//! wildcard positions, e.g. `"48 83 F8 04 73 1E"` or `"7D 15 A1 ?? ?? ?? ?? 85 C0"`.
//! Matching anchors on the longest fixed run of bytes with `memchr::memmem`
//! and then verifies the full pattern at each hit.

use std::fmt;

use memchr::memmem;

use crate::error::{Error, Result};

/// A parsed byte signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    bytes: Vec<Option<u8>>,
    nonzero_wildcards: bool,
}

impl Signature {
    /// Parse a signature from its text form.
    pub fn parse(pattern: &str) -> Result<Self> {
        Ok(Self {
            bytes: parse_pattern(pattern)?,
            nonzero_wildcards: false,
        })
    }

    pub fn from_bytes(bytes: Vec<Option<u8>>) -> Self {
        Self {
            bytes,
            nonzero_wildcards: false,
        }
    }

    /// Reject matches where a wildcard position holds a literal zero byte.
    ///
    /// Sparse heap regions are mostly zeroes; requiring wildcards to be
    /// non-zero keeps pointer-shaped holes from matching empty memory.
    pub fn with_nonzero_wildcards(mut self) -> Self {
        self.nonzero_wildcards = true;
        self
    }

    pub fn nonzero_wildcards(&self) -> bool {
        self.nonzero_wildcards
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[Option<u8>] {
        &self.bytes
    }

    /// Check whether the signature matches `data` starting at `pos`.
    pub fn matches_at(&self, data: &[u8], pos: usize) -> bool {
        let Some(window) = data.get(pos..pos + self.bytes.len()) else {
            return false;
        };
        self.bytes
            .iter()
            .zip(window)
            .all(|(expected, &actual)| match expected {
                Some(b) => *b == actual,
                None => !self.nonzero_wildcards || actual != 0,
            })
    }

    /// Offset of the first match in `data`.
    pub fn find_first(&self, data: &[u8]) -> Option<usize> {
        self.candidates(data).find(|&pos| self.matches_at(data, pos))
    }

    /// Offsets of every match in `data`, in ascending order.
    pub fn find_all(&self, data: &[u8]) -> Vec<usize> {
        self.candidates(data)
            .filter(|&pos| self.matches_at(data, pos))
            .collect()
    }

    /// Longest run of fixed bytes: (offset within the signature, bytes).
    fn anchor(&self) -> (usize, Vec<u8>) {
        let mut best = (0, 0);
        let mut start = 0;
        let mut len = 0;

        for (i, b) in self.bytes.iter().enumerate() {
            if b.is_some() {
                if len == 0 {
                    start = i;
                }
                len += 1;
                if len > best.1 {
                    best = (start, len);
                }
            } else {
                len = 0;
            }
        }

        let anchor = self.bytes[best.0..best.0 + best.1]
            .iter()
            .filter_map(|b| *b)
            .collect();
        (best.0, anchor)
    }

    /// Candidate start positions. Every returned position still needs `matches_at`.
    fn candidates<'a>(&self, data: &'a [u8]) -> Box<dyn Iterator<Item = usize> + 'a> {
        if self.bytes.is_empty() || self.bytes.len() > data.len() {
            return Box::new(std::iter::empty());
        }

        let last_start = data.len() - self.bytes.len();
        let (anchor_offset, anchor) = self.anchor();

        if anchor.is_empty() {
            // All wildcards
            return Box::new(0..=last_start);
        }

        let positions: Vec<usize> = memmem::find_iter(data, &anchor)
            .filter_map(|hit| hit.checked_sub(anchor_offset))
            .filter(|&start| start <= last_start)
            .collect();
        Box::new(positions.into_iter())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_pattern(&self.bytes))
    }
}

impl std::str::FromStr for Signature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

pub fn parse_pattern(pattern: &str) -> Result<Vec<Option<u8>>> {
    let mut bytes = Vec::new();
    for token in pattern.split_whitespace() {
        if token == "??" || token == "?" {
            bytes.push(None);
            continue;
        }

        let value = u8::from_str_radix(token, 16).map_err(|e| {
            Error::InvalidSignature(format!("Invalid signature token '{}': {}", token, e))
        })?;
        bytes.push(Some(value));
    }

    if bytes.is_empty() {
        return Err(Error::InvalidSignature(
            "Signature pattern is empty".to_string(),
        ));
    }

    Ok(bytes)
}

pub fn format_pattern(bytes: &[Option<u8>]) -> String {
    bytes
        .iter()
        .map(|b| match b {
            Some(value) => format!("{:02X}", value),
            None => "??".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

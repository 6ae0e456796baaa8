//! Managed collection layouts.
//!
//! Arrays are `[method table][length][elements...]` with the length slot padded
//! to pointer width, so elements start two pointers into the object.
//! `Dictionary<int, int>` entries are `{hashCode, next, key, value}`;
//! dictionaries with a reference value lay the reference out first.
//! Free-list entries carry `next < -1` and are skipped.

use crate::config::memory::MAX_COLLECTION_ITEMS;
use crate::process::{MemoryEngine, ReadMemory};

/// One live entry of a managed dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DictionaryEntry {
    pub key: i32,
    pub value: u64,
}

impl<R: ReadMemory> MemoryEngine<R> {
    /// Element count of an array object, 0 when unreadable or implausible.
    pub fn array_length(&self, array: u64) -> usize {
        let Some(length_slot) = array.checked_add(self.pointer_size()).filter(|_| array != 0)
        else {
            return 0;
        };
        let length = self.read_i32(length_slot);
        if length <= 0 || length as usize > MAX_COLLECTION_ITEMS {
            return 0;
        }
        length as usize
    }

    /// First element address and element count, at most `limit`.
    ///
    /// `None` when the elements would run past the end of the address space.
    fn array_elements(&self, array: u64, stride: u64, limit: usize) -> Option<(u64, usize)> {
        let count = self.array_length(array).min(limit);
        let data = array.checked_add(2 * self.pointer_size())?;
        data.checked_add(stride.checked_mul(count as u64)?)?;
        Some((data, count))
    }

    /// Reference elements of an array, up to `limit` of them.
    pub fn read_pointer_array(&self, array: u64, limit: usize) -> Vec<u64> {
        let ptr_size = self.pointer_size();
        let Some((data, count)) = self.array_elements(array, ptr_size, limit) else {
            return Vec::new();
        };
        (0..count as u64)
            .map(|i| self.read_ptr(data + i * ptr_size))
            .collect()
    }

    /// Items of a `List<T>` of references.
    pub fn read_list(&self, list: u64, items_offset: i64, size_offset: i64) -> Vec<u64> {
        if list == 0 {
            return Vec::new();
        }
        let size = self.read_i32(list.wrapping_add_signed(size_offset));
        if size <= 0 || size as usize > MAX_COLLECTION_ITEMS {
            return Vec::new();
        }
        let items = self.read_ptr(list.wrapping_add_signed(items_offset));
        self.read_pointer_array(items, size as usize)
    }

    /// Live entries of a `Dictionary<int, int>`.
    pub fn read_int_dictionary(
        &self,
        dictionary: u64,
        entries_offset: i64,
        count_offset: i64,
    ) -> Vec<DictionaryEntry> {
        self.read_dictionary(dictionary, entries_offset, count_offset, false)
    }

    /// Live entries of a `Dictionary<int, TRef>`; `value` is the reference.
    pub fn read_ref_dictionary(
        &self,
        dictionary: u64,
        entries_offset: i64,
        count_offset: i64,
    ) -> Vec<DictionaryEntry> {
        self.read_dictionary(dictionary, entries_offset, count_offset, true)
    }

    fn read_dictionary(
        &self,
        dictionary: u64,
        entries_offset: i64,
        count_offset: i64,
        reference_values: bool,
    ) -> Vec<DictionaryEntry> {
        if dictionary == 0 {
            return Vec::new();
        }
        let entries = self.read_ptr(dictionary.wrapping_add_signed(entries_offset));
        let count = self.read_i32(dictionary.wrapping_add_signed(count_offset));
        if entries == 0 || count <= 0 {
            return Vec::new();
        }
        let ptr_size = self.pointer_size();
        // (stride, next offset, key offset, value offset)
        let (stride, next_at, key_at, value_at) = if reference_values {
            (ptr_size + 12 + (ptr_size - 4), ptr_size + 4, ptr_size + 8, 0)
        } else {
            (16, 4, 8, 12)
        };

        let Some((data, count)) = self.array_elements(entries, stride, count as usize) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(count);
        for i in 0..count as u64 {
            let entry = data + i * stride;
            if self.read_i32(entry + next_at) < -1 {
                continue;
            }
            let key = self.read_i32(entry + key_at);
            let value = if reference_values {
                self.read_ptr(entry + value_at)
            } else {
                self.read_i32(entry + value_at) as u32 as u64
            };
            out.push(DictionaryEntry { key, value });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use crate::process::mock::MockMemoryBuilder;
    use crate::process::{Architecture, MemoryEngine};

    #[test]
    fn test_read_list_x64() {
        // list @0x00: _items @+0x08, _size @+0x10
        // array @0x40: length @+0x08, elements @+0x10
        let memory = MockMemoryBuilder::new()
            .write_ref(0x08, 0x40)
            .write_i32(0x10, 2)
            .write_i32(0x48, 4)
            .write_u64(0x50, 0xAAAA0)
            .write_u64(0x58, 0xBBBB0)
            .write_u64(0x60, 0xCCCC0)
            .build();
        let engine = MemoryEngine::new(memory, Architecture::X64);

        assert_eq!(engine.read_list(0x1000, 0x08, 0x10), vec![0xAAAA0, 0xBBBB0]);
    }

    #[test]
    fn test_read_list_rejects_garbage_size() {
        let memory = MockMemoryBuilder::new()
            .write_ref(0x08, 0x40)
            .write_i32(0x10, -5)
            .build();
        let engine = MemoryEngine::new(memory, Architecture::X64);

        assert!(engine.read_list(0x1000, 0x08, 0x10).is_empty());
    }

    #[test]
    fn test_read_int_dictionary_skips_free_entries() {
        // dictionary @0x00: _entries @+0x10, _count @+0x38
        // entries array @0x80 (length 3), data @0x90, 16-byte stride
        let memory = MockMemoryBuilder::new()
            .write_ref(0x10, 0x80)
            .write_i32(0x38, 3)
            .write_i32(0x88, 3)
            // entry 0: key 5 (Great) -> 120
            .write_i32(0x94, -1)
            .write_i32(0x98, 5)
            .write_i32(0x9C, 120)
            // entry 1: freed
            .write_i32(0xA4, -3)
            .write_i32(0xA8, 1)
            .write_i32(0xAC, 99)
            // entry 2: key 1 (Miss) -> 2
            .write_i32(0xB4, 0)
            .write_i32(0xB8, 1)
            .write_i32(0xBC, 2)
            .build();
        let engine = MemoryEngine::new(memory, Architecture::X64);

        let entries = engine.read_int_dictionary(0x1000, 0x10, 0x38);
        assert_eq!(entries.len(), 2);
        assert_eq!((entries[0].key, entries[0].value), (5, 120));
        assert_eq!((entries[1].key, entries[1].value), (1, 2));
    }

    #[test]
    fn test_read_ref_dictionary_x64() {
        // 24-byte entries: value ptr @+0, hashCode @+8, next @+12, key @+16
        let memory = MockMemoryBuilder::new()
            .write_ref(0x10, 0x80)
            .write_i32(0x38, 1)
            .write_i32(0x88, 1)
            .write_u64(0x90, 0x5000)
            .write_i32(0x9C, -1)
            .write_i32(0xA0, 3)
            .build();
        let engine = MemoryEngine::new(memory, Architecture::X64);

        let entries = engine.read_ref_dictionary(0x1000, 0x10, 0x38);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, 3);
        assert_eq!(entries[0].value, 0x5000);
    }

    #[test]
    fn test_torn_collection_pointers_read_empty() {
        let memory = MockMemoryBuilder::new()
            // list whose _items points at the top of the address space
            .write_u64(0x08, u64::MAX - 4)
            .write_i32(0x10, 3)
            // dictionary whose _entries does the same
            .write_u64(0x110, u64::MAX - 12)
            .write_i32(0x138, 3)
            .build();
        let engine = MemoryEngine::new(memory, Architecture::X64);

        assert!(engine.read_list(0x1000, 0x08, 0x10).is_empty());
        assert!(engine.read_int_dictionary(0x1100, 0x10, 0x38).is_empty());
        assert_eq!(engine.array_length(u64::MAX), 0);
    }
}

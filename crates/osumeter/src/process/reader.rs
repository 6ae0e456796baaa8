use crate::error::{Error, Result};
use crate::process::MemoryRegion;

macro_rules! le_reads {
    ($($name:ident => $ty:ty),* $(,)?) => {
        $(
            #[doc = concat!("Little-endian `", stringify!($ty), "` at `address`.")]
            fn $name(&self, address: u64) -> Result<$ty>
            where
                Self: Sized,
            {
                Ok(<$ty>::from_le_bytes(self.read_array(address)?))
            }
        )*
    };
}

/// A readable address space: a live client, or a scripted buffer in tests.
///
/// Failures are always surfaced. The "zero means unknown" policy lives one
/// level up in [`MemoryEngine`](crate::process::MemoryEngine).
pub trait ReadMemory {
    /// Copy `size` bytes starting at `address`. Short copies are errors.
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>>;

    fn base_address(&self) -> u64;

    /// Committed regions that can be scanned.
    fn regions(&self) -> Vec<MemoryRegion>;

    fn read_array<const N: usize>(&self, address: u64) -> Result<[u8; N]>
    where
        Self: Sized,
    {
        let bytes = self.read_bytes(address, N)?;
        <[u8; N]>::try_from(bytes.as_slice())
            .map_err(|_| Error::memory_read(address, format!("wanted {N} bytes, got {}", bytes.len())))
    }

    le_reads! {
        read_u8 => u8,
        read_i16 => i16,
        read_u16 => u16,
        read_i32 => i32,
        read_u32 => u32,
        read_i64 => i64,
        read_u64 => u64,
        read_f32 => f32,
        read_f64 => f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::mock::MockMemoryReader;

    #[test]
    fn test_hit_counter_layout() {
        // u16 count followed by an i32 score, as in stable's score object
        let mut data = 321u16.to_le_bytes().to_vec();
        data.extend_from_slice(&(-5i32).to_le_bytes());
        let reader = MockMemoryReader::new(data);

        assert_eq!(reader.read_u16(0x1000).unwrap(), 321);
        assert_eq!(reader.read_i32(0x1002).unwrap(), -5);
        assert_eq!(reader.read_u8(0x1000).unwrap(), 0x41);
    }

    #[test]
    fn test_sign_of_16_bit_reads() {
        let reader = MockMemoryReader::new(vec![0xFE, 0xFF]);
        assert_eq!(reader.read_i16(0x1000).unwrap(), -2);
        assert_eq!(reader.read_u16(0x1000).unwrap(), 0xFFFE);
    }

    #[test]
    fn test_64_bit_pointer_width_reads() {
        let reader = MockMemoryReader::new(0x0000_7FF6_1234_5678u64.to_le_bytes().to_vec());
        assert_eq!(reader.read_u64(0x1000).unwrap(), 0x7FF6_1234_5678);
        assert_eq!(reader.read_i64(0x1000).unwrap(), 0x7FF6_1234_5678);
    }

    #[test]
    fn test_accuracy_and_health_floats() {
        let mut data = 0.5f32.to_le_bytes().to_vec();
        data.extend_from_slice(&98.76f64.to_le_bytes());
        let reader = MockMemoryReader::new(data);

        assert_eq!(reader.read_f32(0x1000).unwrap(), 0.5);
        assert_eq!(reader.read_f64(0x1004).unwrap(), 98.76);
    }

    #[test]
    fn test_read_past_end_fails() {
        let reader = MockMemoryReader::new(vec![0x01, 0x02]);
        assert!(reader.read_u32(0x1000).is_err());
    }
}

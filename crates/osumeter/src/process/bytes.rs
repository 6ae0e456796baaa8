//! Little-endian cursor over borrowed bytes, plus the UTF-16 decoder used
//! for .NET strings read out of the client.

use encoding_rs::UTF_16LE;
use tracing::trace;

use crate::error::{Error, Result};

/// Marker byte preceding a present string in osu!'s binary formats.
const STRING_PRESENT: u8 = 0x0B;
const STRING_ABSENT: u8 = 0x00;

macro_rules! le_fields {
    ($($name:ident => $ty:ty),* $(,)?) => {
        $(
            pub fn $name(&mut self) -> Result<$ty> {
                self.take::<{ size_of::<$ty>() }>().map(<$ty>::from_le_bytes)
            }
        )*
    };
}

/// Forward-only reader for `.osr` headers and other serialized blobs.
///
/// ```
/// use osumeter::process::ByteBuffer;
///
/// let header = [0x00, 0xC2, 0x01, 0x35, 0x01];
/// let mut buf = ByteBuffer::new(&header);
/// assert_eq!(buf.read_u8().unwrap(), 0);
/// assert_eq!(buf.read_uleb128().unwrap(), 194);
/// assert_eq!(buf.position(), 3);
/// ```
pub struct ByteBuffer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteBuffer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn overrun(&self, wanted: usize) -> Error {
        Error::memory_read(
            self.pos as u64,
            format!("wanted {wanted} bytes, {} left", self.remaining()),
        )
    }

    /// Borrow the next `count` bytes. The position only moves on success.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        if count > self.remaining() {
            return Err(self.overrun(count));
        }
        let (taken, _) = self.data[self.pos..].split_at(count);
        self.pos += count;
        Ok(taken)
    }

    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.read_bytes(count).map(|_| ())
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        <[u8; N]>::try_from(bytes).map_err(|_| self.overrun(N))
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        self.read_u8().map(|b| b != 0)
    }

    le_fields! {
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

    /// Unsigned LEB128, as used for string lengths.
    pub fn read_uleb128(&mut self) -> Result<u64> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = self.read_u8()?;
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(Error::memory_read(self.pos as u64, "ULEB128 longer than 64 bits"))
    }

    /// `0x00` (empty) or `0x0B`, a ULEB128 length and UTF-8 bytes.
    pub fn read_prefixed_string(&mut self) -> Result<String> {
        match self.read_u8()? {
            STRING_ABSENT => Ok(String::new()),
            STRING_PRESENT => {
                let len = usize::try_from(self.read_uleb128()?)
                    .map_err(|_| self.overrun(usize::MAX))?;
                Ok(String::from_utf8_lossy(self.read_bytes(len)?).into_owned())
            }
            marker => Err(Error::memory_read(
                self.pos as u64,
                format!("bad string marker 0x{marker:02X}"),
            )),
        }
    }
}

/// UTF-16LE code units up to the first NUL unit. A trailing odd byte is dropped.
pub fn decode_utf16le(bytes: &[u8]) -> String {
    let (text, lossy) = decode_units(bytes);
    if lossy {
        trace!("Lossy UTF-16 decode of {} bytes", bytes.len());
    }
    text
}

/// Decoded text and whether any unpaired surrogate was replaced with U+FFFD.
fn decode_units(bytes: &[u8]) -> (String, bool) {
    let units = &bytes[..bytes.len() & !1];
    let end = units
        .chunks_exact(2)
        .position(|unit| unit == [0, 0])
        .map_or(units.len(), |i| i * 2);

    let (text, lossy) = UTF_16LE.decode_without_bom_handling(&units[..end]);
    (text.into_owned(), lossy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_osr_prefix_fields() {
        // mode, version, then an absent string
        let mut data = vec![3u8];
        data.extend_from_slice(&20240601i32.to_le_bytes());
        data.push(STRING_ABSENT);
        data.extend_from_slice(&(-1i16).to_le_bytes());
        let mut buf = ByteBuffer::new(&data);

        assert_eq!(buf.read_u8().unwrap(), 3);
        assert_eq!(buf.read_i32().unwrap(), 20240601);
        assert_eq!(buf.read_prefixed_string().unwrap(), "");
        assert_eq!(buf.read_i16().unwrap(), -1);
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn test_short_read_keeps_position() {
        let mut buf = ByteBuffer::new(&[0x01, 0x02, 0x03]);
        buf.skip(1).unwrap();
        assert!(buf.read_u32().is_err());
        assert_eq!(buf.position(), 1);
        assert!(buf.skip(5).is_err());
    }

    #[test]
    fn test_multi_byte_uleb128() {
        let mut buf = ByteBuffer::new(&[0xE5, 0x8E, 0x26, 0x7F]);
        assert_eq!(buf.read_uleb128().unwrap(), 624_485);
        assert_eq!(buf.read_uleb128().unwrap(), 127);
    }

    #[test]
    fn test_unterminated_uleb128_fails() {
        let data = [0xFF; 12];
        assert!(ByteBuffer::new(&data).read_uleb128().is_err());
    }

    #[test]
    fn test_present_string_is_utf8() {
        let name = "くろねこ";
        let mut data = vec![STRING_PRESENT, name.len() as u8];
        data.extend_from_slice(name.as_bytes());
        let mut buf = ByteBuffer::new(&data);

        assert_eq!(buf.read_prefixed_string().unwrap(), name);
        assert!(ByteBuffer::new(&[0x07]).read_prefixed_string().is_err());
    }

    #[test]
    fn test_utf16_stops_at_nul() {
        let mut data: Vec<u8> = "Kimi no ★".encode_utf16().flat_map(u16::to_le_bytes).collect();
        assert_eq!(decode_utf16le(&data), "Kimi no ★");

        data.extend_from_slice(&[0, 0, 0x41, 0]);
        assert_eq!(decode_utf16le(&data), "Kimi no ★");
        assert_eq!(decode_utf16le(&[0x41, 0x00, 0x42]), "A");
    }

    #[test]
    fn test_lone_surrogate_is_replaced() {
        // high surrogate D800 followed by 'A'
        let (text, lossy) = decode_units(&[0x00, 0xD8, 0x41, 0x00]);
        assert!(lossy);
        assert_eq!(text, "\u{FFFD}A");
        assert_eq!(decode_utf16le(&[0x00, 0xDC]), "\u{FFFD}");

        let (_, lossy) = decode_units(&[0x3D, 0xD8, 0x00, 0xDE]);
        assert!(!lossy);
    }
}

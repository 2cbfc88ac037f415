//! Binary field extraction
//!
//! USB descriptors are little-endian [USB 2.0 §8.1]. Every fixed-size
//! descriptor publishes a table of [`Field`]s (name, offset, width), and the
//! typed records read their values through a [`Record`] view over that table
//! instead of scattering raw offsets through the code.

use byteorder::{ByteOrder, LittleEndian};

/// Read a little-endian `u16` starting at `offset`.
///
/// # Panics
///
/// Panics if `buf.len() < offset + 2`. Callers validate the total length
/// before extracting fields, so a short buffer here is a programming error.
pub fn read_u16_le(buf: &[u8], offset: usize) -> u16 {
    LittleEndian::read_u16(&buf[offset..offset + 2])
}

/// Width of a descriptor field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    /// Single byte (`b*` fields)
    Byte,
    /// Little-endian 16-bit word (`w*`, `id*` and `bcd*` fields)
    Word,
}

impl Width {
    /// Size in bytes
    pub const fn size(self) -> usize {
        match self {
            Width::Byte => 1,
            Width::Word => 2,
        }
    }
}

/// One entry of a descriptor layout table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Field name as written in the USB specification
    pub name: &'static str,
    /// Byte offset from the start of the descriptor
    pub offset: usize,
    /// Field width
    pub width: Width,
}

impl Field {
    /// Declare a single-byte field
    pub const fn byte(name: &'static str, offset: usize) -> Self {
        Self {
            name,
            offset,
            width: Width::Byte,
        }
    }

    /// Declare a 16-bit little-endian field
    pub const fn word(name: &'static str, offset: usize) -> Self {
        Self {
            name,
            offset,
            width: Width::Word,
        }
    }

    /// First offset past the end of this field
    pub const fn end(&self) -> usize {
        self.offset + self.width.size()
    }
}

/// bLength, common to every descriptor
pub const LENGTH: Field = Field::byte("bLength", 0);

/// bDescriptorType, common to every descriptor
pub const DESCRIPTOR_TYPE: Field = Field::byte("bDescriptorType", 1);

/// Number of bytes a layout table covers
pub fn layout_size(layout: &[Field]) -> usize {
    layout.iter().map(Field::end).max().unwrap_or(0)
}

/// View of a descriptor read through its layout table
///
/// Only built over the fixed-size arrays of the typed descriptors, whose
/// length equals [`layout_size`] of their layout.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    bytes: &'a [u8],
}

impl<'a> Record<'a> {
    pub(crate) fn of(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Read a byte-wide field
    pub fn byte(&self, field: Field) -> u8 {
        self.bytes[field.offset]
    }

    /// Read a word-wide field
    pub fn word(&self, field: Field) -> u16 {
        read_u16_le(self.bytes, field.offset)
    }

    /// Read any field, widening bytes to `u16`
    pub fn value(&self, field: Field) -> u16 {
        match field.width {
            Width::Byte => u16::from(self.byte(field)),
            Width::Word => self.word(field),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_u16_le() {
        let buf = [0x12, 0x01, 0x00, 0x02, 0x34, 0x12];
        assert_eq!(read_u16_le(&buf, 0), 0x0112);
        assert_eq!(read_u16_le(&buf, 2), 0x0200);
        assert_eq!(read_u16_le(&buf, 4), 0x1234);
    }

    #[test]
    #[should_panic]
    fn test_read_u16_le_out_of_bounds_panics() {
        let buf = [0x01, 0x02, 0x03];
        read_u16_le(&buf, 2);
    }

    #[test]
    fn test_field_end() {
        assert_eq!(Field::byte("bInterval", 6).end(), 7);
        assert_eq!(Field::word("wMaxPacketSize", 4).end(), 6);
    }

    #[test]
    fn test_record_reads_layout_fields() {
        let layout = [LENGTH, DESCRIPTOR_TYPE, Field::word("wTotalLength", 2)];
        assert_eq!(layout_size(&layout), 4);

        let record = Record::of(&[0x09, 0x02, 0x20, 0x01]);
        assert_eq!(record.byte(LENGTH), 0x09);
        assert_eq!(record.value(DESCRIPTOR_TYPE), 0x0002);
        assert_eq!(record.value(layout[2]), 0x0120);
    }
}

use byteorder::{BigEndian, WriteBytesExt};
use std::io::{Error, ErrorKind, Result};

/// Utility trait for serializing data inside class files
///
/// Java class files have some peculiarities that make it useful to define an extra trait (instead
/// of just using `serde`):
///
///   - tags are always `u8`
///   - when serializing a sequence, the length of the sequence is usually `u16`
///   - everything is big-endian
///
pub trait Serialize: Sized {
    /// Serialize construct into a binary output stream
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()>;
}

impl Serialize for u8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(*self)
    }
}

impl Serialize for u16 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<BigEndian>(*self)
    }
}

impl Serialize for u32 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<BigEndian>(*self)
    }
}

impl Serialize for i8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i8(*self)
    }
}

impl Serialize for i16 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i16::<BigEndian>(*self)
    }
}

impl Serialize for i32 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i32::<BigEndian>(*self)
    }
}

impl Serialize for i64 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i64::<BigEndian>(*self)
    }
}

impl Serialize for f32 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_f32::<BigEndian>(*self)
    }
}

impl Serialize for f64 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_f64::<BigEndian>(*self)
    }
}

/// Size in `u16` is the first thing serialized
impl<A: Serialize> Serialize for Vec<A> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        u16_length(self.len())?.serialize(writer)?;
        for elem in self {
            elem.serialize(writer)?;
        }
        Ok(())
    }
}

/// Length of a `u16`-prefixed sequence
pub(crate) fn u16_length(len: usize) -> Result<u16> {
    u16::try_from(len).map_err(|_| {
        Error::new(
            ErrorKind::InvalidData,
            format!("sequence of {} elements does not fit a u16 length", len),
        )
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn length_prefixed_big_endian() {
        let mut bytes = vec![];
        vec![0x1234u16, 0xABCD].serialize(&mut bytes).unwrap();
        assert_eq!(bytes, vec![0x00, 0x02, 0x12, 0x34, 0xAB, 0xCD]);
    }

    #[test]
    fn signed_and_floating() {
        let mut bytes = vec![];
        (-2i16).serialize(&mut bytes).unwrap();
        1.0f32.serialize(&mut bytes).unwrap();
        assert_eq!(bytes, vec![0xFF, 0xFE, 0x3F, 0x80, 0x00, 0x00]);
    }

    #[test]
    fn oversized_sequence_is_rejected() {
        let mut bytes = vec![];
        let too_long: Vec<u8> = vec![0; 65536];
        assert!(too_long.serialize(&mut bytes).is_err());
    }
}

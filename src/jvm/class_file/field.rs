use crate::jvm::class_file::{Attribute, Serialize, Utf8ConstantIndex};
use crate::jvm::FieldAccessFlags;
use byteorder::WriteBytesExt;

/// Field declared by a class or interface
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.5
#[derive(Debug)]
pub struct Field {
    pub access_flags: FieldAccessFlags,
    pub name_index: Utf8ConstantIndex,
    pub descriptor_index: Utf8ConstantIndex,
    pub attributes: Vec<Attribute>,
}

impl Serialize for Field {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.access_flags.serialize(writer)?;
        self.name_index.serialize(writer)?;
        self.descriptor_index.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::{ConstantValue, ConstantsPool, PoolEntry};

    #[test]
    fn constant_field() {
        let mut constants = ConstantsPool::new();
        let value = constants.push(PoolEntry::Integer(3)).unwrap();
        let field = Field {
            access_flags: FieldAccessFlags::STATIC | FieldAccessFlags::FINAL,
            name_index: constants.push_utf8("THREE").unwrap(),
            descriptor_index: constants.push_utf8("I").unwrap(),
            attributes: vec![constants.attribute(ConstantValue(value)).unwrap()],
        };

        let mut bytes = vec![];
        field.serialize(&mut bytes).unwrap();
        assert_eq!(
            bytes,
            vec![
                0x00, 0x18, 0x00, 0x02, 0x00, 0x03, // flags, name, descriptor
                0x00, 0x01, 0x00, 0x04, 0x00, 0x00, 0x00, 0x02, 0x00, 0x01, // ConstantValue
            ]
        );
    }
}

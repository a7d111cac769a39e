use crate::jvm::class_file::{Attribute, Serialize, Utf8ConstantIndex};
use crate::jvm::MethodAccessFlags;
use byteorder::WriteBytesExt;

/// Method declared by a class or interface
///
/// Methods with a body carry a `Code` attribute (see [`crate::jvm::code::Code::serialize_code`]).
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.6
#[derive(Debug)]
pub struct Method {
    pub access_flags: MethodAccessFlags,
    pub name_index: Utf8ConstantIndex,
    pub descriptor_index: Utf8ConstantIndex,
    pub attributes: Vec<Attribute>,
}

impl Serialize for Method {
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
    use crate::jvm::class_file::ConstantsPool;
    use crate::jvm::code::{Code, Instruction, Settings};

    #[test]
    fn method_with_body() {
        let mut constants = ConstantsPool::new();
        let code = Code::new(0, 0, vec![Instruction::Return])
            .serialize_code(&mut constants, &Settings::default())
            .unwrap();
        let method = Method {
            access_flags: MethodAccessFlags::PRIVATE | MethodAccessFlags::STATIC,
            name_index: constants.push_utf8("go").unwrap(),
            descriptor_index: constants.push_utf8("()V").unwrap(),
            attributes: vec![constants.attribute(code).unwrap()],
        };

        let mut bytes = vec![];
        method.serialize(&mut bytes).unwrap();
        assert_eq!(
            bytes,
            vec![
                0x00, 0x0a, 0x00, 0x01, 0x00, 0x02, // flags, name, descriptor
                0x00, 0x01, 0x00, 0x03, 0x00, 0x00, 0x00, 0x0d, // one `Code` attribute
                0x00, 0x00, 0x00, 0x00, // max stack, max locals
                0x00, 0x00, 0x00, 0x01, 0xb1, // code
                0x00, 0x00, 0x00, 0x00, // no handlers, no attributes
            ]
        );
    }
}

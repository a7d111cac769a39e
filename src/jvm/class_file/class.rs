use crate::jvm::class_file::{
    Attribute, ClassConstantIndex, Constant, Field, Method, Serialize, Version,
};
use crate::jvm::ClassAccessFlags;
use crate::util::OffsetVec;
use byteorder::WriteBytesExt;

/// Representation of the [`class` file format of the JVM][0]
///
/// The constants are the lowered output of [`super::ConstantsPool::into_constants`], so the pool
/// has to be finished (every method body serialized) before the class file can be put together.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html
#[derive(Debug)]
pub struct ClassFile {
    pub version: Version,
    pub constants: OffsetVec<Constant>,
    pub access_flags: ClassAccessFlags,
    pub this_class: ClassConstantIndex,
    pub super_class: ClassConstantIndex,
    pub interfaces: Vec<ClassConstantIndex>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Magic header bytes that go at the front of the serialized class file
    const MAGIC: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];
}

impl Serialize for ClassFile {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&ClassFile::MAGIC)?;
        self.version.serialize(writer)?;
        self.constants.serialize(writer)?;
        self.access_flags.serialize(writer)?;
        self.this_class.serialize(writer)?;
        self.super_class.serialize(writer)?;
        self.interfaces.serialize(writer)?;
        self.fields.serialize(writer)?;
        self.methods.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::ConstantsPool;

    #[test]
    fn empty_class_layout() {
        let mut constants = ConstantsPool::new();
        let this_class = constants.push_class("A").unwrap();
        let super_class = constants.push_class("java/lang/Object").unwrap();
        let class_file = ClassFile {
            version: Version::JAVA8,
            constants: constants.into_constants().unwrap(),
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            this_class,
            super_class,
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            attributes: vec![],
        };

        let mut bytes = vec![];
        class_file.serialize(&mut bytes).unwrap();

        let mut expected = vec![0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x00, 0x00, 0x34, 0x00, 0x05];
        expected.extend([0x07, 0x00, 0x03, 0x07, 0x00, 0x04]);
        expected.extend([0x01, 0x00, 0x01, b'A']);
        expected.extend([0x01, 0x00, 0x10]);
        expected.extend(b"java/lang/Object");
        expected.extend([0x00, 0x21, 0x00, 0x01, 0x00, 0x02]);
        expected.extend([0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(bytes, expected);
    }
}

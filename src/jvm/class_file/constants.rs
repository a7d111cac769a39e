use crate::jvm::class_file::{u16_length, Attribute, AttributeLike, Serialize};
use crate::jvm::Error;
use crate::util::{Offset, OffsetVec, Width};
use byteorder::WriteBytesExt;
use std::collections::VecDeque;
use std::result::Result;

/// Largest value the constant pool count can take
const MAX_POOL_SIZE: usize = u16::MAX as usize;

/// Class file constants pool builder
///
/// The pool is append only: every [`PoolEntry`] pushed gets the next free index and keeps it.
/// Nothing is deduplicated, so pushing the same entry twice produces two entries. Entries hold
/// their components by value (a field reference owns its class name, member name and
/// descriptor). Only when the pool is consumed with [`ConstantsPool::into_constants`] do those
/// components get their own entries, appended after everything that was explicitly pushed.
///
/// One pool is shared by all of the method bodies of a class, so it gets passed around by
/// mutable reference.
#[derive(Debug)]
pub struct ConstantsPool {
    entries: OffsetVec<PoolEntry>,
}

impl ConstantsPool {
    /// Make a fresh empty constants pool
    pub fn new() -> ConstantsPool {
        ConstantsPool {
            entries: OffsetVec::new_starting_at(Offset(1)),
        }
    }

    /// Push an entry into the constant pool, provided there is space for it
    ///
    /// Note: the largest valid index is 65534, indexing starts at 1, and `long` and `double`
    /// entries take two indices.
    pub fn push(&mut self, entry: PoolEntry) -> Result<ConstantIndex, Error> {
        let offset = self.entries.offset_len().0;
        if offset + entry.width() > MAX_POOL_SIZE {
            return Err(Error::ConstantPoolOverflow { entry, offset });
        }

        self.entries.push(entry);
        Ok(ConstantIndex(offset as u16))
    }

    /// Push a utf8 constant into the constant pool
    pub fn push_utf8(&mut self, utf8: impl Into<String>) -> Result<Utf8ConstantIndex, Error> {
        self.push(PoolEntry::Utf8(utf8.into())).map(Utf8ConstantIndex)
    }

    /// Push a class constant (by internal name, eg. `java/lang/Object`) into the constant pool
    pub fn push_class(&mut self, name: impl Into<String>) -> Result<ClassConstantIndex, Error> {
        self.push(PoolEntry::Class(name.into()))
            .map(ClassConstantIndex)
    }

    /// Add an attribute to the constant pool
    pub fn attribute<A: AttributeLike>(&mut self, attribute: A) -> Result<Attribute, Error> {
        let name_index = self.push_utf8(A::NAME)?;
        let mut info = vec![];

        attribute.serialize(&mut info).map_err(Error::IoError)?;

        Ok(Attribute { name_index, info })
    }

    /// Running size of the pool: one more than the last index handed out (so `1` when empty)
    ///
    /// This is the `constant_pool_count` of the class file, at least until the pool is lowered.
    pub fn size(&self) -> usize {
        self.entries.offset_len().0
    }

    /// Number of entries pushed (`long` and `double` entries count once)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by the index it was given
    pub fn get(&self, index: ConstantIndex) -> Option<&PoolEntry> {
        self.entries.get_offset(Offset(index.0 as usize))
    }

    /// Consume the pool and return the final vector of constants
    ///
    /// Entries are lowered in index order. Components that need entries of their own (the class
    /// name of a `Class`, the `NameAndType` of a `Fieldref`, etc.) are appended to the end of
    /// the pool as they are discovered, and are themselves lowered in turn. Indices that were
    /// returned by [`ConstantsPool::push`] still refer to the same constants.
    pub fn into_constants(self) -> Result<OffsetVec<Constant>, Error> {
        let mut lowering = Lowering {
            next_offset: self.entries.offset_len().0,
            pending: self.entries.into_iter().map(|(_, _, entry)| entry).collect(),
        };

        let mut constants = OffsetVec::new_starting_at(Offset(1));
        while let Some(entry) = lowering.pending.pop_front() {
            let constant = lowering.lower(entry)?;
            constants.push(constant);
        }

        log::trace!(
            "lowered constant pool to {} entries (count {})",
            constants.len(),
            constants.offset_len().0
        );
        Ok(constants)
    }
}

impl Default for ConstantsPool {
    fn default() -> Self {
        ConstantsPool::new()
    }
}

/// State for lowering symbolic entries into constants
struct Lowering {
    /// Next index to hand out for a component entry
    next_offset: usize,

    /// Entries which still need to be lowered, in index order
    pending: VecDeque<PoolEntry>,
}

impl Lowering {
    fn append(&mut self, entry: PoolEntry) -> Result<ConstantIndex, Error> {
        let offset = self.next_offset;
        if offset + entry.width() > MAX_POOL_SIZE {
            return Err(Error::ConstantPoolOverflow { entry, offset });
        }
        self.next_offset += entry.width();
        self.pending.push_back(entry);
        Ok(ConstantIndex(offset as u16))
    }

    fn utf8(&mut self, utf8: String) -> Result<Utf8ConstantIndex, Error> {
        self.append(PoolEntry::Utf8(utf8)).map(Utf8ConstantIndex)
    }

    fn class(&mut self, name: String) -> Result<ClassConstantIndex, Error> {
        self.append(PoolEntry::Class(name)).map(ClassConstantIndex)
    }

    fn name_and_type(
        &mut self,
        name_and_type: NameAndType,
    ) -> Result<NameAndTypeConstantIndex, Error> {
        self.append(PoolEntry::NameAndType(name_and_type))
            .map(NameAndTypeConstantIndex)
    }

    fn member(
        &mut self,
        member: MemberRef,
    ) -> Result<(ClassConstantIndex, NameAndTypeConstantIndex), Error> {
        let MemberRef {
            class,
            name,
            descriptor,
        } = member;
        let class = self.class(class)?;
        let name_and_type = self.name_and_type(NameAndType { name, descriptor })?;
        Ok((class, name_and_type))
    }

    fn lower(&mut self, entry: PoolEntry) -> Result<Constant, Error> {
        Ok(match entry {
            PoolEntry::Utf8(utf8) => {
                let encoded_len = encode_modified_utf8(&utf8).len();
                if encoded_len > u16::MAX as usize {
                    return Err(Error::Utf8TooLong(encoded_len));
                }
                Constant::Utf8(utf8)
            }
            PoolEntry::Integer(integer) => Constant::Integer(integer),
            PoolEntry::Float(float) => Constant::Float(float),
            PoolEntry::Long(long) => Constant::Long(long),
            PoolEntry::Double(double) => Constant::Double(double),
            PoolEntry::Class(name) => Constant::Class(self.utf8(name)?),
            PoolEntry::String(string) => Constant::String(self.utf8(string)?),
            PoolEntry::FieldRef(member) => {
                let (class, name_and_type) = self.member(member)?;
                Constant::FieldRef(class, name_and_type)
            }
            PoolEntry::MethodRef(member) => {
                let (class, name_and_type) = self.member(member)?;
                Constant::MethodRef {
                    class,
                    name_and_type,
                    is_interface: false,
                }
            }
            PoolEntry::InterfaceMethodRef(member) => {
                let (class, name_and_type) = self.member(member)?;
                Constant::MethodRef {
                    class,
                    name_and_type,
                    is_interface: true,
                }
            }
            PoolEntry::NameAndType(NameAndType { name, descriptor }) => Constant::NameAndType {
                name: self.utf8(name)?,
                descriptor: self.utf8(descriptor)?,
            },
            PoolEntry::MethodHandle(handle_kind, member) => {
                let member = self.append(handle_kind.member_entry(member))?;
                Constant::MethodHandle {
                    handle_kind,
                    member,
                }
            }
            PoolEntry::MethodType(descriptor) => Constant::MethodType {
                descriptor: self.utf8(descriptor)?,
            },
            PoolEntry::InvokeDynamic {
                bootstrap_method,
                name_and_type,
            } => Constant::InvokeDynamic {
                bootstrap_method,
                method_descriptor: self.name_and_type(name_and_type)?,
            },
        })
    }
}

/// Reference to a field or method of a class
///
/// The class is an internal binary name (eg. `java/lang/String`) and the descriptor is a field or
/// method descriptor (eg. `I` or `(Ljava/lang/String;)V`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberRef {
    pub class: String,
    pub name: String,
    pub descriptor: String,
}

impl MemberRef {
    pub fn new(
        class: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> MemberRef {
        MemberRef {
            class: class.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

/// Name and a type (eg. for a field or a method)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NameAndType {
    pub name: String,
    pub descriptor: String,
}

impl NameAndType {
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>) -> NameAndType {
        NameAndType {
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

/// Entry in the [`ConstantsPool`], before it is lowered into a [`Constant`]
#[derive(Debug, Clone, PartialEq)]
pub enum PoolEntry {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),

    /// Class or interface by internal name
    Class(String),

    /// Constant object of type `java.lang.String`
    String(String),
    FieldRef(MemberRef),
    MethodRef(MemberRef),
    InterfaceMethodRef(MemberRef),
    NameAndType(NameAndType),

    /// Constant `java.lang.invoke.MethodHandle`
    ///
    /// The reference becomes a `Fieldref` for the field handle kinds, an `InterfaceMethodref`
    /// for `InvokeInterface`, and a `Methodref` otherwise.
    MethodHandle(HandleKind, MemberRef),

    /// Method type, by method descriptor
    MethodType(String),

    /// Dynamically-computed call site
    InvokeDynamic {
        /// Index into the `BootstrapMethods` attribute
        bootstrap_method: u16,
        name_and_type: NameAndType,
    },
}

impl PoolEntry {
    /// Does this entry take two indices in the pool?
    pub fn is_wide(&self) -> bool {
        matches!(self, PoolEntry::Long(_) | PoolEntry::Double(_))
    }
}

impl Width for PoolEntry {
    fn width(&self) -> usize {
        if self.is_wide() {
            2
        } else {
            1
        }
    }
}

/// Constants as in the constant pool
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.4
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Class or an interface
    Class(Utf8ConstantIndex),

    /// Field
    FieldRef(ClassConstantIndex, NameAndTypeConstantIndex),

    /// Method (this combines `Methodref` and `InterfaceMethodref`)
    MethodRef {
        class: ClassConstantIndex,
        name_and_type: NameAndTypeConstantIndex,
        is_interface: bool,
    },

    /// Constant object of type `java.lang.String`
    String(Utf8ConstantIndex),

    /// Constant primitive of type `int`
    Integer(i32),

    /// Constant primitive of type `float`
    Float(f32),

    /// Constant primitive of type `long`
    Long(i64),

    /// Constant primitive of type `double`
    Double(f64),

    /// Name and a type (eg. for a field or a method)
    NameAndType {
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    },

    /// Constant UTF-8 encoded raw string value
    ///
    /// Despite the name, the encoding is not quite UTF-8 (see [`encode_modified_utf8`]).
    Utf8(String),

    /// Constant object of type `java.lang.invoke.MethodHandle`
    MethodHandle {
        handle_kind: HandleKind,

        /// `FieldRef` for the field kinds, `MethodRef` for the rest
        member: ConstantIndex,
    },

    /// Method type
    MethodType { descriptor: Utf8ConstantIndex },

    /// Dynamically-computed call site
    InvokeDynamic {
        bootstrap_method: u16,
        method_descriptor: NameAndTypeConstantIndex,
    },
}

impl Serialize for Constant {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            Constant::Utf8(string) => {
                1u8.serialize(writer)?;
                let buffer: Vec<u8> = encode_modified_utf8(string);
                u16_length(buffer.len())?.serialize(writer)?;
                writer.write_all(&buffer)?;
            }
            Constant::Integer(integer) => {
                3u8.serialize(writer)?;
                integer.serialize(writer)?;
            }
            Constant::Float(float) => {
                4u8.serialize(writer)?;
                float.serialize(writer)?;
            }
            Constant::Long(long) => {
                5u8.serialize(writer)?;
                long.serialize(writer)?;
            }
            Constant::Double(double) => {
                6u8.serialize(writer)?;
                double.serialize(writer)?;
            }
            Constant::Class(name) => {
                7u8.serialize(writer)?;
                name.serialize(writer)?;
            }
            Constant::String(bytes) => {
                8u8.serialize(writer)?;
                bytes.serialize(writer)?;
            }
            Constant::FieldRef(class, name_and_type) => {
                9u8.serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            } => {
                (if *is_interface { 11u8 } else { 10u8 }).serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::NameAndType { name, descriptor } => {
                12u8.serialize(writer)?;
                name.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
            Constant::MethodHandle {
                handle_kind,
                member,
            } => {
                15u8.serialize(writer)?;
                handle_kind.serialize(writer)?;
                member.serialize(writer)?;
            }
            Constant::MethodType { descriptor } => {
                16u8.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
            Constant::InvokeDynamic {
                bootstrap_method,
                method_descriptor,
            } => {
                18u8.serialize(writer)?;
                bootstrap_method.serialize(writer)?;
                method_descriptor.serialize(writer)?;
            }
        };
        Ok(())
    }
}

/// Only `Constant::Long` and `Constant::Double` have width 2
impl Width for Constant {
    fn width(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

/// The pool count goes first, and it is the index one past the last entry
impl Serialize for OffsetVec<Constant> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        u16_length(self.offset_len().0)?.serialize(writer)?;
        for (_, _, constant) in self {
            constant.serialize(writer)?;
        }
        Ok(())
    }
}

/// Modified UTF-8 format used in class files.
///
/// See [this `DataInput` section for details][0]. Compared to UTF-8:
///
///  * the null character is encoded in the 2-byte format, so encoded strings never contain `0`
///  * characters outside the basic multilingual plane are split into their UTF-16 surrogate
///    pair, and each surrogate gets the 3-byte format
///
/// [0]: https://docs.oracle.com/en/java/javase/17/docs/api/java.base/java/io/DataInput.html#modified-utf-8
pub fn encode_modified_utf8(string: &str) -> Vec<u8> {
    let mut buffer: Vec<u8> = Vec::with_capacity(string.len());
    for unit in string.encode_utf16() {
        match unit {
            0x0001..=0x007F => buffer.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                buffer.push(0b1100_0000 | (unit >> 6) as u8);
                buffer.push(0b1000_0000 | (unit & 0x3F) as u8);
            }
            _ => {
                buffer.push(0b1110_0000 | (unit >> 12) as u8);
                buffer.push(0b1000_0000 | (unit >> 6 & 0x3F) as u8);
                buffer.push(0b1000_0000 | (unit & 0x3F) as u8);
            }
        }
    }
    buffer
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct ConstantIndex(pub u16);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct Utf8ConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct NameAndTypeConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct ClassConstantIndex(pub ConstantIndex);

impl From<Utf8ConstantIndex> for ConstantIndex {
    fn from(index: Utf8ConstantIndex) -> ConstantIndex {
        index.0
    }
}

impl From<NameAndTypeConstantIndex> for ConstantIndex {
    fn from(index: NameAndTypeConstantIndex) -> ConstantIndex {
        index.0
    }
}

impl From<ClassConstantIndex> for ConstantIndex {
    fn from(index: ClassConstantIndex) -> ConstantIndex {
        index.0
    }
}

impl Serialize for ConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Serialize for Utf8ConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Serialize for NameAndTypeConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Serialize for ClassConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

/// Type of method handle
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-5.html#jvms-5.4.3.5-220
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum HandleKind {
    GetField,
    GetStatic,
    PutField,
    PutStatic,
    InvokeVirtual,
    InvokeStatic,
    InvokeSpecial,
    NewInvokeSpecial,
    InvokeInterface,
}

impl HandleKind {
    /// Pool entry that the handle points to
    fn member_entry(self, member: MemberRef) -> PoolEntry {
        match self {
            HandleKind::GetField
            | HandleKind::GetStatic
            | HandleKind::PutField
            | HandleKind::PutStatic => PoolEntry::FieldRef(member),
            HandleKind::InvokeInterface => PoolEntry::InterfaceMethodRef(member),
            HandleKind::InvokeVirtual
            | HandleKind::InvokeStatic
            | HandleKind::InvokeSpecial
            | HandleKind::NewInvokeSpecial => PoolEntry::MethodRef(member),
        }
    }
}

impl Serialize for HandleKind {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        let byte: u8 = match self {
            HandleKind::GetField => 1,
            HandleKind::GetStatic => 2,
            HandleKind::PutField => 3,
            HandleKind::PutStatic => 4,
            HandleKind::InvokeVirtual => 5,
            HandleKind::InvokeStatic => 6,
            HandleKind::InvokeSpecial => 7,
            HandleKind::NewInvokeSpecial => 8,
            HandleKind::InvokeInterface => 9,
        };
        byte.serialize(writer)
    }
}

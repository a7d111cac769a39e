use crate::jvm::class_file::{ClassConstantIndex, Serialize};
use crate::util::Width;
use byteorder::WriteBytesExt;

/// These types are from [this hierarchy][0]
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se7/html/jvms-4.html#jvms-4.10.1.2
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub enum VerificationType<Cls, U> {
    /// Unusable slot (eg. a local that has not been initialized yet)
    ///
    /// In symbolic frames, `Top` right after a `Long` or `Double` is the padding for the second
    /// half of that value and is not encoded.
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,

    /// In the constructor, the `this` parameter starts with this type then turns into an object
    /// type after `<init>` is called
    UninitializedThis,

    /// Object type
    Object(Cls),

    /// State of an object after `new` has been called but `<init>` has not been called
    ///
    ///   - in symbolic frames, `U` is the index of the `new` instruction in the method body
    ///   - when serializing into a classfile, `U` is `u16`, the byte offset of that `new`
    ///     instruction from the start of the method body
    Uninitialized(U),
}

impl<Cls, U> VerificationType<Cls, U> {
    /// Does this type take up two local variable slots?
    pub fn is_wide(&self) -> bool {
        matches!(self, VerificationType::Double | VerificationType::Long)
    }

    /// Convert the class and uninitialized representations
    pub fn try_map<Cls2, U2, E>(
        self,
        map_class: impl FnOnce(Cls) -> Result<Cls2, E>,
        map_uninitialized: impl FnOnce(U) -> Result<U2, E>,
    ) -> Result<VerificationType<Cls2, U2>, E> {
        Ok(match self {
            VerificationType::Top => VerificationType::Top,
            VerificationType::Integer => VerificationType::Integer,
            VerificationType::Float => VerificationType::Float,
            VerificationType::Double => VerificationType::Double,
            VerificationType::Long => VerificationType::Long,
            VerificationType::Null => VerificationType::Null,
            VerificationType::UninitializedThis => VerificationType::UninitializedThis,
            VerificationType::Object(cls) => VerificationType::Object(map_class(cls)?),
            VerificationType::Uninitialized(u) => {
                VerificationType::Uninitialized(map_uninitialized(u)?)
            }
        })
    }
}

impl VerificationType<String, usize> {
    /// Object type from an internal class name (eg. `java/lang/String` or `[I`)
    pub fn object(class: impl Into<String>) -> Self {
        VerificationType::Object(class.into())
    }
}

impl Serialize for VerificationType<ClassConstantIndex, u16> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            VerificationType::Top => 0u8.serialize(writer)?,
            VerificationType::Integer => 1u8.serialize(writer)?,
            VerificationType::Float => 2u8.serialize(writer)?,
            VerificationType::Double => 3u8.serialize(writer)?,
            VerificationType::Long => 4u8.serialize(writer)?,
            VerificationType::Null => 5u8.serialize(writer)?,
            VerificationType::UninitializedThis => 6u8.serialize(writer)?,
            VerificationType::Object(cls) => {
                7u8.serialize(writer)?;
                cls.serialize(writer)?;
            }
            VerificationType::Uninitialized(off) => {
                8u8.serialize(writer)?;
                off.serialize(writer)?;
            }
        };
        Ok(())
    }
}

impl<Cls, A> Width for VerificationType<Cls, A> {
    fn width(&self) -> usize {
        if self.is_wide() {
            2
        } else {
            1
        }
    }
}

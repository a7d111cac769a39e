use super::Serialize;
use byteorder::WriteBytesExt;
use std::io::Result;

/// Class file format version
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.1-200-B.2
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct Version {
    pub major_version: u16,
    pub minor_version: u16,
}

impl Version {
    /// JVM class file version corresponding to Java SE 5 (the last one without stack maps)
    pub const JAVA5: Version = Version {
        major_version: 49,
        minor_version: 0,
    };

    /// JVM class file version corresponding to Java SE 6 (introduced `StackMapTable`)
    pub const JAVA6: Version = Version {
        major_version: 50,
        minor_version: 0,
    };

    /// JVM class file version corresponding to Java SE 8 (released March 2014)
    pub const JAVA8: Version = Version {
        major_version: 52,
        minor_version: 0,
    };

    /// JVM class file version corresponding to Java SE 11 (released September 2018)
    pub const JAVA11: Version = Version {
        major_version: 55,
        minor_version: 0,
    };

    /// Type checking verification (and so `StackMapTable`) is available from version 50
    pub fn uses_stack_map_frames(&self) -> bool {
        self.major_version >= Self::JAVA6.major_version
    }
}

impl Serialize for Version {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.minor_version.serialize(writer)?;
        self.major_version.serialize(writer)?;
        Ok(())
    }
}

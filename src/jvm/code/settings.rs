use crate::jvm::class_file::Version;

/// Options for compiling method bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Emit a `StackMapTable` attribute
    ///
    /// Class files older than version 50 are verified by type inference and have no use for it.
    pub emit_stack_map_table: bool,

    /// Reject code where a branch target (or exception handler) has no frame
    ///
    /// When this is off, such points are skipped and it is up to the verifier to complain. The
    /// fall-through of a widened conditional always needs a frame either way.
    pub check_frames: bool,
}

impl Settings {
    /// Settings appropriate for a class file version
    pub fn for_version(version: &Version) -> Settings {
        let stack_maps = version.uses_stack_map_frames();
        Settings {
            emit_stack_map_table: stack_maps,
            check_frames: stack_maps,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings::for_version(&Version::JAVA8)
    }
}

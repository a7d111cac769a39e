//! Verification types and frames
//!
//! Since Java 6, the JVM checks method bodies using [type checking][0], which relies on the class
//! file carrying the types of the locals and stack at every branch target. Frames are supplied
//! symbolically (class names, instruction indices) and get turned into `StackMapTable` entries by
//! [`crate::jvm::code::build_stack_map_table`].
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.10.1

mod frame;
mod types;

pub use frame::*;
pub use types::*;

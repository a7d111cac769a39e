//! Bytecode representation and generation
//!
//! ### Structure
//!
//! Despite being pushed off into [just another method attribute](crate::jvm::class_file::Code),
//! the bytecode is arguably the most important part of the class file - it contains the actual
//! executable instructions. A method body is represented as a [`Code`]: a flat list of
//! [`Instruction`]s where jumps are relative instruction counts, plus frames and exception
//! ranges that also refer to instructions by index.
//!
//! ### Code generation
//!
//! Serializing a body happens in a few steps:
//!
//!   1. [`encode`] picks the smallest encoding of each instruction and leaves holes for jumps
//!   2. [`resolve_jumps`] widens jumps that don't fit in 16 bits and fills in the holes
//!   3. [`exception_table`] translates exception ranges into byte offsets
//!   4. [`build_stack_map_table`] encodes the frames, including the new ones that wide
//!      conditional branches need
//!   5. [`line_number_table`] and [`local_variable_table`] do the same for debug information
//!
//! [`Code::serialize_code`] runs all of these in order. Since there is more that the JVM needs
//! (see [`crate::jvm::verifier`]), the caller still has to supply correct frames: they are
//! checked for presence and consistency, not inferred.

mod code;
mod debug_info;
mod encoder;
mod exceptions;
mod instructions;
mod jump_encoding;
mod settings;
mod stack_map;

pub use code::*;
pub use debug_info::*;
pub use encoder::*;
pub use exceptions::*;
pub use instructions::*;
pub use jump_encoding::*;
pub use settings::*;
pub use stack_map::*;

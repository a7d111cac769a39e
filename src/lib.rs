//! Encode JVM method bodies into class file bytes
//!
//! The entry point for a method body is [`jvm::code::Code`]: fill in the instructions (branch
//! targets are relative instruction counts, never byte offsets), the frames at merge points, and
//! the exception ranges, then call [`jvm::code::Code::serialize_code`] with the class' shared
//! [`jvm::class_file::ConstantsPool`]. The result is a [`jvm::class_file::Code`] attribute ready
//! to be attached to a [`jvm::class_file::Method`].
//!
//! ```
//! use jvm_codegen::jvm::class_file::ConstantsPool;
//! use jvm_codegen::jvm::code::{Code, Instruction::*, Settings};
//! use jvm_codegen::jvm::class_file::Serialize;
//! use jvm_codegen::jvm::verifier::Frame;
//!
//! # fn main() -> Result<(), jvm_codegen::jvm::Error> {
//! let mut constants = ConstantsPool::new();
//! let mut body = Code::new(0, 1, vec![Goto(1), Return]);
//! body.frames.insert(1, Frame::empty());
//! let code = body.serialize_code(&mut constants, &Settings::default())?;
//! assert_eq!(code.code_array.0, vec![0xa7, 0x00, 0x03, 0xb1]);
//!
//! let mut bytes = vec![];
//! code.serialize(&mut bytes).unwrap();
//! # Ok(())
//! # }
//! ```

pub mod jvm;
pub mod util;

//! Generate JVM class files
//!
//! ### Structure
//!
//!   - [`class_file`] is the binary layout: the constant pool, attributes, methods, fields and the
//!     class file container, all of which implement [`class_file::Serialize`]
//!   - [`code`] turns a list of instructions into a `Code` attribute, picking the narrowest
//!     encodings, widening jumps that don't fit, and translating exception ranges
//!   - [`verifier`] has the verification types and frames that end up in the `StackMapTable`
//!
//! ### Simple example
//!
//! A class with a single `public static int answer()` method:
//!
//! ```
//! use jvm_codegen::jvm::class_file::{ClassFile, ConstantsPool, Method, Serialize, Version};
//! use jvm_codegen::jvm::code::{Code, Instruction::*, Settings};
//! use jvm_codegen::jvm::{ClassAccessFlags, Error, MethodAccessFlags};
//!
//! # fn generate_class() -> Result<Vec<u8>, Error> {
//! let mut constants = ConstantsPool::new();
//! let this_class = constants.push_class("me/alec/Answer")?;
//! let super_class = constants.push_class("java/lang/Object")?;
//!
//! let body = Code::new(1, 0, vec![PushInt(42), IReturn]);
//! let code = body.serialize_code(&mut constants, &Settings::for_version(&Version::JAVA8))?;
//! let method = Method {
//!     access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
//!     name_index: constants.push_utf8("answer")?,
//!     descriptor_index: constants.push_utf8("()I")?,
//!     attributes: vec![constants.attribute(code)?],
//! };
//!
//! let class_file = ClassFile {
//!     version: Version::JAVA8,
//!     constants: constants.into_constants()?,
//!     access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
//!     this_class,
//!     super_class,
//!     interfaces: vec![],
//!     fields: vec![],
//!     methods: vec![method],
//!     attributes: vec![],
//! };
//! let mut class_bytes: Vec<u8> = vec![];
//! class_file.serialize(&mut class_bytes).map_err(Error::IoError)?;
//! # Ok(class_bytes)
//! # }
//! # assert_eq!(&generate_class().unwrap()[0..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
//! ```

mod access_flags;
pub mod class_file;
pub mod code;
mod errors;
pub mod verifier;

pub use access_flags::*;
pub use errors::*;

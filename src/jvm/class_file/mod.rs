//! Binary layout of the class file
//!
//! Everything in here implements [`Serialize`], writing the big-endian layout described in [the
//! class file format chapter][0]. Constant pool references are typed indices (eg.
//! [`ClassConstantIndex`]) handed out by the [`ConstantsPool`].
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html

mod attribute;
mod class;
mod constants;
mod field;
mod method;
mod serialize;
mod version;

pub use attribute::*;
pub use class::*;
pub use constants::*;
pub use field::*;
pub use method::*;
pub use serialize::*;
pub use version::*;

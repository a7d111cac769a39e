use super::class_file::PoolEntry;
use super::verifier::Frame;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// Pushing this entry would take the pool past the largest `u16` index
    ConstantPoolOverflow {
        entry: PoolEntry,
        offset: usize,
    },
    IoError(std::io::Error),
    MethodCodeMaxStackOverflow(usize),
    MethodCodeMaxLocalsOverflow(usize),

    /// Either the number of instructions or the encoded size of the code exceeds 65535
    MethodCodeOverflow(usize),

    /// A branch at this instruction index targets something outside the method body
    InvalidJumpTarget {
        instruction: usize,
        displacement: i64,
    },

    /// Exception range that is empty or out of bounds, or a handler past the last instruction
    InvalidExceptionRange {
        start: usize,
        end: usize,
        handler: usize,
    },

    /// Line number or local variable range that is empty or out of bounds
    ///
    /// A line number is the one-instruction range `[start, start + 1)`.
    InvalidDebugRange { start: usize, end: usize },

    /// Instruction index that needs a stack map frame, but none was supplied
    MissingFrame(usize),

    /// A particular offset has two conflicting frames
    ConflictingFrames(
        usize,
        Frame<String, usize>,
        Frame<String, usize>,
    ),

    /// Instruction whose operands are inconsistent with its kind (eg. an empty `tableswitch`)
    MalformedInstruction {
        instruction: usize,
        reason: &'static str,
    },

    /// Modified UTF-8 encoding of a string constant is longer than 65535 bytes
    Utf8TooLong(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConstantPoolOverflow { entry, offset } => {
                write!(f, "constant pool overflow at index {} pushing {:?}", offset, entry)
            }
            Error::IoError(err) => write!(f, "I/O error: {}", err),
            Error::MethodCodeMaxStackOverflow(max) => write!(f, "max stack {} exceeds 65535", max),
            Error::MethodCodeMaxLocalsOverflow(max) => {
                write!(f, "max locals {} exceeds 65535", max)
            }
            Error::MethodCodeOverflow(len) => write!(f, "method code size {} exceeds 65535", len),
            Error::InvalidJumpTarget {
                instruction,
                displacement,
            } => write!(
                f,
                "jump at instruction {} by {} instructions leaves the method",
                instruction, displacement
            ),
            Error::InvalidExceptionRange {
                start,
                end,
                handler,
            } => write!(
                f,
                "invalid range [{}, {}) with handler {}",
                start, end, handler
            ),
            Error::InvalidDebugRange { start, end } => {
                write!(f, "invalid debug info range [{}, {})", start, end)
            }
            Error::MissingFrame(instruction) => {
                write!(f, "no stack map frame for instruction {}", instruction)
            }
            Error::ConflictingFrames(offset, frame1, frame2) => write!(
                f,
                "conflicting frames at offset {}: {:?} and {:?}",
                offset, frame1, frame2
            ),
            Error::MalformedInstruction {
                instruction,
                reason,
            } => write!(f, "malformed instruction {}: {}", instruction, reason),
            Error::Utf8TooLong(len) => {
                write!(f, "modified UTF-8 string of {} bytes exceeds 65535", len)
            }
        }
    }
}

impl std::error::Error for Error {}

//! This module contains the AST of JVM bytecode. The representation is slightly different from
//! the usual presentation to make it more convenient to construct bytecode. For instance:
//!
//!   - The "wide" instruction doesn't show up at all, but instead gets merged into the
//!     instructions it is allowed to modify (and the short `iload_<n>` forms get merged into
//!     `iload`)
//!
//!   - Some instructions (like the branches) get abstracted into one instruction with a field.
//!     This helps with repetitive pattern matches and also simplifies tasks like inverting a
//!     branch condition.
//!
//!   - Branch targets are displacements counted in instructions, relative to the branch itself.
//!     `Goto(1)` jumps to the next instruction and `Goto(0)` is an infinite loop.
//!
//!   - There are a handful of "utility" instructions (`PushInt`, `PushConstant`, etc.) which
//!     don't correspond to any one opcode: the encoder picks the smallest one that works.
//!

use crate::jvm::class_file::{MemberRef, NameAndType, PoolEntry};
use std::ops::Not;

/// JVM bytecode instruction
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    Nop,
    AConstNull,
    IConstM1,
    IConst0,
    IConst1,
    IConst2,
    IConst3,
    IConst4,
    IConst5,
    LConst0,
    LConst1,
    FConst0,
    FConst1,
    FConst2,
    DConst0,
    DConst1,
    BiPush(i8),
    SiPush(i16),
    Ldc(u8), // raw constant pool index
    LdcW(u16),
    Ldc2W(u16),
    ILoad(u16), // covers `iload`, `iload_<n>`, and `wide iload`
    LLoad(u16),
    FLoad(u16),
    DLoad(u16),
    ALoad(u16),
    IALoad,
    LALoad,
    FALoad,
    DALoad,
    AALoad,
    BALoad,
    CALoad,
    SALoad,
    IStore(u16), // covers `istore`, `istore_<n>`, and `wide istore`
    LStore(u16),
    FStore(u16),
    DStore(u16),
    AStore(u16),
    IAStore,
    LAStore,
    FAStore,
    DAStore,
    AAStore,
    BAStore,
    CAStore,
    SAStore,
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    IAdd,
    LAdd,
    FAdd,
    DAdd,
    ISub,
    LSub,
    FSub,
    DSub,
    IMul,
    LMul,
    FMul,
    DMul,
    IDiv,
    LDiv,
    FDiv,
    DDiv,
    IRem,
    LRem,
    FRem,
    DRem,
    INeg,
    LNeg,
    FNeg,
    DNeg,
    ISh(ShiftType), // covers `ishr`, `ishl`, and `iushr`
    LSh(ShiftType), // covers `lshr`, `lshl`, and `lushr`
    IAnd,
    LAnd,
    IOr,
    LOr,
    IXor,
    LXor,
    IInc(u16, i16), // covers `iinc` and `wide iinc`
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,
    LCmp,
    FCmp(CompareMode), // covers `fcmpl` and `fcmpg`
    DCmp(CompareMode), // covers `dcmpl` and `dcmpg`
    If(OrdComparison, i32), // covers `ifeq`, `ifne`, `iflt`, `ifge`, `ifgt`, `ifle`
    IfICmp(OrdComparison, i32), // covers `if_icmpeq`, `if_icmpne`, ... `if_icmple`
    IfACmp(EqComparison, i32), // covers `if_acmpeq`, `if_acmpne`
    IfNull(EqComparison, i32), // `ifnull` for `EQ` and `ifnonnull` for `NE`
    Goto(i32), // `goto`, or `goto_w` if the jump turns out to be too far
    GotoW(i32),
    Jsr(i32),
    JsrW(i32),
    Ret(u16),
    TableSwitch {
        /// Jump target if the argument is less than `low` or greater than
        /// `low + targets.len() - 1`
        default: i32,

        /// Value associated with the first jump target
        low: i32,

        /// Jump targets
        targets: Vec<i32>,
    },
    LookupSwitch {
        /// Jump target if the argument doesn't match any key
        default: i32,

        /// Keys and their jump targets (in any order, but the keys must be distinct)
        pairs: Vec<(i32, i32)>,
    },
    IReturn,
    LReturn,
    FReturn,
    DReturn,
    AReturn,
    Return,
    GetStatic(MemberRef),
    PutStatic(MemberRef),
    GetField(MemberRef),
    PutField(MemberRef),
    Invoke(InvokeType, MemberRef),
    InvokeDynamic {
        /// Index into the `BootstrapMethods` attribute
        bootstrap_method: u16,
        name_and_type: NameAndType,
    },
    New(String),
    NewArray(BaseType),
    ANewArray(String),
    ArrayLength,
    AThrow,
    CheckCast(String),
    InstanceOf(String),
    MonitorEnter,
    MonitorExit,
    MultiANewArray(String, u8),

    /// Push an `int` using `iconst_<i>`, `bipush`, `sipush`, or `ldc`
    PushInt(i32),

    /// Push a `long` using `lconst_<l>` or `ldc2_w`
    PushLong(i64),

    /// Push a `float` using `fconst_<f>` or `ldc`
    PushFloat(f32),

    /// Push a `double` using `dconst_<d>` or `ldc2_w`
    PushDouble(f64),

    /// Push a loadable constant using `ldc`, `ldc_w`, or `ldc2_w`
    PushConstant(PoolEntry),
}

impl Instruction {
    /// Conditional branch shape and displacement, if this is a conditional branch
    pub fn conditional(&self) -> Option<(Conditional, i32)> {
        match self {
            Instruction::If(comp, rel) => Some((Conditional::If(*comp), *rel)),
            Instruction::IfICmp(comp, rel) => Some((Conditional::IfICmp(*comp), *rel)),
            Instruction::IfACmp(comp, rel) => Some((Conditional::IfACmp(*comp), *rel)),
            Instruction::IfNull(comp, rel) => Some((Conditional::IfNull(*comp), *rel)),
            _ => None,
        }
    }

    pub fn is_conditional_branch(&self) -> bool {
        self.conditional().is_some()
    }

    /// All of the displacements (in instructions) this instruction may jump by
    ///
    /// This excludes falling through to the next instruction.
    pub fn jump_displacements(&self) -> Vec<i32> {
        match self {
            Instruction::If(_, rel)
            | Instruction::IfICmp(_, rel)
            | Instruction::IfACmp(_, rel)
            | Instruction::IfNull(_, rel)
            | Instruction::Goto(rel)
            | Instruction::GotoW(rel)
            | Instruction::Jsr(rel)
            | Instruction::JsrW(rel) => vec![*rel],
            Instruction::TableSwitch {
                default, targets, ..
            } => std::iter::once(*default)
                .chain(targets.iter().copied())
                .collect(),
            Instruction::LookupSwitch { default, pairs } => std::iter::once(*default)
                .chain(pairs.iter().map(|(_, rel)| *rel))
                .collect(),
            _ => vec![],
        }
    }

    /// Can control continue on to the next instruction?
    pub fn falls_through(&self) -> bool {
        !matches!(
            self,
            Instruction::Goto(_)
                | Instruction::GotoW(_)
                | Instruction::Ret(_)
                | Instruction::TableSwitch { .. }
                | Instruction::LookupSwitch { .. }
                | Instruction::IReturn
                | Instruction::LReturn
                | Instruction::FReturn
                | Instruction::DReturn
                | Instruction::AReturn
                | Instruction::Return
                | Instruction::AThrow
        )
    }
}

/// Conditional branch kinds, without their targets
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum Conditional {
    If(OrdComparison),
    IfICmp(OrdComparison),
    IfACmp(EqComparison),
    IfNull(EqComparison),
}

impl Conditional {
    pub fn opcode(self) -> u8 {
        match self {
            Conditional::If(OrdComparison::EQ) => 0x99,
            Conditional::If(OrdComparison::NE) => 0x9a,
            Conditional::If(OrdComparison::LT) => 0x9b,
            Conditional::If(OrdComparison::GE) => 0x9c,
            Conditional::If(OrdComparison::GT) => 0x9d,
            Conditional::If(OrdComparison::LE) => 0x9e,
            Conditional::IfICmp(OrdComparison::EQ) => 0x9f,
            Conditional::IfICmp(OrdComparison::NE) => 0xa0,
            Conditional::IfICmp(OrdComparison::LT) => 0xa1,
            Conditional::IfICmp(OrdComparison::GE) => 0xa2,
            Conditional::IfICmp(OrdComparison::GT) => 0xa3,
            Conditional::IfICmp(OrdComparison::LE) => 0xa4,
            Conditional::IfACmp(EqComparison::EQ) => 0xa5,
            Conditional::IfACmp(EqComparison::NE) => 0xa6,
            Conditional::IfNull(EqComparison::EQ) => 0xc6,
            Conditional::IfNull(EqComparison::NE) => 0xc7,
        }
    }
}

/// Branch on the opposite condition
impl Not for Conditional {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            Conditional::If(comp) => Conditional::If(!comp),
            Conditional::IfICmp(comp) => Conditional::IfICmp(!comp),
            Conditional::IfACmp(comp) => Conditional::IfACmp(!comp),
            Conditional::IfNull(comp) => Conditional::IfNull(!comp),
        }
    }
}

/// Possible bit shifts
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ShiftType {
    Left,
    LogicalRight,
    ArithmeticRight,
}

/// Comparison modes for floating point
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum CompareMode {
    /// -1 on NaN
    L,

    /// 1 on NaN
    G,
}

/// Binary comparison operators available for `int` branches
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum OrdComparison {
    EQ,
    GE,
    GT,
    LE,
    LT,
    NE,
}

impl Not for OrdComparison {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            OrdComparison::EQ => OrdComparison::NE,
            OrdComparison::GE => OrdComparison::LT,
            OrdComparison::GT => OrdComparison::LE,
            OrdComparison::LE => OrdComparison::GT,
            OrdComparison::LT => OrdComparison::GE,
            OrdComparison::NE => OrdComparison::EQ,
        }
    }
}

/// Equality/inequality comparison operators
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum EqComparison {
    EQ,
    NE,
}

impl Not for EqComparison {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            EqComparison::EQ => EqComparison::NE,
            EqComparison::NE => EqComparison::EQ,
        }
    }
}

/// Type of method to invoke
///
/// Note: `InvokeDynamic` is kept separate because the constant argument it expects is not to a
/// `Constant::MethodRef`.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum InvokeType {
    Virtual,
    Special,
    Static,
    Interface(u8), // `count` is of total arguments, where `long`/`double` count for 2
}

/// Primitive element types for `newarray`
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum BaseType {
    Boolean,
    Char,
    Float,
    Double,
    Byte,
    Short,
    Int,
    Long,
}

impl BaseType {
    /// The `atype` operand of `newarray`
    pub fn array_type_code(self) -> u8 {
        match self {
            BaseType::Boolean => 4,
            BaseType::Char => 5,
            BaseType::Float => 6,
            BaseType::Double => 7,
            BaseType::Byte => 8,
            BaseType::Short => 9,
            BaseType::Int => 10,
            BaseType::Long => 11,
        }
    }
}

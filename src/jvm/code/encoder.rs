//! Turn instructions into bytes, leaving holes for jump displacements
//!
//! Encoding is a single forward pass. Every instruction gets the narrowest encoding that is
//! correct for its operands, and any constants it refers to are pushed into the pool on the way.
//! The one thing that cannot be decided in this pass is the size of forward jumps, since the
//! bytes between the jump and its target haven't been produced yet. Those jumps are emitted in
//! their short form and recorded as [`PatchPoint`]s for [`resolve_jumps`] to fix up.
//!
//! [`resolve_jumps`]: crate::jvm::code::resolve_jumps

use crate::jvm::class_file::{ConstantsPool, PoolEntry, Serialize};
use crate::jvm::code::{CompareMode, Conditional, Instruction, InvokeType, ShiftType};
use crate::jvm::Error;

/// How many bytes a jump displacement takes
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JumpWidth {
    /// Signed 16-bit displacement
    Narrow,

    /// Signed 32-bit displacement
    Wide,
}

/// What sort of instruction owns a jump displacement
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JumpKind {
    Goto,
    Jsr,
    Conditional(Conditional),

    /// One of the 32-bit fields of a `tableswitch` or `lookupswitch`
    Switch,
}

/// Jump displacement that gets written once all offsets are final
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatchPoint {
    /// Index of the instruction that jumps
    pub instruction: usize,

    /// Index of the instruction jumped to (may be one past the last instruction)
    pub target: usize,

    /// Byte offset of the displacement field
    pub field_offset: usize,

    pub width: JumpWidth,

    /// Conditional branch which got rewritten into `if<!cond> +8; goto_w target`
    ///
    /// The displacement then belongs to the `goto_w`, three bytes after the start of the
    /// instruction.
    pub long_if: bool,

    pub kind: JumpKind,
}

impl PatchPoint {
    /// Byte offset that the displacement is relative to
    pub fn relative_point(&self, offsets: &[usize]) -> usize {
        let start = offsets[self.instruction];
        if self.long_if {
            start + 3
        } else {
            start
        }
    }

    /// Displacement to write into the field, given the current offsets
    pub fn displacement(&self, offsets: &[usize]) -> i64 {
        offsets[self.target] as i64 - self.relative_point(offsets) as i64
    }
}

/// Padding of a switch, which has to be redone if the switch moves
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwitchLayout {
    pub instruction: usize,

    /// Number of zero bytes after the opcode (0 to 3)
    pub padding: usize,
}

/// Output of [`encode`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedCode {
    pub bytes: Vec<u8>,

    /// Byte offset of every instruction, followed by the total length
    pub offsets: Vec<usize>,

    /// Every jump displacement, in instruction order
    pub patches: Vec<PatchPoint>,

    pub switches: Vec<SwitchLayout>,
}

/// Zero bytes needed after a switch opcode at `start` to align its first field
pub fn switch_padding(start: usize) -> usize {
    (4 - (start + 1) % 4) % 4
}

const MAX_INSTRUCTIONS: usize = u16::MAX as usize;

/// Encode instructions, pushing the constants they use into the pool
pub fn encode(
    instructions: &[Instruction],
    constants: &mut ConstantsPool,
) -> Result<EncodedCode, Error> {
    if instructions.len() > MAX_INSTRUCTIONS {
        return Err(Error::MethodCodeOverflow(instructions.len()));
    }

    let mut encoder = Encoder {
        constants,
        instruction_count: instructions.len(),
        code: EncodedCode {
            bytes: vec![],
            offsets: Vec::with_capacity(instructions.len() + 1),
            patches: vec![],
            switches: vec![],
        },
    };
    for (index, instruction) in instructions.iter().enumerate() {
        let start = encoder.code.bytes.len();
        encoder.code.offsets.push(start);
        encoder.instruction(index, instruction)?;
    }
    encoder.code.offsets.push(encoder.code.bytes.len());

    let code = encoder.code;
    if code.bytes.len() > u16::MAX as usize {
        return Err(Error::MethodCodeOverflow(code.bytes.len()));
    }
    Ok(code)
}

struct Encoder<'a> {
    constants: &'a mut ConstantsPool,
    instruction_count: usize,
    code: EncodedCode,
}

impl<'a> Encoder<'a> {
    fn emit<S: Serialize>(&mut self, value: S) -> Result<(), Error> {
        value
            .serialize(&mut self.code.bytes)
            .map_err(Error::IoError)
    }

    fn position(&self) -> usize {
        self.code.bytes.len()
    }

    /// Validate a jump and return the index it lands on
    fn jump_target(&self, index: usize, displacement: i32) -> Result<usize, Error> {
        let target = index as i64 + displacement as i64;
        if target < 0 || target > self.instruction_count as i64 {
            return Err(Error::InvalidJumpTarget {
                instruction: index,
                displacement: displacement as i64,
            });
        }
        Ok(target as usize)
    }

    /// Emit a zeroed displacement field and record it
    fn placeholder(
        &mut self,
        index: usize,
        target: usize,
        width: JumpWidth,
        kind: JumpKind,
    ) -> Result<(), Error> {
        let field_offset = self.position();
        match width {
            JumpWidth::Narrow => self.emit(0i16)?,
            JumpWidth::Wide => self.emit(0i32)?,
        }
        self.code.patches.push(PatchPoint {
            instruction: index,
            target,
            field_offset,
            width,
            long_if: false,
            kind,
        });
        Ok(())
    }

    /// `goto` and `jsr`, which have 16 and 32-bit forms
    fn unconditional_jump(
        &mut self,
        index: usize,
        displacement: i32,
        kind: JumpKind,
        force_wide: bool,
    ) -> Result<(), Error> {
        let target = self.jump_target(index, displacement)?;
        let (narrow_opcode, wide_opcode): (u8, u8) = match kind {
            JumpKind::Jsr => (0xa8, 0xc9),
            _ => (0xa7, 0xc8),
        };

        // Backward targets are already placed, so the width is known exactly
        let wide = force_wide
            || (target <= index && {
                let movement = self.code.offsets[target] as i64 - self.position() as i64;
                i16::try_from(movement).is_err()
            });

        if wide {
            self.emit(wide_opcode)?;
            self.placeholder(index, target, JumpWidth::Wide, kind)
        } else {
            self.emit(narrow_opcode)?;
            self.placeholder(index, target, JumpWidth::Narrow, kind)
        }
    }

    fn constant_index(&mut self, entry: PoolEntry) -> Result<u16, Error> {
        Ok(self.constants.push(entry)?.0)
    }

    /// Load a single-width constant with `ldc` or `ldc_w`, or a double-width one with `ldc2_w`
    fn load_constant(&mut self, entry: PoolEntry) -> Result<(), Error> {
        let is_wide = entry.is_wide();
        let index = self.constant_index(entry)?;
        if is_wide {
            self.emit(0x14u8)?;
            self.emit(index)
        } else if let Ok(index) = u8::try_from(index) {
            self.emit(0x12u8)?;
            self.emit(index)
        } else {
            self.emit(0x13u8)?;
            self.emit(index)
        }
    }

    /// Local variable instruction with `<op>_<n>` forms (`short_opcode` is `<op>_0`)
    fn local_variable(
        &mut self,
        opcode: u8,
        short_opcode: Option<u8>,
        index: u16,
    ) -> Result<(), Error> {
        match (short_opcode, u8::try_from(index)) {
            (Some(short_opcode), _) if index <= 3 => self.emit(short_opcode + index as u8),
            (_, Ok(index)) => {
                self.emit(opcode)?;
                self.emit(index)
            }
            (_, Err(_)) => {
                self.emit(0xc4u8)?;
                self.emit(opcode)?;
                self.emit(index)
            }
        }
    }

    fn instruction(&mut self, index: usize, instruction: &Instruction) -> Result<(), Error> {
        use Instruction::*;

        match instruction {
            Nop => self.emit(0x00u8),
            AConstNull => self.emit(0x01u8),
            IConstM1 => self.emit(0x02u8),
            IConst0 => self.emit(0x03u8),
            IConst1 => self.emit(0x04u8),
            IConst2 => self.emit(0x05u8),
            IConst3 => self.emit(0x06u8),
            IConst4 => self.emit(0x07u8),
            IConst5 => self.emit(0x08u8),
            LConst0 => self.emit(0x09u8),
            LConst1 => self.emit(0x0au8),
            FConst0 => self.emit(0x0bu8),
            FConst1 => self.emit(0x0cu8),
            FConst2 => self.emit(0x0du8),
            DConst0 => self.emit(0x0eu8),
            DConst1 => self.emit(0x0fu8),
            IALoad => self.emit(0x2eu8),
            LALoad => self.emit(0x2fu8),
            FALoad => self.emit(0x30u8),
            DALoad => self.emit(0x31u8),
            AALoad => self.emit(0x32u8),
            BALoad => self.emit(0x33u8),
            CALoad => self.emit(0x34u8),
            SALoad => self.emit(0x35u8),
            IAStore => self.emit(0x4fu8),
            LAStore => self.emit(0x50u8),
            FAStore => self.emit(0x51u8),
            DAStore => self.emit(0x52u8),
            AAStore => self.emit(0x53u8),
            BAStore => self.emit(0x54u8),
            CAStore => self.emit(0x55u8),
            SAStore => self.emit(0x56u8),
            Pop => self.emit(0x57u8),
            Pop2 => self.emit(0x58u8),
            Dup => self.emit(0x59u8),
            DupX1 => self.emit(0x5au8),
            DupX2 => self.emit(0x5bu8),
            Dup2 => self.emit(0x5cu8),
            Dup2X1 => self.emit(0x5du8),
            Dup2X2 => self.emit(0x5eu8),
            Swap => self.emit(0x5fu8),
            IAdd => self.emit(0x60u8),
            LAdd => self.emit(0x61u8),
            FAdd => self.emit(0x62u8),
            DAdd => self.emit(0x63u8),
            ISub => self.emit(0x64u8),
            LSub => self.emit(0x65u8),
            FSub => self.emit(0x66u8),
            DSub => self.emit(0x67u8),
            IMul => self.emit(0x68u8),
            LMul => self.emit(0x69u8),
            FMul => self.emit(0x6au8),
            DMul => self.emit(0x6bu8),
            IDiv => self.emit(0x6cu8),
            LDiv => self.emit(0x6du8),
            FDiv => self.emit(0x6eu8),
            DDiv => self.emit(0x6fu8),
            IRem => self.emit(0x70u8),
            LRem => self.emit(0x71u8),
            FRem => self.emit(0x72u8),
            DRem => self.emit(0x73u8),
            INeg => self.emit(0x74u8),
            LNeg => self.emit(0x75u8),
            FNeg => self.emit(0x76u8),
            DNeg => self.emit(0x77u8),
            ISh(ShiftType::Left) => self.emit(0x78u8),
            LSh(ShiftType::Left) => self.emit(0x79u8),
            ISh(ShiftType::ArithmeticRight) => self.emit(0x7au8),
            LSh(ShiftType::ArithmeticRight) => self.emit(0x7bu8),
            ISh(ShiftType::LogicalRight) => self.emit(0x7cu8),
            LSh(ShiftType::LogicalRight) => self.emit(0x7du8),
            IAnd => self.emit(0x7eu8),
            LAnd => self.emit(0x7fu8),
            IOr => self.emit(0x80u8),
            LOr => self.emit(0x81u8),
            IXor => self.emit(0x82u8),
            LXor => self.emit(0x83u8),
            I2L => self.emit(0x85u8),
            I2F => self.emit(0x86u8),
            I2D => self.emit(0x87u8),
            L2I => self.emit(0x88u8),
            L2F => self.emit(0x89u8),
            L2D => self.emit(0x8au8),
            F2I => self.emit(0x8bu8),
            F2L => self.emit(0x8cu8),
            F2D => self.emit(0x8du8),
            D2I => self.emit(0x8eu8),
            D2L => self.emit(0x8fu8),
            D2F => self.emit(0x90u8),
            I2B => self.emit(0x91u8),
            I2C => self.emit(0x92u8),
            I2S => self.emit(0x93u8),
            LCmp => self.emit(0x94u8),
            FCmp(CompareMode::L) => self.emit(0x95u8),
            FCmp(CompareMode::G) => self.emit(0x96u8),
            DCmp(CompareMode::L) => self.emit(0x97u8),
            DCmp(CompareMode::G) => self.emit(0x98u8),
            IReturn => self.emit(0xacu8),
            LReturn => self.emit(0xadu8),
            FReturn => self.emit(0xaeu8),
            DReturn => self.emit(0xafu8),
            AReturn => self.emit(0xb0u8),
            Return => self.emit(0xb1u8),
            ArrayLength => self.emit(0xbeu8),
            AThrow => self.emit(0xbfu8),
            MonitorEnter => self.emit(0xc2u8),
            MonitorExit => self.emit(0xc3u8),

            BiPush(byte) => {
                self.emit(0x10u8)?;
                self.emit(*byte)
            }
            SiPush(short) => {
                self.emit(0x11u8)?;
                self.emit(*short)
            }
            Ldc(constant) => {
                self.emit(0x12u8)?;
                self.emit(*constant)
            }
            LdcW(constant) => {
                self.emit(0x13u8)?;
                self.emit(*constant)
            }
            Ldc2W(constant) => {
                self.emit(0x14u8)?;
                self.emit(*constant)
            }

            If(comparison, displacement) => {
                self.conditional_branch(index, Conditional::If(*comparison), *displacement)
            }
            IfICmp(comparison, displacement) => {
                self.conditional_branch(index, Conditional::IfICmp(*comparison), *displacement)
            }
            IfACmp(comparison, displacement) => {
                self.conditional_branch(index, Conditional::IfACmp(*comparison), *displacement)
            }
            IfNull(comparison, displacement) => {
                self.conditional_branch(index, Conditional::IfNull(*comparison), *displacement)
            }

            ILoad(var) => self.local_variable(0x15, Some(0x1a), *var),
            LLoad(var) => self.local_variable(0x16, Some(0x1e), *var),
            FLoad(var) => self.local_variable(0x17, Some(0x22), *var),
            DLoad(var) => self.local_variable(0x18, Some(0x26), *var),
            ALoad(var) => self.local_variable(0x19, Some(0x2a), *var),
            IStore(var) => self.local_variable(0x36, Some(0x3b), *var),
            LStore(var) => self.local_variable(0x37, Some(0x3f), *var),
            FStore(var) => self.local_variable(0x38, Some(0x43), *var),
            DStore(var) => self.local_variable(0x39, Some(0x47), *var),
            AStore(var) => self.local_variable(0x3a, Some(0x4b), *var),
            Ret(var) => self.local_variable(0xa9, None, *var),

            IInc(var, increment) => match (u8::try_from(*var), i8::try_from(*increment)) {
                (Ok(var), Ok(increment)) => {
                    self.emit(0x84u8)?;
                    self.emit(var)?;
                    self.emit(increment)
                }
                _ => {
                    self.emit(0xc4u8)?;
                    self.emit(0x84u8)?;
                    self.emit(*var)?;
                    self.emit(*increment)
                }
            },

            Goto(displacement) => {
                self.unconditional_jump(index, *displacement, JumpKind::Goto, false)
            }
            GotoW(displacement) => {
                self.unconditional_jump(index, *displacement, JumpKind::Goto, true)
            }
            Jsr(displacement) => {
                self.unconditional_jump(index, *displacement, JumpKind::Jsr, false)
            }
            JsrW(displacement) => {
                self.unconditional_jump(index, *displacement, JumpKind::Jsr, true)
            }

            TableSwitch {
                default,
                low,
                targets,
            } => {
                if targets.is_empty() {
                    return Err(Error::MalformedInstruction {
                        instruction: index,
                        reason: "tableswitch without any targets",
                    });
                }
                let high = i32::try_from(*low as i64 + targets.len() as i64 - 1).map_err(|_| {
                    Error::MalformedInstruction {
                        instruction: index,
                        reason: "tableswitch range overflows an int",
                    }
                })?;

                self.switch_header(index, 0xaa)?;
                let default = self.jump_target(index, *default)?;
                self.placeholder(index, default, JumpWidth::Wide, JumpKind::Switch)?;
                self.emit(*low)?;
                self.emit(high)?;
                for displacement in targets {
                    let target = self.jump_target(index, *displacement)?;
                    self.placeholder(index, target, JumpWidth::Wide, JumpKind::Switch)?;
                }
                Ok(())
            }

            LookupSwitch { default, pairs } => {
                let mut pairs = pairs.clone();
                pairs.sort_by_key(|(key, _)| *key);
                if pairs.windows(2).any(|pair| pair[0].0 == pair[1].0) {
                    return Err(Error::MalformedInstruction {
                        instruction: index,
                        reason: "lookupswitch has duplicate keys",
                    });
                }

                self.switch_header(index, 0xab)?;
                let default = self.jump_target(index, *default)?;
                self.placeholder(index, default, JumpWidth::Wide, JumpKind::Switch)?;
                self.emit(pairs.len() as i32)?;
                for (key, displacement) in pairs {
                    let target = self.jump_target(index, displacement)?;
                    self.emit(key)?;
                    self.placeholder(index, target, JumpWidth::Wide, JumpKind::Switch)?;
                }
                Ok(())
            }

            GetStatic(field) | PutStatic(field) | GetField(field) | PutField(field) => {
                let opcode: u8 = match instruction {
                    GetStatic(_) => 0xb2,
                    PutStatic(_) => 0xb3,
                    GetField(_) => 0xb4,
                    _ => 0xb5,
                };
                let field = self.constant_index(PoolEntry::FieldRef(field.clone()))?;
                self.emit(opcode)?;
                self.emit(field)
            }

            Invoke(invoke_type, method) => {
                let (opcode, entry): (u8, PoolEntry) = match invoke_type {
                    InvokeType::Virtual => (0xb6, PoolEntry::MethodRef(method.clone())),
                    InvokeType::Special => (0xb7, PoolEntry::MethodRef(method.clone())),
                    InvokeType::Static => (0xb8, PoolEntry::MethodRef(method.clone())),
                    InvokeType::Interface(_) => {
                        (0xb9, PoolEntry::InterfaceMethodRef(method.clone()))
                    }
                };
                let method = self.constant_index(entry)?;
                self.emit(opcode)?;
                self.emit(method)?;
                if let InvokeType::Interface(count) = invoke_type {
                    self.emit(*count)?;
                    self.emit(0u8)?;
                }
                Ok(())
            }

            InvokeDynamic {
                bootstrap_method,
                name_and_type,
            } => {
                let call_site = self.constant_index(PoolEntry::InvokeDynamic {
                    bootstrap_method: *bootstrap_method,
                    name_and_type: name_and_type.clone(),
                })?;
                self.emit(0xbau8)?;
                self.emit(call_site)?;
                self.emit(0u16)
            }

            New(class) | ANewArray(class) | CheckCast(class) | InstanceOf(class) => {
                let opcode: u8 = match instruction {
                    New(_) => 0xbb,
                    ANewArray(_) => 0xbd,
                    CheckCast(_) => 0xc0,
                    _ => 0xc1,
                };
                let class = self.constant_index(PoolEntry::Class(class.clone()))?;
                self.emit(opcode)?;
                self.emit(class)
            }

            NewArray(base_type) => {
                self.emit(0xbcu8)?;
                self.emit(base_type.array_type_code())
            }

            MultiANewArray(class, dimensions) => {
                let class = self.constant_index(PoolEntry::Class(class.clone()))?;
                self.emit(0xc5u8)?;
                self.emit(class)?;
                self.emit(*dimensions)
            }

            PushInt(integer) => match *integer {
                -1..=5 => self.emit((0x03 + *integer) as u8),
                integer => {
                    if let Ok(byte) = i8::try_from(integer) {
                        self.emit(0x10u8)?;
                        self.emit(byte)
                    } else if let Ok(short) = i16::try_from(integer) {
                        self.emit(0x11u8)?;
                        self.emit(short)
                    } else {
                        self.load_constant(PoolEntry::Integer(integer))
                    }
                }
            },

            PushLong(long) => match *long {
                0 => self.emit(0x09u8),
                1 => self.emit(0x0au8),
                long => self.load_constant(PoolEntry::Long(long)),
            },

            // Compare bits so that `-0.0` goes through the pool
            PushFloat(float) => match float.to_bits() {
                bits if bits == 0.0f32.to_bits() => self.emit(0x0bu8),
                bits if bits == 1.0f32.to_bits() => self.emit(0x0cu8),
                bits if bits == 2.0f32.to_bits() => self.emit(0x0du8),
                _ => self.load_constant(PoolEntry::Float(*float)),
            },

            PushDouble(double) => match double.to_bits() {
                bits if bits == 0.0f64.to_bits() => self.emit(0x0eu8),
                bits if bits == 1.0f64.to_bits() => self.emit(0x0fu8),
                _ => self.load_constant(PoolEntry::Double(*double)),
            },

            PushConstant(entry) => match entry {
                PoolEntry::Integer(_)
                | PoolEntry::Float(_)
                | PoolEntry::Long(_)
                | PoolEntry::Double(_)
                | PoolEntry::Class(_)
                | PoolEntry::String(_)
                | PoolEntry::MethodHandle(..)
                | PoolEntry::MethodType(_) => self.load_constant(entry.clone()),
                _ => Err(Error::MalformedInstruction {
                    instruction: index,
                    reason: "constant cannot be loaded with ldc",
                }),
            },
        }
    }

    /// Conditional branches only have a 16-bit form
    fn conditional_branch(
        &mut self,
        index: usize,
        conditional: Conditional,
        displacement: i32,
    ) -> Result<(), Error> {
        let target = self.jump_target(index, displacement)?;
        self.emit(conditional.opcode())?;
        self.placeholder(
            index,
            target,
            JumpWidth::Narrow,
            JumpKind::Conditional(conditional),
        )
    }

    /// Switch opcode and alignment padding
    fn switch_header(&mut self, index: usize, opcode: u8) -> Result<(), Error> {
        let padding = switch_padding(self.position());
        self.emit(opcode)?;
        for _ in 0..padding {
            self.emit(0u8)?;
        }
        self.code.switches.push(SwitchLayout {
            instruction: index,
            padding,
        });
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::{ConstantIndex, MemberRef};
    use crate::jvm::code::{EqComparison, OrdComparison};

    fn encoded(instructions: Vec<Instruction>) -> (EncodedCode, ConstantsPool) {
        let mut constants = ConstantsPool::new();
        let code = encode(&instructions, &mut constants).unwrap();
        (code, constants)
    }

    #[test]
    fn smallest_int_pushes() {
        let (code, constants) = encoded(vec![
            Instruction::PushInt(-1),
            Instruction::PushInt(5),
            Instruction::PushInt(-128),
            Instruction::PushInt(300),
            Instruction::PushInt(70000),
        ]);
        assert_eq!(
            code.bytes,
            vec![0x02, 0x08, 0x10, 0x80, 0x11, 0x01, 0x2C, 0x12, 0x01]
        );
        assert_eq!(code.offsets, vec![0, 1, 2, 4, 7, 9]);
        assert_eq!(
            constants.get(ConstantIndex(1)),
            Some(&PoolEntry::Integer(70000))
        );
    }

    #[test]
    fn int_push_boundaries() {
        let cases: [(i32, &[u8]); 10] = [
            (6, &[0x10, 0x06]),
            (127, &[0x10, 0x7f]),
            (128, &[0x11, 0x00, 0x80]),
            (-128, &[0x10, 0x80]),
            (-129, &[0x11, 0xff, 0x7f]),
            (32767, &[0x11, 0x7f, 0xff]),
            (-32768, &[0x11, 0x80, 0x00]),
            (32768, &[0x12, 0x01]),
            (-32769, &[0x12, 0x01]),
            (-2, &[0x10, 0xfe]),
        ];
        for (integer, bytes) in cases {
            let (code, constants) = encoded(vec![Instruction::PushInt(integer)]);
            assert_eq!(code.bytes, bytes, "pushing {}", integer);
            let expected_pool = if bytes[0] == 0x12 { 1 } else { 0 };
            assert_eq!(constants.len(), expected_pool, "pushing {}", integer);
        }
    }

    #[test]
    fn one_byte_instructions() {
        let (code, constants) = encoded(vec![
            Instruction::IAdd,
            Instruction::ISh(ShiftType::LogicalRight),
            Instruction::LSh(ShiftType::Left),
            Instruction::FCmp(CompareMode::G),
            Instruction::DCmp(CompareMode::L),
            Instruction::AThrow,
        ]);
        assert_eq!(code.bytes, vec![0x60, 0x7c, 0x79, 0x96, 0x97, 0xbf]);
        assert!(code.patches.is_empty());
        assert!(constants.is_empty());
    }

    #[test]
    fn float_and_wide_literals() {
        let (code, constants) = encoded(vec![
            Instruction::PushFloat(2.0),
            Instruction::PushFloat(-0.0),
            Instruction::PushLong(1),
            Instruction::PushLong(7),
            Instruction::PushDouble(0.0),
            Instruction::PushDouble(0.25),
        ]);
        assert_eq!(
            code.bytes,
            vec![0x0d, 0x12, 0x01, 0x0a, 0x14, 0x00, 0x02, 0x0e, 0x14, 0x00, 0x04]
        );
        assert_eq!(constants.size(), 6);
    }

    #[test]
    fn ldc_w_past_index_255() {
        let mut constants = ConstantsPool::new();
        for i in 0..300 {
            constants.push(PoolEntry::Integer(i)).unwrap();
        }
        let code = encode(
            &[Instruction::PushConstant(PoolEntry::String(String::from("s")))],
            &mut constants,
        )
        .unwrap();
        assert_eq!(code.bytes, vec![0x13, 0x01, 0x2D]);
    }

    #[test]
    fn unloadable_constant() {
        let mut constants = ConstantsPool::new();
        let result = encode(
            &[Instruction::PushConstant(PoolEntry::Utf8(String::from("s")))],
            &mut constants,
        );
        assert!(matches!(
            result,
            Err(Error::MalformedInstruction { instruction: 0, .. })
        ));
    }

    #[test]
    fn local_variable_forms() {
        let (code, _) = encoded(vec![
            Instruction::ILoad(2),
            Instruction::AStore(3),
            Instruction::DStore(200),
            Instruction::LLoad(256),
            Instruction::IInc(3, 127),
            Instruction::IInc(3, 128),
            Instruction::Ret(5),
        ]);
        assert_eq!(
            code.bytes,
            vec![
                0x1c, // iload_2
                0x4e, // astore_3
                0x39, 0xC8, // dstore 200
                0xc4, 0x16, 0x01, 0x00, // wide lload 256
                0x84, 0x03, 0x7f, // iinc 3 127
                0xc4, 0x84, 0x00, 0x03, 0x00, 0x80, // wide iinc 3 128
                0xa9, 0x05, // ret 5
            ]
        );
    }

    #[test]
    fn forward_goto_is_narrow_placeholder() {
        let (code, _) = encoded(vec![Instruction::Goto(1), Instruction::Return]);
        assert_eq!(code.bytes, vec![0xa7, 0x00, 0x00, 0xb1]);
        assert_eq!(
            code.patches,
            vec![PatchPoint {
                instruction: 0,
                target: 1,
                field_offset: 1,
                width: JumpWidth::Narrow,
                long_if: false,
                kind: JumpKind::Goto,
            }]
        );
        assert_eq!(code.patches[0].displacement(&code.offsets), 3);
    }

    #[test]
    fn far_backward_goto_is_wide() {
        let mut instructions = vec![Instruction::Nop; 40000];
        instructions.push(Instruction::Goto(-40000));
        instructions.push(Instruction::Goto(-1));
        let (code, _) = encoded(instructions);
        assert_eq!(code.bytes[40000], 0xc8);
        assert_eq!(code.patches[0].width, JumpWidth::Wide);
        assert_eq!(code.bytes[40005], 0xa7);
        assert_eq!(code.patches[1].width, JumpWidth::Narrow);
        assert_eq!(code.offsets[40002], 40008);
    }

    #[test]
    fn conditionals_are_narrow() {
        let (code, _) = encoded(vec![
            Instruction::IfNull(EqComparison::NE, 2),
            Instruction::IfICmp(OrdComparison::GE, 0),
            Instruction::Return,
        ]);
        assert_eq!(code.bytes, vec![0xc7, 0, 0, 0xa2, 0, 0, 0xb1]);
        assert!(code.patches.iter().all(|patch| patch.width == JumpWidth::Narrow));
        assert_eq!(code.patches[1].displacement(&code.offsets), 0);
    }

    #[test]
    fn jump_out_of_method() {
        let mut constants = ConstantsPool::new();
        let result = encode(&[Instruction::Goto(5), Instruction::Return], &mut constants);
        assert!(matches!(
            result,
            Err(Error::InvalidJumpTarget {
                instruction: 0,
                displacement: 5
            })
        ));
        let result = encode(&[Instruction::If(OrdComparison::EQ, -1)], &mut constants);
        assert!(matches!(result, Err(Error::InvalidJumpTarget { .. })));
    }

    #[test]
    fn tableswitch_alignment() {
        let (code, _) = encoded(vec![
            Instruction::Nop,
            Instruction::TableSwitch {
                default: 1,
                low: 0,
                targets: vec![1],
            },
            Instruction::Return,
        ]);
        assert_eq!(code.offsets, vec![0, 1, 20, 21]);
        assert_eq!(&code.bytes[1..4], &[0xaa, 0, 0]);
        assert_eq!(&code.bytes[8..16], &[0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(
            code.switches,
            vec![SwitchLayout {
                instruction: 1,
                padding: 2
            }]
        );
        let fields: Vec<usize> = code.patches.iter().map(|patch| patch.field_offset).collect();
        assert_eq!(fields, vec![4, 16]);
    }

    #[test]
    fn lookupswitch_keys_sorted() {
        let (code, _) = encoded(vec![
            Instruction::LookupSwitch {
                default: 1,
                pairs: vec![(9, 1), (-2, 1)],
            },
            Instruction::Return,
        ]);
        assert_eq!(
            code.bytes,
            vec![
                0xab, 0, 0, 0, // opcode and padding
                0, 0, 0, 0, // default
                0, 0, 0, 2, // npairs
                0xFF, 0xFF, 0xFF, 0xFE, 0, 0, 0, 0, // -2
                0, 0, 0, 9, 0, 0, 0, 0, // 9
                0xb1,
            ]
        );

        let mut constants = ConstantsPool::new();
        let duplicate = encode(
            &[
                Instruction::LookupSwitch {
                    default: 1,
                    pairs: vec![(3, 1), (3, 1)],
                },
                Instruction::Return,
            ],
            &mut constants,
        );
        assert!(matches!(
            duplicate,
            Err(Error::MalformedInstruction { instruction: 0, .. })
        ));
    }

    #[test]
    fn tableswitch_range_overflow() {
        let mut constants = ConstantsPool::new();
        let result = encode(
            &[
                Instruction::TableSwitch {
                    default: 1,
                    low: i32::MAX,
                    targets: vec![1, 1],
                },
                Instruction::Return,
            ],
            &mut constants,
        );
        assert!(matches!(result, Err(Error::MalformedInstruction { .. })));
    }

    #[test]
    fn member_references() {
        let (code, constants) = encoded(vec![
            Instruction::Invoke(
                InvokeType::Interface(2),
                MemberRef::new("java/util/List", "add", "(Ljava/lang/Object;)Z"),
            ),
            Instruction::GetStatic(MemberRef::new(
                "java/lang/System",
                "out",
                "Ljava/io/PrintStream;",
            )),
            Instruction::New(String::from("java/lang/Object")),
        ]);
        assert_eq!(
            code.bytes,
            vec![0xb9, 0x00, 0x01, 0x02, 0x00, 0xb2, 0x00, 0x02, 0xbb, 0x00, 0x03]
        );
        assert!(matches!(
            constants.get(ConstantIndex(1)),
            Some(PoolEntry::InterfaceMethodRef(_))
        ));
    }

    #[test]
    fn too_many_instructions() {
        let mut constants = ConstantsPool::new();
        let result = encode(&vec![Instruction::Nop; 65536], &mut constants);
        assert!(matches!(result, Err(Error::MethodCodeOverflow(65536))));
    }
}

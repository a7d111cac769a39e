//! Turn the frames of a method body into a `StackMapTable`
//!
//! Frames are supplied at instruction indices, but the table is keyed by byte offsets which are
//! only known once jumps have been resolved. Resolving can also introduce new frame positions:
//! a conditional branch that got rewritten into `ifnot* +8; goto_w` has a fall-through which is
//! now the target of the `ifnot*`. The frame there comes from `Code::fallthrough_frames`.

use crate::jvm::class_file::{ClassConstantIndex, ConstantsPool, StackMapFrame, StackMapTable};
use crate::jvm::code::{Code, EncodedCode, Instruction, Settings};
use crate::jvm::verifier::{Frame, VerificationType};
use crate::jvm::Error;
use std::collections::{BTreeMap, BTreeSet, HashMap};

type SymbolicFrame = Frame<String, usize>;

/// Build the stack map table of a method body, if it needs one
///
/// Returns `None` when the settings disable the table or there are no frames to encode.
pub fn build_stack_map_table(
    body: &Code,
    encoded: &EncodedCode,
    constants: &mut ConstantsPool,
    settings: &Settings,
) -> Result<Option<StackMapTable>, Error> {
    if !settings.emit_stack_map_table {
        return Ok(None);
    }

    let offsets = &encoded.offsets;
    let instruction_count = body.instructions.len();

    // Frames keyed by byte offset
    let mut placed: BTreeMap<usize, SymbolicFrame> = BTreeMap::new();
    for (instruction, frame) in &body.frames {
        place_frame(&mut placed, offsets, instruction_count, *instruction, frame)?;
    }
    for branch in encoded.widened_branches() {
        let fallthrough = branch + 1;
        match body.fallthrough_frames.get(&branch) {
            Some(frame) => {
                place_frame(&mut placed, offsets, instruction_count, fallthrough, frame)?
            }
            // The `ifnot*` of the rewritten branch always targets the fall-through
            None if !body.frames.contains_key(&fallthrough) => {
                return Err(Error::MissingFrame(fallthrough))
            }
            None => (),
        }
    }

    if settings.check_frames {
        let required: BTreeSet<usize> = encoded
            .patches
            .iter()
            .map(|patch| patch.target)
            .chain(body.exception_ranges.iter().map(|range| range.handler))
            .collect();
        for instruction in required {
            if !placed.contains_key(&offsets[instruction]) {
                return Err(Error::MissingFrame(instruction));
            }
        }
    }

    let mut lowering = FrameLowering {
        constants,
        classes: HashMap::new(),
        instructions: &body.instructions,
        offsets,
    };
    let mut previous_frame: SymbolicFrame =
        Frame::new(body.initial_locals.clone(), vec![]).normalized();
    let mut previous_offset: Option<usize> = None;
    let mut stack_map_frames: Vec<StackMapFrame> = Vec::with_capacity(placed.len());
    for (offset, frame) in placed {
        // The first frame is relative to the start of the code, later ones to the previous frame
        let offset_delta = match previous_offset {
            None => offset,
            Some(previous_offset) => offset - previous_offset - 1,
        };
        let offset_delta =
            u16::try_from(offset_delta).map_err(|_| Error::MethodCodeOverflow(offset))?;

        let stack_map_frame = frame.stack_map_frame(offset_delta, &previous_frame);
        stack_map_frames.push(stack_map_frame.try_map(|t| lowering.verification_type(t))?);

        previous_frame = frame;
        previous_offset = Some(offset);
    }

    log::trace!("built stack map table with {} frames", stack_map_frames.len());
    if stack_map_frames.is_empty() {
        Ok(None)
    } else {
        Ok(Some(StackMapTable(stack_map_frames)))
    }
}

/// Add a frame at the offset of an instruction, checking it agrees with any frame already there
fn place_frame(
    placed: &mut BTreeMap<usize, SymbolicFrame>,
    offsets: &[usize],
    instruction_count: usize,
    instruction: usize,
    frame: &SymbolicFrame,
) -> Result<(), Error> {
    if instruction >= instruction_count {
        return Err(Error::MalformedInstruction {
            instruction,
            reason: "frame is past the last instruction",
        });
    }

    let offset = offsets[instruction];
    let frame = frame.normalized();
    match placed.get(&offset) {
        Some(existing) if *existing != frame => Err(Error::ConflictingFrames(
            offset,
            existing.clone(),
            frame,
        )),
        Some(_) => Ok(()),
        None => {
            placed.insert(offset, frame);
            Ok(())
        }
    }
}

/// Convert symbolic verification types into their class file form
struct FrameLowering<'a> {
    constants: &'a mut ConstantsPool,

    /// Classes already pushed while lowering this table
    classes: HashMap<String, ClassConstantIndex>,
    instructions: &'a [Instruction],
    offsets: &'a [usize],
}

impl<'a> FrameLowering<'a> {
    fn verification_type(
        &mut self,
        verification_type: VerificationType<String, usize>,
    ) -> Result<VerificationType<ClassConstantIndex, u16>, Error> {
        let constants = &mut *self.constants;
        let classes = &mut self.classes;
        let instructions = self.instructions;
        let offsets = self.offsets;

        verification_type.try_map(
            |class| match classes.get(&class) {
                Some(index) => Ok(*index),
                None => {
                    let index = constants.push_class(class.as_str())?;
                    classes.insert(class, index);
                    Ok(index)
                }
            },
            |instruction| match instructions.get(instruction) {
                Some(Instruction::New(_)) => Ok(offsets[instruction] as u16),
                _ => Err(Error::MalformedInstruction {
                    instruction,
                    reason: "uninitialized type does not point to a `new` instruction",
                }),
            },
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::{ConstantIndex, PoolEntry};
    use crate::jvm::code::{encode, resolve_jumps, ExceptionRange, OrdComparison};
    use VerificationType::*;

    fn table(body: &Code, settings: &Settings) -> Result<Option<StackMapTable>, Error> {
        let mut constants = ConstantsPool::new();
        table_with_pool(body, settings, &mut constants)
    }

    fn table_with_pool(
        body: &Code,
        settings: &Settings,
        constants: &mut ConstantsPool,
    ) -> Result<Option<StackMapTable>, Error> {
        let mut encoded = encode(&body.instructions, constants)?;
        resolve_jumps(&mut encoded)?;
        build_stack_map_table(body, &encoded, constants, settings)
    }

    fn frames(table: Option<StackMapTable>) -> Vec<StackMapFrame> {
        table.expect("no stack map table").0
    }

    #[test]
    fn append_one_local() {
        let mut body = Code::new(1, 2, vec![Instruction::Goto(1), Instruction::Return]);
        body.initial_locals = vec![Integer];
        body.frames.insert(1, Frame::new(vec![Integer, Float], vec![]));

        assert_eq!(
            frames(table(&body, &Settings::default()).unwrap()),
            vec![StackMapFrame::AppendLocalsNoStack {
                offset_delta: 3,
                locals: vec![Float],
            }]
        );
    }

    #[test]
    fn later_deltas_subtract_one() {
        let mut body = Code::new(
            1,
            1,
            vec![
                Instruction::Goto(1),
                Instruction::Goto(1),
                Instruction::Return,
            ],
        );
        body.frames.insert(1, Frame::empty());
        body.frames.insert(2, Frame::empty());

        assert_eq!(
            frames(table(&body, &Settings::default()).unwrap()),
            vec![
                StackMapFrame::SameLocalsNoStack { offset_delta: 3 },
                StackMapFrame::SameLocalsNoStack { offset_delta: 2 },
            ]
        );
    }

    #[test]
    fn missing_frame() {
        let mut body = Code::new(1, 1, vec![Instruction::Goto(1), Instruction::Return]);
        assert!(matches!(
            table(&body, &Settings::default()),
            Err(Error::MissingFrame(1))
        ));

        // Handler starts need frames too
        body.instructions = vec![Instruction::Nop, Instruction::Return];
        body.exception_ranges = vec![ExceptionRange::new(0, 1, 1, None)];
        assert!(matches!(
            table(&body, &Settings::default()),
            Err(Error::MissingFrame(1))
        ));

        // ...unless nobody is checking
        let lenient = Settings {
            emit_stack_map_table: true,
            check_frames: false,
        };
        assert!(table(&body, &lenient).unwrap().is_none());
    }

    #[test]
    fn disabled_table() {
        let mut body = Code::new(1, 1, vec![Instruction::Goto(1), Instruction::Return]);
        body.frames.insert(1, Frame::empty());
        let settings = Settings {
            emit_stack_map_table: false,
            check_frames: true,
        };
        assert!(table(&body, &settings).unwrap().is_none());
    }

    #[test]
    fn uninitialized_offsets() {
        let mut body = Code::new(
            2,
            1,
            vec![
                Instruction::Nop,
                Instruction::New(String::from("java/lang/Object")),
                Instruction::Goto(1),
                Instruction::Return,
            ],
        );
        body.frames.insert(3, Frame::new(vec![], vec![Uninitialized(1)]));
        assert_eq!(
            frames(table(&body, &Settings::default()).unwrap()),
            vec![StackMapFrame::SameLocalsOneStack {
                offset_delta: 7,
                stack: Uninitialized(1),
            }]
        );

        body.frames.insert(3, Frame::new(vec![], vec![Uninitialized(0)]));
        assert!(matches!(
            table(&body, &Settings::default()),
            Err(Error::MalformedInstruction { instruction: 0, .. })
        ));
    }

    #[test]
    fn classes_pushed_once_per_table() {
        let mut body = Code::new(
            1,
            1,
            vec![
                Instruction::Goto(1),
                Instruction::Goto(1),
                Instruction::Return,
            ],
        );
        let string = VerificationType::object("java/lang/String");
        body.frames.insert(1, Frame::new(vec![string.clone()], vec![]));
        body.frames.insert(2, Frame::new(vec![string.clone()], vec![string]));

        let mut constants = ConstantsPool::new();
        let frames = frames(table_with_pool(&body, &Settings::default(), &mut constants).unwrap());
        let class = ClassConstantIndex(ConstantIndex(1));
        assert_eq!(
            frames,
            vec![
                StackMapFrame::AppendLocalsNoStack {
                    offset_delta: 3,
                    locals: vec![Object(class)],
                },
                StackMapFrame::SameLocalsOneStack {
                    offset_delta: 2,
                    stack: Object(class),
                },
            ]
        );
        assert_eq!(constants.len(), 1);
        assert_eq!(
            constants.get(ConstantIndex(1)),
            Some(&PoolEntry::Class(String::from("java/lang/String")))
        );
    }

    fn far_conditional() -> Code {
        let mut instructions = vec![Instruction::If(OrdComparison::EQ, 40001)];
        instructions.extend(std::iter::repeat(Instruction::Nop).take(40000));
        instructions.push(Instruction::Return);
        let mut body = Code::new(1, 1, instructions);
        body.initial_locals = vec![Integer];
        body.frames.insert(40001, Frame::new(vec![Integer], vec![]));
        body
    }

    #[test]
    fn widened_conditional_fallthrough_frame() {
        let mut body = far_conditional();
        assert!(matches!(
            table(&body, &Settings::default()),
            Err(Error::MissingFrame(1))
        ));

        // Not checking ordinary targets doesn't excuse the frame that widening introduced
        let lenient = Settings {
            emit_stack_map_table: true,
            check_frames: false,
        };
        assert!(matches!(table(&body, &lenient), Err(Error::MissingFrame(1))));

        body.fallthrough_frames.insert(0, Frame::new(vec![Integer], vec![]));
        assert_eq!(
            frames(table(&body, &Settings::default()).unwrap()),
            vec![
                StackMapFrame::SameLocalsNoStack { offset_delta: 8 },
                StackMapFrame::SameLocalsNoStack {
                    offset_delta: 40008 - 8 - 1
                },
            ]
        );
    }

    #[test]
    fn conflicting_fallthrough_frame() {
        let mut body = far_conditional();
        body.frames.insert(1, Frame::new(vec![Integer], vec![]));
        body.fallthrough_frames.insert(0, Frame::new(vec![Float], vec![]));
        assert!(matches!(
            table(&body, &Settings::default()),
            Err(Error::ConflictingFrames(8, _, _))
        ));

        // Agreeing frames are merged (padding after wide types doesn't count)
        body.initial_locals = vec![Long, Top];
        body.frames.insert(1, Frame::new(vec![Long, Top], vec![]));
        body.frames.insert(40001, Frame::new(vec![Long], vec![]));
        body.fallthrough_frames.insert(0, Frame::new(vec![Long], vec![]));
        assert_eq!(frames(table(&body, &Settings::default()).unwrap()).len(), 2);
    }
}

use crate::jvm::class_file;
use crate::jvm::class_file::ConstantsPool;
use crate::jvm::code::{
    build_stack_map_table, encode, exception_table, line_number_table, local_variable_table,
    resolve_jumps, ExceptionRange, Instruction, LineNumber, LocalVariable, Settings,
};
use crate::jvm::verifier::{Frame, VerificationType};
use crate::jvm::Error;
use std::collections::BTreeMap;

/// Semantic representation of a method body
///
/// Everything that refers to a position in the code uses instruction indices, since byte offsets
/// are only decided when the body gets serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct Code {
    /// Maximum size of stack through the method
    pub max_stack: usize,

    /// Maximum size of locals through the method
    pub max_locals: usize,

    pub instructions: Vec<Instruction>,

    /// Locals on entry (the method arguments, starting with `this` for instance methods)
    pub initial_locals: Vec<VerificationType<String, usize>>,

    /// Frames at instructions that are jumped to (including exception handlers)
    pub frames: BTreeMap<usize, Frame<String, usize>>,

    /// Frames right after conditional branches, keyed by the index of the branch
    ///
    /// These are only needed (and only used) if the branch is too far to encode in 16 bits, in
    /// which case the instruction after it becomes a jump target.
    pub fallthrough_frames: BTreeMap<usize, Frame<String, usize>>,

    /// Exception handlers, in the order they should be tried
    pub exception_ranges: Vec<ExceptionRange>,

    pub line_numbers: Vec<LineNumber>,
    pub local_variables: Vec<LocalVariable>,
}

impl Code {
    pub fn new(max_stack: usize, max_locals: usize, instructions: Vec<Instruction>) -> Code {
        Code {
            max_stack,
            max_locals,
            instructions,
            initial_locals: vec![],
            frames: BTreeMap::new(),
            fallthrough_frames: BTreeMap::new(),
            exception_ranges: vec![],
            line_numbers: vec![],
            local_variables: vec![],
        }
    }

    /// Compile the body into a `Code` attribute
    ///
    /// Constants get pushed in a fixed order (instructions, then exception types, then stack map
    /// classes, then debug attributes), so the same body and pool always produce the same bytes.
    pub fn serialize_code(
        &self,
        constants_pool: &mut ConstantsPool,
        settings: &Settings,
    ) -> Result<class_file::Code, Error> {
        // Convert max locals and stack
        let max_stack: u16 = match u16::try_from(self.max_stack) {
            Ok(max_stack) => max_stack,
            Err(_) => return Err(Error::MethodCodeMaxStackOverflow(self.max_stack)),
        };
        let max_locals: u16 = match u16::try_from(self.max_locals) {
            Ok(max_locals) => max_locals,
            Err(_) => return Err(Error::MethodCodeMaxLocalsOverflow(self.max_locals)),
        };

        let mut encoded = encode(&self.instructions, constants_pool)?;
        resolve_jumps(&mut encoded)?;

        let exception_table =
            exception_table(&self.exception_ranges, &encoded.offsets, constants_pool)?;

        let mut attributes = vec![];

        // Add `StackMapTable` attribute only if there are frames
        if let Some(stack_map_table) =
            build_stack_map_table(self, &encoded, constants_pool, settings)?
        {
            attributes.push(constants_pool.attribute(stack_map_table)?);
        }
        if !self.line_numbers.is_empty() {
            let line_numbers = line_number_table(&self.line_numbers, &encoded.offsets)?;
            attributes.push(constants_pool.attribute(line_numbers)?);
        }
        if !self.local_variables.is_empty() {
            let local_variables =
                local_variable_table(&self.local_variables, &encoded.offsets, constants_pool)?;
            attributes.push(constants_pool.attribute(local_variables)?);
        }

        log::debug!(
            "serialized {} instructions into {} bytes ({} widened branches, {} handlers)",
            self.instructions.len(),
            encoded.bytes.len(),
            encoded.widened_branches().len(),
            exception_table.len()
        );

        Ok(class_file::Code {
            max_stack,
            max_locals,
            code_array: class_file::BytecodeArray(encoded.bytes),
            exception_table,
            attributes,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::{
        BytecodeIndex, ClassConstantIndex, ConstantIndex, ExceptionHandler, PoolEntry, Serialize,
    };
    use crate::jvm::code::OrdComparison;
    use crate::jvm::verifier::VerificationType::*;

    #[test]
    fn goto_next_instruction() {
        let mut constants = ConstantsPool::new();
        let mut body = Code::new(0, 1, vec![Instruction::Goto(1), Instruction::Return]);
        body.frames.insert(1, Frame::empty());

        let code = body
            .serialize_code(&mut constants, &Settings::default())
            .unwrap();
        assert_eq!(code.code_array.0, vec![0xa7, 0x00, 0x03, 0xb1]);
        assert_eq!(code.attributes.len(), 1);
        assert_eq!(code.attributes[0].info, vec![0x00, 0x01, 0x03]);
        assert_eq!(
            constants.get(code.attributes[0].name_index.0),
            Some(&PoolEntry::Utf8(String::from("StackMapTable")))
        );
    }

    #[test]
    fn max_sizes_must_fit() {
        let mut constants = ConstantsPool::new();
        let body = Code::new(70000, 0, vec![Instruction::Return]);
        assert!(matches!(
            body.serialize_code(&mut constants, &Settings::default()),
            Err(Error::MethodCodeMaxStackOverflow(70000))
        ));
        let body = Code::new(0, 65536, vec![Instruction::Return]);
        assert!(matches!(
            body.serialize_code(&mut constants, &Settings::default()),
            Err(Error::MethodCodeMaxLocalsOverflow(65536))
        ));
    }

    #[test]
    fn try_catch() {
        // try { return 1 / x; } catch (ArithmeticException e) { return 0; }
        let mut body = Code::new(
            2,
            1,
            vec![
                Instruction::PushInt(1),
                Instruction::ILoad(0),
                Instruction::IDiv,
                Instruction::IReturn,
                Instruction::Pop,
                Instruction::PushInt(0),
                Instruction::IReturn,
            ],
        );
        body.initial_locals = vec![Integer];
        body.exception_ranges = vec![ExceptionRange::new(
            0,
            4,
            4,
            Some("java/lang/ArithmeticException"),
        )];
        body.frames.insert(
            4,
            Frame::new(
                vec![Integer],
                vec![VerificationType::object("java/lang/ArithmeticException")],
            ),
        );

        let mut constants = ConstantsPool::new();
        let code = body
            .serialize_code(&mut constants, &Settings::default())
            .unwrap();
        assert_eq!(
            code.code_array.0,
            vec![0x04, 0x1a, 0x6c, 0xac, 0x57, 0x03, 0xac]
        );
        assert_eq!(
            code.exception_table,
            vec![ExceptionHandler {
                start_pc: BytecodeIndex(0),
                end_pc: BytecodeIndex(4),
                handler_pc: BytecodeIndex(4),
                catch_type: Some(ClassConstantIndex(ConstantIndex(1))),
            }]
        );

        // The handler frame gets its own class entry (index 2), then the attribute name
        assert_eq!(code.attributes[0].info, vec![0x00, 0x01, 68, 7, 0x00, 0x02]);
        assert_eq!(constants.size(), 4);
    }

    #[test]
    fn debug_attributes() {
        let mut body = Code::new(1, 1, vec![Instruction::PushInt(3), Instruction::IReturn]);
        body.line_numbers = vec![LineNumber {
            instruction: 0,
            line: 7,
        }];
        body.local_variables = vec![LocalVariable {
            start: 0,
            end: 2,
            name: String::from("x"),
            descriptor: String::from("I"),
            index: 0,
        }];

        let mut constants = ConstantsPool::new();
        let code = body
            .serialize_code(&mut constants, &Settings::default())
            .unwrap();
        let names: Vec<Option<&PoolEntry>> = code
            .attributes
            .iter()
            .map(|attribute| constants.get(attribute.name_index.0))
            .collect();
        assert_eq!(
            names,
            vec![
                Some(&PoolEntry::Utf8(String::from("LineNumberTable"))),
                Some(&PoolEntry::Utf8(String::from("LocalVariableTable"))),
            ]
        );
        assert_eq!(code.attributes[0].info, vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x07]);
        assert_eq!(
            code.attributes[1].info,
            vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x02, 0x00, 0x03, 0x00, 0x00]
        );
    }

    #[test]
    fn deterministic_output() {
        let build = || {
            let mut instructions = vec![
                Instruction::ILoad(0),
                Instruction::If(OrdComparison::GT, 20001),
            ];
            for _ in 0..10000 {
                instructions.push(Instruction::PushLong(77));
                instructions.push(Instruction::Pop2);
            }
            instructions.push(Instruction::Return);
            let mut body = Code::new(2, 1, instructions);
            body.initial_locals = vec![Integer];
            body.frames.insert(20002, Frame::new(vec![Integer], vec![]));
            body.fallthrough_frames.insert(1, Frame::new(vec![Integer], vec![]));

            let mut constants = ConstantsPool::new();
            let code = body
                .serialize_code(&mut constants, &Settings::default())
                .unwrap();
            let mut bytes = vec![];
            code.serialize(&mut bytes).unwrap();
            constants.into_constants().unwrap().serialize(&mut bytes).unwrap();
            bytes
        };
        assert_eq!(build(), build());
    }
}

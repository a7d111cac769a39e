//! Optional debugging attributes of method bodies

use crate::jvm::class_file::{
    ConstantsPool, LineNumberEntry, LineNumberTable, LocalVariableEntry, LocalVariableTable,
};
use crate::jvm::code::exceptions::bytecode_index;
use crate::jvm::Error;

/// Source line that starts at an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineNumber {
    pub instruction: usize,
    pub line: u16,
}

/// Named local variable, live over a range of instructions
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalVariable {
    /// First instruction where the variable has a value
    pub start: usize,

    /// First instruction after the live range (may be one past the last instruction)
    pub end: usize,
    pub name: String,

    /// Field descriptor (eg. `I` or `Ljava/lang/String;`)
    pub descriptor: String,

    /// Local variable slot
    pub index: u16,
}

pub fn line_number_table(
    line_numbers: &[LineNumber],
    offsets: &[usize],
) -> Result<LineNumberTable, Error> {
    let instruction_count = offsets.len() - 1;
    let entries = line_numbers
        .iter()
        .map(|LineNumber { instruction, line }| {
            if *instruction >= instruction_count {
                return Err(Error::InvalidDebugRange {
                    start: *instruction,
                    end: *instruction + 1,
                });
            }
            Ok(LineNumberEntry {
                start_pc: bytecode_index(offsets, *instruction)?,
                line_number: *line,
            })
        })
        .collect::<Result<_, Error>>()?;
    Ok(LineNumberTable(entries))
}

pub fn local_variable_table(
    local_variables: &[LocalVariable],
    offsets: &[usize],
    constants: &mut ConstantsPool,
) -> Result<LocalVariableTable, Error> {
    let instruction_count = offsets.len() - 1;
    let mut entries = Vec::with_capacity(local_variables.len());
    for variable in local_variables {
        if variable.start >= variable.end || variable.end > instruction_count {
            return Err(Error::InvalidDebugRange {
                start: variable.start,
                end: variable.end,
            });
        }

        let start_pc = bytecode_index(offsets, variable.start)?;
        let end_pc = bytecode_index(offsets, variable.end)?;
        entries.push(LocalVariableEntry {
            start_pc,
            length: end_pc.0 - start_pc.0,
            name_index: constants.push_utf8(variable.name.as_str())?,
            descriptor_index: constants.push_utf8(variable.descriptor.as_str())?,
            index: variable.index,
        });
    }
    Ok(LocalVariableTable(entries))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::{BytecodeIndex, ConstantIndex, Utf8ConstantIndex};

    #[test]
    fn line_numbers() {
        let table = line_number_table(
            &[
                LineNumber {
                    instruction: 0,
                    line: 10,
                },
                LineNumber {
                    instruction: 2,
                    line: 11,
                },
            ],
            &[0, 3, 5, 6],
        )
        .unwrap();
        assert_eq!(
            table.0,
            vec![
                LineNumberEntry {
                    start_pc: BytecodeIndex(0),
                    line_number: 10
                },
                LineNumberEntry {
                    start_pc: BytecodeIndex(5),
                    line_number: 11
                },
            ]
        );

        let past_end = line_number_table(
            &[LineNumber {
                instruction: 3,
                line: 1,
            }],
            &[0, 3, 5, 6],
        );
        assert!(matches!(
            past_end,
            Err(Error::InvalidDebugRange { start: 3, end: 4 })
        ));
    }

    #[test]
    fn local_variables() {
        let mut constants = ConstantsPool::new();
        let table = local_variable_table(
            &[LocalVariable {
                start: 1,
                end: 3,
                name: String::from("count"),
                descriptor: String::from("I"),
                index: 2,
            }],
            &[0, 3, 5, 6],
            &mut constants,
        )
        .unwrap();
        assert_eq!(
            table.0,
            vec![LocalVariableEntry {
                start_pc: BytecodeIndex(3),
                length: 3,
                name_index: Utf8ConstantIndex(ConstantIndex(1)),
                descriptor_index: Utf8ConstantIndex(ConstantIndex(2)),
                index: 2,
            }]
        );

        let empty = local_variable_table(
            &[LocalVariable {
                start: 2,
                end: 2,
                name: String::from("count"),
                descriptor: String::from("I"),
                index: 2,
            }],
            &[0, 3, 5, 6],
            &mut constants,
        );
        assert!(matches!(
            empty,
            Err(Error::InvalidDebugRange { start: 2, end: 2 })
        ));
    }
}

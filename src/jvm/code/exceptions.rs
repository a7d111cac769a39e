use crate::jvm::class_file::{BytecodeIndex, ConstantsPool, ExceptionHandler};
use crate::jvm::Error;

/// Range of instructions covered by an exception handler
///
/// All of the fields are instruction indices (not byte offsets).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExceptionRange {
    /// First instruction covered
    pub start: usize,

    /// First instruction after the covered range (may be one past the last instruction)
    pub end: usize,

    /// First instruction of the handler
    pub handler: usize,

    /// Class of exceptions caught (eg. `java/lang/ArithmeticException`), or `None` to catch
    /// everything
    pub catch_type: Option<String>,
}

impl ExceptionRange {
    pub fn new(start: usize, end: usize, handler: usize, catch_type: Option<&str>) -> Self {
        ExceptionRange {
            start,
            end,
            handler,
            catch_type: catch_type.map(String::from),
        }
    }
}

/// Byte offset of an instruction (or of the end of the code)
pub(crate) fn bytecode_index(
    offsets: &[usize],
    instruction: usize,
) -> Result<BytecodeIndex, Error> {
    let offset = offsets[instruction];
    u16::try_from(offset)
        .map(BytecodeIndex)
        .map_err(|_| Error::MethodCodeOverflow(offset))
}

/// Translate exception ranges into the exception table, in the same order
///
/// Handlers are searched in table order by the JVM, so the order is significant.
pub fn exception_table(
    ranges: &[ExceptionRange],
    offsets: &[usize],
    constants: &mut ConstantsPool,
) -> Result<Vec<ExceptionHandler>, Error> {
    let instruction_count = offsets.len() - 1;
    ranges
        .iter()
        .map(|range| {
            let ExceptionRange {
                start,
                end,
                handler,
                catch_type,
            } = range;
            if start >= end || *end > instruction_count || *handler >= instruction_count {
                return Err(Error::InvalidExceptionRange {
                    start: *start,
                    end: *end,
                    handler: *handler,
                });
            }

            let catch_type = match catch_type {
                None => None,
                Some(class) => Some(constants.push_class(class.as_str())?),
            };
            Ok(ExceptionHandler {
                start_pc: bytecode_index(offsets, *start)?,
                end_pc: bytecode_index(offsets, *end)?,
                handler_pc: bytecode_index(offsets, *handler)?,
                catch_type,
            })
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::{ClassConstantIndex, ConstantIndex, PoolEntry};

    #[test]
    fn ranges_become_byte_offsets() {
        let mut constants = ConstantsPool::new();
        let offsets = vec![0, 1, 4, 5, 9];
        let table = exception_table(
            &[
                ExceptionRange::new(1, 3, 3, Some("java/lang/ArithmeticException")),
                ExceptionRange::new(0, 4, 3, None),
            ],
            &offsets,
            &mut constants,
        )
        .unwrap();

        assert_eq!(
            table,
            vec![
                ExceptionHandler {
                    start_pc: BytecodeIndex(1),
                    end_pc: BytecodeIndex(5),
                    handler_pc: BytecodeIndex(5),
                    catch_type: Some(ClassConstantIndex(ConstantIndex(1))),
                },
                ExceptionHandler {
                    start_pc: BytecodeIndex(0),
                    end_pc: BytecodeIndex(9),
                    handler_pc: BytecodeIndex(5),
                    catch_type: None,
                },
            ]
        );
        assert_eq!(
            constants.get(ConstantIndex(1)),
            Some(&PoolEntry::Class(String::from("java/lang/ArithmeticException")))
        );
    }

    #[test]
    fn invalid_ranges() {
        let offsets = vec![0, 1, 2, 3];
        for range in [
            ExceptionRange::new(2, 2, 0, None),
            ExceptionRange::new(2, 1, 0, None),
            ExceptionRange::new(0, 4, 0, None),
            ExceptionRange::new(0, 1, 3, None),
        ] {
            let mut constants = ConstantsPool::new();
            assert!(matches!(
                exception_table(&[range], &offsets, &mut constants),
                Err(Error::InvalidExceptionRange { .. })
            ));
        }
    }
}

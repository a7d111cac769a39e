//! Fix jumps that don't fit in 16 bits, then write every displacement
//!
//! The encoder emits forward `goto`, `jsr`, and `if*` instructions with 16-bit displacements and
//! leaves it to this module to rewrite the ones which turn out to need more room:
//!
//! ```text,ignore,no_run
//!     goto L1       =>    goto_w L1
//!
//!     if* L1        =>    ifnot* +8
//!                         goto_w L1
//! ```
//!
//! The `ifnot*` in the second rewrite jumps over the `goto_w`, landing exactly where the next
//! instruction starts. Since the rewrite happens in the bytes, this means that the displacement
//! of that `goto_w` is relative to three bytes after the start of the original instruction.
//!
//! ### Termination
//!
//! Every rewrite makes the code longer, so it can push other jumps out of range (including ones
//! which were already checked). Passes over the jumps are repeated until one of them rewrites
//! nothing. This always finishes because a jump is rewritten at most once and the jumps
//! introduced by rewrites (the `ifnot* +8`) never change.
//!
//! ### Switch padding
//!
//! The first field of a `tableswitch` or `lookupswitch` must be 4-byte aligned relative to the
//! start of the code. Whenever a rewrite moves a switch, its padding is recomputed and the bytes
//! after it are moved accordingly (which may in turn push other jumps out of range).

use crate::jvm::code::{switch_padding, EncodedCode, JumpKind, JumpWidth};
use crate::jvm::Error;
use byteorder::{BigEndian, ByteOrder};

/// Widen oversized jumps until none are left, then write all displacements
///
/// Running this on code that was already resolved changes nothing.
pub fn resolve_jumps(code: &mut EncodedCode) -> Result<(), Error> {
    let mut passes = 0;
    loop {
        passes += 1;
        let mut widened_any = false;
        for patch_index in 0..code.patches.len() {
            let patch = &code.patches[patch_index];
            if patch.width == JumpWidth::Wide {
                continue;
            }
            let displacement = patch.displacement(&code.offsets);
            if i16::try_from(displacement).is_err() {
                code.widen(patch_index);
                widened_any = true;
            }
        }
        if !widened_any {
            break;
        }
    }

    let code_length = code.bytes.len();
    if code_length > u16::MAX as usize {
        return Err(Error::MethodCodeOverflow(code_length));
    }

    for patch in &code.patches {
        let displacement = patch.displacement(&code.offsets);
        let field = patch.field_offset;
        let out_of_range = || Error::InvalidJumpTarget {
            instruction: patch.instruction,
            displacement,
        };
        match patch.width {
            JumpWidth::Narrow => {
                let displacement = i16::try_from(displacement).map_err(|_| out_of_range())?;
                BigEndian::write_i16(&mut code.bytes[field..field + 2], displacement);
            }
            JumpWidth::Wide => {
                let displacement = i32::try_from(displacement).map_err(|_| out_of_range())?;
                BigEndian::write_i32(&mut code.bytes[field..field + 4], displacement);
            }
        }
    }

    log::trace!(
        "resolved {} jumps in {} passes ({} bytes)",
        code.patches.len(),
        passes,
        code_length
    );
    Ok(())
}

impl EncodedCode {
    /// Conditional branches which were rewritten into `ifnot* +8; goto_w`
    ///
    /// These are the instructions whose fall-through now starts right after a `goto_w`, so
    /// they need a stack map frame there.
    pub fn widened_branches(&self) -> Vec<usize> {
        self.patches
            .iter()
            .filter(|patch| patch.long_if)
            .map(|patch| patch.instruction)
            .collect()
    }

    /// Rewrite the jump of a narrow patch point into its 32-bit form
    fn widen(&mut self, patch_index: usize) {
        let kind = self.patches[patch_index].kind;
        let instruction = self.patches[patch_index].instruction;
        let start = self.offsets[instruction];

        match kind {
            JumpKind::Goto | JumpKind::Jsr => {
                let opcode: u8 = if kind == JumpKind::Goto {
                    0xc8
                } else {
                    0xc9
                };
                log::trace!("widening jump at instruction {} (byte {})", instruction, start);
                self.bytes.splice(start..start + 3, [opcode, 0, 0, 0, 0]);
                self.patches[patch_index].width = JumpWidth::Wide;
                self.shift(instruction, start + 3, 2);
            }
            JumpKind::Conditional(conditional) => {
                log::trace!(
                    "widening conditional at instruction {} (byte {})",
                    instruction,
                    start
                );
                self.bytes.splice(
                    start..start + 3,
                    [(!conditional).opcode(), 0x00, 0x08, 0xc8, 0, 0, 0, 0],
                );
                self.shift(instruction, start + 3, 5);
                let patch = &mut self.patches[patch_index];
                patch.width = JumpWidth::Wide;
                patch.long_if = true;
                patch.field_offset = start + 4;
            }

            // Switch fields are always 32-bit
            JumpKind::Switch => return,
        }

        self.repad_switches_after(instruction);
    }

    /// Move everything after `instruction` by `delta` bytes
    ///
    /// Patch fields at or after `from_byte` move too.
    fn shift(&mut self, instruction: usize, from_byte: usize, delta: isize) {
        for offset in &mut self.offsets[instruction + 1..] {
            *offset = (*offset as isize + delta) as usize;
        }
        for patch in &mut self.patches {
            if patch.field_offset >= from_byte {
                patch.field_offset = (patch.field_offset as isize + delta) as usize;
            }
        }
    }

    /// Recompute the padding of switches that come after `instruction`
    fn repad_switches_after(&mut self, instruction: usize) {
        for switch_index in 0..self.switches.len() {
            let switch = &self.switches[switch_index];
            if switch.instruction <= instruction {
                continue;
            }
            let switch_instruction = switch.instruction;
            let old_padding = switch.padding;
            let start = self.offsets[switch_instruction];
            let new_padding = switch_padding(start);
            if new_padding == old_padding {
                continue;
            }

            let padding_start = start + 1;
            self.bytes.splice(
                padding_start..padding_start + old_padding,
                std::iter::repeat(0u8).take(new_padding),
            );
            self.switches[switch_index].padding = new_padding;
            self.shift(
                switch_instruction,
                padding_start,
                new_padding as isize - old_padding as isize,
            );
        }
    }
}

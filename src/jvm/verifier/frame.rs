use crate::jvm::class_file::StackMapFrame;
use crate::jvm::verifier::VerificationType;

/// Types of the local variables and operand stack at some point in a method body
///
/// Locals are listed slot by slot. A `Long` or `Double` covers two slots, and the second one may
/// (but need not) be listed as an explicit `Top`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame<Cls, U> {
    pub locals: Vec<VerificationType<Cls, U>>,
    pub stack: Vec<VerificationType<Cls, U>>,
}

impl<Cls, U> Frame<Cls, U> {
    pub fn new(
        locals: Vec<VerificationType<Cls, U>>,
        stack: Vec<VerificationType<Cls, U>>,
    ) -> Frame<Cls, U> {
        Frame { locals, stack }
    }

    /// Frame with no locals and an empty stack
    pub fn empty() -> Frame<Cls, U> {
        Frame::new(vec![], vec![])
    }
}

impl<Cls: Clone + Eq, U: Clone + Eq> Frame<Cls, U> {
    /// Drop the explicit `Top` padding after `Long` and `Double` entries
    ///
    /// `StackMapTable` frames list two-slot types only once, so this is the representation that
    /// frames are compared (and classified) in.
    pub fn normalized(&self) -> Frame<Cls, U> {
        fn strip_padding<Cls: Clone, U: Clone>(
            types: &[VerificationType<Cls, U>],
        ) -> Vec<VerificationType<Cls, U>> {
            let mut stripped = Vec::with_capacity(types.len());
            let mut after_wide = false;
            for verification_type in types {
                if !(after_wide && matches!(verification_type, VerificationType::Top)) {
                    stripped.push(verification_type.clone());
                    after_wide = verification_type.is_wide();
                } else {
                    after_wide = false;
                }
            }
            stripped
        }

        Frame {
            locals: strip_padding(&self.locals),
            stack: strip_padding(&self.stack),
        }
    }

    /// Compute a stack map frame for this frame, given the previous frame
    ///
    /// Both frames are expected to be [normalized](Self::normalized). This will fall back to the
    /// `Full` option using [`Self::full_stack_map_frame`] only if none of the other stack map
    /// frame variants are enough to encode the transition.
    pub fn stack_map_frame(
        &self,
        offset_delta: u16,
        previous_frame: &Self,
    ) -> StackMapFrame<Cls, U> {
        match self.stack.len() {
            0 => {
                let this_locals_len = self.locals.len();
                let prev_locals_len = previous_frame.locals.len();

                if this_locals_len <= prev_locals_len {
                    let len_difference = prev_locals_len - this_locals_len;
                    if len_difference < 4 && previous_frame.locals.starts_with(&self.locals) {
                        if len_difference == 0 {
                            return StackMapFrame::SameLocalsNoStack { offset_delta };
                        } else {
                            return StackMapFrame::ChopLocalsNoStack {
                                offset_delta,
                                chopped_k: len_difference as u8,
                            };
                        }
                    }
                } else if this_locals_len - prev_locals_len < 4
                    && self.locals.starts_with(&previous_frame.locals)
                {
                    return StackMapFrame::AppendLocalsNoStack {
                        offset_delta,
                        locals: self.locals[prev_locals_len..].to_vec(),
                    };
                }
            }
            1 if self.locals == previous_frame.locals => {
                return StackMapFrame::SameLocalsOneStack {
                    offset_delta,
                    stack: self.stack[0].clone(),
                }
            }
            _ => (),
        }

        self.full_stack_map_frame(offset_delta)
    }

    /// Compute a `Full` stack map frame
    pub fn full_stack_map_frame(&self, offset_delta: u16) -> StackMapFrame<Cls, U> {
        StackMapFrame::Full {
            offset_delta,
            stack: self.stack.clone(),
            locals: self.locals.clone(),
        }
    }
}

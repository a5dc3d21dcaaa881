//! Fixed-point instruction layout
//!
//! Resolving labels to byte offsets is circular: branch encodings depend on the distance being
//! jumped, and distances depend on every encoding chosen earlier in the buffer. The loop here
//! starts from a candidate set of encodings and repeatedly recomputes offsets, promoting any
//! branch whose relative offset no longer fits its narrow form:
//!
//!   - `goto`/`jsr` are rewritten in place to their 32-bit forms
//!
//!   - conditional branches have no wide form, so an oversized one is spliced into an
//!     inverted-condition branch over a `goto_w`:
//!
//! ```text,ignore,no_run
//!     if* L            ifnot* skip
//!     ...        =>    goto_w L
//!                 skip:
//!                      ...
//! ```
//!
//! Promotion is the only rewrite performed inside the loop, so the set of narrow branches
//! shrinks monotonically and the loop terminates; an iteration cap turns a logic error into
//! [`Error::LayoutDiverged`] instead of a hang. Switch padding is recomputed from scratch every
//! pass, which is why the splice needs no `nop` alignment filler.

use super::{Instruction, Label, LabelGenerator, Opcode};
use crate::{Error, Result};
use std::collections::HashMap;

/// The `code` array of a method is at most this many bytes
pub const MAX_CODE_LENGTH: usize = u16::MAX as usize;

/// Promotion only ever removes narrow branches, so convergence takes at most one pass per
/// oversized branch; this cap exists to bound the loop, not to be reached.
const MAX_PASSES: usize = 32;

/// One element of a layout buffer: an instruction, or a label marking the current position
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Item {
    Insn(Instruction<Label>),
    Mark(Label),
}

impl From<Instruction<Label>> for Item {
    fn from(insn: Instruction<Label>) -> Item {
        Item::Insn(insn)
    }
}

/// How to treat the encodings the caller handed in
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Mode {
    /// Reset branches and `ldc`s to narrow form first, so the fixed point lands on the shortest
    /// encodings
    Shrink,

    /// Keep the given encodings and only grow them when forced; an already-valid buffer passes
    /// through byte-identical
    Preserve,
}

/// Result of a successful layout pass
pub struct Layout {
    /// Instructions with every branch target resolved to a relative offset
    pub instructions: Vec<Instruction<i32>>,

    /// Byte offset each label resolved to
    pub label_offsets: HashMap<Label, u32>,

    pub byte_len: u32,
}

/// Resolve a buffer of items into concrete instructions and label offsets
pub fn resolve(mut items: Vec<Item>, mode: Mode, labels: &mut LabelGenerator) -> Result<Layout> {
    // Candidate encodings: under Shrink everything starts narrow, and integer pushes are
    // canonicalized to their shortest instruction; either way a narrow `ldc` whose index needs
    // two bytes is invalid and gets widened up front.
    for item in items.iter_mut() {
        if let Item::Insn(insn) = item {
            match insn {
                Instruction::Branch { opcode, wide, .. } => {
                    if mode == Mode::Shrink && opcode.has_wide_branch_form() {
                        *wide = false;
                    }
                }
                Instruction::Push { opcode, value }
                    if mode == Mode::Shrink
                        && (*opcode == Opcode::BIPUSH || *opcode == Opcode::SIPUSH) =>
                {
                    if let Some(shortest) = Instruction::push_int(*value) {
                        *insn = shortest;
                    }
                }
                Instruction::Const {
                    opcode,
                    index,
                    wide,
                } if *opcode == Opcode::LDC => {
                    if index.0 > u8::MAX as u16 {
                        *wide = true;
                    } else if mode == Mode::Shrink {
                        *wide = false;
                    }
                }
                _ => {}
            }
        }
    }

    for pass in 1..=MAX_PASSES {
        // Assign offsets to every item under the current encodings
        let mut label_offsets: HashMap<Label, u32> = HashMap::new();
        let mut item_offsets: Vec<u32> = Vec::with_capacity(items.len());
        let mut offset: usize = 0;
        for item in &items {
            item_offsets.push(offset as u32);
            match item {
                Item::Mark(label) => {
                    label_offsets.insert(*label, offset as u32);
                }
                Item::Insn(insn) => {
                    offset += insn.width_at(offset as u32);
                }
            }
        }
        let byte_len = offset;

        // Find branches whose narrow encoding no longer fits
        let mut widened = 0usize;
        let mut splices: Vec<(usize, Vec<Item>)> = Vec::new();
        for (i, item) in items.iter_mut().enumerate() {
            let insn = match item {
                Item::Insn(insn) => insn,
                Item::Mark(_) => continue,
            };
            if let Instruction::Branch {
                opcode,
                target,
                wide,
            } = insn
            {
                let to = *label_offsets
                    .get(target)
                    .ok_or(Error::UnresolvedLabel(*target))? as i64;
                let rel = to - item_offsets[i] as i64;
                if *wide {
                    if i32::try_from(rel).is_err() {
                        return Err(Error::BranchOverflow { distance: rel });
                    }
                } else if i16::try_from(rel).is_err() {
                    if opcode.has_wide_branch_form() {
                        *wide = true;
                        widened += 1;
                    } else if let Some(inverted) = opcode.inverted_branch() {
                        let skip = labels.fresh();
                        splices.push((
                            i,
                            vec![
                                Item::Insn(Instruction::branch(inverted, skip)),
                                Item::Insn(Instruction::Branch {
                                    opcode: Opcode::GOTO,
                                    target: *target,
                                    wide: true,
                                }),
                                Item::Mark(skip),
                            ],
                        ));
                    } else {
                        return Err(Error::BranchOverflow { distance: rel });
                    }
                }
            }
        }

        if widened == 0 && splices.is_empty() {
            log::trace!(
                "layout converged after {} pass(es), {} bytes",
                pass,
                byte_len
            );
            if byte_len > MAX_CODE_LENGTH {
                return Err(Error::CodeOverflow {
                    length: byte_len,
                    max: MAX_CODE_LENGTH,
                });
            }

            let mut instructions = Vec::new();
            for (i, item) in items.iter().enumerate() {
                let insn = match item {
                    Item::Insn(insn) => insn,
                    Item::Mark(_) => continue,
                };
                let at = item_offsets[i] as i64;
                let resolved = insn.map_targets(|label| -> Result<i32> {
                    let to = *label_offsets
                        .get(label)
                        .ok_or(Error::UnresolvedLabel(*label))? as i64;
                    Ok((to - at) as i32)
                })?;
                instructions.push(resolved);
            }
            return Ok(Layout {
                instructions,
                label_offsets,
                byte_len: byte_len as u32,
            });
        }

        log::trace!(
            "layout pass {}: widened {} branch(es), spliced {}",
            pass,
            widened,
            splices.len()
        );
        for (i, replacement) in splices.into_iter().rev() {
            items.splice(i..=i, replacement);
        }
    }

    Err(Error::LayoutDiverged(MAX_PASSES))
}

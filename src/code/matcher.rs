//! Wildcard pattern matching over instruction sequences
//!
//! A [`Rule`] pairs a pattern sequence with a replacement sequence. Patterns match concrete
//! instructions opcode-for-opcode but may put a [`Wildcard`] in any operand position; the first
//! occurrence of a wildcard captures what it matched, and later occurrences (in the pattern or
//! the replacement) refer back to the captured value. Constant operands never compare by index:
//! a rule carries its own little constant pool, and its indices are matched structurally against
//! the pool of the class being rewritten, then copied over on demand when the replacement is
//! realized.
//!
//! Matched windows are rewritten through a [`CodeEditor`], so surrounding branches retarget
//! automatically. A window with a branch target landing anywhere but its first instruction is
//! skipped: rewriting it would change where that branch lands.

use super::editor::{CodeEditor, OffsetMap};
use super::layout::Item;
use super::{Instruction, Label, Opcode};
use crate::pool::{ConstantIndex, ConstantPool};
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::ops::Range;

/// A capture slot, identified by a small number chosen by the rule author
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Wildcard(pub u16);

/// What a wildcard captured
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Binding {
    /// A local variable slot
    Slot(u16),
    /// An immediate operand
    Value(i32),
    /// A constant pool index, in the pool of the code being matched
    Const(ConstantIndex),
    /// An absolute branch target in the pre-edit buffer
    Target(u32),
}

/// Immediate-operand position in a pattern
#[derive(Copy, Clone, Debug)]
pub enum PatValue {
    Is(i32),
    Any(Wildcard),
}

/// Local-variable-slot position in a pattern
#[derive(Copy, Clone, Debug)]
pub enum PatSlot {
    Is(u16),
    Any(Wildcard),
}

/// Constant-pool position in a pattern; `Is` holds an index into the rule's own pool
#[derive(Copy, Clone, Debug)]
pub enum PatConst {
    Is(ConstantIndex),
    Any(Wildcard),
}

/// Branch-target position in a pattern; targets can only be captured, not pinned
#[derive(Copy, Clone, Debug)]
pub enum PatTarget {
    Any(Wildcard),
}

/// One instruction of a pattern sequence
///
/// Variable instructions match regardless of encoding form, and `ldc` matches `ldc_w`; the
/// pattern cares about what an instruction does, not how it was encoded.
#[derive(Clone, Debug)]
pub enum PatternInsn {
    Simple(Opcode),
    Push { opcode: Opcode, value: PatValue },
    Var { opcode: Opcode, index: PatSlot },
    Inc { index: PatSlot, delta: PatValue },
    Const { opcode: Opcode, index: PatConst },
    Branch { opcode: Opcode, target: PatTarget },
}

/// Immediate-operand position in a replacement
#[derive(Copy, Clone, Debug)]
pub enum RepValue {
    Literal(i32),
    Bound(Wildcard),
}

/// Local-variable-slot position in a replacement
#[derive(Copy, Clone, Debug)]
pub enum RepSlot {
    Literal(u16),
    Bound(Wildcard),
}

/// Constant-pool position in a replacement; `Literal` is an index into the rule's pool and is
/// copied into the target pool when the replacement is realized
#[derive(Copy, Clone, Debug)]
pub enum RepConst {
    Literal(ConstantIndex),
    Bound(Wildcard),
}

/// Branch-target position in a replacement
#[derive(Copy, Clone, Debug)]
pub enum RepTarget {
    /// A label local to this replacement, placed by [`ReplacementInsn::Mark`]
    Local(u16),
    /// Wherever the captured target ends up after the edit
    Bound(Wildcard),
}

/// One instruction of a replacement sequence
#[derive(Clone, Debug)]
pub enum ReplacementInsn {
    Simple(Opcode),
    Push { opcode: Opcode, value: RepValue },
    Var { opcode: Opcode, index: RepSlot },
    Inc { index: RepSlot, delta: RepValue },
    Const { opcode: Opcode, index: RepConst },
    Branch { opcode: Opcode, target: RepTarget },
    /// Placement of a local label, for branches within the replacement
    Mark(u16),
}

/// A rewrite rule: match the pattern, emit the replacement
///
/// The rule's pool holds the constants its pattern and replacement refer to, independent of any
/// class the rule will later be applied to.
pub struct Rule {
    pub pool: ConstantPool,
    pub pattern: Vec<PatternInsn>,
    pub replacement: Vec<ReplacementInsn>,
}

/// One successful application of a rule
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Replaced {
    /// Index of the rule in the rewriter's rule list
    pub rule: usize,
    /// Old-offset span of the matched window
    pub matched: Range<u32>,
}

/// Applies a prioritized rule list over a code buffer
pub struct Rewriter {
    rules: Vec<Rule>,
}

impl Rewriter {
    pub fn new(rules: Vec<Rule>) -> Rewriter {
        Rewriter { rules }
    }

    /// Match and schedule replacements on an open editor without flushing it
    ///
    /// The scan moves left to right; at each position the first rule that matches wins, and the
    /// scan resumes past its window. Windows never overlap.
    pub fn apply(
        &self,
        editor: &mut CodeEditor<'_>,
        pool: &mut ConstantPool,
    ) -> Result<Vec<Replaced>> {
        let instructions = editor.code().instructions.clone();
        let offsets: Vec<u32> = editor.offsets().to_vec();
        let end_offset = offsets
            .last()
            .map(|&last| last + instructions.last().map_or(0, |insn| insn.width_at(last) as u32))
            .unwrap_or(0);
        let targets = branch_targets(editor.code(), &offsets);

        let mut replaced = Vec::new();
        let mut i = 0;
        'scan: while i < instructions.len() {
            for (rule_index, rule) in self.rules.iter().enumerate() {
                if rule.pattern.is_empty() || i + rule.pattern.len() > instructions.len() {
                    continue;
                }
                // A branch into the middle of the window pins it in place
                if offsets[i + 1..i + rule.pattern.len()]
                    .iter()
                    .any(|offset| targets.contains(offset))
                {
                    continue;
                }
                let mut bindings: HashMap<Wildcard, Binding> = HashMap::new();
                let window_matches = rule.pattern.iter().enumerate().all(|(j, pattern)| {
                    matches_insn(
                        pattern,
                        &instructions[i + j],
                        offsets[i + j],
                        &rule.pool,
                        pool,
                        &mut bindings,
                    )
                });
                if !window_matches {
                    continue;
                }

                let start = offsets[i];
                let end = offsets
                    .get(i + rule.pattern.len())
                    .copied()
                    .unwrap_or(end_offset);
                let items = realize(&rule.replacement, &rule.pool, pool, &bindings, editor)?;
                editor.replace(start..end, items)?;
                log::trace!("rule {} matched {}..{}", rule_index, start, end);
                replaced.push(Replaced {
                    rule: rule_index,
                    matched: start..end,
                });
                i += rule.pattern.len();
                continue 'scan;
            }
            i += 1;
        }
        Ok(replaced)
    }

    /// Rewrite a code buffer in place
    ///
    /// Returns what was replaced together with the flush's old-to-new offset map, through which
    /// each matched range can be located in the rewritten buffer.
    pub fn run(
        &self,
        code: &mut super::Code,
        pool: &mut ConstantPool,
    ) -> Result<(Vec<Replaced>, OffsetMap)> {
        let mut editor = CodeEditor::new(code);
        let replaced = self.apply(&mut editor, pool)?;
        let map = editor.flush()?;
        Ok((replaced, map))
    }
}

/// Every absolute offset some branch, switch, or exception handler can transfer control to
fn branch_targets(code: &super::Code, offsets: &[u32]) -> HashSet<u32> {
    let mut targets = HashSet::new();
    for (&offset, insn) in offsets.iter().zip(&code.instructions) {
        let _ = insn.map_targets(|rel| {
            targets.insert((offset as i64 + *rel as i64) as u32);
            Ok::<(), std::convert::Infallible>(())
        });
    }
    for handler in &code.exception_table {
        targets.extend([handler.start, handler.end, handler.handler]);
    }
    targets
}

fn bind(bindings: &mut HashMap<Wildcard, Binding>, wildcard: Wildcard, binding: Binding) -> bool {
    match bindings.get(&wildcard) {
        Some(existing) => *existing == binding,
        None => {
            bindings.insert(wildcard, binding);
            true
        }
    }
}

/// Like [`bind`], but a repeated constant wildcard compares structurally rather than by index
fn bind_const(
    bindings: &mut HashMap<Wildcard, Binding>,
    wildcard: Wildcard,
    index: ConstantIndex,
    pool: &ConstantPool,
) -> bool {
    match bindings.get(&wildcard) {
        Some(Binding::Const(existing)) => pool.structurally_equal(*existing, pool, index),
        Some(_) => false,
        None => {
            bindings.insert(wildcard, Binding::Const(index));
            true
        }
    }
}

fn matches_insn(
    pattern: &PatternInsn,
    insn: &Instruction<i32>,
    offset: u32,
    rule_pool: &ConstantPool,
    pool: &ConstantPool,
    bindings: &mut HashMap<Wildcard, Binding>,
) -> bool {
    match (pattern, insn) {
        (PatternInsn::Simple(opcode), Instruction::Simple(found)) => opcode == found,
        (
            PatternInsn::Push { opcode, value },
            Instruction::Push {
                opcode: found,
                value: found_value,
            },
        ) if opcode == found => match value {
            PatValue::Is(value) => value == found_value,
            PatValue::Any(wildcard) => bind(bindings, *wildcard, Binding::Value(*found_value)),
        },
        (
            PatternInsn::Var { opcode, index },
            Instruction::Var {
                opcode: found,
                index: found_index,
                ..
            },
        ) if opcode == found => match index {
            PatSlot::Is(index) => index == found_index,
            PatSlot::Any(wildcard) => bind(bindings, *wildcard, Binding::Slot(*found_index)),
        },
        (
            PatternInsn::Inc { index, delta },
            Instruction::Inc {
                index: found_index,
                delta: found_delta,
                ..
            },
        ) => {
            let index_ok = match index {
                PatSlot::Is(index) => index == found_index,
                PatSlot::Any(wildcard) => bind(bindings, *wildcard, Binding::Slot(*found_index)),
            };
            index_ok
                && match delta {
                    PatValue::Is(delta) => *delta == *found_delta as i32,
                    PatValue::Any(wildcard) => {
                        bind(bindings, *wildcard, Binding::Value(*found_delta as i32))
                    }
                }
        }
        (
            PatternInsn::Const { opcode, index },
            Instruction::Const {
                opcode: found,
                index: found_index,
                ..
            },
        ) if opcode == found => match index {
            PatConst::Is(index) => rule_pool.structurally_equal(*index, pool, *found_index),
            PatConst::Any(wildcard) => bind_const(bindings, *wildcard, *found_index, pool),
        },
        (
            PatternInsn::Branch { opcode, target },
            Instruction::Branch {
                opcode: found,
                target: rel,
                ..
            },
        ) if opcode == found => {
            let absolute = (offset as i64 + *rel as i64) as u32;
            match target {
                PatTarget::Any(wildcard) => bind(bindings, *wildcard, Binding::Target(absolute)),
            }
        }
        _ => false,
    }
}

fn realize(
    replacement: &[ReplacementInsn],
    rule_pool: &ConstantPool,
    pool: &mut ConstantPool,
    bindings: &HashMap<Wildcard, Binding>,
    editor: &mut CodeEditor<'_>,
) -> Result<Vec<Item>> {
    let bound = |wildcard: &Wildcard| -> Result<Binding> {
        bindings
            .get(wildcard)
            .copied()
            .ok_or(Error::UnboundWildcard(wildcard.0))
    };
    let value_of = |value: &RepValue| -> Result<i32> {
        match value {
            RepValue::Literal(value) => Ok(*value),
            RepValue::Bound(wildcard) => match bound(wildcard)? {
                Binding::Value(value) => Ok(value),
                _ => Err(Error::UnboundWildcard(wildcard.0)),
            },
        }
    };
    let slot_of = |slot: &RepSlot| -> Result<u16> {
        match slot {
            RepSlot::Literal(slot) => Ok(*slot),
            RepSlot::Bound(wildcard) => match bound(wildcard)? {
                Binding::Slot(slot) => Ok(slot),
                _ => Err(Error::UnboundWildcard(wildcard.0)),
            },
        }
    };

    let mut locals: HashMap<u16, Label> = HashMap::new();
    let mut items = Vec::with_capacity(replacement.len());
    for insn in replacement {
        let item = match insn {
            ReplacementInsn::Simple(opcode) => Item::Insn(Instruction::Simple(*opcode)),
            ReplacementInsn::Push { opcode, value } => Item::Insn(Instruction::Push {
                opcode: *opcode,
                value: value_of(value)?,
            }),
            ReplacementInsn::Var { opcode, index } => {
                Item::Insn(Instruction::var(*opcode, slot_of(index)?))
            }
            ReplacementInsn::Inc { index, delta } => {
                Item::Insn(Instruction::inc(slot_of(index)?, value_of(delta)? as i16))
            }
            ReplacementInsn::Const { opcode, index } => {
                let index = match index {
                    RepConst::Literal(index) => pool.copy_from(rule_pool, *index)?,
                    RepConst::Bound(wildcard) => match bound(wildcard)? {
                        Binding::Const(index) => index,
                        _ => return Err(Error::UnboundWildcard(wildcard.0)),
                    },
                };
                let insn = if *opcode == Opcode::LDC {
                    Instruction::ldc(index)
                } else if *opcode == Opcode::LDC2_W {
                    Instruction::ldc2(index)
                } else {
                    Instruction::Const {
                        opcode: *opcode,
                        index,
                        wide: false,
                    }
                };
                Item::Insn(insn)
            }
            ReplacementInsn::Branch { opcode, target } => {
                let label = match target {
                    RepTarget::Local(id) => *locals
                        .entry(*id)
                        .or_insert_with(|| editor.fresh_label()),
                    RepTarget::Bound(wildcard) => match bound(wildcard)? {
                        Binding::Target(absolute) => editor.target(absolute)?,
                        _ => return Err(Error::UnboundWildcard(wildcard.0)),
                    },
                };
                Item::Insn(Instruction::branch(*opcode, label))
            }
            ReplacementInsn::Mark(id) => {
                let label = *locals.entry(*id).or_insert_with(|| editor.fresh_label());
                Item::Mark(label)
            }
        };
        items.push(item);
    }
    Ok(items)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::code::{Code, ExceptionHandler};

    /// iconst_2; istore_0; goto L; iconst_3; L: ireturn
    fn sample() -> Code {
        Code {
            instructions: vec![
                Instruction::Simple(Opcode::ICONST_2),
                Instruction::var(Opcode::ISTORE, 0),
                Instruction::Branch {
                    opcode: Opcode::GOTO,
                    target: 4,
                    wide: false,
                },
                Instruction::Simple(Opcode::ICONST_3),
                Instruction::Simple(Opcode::IRETURN),
            ],
            ..Code::default()
        }
    }

    #[test]
    fn literal_pattern_rewrites_in_place() {
        let mut code = sample();
        let mut pool = ConstantPool::new();
        let rewriter = Rewriter::new(vec![Rule {
            pool: ConstantPool::new(),
            pattern: vec![
                PatternInsn::Simple(Opcode::ICONST_2),
                PatternInsn::Var {
                    opcode: Opcode::ISTORE,
                    index: PatSlot::Is(0),
                },
            ],
            replacement: vec![
                ReplacementInsn::Simple(Opcode::ICONST_4),
                ReplacementInsn::Var {
                    opcode: Opcode::ISTORE,
                    index: RepSlot::Literal(0),
                },
            ],
        }]);

        let (replaced, _) = rewriter.run(&mut code, &mut pool).unwrap();
        assert_eq!(
            replaced,
            vec![Replaced {
                rule: 0,
                matched: 0..2
            }]
        );
        assert_eq!(code.instructions[0], Instruction::Simple(Opcode::ICONST_4));
        // Same widths, so the goto is untouched
        assert_eq!(
            code.instructions[2],
            Instruction::Branch {
                opcode: Opcode::GOTO,
                target: 4,
                wide: false,
            }
        );
    }

    #[test]
    fn back_reference_requires_the_same_slot() {
        // aload W; aload W  should match  aload 1; aload 1  but not  aload 1; aload 2
        let rule = || Rule {
            pool: ConstantPool::new(),
            pattern: vec![
                PatternInsn::Var {
                    opcode: Opcode::ALOAD,
                    index: PatSlot::Any(Wildcard(0)),
                },
                PatternInsn::Var {
                    opcode: Opcode::ALOAD,
                    index: PatSlot::Any(Wildcard(0)),
                },
            ],
            replacement: vec![
                ReplacementInsn::Var {
                    opcode: Opcode::ALOAD,
                    index: RepSlot::Bound(Wildcard(0)),
                },
                ReplacementInsn::Simple(Opcode::DUP),
            ],
        };

        let mut pool = ConstantPool::new();
        let mut code = Code {
            instructions: vec![
                Instruction::var(Opcode::ALOAD, 1),
                Instruction::var(Opcode::ALOAD, 1),
                Instruction::Simple(Opcode::RETURN),
            ],
            ..Code::default()
        };
        let (replaced, _) = Rewriter::new(vec![rule()]).run(&mut code, &mut pool).unwrap();
        assert_eq!(replaced.len(), 1);
        assert_eq!(
            code.instructions[..2],
            [
                Instruction::var(Opcode::ALOAD, 1),
                Instruction::Simple(Opcode::DUP),
            ]
        );

        let mut code = Code {
            instructions: vec![
                Instruction::var(Opcode::ALOAD, 1),
                Instruction::var(Opcode::ALOAD, 2),
                Instruction::Simple(Opcode::RETURN),
            ],
            ..Code::default()
        };
        let (replaced, _) = Rewriter::new(vec![rule()]).run(&mut code, &mut pool).unwrap();
        assert!(replaced.is_empty());
    }

    #[test]
    fn constants_match_structurally_across_pools() {
        let mut rule_pool = ConstantPool::new();
        let wanted = rule_pool.string("hello").unwrap();
        let emitted = rule_pool.string("goodbye").unwrap();

        // The target pool has unrelated entries first, so indices differ from the rule's
        let mut pool = ConstantPool::new();
        pool.utf8("padding").unwrap();
        pool.long(99).unwrap();
        let target_index = pool.string("hello").unwrap();
        assert_ne!(wanted, target_index);

        let mut code = Code {
            instructions: vec![
                Instruction::ldc(target_index),
                Instruction::Simple(Opcode::ARETURN),
            ],
            ..Code::default()
        };
        let rewriter = Rewriter::new(vec![Rule {
            pool: rule_pool,
            pattern: vec![PatternInsn::Const {
                opcode: Opcode::LDC,
                index: PatConst::Is(wanted),
            }],
            replacement: vec![ReplacementInsn::Const {
                opcode: Opcode::LDC,
                index: RepConst::Literal(emitted),
            }],
        }]);

        let (replaced, _) = rewriter.run(&mut code, &mut pool).unwrap();
        assert_eq!(replaced.len(), 1);
        let index = code.instructions[0].constant_index().unwrap();
        assert!(matches!(
            pool.get(index),
            Some(crate::pool::Constant::String(_))
        ));
        // "goodbye" was minted into the target pool on demand
        let utf8 = match pool.get(index) {
            Some(crate::pool::Constant::String(utf8)) => *utf8,
            _ => unreachable!(),
        };
        assert_eq!(pool.get(utf8), Some(&crate::pool::Constant::Utf8("goodbye".to_owned())));
    }

    #[test]
    fn windows_with_interior_branch_targets_are_skipped() {
        // The goto lands on the iconst_3, which sits in the middle of a 2-wide window
        let mut code = Code {
            instructions: vec![
                Instruction::Branch {
                    opcode: Opcode::GOTO,
                    target: 4,
                    wide: false,
                },
                Instruction::Simple(Opcode::NOP),
                Instruction::Simple(Opcode::ICONST_3),
                Instruction::Simple(Opcode::IRETURN),
            ],
            ..Code::default()
        };
        let mut pool = ConstantPool::new();
        let rewriter = Rewriter::new(vec![Rule {
            pool: ConstantPool::new(),
            pattern: vec![
                PatternInsn::Simple(Opcode::NOP),
                PatternInsn::Simple(Opcode::ICONST_3),
            ],
            replacement: vec![ReplacementInsn::Simple(Opcode::ICONST_5)],
        }]);
        let (replaced, _) = rewriter.run(&mut code, &mut pool).unwrap();
        assert!(replaced.is_empty());

        // A window that starts exactly at the branch target is fine
        let rewriter = Rewriter::new(vec![Rule {
            pool: ConstantPool::new(),
            pattern: vec![
                PatternInsn::Simple(Opcode::ICONST_3),
                PatternInsn::Simple(Opcode::IRETURN),
            ],
            replacement: vec![
                ReplacementInsn::Simple(Opcode::ICONST_5),
                ReplacementInsn::Simple(Opcode::IRETURN),
            ],
        }]);
        let (replaced, _) = rewriter.run(&mut code, &mut pool).unwrap();
        assert_eq!(replaced.len(), 1);
        assert_eq!(code.instructions[2], Instruction::Simple(Opcode::ICONST_5));
    }

    #[test]
    fn captured_branch_targets_survive_resizing_replacements() {
        let mut code = sample();
        let mut pool = ConstantPool::new();
        // Swap the goto for a conditional jumping to the same place, preceded by a load
        let rewriter = Rewriter::new(vec![Rule {
            pool: ConstantPool::new(),
            pattern: vec![PatternInsn::Branch {
                opcode: Opcode::GOTO,
                target: PatTarget::Any(Wildcard(0)),
            }],
            replacement: vec![
                ReplacementInsn::Var {
                    opcode: Opcode::ILOAD,
                    index: RepSlot::Literal(0),
                },
                ReplacementInsn::Branch {
                    opcode: Opcode::IFNE,
                    target: RepTarget::Bound(Wildcard(0)),
                },
            ],
        }]);
        let (replaced, map) = rewriter.run(&mut code, &mut pool).unwrap();
        assert_eq!(replaced, vec![Replaced { rule: 0, matched: 2..5 }]);
        // The offset map locates the replacement in the rewritten buffer
        assert_eq!(map.get(replaced[0].matched.start), Some(2));
        assert_eq!(map.get(replaced[0].matched.end), Some(6));

        // iconst_2; istore_0; iload_0; ifne +4; iconst_3; ireturn
        assert_eq!(
            code.instructions[3],
            Instruction::Branch {
                opcode: Opcode::IFNE,
                target: 4,
                wide: false,
            }
        );
        assert_eq!(
            code.to_bytes().unwrap(),
            vec![0x05, 0x3b, 0x1a, 0x9a, 0x00, 0x04, 0x06, 0xac]
        );
    }

    #[test]
    fn replacement_branches_can_use_local_labels() {
        let mut code = Code {
            instructions: vec![
                Instruction::Simple(Opcode::NOP),
                Instruction::Simple(Opcode::RETURN),
            ],
            ..Code::default()
        };
        let mut pool = ConstantPool::new();
        // nop => goto over an unreachable athrow
        let rewriter = Rewriter::new(vec![Rule {
            pool: ConstantPool::new(),
            pattern: vec![PatternInsn::Simple(Opcode::NOP)],
            replacement: vec![
                ReplacementInsn::Branch {
                    opcode: Opcode::GOTO,
                    target: RepTarget::Local(0),
                },
                ReplacementInsn::Simple(Opcode::ATHROW),
                ReplacementInsn::Mark(0),
            ],
        }]);
        rewriter.run(&mut code, &mut pool).unwrap();
        assert_eq!(
            code.to_bytes().unwrap(),
            vec![0xa7, 0x00, 0x04, 0xbf, 0xb1]
        );
    }

    #[test]
    fn unbound_replacement_wildcard_is_an_error() {
        let mut code = sample();
        let mut pool = ConstantPool::new();
        let rewriter = Rewriter::new(vec![Rule {
            pool: ConstantPool::new(),
            pattern: vec![PatternInsn::Simple(Opcode::ICONST_2)],
            replacement: vec![ReplacementInsn::Var {
                opcode: Opcode::ISTORE,
                index: RepSlot::Bound(Wildcard(7)),
            }],
        }]);
        assert!(matches!(
            rewriter.run(&mut code, &mut pool),
            Err(Error::UnboundWildcard(7))
        ));
    }

    #[test]
    fn handler_boundaries_pin_windows_too() {
        let mut code = Code {
            instructions: vec![
                Instruction::Simple(Opcode::NOP),
                Instruction::Simple(Opcode::ICONST_3),
                Instruction::Simple(Opcode::IRETURN),
            ],
            exception_table: vec![ExceptionHandler {
                start: 0,
                end: 1,
                handler: 1,
                catch_type: None,
            }],
            ..Code::default()
        };
        let mut pool = ConstantPool::new();
        let rewriter = Rewriter::new(vec![Rule {
            pool: ConstantPool::new(),
            pattern: vec![
                PatternInsn::Simple(Opcode::NOP),
                PatternInsn::Simple(Opcode::ICONST_3),
            ],
            replacement: vec![ReplacementInsn::Simple(Opcode::ICONST_5)],
        }]);
        let (replaced, _) = rewriter.run(&mut code, &mut pool).unwrap();
        assert!(replaced.is_empty());
    }
}

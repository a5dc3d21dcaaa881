use super::layout::{self, Item, Mode};
use super::{Code, ExceptionHandler, Label, LabelGenerator, LineNumber, LocalVariable};
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

/// Old-offset to new-offset mapping produced by a flushed edit session
///
/// Every instruction boundary of the pre-edit buffer (plus the one-past-the-end offset) has an
/// entry. Offsets whose instruction was deleted map to the position where the deleted span's
/// remains would have started, which is the next surviving instruction.
#[derive(Clone, Debug, Default)]
pub struct OffsetMap {
    map: HashMap<u32, u32>,
}

impl OffsetMap {
    /// New offset of an old instruction boundary
    pub fn get(&self, old: u32) -> Option<u32> {
        self.map.get(&old).copied()
    }
}

#[derive(Default)]
struct InsertSet {
    before: Vec<Item>,
    after: Vec<Item>,
}

/// Offset-keyed editor over an existing [`Code`] buffer
///
/// Edits are scheduled against the offsets of the buffer as it was when the editor was opened,
/// and are only applied by [`CodeEditor::flush`]. Internally the buffer is lifted into label
/// space first: each original boundary gets a label, branches go from relative offsets to
/// labels, the scheduled items are woven in, and a preserve-mode layout pass re-resolves
/// everything. Branches therefore keep pointing at the instructions they pointed at before,
/// however far those moved, and a flush with no scheduled edits reproduces the input bytes
/// exactly.
pub struct CodeEditor<'a> {
    code: &'a mut Code,
    offsets: Vec<u32>,
    end_offset: u32,
    /// One label per original instruction boundary, plus one for `end_offset`
    boundary_labels: HashMap<u32, Label>,
    labels: LabelGenerator,
    inserts: BTreeMap<u32, InsertSet>,
    /// Scheduled replacements, keyed by span start; spans never overlap
    replacements: BTreeMap<u32, (u32, Vec<Item>)>,
}

impl<'a> CodeEditor<'a> {
    pub fn new(code: &'a mut Code) -> CodeEditor<'a> {
        let offsets = code.offsets();
        let end_offset = code.byte_len();
        let mut labels = LabelGenerator::new();
        let mut boundary_labels = HashMap::with_capacity(offsets.len() + 1);
        for &offset in offsets.iter().chain([&end_offset]) {
            boundary_labels.insert(offset, labels.fresh());
        }
        CodeEditor {
            code,
            offsets,
            end_offset,
            boundary_labels,
            labels,
            inserts: BTreeMap::new(),
            replacements: BTreeMap::new(),
        }
    }

    /// The buffer being edited, as it was when the editor was opened
    pub fn code(&self) -> &Code {
        self.code
    }

    /// Instruction boundary offsets of the original buffer
    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    /// Label standing for an original instruction boundary (or the end of the buffer)
    ///
    /// Inserted instructions can branch to these; after the flush they resolve to wherever the
    /// boundary ended up.
    pub fn target(&self, old_offset: u32) -> Result<Label> {
        self.boundary_labels
            .get(&old_offset)
            .copied()
            .ok_or(Error::InvalidOffset(old_offset))
    }

    /// Fresh label for branches internal to inserted code; place it with [`Item::Mark`]
    pub fn fresh_label(&mut self) -> Label {
        self.labels.fresh()
    }

    fn check_boundary(&self, offset: u32) -> Result<()> {
        if self.boundary_labels.contains_key(&offset) {
            Ok(())
        } else {
            Err(Error::InvalidOffset(offset))
        }
    }

    /// Does any scheduled replacement strictly contain `offset`?
    fn inside_replacement(&self, offset: u32) -> bool {
        match self.replacements.range(..=offset).next_back() {
            Some((&start, &(end, _))) => start < offset && offset < end,
            None => false,
        }
    }

    /// Schedule items to run just before the instruction at `old_offset` (or at the very end,
    /// for the one-past-the-end offset)
    pub fn insert_before(&mut self, old_offset: u32, items: Vec<Item>) -> Result<()> {
        self.check_boundary(old_offset)?;
        if self.inside_replacement(old_offset) {
            return Err(Error::ConflictingEdit(old_offset));
        }
        self.inserts
            .entry(old_offset)
            .or_default()
            .before
            .extend(items);
        Ok(())
    }

    /// Schedule items to run just after the instruction at `old_offset`
    ///
    /// If that instruction is the start of a replaced span, the items run after the replacement.
    pub fn insert_after(&mut self, old_offset: u32, items: Vec<Item>) -> Result<()> {
        if old_offset == self.end_offset {
            return Err(Error::InvalidOffset(old_offset));
        }
        self.check_boundary(old_offset)?;
        if self.inside_replacement(old_offset) {
            return Err(Error::ConflictingEdit(old_offset));
        }
        self.inserts
            .entry(old_offset)
            .or_default()
            .after
            .extend(items);
        Ok(())
    }

    /// Schedule the instructions spanning `range` (old offsets) to be replaced by `items`
    ///
    /// Both ends must be instruction boundaries; the end may be one-past-the-end. The range must
    /// not overlap another replacement or contain an already-scheduled insertion.
    pub fn replace(&mut self, range: Range<u32>, items: Vec<Item>) -> Result<()> {
        if range.start >= range.end {
            return Err(Error::InvalidOffset(range.start));
        }
        self.check_boundary(range.start)?;
        self.check_boundary(range.end)?;

        if let Some((&start, &(end, _))) = self.replacements.range(..range.end).next_back() {
            if end > range.start {
                return Err(Error::ConflictingEdit(start.max(range.start)));
            }
        }
        for (&offset, insert) in self.inserts.range(range.start..range.end) {
            // Insertions pinned to the span's first instruction survive around the replacement;
            // ones pinned to an interior instruction have nowhere to go
            if offset > range.start && (!insert.before.is_empty() || !insert.after.is_empty()) {
                return Err(Error::ConflictingEdit(offset));
            }
        }

        self.replacements.insert(range.start, (range.end, items));
        Ok(())
    }

    /// Schedule the instructions spanning `range` to be removed
    ///
    /// Branches into the removed span are clamped to the next surviving instruction.
    pub fn delete(&mut self, range: Range<u32>) -> Result<()> {
        self.replace(range, Vec::new())
    }

    /// Apply every scheduled edit, rewrite the metadata tables, and return the offset map
    ///
    /// On error the underlying buffer is left untouched.
    pub fn flush(mut self) -> Result<OffsetMap> {
        let mut items: Vec<Item> = Vec::with_capacity(self.offsets.len() * 2);
        let mut skip_until: Option<u32> = None;

        for (index, &offset) in self.offsets.iter().enumerate() {
            // The mark comes first so that offsets inside a deleted span resolve to the point
            // where the span's replacement (possibly nothing) begins
            items.push(Item::Mark(self.boundary_labels[&offset]));

            if skip_until.map_or(false, |until| offset >= until) {
                skip_until = None;
            }
            let inserts = self.inserts.remove(&offset);
            if let Some(set) = &inserts {
                items.extend(set.before.iter().cloned());
            }
            if skip_until.is_some() {
                continue;
            }

            if let Some((end, replacement)) = self.replacements.remove(&offset) {
                items.extend(replacement);
                skip_until = Some(end);
            } else {
                let insn = self.code.instructions[index].map_targets(|rel| {
                    let absolute = offset as i64 + *rel as i64;
                    u32::try_from(absolute)
                        .ok()
                        .and_then(|absolute| self.boundary_labels.get(&absolute).copied())
                        .ok_or(Error::InvalidOffset(absolute as u32))
                })?;
                items.push(Item::Insn(insn));
            }

            if let Some(set) = inserts {
                items.extend(set.after);
            }
        }

        items.push(Item::Mark(self.boundary_labels[&self.end_offset]));
        if let Some(set) = self.inserts.remove(&self.end_offset) {
            items.extend(set.before);
        }

        let layout = layout::resolve(items, Mode::Preserve, &mut self.labels)?;
        log::debug!(
            "flush: {} bytes -> {} bytes",
            self.end_offset,
            layout.byte_len
        );

        let map_old = |old: u32| -> Result<u32> {
            let label = self
                .boundary_labels
                .get(&old)
                .ok_or(Error::InvalidOffset(old))?;
            layout
                .label_offsets
                .get(label)
                .copied()
                .ok_or(Error::InvalidOffset(old))
        };
        let exception_table = self
            .code
            .exception_table
            .iter()
            .map(|handler| {
                Ok(ExceptionHandler {
                    start: map_old(handler.start)?,
                    end: map_old(handler.end)?,
                    handler: map_old(handler.handler)?,
                    catch_type: handler.catch_type,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let line_numbers = self
            .code
            .line_numbers
            .iter()
            .map(|entry| {
                Ok(LineNumber {
                    start: map_old(entry.start)?,
                    line: entry.line,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let local_variables = self
            .code
            .local_variables
            .iter()
            .map(|variable| {
                Ok(LocalVariable {
                    start: map_old(variable.start)?,
                    end: map_old(variable.end)?,
                    name: variable.name,
                    descriptor: variable.descriptor,
                    index: variable.index,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut map = HashMap::with_capacity(self.boundary_labels.len());
        for (&old, label) in &self.boundary_labels {
            map.insert(old, layout.label_offsets[label]);
        }

        self.code.instructions = layout.instructions;
        self.code.exception_table = exception_table;
        self.code.line_numbers = line_numbers;
        self.code.local_variables = local_variables;
        Ok(OffsetMap { map })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::code::{Instruction, Opcode};

    /// iconst_2; istore_0; goto L; iconst_3; L: ireturn
    fn sample() -> Code {
        Code {
            max_stack: 1,
            max_locals: 1,
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
    fn empty_flush_reproduces_the_input_bytes() {
        let mut code = sample();
        let before = code.to_bytes().unwrap();
        let map = CodeEditor::new(&mut code).flush().unwrap();
        assert_eq!(code.to_bytes().unwrap(), before);
        for offset in [0, 1, 2, 5, 6, 7] {
            assert_eq!(map.get(offset), Some(offset));
        }
    }

    #[test]
    fn empty_flush_keeps_wide_encodings() {
        let mut code = Code {
            instructions: vec![
                Instruction::Branch {
                    opcode: Opcode::GOTO,
                    target: 6,
                    wide: true,
                },
                Instruction::Simple(Opcode::NOP),
                Instruction::Simple(Opcode::RETURN),
            ],
            ..Code::default()
        };
        let before = code.to_bytes().unwrap();
        CodeEditor::new(&mut code).flush().unwrap();
        assert_eq!(code.to_bytes().unwrap(), before);
    }

    #[test]
    fn insertion_shifts_downstream_branch_targets() {
        let mut code = sample();
        let mut editor = CodeEditor::new(&mut code);
        // Squeeze a nop in front of the iconst_3 the goto jumps over
        editor
            .insert_before(5, vec![Item::Insn(Instruction::Simple(Opcode::NOP))])
            .unwrap();
        let map = editor.flush().unwrap();

        assert_eq!(map.get(5), Some(5));
        assert_eq!(map.get(6), Some(7));
        // The goto still skips the (shifted) iconst_3
        assert_eq!(
            code.instructions[2],
            Instruction::Branch {
                opcode: Opcode::GOTO,
                target: 5,
                wide: false,
            }
        );
        assert_eq!(
            code.to_bytes().unwrap(),
            vec![0x05, 0x3b, 0xa7, 0x00, 0x05, 0x00, 0x06, 0xac]
        );
    }

    #[test]
    fn inserted_code_can_branch_to_old_offsets() {
        let mut code = sample();
        let mut editor = CodeEditor::new(&mut code);
        let to_return = editor.target(6).unwrap();
        editor
            .insert_before(
                0,
                vec![Item::Insn(Instruction::branch(Opcode::GOTO, to_return))],
            )
            .unwrap();
        let map = editor.flush().unwrap();

        assert_eq!(
            code.instructions[0],
            Instruction::Branch {
                opcode: Opcode::GOTO,
                target: map.get(6).unwrap() as i32,
                wide: false,
            }
        );
    }

    #[test]
    fn deleted_offsets_clamp_to_the_next_survivor() {
        let mut code = sample();
        let mut editor = CodeEditor::new(&mut code);
        editor.delete(1..2).unwrap();
        let map = editor.flush().unwrap();

        assert_eq!(map.get(0), Some(0));
        // The istore_0 at old offset 1 is gone; its offset lands on what follows
        assert_eq!(map.get(1), Some(1));
        assert_eq!(map.get(2), Some(1));
        assert_eq!(code.to_bytes().unwrap(), vec![0x05, 0xa7, 0x00, 0x04, 0x06, 0xac]);
    }

    #[test]
    fn branches_into_a_deleted_span_retarget_to_the_survivor() {
        // goto jumps to the iconst_3; deleting it makes the goto land on the ireturn instead
        let mut code = Code {
            instructions: vec![
                Instruction::Branch {
                    opcode: Opcode::GOTO,
                    target: 3,
                    wide: false,
                },
                Instruction::Simple(Opcode::ICONST_3),
                Instruction::Simple(Opcode::IRETURN),
            ],
            ..Code::default()
        };
        let mut editor = CodeEditor::new(&mut code);
        editor.delete(3..4).unwrap();
        editor.flush().unwrap();

        assert_eq!(
            code.instructions,
            vec![
                Instruction::Branch {
                    opcode: Opcode::GOTO,
                    target: 3,
                    wide: false,
                },
                Instruction::Simple(Opcode::IRETURN),
            ]
        );
        assert_eq!(code.to_bytes().unwrap(), vec![0xa7, 0x00, 0x03, 0xac]);
    }

    #[test]
    fn replacement_rewrites_a_span() {
        let mut code = sample();
        let mut editor = CodeEditor::new(&mut code);
        editor
            .replace(
                0..2,
                vec![
                    Item::Insn(Instruction::Simple(Opcode::ICONST_4)),
                    Item::Insn(Instruction::var(Opcode::ISTORE, 1)),
                ],
            )
            .unwrap();
        editor.flush().unwrap();
        assert_eq!(
            code.instructions[..2],
            [
                Instruction::Simple(Opcode::ICONST_4),
                Instruction::var(Opcode::ISTORE, 1),
            ]
        );
    }

    #[test]
    fn overlapping_replacements_conflict() {
        let mut code = sample();
        let mut editor = CodeEditor::new(&mut code);
        editor.replace(0..5, Vec::new()).unwrap();
        assert!(matches!(
            editor.replace(2..6, Vec::new()),
            Err(Error::ConflictingEdit(2))
        ));
        assert!(matches!(
            editor.insert_before(2, Vec::new()),
            Err(Error::ConflictingEdit(2))
        ));
    }

    #[test]
    fn replacing_over_an_interior_insertion_conflicts() {
        let mut code = sample();
        let mut editor = CodeEditor::new(&mut code);
        editor
            .insert_after(2, vec![Item::Insn(Instruction::Simple(Opcode::NOP))])
            .unwrap();
        assert!(matches!(
            editor.replace(0..5, Vec::new()),
            Err(Error::ConflictingEdit(2))
        ));
    }

    #[test]
    fn non_boundary_offsets_are_rejected() {
        let mut code = sample();
        let mut editor = CodeEditor::new(&mut code);
        assert!(matches!(editor.target(3), Err(Error::InvalidOffset(3))));
        assert!(matches!(
            editor.insert_before(4, Vec::new()),
            Err(Error::InvalidOffset(4))
        ));
        assert!(matches!(
            editor.insert_after(7, Vec::new()),
            Err(Error::InvalidOffset(7))
        ));
    }

    #[test]
    fn exception_table_moves_with_the_code() {
        let mut code = sample();
        code.exception_table.push(ExceptionHandler {
            start: 2,
            end: 5,
            handler: 6,
            catch_type: None,
        });
        let mut editor = CodeEditor::new(&mut code);
        editor
            .insert_before(0, vec![Item::Insn(Instruction::Simple(Opcode::NOP))])
            .unwrap();
        editor.flush().unwrap();
        let entry = &code.exception_table[0];
        assert_eq!((entry.start, entry.end, entry.handler), (3, 6, 7));
    }
}

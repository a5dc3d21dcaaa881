use super::layout::{self, Item, Mode};
use super::{Code, ExceptionHandler, Instruction, Label, LabelGenerator, LineNumber, LocalVariable, Opcode};
use crate::pool::ConstantPool;
use crate::{Error, Result};
use std::collections::HashMap;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum LabelState {
    /// Known but not yet placed; remembers the fragment it belongs to
    Created { fragment: Option<usize> },
    Placed,
    /// Its owning fragment ended while it was still unplaced
    Closed,
}

struct FragmentScope {
    id: usize,
    max_length: usize,
    start: Label,
    created: Vec<Label>,
}

/// Label-based assembler for method bodies
///
/// Instructions are accumulated verbatim with [`Label`] branch targets; [`CodeComposer::finish`]
/// runs the fixed-point layout pass that resolves every label to a byte offset, promoting narrow
/// branches that turn out to be oversized. Exception ranges, line numbers, and local variable
/// ranges are anchored to labels and resolved alongside.
///
/// Fragments bound label validity: a label minted inside [`CodeComposer::begin_fragment`] /
/// [`CodeComposer::end_fragment`] must be placed before the fragment closes, and the fragment's
/// final byte span is checked against the length bound it declared.
pub struct CodeComposer<'a> {
    pool: &'a mut ConstantPool,
    items: Vec<Item>,
    labels: LabelGenerator,
    states: HashMap<Label, LabelState>,
    open_fragments: Vec<FragmentScope>,
    next_fragment_id: usize,
    /// Closed fragment spans to check at finish: (start, end, max byte length)
    budgets: Vec<(Label, Label, usize)>,
    exception_table: Vec<ExceptionHandler<Label>>,
    line_numbers: Vec<LineNumber<Label>>,
    local_variables: Vec<LocalVariable<Label>>,
    max_stack: u16,
    max_locals: u16,
    shrink: bool,
}

impl<'a> CodeComposer<'a> {
    /// Create a composer minting constants into the given pool
    pub fn new(pool: &'a mut ConstantPool) -> CodeComposer<'a> {
        CodeComposer {
            pool,
            items: Vec::new(),
            labels: LabelGenerator::new(),
            states: HashMap::new(),
            open_fragments: Vec::new(),
            next_fragment_id: 0,
            budgets: Vec::new(),
            exception_table: Vec::new(),
            line_numbers: Vec::new(),
            local_variables: Vec::new(),
            max_stack: 0,
            max_locals: 0,
            shrink: true,
        }
    }

    /// Toggle opportunistic shrinking of wide encodings at finish (on by default)
    pub fn shrink(&mut self, enabled: bool) -> &mut Self {
        self.shrink = enabled;
        self
    }

    /// Record the operand stack and local slot limits of the finished body
    pub fn limits(&mut self, max_stack: u16, max_locals: u16) -> &mut Self {
        self.max_stack = max_stack;
        self.max_locals = max_locals;
        self
    }

    /// Get a fresh unplaced label
    pub fn fresh_label(&mut self) -> Label {
        let label = self.labels.fresh();
        self.register(label);
        label
    }

    fn register(&mut self, label: Label) {
        if self.states.contains_key(&label) {
            return;
        }
        self.labels.reserve_past(label);
        let fragment = self.open_fragments.last().map(|scope| scope.id);
        self.states.insert(label, LabelState::Created { fragment });
        if let Some(scope) = self.open_fragments.last_mut() {
            scope.created.push(label);
        }
    }

    /// Mark the current write position as the resolution of `label`
    ///
    /// Caller-chosen labels that this composer has never seen are registered on the fly.
    pub fn place_label(&mut self, label: Label) -> Result<&mut Self> {
        self.register(label);
        match self.states[&label] {
            LabelState::Created { .. } => {}
            LabelState::Placed => return Err(Error::DuplicateLabel(label)),
            LabelState::Closed => return Err(Error::ClosedFragmentLabel(label)),
        }
        self.states.insert(label, LabelState::Placed);
        self.items.push(Item::Mark(label));
        Ok(self)
    }

    /// Append an instruction verbatim
    pub fn push(&mut self, insn: Instruction<Label>) -> &mut Self {
        let _ = insn.map_targets(|label| {
            self.register(*label);
            Ok::<(), std::convert::Infallible>(())
        });
        self.items.push(Item::Insn(insn));
        self
    }

    /// Open a nested composition scope whose final byte span must stay within `max_length`
    pub fn begin_fragment(&mut self, max_length: usize) -> &mut Self {
        let start = self.fresh_label();
        self.states.insert(start, LabelState::Placed);
        self.items.push(Item::Mark(start));
        let id = self.next_fragment_id;
        self.next_fragment_id += 1;
        self.open_fragments.push(FragmentScope {
            id,
            max_length,
            start,
            created: Vec::new(),
        });
        self
    }

    /// Close the innermost fragment, invalidating its unplaced labels
    pub fn end_fragment(&mut self) -> Result<&mut Self> {
        let scope = self
            .open_fragments
            .pop()
            .ok_or(Error::UnbalancedFragment("end_fragment without begin_fragment"))?;
        for label in &scope.created {
            if matches!(self.states[label], LabelState::Created { .. }) {
                self.states.insert(*label, LabelState::Closed);
            }
        }
        let end = self.fresh_label();
        self.states.insert(end, LabelState::Placed);
        self.items.push(Item::Mark(end));
        self.budgets.push((scope.start, end, scope.max_length));
        Ok(self)
    }

    /// Guard `[start, end)` with a handler anchored at the current position
    ///
    /// `catch_type` of `None` makes a catch-all range. Returns the handler label.
    pub fn catch(
        &mut self,
        start: Label,
        end: Label,
        catch_type: Option<&str>,
    ) -> Result<Label> {
        self.register(start);
        self.register(end);
        let handler = self.fresh_label();
        self.place_label(handler)?;
        let catch_type = match catch_type {
            Some(class) => Some(self.pool.class_of(class)?),
            None => None,
        };
        self.exception_table.push(ExceptionHandler {
            start,
            end,
            handler,
            catch_type,
        });
        Ok(handler)
    }

    /// Anchor a source line number at the current position
    pub fn line(&mut self, line: u16) -> Result<&mut Self> {
        let at = self.fresh_label();
        self.place_label(at)?;
        self.line_numbers.push(LineNumber { start: at, line });
        Ok(self)
    }

    /// Record a named local variable live between two labels
    pub fn local_variable(
        &mut self,
        start: Label,
        end: Label,
        name: &str,
        descriptor: &str,
        index: u16,
    ) -> Result<&mut Self> {
        self.register(start);
        self.register(end);
        let name = self.pool.utf8(name)?;
        let descriptor = self.pool.utf8(descriptor)?;
        self.local_variables.push(LocalVariable {
            start,
            end,
            name,
            descriptor,
            index,
        });
        Ok(self)
    }

    /// Push the shortest sequence loading an `int` constant
    pub fn const_int(&mut self, value: i32) -> Result<&mut Self> {
        let insn = match Instruction::push_int(value) {
            Some(insn) => insn,
            None => Instruction::ldc(self.pool.integer(value)?),
        };
        self.push(insn);
        Ok(self)
    }

    /// Push an `ldc` of a string constant
    pub fn const_string(&mut self, value: &str) -> Result<&mut Self> {
        let index = self.pool.string(value)?;
        self.push(Instruction::ldc(index));
        Ok(self)
    }

    /// Push an `ldc2_w` of a long constant
    pub fn const_long(&mut self, value: i64) -> Result<&mut Self> {
        let index = self.pool.long(value)?;
        self.push(Instruction::ldc2(index));
        Ok(self)
    }

    fn member_insn(
        &mut self,
        opcode: Opcode,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<&mut Self> {
        let field = matches!(
            opcode,
            Opcode::GETFIELD | Opcode::PUTFIELD | Opcode::GETSTATIC | Opcode::PUTSTATIC
        );
        let index = if field {
            self.pool.field_ref(class, name, descriptor)?
        } else {
            self.pool.method_ref(class, name, descriptor)?
        };
        self.push(Instruction::Const {
            opcode,
            index,
            wide: false,
        });
        Ok(self)
    }

    pub fn invoke_virtual(&mut self, class: &str, name: &str, descriptor: &str) -> Result<&mut Self> {
        self.member_insn(Opcode::INVOKEVIRTUAL, class, name, descriptor)
    }

    pub fn invoke_static(&mut self, class: &str, name: &str, descriptor: &str) -> Result<&mut Self> {
        self.member_insn(Opcode::INVOKESTATIC, class, name, descriptor)
    }

    pub fn invoke_special(&mut self, class: &str, name: &str, descriptor: &str) -> Result<&mut Self> {
        self.member_insn(Opcode::INVOKESPECIAL, class, name, descriptor)
    }

    /// `invokeinterface`, whose encoding carries the argument slot count
    pub fn invoke_interface(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
        count: u8,
    ) -> Result<&mut Self> {
        let index = self.pool.interface_method_ref(class, name, descriptor)?;
        self.push(Instruction::InvokeInterface { index, count });
        Ok(self)
    }

    pub fn get_field(&mut self, class: &str, name: &str, descriptor: &str) -> Result<&mut Self> {
        self.member_insn(Opcode::GETFIELD, class, name, descriptor)
    }

    pub fn put_field(&mut self, class: &str, name: &str, descriptor: &str) -> Result<&mut Self> {
        self.member_insn(Opcode::PUTFIELD, class, name, descriptor)
    }

    pub fn get_static(&mut self, class: &str, name: &str, descriptor: &str) -> Result<&mut Self> {
        self.member_insn(Opcode::GETSTATIC, class, name, descriptor)
    }

    pub fn new_object(&mut self, class: &str) -> Result<&mut Self> {
        let index = self.pool.class_of(class)?;
        self.push(Instruction::Const {
            opcode: Opcode::NEW,
            index,
            wide: false,
        });
        Ok(self)
    }

    /// Resolve all labels and produce the finished body
    pub fn finish(mut self) -> Result<Code> {
        if !self.open_fragments.is_empty() {
            return Err(Error::UnbalancedFragment("fragment still open at finish"));
        }

        // Fail on references into closed fragments before running layout, so the error names the
        // misuse rather than a generic unresolved label
        let mut referenced: Vec<Label> = Vec::new();
        for item in &self.items {
            if let Item::Insn(insn) = item {
                let _ = insn.map_targets(|label| {
                    referenced.push(*label);
                    Ok::<(), std::convert::Infallible>(())
                });
            }
        }
        for handler in &self.exception_table {
            referenced.extend([handler.start, handler.end, handler.handler]);
        }
        for variable in &self.local_variables {
            referenced.extend([variable.start, variable.end]);
        }
        for label in referenced {
            match self.states.get(&label) {
                Some(LabelState::Placed) => {}
                Some(LabelState::Closed) => return Err(Error::ClosedFragmentLabel(label)),
                _ => return Err(Error::UnresolvedLabel(label)),
            }
        }

        let mode = if self.shrink { Mode::Shrink } else { Mode::Preserve };
        let layout = layout::resolve(self.items, mode, &mut self.labels)?;

        for (start, end, max_length) in &self.budgets {
            let span = (layout.label_offsets[end] - layout.label_offsets[start]) as usize;
            if span > *max_length {
                return Err(Error::CodeOverflow {
                    length: span,
                    max: *max_length,
                });
            }
        }

        let offset_of = |label: &Label| -> Result<u32> {
            layout
                .label_offsets
                .get(label)
                .copied()
                .ok_or(Error::UnresolvedLabel(*label))
        };
        let exception_table = self
            .exception_table
            .iter()
            .map(|handler| {
                Ok(ExceptionHandler {
                    start: offset_of(&handler.start)?,
                    end: offset_of(&handler.end)?,
                    handler: offset_of(&handler.handler)?,
                    catch_type: handler.catch_type,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let line_numbers = self
            .line_numbers
            .iter()
            .map(|entry| {
                Ok(LineNumber {
                    start: offset_of(&entry.start)?,
                    line: entry.line,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let local_variables = self
            .local_variables
            .iter()
            .map(|variable| {
                Ok(LocalVariable {
                    start: offset_of(&variable.start)?,
                    end: offset_of(&variable.end)?,
                    name: variable.name,
                    descriptor: variable.descriptor,
                    index: variable.index,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Code {
            max_stack: self.max_stack,
            max_locals: self.max_locals,
            instructions: layout.instructions,
            exception_table,
            line_numbers,
            local_variables,
        })
    }
}

use super::Instruction;
use crate::pool::{ConstantIndex, RemapTable};
use crate::Result;

/// One entry of the exception table, guarding `[start, end)` with a handler
///
/// `catch_type` of `None` catches everything (a `finally` range). The target type `T` is a
/// [`Label`][super::Label] during composition and a byte offset in a finalized [`Code`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExceptionHandler<T> {
    pub start: T,
    pub end: T,
    pub handler: T,
    pub catch_type: Option<ConstantIndex>,
}

/// One entry of the `LineNumberTable` attribute
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineNumber<T> {
    pub start: T,
    pub line: u16,
}

/// One entry of the `LocalVariableTable` attribute, live over `[start, end)`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalVariable<T> {
    pub start: T,
    pub end: T,
    pub name: ConstantIndex,
    pub descriptor: ConstantIndex,
    pub index: u16,
}

/// A resolved method body: instruction buffer plus the offset-keyed metadata tables that must
/// stay consistent with it
///
/// Branch targets are JVM-style offsets relative to the start of the branching instruction.
/// The binary reader/writer for the surrounding `Code` attribute lives outside this crate; this
/// type holds exactly the parts editing has to keep consistent.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub instructions: Vec<Instruction<i32>>,
    pub exception_table: Vec<ExceptionHandler<u32>>,
    pub line_numbers: Vec<LineNumber<u32>>,
    pub local_variables: Vec<LocalVariable<u32>>,
}

impl Code {
    /// Byte offset of every instruction, in order
    pub fn offsets(&self) -> Vec<u32> {
        let mut offsets = Vec::with_capacity(self.instructions.len());
        let mut offset = 0u32;
        for insn in &self.instructions {
            offsets.push(offset);
            offset += insn.width_at(offset) as u32;
        }
        offsets
    }

    /// Total encoded length in bytes
    pub fn byte_len(&self) -> u32 {
        let mut offset = 0u32;
        for insn in &self.instructions {
            offset += insn.width_at(offset) as u32;
        }
        offset
    }

    /// Serialize the instruction buffer to its exact class-file byte encoding
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        let mut offset = 0u32;
        for insn in &self.instructions {
            insn.encode(offset, &mut bytes)?;
            offset += insn.width_at(offset) as u32;
        }
        Ok(bytes)
    }

    /// Rewrite every constant pool index in the buffer and tables through a remap table
    ///
    /// This is the instruction-stream leg of the full-class remap pass that must follow
    /// [`ConstantPool::sort_and_compact`][crate::pool::ConstantPool::sort_and_compact] and
    /// friends.
    pub fn remap_constants(&mut self, table: &RemapTable) -> Result<()> {
        for insn in self.instructions.iter_mut() {
            if let Some(index) = insn.constant_index_mut() {
                *index = table.remap(*index)?;
            }
        }
        for handler in self.exception_table.iter_mut() {
            if let Some(catch_type) = handler.catch_type {
                handler.catch_type = Some(table.remap(catch_type)?);
            }
        }
        for variable in self.local_variables.iter_mut() {
            variable.name = table.remap(variable.name)?;
            variable.descriptor = table.remap(variable.descriptor)?;
        }
        Ok(())
    }
}

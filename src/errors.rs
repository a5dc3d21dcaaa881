use crate::code::Label;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while editing a class
///
/// Every error aborts the edit session that raised it without committing partial mutation:
/// composer and editor state is buffered and only flushed into the owning structures on success.
#[derive(Debug, Error)]
pub enum Error {
    #[error("constant pool cannot fit an entry of width {width} at index {index}")]
    PoolOverflow { index: u16, width: usize },

    #[error("constant index {0} has no mapping after compaction")]
    DanglingReference(u16),

    #[error("label {0:?} is referenced but never placed")]
    UnresolvedLabel(Label),

    #[error("label {0:?} belongs to a fragment that already closed")]
    ClosedFragmentLabel(Label),

    #[error("label {0:?} has already been placed")]
    DuplicateLabel(Label),

    #[error("conflicting edits scheduled at offset {0}")]
    ConflictingEdit(u32),

    #[error("offset {0} does not fall on an instruction boundary")]
    InvalidOffset(u32),

    #[error("branch of {distance} bytes cannot be encoded even in wide form")]
    BranchOverflow { distance: i64 },

    #[error("code length {length} exceeds the permitted maximum of {max}")]
    CodeOverflow { length: usize, max: usize },

    #[error("instruction layout did not converge after {0} passes")]
    LayoutDiverged(usize),

    #[error("unbalanced fragment: {0}")]
    UnbalancedFragment(&'static str),

    #[error("wildcard {0} is unbound or bound to a different operand kind")]
    UnboundWildcard(u16),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

//! Method body representation, assembly, and editing
//!
//! Three ways in, one representation:
//!
//!   - [`CodeComposer`] assembles a body from scratch against labels
//!   - [`CodeEditor`] schedules offset-keyed edits over an existing body and reconciles every
//!     branch and metadata table when flushed
//!   - [`Rewriter`] drives the editor from declarative wildcard [`Rule`]s
//!
//! All three funnel through the same fixed-point [`layout`] pass, which is where branch widths
//! and switch padding actually get decided.

mod code;
mod composer;
mod editor;
mod instruction;
mod label;
pub mod layout;
pub mod matcher;

pub use code::{Code, ExceptionHandler, LineNumber, LocalVariable};
pub use composer::CodeComposer;
pub use editor::{CodeEditor, OffsetMap};
pub use instruction::{Instruction, Opcode, VarForm};
pub use label::{Label, LabelGenerator};
pub use layout::{Item, Mode};
pub use matcher::{Rewriter, Rule};

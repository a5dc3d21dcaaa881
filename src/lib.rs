//! In-memory editing of JVM class-file bytecode
//!
//! The crate is organized around two mutable structures and the passes that keep them
//! consistent:
//!
//!   - [`pool::ConstantPool`] holds class-file constants with deduplicating insertion,
//!     structural comparison across pools, and compaction passes that hand back a
//!     [`pool::RemapTable`] for patching up everything that held an index
//!
//!   - [`code::Code`] holds a method body; [`code::CodeComposer`] builds one from labels,
//!     [`code::CodeEditor`] edits one by offset while keeping branches and metadata tables
//!     pointing at the right instructions, and [`code::Rewriter`] rewrites instruction
//!     sequences matched by wildcard rules
//!
//! Parsing and writing whole class files is out of scope; callers hand in decoded pools and
//! bodies and get the edited forms back.

mod errors;

pub mod code;
pub mod pool;
pub mod util;

pub use errors::{Error, Result};

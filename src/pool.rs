//! Constant pool management
//!
//! The pool is the class file's deduplicated table of literal and reference values. Entries are
//! indexed starting at 1 and the index space is 16 bits wide; `Long` and `Double` entries occupy
//! two consecutive index slots, the second of which is an unusable tombstone. All of this is
//! modelled with an [`OffsetVec`] whose offsets are index slots.
//!
//! Besides appending and deduplicating inserts, the pool supports two whole-table passes:
//!
//!   - [`ConstantPool::sort_and_compact`] orders entries by content for deterministic output and
//!     merges structural duplicates
//!   - [`ConstantPool::shrink_unused_name_and_types`] drops `NameAndType` entries nothing
//!     references
//!
//! Both return a [`RemapTable`] through which every index-bearing structure of the class must be
//! rewritten before the pool is used again.

use crate::util::{Offset, OffsetVec, Width};
use crate::{Error, Result};
use std::collections::HashMap;

/// Largest index slot a constant pool can use (indexing starts at 1)
pub const MAX_POOL_SLOTS: usize = u16::MAX as usize + 1;

/// Index of a constant pool entry
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct ConstantIndex(pub u16);

/// Type of method handle
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum HandleKind {
    GetField,
    GetStatic,
    PutField,
    PutStatic,
    InvokeVirtual,
    InvokeStatic,
    InvokeSpecial,
    NewInvokeSpecial,
    InvokeInterface,
}

impl HandleKind {
    pub fn tag(self) -> u8 {
        match self {
            HandleKind::GetField => 1,
            HandleKind::GetStatic => 2,
            HandleKind::PutField => 3,
            HandleKind::PutStatic => 4,
            HandleKind::InvokeVirtual => 5,
            HandleKind::InvokeStatic => 6,
            HandleKind::InvokeSpecial => 7,
            HandleKind::NewInvokeSpecial => 8,
            HandleKind::InvokeInterface => 9,
        }
    }
}

/// Constants as in the constant pool
///
/// Equality is structural per variant. Floating point entries store the raw bit pattern so that
/// equality, hashing, and ordering are total and bit-exact (`NaN` payloads included); use
/// [`Constant::float`] and [`Constant::double`] to build them from numeric values.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.4
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Constant {
    /// Constant UTF-8 encoded raw string value
    Utf8(String),

    /// Constant primitive of type `int`
    Integer(i32),

    /// Constant primitive of type `float`, as raw bits
    Float(u32),

    /// Constant primitive of type `long`
    Long(i64),

    /// Constant primitive of type `double`, as raw bits
    Double(u64),

    /// Class or interface, pointing at its binary name
    Class(ConstantIndex),

    /// Constant object of type `java.lang.String`
    String(ConstantIndex),

    /// Field of a class
    FieldRef {
        class: ConstantIndex,
        name_and_type: ConstantIndex,
    },

    /// Method of a class
    MethodRef {
        class: ConstantIndex,
        name_and_type: ConstantIndex,
    },

    /// Method of an interface
    InterfaceMethodRef {
        class: ConstantIndex,
        name_and_type: ConstantIndex,
    },

    /// Name and a descriptor (for a field or a method)
    NameAndType {
        name: ConstantIndex,
        descriptor: ConstantIndex,
    },

    /// Constant object of type `java.lang.invoke.MethodHandle`
    MethodHandle {
        kind: HandleKind,

        /// `FieldRef` for the field kinds, `MethodRef`/`InterfaceMethodRef` for the rest
        member: ConstantIndex,
    },

    /// Method type, pointing at a descriptor
    MethodType { descriptor: ConstantIndex },

    /// Dynamically-computed constant
    Dynamic {
        /// Index into the `BootstrapMethods` attribute (not a pool index)
        bootstrap_method: u16,
        name_and_type: ConstantIndex,
    },

    /// Dynamically-computed call site
    InvokeDynamic {
        /// Index into the `BootstrapMethods` attribute (not a pool index)
        bootstrap_method: u16,
        name_and_type: ConstantIndex,
    },

    /// Module, pointing at its name
    Module(ConstantIndex),

    /// Package, pointing at its name
    Package(ConstantIndex),
}

impl Constant {
    /// Tag byte as serialized in the class file
    pub fn tag(&self) -> u8 {
        match self {
            Constant::Utf8(_) => 1,
            Constant::Integer(_) => 3,
            Constant::Float(_) => 4,
            Constant::Long(_) => 5,
            Constant::Double(_) => 6,
            Constant::Class(_) => 7,
            Constant::String(_) => 8,
            Constant::FieldRef { .. } => 9,
            Constant::MethodRef { .. } => 10,
            Constant::InterfaceMethodRef { .. } => 11,
            Constant::NameAndType { .. } => 12,
            Constant::MethodHandle { .. } => 15,
            Constant::MethodType { .. } => 16,
            Constant::Dynamic { .. } => 17,
            Constant::InvokeDynamic { .. } => 18,
            Constant::Module(_) => 19,
            Constant::Package(_) => 20,
        }
    }

    pub fn float(value: f32) -> Constant {
        Constant::Float(value.to_bits())
    }

    pub fn double(value: f64) -> Constant {
        Constant::Double(value.to_bits())
    }
}

/// Quoting the spec:
///
/// > All 8-byte constants take up two entries in the constant_pool table of the class file.
/// > The constant_pool index n+1 must be valid but is considered unusable.
impl Width for Constant {
    fn width(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

/// Old index to new index mapping produced by a compaction pass
///
/// Indices absent from the table raise [`Error::DanglingReference`] on remap, unless the table is
/// made tolerant, in which case the original index passes through unchanged. The tolerant mode
/// exists for invoke-dynamic bootstrap references whose targets live outside the remapped range.
#[derive(Clone, Debug)]
pub struct RemapTable {
    map: HashMap<u16, u16>,
    tolerate_dangling: bool,
}

impl RemapTable {
    fn new() -> RemapTable {
        RemapTable {
            map: HashMap::new(),
            tolerate_dangling: false,
        }
    }

    fn insert(&mut self, old: ConstantIndex, new: ConstantIndex) {
        self.map.insert(old.0, new.0);
    }

    /// Let unmapped indices pass through unchanged instead of erroring
    pub fn tolerant(mut self) -> RemapTable {
        self.tolerate_dangling = true;
        self
    }

    pub fn remap(&self, index: ConstantIndex) -> Result<ConstantIndex> {
        match self.map.get(&index.0) {
            Some(new) => Ok(ConstantIndex(*new)),
            None if self.tolerate_dangling => Ok(index),
            None => Err(Error::DanglingReference(index.0)),
        }
    }
}

/// Class file constant pool
///
/// Exclusively owned by one class model instance; appends are the only growth operation, and the
/// compaction passes rebuild the table while handing back the index mapping.
#[derive(Clone, Debug)]
pub struct ConstantPool {
    entries: OffsetVec<Constant>,
}

impl Default for ConstantPool {
    fn default() -> ConstantPool {
        ConstantPool::new()
    }
}

impl ConstantPool {
    /// Make a fresh empty constant pool
    pub fn new() -> ConstantPool {
        ConstantPool {
            entries: OffsetVec::new_starting_at(Offset(1)),
        }
    }

    /// Number of entries (tombstone slots excluded)
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Index slot the next entry would occupy (this is the `constant_pool_count` field of the
    /// class file)
    pub fn slot_count(&self) -> usize {
        self.entries.offset_len().0
    }

    /// Look up an entry; indices pointing at tombstone slots or past the end resolve to nothing
    pub fn get(&self, index: ConstantIndex) -> Option<&Constant> {
        self.entries.get_offset(Offset(index.0 as usize))
    }

    /// Iterate over `(index, entry)` pairs in table order
    pub fn iter(&self) -> impl Iterator<Item = (ConstantIndex, &Constant)> + '_ {
        self.entries
            .iter()
            .map(|(off, entry)| (ConstantIndex(off.0 as u16), entry))
    }

    /// Push a constant unconditionally, provided there is space for it
    pub fn push(&mut self, constant: Constant) -> Result<ConstantIndex> {
        let offset = self.entries.offset_len().0;
        if offset + constant.width() > MAX_POOL_SLOTS {
            return Err(Error::PoolOverflow {
                index: u16::MAX,
                width: constant.width(),
            });
        }
        let offset = self.entries.push(constant);
        Ok(ConstantIndex(offset.0 as u16))
    }

    /// Get or insert a constant, deduplicating against existing entries
    ///
    /// This is a linear structural scan over same-tag entries; pools are bounded to 65535 slots,
    /// so no hash index is kept (and none would survive the compaction passes).
    pub fn get_or_insert(&mut self, constant: Constant) -> Result<ConstantIndex> {
        let tag = constant.tag();
        for (index, entry) in self.iter() {
            if entry.tag() == tag && *entry == constant {
                return Ok(index);
            }
        }
        self.push(constant)
    }

    /// Get or insert a UTF-8 constant
    pub fn utf8(&mut self, value: &str) -> Result<ConstantIndex> {
        self.get_or_insert(Constant::Utf8(value.to_owned()))
    }

    /// Get or insert a string constant
    pub fn string(&mut self, value: &str) -> Result<ConstantIndex> {
        let utf8 = self.utf8(value)?;
        self.get_or_insert(Constant::String(utf8))
    }

    /// Get or insert a class constant from a binary name (eg. `java/lang/Object`)
    pub fn class_of(&mut self, binary_name: &str) -> Result<ConstantIndex> {
        let name = self.utf8(binary_name)?;
        self.get_or_insert(Constant::Class(name))
    }

    /// Get or insert a name & type constant
    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> Result<ConstantIndex> {
        let name = self.utf8(name)?;
        let descriptor = self.utf8(descriptor)?;
        self.get_or_insert(Constant::NameAndType { name, descriptor })
    }

    /// Get or insert a field reference
    pub fn field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> Result<ConstantIndex> {
        let class = self.class_of(class)?;
        let name_and_type = self.name_and_type(name, descriptor)?;
        self.get_or_insert(Constant::FieldRef {
            class,
            name_and_type,
        })
    }

    /// Get or insert a method reference
    pub fn method_ref(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<ConstantIndex> {
        let class = self.class_of(class)?;
        let name_and_type = self.name_and_type(name, descriptor)?;
        self.get_or_insert(Constant::MethodRef {
            class,
            name_and_type,
        })
    }

    /// Get or insert an interface method reference
    pub fn interface_method_ref(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<ConstantIndex> {
        let class = self.class_of(class)?;
        let name_and_type = self.name_and_type(name, descriptor)?;
        self.get_or_insert(Constant::InterfaceMethodRef {
            class,
            name_and_type,
        })
    }

    /// Get or insert an integer constant
    pub fn integer(&mut self, value: i32) -> Result<ConstantIndex> {
        self.get_or_insert(Constant::Integer(value))
    }

    /// Get or insert a long constant
    pub fn long(&mut self, value: i64) -> Result<ConstantIndex> {
        self.get_or_insert(Constant::Long(value))
    }

    /// Get or insert a float constant (bit-exact)
    pub fn float(&mut self, value: f32) -> Result<ConstantIndex> {
        self.get_or_insert(Constant::float(value))
    }

    /// Get or insert a double constant (bit-exact)
    pub fn double(&mut self, value: f64) -> Result<ConstantIndex> {
        self.get_or_insert(Constant::double(value))
    }

    /// Get or insert a method type constant
    pub fn method_type(&mut self, descriptor: &str) -> Result<ConstantIndex> {
        let descriptor = self.utf8(descriptor)?;
        self.get_or_insert(Constant::MethodType { descriptor })
    }

    /// Copy a constant from another pool into this one, minting any entries it references
    ///
    /// The copy deduplicates through [`ConstantPool::get_or_insert`], so structurally equal
    /// constants land on the same index no matter which pool they came from.
    pub fn copy_from(&mut self, source: &ConstantPool, index: ConstantIndex) -> Result<ConstantIndex> {
        let entry = source
            .get(index)
            .ok_or(Error::DanglingReference(index.0))?
            .clone();
        let copied = match entry {
            Constant::Utf8(_)
            | Constant::Integer(_)
            | Constant::Float(_)
            | Constant::Long(_)
            | Constant::Double(_) => entry,
            Constant::Class(name) => Constant::Class(self.copy_from(source, name)?),
            Constant::String(utf8) => Constant::String(self.copy_from(source, utf8)?),
            Constant::Module(name) => Constant::Module(self.copy_from(source, name)?),
            Constant::Package(name) => Constant::Package(self.copy_from(source, name)?),
            Constant::MethodType { descriptor } => Constant::MethodType {
                descriptor: self.copy_from(source, descriptor)?,
            },
            Constant::NameAndType { name, descriptor } => Constant::NameAndType {
                name: self.copy_from(source, name)?,
                descriptor: self.copy_from(source, descriptor)?,
            },
            Constant::FieldRef {
                class,
                name_and_type,
            } => Constant::FieldRef {
                class: self.copy_from(source, class)?,
                name_and_type: self.copy_from(source, name_and_type)?,
            },
            Constant::MethodRef {
                class,
                name_and_type,
            } => Constant::MethodRef {
                class: self.copy_from(source, class)?,
                name_and_type: self.copy_from(source, name_and_type)?,
            },
            Constant::InterfaceMethodRef {
                class,
                name_and_type,
            } => Constant::InterfaceMethodRef {
                class: self.copy_from(source, class)?,
                name_and_type: self.copy_from(source, name_and_type)?,
            },
            Constant::MethodHandle { kind, member } => Constant::MethodHandle {
                kind,
                member: self.copy_from(source, member)?,
            },
            Constant::Dynamic {
                bootstrap_method,
                name_and_type,
            } => Constant::Dynamic {
                bootstrap_method,
                name_and_type: self.copy_from(source, name_and_type)?,
            },
            Constant::InvokeDynamic {
                bootstrap_method,
                name_and_type,
            } => Constant::InvokeDynamic {
                bootstrap_method,
                name_and_type: self.copy_from(source, name_and_type)?,
            },
        };
        self.get_or_insert(copied)
    }

    /// Compare an entry of this pool against an entry of another pool structurally
    ///
    /// Nested indices are resolved to the content they reference, so the comparison never depends
    /// on index identity. Comparing an entry against itself in the same pool is fine too.
    pub fn structurally_equal(
        &self,
        index: ConstantIndex,
        other: &ConstantPool,
        other_index: ConstantIndex,
    ) -> bool {
        let mut own_key = Vec::new();
        let mut other_key = Vec::new();
        self.write_content_key(index, &mut own_key);
        other.write_content_key(other_index, &mut other_key);
        own_key == other_key
    }

    /// Write the resolved content of an entry: the tag byte followed by every nested index
    /// replaced by the content it references. Dangling indices are keyed by their raw value so
    /// the function is total.
    fn write_content_key(&self, index: ConstantIndex, out: &mut Vec<u8>) {
        let entry = match self.get(index) {
            Some(entry) => entry,
            None => {
                out.push(0xfe);
                out.extend_from_slice(&index.0.to_be_bytes());
                return;
            }
        };
        out.push(entry.tag());
        match entry {
            Constant::Utf8(value) => {
                out.extend_from_slice(&(value.len() as u32).to_be_bytes());
                out.extend_from_slice(value.as_bytes());
            }
            Constant::Integer(value) => out.extend_from_slice(&value.to_be_bytes()),
            Constant::Float(bits) => out.extend_from_slice(&bits.to_be_bytes()),
            Constant::Long(value) => out.extend_from_slice(&value.to_be_bytes()),
            Constant::Double(bits) => out.extend_from_slice(&bits.to_be_bytes()),
            Constant::Class(name)
            | Constant::String(name)
            | Constant::Module(name)
            | Constant::Package(name)
            | Constant::MethodType { descriptor: name } => {
                self.write_content_key(*name, out);
            }
            Constant::NameAndType { name, descriptor } => {
                self.write_content_key(*name, out);
                self.write_content_key(*descriptor, out);
            }
            Constant::FieldRef {
                class,
                name_and_type,
            }
            | Constant::MethodRef {
                class,
                name_and_type,
            }
            | Constant::InterfaceMethodRef {
                class,
                name_and_type,
            } => {
                self.write_content_key(*class, out);
                self.write_content_key(*name_and_type, out);
            }
            Constant::MethodHandle { kind, member } => {
                out.push(kind.tag());
                self.write_content_key(*member, out);
            }
            Constant::Dynamic {
                bootstrap_method,
                name_and_type,
            }
            | Constant::InvokeDynamic {
                bootstrap_method,
                name_and_type,
            } => {
                out.extend_from_slice(&bootstrap_method.to_be_bytes());
                self.write_content_key(*name_and_type, out);
            }
        }
    }

    /// Sort entries by (tag, resolved content), merge structural duplicates, and rewrite the
    /// intra-pool cross references.
    ///
    /// The output order is deterministic and duplicate-adjacent. The returned [`RemapTable`] maps
    /// every pre-pass index to its post-pass index; the caller must run it over every
    /// index-bearing structure of the class (instruction streams through
    /// [`Code::remap_constants`][crate::code::Code::remap_constants], attributes through whatever
    /// model owns them).
    pub fn sort_and_compact(&mut self) -> Result<RemapTable> {
        let mut keyed: Vec<(Vec<u8>, ConstantIndex, Constant)> = self
            .iter()
            .map(|(index, entry)| {
                let mut key = Vec::new();
                self.write_content_key(index, &mut key);
                (key, index, entry.clone())
            })
            .collect();
        keyed.sort_by(|a, b| (&a.0, a.1).cmp(&(&b.0, b.1)));

        let mut table = RemapTable::new();
        let mut rebuilt: OffsetVec<Constant> = OffsetVec::new_starting_at(Offset(1));
        let mut previous_key: Option<Vec<u8>> = None;
        let mut previous_index = ConstantIndex(0);
        for (key, old_index, entry) in keyed {
            if previous_key.as_ref() == Some(&key) {
                // Structural duplicate of the entry just placed
                table.insert(old_index, previous_index);
                continue;
            }
            let new_index = ConstantIndex(rebuilt.push(entry).0 as u16);
            table.insert(old_index, new_index);
            previous_key = Some(key);
            previous_index = new_index;
        }

        log::debug!(
            "sort_and_compact: {} entries -> {}",
            self.entry_count(),
            rebuilt.len()
        );
        self.entries = rebuilt;
        self.remap_fields(&table)?;
        Ok(table)
    }

    /// Drop `NameAndType` entries that nothing references, compacting the table.
    ///
    /// Reachability roots are the ref-constants inside the pool itself
    /// (`Fieldref`/`Methodref`/`InterfaceMethodref`/`Dynamic`/`InvokeDynamic`) plus the explicit
    /// `roots` indices the caller collected from attribute-held references (`EnclosingMethod` and
    /// any other attribute kind the surrounding model supports).
    pub fn shrink_unused_name_and_types(&mut self, roots: &[ConstantIndex]) -> Result<RemapTable> {
        let mut used = vec![false; self.slot_count()];
        for root in roots {
            if let Some(slot) = used.get_mut(root.0 as usize) {
                *slot = true;
            }
        }
        for (_, entry) in self.iter() {
            let name_and_type = match entry {
                Constant::FieldRef { name_and_type, .. }
                | Constant::MethodRef { name_and_type, .. }
                | Constant::InterfaceMethodRef { name_and_type, .. }
                | Constant::Dynamic { name_and_type, .. }
                | Constant::InvokeDynamic { name_and_type, .. } => *name_and_type,
                _ => continue,
            };
            if let Some(slot) = used.get_mut(name_and_type.0 as usize) {
                *slot = true;
            }
        }

        let mut table = RemapTable::new();
        let mut rebuilt: OffsetVec<Constant> = OffsetVec::new_starting_at(Offset(1));
        let mut dropped = 0usize;
        for (old_index, entry) in self.iter() {
            if matches!(entry, Constant::NameAndType { .. }) && !used[old_index.0 as usize] {
                dropped += 1;
                continue;
            }
            let new_index = ConstantIndex(rebuilt.push(entry.clone()).0 as u16);
            table.insert(old_index, new_index);
        }

        log::debug!("shrink_unused_name_and_types: dropped {} entries", dropped);
        self.entries = rebuilt;
        self.remap_fields(&table)?;
        Ok(table)
    }

    /// Rewrite the nested pool indices of every entry through a remap table
    fn remap_fields(&mut self, table: &RemapTable) -> Result<()> {
        for (_, entry) in self.entries.iter_mut() {
            match entry {
                Constant::Utf8(_)
                | Constant::Integer(_)
                | Constant::Float(_)
                | Constant::Long(_)
                | Constant::Double(_) => {}
                Constant::Class(name)
                | Constant::String(name)
                | Constant::Module(name)
                | Constant::Package(name)
                | Constant::MethodType { descriptor: name } => {
                    *name = table.remap(*name)?;
                }
                Constant::NameAndType { name, descriptor } => {
                    *name = table.remap(*name)?;
                    *descriptor = table.remap(*descriptor)?;
                }
                Constant::FieldRef {
                    class,
                    name_and_type,
                }
                | Constant::MethodRef {
                    class,
                    name_and_type,
                }
                | Constant::InterfaceMethodRef {
                    class,
                    name_and_type,
                } => {
                    *class = table.remap(*class)?;
                    *name_and_type = table.remap(*name_and_type)?;
                }
                Constant::MethodHandle { member, .. } => {
                    *member = table.remap(*member)?;
                }
                Constant::Dynamic { name_and_type, .. }
                | Constant::InvokeDynamic { name_and_type, .. } => {
                    *name_and_type = table.remap(*name_and_type)?;
                }
            }
        }
        Ok(())
    }
}

//! Instruction representation
//!
//! The representation is slightly different from the raw class-file encoding to make editing
//! convenient:
//!
//!   - the `wide` prefix doesn't show up as an instruction at all; it is folded into the
//!     encoding form of the instructions it is allowed to modify
//!
//!   - branch instructions carry an abstract target: a [`Label`][crate::code::Label] while code
//!     is being composed or edited, a resolved relative byte offset in a finalized
//!     [`Code`][crate::code::Code]
//!
//!   - `ldc`/`ldc_w` are one variant with a width flag, so the layout pass can move between the
//!     two forms as the pool index and shrink settings demand

use crate::pool::ConstantIndex;
use byteorder::{BigEndian, WriteBytesExt};
use std::fmt;
use std::io;

/// A raw JVM opcode byte
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Opcode(pub u8);

impl Opcode {
    pub const NOP: Opcode = Opcode(0x00);
    pub const ACONST_NULL: Opcode = Opcode(0x01);
    pub const ICONST_M1: Opcode = Opcode(0x02);
    pub const ICONST_0: Opcode = Opcode(0x03);
    pub const ICONST_1: Opcode = Opcode(0x04);
    pub const ICONST_2: Opcode = Opcode(0x05);
    pub const ICONST_3: Opcode = Opcode(0x06);
    pub const ICONST_4: Opcode = Opcode(0x07);
    pub const ICONST_5: Opcode = Opcode(0x08);
    pub const LCONST_0: Opcode = Opcode(0x09);
    pub const LCONST_1: Opcode = Opcode(0x0a);
    pub const FCONST_0: Opcode = Opcode(0x0b);
    pub const FCONST_1: Opcode = Opcode(0x0c);
    pub const FCONST_2: Opcode = Opcode(0x0d);
    pub const DCONST_0: Opcode = Opcode(0x0e);
    pub const DCONST_1: Opcode = Opcode(0x0f);
    pub const BIPUSH: Opcode = Opcode(0x10);
    pub const SIPUSH: Opcode = Opcode(0x11);
    pub const LDC: Opcode = Opcode(0x12);
    pub const LDC_W: Opcode = Opcode(0x13);
    pub const LDC2_W: Opcode = Opcode(0x14);
    pub const ILOAD: Opcode = Opcode(0x15);
    pub const LLOAD: Opcode = Opcode(0x16);
    pub const FLOAD: Opcode = Opcode(0x17);
    pub const DLOAD: Opcode = Opcode(0x18);
    pub const ALOAD: Opcode = Opcode(0x19);
    pub const IALOAD: Opcode = Opcode(0x2e);
    pub const AALOAD: Opcode = Opcode(0x32);
    pub const ISTORE: Opcode = Opcode(0x36);
    pub const LSTORE: Opcode = Opcode(0x37);
    pub const FSTORE: Opcode = Opcode(0x38);
    pub const DSTORE: Opcode = Opcode(0x39);
    pub const ASTORE: Opcode = Opcode(0x3a);
    pub const IASTORE: Opcode = Opcode(0x4f);
    pub const AASTORE: Opcode = Opcode(0x53);
    pub const POP: Opcode = Opcode(0x57);
    pub const POP2: Opcode = Opcode(0x58);
    pub const DUP: Opcode = Opcode(0x59);
    pub const DUP_X1: Opcode = Opcode(0x5a);
    pub const DUP_X2: Opcode = Opcode(0x5b);
    pub const DUP2: Opcode = Opcode(0x5c);
    pub const SWAP: Opcode = Opcode(0x5f);
    pub const IADD: Opcode = Opcode(0x60);
    pub const LADD: Opcode = Opcode(0x61);
    pub const FADD: Opcode = Opcode(0x62);
    pub const DADD: Opcode = Opcode(0x63);
    pub const ISUB: Opcode = Opcode(0x64);
    pub const IMUL: Opcode = Opcode(0x68);
    pub const IDIV: Opcode = Opcode(0x6c);
    pub const IREM: Opcode = Opcode(0x70);
    pub const INEG: Opcode = Opcode(0x74);
    pub const ISHL: Opcode = Opcode(0x78);
    pub const ISHR: Opcode = Opcode(0x7a);
    pub const IUSHR: Opcode = Opcode(0x7c);
    pub const IAND: Opcode = Opcode(0x7e);
    pub const IOR: Opcode = Opcode(0x80);
    pub const IXOR: Opcode = Opcode(0x82);
    pub const IINC: Opcode = Opcode(0x84);
    pub const I2L: Opcode = Opcode(0x85);
    pub const I2F: Opcode = Opcode(0x86);
    pub const L2I: Opcode = Opcode(0x88);
    pub const LCMP: Opcode = Opcode(0x94);
    pub const IFEQ: Opcode = Opcode(0x99);
    pub const IFNE: Opcode = Opcode(0x9a);
    pub const IFLT: Opcode = Opcode(0x9b);
    pub const IFGE: Opcode = Opcode(0x9c);
    pub const IFGT: Opcode = Opcode(0x9d);
    pub const IFLE: Opcode = Opcode(0x9e);
    pub const IF_ICMPEQ: Opcode = Opcode(0x9f);
    pub const IF_ICMPNE: Opcode = Opcode(0xa0);
    pub const IF_ICMPLT: Opcode = Opcode(0xa1);
    pub const IF_ICMPGE: Opcode = Opcode(0xa2);
    pub const IF_ICMPGT: Opcode = Opcode(0xa3);
    pub const IF_ICMPLE: Opcode = Opcode(0xa4);
    pub const IF_ACMPEQ: Opcode = Opcode(0xa5);
    pub const IF_ACMPNE: Opcode = Opcode(0xa6);
    pub const GOTO: Opcode = Opcode(0xa7);
    pub const JSR: Opcode = Opcode(0xa8);
    pub const RET: Opcode = Opcode(0xa9);
    pub const TABLESWITCH: Opcode = Opcode(0xaa);
    pub const LOOKUPSWITCH: Opcode = Opcode(0xab);
    pub const IRETURN: Opcode = Opcode(0xac);
    pub const LRETURN: Opcode = Opcode(0xad);
    pub const FRETURN: Opcode = Opcode(0xae);
    pub const DRETURN: Opcode = Opcode(0xaf);
    pub const ARETURN: Opcode = Opcode(0xb0);
    pub const RETURN: Opcode = Opcode(0xb1);
    pub const GETSTATIC: Opcode = Opcode(0xb2);
    pub const PUTSTATIC: Opcode = Opcode(0xb3);
    pub const GETFIELD: Opcode = Opcode(0xb4);
    pub const PUTFIELD: Opcode = Opcode(0xb5);
    pub const INVOKEVIRTUAL: Opcode = Opcode(0xb6);
    pub const INVOKESPECIAL: Opcode = Opcode(0xb7);
    pub const INVOKESTATIC: Opcode = Opcode(0xb8);
    pub const INVOKEINTERFACE: Opcode = Opcode(0xb9);
    pub const INVOKEDYNAMIC: Opcode = Opcode(0xba);
    pub const NEW: Opcode = Opcode(0xbb);
    pub const NEWARRAY: Opcode = Opcode(0xbc);
    pub const ANEWARRAY: Opcode = Opcode(0xbd);
    pub const ARRAYLENGTH: Opcode = Opcode(0xbe);
    pub const ATHROW: Opcode = Opcode(0xbf);
    pub const CHECKCAST: Opcode = Opcode(0xc0);
    pub const INSTANCEOF: Opcode = Opcode(0xc1);
    pub const MONITORENTER: Opcode = Opcode(0xc2);
    pub const MONITOREXIT: Opcode = Opcode(0xc3);
    pub const WIDE: Opcode = Opcode(0xc4);
    pub const MULTIANEWARRAY: Opcode = Opcode(0xc5);
    pub const IFNULL: Opcode = Opcode(0xc6);
    pub const IFNONNULL: Opcode = Opcode(0xc7);
    pub const GOTO_W: Opcode = Opcode(0xc8);
    pub const JSR_W: Opcode = Opcode(0xc9);

    /// Is this a conditional branch (one without a wide form)?
    pub fn is_conditional_branch(self) -> bool {
        matches!(self.0, 0x99..=0xa6 | 0xc6 | 0xc7)
    }

    /// Does this branch opcode have a 32-bit offset form?
    pub fn has_wide_branch_form(self) -> bool {
        self == Opcode::GOTO || self == Opcode::JSR
    }

    /// The 32-bit offset form of a `goto`/`jsr`
    pub fn wide_branch_form(self) -> Opcode {
        match self {
            Opcode::GOTO => Opcode::GOTO_W,
            Opcode::JSR => Opcode::JSR_W,
            other => other,
        }
    }

    /// Invert the condition of a conditional branch
    pub fn inverted_branch(self) -> Option<Opcode> {
        let inverted = match self {
            Opcode::IFEQ => Opcode::IFNE,
            Opcode::IFNE => Opcode::IFEQ,
            Opcode::IFLT => Opcode::IFGE,
            Opcode::IFGE => Opcode::IFLT,
            Opcode::IFGT => Opcode::IFLE,
            Opcode::IFLE => Opcode::IFGT,
            Opcode::IF_ICMPEQ => Opcode::IF_ICMPNE,
            Opcode::IF_ICMPNE => Opcode::IF_ICMPEQ,
            Opcode::IF_ICMPLT => Opcode::IF_ICMPGE,
            Opcode::IF_ICMPGE => Opcode::IF_ICMPLT,
            Opcode::IF_ICMPGT => Opcode::IF_ICMPLE,
            Opcode::IF_ICMPLE => Opcode::IF_ICMPGT,
            Opcode::IF_ACMPEQ => Opcode::IF_ACMPNE,
            Opcode::IF_ACMPNE => Opcode::IF_ACMPEQ,
            Opcode::IFNULL => Opcode::IFNONNULL,
            Opcode::IFNONNULL => Opcode::IFNULL,
            _ => return None,
        };
        Some(inverted)
    }

    /// Base opcode of the one-byte `*load_<n>`/`*store_<n>` family, if this opcode has one
    pub fn implicit_var_base(self) -> Option<u8> {
        let base = match self {
            Opcode::ILOAD => 0x1a,
            Opcode::LLOAD => 0x1e,
            Opcode::FLOAD => 0x22,
            Opcode::DLOAD => 0x26,
            Opcode::ALOAD => 0x2a,
            Opcode::ISTORE => 0x3b,
            Opcode::LSTORE => 0x3f,
            Opcode::FSTORE => 0x43,
            Opcode::DSTORE => 0x47,
            Opcode::ASTORE => 0x4b,
            _ => return None,
        };
        Some(base)
    }

    pub fn mnemonic(self) -> Option<&'static str> {
        let name = match self {
            Opcode::NOP => "nop",
            Opcode::ACONST_NULL => "aconst_null",
            Opcode::ICONST_M1 => "iconst_m1",
            Opcode::ICONST_0 => "iconst_0",
            Opcode::ICONST_1 => "iconst_1",
            Opcode::ICONST_2 => "iconst_2",
            Opcode::ICONST_3 => "iconst_3",
            Opcode::ICONST_4 => "iconst_4",
            Opcode::ICONST_5 => "iconst_5",
            Opcode::BIPUSH => "bipush",
            Opcode::SIPUSH => "sipush",
            Opcode::LDC => "ldc",
            Opcode::LDC_W => "ldc_w",
            Opcode::LDC2_W => "ldc2_w",
            Opcode::ILOAD => "iload",
            Opcode::LLOAD => "lload",
            Opcode::FLOAD => "fload",
            Opcode::DLOAD => "dload",
            Opcode::ALOAD => "aload",
            Opcode::ISTORE => "istore",
            Opcode::LSTORE => "lstore",
            Opcode::FSTORE => "fstore",
            Opcode::DSTORE => "dstore",
            Opcode::ASTORE => "astore",
            Opcode::POP => "pop",
            Opcode::DUP => "dup",
            Opcode::SWAP => "swap",
            Opcode::IADD => "iadd",
            Opcode::ISUB => "isub",
            Opcode::IMUL => "imul",
            Opcode::IINC => "iinc",
            Opcode::IFEQ => "ifeq",
            Opcode::IFNE => "ifne",
            Opcode::IFLT => "iflt",
            Opcode::IFGE => "ifge",
            Opcode::IFGT => "ifgt",
            Opcode::IFLE => "ifle",
            Opcode::IF_ICMPEQ => "if_icmpeq",
            Opcode::IF_ICMPNE => "if_icmpne",
            Opcode::GOTO => "goto",
            Opcode::TABLESWITCH => "tableswitch",
            Opcode::LOOKUPSWITCH => "lookupswitch",
            Opcode::IRETURN => "ireturn",
            Opcode::ARETURN => "areturn",
            Opcode::RETURN => "return",
            Opcode::GETSTATIC => "getstatic",
            Opcode::PUTSTATIC => "putstatic",
            Opcode::GETFIELD => "getfield",
            Opcode::PUTFIELD => "putfield",
            Opcode::INVOKEVIRTUAL => "invokevirtual",
            Opcode::INVOKESPECIAL => "invokespecial",
            Opcode::INVOKESTATIC => "invokestatic",
            Opcode::INVOKEINTERFACE => "invokeinterface",
            Opcode::INVOKEDYNAMIC => "invokedynamic",
            Opcode::NEW => "new",
            Opcode::NEWARRAY => "newarray",
            Opcode::ANEWARRAY => "anewarray",
            Opcode::ATHROW => "athrow",
            Opcode::CHECKCAST => "checkcast",
            Opcode::INSTANCEOF => "instanceof",
            Opcode::MULTIANEWARRAY => "multianewarray",
            Opcode::IFNULL => "ifnull",
            Opcode::IFNONNULL => "ifnonnull",
            Opcode::GOTO_W => "goto_w",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Debug for Opcode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mnemonic() {
            Some(name) => formatter.write_str(name),
            None => formatter.write_fmt(format_args!("op_{:#04x}", self.0)),
        }
    }
}

/// Encoding form of a local-variable instruction
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum VarForm {
    /// One byte, index folded into the opcode (`iload_0` .. `astore_3`)
    Implicit,
    /// Opcode plus one index byte
    Byte,
    /// `wide` prefix plus two index bytes
    Wide,
}

/// A single instruction, generic over its branch-target representation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction<T> {
    /// Operand-less instruction
    Simple(Opcode),

    /// `bipush`/`sipush`/`newarray`: opcode plus one immediate operand
    Push { opcode: Opcode, value: i32 },

    /// Local variable load/store/`ret`, with an explicit encoding form
    Var {
        opcode: Opcode,
        index: u16,
        form: VarForm,
    },

    /// `iinc`, in byte or wide form
    Inc { index: u16, delta: i16, wide: bool },

    /// Constant-pool-bearing instruction; `wide` distinguishes `ldc_w` from `ldc` and is
    /// meaningless for the fixed-width opcodes
    Const {
        opcode: Opcode,
        index: ConstantIndex,
        wide: bool,
    },

    /// `invokeinterface`, which carries an argument slot count next to its pool index
    InvokeInterface { index: ConstantIndex, count: u8 },

    /// `multianewarray`, which carries a dimension count next to its pool index
    MultiANewArray { index: ConstantIndex, dims: u8 },

    /// Branch; `wide` selects the 32-bit `goto_w`/`jsr_w` encoding
    Branch { opcode: Opcode, target: T, wide: bool },

    /// `tableswitch`
    TableSwitch {
        default: T,
        low: i32,
        targets: Vec<T>,
    },

    /// `lookupswitch`
    LookupSwitch { default: T, pairs: Vec<(i32, T)> },
}

/// Pad bytes between a switch opcode and its first 4-byte operand
fn switch_pad(offset: u32) -> usize {
    (4 - ((offset as usize + 1) % 4)) % 4
}

impl<T> Instruction<T> {
    /// Base opcode (the narrow form, for instructions with more than one encoding)
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Simple(opcode) => *opcode,
            Instruction::Push { opcode, .. } => *opcode,
            Instruction::Var { opcode, .. } => *opcode,
            Instruction::Inc { .. } => Opcode::IINC,
            Instruction::Const { opcode, .. } => *opcode,
            Instruction::InvokeInterface { .. } => Opcode::INVOKEINTERFACE,
            Instruction::MultiANewArray { .. } => Opcode::MULTIANEWARRAY,
            Instruction::Branch { opcode, .. } => *opcode,
            Instruction::TableSwitch { .. } => Opcode::TABLESWITCH,
            Instruction::LookupSwitch { .. } => Opcode::LOOKUPSWITCH,
        }
    }

    /// Encoded size in bytes, were the instruction to start at `offset`
    pub fn width_at(&self, offset: u32) -> usize {
        match self {
            Instruction::Simple(_) => 1,
            Instruction::Push { opcode, .. } => {
                if *opcode == Opcode::SIPUSH {
                    3
                } else {
                    2
                }
            }
            Instruction::Var { opcode, form, .. } => match form {
                // An implicit form only exists for the load/store families; anything else
                // falls back to the byte encoding
                VarForm::Implicit if opcode.implicit_var_base().is_some() => 1,
                VarForm::Implicit | VarForm::Byte => 2,
                VarForm::Wide => 4,
            },
            Instruction::Inc { wide, .. } => {
                if *wide {
                    6
                } else {
                    3
                }
            }
            Instruction::Const { opcode, wide, .. } => match *opcode {
                Opcode::LDC if !wide => 2,
                Opcode::INVOKEDYNAMIC => 5,
                _ => 3,
            },
            Instruction::InvokeInterface { .. } => 5,
            Instruction::MultiANewArray { .. } => 4,
            Instruction::Branch { wide, .. } => {
                if *wide {
                    5
                } else {
                    3
                }
            }
            Instruction::TableSwitch { targets, .. } => {
                1 + switch_pad(offset) + 12 + 4 * targets.len()
            }
            Instruction::LookupSwitch { pairs, .. } => {
                1 + switch_pad(offset) + 8 + 8 * pairs.len()
            }
        }
    }

    /// Constant pool index this instruction carries, if any
    pub fn constant_index(&self) -> Option<ConstantIndex> {
        match self {
            Instruction::Const { index, .. }
            | Instruction::InvokeInterface { index, .. }
            | Instruction::MultiANewArray { index, .. } => Some(*index),
            _ => None,
        }
    }

    pub fn constant_index_mut(&mut self) -> Option<&mut ConstantIndex> {
        match self {
            Instruction::Const { index, .. }
            | Instruction::InvokeInterface { index, .. }
            | Instruction::MultiANewArray { index, .. } => Some(index),
            _ => None,
        }
    }

    /// Rewrite branch targets through a fallible mapping, leaving everything else intact
    pub fn map_targets<U, E>(
        &self,
        mut map: impl FnMut(&T) -> std::result::Result<U, E>,
    ) -> std::result::Result<Instruction<U>, E> {
        Ok(match self {
            Instruction::Simple(opcode) => Instruction::Simple(*opcode),
            Instruction::Push { opcode, value } => Instruction::Push {
                opcode: *opcode,
                value: *value,
            },
            Instruction::Var {
                opcode,
                index,
                form,
            } => Instruction::Var {
                opcode: *opcode,
                index: *index,
                form: *form,
            },
            Instruction::Inc { index, delta, wide } => Instruction::Inc {
                index: *index,
                delta: *delta,
                wide: *wide,
            },
            Instruction::Const {
                opcode,
                index,
                wide,
            } => Instruction::Const {
                opcode: *opcode,
                index: *index,
                wide: *wide,
            },
            Instruction::InvokeInterface { index, count } => Instruction::InvokeInterface {
                index: *index,
                count: *count,
            },
            Instruction::MultiANewArray { index, dims } => Instruction::MultiANewArray {
                index: *index,
                dims: *dims,
            },
            Instruction::Branch {
                opcode,
                target,
                wide,
            } => Instruction::Branch {
                opcode: *opcode,
                target: map(target)?,
                wide: *wide,
            },
            Instruction::TableSwitch {
                default,
                low,
                targets,
            } => Instruction::TableSwitch {
                default: map(default)?,
                low: *low,
                targets: targets.iter().map(&mut map).collect::<std::result::Result<_, E>>()?,
            },
            Instruction::LookupSwitch { default, pairs } => Instruction::LookupSwitch {
                default: map(default)?,
                pairs: pairs
                    .iter()
                    .map(|(key, target)| Ok((*key, map(target)?)))
                    .collect::<std::result::Result<_, E>>()?,
            },
        })
    }

    /// Local variable instruction in its shortest encoding
    pub fn var(opcode: Opcode, index: u16) -> Instruction<T> {
        let form = if index <= 3 && opcode.implicit_var_base().is_some() {
            VarForm::Implicit
        } else if index <= u8::MAX as u16 {
            VarForm::Byte
        } else {
            VarForm::Wide
        };
        Instruction::Var {
            opcode,
            index,
            form,
        }
    }

    /// `iinc` in its shortest encoding
    pub fn inc(index: u16, delta: i16) -> Instruction<T> {
        let wide = index > u8::MAX as u16 || i8::try_from(delta).is_err();
        Instruction::Inc { index, delta, wide }
    }

    /// Shortest instruction pushing an `int` without touching the pool, if one exists
    pub fn push_int(value: i32) -> Option<Instruction<T>> {
        match value {
            -1..=5 => Some(Instruction::Simple(Opcode((value + 3) as u8))),
            _ if i8::try_from(value).is_ok() => Some(Instruction::Push {
                opcode: Opcode::BIPUSH,
                value,
            }),
            _ if i16::try_from(value).is_ok() => Some(Instruction::Push {
                opcode: Opcode::SIPUSH,
                value,
            }),
            _ => None,
        }
    }

    /// `ldc`/`ldc_w`, narrow when the index allows it
    pub fn ldc(index: ConstantIndex) -> Instruction<T> {
        Instruction::Const {
            opcode: Opcode::LDC,
            index,
            wide: index.0 > u8::MAX as u16,
        }
    }

    /// `ldc2_w`
    pub fn ldc2(index: ConstantIndex) -> Instruction<T> {
        Instruction::Const {
            opcode: Opcode::LDC2_W,
            index,
            wide: true,
        }
    }

    /// Narrow branch to a target (the layout pass widens it if it must)
    pub fn branch(opcode: Opcode, target: T) -> Instruction<T> {
        Instruction::Branch {
            opcode,
            target,
            wide: false,
        }
    }
}

impl Instruction<i32> {
    /// Serialize the instruction at `offset`, in JVM class-file encoding
    pub fn encode<W: WriteBytesExt>(&self, offset: u32, writer: &mut W) -> io::Result<()> {
        match self {
            Instruction::Simple(opcode) => writer.write_u8(opcode.0)?,
            Instruction::Push { opcode, value } => {
                writer.write_u8(opcode.0)?;
                if *opcode == Opcode::SIPUSH {
                    writer.write_i16::<BigEndian>(*value as i16)?;
                } else {
                    writer.write_u8(*value as u8)?;
                }
            }
            Instruction::Var {
                opcode,
                index,
                form,
            } => match form {
                VarForm::Implicit => match opcode.implicit_var_base() {
                    Some(base) => writer.write_u8(base + *index as u8)?,
                    None => {
                        writer.write_u8(opcode.0)?;
                        writer.write_u8(*index as u8)?;
                    }
                },
                VarForm::Byte => {
                    writer.write_u8(opcode.0)?;
                    writer.write_u8(*index as u8)?;
                }
                VarForm::Wide => {
                    writer.write_u8(Opcode::WIDE.0)?;
                    writer.write_u8(opcode.0)?;
                    writer.write_u16::<BigEndian>(*index)?;
                }
            },
            Instruction::Inc { index, delta, wide } => {
                if *wide {
                    writer.write_u8(Opcode::WIDE.0)?;
                    writer.write_u8(Opcode::IINC.0)?;
                    writer.write_u16::<BigEndian>(*index)?;
                    writer.write_i16::<BigEndian>(*delta)?;
                } else {
                    writer.write_u8(Opcode::IINC.0)?;
                    writer.write_u8(*index as u8)?;
                    writer.write_i8(*delta as i8)?;
                }
            }
            Instruction::Const {
                opcode,
                index,
                wide,
            } => match *opcode {
                Opcode::LDC if !wide => {
                    writer.write_u8(Opcode::LDC.0)?;
                    writer.write_u8(index.0 as u8)?;
                }
                Opcode::LDC => {
                    writer.write_u8(Opcode::LDC_W.0)?;
                    writer.write_u16::<BigEndian>(index.0)?;
                }
                Opcode::INVOKEDYNAMIC => {
                    writer.write_u8(opcode.0)?;
                    writer.write_u16::<BigEndian>(index.0)?;
                    writer.write_u16::<BigEndian>(0)?;
                }
                _ => {
                    writer.write_u8(opcode.0)?;
                    writer.write_u16::<BigEndian>(index.0)?;
                }
            },
            Instruction::InvokeInterface { index, count } => {
                writer.write_u8(Opcode::INVOKEINTERFACE.0)?;
                writer.write_u16::<BigEndian>(index.0)?;
                writer.write_u8(*count)?;
                writer.write_u8(0)?;
            }
            Instruction::MultiANewArray { index, dims } => {
                writer.write_u8(Opcode::MULTIANEWARRAY.0)?;
                writer.write_u16::<BigEndian>(index.0)?;
                writer.write_u8(*dims)?;
            }
            Instruction::Branch {
                opcode,
                target,
                wide,
            } => {
                if *wide {
                    writer.write_u8(opcode.wide_branch_form().0)?;
                    writer.write_i32::<BigEndian>(*target)?;
                } else {
                    writer.write_u8(opcode.0)?;
                    writer.write_i16::<BigEndian>(*target as i16)?;
                }
            }
            Instruction::TableSwitch {
                default,
                low,
                targets,
            } => {
                writer.write_u8(Opcode::TABLESWITCH.0)?;
                for _ in 0..switch_pad(offset) {
                    writer.write_u8(0)?;
                }
                writer.write_i32::<BigEndian>(*default)?;
                writer.write_i32::<BigEndian>(*low)?;
                writer.write_i32::<BigEndian>(*low + targets.len() as i32 - 1)?;
                for target in targets {
                    writer.write_i32::<BigEndian>(*target)?;
                }
            }
            Instruction::LookupSwitch { default, pairs } => {
                writer.write_u8(Opcode::LOOKUPSWITCH.0)?;
                for _ in 0..switch_pad(offset) {
                    writer.write_u8(0)?;
                }
                writer.write_i32::<BigEndian>(*default)?;
                writer.write_i32::<BigEndian>(pairs.len() as i32)?;
                for (key, target) in pairs {
                    writer.write_i32::<BigEndian>(*key)?;
                    writer.write_i32::<BigEndian>(*target)?;
                }
            }
        }
        Ok(())
    }
}

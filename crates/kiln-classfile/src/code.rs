//! Symbolic bytecode and the assembler that turns it into a `Code` attribute.
//!
//! Jumps always use the 16-bit forms; a branch whose offset does not fit is
//! reported instead of being widened to `goto_w`.

use std::collections::HashMap;

use crate::descriptor::{parse_field_descriptor, parse_method_descriptor};
use crate::error::{Error, Result};
use crate::writer::ConstantPoolBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

/// Instructions without operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Nop,
    Iaload,
    Laload,
    Faload,
    Daload,
    Aaload,
    Baload,
    Caload,
    Saload,
    Iastore,
    Lastore,
    Fastore,
    Dastore,
    Aastore,
    Bastore,
    Castore,
    Sastore,
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    Iadd,
    Ladd,
    Fadd,
    Dadd,
    Isub,
    Lsub,
    Fsub,
    Dsub,
    Imul,
    Lmul,
    Fmul,
    Dmul,
    Idiv,
    Ldiv,
    Fdiv,
    Ddiv,
    Irem,
    Lrem,
    Frem,
    Drem,
    Ineg,
    Lneg,
    Fneg,
    Dneg,
    Iand,
    Land,
    Ior,
    Lor,
    Ixor,
    Lxor,
    I2l,
    I2f,
    I2d,
    L2i,
    L2f,
    L2d,
    F2i,
    F2l,
    F2d,
    D2i,
    D2l,
    D2f,
    I2b,
    I2c,
    I2s,
    Lcmp,
    Fcmpl,
    Fcmpg,
    Dcmpl,
    Dcmpg,
    Ireturn,
    Lreturn,
    Freturn,
    Dreturn,
    Areturn,
    Return,
    Arraylength,
    Athrow,
}

impl Opcode {
    pub fn code(self) -> u8 {
        use Opcode::*;
        match self {
            Nop => 0x00,
            Iaload => 0x2e,
            Laload => 0x2f,
            Faload => 0x30,
            Daload => 0x31,
            Aaload => 0x32,
            Baload => 0x33,
            Caload => 0x34,
            Saload => 0x35,
            Iastore => 0x4f,
            Lastore => 0x50,
            Fastore => 0x51,
            Dastore => 0x52,
            Aastore => 0x53,
            Bastore => 0x54,
            Castore => 0x55,
            Sastore => 0x56,
            Pop => 0x57,
            Pop2 => 0x58,
            Dup => 0x59,
            DupX1 => 0x5a,
            DupX2 => 0x5b,
            Dup2 => 0x5c,
            Dup2X1 => 0x5d,
            Dup2X2 => 0x5e,
            Swap => 0x5f,
            Iadd => 0x60,
            Ladd => 0x61,
            Fadd => 0x62,
            Dadd => 0x63,
            Isub => 0x64,
            Lsub => 0x65,
            Fsub => 0x66,
            Dsub => 0x67,
            Imul => 0x68,
            Lmul => 0x69,
            Fmul => 0x6a,
            Dmul => 0x6b,
            Idiv => 0x6c,
            Ldiv => 0x6d,
            Fdiv => 0x6e,
            Ddiv => 0x6f,
            Irem => 0x70,
            Lrem => 0x71,
            Frem => 0x72,
            Drem => 0x73,
            Ineg => 0x74,
            Lneg => 0x75,
            Fneg => 0x76,
            Dneg => 0x77,
            Iand => 0x7e,
            Land => 0x7f,
            Ior => 0x80,
            Lor => 0x81,
            Ixor => 0x82,
            Lxor => 0x83,
            I2l => 0x85,
            I2f => 0x86,
            I2d => 0x87,
            L2i => 0x88,
            L2f => 0x89,
            L2d => 0x8a,
            F2i => 0x8b,
            F2l => 0x8c,
            F2d => 0x8d,
            D2i => 0x8e,
            D2l => 0x8f,
            D2f => 0x90,
            I2b => 0x91,
            I2c => 0x92,
            I2s => 0x93,
            Lcmp => 0x94,
            Fcmpl => 0x95,
            Fcmpg => 0x96,
            Dcmpl => 0x97,
            Dcmpg => 0x98,
            Ireturn => 0xac,
            Lreturn => 0xad,
            Freturn => 0xae,
            Dreturn => 0xaf,
            Areturn => 0xb0,
            Return => 0xb1,
            Arraylength => 0xbe,
            Athrow => 0xbf,
        }
    }

    /// `(slots popped, slots pushed)`.
    pub fn stack_effect(self) -> (u16, u16) {
        use Opcode::*;
        match self {
            Nop | Return => (0, 0),
            Iaload | Faload | Aaload | Baload | Caload | Saload => (2, 1),
            Laload | Daload => (2, 2),
            Iastore | Fastore | Aastore | Bastore | Castore | Sastore => (3, 0),
            Lastore | Dastore => (4, 0),
            Pop | Ireturn | Freturn | Areturn | Athrow => (1, 0),
            Pop2 | Lreturn | Dreturn => (2, 0),
            Dup => (1, 2),
            DupX1 => (2, 3),
            DupX2 => (3, 4),
            Dup2 => (2, 4),
            Dup2X1 => (3, 5),
            Dup2X2 => (4, 6),
            Swap => (2, 2),
            Iadd | Fadd | Isub | Fsub | Imul | Fmul | Idiv | Fdiv | Irem | Frem | Iand | Ior
            | Ixor => (2, 1),
            Ladd | Dadd | Lsub | Dsub | Lmul | Dmul | Ldiv | Ddiv | Lrem | Drem | Land | Lor
            | Lxor => (4, 2),
            Ineg | Fneg | I2f | F2i | I2b | I2c | I2s | Arraylength => (1, 1),
            Lneg | Dneg | L2d | D2l => (2, 2),
            I2l | I2d | F2l | F2d => (1, 2),
            L2i | L2f | D2i | D2f => (2, 1),
            Lcmp | Dcmpl | Dcmpg => (4, 1),
            Fcmpl | Fcmpg => (2, 1),
        }
    }

    /// Control never falls through to the next instruction.
    pub fn ends_flow(self) -> bool {
        use Opcode::*;
        matches!(
            self,
            Ireturn | Lreturn | Freturn | Dreturn | Areturn | Return | Athrow
        )
    }

    pub fn mnemonic(self) -> &'static str {
        use Opcode::*;
        match self {
            Nop => "nop",
            Iaload => "iaload",
            Laload => "laload",
            Faload => "faload",
            Daload => "daload",
            Aaload => "aaload",
            Baload => "baload",
            Caload => "caload",
            Saload => "saload",
            Iastore => "iastore",
            Lastore => "lastore",
            Fastore => "fastore",
            Dastore => "dastore",
            Aastore => "aastore",
            Bastore => "bastore",
            Castore => "castore",
            Sastore => "sastore",
            Pop => "pop",
            Pop2 => "pop2",
            Dup => "dup",
            DupX1 => "dup_x1",
            DupX2 => "dup_x2",
            Dup2 => "dup2",
            Dup2X1 => "dup2_x1",
            Dup2X2 => "dup2_x2",
            Swap => "swap",
            Iadd => "iadd",
            Ladd => "ladd",
            Fadd => "fadd",
            Dadd => "dadd",
            Isub => "isub",
            Lsub => "lsub",
            Fsub => "fsub",
            Dsub => "dsub",
            Imul => "imul",
            Lmul => "lmul",
            Fmul => "fmul",
            Dmul => "dmul",
            Idiv => "idiv",
            Ldiv => "ldiv",
            Fdiv => "fdiv",
            Ddiv => "ddiv",
            Irem => "irem",
            Lrem => "lrem",
            Frem => "frem",
            Drem => "drem",
            Ineg => "ineg",
            Lneg => "lneg",
            Fneg => "fneg",
            Dneg => "dneg",
            Iand => "iand",
            Land => "land",
            Ior => "ior",
            Lor => "lor",
            Ixor => "ixor",
            Lxor => "lxor",
            I2l => "i2l",
            I2f => "i2f",
            I2d => "i2d",
            L2i => "l2i",
            L2f => "l2f",
            L2d => "l2d",
            F2i => "f2i",
            F2l => "f2l",
            F2d => "f2d",
            D2i => "d2i",
            D2l => "d2l",
            D2f => "d2f",
            I2b => "i2b",
            I2c => "i2c",
            I2s => "i2s",
            Lcmp => "lcmp",
            Fcmpl => "fcmpl",
            Fcmpg => "fcmpg",
            Dcmpl => "dcmpl",
            Dcmpg => "dcmpg",
            Ireturn => "ireturn",
            Lreturn => "lreturn",
            Freturn => "freturn",
            Dreturn => "dreturn",
            Areturn => "areturn",
            Return => "return",
            Arraylength => "arraylength",
            Athrow => "athrow",
        }
    }

    const ALL: [Opcode; 84] = {
        use Opcode::*;
        [
            Nop, Iaload, Laload, Faload, Daload, Aaload, Baload, Caload, Saload, Iastore,
            Lastore, Fastore, Dastore, Aastore, Bastore, Castore, Sastore, Pop, Pop2, Dup,
            DupX1, DupX2, Dup2, Dup2X1, Dup2X2, Swap, Iadd, Ladd, Fadd, Dadd, Isub, Lsub, Fsub,
            Dsub, Imul, Lmul, Fmul, Dmul, Idiv, Ldiv, Fdiv, Ddiv, Irem, Lrem, Frem, Drem, Ineg,
            Lneg, Fneg, Dneg, Iand, Land, Ior, Lor, Ixor, Lxor, I2l, I2f, I2d, L2i, L2f, L2d,
            F2i, F2l, F2d, D2i, D2l, D2f, I2b, I2c, I2s, Lcmp, Fcmpl, Fcmpg, Dcmpl, Dcmpg,
            Ireturn, Lreturn, Freturn, Dreturn, Areturn, Return, Arraylength, Athrow,
        ]
    };

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.code() == code)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Null,
}

impl Constant {
    fn slots(&self) -> u16 {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

/// Category of a local-variable slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
}

impl LocalKind {
    pub fn slots(self) -> u16 {
        match self {
            LocalKind::Long | LocalKind::Double => 2,
            _ => 1,
        }
    }

    fn load_base(self) -> (u8, u8) {
        match self {
            LocalKind::Int => (0x15, 0x1a),
            LocalKind::Long => (0x16, 0x1e),
            LocalKind::Float => (0x17, 0x22),
            LocalKind::Double => (0x18, 0x26),
            LocalKind::Reference => (0x19, 0x2a),
        }
    }

    fn store_base(self) -> (u8, u8) {
        match self {
            LocalKind::Int => (0x36, 0x3b),
            LocalKind::Long => (0x37, 0x3f),
            LocalKind::Float => (0x38, 0x43),
            LocalKind::Double => (0x39, 0x47),
            LocalKind::Reference => (0x3a, 0x4b),
        }
    }

    /// Typed array load.
    pub fn array_load(self) -> Opcode {
        match self {
            LocalKind::Int => Opcode::Iaload,
            LocalKind::Long => Opcode::Laload,
            LocalKind::Float => Opcode::Faload,
            LocalKind::Double => Opcode::Daload,
            LocalKind::Reference => Opcode::Aaload,
        }
    }

    pub fn return_op(self) -> Opcode {
        match self {
            LocalKind::Int => Opcode::Ireturn,
            LocalKind::Long => Opcode::Lreturn,
            LocalKind::Float => Opcode::Freturn,
            LocalKind::Double => Opcode::Dreturn,
            LocalKind::Reference => Opcode::Areturn,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldOp {
    GetStatic,
    PutStatic,
    GetField,
    PutField,
}

impl FieldOp {
    fn code(self) -> u8 {
        match self {
            FieldOp::GetStatic => 0xb2,
            FieldOp::PutStatic => 0xb3,
            FieldOp::GetField => 0xb4,
            FieldOp::PutField => 0xb5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    Virtual,
    Special,
    Static,
    Interface,
}

impl InvokeKind {
    fn code(self) -> u8 {
        match self {
            InvokeKind::Virtual => 0xb6,
            InvokeKind::Special => 0xb7,
            InvokeKind::Static => 0xb8,
            InvokeKind::Interface => 0xb9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeOp {
    New,
    Checkcast,
    Instanceof,
    Anewarray,
}

impl TypeOp {
    fn code(self) -> u8 {
        match self {
            TypeOp::New => 0xbb,
            TypeOp::Anewarray => 0xbd,
            TypeOp::Checkcast => 0xc0,
            TypeOp::Instanceof => 0xc1,
        }
    }
}

/// `newarray` element type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayType {
    Boolean = 4,
    Char = 5,
    Float = 6,
    Double = 7,
    Byte = 8,
    Short = 9,
    Int = 10,
    Long = 11,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JumpOp {
    Ifeq,
    Ifne,
    Iflt,
    Ifge,
    Ifgt,
    Ifle,
    IfIcmpeq,
    IfIcmpne,
    IfIcmplt,
    IfIcmpge,
    IfIcmpgt,
    IfIcmple,
    IfAcmpeq,
    IfAcmpne,
    Goto,
    Ifnull,
    Ifnonnull,
}

impl JumpOp {
    pub fn code(self) -> u8 {
        use JumpOp::*;
        match self {
            Ifeq => 0x99,
            Ifne => 0x9a,
            Iflt => 0x9b,
            Ifge => 0x9c,
            Ifgt => 0x9d,
            Ifle => 0x9e,
            IfIcmpeq => 0x9f,
            IfIcmpne => 0xa0,
            IfIcmplt => 0xa1,
            IfIcmpge => 0xa2,
            IfIcmpgt => 0xa3,
            IfIcmple => 0xa4,
            IfAcmpeq => 0xa5,
            IfAcmpne => 0xa6,
            Goto => 0xa7,
            Ifnull => 0xc6,
            Ifnonnull => 0xc7,
        }
    }

    /// The jump taken exactly when this one is not. `Goto` has no negation
    /// and is returned unchanged.
    pub fn negate(self) -> Self {
        use JumpOp::*;
        match self {
            Ifeq => Ifne,
            Ifne => Ifeq,
            Iflt => Ifge,
            Ifge => Iflt,
            Ifgt => Ifle,
            Ifle => Ifgt,
            IfIcmpeq => IfIcmpne,
            IfIcmpne => IfIcmpeq,
            IfIcmplt => IfIcmpge,
            IfIcmpge => IfIcmplt,
            IfIcmpgt => IfIcmple,
            IfIcmple => IfIcmpgt,
            IfAcmpeq => IfAcmpne,
            IfAcmpne => IfAcmpeq,
            Goto => Goto,
            Ifnull => Ifnonnull,
            Ifnonnull => Ifnull,
        }
    }

    fn pops(self) -> u16 {
        use JumpOp::*;
        match self {
            Goto => 0,
            Ifeq | Ifne | Iflt | Ifge | Ifgt | Ifle | Ifnull | Ifnonnull => 1,
            _ => 2,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        use JumpOp::*;
        match self {
            Ifeq => "ifeq",
            Ifne => "ifne",
            Iflt => "iflt",
            Ifge => "ifge",
            Ifgt => "ifgt",
            Ifle => "ifle",
            IfIcmpeq => "if_icmpeq",
            IfIcmpne => "if_icmpne",
            IfIcmplt => "if_icmplt",
            IfIcmpge => "if_icmpge",
            IfIcmpgt => "if_icmpgt",
            IfIcmple => "if_icmple",
            IfAcmpeq => "if_acmpeq",
            IfAcmpne => "if_acmpne",
            Goto => "goto",
            Ifnull => "ifnull",
            Ifnonnull => "ifnonnull",
        }
    }
}

/// One symbolic instruction. Class names are internal (slash separated).
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Op(Opcode),
    Push(Constant),
    Load(LocalKind, u16),
    Store(LocalKind, u16),
    Iinc { slot: u16, delta: i16 },
    Field {
        op: FieldOp,
        owner: String,
        name: String,
        descriptor: String,
    },
    Invoke {
        kind: InvokeKind,
        owner: String,
        name: String,
        descriptor: String,
        /// Owner is an interface (selects `InterfaceMethodref`).
        interface: bool,
    },
    Type(TypeOp, String),
    NewArray(ArrayType),
    Jump(JumpOp, Label),
    /// Binds a label to the next instruction's offset.
    Label(Label),
    /// Exception-table entry covering `[start, end)`; `catch_type` of `None`
    /// catches everything.
    TryRange {
        start: Label,
        end: Label,
        handler: Label,
        catch_type: Option<String>,
    },
}

impl Instruction {
    fn stack_effect(&self) -> Result<(u16, u16)> {
        Ok(match self {
            Instruction::Op(op) => op.stack_effect(),
            Instruction::Push(c) => (0, c.slots()),
            Instruction::Load(kind, _) => (0, kind.slots()),
            Instruction::Store(kind, _) => (kind.slots(), 0),
            Instruction::Iinc { .. } | Instruction::Label(_) | Instruction::TryRange { .. } => {
                (0, 0)
            }
            Instruction::Field { op, descriptor, .. } => {
                let width = parse_field_descriptor(descriptor)?.slots();
                match op {
                    FieldOp::GetStatic => (0, width),
                    FieldOp::PutStatic => (width, 0),
                    FieldOp::GetField => (1, width),
                    FieldOp::PutField => (1 + width, 0),
                }
            }
            Instruction::Invoke {
                kind, descriptor, ..
            } => {
                let desc = parse_method_descriptor(descriptor)?;
                let receiver = u16::from(*kind != InvokeKind::Static);
                (desc.param_slots() + receiver, desc.return_type.slots())
            }
            Instruction::Type(TypeOp::New, _) => (0, 1),
            Instruction::Type(_, _) | Instruction::NewArray(_) => (1, 1),
            Instruction::Jump(op, _) => (op.pops(), 0),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<HandlerEntry>,
}

/// Exception-table row with the catch type already in the constant pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: u16,
}

/// Lower symbolic instructions to bytecode, resolving labels and computing
/// `max_stack` by walking every reachable path.
pub fn assemble(
    instructions: &[Instruction],
    max_locals: u16,
    pool: &mut ConstantPoolBuilder,
) -> Result<CodeAttribute> {
    let mut code: Vec<u8> = Vec::new();
    let mut labels: HashMap<Label, usize> = HashMap::new();
    let mut label_index: HashMap<Label, usize> = HashMap::new();
    let mut fixups: Vec<(usize, Label)> = Vec::new();
    let mut ranges = Vec::new();

    for (index, insn) in instructions.iter().enumerate() {
        let at = code.len();
        match insn {
            Instruction::Op(op) => code.push(op.code()),
            Instruction::Push(constant) => encode_constant(&mut code, constant, pool)?,
            Instruction::Load(kind, slot) => encode_local(&mut code, kind.load_base(), *slot),
            Instruction::Store(kind, slot) => encode_local(&mut code, kind.store_base(), *slot),
            Instruction::Iinc { slot, delta } => {
                if *slot <= 0xff && i8::try_from(*delta).is_ok() {
                    code.extend_from_slice(&[0x84, *slot as u8, *delta as i8 as u8]);
                } else {
                    code.extend_from_slice(&[0xc4, 0x84]);
                    code.extend_from_slice(&slot.to_be_bytes());
                    code.extend_from_slice(&delta.to_be_bytes());
                }
            }
            Instruction::Field {
                op,
                owner,
                name,
                descriptor,
            } => {
                let index = pool.field_ref(owner, name, descriptor)?;
                code.push(op.code());
                code.extend_from_slice(&index.to_be_bytes());
            }
            Instruction::Invoke {
                kind,
                owner,
                name,
                descriptor,
                interface,
            } => {
                let index = pool.method_ref(owner, name, descriptor, *interface)?;
                code.push(kind.code());
                code.extend_from_slice(&index.to_be_bytes());
                if *kind == InvokeKind::Interface {
                    let count = parse_method_descriptor(descriptor)?.param_slots() + 1;
                    let count = u8::try_from(count).map_err(|_| Error::Other("too many arguments"))?;
                    code.extend_from_slice(&[count, 0]);
                }
            }
            Instruction::Type(op, class) => {
                let index = pool.class(class)?;
                code.push(op.code());
                code.extend_from_slice(&index.to_be_bytes());
            }
            Instruction::NewArray(atype) => code.extend_from_slice(&[0xbc, *atype as u8]),
            Instruction::Jump(op, target) => {
                code.push(op.code());
                fixups.push((at, *target));
                code.extend_from_slice(&[0, 0]);
            }
            Instruction::Label(label) => {
                labels.insert(*label, at);
                label_index.insert(*label, index);
            }
            Instruction::TryRange {
                start,
                end,
                handler,
                catch_type,
            } => {
                let catch_type = match catch_type {
                    Some(name) => pool.class(name)?,
                    None => 0,
                };
                ranges.push((*start, *end, *handler, catch_type));
            }
        }
    }

    if code.len() > u16::MAX as usize {
        return Err(Error::CodeTooLarge(code.len()));
    }

    let offset_of = |label: &Label| labels.get(label).copied().ok_or(Error::UnboundLabel(label.0));

    for (from, label) in &fixups {
        let to = offset_of(label)?;
        let delta = to as i64 - *from as i64;
        let delta = i16::try_from(delta).map_err(|_| Error::BranchOutOfRange { from: *from, to })?;
        code[from + 1..from + 3].copy_from_slice(&delta.to_be_bytes());
    }

    let mut exception_table = Vec::with_capacity(ranges.len());
    let mut handler_starts = Vec::with_capacity(ranges.len());
    for (start, end, handler, catch_type) in ranges {
        exception_table.push(HandlerEntry {
            start_pc: offset_of(&start)? as u16,
            end_pc: offset_of(&end)? as u16,
            handler_pc: offset_of(&handler)? as u16,
            catch_type,
        });
        handler_starts.push(label_index[&handler]);
    }

    let max_stack = max_stack(instructions, &label_index, &handler_starts)?;

    Ok(CodeAttribute {
        max_stack,
        max_locals,
        code,
        exception_table,
    })
}

fn encode_constant(code: &mut Vec<u8>, constant: &Constant, pool: &mut ConstantPoolBuilder) -> Result<()> {
    match constant {
        Constant::Null => code.push(0x01),
        Constant::Int(v @ -1..=5) => code.push((0x03 + v) as u8),
        Constant::Int(v) if i8::try_from(*v).is_ok() => code.extend_from_slice(&[0x10, *v as i8 as u8]),
        Constant::Int(v) if i16::try_from(*v).is_ok() => {
            code.push(0x11);
            code.extend_from_slice(&(*v as i16).to_be_bytes());
        }
        Constant::Int(v) => {
            let index = pool.integer(*v)?;
            encode_ldc(code, index);
        }
        Constant::Long(v @ 0..=1) => code.push(0x09 + *v as u8),
        Constant::Long(v) => {
            let index = pool.long(*v)?;
            code.push(0x14);
            code.extend_from_slice(&index.to_be_bytes());
        }
        Constant::Float(v) if *v == 0.0 && v.is_sign_positive() => code.push(0x0b),
        Constant::Float(v) if *v == 1.0 => code.push(0x0c),
        Constant::Float(v) if *v == 2.0 => code.push(0x0d),
        Constant::Float(v) => {
            let index = pool.float(*v)?;
            encode_ldc(code, index);
        }
        Constant::Double(v) if *v == 0.0 && v.is_sign_positive() => code.push(0x0e),
        Constant::Double(v) if *v == 1.0 => code.push(0x0f),
        Constant::Double(v) => {
            let index = pool.double(*v)?;
            code.push(0x14);
            code.extend_from_slice(&index.to_be_bytes());
        }
        Constant::String(s) => {
            let index = pool.string(s)?;
            encode_ldc(code, index);
        }
    }
    Ok(())
}

fn encode_ldc(code: &mut Vec<u8>, index: u16) {
    if index <= 0xff {
        code.extend_from_slice(&[0x12, index as u8]);
    } else {
        code.push(0x13);
        code.extend_from_slice(&index.to_be_bytes());
    }
}

fn encode_local(code: &mut Vec<u8>, (long_form, short_base): (u8, u8), slot: u16) {
    if slot <= 3 {
        code.push(short_base + slot as u8);
    } else if slot <= 0xff {
        code.extend_from_slice(&[long_form, slot as u8]);
    } else {
        code.extend_from_slice(&[0xc4, long_form]);
        code.extend_from_slice(&slot.to_be_bytes());
    }
}

fn max_stack(
    instructions: &[Instruction],
    label_index: &HashMap<Label, usize>,
    handler_starts: &[usize],
) -> Result<u16> {
    let mut depth_at: Vec<Option<u32>> = vec![None; instructions.len()];
    let mut work: Vec<(usize, u32)> = vec![(0, 0)];
    // A handler starts with the thrown exception on the stack.
    work.extend(handler_starts.iter().map(|&index| (index, 1)));
    let mut max: u32 = 0;

    while let Some((index, depth)) = work.pop() {
        if index >= instructions.len() {
            continue;
        }
        match depth_at[index] {
            Some(seen) if seen >= depth => continue,
            _ => depth_at[index] = Some(depth),
        }

        let insn = &instructions[index];
        let (pops, pushes) = insn.stack_effect()?;
        if depth < u32::from(pops) {
            return Err(Error::StackUnderflow { at: index });
        }
        let after = depth - u32::from(pops) + u32::from(pushes);
        max = max.max(depth).max(after);
        if max > u32::from(u16::MAX) {
            return Err(Error::Other("operand stack exceeds 65535 slots"));
        }

        match insn {
            Instruction::Op(op) if op.ends_flow() => {}
            Instruction::Jump(op, target) => {
                let target = *label_index.get(target).ok_or(Error::UnboundLabel(target.0))?;
                work.push((target, after));
                if *op != JumpOp::Goto {
                    work.push((index + 1, after));
                }
            }
            _ => work.push((index + 1, after)),
        }
    }

    Ok(max as u16)
}

/// Mnemonics of the instructions in `code`, in order. Covers every
/// instruction `assemble` can produce.
pub fn mnemonics(code: &[u8]) -> Result<Vec<&'static str>> {
    let mut out = Vec::new();
    let mut pc = 0usize;
    while pc < code.len() {
        let op = code[pc];
        let (name, len): (&'static str, usize) = match op {
            0x01 => ("aconst_null", 1),
            0x02..=0x08 => (
                ["iconst_m1", "iconst_0", "iconst_1", "iconst_2", "iconst_3", "iconst_4", "iconst_5"]
                    [(op - 0x02) as usize],
                1,
            ),
            0x09 => ("lconst_0", 1),
            0x0a => ("lconst_1", 1),
            0x0b => ("fconst_0", 1),
            0x0c => ("fconst_1", 1),
            0x0d => ("fconst_2", 1),
            0x0e => ("dconst_0", 1),
            0x0f => ("dconst_1", 1),
            0x10 => ("bipush", 2),
            0x11 => ("sipush", 3),
            0x12 => ("ldc", 2),
            0x13 => ("ldc_w", 3),
            0x14 => ("ldc2_w", 3),
            0x15 => ("iload", 2),
            0x16 => ("lload", 2),
            0x17 => ("fload", 2),
            0x18 => ("dload", 2),
            0x19 => ("aload", 2),
            0x1a..=0x2d => (short_local_name("load", op - 0x1a), 1),
            0x36 => ("istore", 2),
            0x37 => ("lstore", 2),
            0x38 => ("fstore", 2),
            0x39 => ("dstore", 2),
            0x3a => ("astore", 2),
            0x3b..=0x4e => (short_local_name("store", op - 0x3b), 1),
            0x84 => ("iinc", 3),
            0x99..=0xa7 | 0xc6 | 0xc7 => (
                ALL_JUMPS
                    .iter()
                    .find(|j| j.code() == op)
                    .map(|j| j.mnemonic())
                    .unwrap_or("?"),
                3,
            ),
            0xb2 => ("getstatic", 3),
            0xb3 => ("putstatic", 3),
            0xb4 => ("getfield", 3),
            0xb5 => ("putfield", 3),
            0xb6 => ("invokevirtual", 3),
            0xb7 => ("invokespecial", 3),
            0xb8 => ("invokestatic", 3),
            0xb9 => ("invokeinterface", 5),
            0xbb => ("new", 3),
            0xbc => ("newarray", 2),
            0xbd => ("anewarray", 3),
            0xc0 => ("checkcast", 3),
            0xc1 => ("instanceof", 3),
            0xc4 => {
                let inner = *code.get(pc + 1).ok_or(Error::UnexpectedEof)?;
                ("wide", if inner == 0x84 { 6 } else { 4 })
            }
            other => match Opcode::from_code(other) {
                Some(op) => (op.mnemonic(), 1),
                None => return Err(Error::Other("unsupported opcode")),
            },
        };
        out.push(name);
        pc += len;
    }
    if pc != code.len() {
        return Err(Error::UnexpectedEof);
    }
    Ok(out)
}

const ALL_JUMPS: [JumpOp; 17] = {
    use JumpOp::*;
    [
        Ifeq, Ifne, Iflt, Ifge, Ifgt, Ifle, IfIcmpeq, IfIcmpne, IfIcmplt, IfIcmpge, IfIcmpgt,
        IfIcmple, IfAcmpeq, IfAcmpne, Goto, Ifnull, Ifnonnull,
    ]
};

fn short_local_name(suffix: &str, rel: u8) -> &'static str {
    const LOADS: [&str; 20] = [
        "iload_0", "iload_1", "iload_2", "iload_3", "lload_0", "lload_1", "lload_2", "lload_3",
        "fload_0", "fload_1", "fload_2", "fload_3", "dload_0", "dload_1", "dload_2", "dload_3",
        "aload_0", "aload_1", "aload_2", "aload_3",
    ];
    const STORES: [&str; 20] = [
        "istore_0", "istore_1", "istore_2", "istore_3", "lstore_0", "lstore_1", "lstore_2",
        "lstore_3", "fstore_0", "fstore_1", "fstore_2", "fstore_3", "dstore_0", "dstore_1",
        "dstore_2", "dstore_3", "astore_0", "astore_1", "astore_2", "astore_3",
    ];
    if suffix == "load" {
        LOADS[rel as usize]
    } else {
        STORES[rel as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assemble_simple(instructions: &[Instruction]) -> Result<CodeAttribute> {
        let mut pool = ConstantPoolBuilder::new();
        assemble(instructions, 4, &mut pool)
    }

    #[test]
    fn constants_pick_short_forms() {
        let code = assemble_simple(&[
            Instruction::Push(Constant::Int(3)),
            Instruction::Push(Constant::Int(100)),
            Instruction::Push(Constant::Int(1000)),
            Instruction::Push(Constant::Int(100_000)),
            Instruction::Push(Constant::Long(1)),
            Instruction::Op(Opcode::Return),
        ])
        .unwrap();
        assert_eq!(
            mnemonics(&code.code).unwrap(),
            vec!["iconst_3", "bipush", "sipush", "ldc", "lconst_1", "return"]
        );
        assert_eq!(code.max_stack, 6);
    }

    #[test]
    fn branches_resolve_backwards_and_forwards() {
        let top = Label(0);
        let exit = Label(1);
        let code = assemble_simple(&[
            Instruction::Label(top),
            Instruction::Load(LocalKind::Int, 1),
            Instruction::Jump(JumpOp::Ifeq, exit),
            Instruction::Iinc { slot: 1, delta: -1 },
            Instruction::Jump(JumpOp::Goto, top),
            Instruction::Label(exit),
            Instruction::Op(Opcode::Return),
        ])
        .unwrap();
        // iload_1, ifeq +9, iinc, goto -7, return
        assert_eq!(
            code.code,
            vec![0x1b, 0x99, 0x00, 0x09, 0x84, 0x01, 0xff, 0xa7, 0xff, 0xf9, 0xb1]
        );
        assert_eq!(code.max_stack, 1);
    }

    #[test]
    fn unbound_label_is_reported() {
        let err = assemble_simple(&[Instruction::Jump(JumpOp::Goto, Label(7))]).unwrap_err();
        assert_eq!(err, Error::UnboundLabel(7));
    }

    #[test]
    fn underflow_is_reported() {
        let err = assemble_simple(&[Instruction::Op(Opcode::Pop)]).unwrap_err();
        assert_eq!(err, Error::StackUnderflow { at: 0 });
    }

    #[test]
    fn far_branch_is_out_of_range() {
        let mut insns = vec![Instruction::Jump(JumpOp::Goto, Label(0))];
        insns.extend(std::iter::repeat(Instruction::Op(Opcode::Nop)).take(40_000));
        insns.push(Instruction::Label(Label(0)));
        insns.push(Instruction::Op(Opcode::Return));
        let err = assemble_simple(&insns).unwrap_err();
        assert_eq!(err, Error::BranchOutOfRange { from: 0, to: 40_003 });
    }

    #[test]
    fn invoke_counts_receiver_and_wide_arguments() {
        let code = assemble_simple(&[
            Instruction::Load(LocalKind::Reference, 0),
            Instruction::Push(Constant::Long(5)),
            Instruction::Push(Constant::Double(2.5)),
            Instruction::Invoke {
                kind: InvokeKind::Interface,
                owner: "p/I".into(),
                name: "m".into(),
                descriptor: "(JD)J".into(),
                interface: true,
            },
            Instruction::Op(Opcode::Lreturn),
        ])
        .unwrap();
        assert_eq!(code.max_stack, 5);
        // opcode, index(2), count = 1 + 2 + 2, 0
        let invoke_at = code.code.len() - 6;
        assert_eq!(code.code[invoke_at], 0xb9);
        assert_eq!(code.code[invoke_at + 3], 5);
    }

    #[test]
    fn handlers_start_with_one_slot() {
        let (start, end, handler, done) = (Label(0), Label(1), Label(2), Label(3));
        let code = assemble_simple(&[
            Instruction::TryRange {
                start,
                end,
                handler,
                catch_type: Some("java/lang/Throwable".into()),
            },
            Instruction::Label(start),
            Instruction::Op(Opcode::Nop),
            Instruction::Label(end),
            Instruction::Jump(JumpOp::Goto, done),
            Instruction::Label(handler),
            Instruction::Store(LocalKind::Reference, 1),
            Instruction::Label(done),
            Instruction::Op(Opcode::Return),
        ])
        .unwrap();
        assert_eq!(code.exception_table.len(), 1);
        let entry = code.exception_table[0];
        assert_eq!((entry.start_pc, entry.end_pc, entry.handler_pc), (0, 1, 4));
        assert_ne!(entry.catch_type, 0);
        assert_eq!(code.max_stack, 1);
    }

    #[test]
    fn negate_is_an_involution() {
        for op in ALL_JUMPS {
            assert_eq!(op.negate().negate(), op);
        }
    }
}

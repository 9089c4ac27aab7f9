use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    UnexpectedEof,
    TrailingBytes(usize),
    InvalidMagic(u32),
    InvalidConstantPoolIndex(u16),
    InvalidConstantPoolTag(u8),
    ConstantPoolTypeMismatch {
        index: u16,
        expected: &'static str,
        found: &'static str,
    },
    ConstantPoolOverflow,
    InvalidModifiedUtf8,
    InvalidDescriptor(String),
    InvalidSignature(String),
    MalformedAttribute(&'static str),
    UnboundLabel(u32),
    BranchOutOfRange { from: usize, to: usize },
    StackUnderflow { at: usize },
    CodeTooLarge(usize),
    Other(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnexpectedEof => write!(f, "unexpected end of input"),
            Error::TrailingBytes(n) => write!(f, "{n} unexpected trailing bytes"),
            Error::InvalidMagic(magic) => write!(f, "invalid classfile magic: 0x{magic:08x}"),
            Error::InvalidConstantPoolIndex(index) => {
                write!(f, "invalid constant pool index: {index}")
            }
            Error::InvalidConstantPoolTag(tag) => write!(f, "invalid constant pool tag: {tag}"),
            Error::ConstantPoolTypeMismatch {
                index,
                expected,
                found,
            } => write!(
                f,
                "constant pool type mismatch at index {index}: expected {expected}, found {found}"
            ),
            Error::ConstantPoolOverflow => write!(f, "constant pool exceeds 65535 entries"),
            Error::InvalidModifiedUtf8 => write!(f, "invalid modified UTF-8 constant"),
            Error::InvalidDescriptor(desc) => write!(f, "invalid descriptor: {desc}"),
            Error::InvalidSignature(sig) => write!(f, "invalid signature: {sig}"),
            Error::MalformedAttribute(name) => write!(f, "malformed {name} attribute"),
            Error::UnboundLabel(label) => write!(f, "label L{label} is never bound"),
            Error::BranchOutOfRange { from, to } => {
                write!(f, "branch from offset {from} to {to} does not fit in 16 bits")
            }
            Error::StackUnderflow { at } => write!(f, "operand stack underflow at instruction {at}"),
            Error::CodeTooLarge(len) => write!(f, "method code is {len} bytes, limit is 65535"),
            Error::Other(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for Error {}

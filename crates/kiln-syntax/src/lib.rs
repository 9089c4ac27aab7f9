//! Lexer, parser and parse tree of the Kiln source language.
//!
//! [`parse`] turns source text into an [`ast::File`]; [`walk_file`] drives
//! [`Listener`] hooks over it, which is how the compiler passes visit a file.

pub mod ast;
mod lexer;
mod literals;
mod parser;
mod walk;

pub use lexer::{lex, LexError, Lexer, Token, TokenKind};
pub use literals::{
    parse_float_literal, parse_int_literal, parse_long_literal, parse_num_literal,
    unescape_char_literal, unescape_string_literal, LiteralError,
};
pub use parser::{parse, ParsedFile, MISSING_TERMINATOR, SYNTAX};
pub use walk::{walk_file, Listener};

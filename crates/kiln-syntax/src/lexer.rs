use kiln_core::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Identifiers and keywords; the parser tells them apart by text.
    Ident,
    IntLiteral,
    LongLiteral,
    FloatLiteral,
    NumLiteral,
    CharLiteral,
    StringLiteral,
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Semi,
    Comma,
    Dot,
    Ellipsis,
    Amp,
    AmpAmp,
    PipePipe,
    Bang,
    BangEq,
    Eq,
    EqEq,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    PlusEq,
    PlusPlus,
    Minus,
    MinusEq,
    MinusMinus,
    Star,
    StarEq,
    Slash,
    SlashEq,
    Percent,
}

impl TokenKind {
    pub fn is_literal(self) -> bool {
        matches!(
            self,
            TokenKind::IntLiteral
                | TokenKind::LongLiteral
                | TokenKind::FloatLiteral
                | TokenKind::NumLiteral
                | TokenKind::CharLiteral
                | TokenKind::StringLiteral
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text, quotes and suffixes included.
    pub text: String,
    pub at: Coordinate,
    /// Position just past the last character.
    pub end: Coordinate,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct LexError {
    pub message: String,
    pub at: Coordinate,
}

pub struct Lexer<'a> {
    rest: &'a str,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(text: &'a str) -> Self {
        Lexer {
            rest: text,
            line: 1,
            column: 0,
        }
    }

    fn here(&self) -> Coordinate {
        Coordinate::new(self.line, self.column)
    }

    fn peek_char(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest.chars().nth(1)
    }

    fn bump_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.rest = &self.rest[c.len_utf8()..];
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.bump_char();
            true
        } else {
            false
        }
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), LexError> {
        loop {
            while matches!(self.peek_char(), Some(c) if c.is_whitespace()) {
                self.bump_char();
            }

            if self.rest.starts_with("//") {
                while let Some(c) = self.bump_char() {
                    if c == '\n' {
                        break;
                    }
                }
                continue;
            }

            if self.rest.starts_with("/*") {
                let at = self.here();
                self.bump_char();
                self.bump_char();
                while !self.rest.is_empty() && !self.rest.starts_with("*/") {
                    self.bump_char();
                }
                if self.rest.is_empty() {
                    return Err(LexError {
                        message: "Unterminated comment".to_string(),
                        at,
                    });
                }
                self.bump_char();
                self.bump_char();
                continue;
            }

            return Ok(());
        }
    }

    fn lex_quoted(&mut self, quote: char, out: &mut String, at: Coordinate) -> Result<(), LexError> {
        loop {
            match self.bump_char() {
                Some(c) if c == quote => {
                    out.push(c);
                    return Ok(());
                }
                Some('\\') => {
                    out.push('\\');
                    if let Some(escaped) = self.bump_char() {
                        out.push(escaped);
                    }
                }
                Some('\n') | None => {
                    let what = if quote == '"' { "string" } else { "character" };
                    return Err(LexError {
                        message: format!("Unterminated {what} literal"),
                        at,
                    });
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn lex_digits(&mut self, out: &mut String) {
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() || c == '_' {
                out.push(c);
                self.bump_char();
            } else {
                break;
            }
        }
    }

    fn lex_number(&mut self, first: char) -> (TokenKind, String) {
        let mut text = String::from(first);
        self.lex_digits(&mut text);

        let mut fractional = false;
        if self.peek_char() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
            fractional = true;
            text.push('.');
            self.bump_char();
            self.lex_digits(&mut text);
        }
        if matches!(self.peek_char(), Some('e' | 'E')) {
            let sign = self.peek_second();
            let signed = matches!(sign, Some('+' | '-'));
            let digit_follows = if signed {
                self.rest.chars().nth(2).is_some_and(|c| c.is_ascii_digit())
            } else {
                sign.is_some_and(|c| c.is_ascii_digit())
            };
            if digit_follows {
                fractional = true;
                text.extend(self.bump_char());
                if signed {
                    text.extend(self.bump_char());
                }
                self.lex_digits(&mut text);
            }
        }

        let kind = match self.peek_char() {
            Some('L' | 'l') if !fractional => TokenKind::LongLiteral,
            Some('f' | 'F') => TokenKind::FloatLiteral,
            Some('d' | 'D') => TokenKind::NumLiteral,
            _ if fractional => return (TokenKind::NumLiteral, text),
            _ => return (TokenKind::IntLiteral, text),
        };
        text.extend(self.bump_char());
        (kind, text)
    }

    fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        self.skip_whitespace_and_comments()?;
        let at = self.here();
        let Some(ch) = self.bump_char() else {
            return Ok(None);
        };

        use TokenKind::*;
        let (kind, text) = match ch {
            '{' => (LBrace, "{".to_string()),
            '}' => (RBrace, "}".to_string()),
            '(' => (LParen, "(".to_string()),
            ')' => (RParen, ")".to_string()),
            '[' => (LBracket, "[".to_string()),
            ']' => (RBracket, "]".to_string()),
            ';' => (Semi, ";".to_string()),
            ',' => (Comma, ",".to_string()),
            '%' => (Percent, "%".to_string()),
            '.' if self.rest.starts_with("..") => {
                self.bump_char();
                self.bump_char();
                (Ellipsis, "...".to_string())
            }
            '.' => (Dot, ".".to_string()),
            '&' if self.eat('&') => (AmpAmp, "&&".to_string()),
            '&' => (Amp, "&".to_string()),
            '|' if self.eat('|') => (PipePipe, "||".to_string()),
            '!' if self.eat('=') => (BangEq, "!=".to_string()),
            '!' => (Bang, "!".to_string()),
            '=' if self.eat('=') => (EqEq, "==".to_string()),
            '=' => (Eq, "=".to_string()),
            '<' if self.eat('=') => (Le, "<=".to_string()),
            '<' => (Lt, "<".to_string()),
            '>' if self.eat('=') => (Ge, ">=".to_string()),
            '>' => (Gt, ">".to_string()),
            '+' if self.eat('=') => (PlusEq, "+=".to_string()),
            '+' if self.eat('+') => (PlusPlus, "++".to_string()),
            '+' => (Plus, "+".to_string()),
            '-' if self.eat('=') => (MinusEq, "-=".to_string()),
            '-' if self.eat('-') => (MinusMinus, "--".to_string()),
            '-' => (Minus, "-".to_string()),
            '*' if self.eat('=') => (StarEq, "*=".to_string()),
            '*' => (Star, "*".to_string()),
            '/' if self.eat('=') => (SlashEq, "/=".to_string()),
            '/' => (Slash, "/".to_string()),
            '"' | '\'' => {
                let mut text = String::from(ch);
                self.lex_quoted(ch, &mut text, at)?;
                let kind = if ch == '"' { StringLiteral } else { CharLiteral };
                (kind, text)
            }
            c if c.is_ascii_digit() => self.lex_number(c),
            c if c == '_' || c == '$' || unicode_ident::is_xid_start(c) => {
                let mut text = String::from(c);
                while let Some(c) = self.peek_char() {
                    if c == '$' || unicode_ident::is_xid_continue(c) {
                        text.push(c);
                        self.bump_char();
                    } else {
                        break;
                    }
                }
                (Ident, text)
            }
            other => {
                return Err(LexError {
                    message: format!("Unexpected character '{other}'"),
                    at,
                })
            }
        };

        Ok(Some(Token {
            kind,
            text,
            at,
            end: self.here(),
        }))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}

/// Tokenize a whole file, stopping at the first malformed token.
pub fn lex(text: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(text: &str) -> Vec<TokenKind> {
        lex(text).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn numbers_carry_their_category() {
        use TokenKind::*;
        assert_eq!(
            kinds("1 10L 1.5f 1.5 2e3 3d"),
            vec![IntLiteral, LongLiteral, FloatLiteral, NumLiteral, NumLiteral, NumLiteral]
        );
    }

    #[test]
    fn operators_prefer_the_longest_form() {
        use TokenKind::*;
        assert_eq!(
            kinds("a += b++ <= c != d && e || f... g"),
            vec![
                Ident, PlusEq, Ident, PlusPlus, Le, Ident, BangEq, Ident, AmpAmp, Ident, PipePipe,
                Ident, Ellipsis, Ident
            ]
        );
    }

    #[test]
    fn coordinates_are_line_and_column() {
        let tokens = lex("class A {\n  // note\n  Int x;\n}").unwrap();
        let int = tokens.iter().find(|t| t.text == "Int").unwrap();
        assert_eq!(int.at, Coordinate::new(3, 2));
        assert_eq!(int.end, Coordinate::new(3, 5));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = lex("x = \"abc\n").unwrap_err();
        assert_eq!(err.at, Coordinate::new(1, 4));
        assert_eq!(err.to_string(), "Unterminated string literal");
    }
}

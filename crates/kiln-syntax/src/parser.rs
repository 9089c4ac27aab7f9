use kiln_core::{Coordinate, Diagnostic};

use crate::ast::*;
use crate::lexer::{lex, Token, TokenKind};
use crate::literals;

pub const SYNTAX: &str = "syntax";
pub const MISSING_TERMINATOR: &str = "missing-terminator";

const KEYWORDS: &[&str] = &[
    "as", "attempt", "class", "const", "else", "extends", "false", "for", "if", "implements",
    "import", "interface", "new", "null", "return", "static", "super", "this", "true", "var",
    "while",
];

/// A file that parsed, possibly after recovering from missing terminators.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFile {
    pub file: File,
    /// Recovered problems. Non-empty still fails the file, but analysis runs.
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse a source file.
///
/// A grammar violation other than a missing `;` stops parsing; the error
/// then carries every diagnostic reported up to that point.
pub fn parse(text: &str) -> Result<ParsedFile, Vec<Diagnostic>> {
    let tokens = match lex(text) {
        Ok(tokens) => tokens,
        Err(err) => return Err(vec![Diagnostic::error(SYNTAX, err.at, err.message)]),
    };
    let mut parser = Parser::new(tokens);
    match parser.parse_file() {
        Ok(file) => {
            tracing::debug!(
                target: "kiln.syntax",
                classes = file.classes.len(),
                recovered = parser.diagnostics.len(),
                "parsed file"
            );
            Ok(ParsedFile {
                file,
                diagnostics: parser.diagnostics,
            })
        }
        Err(Fatal) => Err(parser.diagnostics),
    }
}

/// Marker for an unrecoverable syntax error; the diagnostic is already
/// recorded on the parser.
#[derive(Debug)]
struct Fatal;

type PResult<T> = Result<T, Fatal>;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_n(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    fn at_kind(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|token| token.kind == kind)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.peek()
            .is_some_and(|token| token.kind == TokenKind::Ident && token.text == keyword)
    }

    fn at_name(&self) -> bool {
        self.peek().is_some_and(is_name)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at_kind(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Where the current token starts, or where the file ends.
    fn here(&self) -> Coordinate {
        match self.peek() {
            Some(tok) => tok.at,
            None => self.prev_end(),
        }
    }

    fn prev_end(&self) -> Coordinate {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.end)
            .unwrap_or(Coordinate::new(1, 0))
    }

    fn found(&self) -> String {
        match self.peek() {
            Some(tok) => format!("'{}'", tok.text),
            None => "end of file".to_string(),
        }
    }

    fn error_here(&mut self, expected: &str) -> Fatal {
        let message = format!("Expected {expected}, found {}", self.found());
        self.diagnostics
            .push(Diagnostic::error(SYNTAX, self.here(), message));
        Fatal
    }

    fn error_at(&mut self, at: Coordinate, message: impl Into<String>) -> Fatal {
        self.diagnostics.push(Diagnostic::error(SYNTAX, at, message));
        Fatal
    }

    fn expect_kind(&mut self, kind: TokenKind, expected: &str) -> PResult<Token> {
        if self.at_kind(kind) {
            self.bump().ok_or(Fatal)
        } else {
            Err(self.error_here(expected))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> PResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error_here(&format!("'{keyword}'")))
        }
    }

    fn expect_ident(&mut self) -> PResult<Token> {
        if self.at_name() {
            self.bump().ok_or(Fatal)
        } else {
            Err(self.error_here("an identifier"))
        }
    }

    /// A missing `;` is reported and parsing carries on as if it were there.
    fn expect_terminator(&mut self) {
        if !self.eat(TokenKind::Semi) {
            let at = self.prev_end();
            self.diagnostics
                .push(Diagnostic::error(MISSING_TERMINATOR, at, "Missing ';'"));
        }
    }

    fn parse_file(&mut self) -> PResult<File> {
        let mut file = File::default();
        while self.at_keyword("import") {
            file.imports.push(self.parse_import()?);
        }
        while !self.is_eof() {
            if self.at_keyword("const") {
                file.constants.push(self.parse_const()?);
            } else if self.at_keyword("class") || self.at_keyword("interface") {
                file.classes.push(self.parse_class()?);
            } else {
                return Err(self.error_here("a class, interface or const declaration"));
            }
        }
        Ok(file)
    }

    fn parse_import(&mut self) -> PResult<Import> {
        let at = self.here();
        self.expect_keyword("import")?;
        let mut parts = vec![self.expect_ident()?.text];
        let mut is_star = false;
        while self.eat(TokenKind::Dot) {
            if self.eat(TokenKind::Star) {
                is_star = true;
                break;
            }
            parts.push(self.expect_ident()?.text);
        }
        self.expect_terminator();
        Ok(Import {
            path: parts.join("."),
            is_star,
            at,
        })
    }

    fn parse_const(&mut self) -> PResult<ConstDecl> {
        let at = self.here();
        self.expect_keyword("const")?;
        let ty = self.parse_type()?;
        let name = self.expect_ident()?.text;
        self.expect_kind(TokenKind::Eq, "'='")?;
        let value = self.parse_expression(0)?;
        self.expect_terminator();
        Ok(ConstDecl {
            ty,
            name,
            value,
            at,
        })
    }

    fn parse_qualified_name(&mut self) -> PResult<String> {
        let mut parts = vec![self.expect_ident()?.text];
        while self.at_kind(TokenKind::Dot) && self.peek_n(1).is_some_and(is_name) {
            self.bump();
            parts.push(self.expect_ident()?.text);
        }
        Ok(parts.join("."))
    }

    fn parse_class(&mut self) -> PResult<ClassDecl> {
        let at = self.here();
        let kind = if self.eat_keyword("interface") {
            ClassDeclKind::Interface
        } else {
            self.expect_keyword("class")?;
            ClassDeclKind::Class
        };
        let name = self.expect_ident()?.text;
        let type_params = if self.at_kind(TokenKind::Lt) {
            self.parse_type_params()?
        } else {
            Vec::new()
        };

        let mut extends = Vec::new();
        if self.eat_keyword("extends") {
            extends.push(self.parse_type()?);
            while kind == ClassDeclKind::Interface && self.eat(TokenKind::Comma) {
                extends.push(self.parse_type()?);
            }
        }
        let mut implements = Vec::new();
        if self.eat_keyword("implements") {
            implements.push(self.parse_type()?);
            while self.eat(TokenKind::Comma) {
                implements.push(self.parse_type()?);
            }
        }

        self.expect_kind(TokenKind::LBrace, "'{'")?;
        let mut members = Vec::new();
        while !self.at_kind(TokenKind::RBrace) {
            if self.is_eof() {
                return Err(self.error_here("'}'"));
            }
            members.push(self.parse_member(&name)?);
        }
        self.bump();

        Ok(ClassDecl {
            kind,
            name,
            type_params,
            extends,
            implements,
            members,
            at,
        })
    }

    fn parse_type_params(&mut self) -> PResult<Vec<TypeParam>> {
        self.expect_kind(TokenKind::Lt, "'<'")?;
        let mut params = Vec::new();
        loop {
            let tok = self.expect_ident()?;
            let mut bounds = Vec::new();
            if self.eat_keyword("extends") {
                bounds.push(self.parse_type()?);
                while self.eat(TokenKind::Amp) {
                    bounds.push(self.parse_type()?);
                }
            }
            params.push(TypeParam {
                name: tok.text,
                bounds,
                at: tok.at,
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect_kind(TokenKind::Gt, "'>'")?;
        Ok(params)
    }

    fn parse_member(&mut self, class_name: &str) -> PResult<Member> {
        let at = self.here();
        let is_static = self.eat_keyword("static");

        if !is_static
            && self.at_name()
            && self.peek_n(1).is_some_and(|t| t.kind == TokenKind::LParen)
        {
            let name = self.expect_ident()?;
            if name.text != class_name {
                return Err(self.error_at(
                    name.at,
                    format!("Constructor '{}' does not match class '{class_name}'", name.text),
                ));
            }
            let params = self.parse_params()?;
            let body = self.parse_block()?;
            return Ok(Member::Constructor(ConstructorDecl {
                name: name.text,
                params,
                body,
                at,
            }));
        }

        let ty = self.parse_type()?;
        let name = self.expect_ident()?.text;
        if self.at_kind(TokenKind::LParen) {
            let params = self.parse_params()?;
            let body = if self.at_kind(TokenKind::LBrace) {
                Some(self.parse_block()?)
            } else {
                self.expect_terminator();
                None
            };
            return Ok(Member::Method(MethodDecl {
                is_static,
                return_ty: ty,
                name,
                params,
                body,
                at,
            }));
        }

        let init = if self.eat(TokenKind::Eq) {
            Some(self.parse_expression(0)?)
        } else {
            None
        };
        self.expect_terminator();
        Ok(Member::Field(FieldDecl {
            is_static,
            ty,
            name,
            init,
            at,
        }))
    }

    fn parse_params(&mut self) -> PResult<Vec<Param>> {
        self.expect_kind(TokenKind::LParen, "'('")?;
        let mut params: Vec<Param> = Vec::new();
        if self.eat(TokenKind::RParen) {
            return Ok(params);
        }
        loop {
            let at = self.here();
            if params.last().is_some_and(|p| p.variadic) {
                return Err(self.error_at(at, "A variadic parameter must be the last parameter"));
            }
            let ty = self.parse_type()?;
            let variadic = self.eat(TokenKind::Ellipsis);
            let name = self.expect_ident()?.text;
            params.push(Param {
                ty,
                name,
                variadic,
                at,
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect_kind(TokenKind::RParen, "')'")?;
        Ok(params)
    }

    fn parse_type(&mut self) -> PResult<TypeRef> {
        let at = self.here();
        let name = self.parse_qualified_name()?;
        let mut args = Vec::new();
        if self.eat(TokenKind::Lt) {
            args.push(self.parse_type()?);
            while self.eat(TokenKind::Comma) {
                args.push(self.parse_type()?);
            }
            self.expect_kind(TokenKind::Gt, "'>'")?;
        }
        let mut dims = 0;
        while self.at_kind(TokenKind::LBracket)
            && self.peek_n(1).is_some_and(|t| t.kind == TokenKind::RBracket)
        {
            self.bump();
            self.bump();
            dims += 1;
        }
        Ok(TypeRef {
            name,
            args,
            dims,
            at,
        })
    }

    fn parse_block(&mut self) -> PResult<Block> {
        let at = self.here();
        self.expect_kind(TokenKind::LBrace, "'{'")?;
        let mut statements = Vec::new();
        while !self.at_kind(TokenKind::RBrace) {
            if self.is_eof() {
                return Err(self.error_here("'}'"));
            }
            statements.push(self.parse_statement()?);
        }
        self.bump();
        Ok(Block { statements, at })
    }

    fn parse_statement(&mut self) -> PResult<Stmt> {
        let at = self.here();
        let kind = if self.at_kind(TokenKind::LBrace) {
            StmtKind::Block(self.parse_block()?)
        } else if self.eat_keyword("if") {
            let cond = self.parse_condition()?;
            let then_branch = Box::new(self.parse_statement()?);
            let else_branch = if self.eat_keyword("else") {
                Some(Box::new(self.parse_statement()?))
            } else {
                None
            };
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            }
        } else if self.eat_keyword("while") {
            let cond = self.parse_condition()?;
            let body = Box::new(self.parse_statement()?);
            StmtKind::While { cond, body }
        } else if self.eat_keyword("for") {
            self.expect_kind(TokenKind::LParen, "'('")?;
            let init = if self.at_kind(TokenKind::Semi) {
                None
            } else {
                Some(Box::new(self.parse_simple_statement()?))
            };
            self.expect_kind(TokenKind::Semi, "';'")?;
            let cond = if self.at_kind(TokenKind::Semi) {
                None
            } else {
                Some(self.parse_expression(0)?)
            };
            self.expect_kind(TokenKind::Semi, "';'")?;
            let step = if self.at_kind(TokenKind::RParen) {
                None
            } else {
                Some(Box::new(self.parse_simple_statement()?))
            };
            self.expect_kind(TokenKind::RParen, "')'")?;
            let body = Box::new(self.parse_statement()?);
            StmtKind::For {
                init,
                cond,
                step,
                body,
            }
        } else if self.eat_keyword("return") {
            let value = if self.at_kind(TokenKind::Semi) || self.at_kind(TokenKind::RBrace) {
                None
            } else {
                Some(self.parse_expression(0)?)
            };
            self.expect_terminator();
            StmtKind::Return(value)
        } else {
            let stmt = self.parse_simple_statement()?;
            self.expect_terminator();
            return Ok(stmt);
        };
        Ok(Stmt { kind, at })
    }

    fn parse_condition(&mut self) -> PResult<Expr> {
        self.expect_kind(TokenKind::LParen, "'('")?;
        let cond = self.parse_expression(0)?;
        self.expect_kind(TokenKind::RParen, "')'")?;
        Ok(cond)
    }

    /// Declarations, assignments, steps and expression statements, without
    /// their terminator (they also appear in `for` headers).
    fn parse_simple_statement(&mut self) -> PResult<Stmt> {
        let at = self.here();
        if self.eat_keyword("var") {
            let name = self.expect_ident()?.text;
            self.expect_kind(TokenKind::Eq, "'='")?;
            let init = Some(self.parse_expression(0)?);
            return Ok(Stmt {
                kind: StmtKind::Local {
                    ty: None,
                    name,
                    init,
                },
                at,
            });
        }

        if self.looks_like_local() {
            let ty = self.parse_type()?;
            let name = self.expect_ident()?.text;
            let init = if self.eat(TokenKind::Eq) {
                Some(self.parse_expression(0)?)
            } else {
                None
            };
            return Ok(Stmt {
                kind: StmtKind::Local {
                    ty: Some(ty),
                    name,
                    init,
                },
                at,
            });
        }

        let target = self.parse_expression(0)?;
        let op = match self.peek().map(|t| t.kind) {
            Some(TokenKind::Eq) => Some(AssignOp::Set),
            Some(TokenKind::PlusEq) => Some(AssignOp::Add),
            Some(TokenKind::MinusEq) => Some(AssignOp::Sub),
            Some(TokenKind::StarEq) => Some(AssignOp::Mul),
            Some(TokenKind::SlashEq) => Some(AssignOp::Div),
            _ => None,
        };
        let kind = if let Some(op) = op {
            self.bump();
            let value = self.parse_expression(0)?;
            StmtKind::Assign { target, op, value }
        } else if self.eat(TokenKind::PlusPlus) {
            StmtKind::Step {
                target,
                increment: true,
            }
        } else if self.eat(TokenKind::MinusMinus) {
            StmtKind::Step {
                target,
                increment: false,
            }
        } else {
            StmtKind::Expr(target)
        };
        Ok(Stmt { kind, at })
    }

    /// `Type name` ahead: a qualified name, optional type arguments and
    /// array brackets, then an identifier.
    fn looks_like_local(&self) -> bool {
        let mut i = self.pos;
        let tok = |i: usize| self.tokens.get(i);
        if !tok(i).is_some_and(is_name) {
            return false;
        }
        i += 1;
        while tok(i).is_some_and(|t| t.kind == TokenKind::Dot) && tok(i + 1).is_some_and(is_name) {
            i += 2;
        }
        if tok(i).is_some_and(|t| t.kind == TokenKind::Lt) {
            let mut depth = 0usize;
            loop {
                match tok(i).map(|t| t.kind) {
                    Some(TokenKind::Lt) => depth += 1,
                    Some(TokenKind::Gt) => {
                        depth -= 1;
                        if depth == 0 {
                            i += 1;
                            break;
                        }
                    }
                    Some(TokenKind::Ident | TokenKind::Dot | TokenKind::Comma)
                    | Some(TokenKind::LBracket | TokenKind::RBracket) => {}
                    _ => return false,
                }
                i += 1;
            }
        }
        while tok(i).is_some_and(|t| t.kind == TokenKind::LBracket)
            && tok(i + 1).is_some_and(|t| t.kind == TokenKind::RBracket)
        {
            i += 2;
        }
        tok(i).is_some_and(is_name)
    }

    fn parse_expression(&mut self, min_bp: u8) -> PResult<Expr> {
        let mut lhs = self.parse_prefix()?;
        loop {
            if self.at_keyword("as") {
                if CAST_BP < min_bp {
                    break;
                }
                self.bump();
                let ty = self.parse_type()?;
                let at = lhs.at;
                lhs = Expr::new(
                    ExprKind::Cast {
                        expr: Box::new(lhs),
                        ty,
                    },
                    at,
                );
                continue;
            }

            let Some((op, l_bp, r_bp)) = self.peek().and_then(|t| infix_binding_power(t.kind)) else {
                break;
            };
            if l_bp < min_bp {
                break;
            }
            self.bump();
            let rhs = self.parse_expression(r_bp)?;
            let at = lhs.at;
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                at,
            );
        }
        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> PResult<Expr> {
        let at = self.here();
        if self.eat(TokenKind::Bang) {
            let operand = self.parse_expression(PREFIX_BP)?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                at,
            ));
        }
        if self.eat(TokenKind::Minus) {
            // `-2147483648` is only representable as a whole.
            let negative_literal = matches!(
                self.peek().map(|t| t.kind),
                Some(TokenKind::IntLiteral | TokenKind::LongLiteral)
            ) && !matches!(
                self.peek_n(1).map(|t| t.kind),
                Some(TokenKind::Dot | TokenKind::LBracket)
            );
            if negative_literal {
                let tok = self.bump().ok_or(Fatal)?;
                let literal = self.literal(&tok, "-")?;
                return Ok(Expr::new(ExprKind::Literal(literal), at));
            }
            let operand = self.parse_expression(PREFIX_BP)?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                },
                at,
            ));
        }
        if self.eat_keyword("attempt") {
            let operand = self.parse_expression(0)?;
            return Ok(Expr::new(ExprKind::Attempt(Box::new(operand)), at));
        }

        let primary = self.parse_primary()?;
        self.parse_postfix(primary)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let at = self.here();
        let Some(tok) = self.peek().cloned() else {
            return Err(self.error_here("an expression"));
        };

        if tok.kind.is_literal() {
            self.bump();
            let literal = self.literal(&tok, "")?;
            return Ok(Expr::new(ExprKind::Literal(literal), at));
        }

        let kind = match (tok.kind, tok.text.as_str()) {
            (TokenKind::LParen, _) => {
                self.bump();
                let inner = self.parse_expression(0)?;
                self.expect_kind(TokenKind::RParen, "')'")?;
                return Ok(inner);
            }
            (TokenKind::Ident, "true") => {
                self.bump();
                ExprKind::Literal(Literal::Bool(true))
            }
            (TokenKind::Ident, "false") => {
                self.bump();
                ExprKind::Literal(Literal::Bool(false))
            }
            (TokenKind::Ident, "null") => {
                self.bump();
                ExprKind::Literal(Literal::Null)
            }
            (TokenKind::Ident, "this") => {
                self.bump();
                if self.at_kind(TokenKind::LParen) {
                    ExprKind::ThisCall(self.parse_args()?)
                } else {
                    ExprKind::This
                }
            }
            (TokenKind::Ident, "super") => {
                self.bump();
                if !self.at_kind(TokenKind::LParen) {
                    return Err(self.error_here("'(' after 'super'"));
                }
                ExprKind::SuperCall(self.parse_args()?)
            }
            (TokenKind::Ident, "new") => {
                self.bump();
                let ty = self.parse_type()?;
                if self.eat(TokenKind::LBracket) {
                    let length = self.parse_expression(0)?;
                    self.expect_kind(TokenKind::RBracket, "']'")?;
                    ExprKind::NewArray {
                        element: ty,
                        length: Box::new(length),
                    }
                } else {
                    let args = self.parse_args()?;
                    ExprKind::New { ty, args }
                }
            }
            _ if is_name(&tok) => {
                self.bump();
                if self.at_kind(TokenKind::LParen) {
                    let args = self.parse_args()?;
                    ExprKind::Call {
                        target: None,
                        name: tok.text,
                        args,
                    }
                } else {
                    ExprKind::Name(tok.text)
                }
            }
            _ => return Err(self.error_here("an expression")),
        };
        Ok(Expr::new(kind, at))
    }

    fn parse_postfix(&mut self, mut expr: Expr) -> PResult<Expr> {
        loop {
            let at = expr.at;
            if self.eat(TokenKind::Dot) {
                let name = self.expect_ident()?.text;
                let kind = if self.at_kind(TokenKind::LParen) {
                    ExprKind::Call {
                        target: Some(Box::new(expr)),
                        name,
                        args: self.parse_args()?,
                    }
                } else {
                    ExprKind::Field {
                        target: Box::new(expr),
                        name,
                    }
                };
                expr = Expr::new(kind, at);
            } else if self.eat(TokenKind::LBracket) {
                let index = self.parse_expression(0)?;
                self.expect_kind(TokenKind::RBracket, "']'")?;
                expr = Expr::new(
                    ExprKind::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    },
                    at,
                );
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_args(&mut self) -> PResult<Vec<Expr>> {
        self.expect_kind(TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        if self.eat(TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression(0)?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect_kind(TokenKind::RParen, "')'")?;
        Ok(args)
    }

    fn literal(&mut self, tok: &Token, sign: &str) -> PResult<Literal> {
        let text = format!("{sign}{}", tok.text);
        let value = match tok.kind {
            TokenKind::IntLiteral => literals::parse_int_literal(&text).map(Literal::Int),
            TokenKind::LongLiteral => literals::parse_long_literal(&text).map(Literal::Long),
            TokenKind::FloatLiteral => literals::parse_float_literal(&text).map(Literal::Float),
            TokenKind::NumLiteral => literals::parse_num_literal(&text).map(Literal::Num),
            TokenKind::CharLiteral => literals::unescape_char_literal(&text).map(Literal::Char),
            TokenKind::StringLiteral => literals::unescape_string_literal(&text).map(Literal::Str),
            _ => return Err(self.error_at(tok.at, "Expected a literal")),
        };
        value.map_err(|err| self.error_at(tok.at, err.message))
    }
}

const CAST_BP: u8 = 13;
const PREFIX_BP: u8 = 15;

fn infix_binding_power(kind: TokenKind) -> Option<(BinaryOp, u8, u8)> {
    let (op, bp) = match kind {
        TokenKind::PipePipe => (BinaryOp::Or, 1),
        TokenKind::AmpAmp => (BinaryOp::And, 3),
        TokenKind::EqEq => (BinaryOp::Eq, 5),
        TokenKind::BangEq => (BinaryOp::Ne, 5),
        TokenKind::Lt => (BinaryOp::Lt, 7),
        TokenKind::Le => (BinaryOp::Le, 7),
        TokenKind::Gt => (BinaryOp::Gt, 7),
        TokenKind::Ge => (BinaryOp::Ge, 7),
        TokenKind::Plus => (BinaryOp::Add, 9),
        TokenKind::Minus => (BinaryOp::Sub, 9),
        TokenKind::Star => (BinaryOp::Mul, 11),
        TokenKind::Slash => (BinaryOp::Div, 11),
        TokenKind::Percent => (BinaryOp::Rem, 11),
        _ => return None,
    };
    Some((op, bp, bp + 1))
}

fn is_name(tok: &Token) -> bool {
    tok.kind == TokenKind::Ident && !KEYWORDS.contains(&tok.text.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn expr(text: &str) -> Expr {
        let src = format!("class A {{ Void f() {{ {text}; }} }}");
        let parsed = parse(&src).unwrap();
        let method = parsed.file.classes[0].methods().next().cloned().unwrap();
        match method.body.unwrap().statements.remove(0).kind {
            StmtKind::Expr(e) => e,
            other => panic!("not an expression statement: {other:?}"),
        }
    }

    fn shape(e: &Expr) -> String {
        match &e.kind {
            ExprKind::Literal(Literal::Int(v)) => v.to_string(),
            ExprKind::Name(n) => n.clone(),
            ExprKind::Binary { op, lhs, rhs } => {
                format!("({} {} {})", shape(lhs), op.symbol(), shape(rhs))
            }
            ExprKind::Unary { op, operand } => format!("({op:?} {})", shape(operand)),
            ExprKind::Cast { expr, ty } => format!("({} as {ty})", shape(expr)),
            ExprKind::Call { target, name, args } => {
                let args: Vec<String> = args.iter().map(shape).collect();
                match target {
                    Some(t) => format!("{}.{name}({})", shape(t), args.join(", ")),
                    None => format!("{name}({})", args.join(", ")),
                }
            }
            ExprKind::Field { target, name } => format!("{}.{name}", shape(target)),
            other => format!("{other:?}"),
        }
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(shape(&expr("g(a + b * c - d)")), "g(((a + (b * c)) - d))");
        assert_eq!(shape(&expr("g(a < b && c || d)")), "g((((a < b) && c) || d))");
        assert_eq!(shape(&expr("g(-a as Long + 1)")), "g((((Neg a) as Long) + 1))");
        assert_eq!(shape(&expr("System.out.println(x)")), "System.out.println(x)");
    }

    #[test]
    fn negative_int_min() {
        let e = expr("g(-2147483648)");
        let ExprKind::Call { args, .. } = e.kind else { panic!() };
        assert_eq!(args[0].kind, ExprKind::Literal(Literal::Int(i32::MIN)));
    }

    #[test]
    fn missing_terminator_is_recovered() {
        let parsed = parse("class A {\n  Int x = 1\n  Void f() { }\n}").unwrap();
        assert_eq!(parsed.file.classes[0].members.len(), 2);
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(parsed.diagnostics[0].code, MISSING_TERMINATOR);
        assert_eq!(parsed.diagnostics[0].coordinate, Coordinate::new(2, 11));
    }

    #[test]
    fn other_errors_are_fatal() {
        let errors = parse("class A { Int x = ; }").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, SYNTAX);
        assert_eq!(errors[0].to_string(), "line 1:18 Expected an expression, found ';'.");
    }

    #[test]
    fn declarations_versus_expressions() {
        let src = "class A { Void f() { List<String> xs = g(); Int[] ys = h(); x = 1; x++; a.b(); } }";
        let parsed = parse(src).unwrap();
        let body = parsed.file.classes[0].methods().next().cloned().unwrap().body.unwrap();
        let kinds: Vec<&str> = body
            .statements
            .iter()
            .map(|s| match s.kind {
                StmtKind::Local { .. } => "local",
                StmtKind::Assign { .. } => "assign",
                StmtKind::Step { .. } => "step",
                StmtKind::Expr(_) => "expr",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["local", "local", "assign", "step", "expr"]);
    }
}

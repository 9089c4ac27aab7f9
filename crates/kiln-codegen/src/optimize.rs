//! Constant propagation through the substitution cache.
//!
//! A local declared once with a literal initializer and never written again
//! always holds that literal, so its reads can lower the literal instead of
//! a load.

use std::collections::{HashMap, HashSet};

use kiln_syntax::ast::{Block, Expr, ExprKind, Stmt, StmtKind};

#[derive(Default)]
struct Census {
    declarations: HashMap<String, usize>,
    literal: HashSet<String>,
    written: HashSet<String>,
}

impl Census {
    fn block(&mut self, block: &Block) {
        for stmt in &block.statements {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Block(block) => self.block(block),
            StmtKind::Local { name, init, .. } => {
                *self.declarations.entry(name.clone()).or_default() += 1;
                if matches!(init, Some(Expr { kind: ExprKind::Literal(_), .. })) {
                    self.literal.insert(name.clone());
                }
            }
            StmtKind::Assign { target, .. } | StmtKind::Step { target, .. } => {
                if let ExprKind::Name(name) = &target.kind {
                    self.written.insert(name.clone());
                }
            }
            StmtKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                self.stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.stmt(else_branch);
                }
            }
            StmtKind::While { body, .. } => self.stmt(body),
            StmtKind::For {
                init, step, body, ..
            } => {
                for part in [init, step].into_iter().flatten() {
                    self.stmt(part);
                }
                self.stmt(body);
            }
            StmtKind::Expr(_) | StmtKind::Return(_) => {}
        }
    }
}

/// Locals of `body` whose reads may be replaced by their initializer.
pub fn constant_locals(body: &Block) -> HashSet<String> {
    let mut census = Census::default();
    census.block(body);
    let Census {
        declarations,
        literal,
        written,
    } = census;
    literal
        .into_iter()
        .filter(|name| declarations.get(name) == Some(&1) && !written.contains(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_syntax::parse;

    fn locals(body: &str) -> Vec<String> {
        let src = format!("class A {{ Void f() {{ {body} }} }}");
        let parsed = parse(&src).unwrap();
        let method = parsed.file.classes[0].methods().next().cloned().unwrap();
        let mut found: Vec<String> = constant_locals(&method.body.unwrap()).into_iter().collect();
        found.sort();
        found
    }

    #[test]
    fn literal_locals_never_written_are_constant() {
        assert_eq!(locals("Int a = 1; Int b = a; var s = \"x\";"), vec!["a", "s"]);
    }

    #[test]
    fn writes_anywhere_disqualify() {
        assert_eq!(
            locals("Int a = 1; Int b = 2; Int c = 3; a = 4; while (true) { b++; } for (;;c += 1) { }"),
            Vec::<String>::new()
        );
    }

    #[test]
    fn nested_declarations_count() {
        assert_eq!(locals("if (true) { Int k = 1; } else { Num r = 2.0; }"), vec!["k", "r"]);
    }
}

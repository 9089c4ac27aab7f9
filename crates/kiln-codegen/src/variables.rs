use std::collections::HashMap;
use std::sync::Arc;

use kiln_core::{Coordinate, Diagnostic};
use kiln_syntax::ast::Expr;
use kiln_types::Type;

use crate::codes;

/// A local variable slot and its static type.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub slot: u16,
    pub ty: Type,
}

impl Variable {
    /// Stands in for a name that did not resolve. Zero width, `null` typed.
    pub fn sentinel() -> Self {
        Variable {
            slot: 0,
            ty: Type::Null,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.ty == Type::Null
    }

    /// Slots the variable occupies.
    pub fn width(&self) -> u16 {
        if self.is_sentinel() {
            0
        } else {
            self.ty.width()
        }
    }
}

/// A file-scope `const`, inlined wherever it is read.
#[derive(Debug, Clone, PartialEq)]
pub struct FileConstant {
    pub ty: Type,
    pub value: Expr,
}

pub type Constants = Arc<HashMap<String, FileConstant>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

#[derive(Debug, Clone)]
struct PendingAccess {
    name: String,
    at: Coordinate,
    access: Access,
    /// The name was declared later in a scope that was open at the access.
    declared_later: bool,
}

/// One open block.
#[derive(Debug, Clone)]
struct Frame {
    names: Vec<String>,
    first_slot: u16,
    pending_mark: usize,
}

/// The symbol table of one method body.
///
/// Names are visible from their declaration to the end of the enclosing
/// block; a closed block hands its slots back. Accesses to names not in
/// scope are kept pending and reported by [`Variables::finish`], which is
/// when it is known whether the name shows up later in the same block.
#[derive(Debug, Clone)]
pub struct Variables {
    locals: HashMap<String, Variable>,
    frames: Vec<Frame>,
    constants: Constants,
    substitutions: HashMap<String, Expr>,
    pending: Vec<PendingAccess>,
    next_slot: u16,
    max_locals: u16,
}

impl Variables {
    /// Instance code reserves slot 0 for `this`.
    pub fn new(is_static: bool) -> Self {
        let first = if is_static { 0 } else { 1 };
        Self {
            locals: HashMap::new(),
            frames: vec![Frame {
                names: Vec::new(),
                first_slot: first,
                pending_mark: 0,
            }],
            constants: Constants::default(),
            substitutions: HashMap::new(),
            pending: Vec::new(),
            next_slot: first,
            max_locals: first,
        }
    }

    #[must_use]
    pub fn with_constants(mut self, constants: Constants) -> Self {
        self.constants = constants;
        self
    }

    /// Give `name` the next free slot.
    pub fn declare(&mut self, name: &str, ty: Type, at: Coordinate) -> Result<Variable, Diagnostic> {
        if self.locals.contains_key(name) {
            return Err(Diagnostic::error(
                codes::DUPLICATE,
                at,
                format!("Variable '{name}' is already declared"),
            ));
        }
        let variable = Variable {
            slot: self.next_slot,
            ty,
        };
        self.next_slot = self.next_slot.saturating_add(variable.ty.width().max(1));
        self.max_locals = self.max_locals.max(self.next_slot);
        self.locals.insert(name.to_string(), variable.clone());
        if let Some(frame) = self.frames.last_mut() {
            frame.names.push(name.to_string());
            for pending in &mut self.pending[frame.pending_mark..] {
                if pending.name == name {
                    pending.declared_later = true;
                }
            }
        }
        Ok(variable)
    }

    /// Open a block.
    pub fn push_scope(&mut self) {
        self.frames.push(Frame {
            names: Vec::new(),
            first_slot: self.next_slot,
            pending_mark: self.pending.len(),
        });
    }

    /// Close the innermost block: its names leave scope and its slots are
    /// free for the next block. The outermost frame is never closed.
    pub fn pop_scope(&mut self) {
        if self.frames.len() <= 1 {
            return;
        }
        let Some(frame) = self.frames.pop() else {
            return;
        };
        for name in &frame.names {
            self.locals.remove(name);
            self.substitutions.remove(name);
        }
        self.next_slot = frame.first_slot;
    }

    pub fn lookup(&self, name: &str) -> Option<&Variable> {
        self.locals.get(name)
    }

    pub fn constant(&self, name: &str) -> Option<&FileConstant> {
        self.constants.get(name)
    }

    /// The variable, or the sentinel for unknown names.
    pub fn get_variable(&self, name: &str) -> Variable {
        self.lookup(name).cloned().unwrap_or_else(Variable::sentinel)
    }

    /// Resolve a read. Undeclared names are recorded and yield the sentinel.
    pub fn read(&mut self, name: &str, at: Coordinate) -> Variable {
        self.access(name, at, Access::Read)
    }

    pub fn write(&mut self, name: &str, at: Coordinate) -> Variable {
        self.access(name, at, Access::Write)
    }

    fn access(&mut self, name: &str, at: Coordinate, access: Access) -> Variable {
        match self.locals.get(name) {
            Some(variable) => variable.clone(),
            None => {
                self.pending.push(PendingAccess {
                    name: name.to_string(),
                    at,
                    access,
                    declared_later: false,
                });
                Variable::sentinel()
            }
        }
    }

    /// Reads of `name` lower `expr` instead of loading the slot.
    pub fn substitute(&mut self, name: &str, expr: Expr) {
        self.substitutions.insert(name.to_string(), expr);
    }

    pub fn substitution(&self, name: &str) -> Option<&Expr> {
        self.substitutions.get(name)
    }

    pub fn max_locals(&self) -> u16 {
        self.max_locals
    }

    /// Report every pending access.
    pub fn finish(self) -> Vec<Diagnostic> {
        self.pending
            .into_iter()
            .map(|pending| {
                let message = if pending.declared_later {
                    format!("Local variable '{}' is used before its declaration", pending.name)
                } else {
                    format!("Unknown local variable '{}'", pending.name)
                };
                tracing::trace!(
                    target: "kiln.codegen",
                    name = %pending.name,
                    write = pending.access == Access::Write,
                    "unresolved local access"
                );
                Diagnostic::error(codes::UNKNOWN_VARIABLE, pending.at, message)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_types::PrimitiveType;
    use pretty_assertions::assert_eq;

    fn at(line: u32) -> Coordinate {
        Coordinate::new(line, 0)
    }

    #[test]
    fn slots_advance_by_width() {
        let mut vars = Variables::new(false);
        let a = vars.declare("a", Type::int(), at(1)).unwrap();
        let b = vars.declare("b", Type::Primitive(PrimitiveType::Long), at(2)).unwrap();
        let c = vars.declare("c", Type::string(), at(3)).unwrap();
        assert_eq!((a.slot, b.slot, c.slot), (1, 2, 4));
        assert_eq!(vars.max_locals(), 5);

        let statics = Variables::new(true);
        assert_eq!(statics.max_locals(), 0);
    }

    #[test]
    fn redeclaration_is_a_duplicate() {
        let mut vars = Variables::new(true);
        vars.declare("x", Type::int(), at(1)).unwrap();
        let err = vars.declare("x", Type::string(), at(4)).unwrap_err();
        assert_eq!(err.code, codes::DUPLICATE);
        assert_eq!(err.to_string(), "line 4:0 Variable 'x' is already declared.");
    }

    #[test]
    fn pending_accesses_become_diagnostics() {
        let mut vars = Variables::new(true);
        assert!(vars.read("later", at(1)).is_sentinel());
        assert!(vars.write("never", at(2)).is_sentinel());
        vars.declare("later", Type::int(), at(3)).unwrap();
        assert_eq!(vars.read("later", at(4)).slot, 0);

        let messages: Vec<String> = vars.finish().iter().map(ToString::to_string).collect();
        assert_eq!(
            messages,
            vec![
                "line 1:0 Local variable 'later' is used before its declaration.",
                "line 2:0 Unknown local variable 'never'.",
            ]
        );
    }

    #[test]
    fn closed_blocks_release_names_and_slots() {
        let mut vars = Variables::new(false);
        vars.declare("a", Type::int(), at(1)).unwrap();

        vars.push_scope();
        let wide = vars.declare("w", Type::Primitive(PrimitiveType::Long), at(2)).unwrap();
        assert_eq!(wide.slot, 2);
        vars.pop_scope();
        assert!(vars.lookup("w").is_none());

        vars.push_scope();
        let again = vars.declare("w", Type::string(), at(4)).unwrap();
        assert_eq!(again.slot, 2);
        vars.pop_scope();

        assert_eq!(vars.max_locals(), 4);
        assert!(vars.lookup("a").is_some());
        vars.pop_scope();
        assert!(vars.lookup("a").is_some());
    }

    #[test]
    fn outer_names_cannot_be_redeclared_inside() {
        let mut vars = Variables::new(true);
        vars.declare("x", Type::int(), at(1)).unwrap();
        vars.push_scope();
        assert!(vars.declare("x", Type::int(), at(2)).is_err());
    }

    #[test]
    fn reads_after_a_closed_block_are_unknown() {
        let mut vars = Variables::new(true);
        vars.push_scope();
        vars.declare("inner", Type::int(), at(1)).unwrap();
        vars.pop_scope();
        assert!(vars.read("inner", at(2)).is_sentinel());

        vars.push_scope();
        assert!(vars.read("soon", at(3)).is_sentinel());
        vars.push_scope();
        vars.declare("soon", Type::int(), at(4)).unwrap();
        vars.pop_scope();
        vars.declare("soon", Type::int(), at(5)).unwrap();
        vars.pop_scope();

        let messages: Vec<String> = vars.finish().iter().map(ToString::to_string).collect();
        assert_eq!(
            messages,
            vec![
                "line 2:0 Unknown local variable 'inner'.",
                "line 3:0 Local variable 'soon' is used before its declaration.",
            ]
        );
    }

    #[test]
    fn unknown_names_get_the_sentinel() {
        let vars = Variables::new(false);
        let ghost = vars.get_variable("ghost");
        assert_eq!(ghost, Variable::sentinel());
        assert_eq!(ghost.width(), 0);
    }
}

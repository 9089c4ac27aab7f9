use kiln_classfile::Instruction;
use kiln_core::{Diagnostic, DiagnosticReport};

/// Diagnostics and instructions produced by lowering one construct.
///
/// Fragments form a monoid under [`Fragment::concat`] with
/// [`Fragment::empty`] as the identity; lowering a compound construct is the
/// concatenation of its parts, so diagnostics stay in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    diagnostics: Vec<Diagnostic>,
    instructions: Vec<Instruction>,
}

impl Fragment {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_error(diagnostic: Diagnostic) -> Self {
        Self {
            diagnostics: vec![diagnostic],
            instructions: Vec::new(),
        }
    }

    pub fn from_instructions(instructions: Vec<Instruction>) -> Self {
        Self {
            diagnostics: Vec::new(),
            instructions,
        }
    }

    #[must_use]
    pub fn add(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    #[must_use]
    pub fn add_all(mut self, instructions: impl IntoIterator<Item = Instruction>) -> Self {
        self.instructions.extend(instructions);
        self
    }

    #[must_use]
    pub fn add_error(mut self, diagnostic: Diagnostic) -> Self {
        self.diagnostics.push(diagnostic);
        self
    }

    #[must_use]
    pub fn concat(mut self, other: Fragment) -> Self {
        self.diagnostics.extend(other.diagnostics);
        self.instructions.extend(other.instructions);
        self
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn has_errors(&self) -> bool {
        DiagnosticReport::has_errors(&self.diagnostics)
    }

    pub fn into_parts(self) -> (Vec<Diagnostic>, Vec<Instruction>) {
        (self.diagnostics, self.instructions)
    }
}

impl FromIterator<Fragment> for Fragment {
    fn from_iter<I: IntoIterator<Item = Fragment>>(iter: I) -> Self {
        iter.into_iter().fold(Fragment::empty(), Fragment::concat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_classfile::{Constant, Opcode};
    use kiln_core::Coordinate;
    use pretty_assertions::assert_eq;

    #[test]
    fn concat_keeps_both_orders() {
        let first = Fragment::empty()
            .add(Instruction::Push(Constant::Int(1)))
            .add_error(Diagnostic::error("type", Coordinate::new(2, 0), "first"));
        let second = Fragment::from_error(Diagnostic::error("type", Coordinate::new(1, 0), "second"))
            .add(Instruction::Op(Opcode::Pop));

        let joined = first.concat(second);
        let (diagnostics, instructions) = joined.clone().into_parts();
        assert_eq!(
            diagnostics.iter().map(|d| d.message.as_str()).collect::<Vec<_>>(),
            vec!["first", "second"]
        );
        assert_eq!(
            instructions,
            vec![Instruction::Push(Constant::Int(1)), Instruction::Op(Opcode::Pop)]
        );
        assert!(joined.has_errors());
    }

    #[test]
    fn collects_from_an_iterator() {
        let parts = (0..3).map(|i| Fragment::from_instructions(vec![Instruction::Push(Constant::Int(i))]));
        let all: Fragment = parts.collect();
        assert_eq!(all.instructions().len(), 3);
        assert!(all.diagnostics().is_empty());
    }
}

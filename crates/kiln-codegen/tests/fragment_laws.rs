use kiln_classfile::{Constant, Instruction, Opcode};
use kiln_codegen::Fragment;
use kiln_core::{Coordinate, Diagnostic};
use proptest::prelude::*;

fn instruction() -> impl Strategy<Value = Instruction> {
    prop_oneof![
        any::<i32>().prop_map(|v| Instruction::Push(Constant::Int(v))),
        Just(Instruction::Op(Opcode::Pop)),
        Just(Instruction::Op(Opcode::Dup)),
    ]
}

fn fragment() -> impl Strategy<Value = Fragment> {
    let error = (1u32..50, 0u32..80, "[a-z]{1,8}")
        .prop_map(|(line, column, message)| Diagnostic::error("type", Coordinate::new(line, column), message));
    (
        prop::collection::vec(instruction(), 0..6),
        prop::collection::vec(error, 0..3),
    )
        .prop_map(|(instructions, errors)| {
            errors
                .into_iter()
                .fold(Fragment::from_instructions(instructions), Fragment::add_error)
        })
}

proptest! {
    #[test]
    fn empty_is_an_identity(f in fragment()) {
        prop_assert_eq!(Fragment::empty().concat(f.clone()), f.clone());
        prop_assert_eq!(f.clone().concat(Fragment::empty()), f);
    }

    #[test]
    fn concat_is_associative(a in fragment(), b in fragment(), c in fragment()) {
        let left = a.clone().concat(b.clone()).concat(c.clone());
        let right = a.concat(b.concat(c));
        prop_assert_eq!(left, right);
    }

    #[test]
    fn concat_keeps_both_sides_in_order(a in fragment(), b in fragment()) {
        let joined = a.clone().concat(b.clone());
        let instructions: Vec<Instruction> =
            a.instructions().iter().chain(b.instructions()).cloned().collect();
        prop_assert_eq!(joined.instructions(), instructions.as_slice());
        prop_assert_eq!(joined.has_errors(), a.has_errors() || b.has_errors());
    }
}

#[test]
fn collecting_concatenates() {
    let parts = vec![
        Fragment::empty().add(Instruction::Push(Constant::Int(1))),
        Fragment::from_error(Diagnostic::error("type", Coordinate::new(1, 0), "bad")),
        Fragment::empty().add(Instruction::Op(Opcode::Pop)),
    ];
    let whole: Fragment = parts.into_iter().collect();
    assert_eq!(whole.instructions().len(), 2);
    assert_eq!(whole.diagnostics().len(), 1);
}

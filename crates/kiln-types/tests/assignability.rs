use std::sync::{Arc, OnceLock};

use kiln_types::{BuiltinJdk, Classes, PrimitiveType, Type, TypeParamDef};
use proptest::prelude::*;

fn jdk() -> &'static Classes {
    static CLASSES: OnceLock<Classes> = OnceLock::new();
    CLASSES.get_or_init(|| Classes::new(Arc::new(BuiltinJdk)))
}

fn class(name: &str) -> Type {
    Type::reference(name)
}

fn generic(raw: &str, args: Vec<Type>) -> Type {
    Type::parameterised(raw, args)
}

fn assignable(from: &Type, to: &Type) -> bool {
    from.is_assignable_to(to, jdk())
}

#[test]
fn references_widen_along_supertypes() {
    let string = Type::string();
    assert!(assignable(&string, &Type::object()));
    assert!(assignable(&string, &class("java.lang.CharSequence")));
    assert!(assignable(&string, &generic("java.lang.Comparable", vec![Type::string()])));
    assert!(!assignable(&Type::object(), &string));
    assert!(assignable(&class("java.lang.Integer"), &class("java.io.Serializable")));
    assert!(!assignable(&class("java.lang.Integer"), &class("java.lang.Long")));
}

#[test]
fn type_arguments_are_invariant() {
    let array_list = generic("java.util.ArrayList", vec![Type::string()]);
    assert!(assignable(&array_list, &generic("java.util.List", vec![Type::string()])));
    assert!(assignable(&array_list, &generic("java.util.Collection", vec![Type::string()])));
    assert!(!assignable(&array_list, &generic("java.util.List", vec![Type::object()])));

    // Raw and parameterised forms convert both ways.
    assert!(assignable(&class("java.util.ArrayList"), &generic("java.util.List", vec![Type::string()])));
    assert!(assignable(&array_list, &class("java.util.List")));

    let map = generic("java.util.HashMap", vec![Type::string(), class("java.lang.Integer")]);
    assert!(assignable(&map, &generic("java.util.Map", vec![Type::string(), class("java.lang.Integer")])));
}

#[test]
fn lists_are_covariant_iterables() {
    let list = generic("java.util.List", vec![Type::string()]);
    assert!(assignable(&list, &generic("java.lang.Iterable", vec![Type::object()])));
    assert!(assignable(&list, &generic("java.lang.Iterable", vec![class("java.lang.CharSequence")])));
    assert!(!assignable(&list, &generic("java.lang.Iterable", vec![class("java.lang.Integer")])));
    let collection = generic("java.util.Collection", vec![Type::string()]);
    assert!(!assignable(&collection, &generic("java.lang.Iterable", vec![Type::object()])));
}

#[test]
fn primitives_widen_box_and_unbox() {
    let int = Type::int();
    let long = Type::Primitive(PrimitiveType::Long);
    let float = Type::Primitive(PrimitiveType::Float);
    let num = Type::Primitive(PrimitiveType::Num);

    assert!(assignable(&int, &long));
    assert!(assignable(&int, &float));
    assert!(assignable(&long, &num));
    assert!(!assignable(&long, &int));
    assert!(!assignable(&num, &float));
    assert!(!assignable(&long, &float));

    assert!(assignable(&int, &class("java.lang.Integer")));
    assert!(assignable(&int, &class("java.lang.Number")));
    assert!(assignable(&int, &Type::object()));
    assert!(!assignable(&int, &class("java.lang.Long")));
    assert!(assignable(&class("java.lang.Integer"), &int));
    assert!(!assignable(&class("java.lang.Integer"), &long));
    assert!(!assignable(&Type::void(), &Type::object()));
}

#[test]
fn arrays() {
    let strings = Type::array_of(Type::string());
    let objects = Type::array_of(Type::object());
    let ints = Type::array_of(Type::int());

    assert!(assignable(&strings, &objects));
    assert!(!assignable(&ints, &objects));
    assert!(assignable(&ints, &Type::object()));
    assert!(assignable(&ints, &class("java.lang.Cloneable")));
    assert!(assignable(&strings, &generic("java.util.List", vec![Type::string()])));
    assert!(!assignable(&ints, &generic("java.util.List", vec![class("java.lang.Integer")])));
}

#[test]
fn null_variables_and_attempts() {
    assert!(assignable(&Type::Null, &Type::string()));
    assert!(assignable(&Type::Null, &Type::int()));
    assert!(assignable(&Type::string(), &Type::Variable("T".into())));
    assert!(assignable(&Type::Variable("T".into()), &Type::object()));
    assert!(!assignable(&Type::Variable("T".into()), &Type::string()));

    let attempt = Type::Attempted(Box::new(Type::string()));
    assert!(assignable(&attempt, &Type::object()));
    assert!(!assignable(&attempt, &Type::string()));
    assert!(assignable(&attempt, &Type::Attempted(Box::new(Type::object()))));
}

#[test]
fn rigid_parameters_stay_tied_to_their_name() {
    let params = vec![TypeParamDef {
        name: "T".into(),
        bounds: vec![generic("java.lang.Comparable", vec![Type::Variable("T".into())])],
    }];
    let rigid = TypeParamDef::rigid(&params);
    let t = rigid["T"].clone();

    assert!(assignable(&t, &t));
    assert!(assignable(&t, &generic("java.lang.Comparable", vec![t.clone()])));
    assert!(assignable(&t, &class("java.lang.Comparable")));
    assert!(assignable(&t, &Type::object()));
    assert!(!assignable(&t, &generic("java.lang.Comparable", vec![Type::string()])));
    assert!(!assignable(&Type::string(), &t));
    assert!(assignable(&Type::Null, &t));
}

#[test]
fn intersections_need_every_part() {
    let both = Type::Intersection(vec![Type::string(), class("java.lang.Integer")]);
    assert!(assignable(&both, &class("java.io.Serializable")));
    assert!(!assignable(&both, &class("java.lang.CharSequence")));
    let target = Type::Intersection(vec![class("java.lang.CharSequence"), class("java.io.Serializable")]);
    assert!(assignable(&Type::string(), &target));
    assert!(!assignable(&class("java.lang.Integer"), &target));
}

fn pool() -> Vec<Type> {
    let string = Type::string();
    let object = Type::object();
    vec![
        object.clone(),
        string.clone(),
        Type::Null,
        class("java.lang.CharSequence"),
        class("java.io.Serializable"),
        class("java.lang.Cloneable"),
        class("java.lang.Integer"),
        class("java.lang.Number"),
        generic("java.lang.Comparable", vec![string.clone()]),
        generic("java.lang.Comparable", vec![class("java.lang.Integer")]),
        generic("java.util.ArrayList", vec![string.clone()]),
        generic("java.util.ArrayList", vec![object.clone()]),
        generic("java.util.List", vec![string.clone()]),
        generic("java.util.List", vec![object.clone()]),
        generic("java.util.Collection", vec![string.clone()]),
        generic("java.util.Collection", vec![object.clone()]),
        generic("java.lang.Iterable", vec![string.clone()]),
        generic("java.lang.Iterable", vec![object.clone()]),
        Type::array_of(string),
        Type::array_of(object),
        Type::array_of(class("java.lang.Integer")),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 512, failure_persistence: None, .. ProptestConfig::default() })]

    #[test]
    fn assignability_is_a_preorder(a in 0usize..21, b in 0usize..21, c in 0usize..21) {
        let pool = pool();
        let (a, b, c) = (&pool[a], &pool[b], &pool[c]);
        prop_assert!(assignable(a, a));
        if assignable(a, b) && assignable(b, c) {
            prop_assert!(assignable(a, c), "{} <= {} <= {} but not {} <= {}", a, b, c, a, c);
        }
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use kiln_classfile::{ACC_PUBLIC, ACC_STATIC};
use kiln_types::{
    Arguments, BuiltinJdk, Callable, CallableKind, ClassDef, ClassKind, Classes, Functions,
    MatchResult, MismatchedTypeParameter, PrimitiveType, Type, TypeEnv,
};
use pretty_assertions::assert_eq;

struct Env {
    jdk: Classes,
    user: HashMap<String, Arc<ClassDef>>,
}

impl TypeEnv for Env {
    fn class(&self, name: &str) -> Option<Arc<ClassDef>> {
        self.user.get(name).cloned().or_else(|| self.jdk.class(name))
    }
}

fn static_method(owner: &str, name: &str, params: Vec<Type>) -> Callable {
    Callable {
        owner: owner.to_string(),
        name: name.to_string(),
        kind: CallableKind::Method,
        params: params.iter().map(Type::erasure).collect(),
        generic_params: params,
        return_type: Type::void(),
        generic_return: Type::void(),
        type_params: Vec::new(),
        is_varargs: false,
        is_static: true,
        is_abstract: false,
        is_interface_owner: false,
        access_flags: ACC_PUBLIC | ACC_STATIC,
    }
}

fn env_with(methods: Vec<Callable>) -> Env {
    let def = ClassDef {
        name: "demo.Calls".to_string(),
        kind: ClassKind::Class,
        access_flags: ACC_PUBLIC,
        type_params: Vec::new(),
        super_class: Some(Type::object()),
        interfaces: Vec::new(),
        fields: Vec::new(),
        constructors: Vec::new(),
        methods,
    };
    Env {
        jdk: Classes::new(Arc::new(BuiltinJdk)),
        user: HashMap::from([(def.name.clone(), Arc::new(def))]),
    }
}

fn resolve(env: &Env, receiver: &Type, name: &str, args: Vec<Type>) -> MatchResult {
    Functions::methods(receiver, env).get_matching_executable(name, &Arguments::new(args), env)
}

fn chosen(result: &MatchResult) -> Vec<Type> {
    match result {
        MatchResult::Successful { callable, .. } => callable.params.clone(),
        other => panic!("expected a successful match, got {other:?}"),
    }
}

#[test]
fn exact_descriptor_wins() {
    let env = env_with(vec![
        static_method("demo.Calls", "f", vec![Type::string()]),
        static_method("demo.Calls", "f", vec![Type::object()]),
    ]);
    let calls = Type::reference("demo.Calls");

    let result = resolve(&env, &calls, "f", vec![Type::object()]);
    assert_eq!(chosen(&result), vec![Type::object()]);
    assert_eq!(result.score(), 1000);

    let result = resolve(&env, &calls, "f", vec![Type::string()]);
    assert_eq!(chosen(&result), vec![Type::string()]);

    assert_eq!(resolve(&env, &calls, "f", vec![Type::int()]).score(), 0);
    assert_eq!(resolve(&env, &calls, "g", vec![]), MatchResult::Failed);
    assert_eq!(resolve(&env, &calls, "f", vec![]), MatchResult::Failed);
}

#[test]
fn equally_good_candidates_are_ambiguous() {
    let map = Type::parameterised("java.util.Map", vec![Type::string(), Type::string()]);
    let env = env_with(vec![
        static_method("demo.Calls", "f", vec![map]),
        static_method("demo.Calls", "f", vec![Type::object()]),
    ]);
    let arg = Type::parameterised("java.util.HashMap", vec![Type::string(), Type::string()]);
    let result = resolve(&env, &Type::reference("demo.Calls"), "f", vec![arg]);
    assert_eq!(result, MatchResult::Ambiguous { score: 0 });
    assert_eq!(result.score(), 0);
}

#[test]
fn primitive_scoring_prefers_exact_widths() {
    let env = env_with(Vec::new());
    let math = Type::reference("java.lang.Math");
    let long = Type::Primitive(PrimitiveType::Long);

    let result = resolve(&env, &math, "max", vec![Type::int(), Type::int()]);
    assert_eq!(chosen(&result), vec![Type::int(), Type::int()]);
    assert_eq!(result.score(), 2002);

    let result = resolve(&env, &math, "max", vec![long.clone(), Type::int()]);
    assert_eq!(chosen(&result), vec![long.clone(), long]);
}

#[test]
fn receiver_arguments_substitute_into_results() {
    let env = env_with(Vec::new());
    let list = Type::parameterised("java.util.ArrayList", vec![Type::string()]);

    let MatchResult::Successful { callable, mismatched, .. } = resolve(&env, &list, "get", vec![Type::int()]) else {
        panic!("get(int) should resolve");
    };
    assert!(mismatched.is_empty());
    let result = callable.result_type();
    assert_eq!(result.erasure(), Type::object());
    assert_eq!(result.actual(), &Type::string());
}

#[test]
fn class_variable_mismatch_is_recorded_not_fatal() {
    let env = env_with(Vec::new());
    let list = Type::parameterised("java.util.ArrayList", vec![Type::string()]);
    let integer = Type::reference("java.lang.Integer");

    let MatchResult::Successful { mismatched, .. } = resolve(&env, &list, "add", vec![integer.clone()]) else {
        panic!("add(E) should still resolve");
    };
    assert_eq!(
        mismatched,
        vec![MismatchedTypeParameter {
            position: 0,
            expected: Type::string(),
            found: integer,
        }]
    );
}

#[test]
fn variable_arity_collects_trailing_arguments() {
    let env = env_with(Vec::new());
    let arrays = Type::reference("java.util.Arrays");

    for args in [vec![], vec![Type::string()], vec![Type::string(), Type::int()]] {
        let result = resolve(&env, &arrays, "asList", args.clone());
        assert!(matches!(result, MatchResult::Successful { variadic: true, .. }), "{args:?}: {result:?}");
    }

    let result = resolve(&env, &arrays, "asList", vec![Type::array_of(Type::string())]);
    assert!(matches!(result, MatchResult::Successful { variadic: false, .. }));
}

#[test]
fn constructors_are_matched_by_init() {
    let env = env_with(Vec::new());
    let builder = Type::reference("java.lang.StringBuilder");
    let functions = Functions::constructors(&builder, &env);

    let result = functions.get_matching_executable("<init>", &Arguments::new(vec![Type::string()]), &env);
    assert_eq!(chosen(&result), vec![Type::string()]);
    let result = functions.get_matching_executable("<init>", &Arguments::default(), &env);
    assert_eq!(chosen(&result), Vec::<Type>::new());
}

//! Assignability between types.

use std::collections::{HashSet, VecDeque};

use crate::class::TypeEnv;
use crate::ty::{PrimitiveType, Type, ITERABLE, LIST, OBJECT};

pub(crate) const ARRAY_SUPERTYPES: [&str; 3] = [OBJECT, "java.lang.Cloneable", "java.io.Serializable"];

/// Return `ty` viewed as the class `target` by walking the supertype graph
/// and substituting type arguments on the way. Raw sources give raw views.
///
/// `ArrayList<String>` viewed as `java.util.List` is `List<String>`.
pub fn view_as(ty: &Type, target: &str, env: &dyn TypeEnv) -> Option<Type> {
    match ty.actual() {
        Type::Bounded { bound, .. } => return view_as(bound, target, env),
        Type::Variable(_) | Type::Null | Type::Attempted(_) => {
            return (target == OBJECT).then(Type::object);
        }
        Type::Array(_) => {
            return ARRAY_SUPERTYPES
                .contains(&target)
                .then(|| Type::reference(target));
        }
        Type::Intersection(parts) => {
            return parts.iter().find_map(|part| view_as(part, target, env));
        }
        _ => {}
    }

    let start = ty.actual().clone();
    start.class_name()?;

    let mut queue = VecDeque::from([start]);
    let mut seen: HashSet<Type> = HashSet::new();
    while let Some(current) = queue.pop_front() {
        if !seen.insert(current.clone()) {
            continue;
        }
        let Some(name) = current.class_name() else {
            continue;
        };
        if name == target {
            return Some(current);
        }

        let Some(def) = env.class(name) else {
            continue;
        };
        let args = current.type_args();
        let parameterised = !args.is_empty() && args.len() == def.type_params.len();
        let bindings = if parameterised {
            def.type_params
                .iter()
                .map(|p| p.name.clone())
                .zip(args.iter().cloned())
                .collect()
        } else {
            Default::default()
        };

        for sup in def.supertypes() {
            let next = if parameterised {
                sup.substitute(&bindings)
            } else {
                // A raw type's supertypes are raw.
                sup.erasure()
            };
            queue.push_back(next);
        }
        if def.is_interface() || def.super_class.is_none() {
            queue.push_back(Type::object());
        }
    }

    (target == OBJECT).then(Type::object)
}

impl Type {
    /// Whether a value of this type may be stored where `to` is expected.
    pub fn is_assignable_to(&self, to: &Type, env: &dyn TypeEnv) -> bool {
        if self == to {
            return true;
        }
        match (self, to) {
            (Type::Null, Type::Primitive(p)) => *p != PrimitiveType::Void,
            (Type::Null, _) => true,
            (Type::Generic { actual, .. }, _) => actual.is_assignable_to(to, env),
            (_, Type::Generic { actual, .. }) => self.is_assignable_to(actual, env),
            (Type::Intersection(parts), _) => parts.iter().all(|p| p.is_assignable_to(to, env)),
            (_, Type::Intersection(parts)) => parts.iter().all(|p| self.is_assignable_to(p, env)),
            (Type::Attempted(from), Type::Attempted(to)) => from.is_assignable_to(to, env),
            (Type::Attempted(_), _) => to.is_object(),
            (_, Type::Attempted(_)) => false,
            (_, Type::Variable(_)) => !self.is_void(),
            (Type::Variable(_), _) => Type::object().is_assignable_to(to, env),
            (Type::Bounded { name: a, .. }, Type::Bounded { name: b, .. }) => a == b,
            (_, Type::Bounded { .. }) => false,
            (Type::Bounded { bound, .. }, _) => bound.is_assignable_to(to, env),
            (Type::Primitive(from), Type::Primitive(to)) => from.widens_to(*to),
            (Type::Primitive(p), _) => {
                *p != PrimitiveType::Void && Type::reference(p.box_class()).is_assignable_to(to, env)
            }
            (_, Type::Primitive(p)) => {
                matches!(self, Type::Reference(name) if PrimitiveType::from_box(name) == Some(*p))
            }
            (Type::Array(from), Type::Array(to)) => {
                from.is_reference() && to.is_reference() && from.is_assignable_to(to, env)
            }
            (Type::Array(element), Type::Reference(name)) => {
                ARRAY_SUPERTYPES.contains(&name.as_str())
                    || (element.is_reference() && as_list(element).is_assignable_to(to, env))
            }
            // Reference arrays read as the fixed-size list `Arrays.asList` returns.
            (Type::Array(element), Type::Parameterised { args, .. }) => {
                element.is_reference()
                    && args.len() == 1
                    && element.is_assignable_to(&args[0], env)
                    && as_list(&args[0]).is_assignable_to(to, env)
            }
            (Type::Array(_), _) => false,
            (_, Type::Reference(name)) => view_as(self, name, env).is_some(),
            (_, Type::Parameterised { raw, args }) => {
                if parameterised_view_matches(self, raw, args, env) {
                    return true;
                }
                // A list is readable as an `Iterable` of any supertype of its element.
                raw == ITERABLE
                    && args.len() == 1
                    && matches!(
                        view_as(self, LIST, env),
                        Some(Type::Parameterised { args: list_args, .. })
                            if list_args.len() == 1 && list_args[0].is_assignable_to(&args[0], env)
                    )
            }
            _ => false,
        }
    }
}

fn parameterised_view_matches(from: &Type, raw: &str, args: &[Type], env: &dyn TypeEnv) -> bool {
    match view_as(from, raw, env) {
        None => false,
        // Raw to parameterised is an unchecked conversion.
        Some(Type::Reference(_)) => true,
        Some(view) => {
            let view_args = view.type_args();
            view_args.len() == args.len()
                && view_args.iter().zip(args).all(|(a, b)| args_match(a, b))
        }
    }
}

fn as_list(element: &Type) -> Type {
    Type::parameterised(LIST, vec![element.clone()])
}

/// Type arguments are invariant; flexible variables and `null` match anything.
fn args_match(a: &Type, b: &Type) -> bool {
    let (a, b) = (a.actual(), b.actual());
    if matches!(a, Type::Variable(_) | Type::Null) || matches!(b, Type::Variable(_) | Type::Null) {
        return true;
    }
    match (a, b) {
        (
            Type::Parameterised { raw: ra, args: aa },
            Type::Parameterised { raw: rb, args: ab },
        ) => ra == rb && aa.len() == ab.len() && aa.iter().zip(ab).all(|(x, y)| args_match(x, y)),
        (Type::Array(x), Type::Array(y)) => args_match(x, y),
        (Type::Bounded { name: x, .. }, Type::Bounded { name: y, .. }) => x == y,
        _ => a == b,
    }
}

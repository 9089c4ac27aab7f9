//! Overload resolution.
//!
//! Every candidate with the requested name is scored against the argument
//! types; the unique best candidate wins, ties are ambiguous.

use crate::callable::Callable;
use crate::class::TypeEnv;
use crate::ty::{MemberView, Type};

const EXACT_DESCRIPTOR: i64 = 1000;
const PRIMITIVE_PARAMETER: i64 = 1;

/// An argument whose type agrees with the erased parameter but not with the
/// receiver's binding of the class type variable behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MismatchedTypeParameter {
    /// Zero-based argument position.
    pub position: usize,
    pub expected: Type,
    pub found: Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    Failed,
    Ambiguous {
        score: i64,
    },
    Successful {
        /// Bound to the receiver: parameter and return types substituted.
        callable: Callable,
        score: i64,
        mismatched: Vec<MismatchedTypeParameter>,
        /// Trailing arguments are collected into the variable-arity array.
        variadic: bool,
    },
}

impl MatchResult {
    pub fn score(&self) -> i64 {
        match self {
            MatchResult::Failed => -1,
            MatchResult::Ambiguous { score } | MatchResult::Successful { score, .. } => *score,
        }
    }

    pub fn is_successful(&self) -> bool {
        matches!(self, MatchResult::Successful { .. })
    }
}

/// Static types of a call's arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arguments {
    pub types: Vec<Type>,
}

impl Arguments {
    pub fn new(types: Vec<Type>) -> Self {
        Self { types }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Score `callable` as invoked on `receiver` with these arguments.
    pub fn matches(&self, callable: &Callable, receiver: &Type, env: &dyn TypeEnv) -> MatchResult {
        let bound = callable.with_owner(receiver, env);
        let arity = callable.params.len();
        let args = &self.types;

        let variadic = callable.is_varargs && arity > 0 && !self.exact_array_tail(&bound, env);
        let fixed = if variadic { arity - 1 } else { arity };
        if variadic {
            if args.len() < fixed {
                return MatchResult::Failed;
            }
        } else if args.len() != arity {
            return MatchResult::Failed;
        }

        let mut score = 0;
        let mut mismatched = Vec::new();
        for (position, arg) in args.iter().take(fixed).enumerate() {
            let erased = &callable.params[position];
            let declared = callable.generic_params.get(position).unwrap_or(erased);
            let substituted = bound.generic_params.get(position).unwrap_or(erased);

            if is_class_variable(callable, declared) {
                if !arg.is_assignable_to(erased, env) {
                    return MatchResult::Failed;
                }
                if substituted != declared && !arg.is_assignable_to(substituted, env) {
                    mismatched.push(MismatchedTypeParameter {
                        position,
                        expected: substituted.clone(),
                        found: arg.clone(),
                    });
                }
            } else if !arg.is_assignable_to(substituted, env) {
                return MatchResult::Failed;
            }

            if arg.descriptor() == erased.descriptor() {
                score += EXACT_DESCRIPTOR;
            }
            if erased.is_primitive() {
                score += PRIMITIVE_PARAMETER;
            }
        }

        if variadic && !trailing_match(&args[fixed..], &bound, env) {
            return MatchResult::Failed;
        }

        MatchResult::Successful {
            callable: bound,
            score,
            mismatched,
            variadic,
        }
    }

    /// The argument list already supplies the variable-arity array itself.
    fn exact_array_tail(&self, bound: &Callable, env: &dyn TypeEnv) -> bool {
        let (Some(last_arg), Some(last_param)) = (self.types.last(), bound.generic_params.last()) else {
            return false;
        };
        self.types.len() == bound.params.len() && last_arg.is_assignable_to(last_param, env)
    }
}

/// The declared parameter is the owner's type variable, or an array of one.
fn is_class_variable(callable: &Callable, declared: &Type) -> bool {
    match declared {
        Type::Variable(name) => callable.is_class_variable(name),
        Type::Array(element) => is_class_variable(callable, element),
        _ => false,
    }
}

fn trailing_match(trailing: &[Type], bound: &Callable, env: &dyn TypeEnv) -> bool {
    let element = match bound.generic_params.last() {
        Some(Type::Array(element)) => element.as_ref().clone(),
        _ => match bound.params.last() {
            Some(Type::Array(element)) => element.as_ref().clone(),
            _ => return false,
        },
    };
    let folded = match trailing {
        [] => return true,
        [single] => single.clone(),
        many => Type::Intersection(many.to_vec()),
    };
    folded.is_assignable_to(&element, env)
}

/// The overload set of a receiver: its methods, or a class's constructors.
#[derive(Debug, Clone)]
pub struct Functions {
    pub receiver: Type,
    pub candidates: Vec<Callable>,
}

impl Functions {
    /// Public methods of `receiver`, inherited ones included.
    pub fn methods(receiver: &Type, env: &dyn TypeEnv) -> Self {
        Self {
            receiver: receiver.clone(),
            candidates: receiver.methods(env, MemberView::Public),
        }
    }

    /// Every constructor `class` declares.
    pub fn constructors(class: &Type, env: &dyn TypeEnv) -> Self {
        Self {
            receiver: class.clone(),
            candidates: class.constructors(env, MemberView::Declared),
        }
    }

    /// Pick the unique best candidate named `name` (`<init>` for constructors).
    pub fn get_matching_executable(&self, name: &str, args: &Arguments, env: &dyn TypeEnv) -> MatchResult {
        let mut best: Vec<MatchResult> = Vec::new();
        let mut best_score = -1;
        for callable in self.candidates.iter().filter(|c| c.vm_name() == name) {
            let result = args.matches(callable, &self.receiver, env);
            let score = result.score();
            if score < 0 || score < best_score {
                continue;
            }
            if score > best_score {
                best.clear();
                best_score = score;
            }
            best.push(result);
        }

        tracing::trace!(
            target: "kiln.overload",
            name,
            candidates = self.candidates.len(),
            survivors = best.len(),
            score = best_score,
            "resolved overload"
        );

        match best.len() {
            0 => MatchResult::Failed,
            1 => best.pop().unwrap_or(MatchResult::Failed),
            _ => MatchResult::Ambiguous { score: best_score },
        }
    }
}

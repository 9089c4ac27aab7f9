//! Method calls, constructor calls and instance creation.

use kiln_classfile::{Instruction, InvokeKind, Opcode, TypeOp};
use kiln_core::{Coordinate, Diagnostic};
use kiln_syntax::ast::{Expr, TypeRef};
use kiln_types::{Arguments, Callable, Functions, MatchResult, Type};

use crate::codes;
use crate::fragment::Fragment;
use crate::lower::{internal, push_int, type_error, Lowerer};
use crate::ops;

/// A resolved call target.
struct Chosen {
    callable: Callable,
    variadic: bool,
    warnings: Vec<Diagnostic>,
}

/// Where a call's receiver comes from.
enum Site {
    /// No explicit receiver: the current class.
    Implicit,
    /// A class name: static calls only.
    Class,
    /// A receiver value, already lowered.
    Value(Fragment),
}

pub(crate) fn invoke(callable: &Callable) -> Instruction {
    Instruction::Invoke {
        kind: callable.invoke_kind(),
        owner: internal(&callable.owner),
        name: callable.vm_name().to_string(),
        descriptor: callable.descriptor(),
        interface: callable.is_interface_owner,
    }
}

fn describe_arguments(types: &[Type]) -> String {
    let names: Vec<String> = types.iter().map(Type::name).collect();
    format!("({})", names.join(", "))
}

impl Lowerer<'_> {
    fn arguments(&self, args: &[Expr]) -> Arguments {
        Arguments::new(args.iter().map(|arg| self.type_of(arg)).collect())
    }

    fn call_receiver(&self, target: Option<&Expr>) -> Type {
        match target {
            None => self.class.this_type.clone(),
            Some(target) => self
                .as_type_name(target)
                .unwrap_or_else(|| self.type_of(target).actual().clone()),
        }
    }

    pub(crate) fn call_type(&self, target: Option<&Expr>, name: &str, args: &[Expr]) -> Type {
        let receiver = self.call_receiver(target);
        match Functions::methods(&receiver, self.env).get_matching_executable(name, &self.arguments(args), self.env) {
            MatchResult::Successful { callable, .. } => callable.result_type(),
            _ => Type::Null,
        }
    }

    /// Overload resolution with the diagnostics of a failed match. `Err(None)`
    /// when an argument did not resolve and the failure was already reported.
    fn choose(
        &self,
        functions: &Functions,
        name: &str,
        args: &[Expr],
        at: Coordinate,
        what: &str,
    ) -> Result<Chosen, Option<Diagnostic>> {
        let arguments = self.arguments(args);
        let unresolved = args.iter().any(|arg| self.is_unresolved(arg));
        match functions.get_matching_executable(name, &arguments, self.env) {
            MatchResult::Successful {
                callable,
                mismatched,
                variadic,
                ..
            } => {
                let warnings = mismatched
                    .iter()
                    .map(|m| {
                        let at = args.get(m.position).map_or(at, |arg| arg.at);
                        Diagnostic::warning(
                            codes::TYPE_PARAMETER,
                            at,
                            format!(
                                "Argument of type {} does not match type parameter {} of {}",
                                m.found, m.expected, functions.receiver
                            ),
                        )
                    })
                    .collect();
                Ok(Chosen {
                    callable,
                    variadic,
                    warnings,
                })
            }
            _ if unresolved => Err(None),
            MatchResult::Ambiguous { .. } => Err(Some(Diagnostic::error(
                codes::AMBIGUOUS_CALL,
                at,
                format!(
                    "Ambiguous call to {what} with arguments {}",
                    describe_arguments(&arguments.types)
                ),
            ))),
            MatchResult::Failed => {
                let known = functions.candidates.iter().any(|c| c.vm_name() == name);
                if !known && name != "<init>" {
                    return Err(Some(Diagnostic::error(
                        codes::UNKNOWN_METHOD,
                        at,
                        format!("Unknown method '{name}' for type {}", functions.receiver),
                    )));
                }
                Err(Some(Diagnostic::error(
                    codes::NO_MATCH,
                    at,
                    format!(
                        "No {what} accepts arguments {}",
                        describe_arguments(&arguments.types)
                    ),
                )))
            }
        }
    }

    /// Arguments converted to the chosen parameters; trailing arguments of a
    /// variable-arity call are packed into a fresh array.
    fn lower_arguments(&mut self, callable: &Callable, args: &[Expr], variadic: bool) -> Fragment {
        let fixed = if variadic {
            callable.params.len().saturating_sub(1)
        } else {
            callable.params.len()
        };
        let mut fragment = Fragment::empty();
        for (arg, param) in args.iter().zip(&callable.params).take(fixed) {
            fragment = fragment.concat(self.lower_coerced(arg, param));
        }
        if !variadic {
            return fragment;
        }

        let element = match callable.params.last() {
            Some(Type::Array(element)) => element.as_ref().clone(),
            _ => Type::object(),
        };
        let trailing = args.get(fixed..).unwrap_or_default();
        fragment = fragment
            .add(push_int(i32::try_from(trailing.len()).unwrap_or(i32::MAX)))
            .add(ops::new_array(&element));
        for (i, arg) in trailing.iter().enumerate() {
            fragment = fragment
                .add(Instruction::Op(Opcode::Dup))
                .add(push_int(i32::try_from(i).unwrap_or(i32::MAX)))
                .concat(self.lower_coerced(arg, &element))
                .add(Instruction::Op(ops::array_store(&element)));
        }
        fragment
    }

    pub(crate) fn lower_call(&mut self, target: Option<&Expr>, name: &str, args: &[Expr], at: Coordinate) -> Fragment {
        let (site, receiver) = match target {
            None => (Site::Implicit, self.class.this_type.clone()),
            Some(target) => match self.as_type_name(target) {
                Some(class) => (Site::Class, class),
                None => {
                    let (code, ty) = self.lower_value(target);
                    if self.is_unresolved(target) {
                        return code.concat(self.lower_all(args));
                    }
                    (Site::Value(code), ty)
                }
            },
        };
        if receiver.is_primitive() || receiver == Type::Null {
            let message = format!("Cannot call method '{name}' on a value of type {receiver}");
            let receiver_code = match site {
                Site::Value(code) => code,
                _ => Fragment::empty(),
            };
            return receiver_code
                .concat(self.lower_all(args))
                .add_error(type_error(at, message));
        }

        let functions = Functions::methods(&receiver, self.env);
        let what = format!("method '{name}' of type {receiver}");
        let chosen = match self.choose(&functions, name, args, at, &what) {
            Ok(chosen) => chosen,
            Err(diagnostic) => {
                let receiver_code = match site {
                    Site::Value(code) => code,
                    _ => Fragment::empty(),
                };
                let fragment = receiver_code.concat(self.lower_all(args));
                return match diagnostic {
                    Some(diagnostic) => fragment.add_error(diagnostic),
                    None => fragment,
                };
            }
        };
        let Chosen {
            callable,
            variadic,
            warnings,
        } = chosen;

        let mut fragment = Fragment::empty();
        match site {
            Site::Implicit if !callable.is_static => {
                if self.is_static {
                    fragment = fragment.add_error(type_error(
                        at,
                        format!("Cannot call instance method {} from a static context", callable.display()),
                    ));
                } else {
                    fragment = fragment.add(self.this_load());
                }
            }
            Site::Class if !callable.is_static => {
                fragment = fragment.add_error(type_error(
                    at,
                    format!("Cannot call instance method {} without an instance", callable.display()),
                ));
            }
            Site::Value(code) => {
                fragment = fragment.concat(code);
                if callable.is_static {
                    fragment = fragment.add_all(ops::pop(1));
                }
            }
            Site::Implicit | Site::Class => {}
        }
        for warning in warnings {
            fragment = fragment.add_error(warning);
        }
        fragment
            .concat(self.lower_arguments(&callable, args, variadic))
            .add(invoke(&callable))
    }

    pub(crate) fn lower_new(&mut self, ty: &TypeRef, args: &[Expr], at: Coordinate) -> Fragment {
        let class = match self.scope.resolve(ty, self.env) {
            Ok(class) => class,
            Err(diagnostic) => return self.lower_all(args).add_error(diagnostic),
        };
        let definition = class.class_name().and_then(|name| self.env.class(name));
        let Some(definition) = definition.filter(|_| !matches!(class, Type::Array(_))) else {
            return self
                .lower_all(args)
                .add_error(type_error(at, format!("Cannot instantiate type {class}")));
        };
        if definition.is_interface() {
            return self
                .lower_all(args)
                .add_error(type_error(at, format!("Cannot instantiate interface {class}")));
        }

        let functions = Functions::constructors(&class, self.env);
        let what = format!("constructor of {class}");
        match self.choose(&functions, "<init>", args, at, &what) {
            Ok(Chosen {
                callable,
                variadic,
                warnings,
            }) => {
                let mut fragment = Fragment::empty()
                    .add(Instruction::Type(TypeOp::New, internal(&definition.name)))
                    .add(Instruction::Op(Opcode::Dup));
                for warning in warnings {
                    fragment = fragment.add_error(warning);
                }
                fragment
                    .concat(self.lower_arguments(&callable, args, variadic))
                    .add(invoke(&callable))
            }
            Err(diagnostic) => {
                let fragment = self.lower_all(args);
                match diagnostic {
                    Some(diagnostic) => fragment.add_error(diagnostic),
                    None => fragment,
                }
            }
        }
    }

    /// `super(...)` or `this(...)` as the first statement of a constructor.
    pub(crate) fn lower_constructor_call(&mut self, delegate: bool, args: &[Expr], at: Coordinate) -> Fragment {
        let class = if delegate {
            self.class.this_type.clone()
        } else {
            self.class.super_type.clone()
        };
        let functions = Functions::constructors(&class, self.env);
        let what = format!("constructor of {class}");
        match self.choose(&functions, "<init>", args, at, &what) {
            Ok(Chosen {
                callable,
                variadic,
                warnings,
            }) => {
                let mut fragment = Fragment::empty().add(self.this_load());
                for warning in warnings {
                    fragment = fragment.add_error(warning);
                }
                fragment
                    .concat(self.lower_arguments(&callable, args, variadic))
                    .add(Instruction::Invoke {
                        kind: InvokeKind::Special,
                        owner: internal(&callable.owner),
                        name: "<init>".to_string(),
                        descriptor: callable.descriptor(),
                        interface: false,
                    })
            }
            Err(diagnostic) => {
                let fragment = self.lower_all(args);
                match diagnostic {
                    Some(diagnostic) => fragment.add_error(diagnostic),
                    None => fragment,
                }
            }
        }
    }
}

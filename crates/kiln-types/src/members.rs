//! Structural reflection: the constructors, methods and fields a type exposes.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::callable::Callable;
use crate::class::{ClassDef, FieldDef, TypeEnv};
use crate::ty::{MemberView, Type, OBJECT};

impl Type {
    /// Constructors are never inherited.
    pub fn constructors(&self, env: &dyn TypeEnv, view: MemberView) -> Vec<Callable> {
        let Some(def) = self.class_name().and_then(|name| env.class(name)) else {
            return Vec::new();
        };
        def.constructors
            .iter()
            .filter(|c| view == MemberView::Declared || c.is_public())
            .cloned()
            .collect()
    }

    /// Methods visible on this type. Overridden methods appear once, as the
    /// most derived declaration.
    pub fn methods(&self, env: &dyn TypeEnv, view: MemberView) -> Vec<Callable> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for def in self.member_sources(env, view) {
            for method in &def.methods {
                if view == MemberView::Public && !method.is_public() {
                    continue;
                }
                if seen.insert((method.name.clone(), method.descriptor())) {
                    out.push(method.clone());
                }
            }
        }
        out
    }

    pub fn fields(&self, env: &dyn TypeEnv, view: MemberView) -> Vec<FieldDef> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for def in self.member_sources(env, view) {
            for field in &def.fields {
                if view == MemberView::Public && !field.is_public() {
                    continue;
                }
                if seen.insert(field.name.clone()) {
                    out.push(field.clone());
                }
            }
        }
        out
    }

    /// Methods named `name` (the overload candidates for a call).
    pub fn methods_named(&self, name: &str, env: &dyn TypeEnv) -> Vec<Callable> {
        self.methods(env, MemberView::Public)
            .into_iter()
            .filter(|m| m.name == name)
            .collect()
    }

    pub fn field_named(&self, name: &str, env: &dyn TypeEnv) -> Option<FieldDef> {
        self.fields(env, MemberView::Public)
            .into_iter()
            .find(|f| f.name == name)
    }

    /// Classes whose members this type exposes, most derived first.
    fn member_sources(&self, env: &dyn TypeEnv, view: MemberView) -> Vec<Arc<ClassDef>> {
        let roots: Vec<String> = match self.actual() {
            Type::Reference(name) | Type::Parameterised { raw: name, .. } => vec![name.clone()],
            Type::Bounded { bound, .. } => return bound.member_sources(env, view),
            Type::Intersection(parts) => {
                return parts
                    .iter()
                    .flat_map(|p| p.member_sources(env, view))
                    .collect();
            }
            Type::Array(_) | Type::Variable(_) | Type::Attempted(_) => vec![OBJECT.to_string()],
            Type::Primitive(_) | Type::Null | Type::Generic { .. } => Vec::new(),
        };

        if view == MemberView::Declared {
            return roots.iter().filter_map(|name| env.class(name)).collect();
        }

        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut queue: VecDeque<String> = roots.into();
        let mut saw_interface = false;
        while let Some(name) = queue.pop_front() {
            if !seen.insert(name.clone()) {
                continue;
            }
            let Some(def) = env.class(&name) else {
                continue;
            };
            saw_interface |= def.is_interface();
            for sup in def.supertypes() {
                if let Some(sup) = sup.class_name() {
                    queue.push_back(sup.to_string());
                }
            }
            out.push(def);
        }
        // Interfaces expose `Object`'s methods too.
        if saw_interface && !seen.contains(OBJECT) {
            out.extend(env.class(OBJECT));
        }
        out
    }
}

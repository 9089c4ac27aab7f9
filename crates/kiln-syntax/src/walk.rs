use crate::ast::{ClassDecl, ConstDecl, ConstructorDecl, FieldDecl, File, Member, MethodDecl};

/// Enter/exit hooks for a depth-first walk over a [`File`].
///
/// Every hook defaults to doing nothing, so a pass only implements the
/// productions it cares about.
pub trait Listener {
    fn enter_file(&mut self, _file: &File) {}
    fn exit_file(&mut self, _file: &File) {}

    fn enter_const(&mut self, _decl: &ConstDecl) {}

    fn enter_class(&mut self, _class: &ClassDecl) {}
    fn exit_class(&mut self, _class: &ClassDecl) {}

    fn enter_field(&mut self, _class: &ClassDecl, _field: &FieldDecl) {}
    fn exit_field(&mut self, _class: &ClassDecl, _field: &FieldDecl) {}

    fn enter_method(&mut self, _class: &ClassDecl, _method: &MethodDecl) {}
    fn exit_method(&mut self, _class: &ClassDecl, _method: &MethodDecl) {}

    fn enter_constructor(&mut self, _class: &ClassDecl, _ctor: &ConstructorDecl) {}
    fn exit_constructor(&mut self, _class: &ClassDecl, _ctor: &ConstructorDecl) {}
}

/// Constants first, then classes with their members in source order.
pub fn walk_file<L: Listener + ?Sized>(file: &File, listener: &mut L) {
    listener.enter_file(file);
    for decl in &file.constants {
        listener.enter_const(decl);
    }
    for class in &file.classes {
        listener.enter_class(class);
        for member in &class.members {
            match member {
                Member::Field(field) => {
                    listener.enter_field(class, field);
                    listener.exit_field(class, field);
                }
                Member::Method(method) => {
                    listener.enter_method(class, method);
                    listener.exit_method(class, method);
                }
                Member::Constructor(ctor) => {
                    listener.enter_constructor(class, ctor);
                    listener.exit_constructor(class, ctor);
                }
            }
        }
        listener.exit_class(class);
    }
    listener.exit_file(file);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Trace(Vec<String>);

    impl Listener for Trace {
        fn enter_file(&mut self, _: &File) {
            self.0.push("file".into());
        }
        fn exit_file(&mut self, _: &File) {
            self.0.push("/file".into());
        }
        fn enter_const(&mut self, decl: &ConstDecl) {
            self.0.push(format!("const {}", decl.name));
        }
        fn enter_class(&mut self, class: &ClassDecl) {
            self.0.push(format!("class {}", class.name));
        }
        fn exit_class(&mut self, class: &ClassDecl) {
            self.0.push(format!("/class {}", class.name));
        }
        fn enter_field(&mut self, _: &ClassDecl, field: &FieldDecl) {
            self.0.push(format!("field {}", field.name));
        }
        fn enter_method(&mut self, _: &ClassDecl, method: &MethodDecl) {
            self.0.push(format!("method {}", method.name));
        }
        fn exit_method(&mut self, _: &ClassDecl, method: &MethodDecl) {
            self.0.push(format!("/method {}", method.name));
        }
        fn enter_constructor(&mut self, class: &ClassDecl, _: &ConstructorDecl) {
            self.0.push(format!("ctor {}", class.name));
        }
    }

    #[test]
    fn walks_depth_first_in_source_order() {
        let src = "const Int N = 3;\nclass A { Int x; A() { } Void f() { } }\ninterface B { }";
        let parsed = parse(src).unwrap();
        let mut trace = Trace::default();
        walk_file(&parsed.file, &mut trace);
        assert_eq!(
            trace.0,
            vec![
                "file", "const N", "class A", "field x", "ctor A", "method f", "/method f",
                "/class A", "class B", "/class B", "/file",
            ]
        );
    }
}

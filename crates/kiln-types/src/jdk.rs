//! A compact built-in description of the JDK subset the language relies on.
//!
//! The descriptions are written as descriptors and generic signatures and run
//! through the same parsers as class files read from disk, so the catalog sees
//! no difference between the two.

use kiln_classfile::{
    parse_class_signature, parse_field_descriptor, parse_field_signature, parse_method_descriptor,
    parse_method_signature, ClassStub, FieldStub, MethodStub, ACC_ABSTRACT, ACC_FINAL,
    ACC_INTERFACE, ACC_PUBLIC, ACC_STATIC, ACC_SUPER, ACC_VARARGS,
};

use crate::provider::ClassProvider;
use crate::ty::PrimitiveType;

const P: u16 = ACC_PUBLIC;
const PS: u16 = ACC_PUBLIC | ACC_STATIC;
const PSF: u16 = ACC_PUBLIC | ACC_STATIC | ACC_FINAL;
const PA: u16 = ACC_PUBLIC | ACC_ABSTRACT;
const PV: u16 = ACC_PUBLIC | ACC_VARARGS;
const PSV: u16 = ACC_PUBLIC | ACC_STATIC | ACC_VARARGS;

const CLASS: u16 = ACC_PUBLIC | ACC_SUPER;
const FINAL_CLASS: u16 = ACC_PUBLIC | ACC_SUPER | ACC_FINAL;
const ABSTRACT_CLASS: u16 = ACC_PUBLIC | ACC_SUPER | ACC_ABSTRACT;
const INTERFACE: u16 = ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT;

const OBJECT: &str = "java/lang/Object";

struct Member {
    access_flags: u16,
    name: &'static str,
    descriptor: String,
    signature: Option<&'static str>,
}

struct StubBuilder {
    internal_name: String,
    access_flags: u16,
    super_class: Option<&'static str>,
    interfaces: Vec<&'static str>,
    signature: Option<String>,
    fields: Vec<Member>,
    methods: Vec<Member>,
}

impl StubBuilder {
    fn new(access_flags: u16, internal_name: &str, super_class: Option<&'static str>) -> Self {
        Self {
            internal_name: internal_name.to_string(),
            access_flags,
            super_class,
            interfaces: Vec::new(),
            signature: None,
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    fn class(internal_name: &str) -> Self {
        Self::new(CLASS, internal_name, Some(OBJECT))
    }

    fn interface(internal_name: &str) -> Self {
        Self::new(INTERFACE, internal_name, Some(OBJECT))
    }

    fn implements(mut self, interfaces: &[&'static str]) -> Self {
        self.interfaces.extend_from_slice(interfaces);
        self
    }

    fn signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    fn field(mut self, access_flags: u16, name: &'static str, descriptor: &str) -> Self {
        self.fields.push(Member {
            access_flags,
            name,
            descriptor: descriptor.to_string(),
            signature: None,
        });
        self
    }

    fn method(self, access_flags: u16, name: &'static str, descriptor: impl Into<String>) -> Self {
        self.member(access_flags, name, descriptor.into(), None)
    }

    fn generic(self, access_flags: u16, name: &'static str, descriptor: &str, signature: &'static str) -> Self {
        self.member(access_flags, name, descriptor.to_string(), Some(signature))
    }

    fn member(mut self, access_flags: u16, name: &'static str, descriptor: String, signature: Option<&'static str>) -> Self {
        self.methods.push(Member {
            access_flags,
            name,
            descriptor,
            signature,
        });
        self
    }

    /// The same method under several descriptors.
    fn overloads(mut self, access_flags: u16, name: &'static str, descriptors: &[&str]) -> Self {
        for descriptor in descriptors {
            self = self.method(access_flags, name, *descriptor);
        }
        self
    }

    fn build(self) -> kiln_classfile::Result<ClassStub> {
        let fields = self
            .fields
            .into_iter()
            .map(|f| {
                Ok(FieldStub {
                    access_flags: f.access_flags,
                    name: f.name.to_string(),
                    parsed_descriptor: parse_field_descriptor(&f.descriptor)?,
                    descriptor: f.descriptor,
                    signature: f.signature.map(parse_field_signature).transpose()?,
                })
            })
            .collect::<kiln_classfile::Result<Vec<_>>>()?;
        let methods = self
            .methods
            .into_iter()
            .map(|m| {
                Ok(MethodStub {
                    access_flags: m.access_flags,
                    name: m.name.to_string(),
                    parsed_descriptor: parse_method_descriptor(&m.descriptor)?,
                    descriptor: m.descriptor,
                    signature: m.signature.map(parse_method_signature).transpose()?,
                })
            })
            .collect::<kiln_classfile::Result<Vec<_>>>()?;
        Ok(ClassStub {
            internal_name: self.internal_name,
            access_flags: self.access_flags,
            super_class: self.super_class.map(str::to_string),
            interfaces: self.interfaces.into_iter().map(str::to_string).collect(),
            signature: self.signature.as_deref().map(parse_class_signature).transpose()?,
            fields,
            methods,
        })
    }
}

/// Built-in metadata for `java.lang`, `java.util` and `java.io` essentials.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinJdk;

impl BuiltinJdk {
    pub fn new() -> Self {
        Self
    }

    /// Dotted binary names of every described class.
    pub fn class_names() -> impl Iterator<Item = String> {
        KNOWN
            .iter()
            .map(|name| name.replace('/', "."))
            .chain(PrimitiveType::ALL.iter().filter(|p| **p != PrimitiveType::Void).map(|p| p.box_class().to_string()))
    }
}

impl ClassProvider for BuiltinJdk {
    fn lookup(&self, binary_name: &str) -> Option<ClassStub> {
        let internal = binary_name.replace('.', "/");
        let builder = describe(&internal)?;
        match builder.build() {
            Ok(stub) => Some(stub),
            Err(err) => {
                tracing::warn!(target: "kiln.catalog", class = binary_name, error = %err, "malformed built-in class description");
                None
            }
        }
    }
}

const KNOWN: &[&str] = &[
    "java/lang/Object",
    "java/lang/CharSequence",
    "java/lang/Comparable",
    "java/lang/String",
    "java/lang/Number",
    "java/lang/Math",
    "java/lang/System",
    "java/lang/StringBuilder",
    "java/lang/Iterable",
    "java/lang/Runnable",
    "java/lang/Cloneable",
    "java/lang/Throwable",
    "java/lang/Exception",
    "java/lang/RuntimeException",
    "java/lang/IllegalArgumentException",
    "java/lang/IllegalStateException",
    "java/io/Serializable",
    "java/io/PrintStream",
    "java/util/Iterator",
    "java/util/Collection",
    "java/util/List",
    "java/util/Set",
    "java/util/ArrayList",
    "java/util/Map",
    "java/util/HashMap",
    "java/util/Arrays",
    "java/util/Objects",
];

fn describe(internal: &str) -> Option<StubBuilder> {
    let dotted = internal.replace('/', ".");
    if let Some(p) = PrimitiveType::from_box(&dotted) {
        return Some(boxed(internal, p));
    }

    let builder = match internal {
        "java/lang/Object" => StubBuilder::new(CLASS, internal, None)
            .method(P, "<init>", "()V")
            .method(P, "toString", "()Ljava/lang/String;")
            .method(P, "equals", "(Ljava/lang/Object;)Z")
            .method(P, "hashCode", "()I"),
        "java/lang/CharSequence" => StubBuilder::interface(internal)
            .method(PA, "length", "()I")
            .method(PA, "charAt", "(I)C")
            .method(PA, "toString", "()Ljava/lang/String;"),
        "java/lang/Comparable" => StubBuilder::interface(internal)
            .signature("<T:Ljava/lang/Object;>Ljava/lang/Object;")
            .generic(PA, "compareTo", "(Ljava/lang/Object;)I", "(TT;)I"),
        "java/lang/String" => StubBuilder::new(FINAL_CLASS, internal, Some(OBJECT))
            .implements(&["java/io/Serializable", "java/lang/Comparable", "java/lang/CharSequence"])
            .signature(
                "Ljava/lang/Object;Ljava/io/Serializable;Ljava/lang/Comparable<Ljava/lang/String;>;Ljava/lang/CharSequence;",
            )
            .method(P, "<init>", "()V")
            .method(P, "<init>", "(Ljava/lang/String;)V")
            .method(P, "length", "()I")
            .method(P, "charAt", "(I)C")
            .method(P, "isEmpty", "()Z")
            .overloads(P, "substring", &["(I)Ljava/lang/String;", "(II)Ljava/lang/String;"])
            .method(P, "indexOf", "(Ljava/lang/String;)I")
            .method(P, "contains", "(Ljava/lang/CharSequence;)Z")
            .method(P, "startsWith", "(Ljava/lang/String;)Z")
            .method(P, "endsWith", "(Ljava/lang/String;)Z")
            .method(P, "concat", "(Ljava/lang/String;)Ljava/lang/String;")
            .method(P, "toUpperCase", "()Ljava/lang/String;")
            .method(P, "toLowerCase", "()Ljava/lang/String;")
            .method(P, "trim", "()Ljava/lang/String;")
            .method(P, "split", "(Ljava/lang/String;)[Ljava/lang/String;")
            .method(P, "replace", "(Ljava/lang/CharSequence;Ljava/lang/CharSequence;)Ljava/lang/String;")
            .method(P, "compareTo", "(Ljava/lang/String;)I")
            .method(P, "equals", "(Ljava/lang/Object;)Z")
            .method(P, "hashCode", "()I")
            .method(P, "toString", "()Ljava/lang/String;")
            .overloads(
                PS,
                "valueOf",
                &[
                    "(Z)Ljava/lang/String;",
                    "(C)Ljava/lang/String;",
                    "(I)Ljava/lang/String;",
                    "(J)Ljava/lang/String;",
                    "(F)Ljava/lang/String;",
                    "(D)Ljava/lang/String;",
                    "(Ljava/lang/Object;)Ljava/lang/String;",
                ],
            )
            .method(PSV, "format", "(Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/String;")
            .method(PSV, "join", "(Ljava/lang/CharSequence;[Ljava/lang/CharSequence;)Ljava/lang/String;"),
        "java/lang/Number" => StubBuilder::new(ABSTRACT_CLASS, internal, Some(OBJECT))
            .implements(&["java/io/Serializable"])
            .method(P, "<init>", "()V")
            .method(PA, "intValue", "()I")
            .method(PA, "longValue", "()J")
            .method(PA, "floatValue", "()F")
            .method(PA, "doubleValue", "()D")
            .method(P, "byteValue", "()B")
            .method(P, "shortValue", "()S"),
        "java/lang/Math" => StubBuilder::new(FINAL_CLASS, internal, Some(OBJECT))
            .field(PSF, "PI", "D")
            .field(PSF, "E", "D")
            .overloads(PS, "abs", &["(I)I", "(J)J", "(F)F", "(D)D"])
            .overloads(PS, "max", &["(II)I", "(JJ)J", "(FF)F", "(DD)D"])
            .overloads(PS, "min", &["(II)I", "(JJ)J", "(FF)F", "(DD)D"])
            .method(PS, "sqrt", "(D)D")
            .method(PS, "pow", "(DD)D")
            .method(PS, "floor", "(D)D")
            .method(PS, "ceil", "(D)D")
            .method(PS, "random", "()D")
            .overloads(PS, "round", &["(F)I", "(D)J"]),
        "java/lang/System" => StubBuilder::new(FINAL_CLASS, internal, Some(OBJECT))
            .field(PSF, "out", "Ljava/io/PrintStream;")
            .field(PSF, "err", "Ljava/io/PrintStream;")
            .method(PS, "currentTimeMillis", "()J")
            .method(PS, "nanoTime", "()J")
            .method(PS, "arraycopy", "(Ljava/lang/Object;ILjava/lang/Object;II)V")
            .method(PS, "exit", "(I)V"),
        "java/lang/StringBuilder" => StubBuilder::new(FINAL_CLASS, internal, Some(OBJECT))
            .implements(&["java/io/Serializable", "java/lang/CharSequence"])
            .method(P, "<init>", "()V")
            .method(P, "<init>", "(Ljava/lang/String;)V")
            .overloads(
                P,
                "append",
                &[
                    "(Ljava/lang/String;)Ljava/lang/StringBuilder;",
                    "(Ljava/lang/Object;)Ljava/lang/StringBuilder;",
                    "(Z)Ljava/lang/StringBuilder;",
                    "(C)Ljava/lang/StringBuilder;",
                    "(I)Ljava/lang/StringBuilder;",
                    "(J)Ljava/lang/StringBuilder;",
                    "(F)Ljava/lang/StringBuilder;",
                    "(D)Ljava/lang/StringBuilder;",
                ],
            )
            .method(P, "reverse", "()Ljava/lang/StringBuilder;")
            .method(P, "length", "()I")
            .method(P, "charAt", "(I)C")
            .method(P, "toString", "()Ljava/lang/String;"),
        "java/lang/Iterable" => StubBuilder::interface(internal)
            .signature("<T:Ljava/lang/Object;>Ljava/lang/Object;")
            .generic(PA, "iterator", "()Ljava/util/Iterator;", "()Ljava/util/Iterator<TT;>;"),
        "java/lang/Runnable" => StubBuilder::interface(internal).method(PA, "run", "()V"),
        "java/lang/Cloneable" | "java/io/Serializable" => StubBuilder::interface(internal),
        "java/lang/Throwable" => StubBuilder::class(internal)
            .implements(&["java/io/Serializable"])
            .method(P, "<init>", "()V")
            .method(P, "<init>", "(Ljava/lang/String;)V")
            .method(P, "getMessage", "()Ljava/lang/String;")
            .method(P, "printStackTrace", "()V")
            .method(P, "toString", "()Ljava/lang/String;"),
        "java/lang/Exception" => exception(internal, "java/lang/Throwable"),
        "java/lang/RuntimeException" => exception(internal, "java/lang/Exception"),
        "java/lang/IllegalArgumentException" | "java/lang/IllegalStateException" => {
            exception(internal, "java/lang/RuntimeException")
        }
        "java/io/PrintStream" => {
            let printed = ["(Z)V", "(C)V", "(I)V", "(J)V", "(F)V", "(D)V", "(Ljava/lang/String;)V", "(Ljava/lang/Object;)V"];
            StubBuilder::class(internal)
                .method(P, "println", "()V")
                .overloads(P, "println", &printed)
                .overloads(P, "print", &printed)
                .method(PV, "printf", "(Ljava/lang/String;[Ljava/lang/Object;)Ljava/io/PrintStream;")
                .method(P, "flush", "()V")
        }
        "java/util/Iterator" => StubBuilder::interface(internal)
            .signature("<E:Ljava/lang/Object;>Ljava/lang/Object;")
            .method(PA, "hasNext", "()Z")
            .generic(PA, "next", "()Ljava/lang/Object;", "()TE;"),
        "java/util/Collection" => collection(StubBuilder::interface(internal), PA)
            .implements(&["java/lang/Iterable"])
            .signature("<E:Ljava/lang/Object;>Ljava/lang/Object;Ljava/lang/Iterable<TE;>;"),
        "java/util/Set" => collection(StubBuilder::interface(internal), PA)
            .implements(&["java/util/Collection"])
            .signature("<E:Ljava/lang/Object;>Ljava/lang/Object;Ljava/util/Collection<TE;>;"),
        "java/util/List" => list(StubBuilder::interface(internal), PA)
            .implements(&["java/util/Collection"])
            .signature("<E:Ljava/lang/Object;>Ljava/lang/Object;Ljava/util/Collection<TE;>;"),
        "java/util/ArrayList" => list(StubBuilder::class(internal), P)
            .implements(&["java/util/List", "java/lang/Cloneable", "java/io/Serializable"])
            .signature(
                "<E:Ljava/lang/Object;>Ljava/lang/Object;Ljava/util/List<TE;>;Ljava/lang/Cloneable;Ljava/io/Serializable;",
            )
            .method(P, "<init>", "()V")
            .method(P, "<init>", "(I)V")
            .generic(P, "<init>", "(Ljava/util/Collection;)V", "(Ljava/util/Collection<+TE;>;)V")
            .method(P, "toString", "()Ljava/lang/String;"),
        "java/util/Map" => map(StubBuilder::interface(internal), PA)
            .signature("<K:Ljava/lang/Object;V:Ljava/lang/Object;>Ljava/lang/Object;"),
        "java/util/HashMap" => map(StubBuilder::class(internal), P)
            .implements(&["java/util/Map", "java/lang/Cloneable", "java/io/Serializable"])
            .signature(
                "<K:Ljava/lang/Object;V:Ljava/lang/Object;>Ljava/lang/Object;Ljava/util/Map<TK;TV;>;Ljava/lang/Cloneable;Ljava/io/Serializable;",
            )
            .method(P, "<init>", "()V")
            .method(P, "toString", "()Ljava/lang/String;"),
        "java/util/Arrays" => StubBuilder::class(internal)
            .generic(
                PSV,
                "asList",
                "([Ljava/lang/Object;)Ljava/util/List;",
                "<T:Ljava/lang/Object;>([TT;)Ljava/util/List<TT;>;",
            )
            .overloads(
                PS,
                "toString",
                &["([I)Ljava/lang/String;", "([J)Ljava/lang/String;", "([D)Ljava/lang/String;", "([Ljava/lang/Object;)Ljava/lang/String;"],
            )
            .overloads(PS, "sort", &["([I)V", "([J)V", "([D)V", "([Ljava/lang/Object;)V"]),
        "java/util/Objects" => StubBuilder::new(FINAL_CLASS, internal, Some(OBJECT))
            .method(PS, "equals", "(Ljava/lang/Object;Ljava/lang/Object;)Z")
            .method(PS, "hashCode", "(Ljava/lang/Object;)I")
            .method(PS, "toString", "(Ljava/lang/Object;)Ljava/lang/String;")
            .method(PS, "isNull", "(Ljava/lang/Object;)Z")
            .generic(PS, "requireNonNull", "(Ljava/lang/Object;)Ljava/lang/Object;", "<T:Ljava/lang/Object;>(TT;)TT;"),
        _ => return None,
    };
    Some(builder)
}

fn exception(internal: &str, super_class: &'static str) -> StubBuilder {
    StubBuilder::new(CLASS, internal, Some(super_class))
        .method(P, "<init>", "()V")
        .method(P, "<init>", "(Ljava/lang/String;)V")
}

fn collection(builder: StubBuilder, flags: u16) -> StubBuilder {
    builder
        .method(flags, "size", "()I")
        .method(flags, "isEmpty", "()Z")
        .method(flags, "contains", "(Ljava/lang/Object;)Z")
        .generic(flags, "add", "(Ljava/lang/Object;)Z", "(TE;)Z")
        .method(flags, "remove", "(Ljava/lang/Object;)Z")
        .method(flags, "clear", "()V")
        .generic(flags, "iterator", "()Ljava/util/Iterator;", "()Ljava/util/Iterator<TE;>;")
}

fn list(builder: StubBuilder, flags: u16) -> StubBuilder {
    collection(builder, flags)
        .generic(flags, "get", "(I)Ljava/lang/Object;", "(I)TE;")
        .generic(flags, "set", "(ILjava/lang/Object;)Ljava/lang/Object;", "(ITE;)TE;")
        .generic(flags, "add", "(ILjava/lang/Object;)V", "(ITE;)V")
        .generic(flags, "remove", "(I)Ljava/lang/Object;", "(I)TE;")
        .method(flags, "indexOf", "(Ljava/lang/Object;)I")
}

fn map(builder: StubBuilder, flags: u16) -> StubBuilder {
    builder
        .method(flags, "size", "()I")
        .method(flags, "isEmpty", "()Z")
        .method(flags, "containsKey", "(Ljava/lang/Object;)Z")
        .generic(flags, "get", "(Ljava/lang/Object;)Ljava/lang/Object;", "(Ljava/lang/Object;)TV;")
        .generic(
            flags,
            "put",
            "(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;",
            "(TK;TV;)TV;",
        )
        .generic(
            flags,
            "getOrDefault",
            "(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;",
            "(Ljava/lang/Object;TV;)TV;",
        )
        .generic(flags, "remove", "(Ljava/lang/Object;)Ljava/lang/Object;", "(Ljava/lang/Object;)TV;")
        .generic(flags, "keySet", "()Ljava/util/Set;", "()Ljava/util/Set<TK;>;")
        .generic(flags, "values", "()Ljava/util/Collection;", "()Ljava/util/Collection<TV;>;")
        .method(flags, "clear", "()V")
}

/// `java.lang.Integer` and friends.
fn boxed(internal: &str, p: PrimitiveType) -> StubBuilder {
    let prim = p.descriptor();
    let this = format!("L{internal};");
    let numeric = !matches!(p, PrimitiveType::Bool | PrimitiveType::Char);
    let super_class = if numeric { "java/lang/Number" } else { OBJECT };

    let mut builder = StubBuilder::new(FINAL_CLASS, internal, Some(super_class))
        .implements(&["java/lang/Comparable"])
        .signature(format!("L{super_class};Ljava/lang/Comparable<{this}>;"))
        .method(PS, "valueOf", format!("({prim}){this}"))
        .method(P, p.unbox_method(), format!("(){prim}"))
        .method(P, "compareTo", format!("({this})I"))
        .method(P, "equals", "(Ljava/lang/Object;)Z")
        .method(P, "hashCode", "()I")
        .method(P, "toString", "()Ljava/lang/String;")
        .method(PS, "toString", format!("({prim})Ljava/lang/String;"));
    if numeric {
        let conversions = [("intValue", "()I"), ("longValue", "()J"), ("floatValue", "()F"), ("doubleValue", "()D")];
        for (name, descriptor) in conversions {
            if name != p.unbox_method() {
                builder = builder.method(P, name, descriptor);
            }
        }
        builder = builder
            .field(PSF, "MAX_VALUE", &prim.to_string())
            .field(PSF, "MIN_VALUE", &prim.to_string());
    }
    match p {
        PrimitiveType::Int => builder.method(PS, "parseInt", "(Ljava/lang/String;)I"),
        PrimitiveType::Long => builder.method(PS, "parseLong", "(Ljava/lang/String;)J"),
        PrimitiveType::Num => builder.method(PS, "parseDouble", "(Ljava/lang/String;)D"),
        PrimitiveType::Float => builder.method(PS, "parseFloat", "(Ljava/lang/String;)F"),
        PrimitiveType::Bool => builder.method(PS, "parseBoolean", "(Ljava/lang/String;)Z"),
        PrimitiveType::Char => builder
            .method(PS, "isDigit", "(C)Z")
            .method(PS, "isLetter", "(C)Z")
            .method(PS, "toUpperCase", "(C)C")
            .method(PS, "toLowerCase", "(C)C"),
        _ => builder,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_described_class_parses() {
        let jdk = BuiltinJdk::new();
        for name in BuiltinJdk::class_names() {
            let stub = jdk.lookup(&name);
            assert!(stub.is_some(), "{name} failed to build");
        }
        assert!(jdk.lookup("java.lang.Thread").is_none());
    }

    #[test]
    fn boxes_carry_their_conversions() {
        let stub = BuiltinJdk.lookup("java.lang.Integer").unwrap();
        assert_eq!(stub.super_class.as_deref(), Some("java/lang/Number"));
        assert!(stub
            .methods
            .iter()
            .any(|m| m.name == "valueOf" && m.descriptor == "(I)Ljava/lang/Integer;"));
        assert!(stub.methods.iter().any(|m| m.name == "intValue" && m.descriptor == "()I"));

        let chars = BuiltinJdk.lookup("java.lang.Character").unwrap();
        assert_eq!(chars.super_class.as_deref(), Some("java/lang/Object"));
        assert!(chars.methods.iter().any(|m| m.name == "charValue"));
    }
}

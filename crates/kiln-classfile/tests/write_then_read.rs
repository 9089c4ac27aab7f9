use kiln_classfile::{
    mnemonics, ClassFile, ClassStub, ClassWriter, Constant, FieldSpec, Instruction, InvokeKind,
    LocalKind, MethodCode, MethodSpec, Opcode, TypeArgument, TypeSignature, ACC_PUBLIC,
    ACC_STATIC, ACC_SUPER, MAJOR_VERSION,
};
use pretty_assertions::assert_eq;

fn sample_class() -> Vec<u8> {
    let mut writer = ClassWriter::new(
        ACC_PUBLIC | ACC_SUPER,
        "Box",
        Some("java/lang/Object".to_string()),
    );
    writer
        .set_signature("<T:Ljava/lang/Object;>Ljava/lang/Object;Ljava/lang/Comparable<TT;>;")
        .add_interface("java/lang/Comparable")
        .set_source_file("Box.kiln")
        .add_field(FieldSpec {
            access_flags: ACC_PUBLIC,
            name: "value".into(),
            descriptor: "Ljava/lang/Object;".into(),
            signature: Some("TT;".into()),
        })
        .add_method(MethodSpec {
            access_flags: ACC_PUBLIC,
            name: "<init>".into(),
            descriptor: "()V".into(),
            signature: None,
            code: Some(MethodCode {
                instructions: vec![
                    Instruction::Load(LocalKind::Reference, 0),
                    Instruction::Invoke {
                        kind: InvokeKind::Special,
                        owner: "java/lang/Object".into(),
                        name: "<init>".into(),
                        descriptor: "()V".into(),
                        interface: false,
                    },
                    Instruction::Op(Opcode::Return),
                ],
                max_locals: 1,
            }),
        })
        .add_method(MethodSpec {
            access_flags: ACC_PUBLIC | ACC_STATIC,
            name: "greeting".into(),
            descriptor: "()Ljava/lang/String;".into(),
            signature: None,
            code: Some(MethodCode {
                instructions: vec![
                    Instruction::Push(Constant::String("héllo\0".into())),
                    Instruction::Op(Opcode::Areturn),
                ],
                max_locals: 0,
            }),
        });
    writer.finish().expect("class writes")
}

#[test]
fn written_class_parses_back() {
    let bytes = sample_class();
    let class = ClassFile::parse(&bytes).expect("class parses");

    assert_eq!(class.major_version, MAJOR_VERSION);
    assert_eq!(class.this_class, "Box");
    assert_eq!(class.super_class.as_deref(), Some("java/lang/Object"));
    assert_eq!(class.interfaces, vec!["java/lang/Comparable".to_string()]);
    assert_eq!(class.source_file.as_deref(), Some("Box.kiln"));

    let value = class.field("value").expect("field present");
    assert_eq!(value.signature.as_deref(), Some("TT;"));
    assert!(value.code.is_none());

    let init = class.method("<init>", "()V").expect("constructor present");
    let code = init.code.as_ref().expect("constructor has code");
    assert_eq!(code.max_stack, 1);
    assert_eq!(code.max_locals, 1);
    assert_eq!(
        mnemonics(&code.code).unwrap(),
        vec!["aload_0", "invokespecial", "return"]
    );
}

#[test]
fn stub_parses_generic_metadata() {
    let stub = ClassStub::parse(&sample_class()).expect("stub parses");
    let signature = stub.signature.expect("class signature");
    assert_eq!(signature.type_parameters[0].name, "T");
    assert_eq!(
        signature.interfaces[0].type_arguments(),
        &[TypeArgument::Exact(TypeSignature::TypeVariable("T".into()))]
    );
    assert_eq!(
        stub.fields[0].signature,
        Some(TypeSignature::TypeVariable("T".into()))
    );
    assert_eq!(stub.methods.len(), 2);
    assert_eq!(stub.methods[1].parsed_descriptor.to_string(), "()Ljava/lang/String;");
}

#[test]
fn truncated_input_is_an_error() {
    let bytes = sample_class();
    assert!(ClassFile::parse(&bytes[..bytes.len() - 1]).is_err());
    assert!(ClassFile::parse(&[0, 1, 2, 3]).is_err());
}

use crate::constant_pool::ConstantPool;
use crate::error::{Error, Result};
use crate::reader::Reader;

pub const MAGIC: u32 = 0xCAFE_BABE;

#[derive(Debug, Clone)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub access_flags: u16,
    pub this_class: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<ClassMember>,
    pub methods: Vec<ClassMember>,
    pub signature: Option<String>,
    pub source_file: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClassMember {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    /// Only ever present on methods.
    pub code: Option<CodeInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeInfo {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionHandler>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// `None` catches everything.
    pub catch_type: Option<String>,
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let magic = reader.read_u4()?;
        if magic != MAGIC {
            return Err(Error::InvalidMagic(magic));
        }

        let minor_version = reader.read_u2()?;
        let major_version = reader.read_u2()?;
        let cp = ConstantPool::parse(&mut reader)?;

        let access_flags = reader.read_u2()?;
        let this_class = cp.get_class_name(reader.read_u2()?)?;
        let super_class_idx = reader.read_u2()?;
        let super_class = if super_class_idx == 0 {
            None
        } else {
            Some(cp.get_class_name(super_class_idx)?)
        };

        let interfaces_count = reader.read_u2()? as usize;
        let mut interfaces = Vec::with_capacity(interfaces_count);
        for _ in 0..interfaces_count {
            interfaces.push(cp.get_class_name(reader.read_u2()?)?);
        }

        let fields = parse_members(&mut reader, &cp)?;
        let methods = parse_members(&mut reader, &cp)?;
        let class_attrs = parse_attributes(&mut reader, &cp)?;

        reader.ensure_empty()?;

        Ok(Self {
            minor_version,
            major_version,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            signature: class_attrs.signature,
            source_file: class_attrs.source_file,
        })
    }

    pub fn method(&self, name: &str, descriptor: &str) -> Option<&ClassMember> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor == descriptor)
    }

    pub fn field(&self, name: &str) -> Option<&ClassMember> {
        self.fields.iter().find(|f| f.name == name)
    }
}

fn parse_members(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<Vec<ClassMember>> {
    let count = reader.read_u2()? as usize;
    let mut members = Vec::with_capacity(count);
    for _ in 0..count {
        let access_flags = reader.read_u2()?;
        let name = cp.get_utf8(reader.read_u2()?)?.to_string();
        let descriptor = cp.get_utf8(reader.read_u2()?)?.to_string();
        let attrs = parse_attributes(reader, cp)?;
        members.push(ClassMember {
            access_flags,
            name,
            descriptor,
            signature: attrs.signature,
            code: attrs.code,
        });
    }
    Ok(members)
}

#[derive(Default)]
struct ParsedAttributes {
    signature: Option<String>,
    source_file: Option<String>,
    code: Option<CodeInfo>,
}

fn parse_attributes(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<ParsedAttributes> {
    let attributes_count = reader.read_u2()? as usize;
    let mut parsed = ParsedAttributes::default();
    for _ in 0..attributes_count {
        let name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        let info = reader.read_bytes(length)?;
        let name = cp.get_utf8(name_index)?;

        let mut sub = Reader::new(info);
        match name {
            "Signature" => {
                parsed.signature = Some(cp.get_utf8(sub.read_u2()?)?.to_string());
                sub.ensure_empty()?;
            }
            "SourceFile" => {
                parsed.source_file = Some(cp.get_utf8(sub.read_u2()?)?.to_string());
                sub.ensure_empty()?;
            }
            "Code" => {
                parsed.code = Some(parse_code(&mut sub, cp)?);
            }
            _ => {
                // Unknown attribute: skipped.
            }
        }
    }

    Ok(parsed)
}

fn parse_code(sub: &mut Reader<'_>, cp: &ConstantPool) -> Result<CodeInfo> {
    let max_stack = sub.read_u2()?;
    let max_locals = sub.read_u2()?;
    let code_length = sub.read_u4()? as usize;
    let code = sub.read_bytes(code_length)?.to_vec();

    let handlers = sub.read_u2()? as usize;
    let mut exception_table = Vec::with_capacity(handlers);
    for _ in 0..handlers {
        let start_pc = sub.read_u2()?;
        let end_pc = sub.read_u2()?;
        let handler_pc = sub.read_u2()?;
        let catch_index = sub.read_u2()?;
        let catch_type = if catch_index == 0 {
            None
        } else {
            Some(cp.get_class_name(catch_index)?)
        };
        exception_table.push(ExceptionHandler {
            start_pc,
            end_pc,
            handler_pc,
            catch_type,
        });
    }

    // Nested attributes (line numbers, stack maps) are not needed.
    let nested = sub.read_u2()? as usize;
    for _ in 0..nested {
        sub.read_u2()?;
        let len = sub.read_u4()? as usize;
        sub.read_bytes(len)?;
    }
    sub.ensure_empty()
        .map_err(|_| Error::MalformedAttribute("Code"))?;

    Ok(CodeInfo {
        max_stack,
        max_locals,
        code,
        exception_table,
    })
}

use std::collections::HashMap;

use crate::classfile::MAGIC;
use crate::code::{assemble, Instruction};
use crate::constant_pool::encode_modified_utf8;
use crate::error::{Error, Result};

/// Class files produced here have no stack-map frames, which version 49
/// (Java 5) does not require.
pub const MAJOR_VERSION: u16 = 49;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PoolKey {
    Utf8(String),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class(u16),
    String(u16),
    Field(u16, u16),
    Method(u16, u16),
    InterfaceMethod(u16, u16),
    NameAndType(u16, u16),
}

/// Deduplicating constant-pool writer.
#[derive(Debug, Default)]
pub struct ConstantPoolBuilder {
    bytes: Vec<u8>,
    next: u16,
    index: HashMap<PoolKey, u16>,
}

impl ConstantPoolBuilder {
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            next: 1,
            index: HashMap::new(),
        }
    }

    /// Value of `constant_pool_count`.
    pub fn count(&self) -> u16 {
        self.next
    }

    fn intern(&mut self, key: PoolKey) -> Result<u16> {
        if let Some(&index) = self.index.get(&key) {
            return Ok(index);
        }
        let wide = matches!(key, PoolKey::Long(_) | PoolKey::Double(_));
        let slots = if wide { 2 } else { 1 };
        let index = self.next;
        self.next = index
            .checked_add(slots)
            .filter(|next| *next < u16::MAX)
            .ok_or(Error::ConstantPoolOverflow)?;

        match &key {
            PoolKey::Utf8(s) => {
                let encoded = encode_modified_utf8(s);
                let len = u16::try_from(encoded.len()).map_err(|_| Error::Other("string constant too long"))?;
                self.bytes.push(1);
                self.bytes.extend_from_slice(&len.to_be_bytes());
                self.bytes.extend_from_slice(&encoded);
            }
            PoolKey::Integer(v) => {
                self.bytes.push(3);
                self.bytes.extend_from_slice(&v.to_be_bytes());
            }
            PoolKey::Float(bits) => {
                self.bytes.push(4);
                self.bytes.extend_from_slice(&bits.to_be_bytes());
            }
            PoolKey::Long(v) => {
                self.bytes.push(5);
                self.bytes.extend_from_slice(&v.to_be_bytes());
            }
            PoolKey::Double(bits) => {
                self.bytes.push(6);
                self.bytes.extend_from_slice(&bits.to_be_bytes());
            }
            PoolKey::Class(name) => self.push_ref(7, &[*name]),
            PoolKey::String(utf8) => self.push_ref(8, &[*utf8]),
            PoolKey::Field(class, nat) => self.push_ref(9, &[*class, *nat]),
            PoolKey::Method(class, nat) => self.push_ref(10, &[*class, *nat]),
            PoolKey::InterfaceMethod(class, nat) => self.push_ref(11, &[*class, *nat]),
            PoolKey::NameAndType(name, desc) => self.push_ref(12, &[*name, *desc]),
        }

        self.index.insert(key, index);
        Ok(index)
    }

    fn push_ref(&mut self, tag: u8, indices: &[u16]) {
        self.bytes.push(tag);
        for index in indices {
            self.bytes.extend_from_slice(&index.to_be_bytes());
        }
    }

    pub fn utf8(&mut self, s: &str) -> Result<u16> {
        self.intern(PoolKey::Utf8(s.to_string()))
    }

    pub fn integer(&mut self, v: i32) -> Result<u16> {
        self.intern(PoolKey::Integer(v))
    }

    pub fn float(&mut self, v: f32) -> Result<u16> {
        self.intern(PoolKey::Float(v.to_bits()))
    }

    pub fn long(&mut self, v: i64) -> Result<u16> {
        self.intern(PoolKey::Long(v))
    }

    pub fn double(&mut self, v: f64) -> Result<u16> {
        self.intern(PoolKey::Double(v.to_bits()))
    }

    /// `internal_name` is slash separated (or an array descriptor).
    pub fn class(&mut self, internal_name: &str) -> Result<u16> {
        let name = self.utf8(internal_name)?;
        self.intern(PoolKey::Class(name))
    }

    pub fn string(&mut self, s: &str) -> Result<u16> {
        let utf8 = self.utf8(s)?;
        self.intern(PoolKey::String(utf8))
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name = self.utf8(name)?;
        let descriptor = self.utf8(descriptor)?;
        self.intern(PoolKey::NameAndType(name, descriptor))
    }

    pub fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class = self.class(owner)?;
        let nat = self.name_and_type(name, descriptor)?;
        self.intern(PoolKey::Field(class, nat))
    }

    pub fn method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        interface: bool,
    ) -> Result<u16> {
        let class = self.class(owner)?;
        let nat = self.name_and_type(name, descriptor)?;
        if interface {
            self.intern(PoolKey::InterfaceMethod(class, nat))
        } else {
            self.intern(PoolKey::Method(class, nat))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodCode {
    pub instructions: Vec<Instruction>,
    pub max_locals: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodSpec {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    /// `None` for abstract methods and for signature-only class shapes.
    pub code: Option<MethodCode>,
}

/// Serialises one class. Names are internal (slash separated).
#[derive(Debug)]
pub struct ClassWriter {
    access_flags: u16,
    this_class: String,
    super_class: Option<String>,
    interfaces: Vec<String>,
    signature: Option<String>,
    source_file: Option<String>,
    fields: Vec<FieldSpec>,
    methods: Vec<MethodSpec>,
}

impl ClassWriter {
    pub fn new(access_flags: u16, this_class: impl Into<String>, super_class: Option<String>) -> Self {
        Self {
            access_flags,
            this_class: this_class.into(),
            super_class,
            interfaces: Vec::new(),
            signature: None,
            source_file: None,
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn add_interface(&mut self, internal_name: impl Into<String>) -> &mut Self {
        self.interfaces.push(internal_name.into());
        self
    }

    pub fn set_signature(&mut self, signature: impl Into<String>) -> &mut Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn set_source_file(&mut self, name: impl Into<String>) -> &mut Self {
        self.source_file = Some(name.into());
        self
    }

    pub fn add_field(&mut self, field: FieldSpec) -> &mut Self {
        self.fields.push(field);
        self
    }

    pub fn add_method(&mut self, method: MethodSpec) -> &mut Self {
        self.methods.push(method);
        self
    }

    pub fn finish(&self) -> Result<Vec<u8>> {
        let mut pool = ConstantPoolBuilder::new();
        let mut body = Vec::new();

        put_u2(&mut body, self.access_flags);
        put_u2(&mut body, pool.class(&self.this_class)?);
        match &self.super_class {
            Some(name) => put_u2(&mut body, pool.class(name)?),
            None => put_u2(&mut body, 0),
        }
        put_count(&mut body, self.interfaces.len())?;
        for interface in &self.interfaces {
            put_u2(&mut body, pool.class(interface)?);
        }

        put_count(&mut body, self.fields.len())?;
        for field in &self.fields {
            put_u2(&mut body, field.access_flags);
            put_u2(&mut body, pool.utf8(&field.name)?);
            put_u2(&mut body, pool.utf8(&field.descriptor)?);
            let mut attrs = Vec::new();
            if let Some(sig) = &field.signature {
                attrs.push(short_attribute(&mut pool, "Signature", sig)?);
            }
            put_attributes(&mut body, attrs)?;
        }

        put_count(&mut body, self.methods.len())?;
        for method in &self.methods {
            put_u2(&mut body, method.access_flags);
            put_u2(&mut body, pool.utf8(&method.name)?);
            put_u2(&mut body, pool.utf8(&method.descriptor)?);
            let mut attrs = Vec::new();
            if let Some(code) = &method.code {
                attrs.push(code_attribute(&mut pool, code)?);
            }
            if let Some(sig) = &method.signature {
                attrs.push(short_attribute(&mut pool, "Signature", sig)?);
            }
            put_attributes(&mut body, attrs)?;
        }

        let mut attrs = Vec::new();
        if let Some(sig) = &self.signature {
            attrs.push(short_attribute(&mut pool, "Signature", sig)?);
        }
        if let Some(source) = &self.source_file {
            attrs.push(short_attribute(&mut pool, "SourceFile", source)?);
        }
        put_attributes(&mut body, attrs)?;

        let mut out = Vec::with_capacity(10 + pool.bytes.len() + body.len());
        out.extend_from_slice(&MAGIC.to_be_bytes());
        put_u2(&mut out, 0);
        put_u2(&mut out, MAJOR_VERSION);
        put_u2(&mut out, pool.count());
        out.extend_from_slice(&pool.bytes);
        out.extend_from_slice(&body);
        Ok(out)
    }
}

fn put_u2(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_count(out: &mut Vec<u8>, len: usize) -> Result<()> {
    let len = u16::try_from(len).map_err(|_| Error::Other("too many class members"))?;
    put_u2(out, len);
    Ok(())
}

/// `(name index, payload)`.
type Attribute = (u16, Vec<u8>);

fn put_attributes(out: &mut Vec<u8>, attrs: Vec<Attribute>) -> Result<()> {
    put_count(out, attrs.len())?;
    for (name, payload) in attrs {
        put_u2(out, name);
        let len = u32::try_from(payload.len()).map_err(|_| Error::Other("attribute too large"))?;
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(&payload);
    }
    Ok(())
}

/// An attribute whose payload is a single Utf8 index.
fn short_attribute(pool: &mut ConstantPoolBuilder, name: &str, value: &str) -> Result<Attribute> {
    let name = pool.utf8(name)?;
    let value = pool.utf8(value)?;
    Ok((name, value.to_be_bytes().to_vec()))
}

fn code_attribute(pool: &mut ConstantPoolBuilder, code: &MethodCode) -> Result<Attribute> {
    let name = pool.utf8("Code")?;
    let assembled = assemble(&code.instructions, code.max_locals, pool)?;

    let mut payload = Vec::new();
    put_u2(&mut payload, assembled.max_stack);
    put_u2(&mut payload, assembled.max_locals);
    payload.extend_from_slice(&(assembled.code.len() as u32).to_be_bytes());
    payload.extend_from_slice(&assembled.code);
    put_count(&mut payload, assembled.exception_table.len())?;
    for entry in &assembled.exception_table {
        put_u2(&mut payload, entry.start_pc);
        put_u2(&mut payload, entry.end_pc);
        put_u2(&mut payload, entry.handler_pc);
        put_u2(&mut payload, entry.catch_type);
    }
    put_u2(&mut payload, 0);
    Ok((name, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_deduplicates_and_reserves_wide_slots() {
        let mut pool = ConstantPoolBuilder::new();
        let a = pool.utf8("x").unwrap();
        assert_eq!(pool.utf8("x").unwrap(), a);
        let long = pool.long(1 << 40).unwrap();
        let after = pool.integer(7).unwrap();
        assert_eq!(after, long + 2);
        assert_eq!(pool.count(), after + 1);
    }

    #[test]
    fn string_and_class_share_utf8() {
        let mut pool = ConstantPoolBuilder::new();
        let class = pool.class("java/lang/Object").unwrap();
        let string = pool.string("java/lang/Object").unwrap();
        assert_ne!(class, string);
        // utf8, class, string
        assert_eq!(pool.count(), 4);
    }
}

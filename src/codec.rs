//! Declarative fixed-layout binary structures
//!
//! A [StructDef] is a static table of typed [Field]s plus a byte order.
//! One generic [encode]/[decode] pair interprets every definition, so the
//! message catalog only declares layouts and never hand-writes byte offsets.
//!
//! Every field has a fixed width, hence every structure has a fixed size that
//! can be computed from its definition alone ([StructDef::size]).

use crate::{Error, Result};

/// Byte order of the integer fields of one structure
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ByteOrder {
    /// Network order, used by USB/IP
    Big,
    /// Used by USB descriptors and setup packets
    Little,
}

/// Type of a single field
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldType {
    U8,
    U16,
    U32,
    /// Fixed-width byte array, shorter values are zero padded
    Bytes(usize),
    /// Nested structure, encoded with its own byte order
    Struct(&'static StructDef),
}

impl FieldType {
    pub const fn size(&self) -> usize {
        match self {
            FieldType::U8 => 1,
            FieldType::U16 => 2,
            FieldType::U32 => 4,
            FieldType::Bytes(len) => *len,
            FieldType::Struct(def) => def.size(),
        }
    }
}

/// A named field with an optional default for integer types
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub ty: FieldType,
    pub default: u32,
}

impl Field {
    pub const fn u8(name: &'static str) -> Self {
        Self::new(name, FieldType::U8)
    }

    pub const fn u16(name: &'static str) -> Self {
        Self::new(name, FieldType::U16)
    }

    pub const fn u32(name: &'static str) -> Self {
        Self::new(name, FieldType::U32)
    }

    pub const fn bytes(name: &'static str, len: usize) -> Self {
        Self::new(name, FieldType::Bytes(len))
    }

    pub const fn nested(name: &'static str, def: &'static StructDef) -> Self {
        Self::new(name, FieldType::Struct(def))
    }

    const fn new(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            default: 0,
        }
    }

    /// Value used when a structure is created without setting this field
    pub const fn with_default(self, default: u32) -> Self {
        Self { default, ..self }
    }
}

/// Layout of a fixed-size structure
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StructDef {
    pub name: &'static str,
    pub order: ByteOrder,
    pub fields: &'static [Field],
}

impl StructDef {
    pub const fn big_endian(name: &'static str, fields: &'static [Field]) -> Self {
        Self {
            name,
            order: ByteOrder::Big,
            fields,
        }
    }

    pub const fn little_endian(name: &'static str, fields: &'static [Field]) -> Self {
        Self {
            name,
            order: ByteOrder::Little,
            fields,
        }
    }

    /// Encoded size in bytes
    pub const fn size(&self) -> usize {
        let mut total = 0;
        let mut i = 0;
        while i < self.fields.len() {
            total += self.fields[i].ty.size();
            i += 1;
        }
        total
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| Error::UnknownField {
                structure: self.name,
                field: name.to_string(),
            })
    }
}

/// Value of one field of a [Structure]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    Bytes(Vec<u8>),
    Struct(Structure),
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::U8(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::U16(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::U32(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Bytes(v.as_bytes().to_vec())
    }
}

impl From<Structure> for Value {
    fn from(v: Structure) -> Self {
        Value::Struct(v)
    }
}

impl Value {
    fn default_for(field: &Field) -> Self {
        match field.ty {
            FieldType::U8 => Value::U8(field.default as u8),
            FieldType::U16 => Value::U16(field.default as u16),
            FieldType::U32 => Value::U32(field.default),
            FieldType::Bytes(len) => Value::Bytes(vec![0; len]),
            FieldType::Struct(def) => Value::Struct(Structure::new(def)),
        }
    }
}

/// An instance of a [StructDef]
///
/// Values always agree with the definition: integer widths match and byte
/// fields hold exactly their declared length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Structure {
    def: &'static StructDef,
    values: Vec<Value>,
}

impl Structure {
    /// Create an instance with every field at its default
    pub fn new(def: &'static StructDef) -> Self {
        Self {
            def,
            values: def.fields.iter().map(Value::default_for).collect(),
        }
    }

    pub fn def(&self) -> &'static StructDef {
        self.def
    }

    /// Set a field, checking its name and type
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<&mut Self> {
        let def = self.def;
        let index = def.position(name)?;
        let field = def.fields[index];
        let value = match (field.ty, value.into()) {
            (FieldType::U8, v @ Value::U8(_))
            | (FieldType::U16, v @ Value::U16(_))
            | (FieldType::U32, v @ Value::U32(_)) => v,
            (FieldType::Bytes(max), Value::Bytes(mut bytes)) => {
                if bytes.len() > max {
                    return Err(Error::FieldOverflow {
                        structure: def.name,
                        field: field.name,
                        len: bytes.len(),
                        max,
                    });
                }
                bytes.resize(max, 0);
                Value::Bytes(bytes)
            }
            (FieldType::Struct(nested), Value::Struct(s)) if *nested == *s.def => {
                Value::Struct(s)
            }
            _ => {
                return Err(Error::FieldType {
                    structure: def.name,
                    field: field.name,
                })
            }
        };
        self.values[index] = value;
        Ok(self)
    }

    /// Builder form of [Structure::set]
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Result<&Value> {
        let index = self.def.position(name)?;
        Ok(&self.values[index])
    }

    pub fn get_u8(&self, name: &str) -> Result<u8> {
        match self.get(name)? {
            Value::U8(v) => Ok(*v),
            _ => Err(self.type_error(name)),
        }
    }

    pub fn get_u16(&self, name: &str) -> Result<u16> {
        match self.get(name)? {
            Value::U16(v) => Ok(*v),
            _ => Err(self.type_error(name)),
        }
    }

    pub fn get_u32(&self, name: &str) -> Result<u32> {
        match self.get(name)? {
            Value::U32(v) => Ok(*v),
            _ => Err(self.type_error(name)),
        }
    }

    pub fn get_bytes(&self, name: &str) -> Result<&[u8]> {
        match self.get(name)? {
            Value::Bytes(v) => Ok(v),
            _ => Err(self.type_error(name)),
        }
    }

    /// A fixed-width byte field read as a string, trailing NULs removed
    pub fn get_str(&self, name: &str) -> Result<String> {
        let bytes = self.get_bytes(name)?;
        let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    pub fn get_struct(&self, name: &str) -> Result<&Structure> {
        match self.get(name)? {
            Value::Struct(v) => Ok(v),
            _ => Err(self.type_error(name)),
        }
    }

    fn type_error(&self, name: &str) -> Error {
        match self.def.position(name) {
            Ok(index) => Error::FieldType {
                structure: self.def.name,
                field: self.def.fields[index].name,
            },
            Err(err) => err,
        }
    }
}

/// Encode a structure into exactly `structure.def().size()` bytes
pub fn encode(structure: &Structure) -> Vec<u8> {
    let mut out = Vec::with_capacity(structure.def.size());
    encode_into(structure, &mut out);
    out
}

fn encode_into(structure: &Structure, out: &mut Vec<u8>) {
    let order = structure.def.order;
    for value in &structure.values {
        match value {
            Value::U8(v) => out.push(*v),
            Value::U16(v) => out.extend_from_slice(&match order {
                ByteOrder::Big => v.to_be_bytes(),
                ByteOrder::Little => v.to_le_bytes(),
            }),
            Value::U32(v) => out.extend_from_slice(&match order {
                ByteOrder::Big => v.to_be_bytes(),
                ByteOrder::Little => v.to_le_bytes(),
            }),
            Value::Bytes(v) => out.extend_from_slice(v),
            Value::Struct(s) => encode_into(s, out),
        }
    }
}

/// Decode `bytes` as an instance of `def`
///
/// Fails with [Error::LengthMismatch] unless `bytes` has exactly the
/// definition's size.
pub fn decode(def: &'static StructDef, bytes: &[u8]) -> Result<Structure> {
    let expected = def.size();
    if bytes.len() != expected {
        return Err(Error::LengthMismatch {
            structure: def.name,
            expected,
            actual: bytes.len(),
        });
    }

    let mut values = Vec::with_capacity(def.fields.len());
    let mut offset = 0;
    for field in def.fields {
        let len = field.ty.size();
        let raw = &bytes[offset..offset + len];
        let value = match field.ty {
            FieldType::U8 => Value::U8(raw[0]),
            FieldType::U16 => {
                let raw = [raw[0], raw[1]];
                Value::U16(match def.order {
                    ByteOrder::Big => u16::from_be_bytes(raw),
                    ByteOrder::Little => u16::from_le_bytes(raw),
                })
            }
            FieldType::U32 => {
                let raw = [raw[0], raw[1], raw[2], raw[3]];
                Value::U32(match def.order {
                    ByteOrder::Big => u32::from_be_bytes(raw),
                    ByteOrder::Little => u32::from_le_bytes(raw),
                })
            }
            FieldType::Bytes(_) => Value::Bytes(raw.to_vec()),
            FieldType::Struct(nested) => Value::Struct(decode(nested, raw)?),
        };
        values.push(value);
        offset += len;
    }
    Ok(Structure { def, values })
}

/// A typed message backed by a [StructDef]
///
/// Implementors only convert between themselves and a [Structure]; the byte
/// layout comes from [WireStruct::DEF] through the generic codec.
pub trait WireStruct: Sized {
    const DEF: &'static StructDef;

    fn to_structure(&self) -> Result<Structure>;

    fn from_structure(structure: &Structure) -> Result<Self>;

    fn size() -> usize {
        Self::DEF.size()
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(encode(&self.to_structure()?))
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_structure(&decode(Self::DEF, bytes)?)
    }
}

//! JVM class file reader.
//!
//! Extracts the structural metadata needed to describe an extension without
//! ever running it: the class and super-class names, directly implemented
//! interfaces, class-level runtime-visible annotations and, for annotation
//! types, the default value of each element.
//!
//! ## Layout
//!
//! ```text
//! +--------------------------+
//! | Magic 0xCAFEBABE         |
//! | minor / major version    |
//! +--------------------------+
//! | Constant pool            |
//! +--------------------------+
//! | access, this, super      |
//! | interfaces               |
//! +--------------------------+
//! | fields    (skipped)      |
//! | methods   (AnnotationDefault only)
//! | attributes (RuntimeVisibleAnnotations only)
//! +--------------------------+
//! ```

use crate::error::{ExtensionError, ExtensionResult};
use byteorder::{BigEndian, ReadBytesExt};
use std::collections::BTreeMap;
use std::io::Cursor;

/// Magic number at the start of every class file.
pub const MAGIC: u32 = 0xCAFE_BABE;

pub const ACC_ANNOTATION: u16 = 0x2000;

const RUNTIME_VISIBLE_ANNOTATIONS: &str = "RuntimeVisibleAnnotations";
const ANNOTATION_DEFAULT: &str = "AnnotationDefault";

/// An entry of the constant pool. Only the kinds annotations can refer to
/// keep their payload.
#[derive(Debug, Clone)]
enum Constant {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    Other,
}

/// A value bound to an annotation element.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    Byte(i8),
    Char(char),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    String(String),
    /// An enum constant: binary name of the enum type and the constant name.
    Enum {
        type_name: String,
        const_name: String,
    },
    /// A class literal, as a binary name (or the raw descriptor for
    /// primitives and `void`).
    Class(String),
    Annotation(Annotation),
    Array(Vec<ElementValue>),
}

impl ElementValue {
    pub fn as_annotation(&self) -> Option<&Annotation> {
        match self {
            ElementValue::Annotation(a) => Some(a),
            _ => None,
        }
    }

    /// A short name for the kind of value, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ElementValue::Byte(_) => "byte",
            ElementValue::Char(_) => "char",
            ElementValue::Short(_) => "short",
            ElementValue::Int(_) => "int",
            ElementValue::Long(_) => "long",
            ElementValue::Float(_) => "float",
            ElementValue::Double(_) => "double",
            ElementValue::Boolean(_) => "boolean",
            ElementValue::String(_) => "string",
            ElementValue::Enum { .. } => "enum",
            ElementValue::Class(_) => "class",
            ElementValue::Annotation(_) => "annotation",
            ElementValue::Array(_) => "array",
        }
    }
}

/// An annotation as written at its use site. Elements the use site omits
/// are not present here; their defaults live on the annotation type.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Binary name of the annotation type.
    pub type_name: String,
    pub elements: Vec<(String, ElementValue)>,
}

impl Annotation {
    /// Explicit value of element `name`.
    pub fn get(&self, name: &str) -> Option<&ElementValue> {
        self.elements
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

/// Structural metadata of one class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub access_flags: u16,

    /// Binary name, e.g. `org.example.Outer$Inner`.
    pub name: String,
    pub super_name: Option<String>,

    /// Directly implemented (or, for interfaces, extended) interfaces.
    pub interfaces: Vec<String>,

    /// Class-level runtime-visible annotations.
    pub annotations: Vec<Annotation>,

    /// Element defaults declared by an annotation type, keyed by element.
    pub annotation_defaults: BTreeMap<String, ElementValue>,
}

impl ClassFile {
    /// Parse class file bytes. `origin` names the class being read and is
    /// only used in error messages.
    pub fn parse(bytes: &[u8], origin: &str) -> ExtensionResult<Self> {
        ClassReader::new(bytes, origin).read_class()
    }

    pub fn is_annotation(&self) -> bool {
        self.access_flags & ACC_ANNOTATION != 0
    }

    /// The annotation of type `type_name` on this class, if any.
    pub fn annotation(&self, type_name: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.type_name == type_name)
    }
}

/// Convert an internal name (`a/b/C`) to a binary name (`a.b.C`).
pub fn binary_name(internal: &str) -> String {
    internal.replace('/', ".")
}

/// Convert a field descriptor to a binary name. Object descriptors
/// (`La/b/C;`) become `a.b.C`; anything else is returned unchanged.
pub fn descriptor_to_name(descriptor: &str) -> String {
    match descriptor
        .strip_prefix('L')
        .and_then(|d| d.strip_suffix(';'))
    {
        Some(internal) => binary_name(internal),
        None => descriptor.to_string(),
    }
}

/// Resource path of the class file for a binary name.
pub fn class_resource_name(binary: &str) -> String {
    format!("{}.class", binary.replace('.', "/"))
}

struct ClassReader<'a> {
    cursor: Cursor<&'a [u8]>,
    origin: &'a str,
    pool: Vec<Option<Constant>>,
}

impl<'a> ClassReader<'a> {
    fn new(bytes: &'a [u8], origin: &'a str) -> Self {
        Self {
            cursor: Cursor::new(bytes),
            origin,
            pool: Vec::new(),
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> ExtensionError {
        ExtensionError::InvalidClassFile {
            class: self.origin.to_string(),
            reason: reason.into(),
        }
    }

    fn truncated(&self) -> ExtensionError {
        self.invalid("unexpected end of class file")
    }

    fn u8(&mut self) -> ExtensionResult<u8> {
        self.cursor.read_u8().map_err(|_| self.truncated())
    }

    fn u16(&mut self) -> ExtensionResult<u16> {
        self.cursor
            .read_u16::<BigEndian>()
            .map_err(|_| self.truncated())
    }

    fn u32(&mut self) -> ExtensionResult<u32> {
        self.cursor
            .read_u32::<BigEndian>()
            .map_err(|_| self.truncated())
    }

    fn bytes(&mut self, len: usize) -> ExtensionResult<&'a [u8]> {
        let data: &'a [u8] = *self.cursor.get_ref();
        let start = self.cursor.position() as usize;
        let end = start.checked_add(len).ok_or_else(|| self.truncated())?;
        if end > data.len() {
            return Err(self.truncated());
        }
        self.cursor.set_position(end as u64);
        Ok(&data[start..end])
    }

    fn read_class(mut self) -> ExtensionResult<ClassFile> {
        if self.u32()? != MAGIC {
            return Err(self.invalid("bad magic number"));
        }
        let minor_version = self.u16()?;
        let major_version = self.u16()?;

        self.read_constant_pool()?;

        let access_flags = self.u16()?;
        let this_index = self.u16()?;
        let name = self.class_name(this_index)?;

        let super_index = self.u16()?;
        let super_name = if super_index == 0 {
            None
        } else {
            Some(self.class_name(super_index)?)
        };

        let interface_count = self.u16()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            let index = self.u16()?;
            interfaces.push(self.class_name(index)?);
        }

        let field_count = self.u16()?;
        for _ in 0..field_count {
            self.u16()?; // access
            self.u16()?; // name
            self.u16()?; // descriptor
            self.skip_attributes()?;
        }

        let mut annotation_defaults = BTreeMap::new();
        let method_count = self.u16()?;
        for _ in 0..method_count {
            self.u16()?; // access
            let name_index = self.u16()?;
            self.u16()?; // descriptor
            let method_name = self.utf8(name_index)?;

            let attribute_count = self.u16()?;
            for _ in 0..attribute_count {
                let (attribute, body) = self.attribute()?;
                if attribute == ANNOTATION_DEFAULT {
                    let value = self.nested(body).element_value()?;
                    annotation_defaults.insert(method_name.clone(), value);
                }
            }
        }

        let mut annotations = Vec::new();
        let attribute_count = self.u16()?;
        for _ in 0..attribute_count {
            let (attribute, body) = self.attribute()?;
            if attribute == RUNTIME_VISIBLE_ANNOTATIONS {
                let mut reader = self.nested(body);
                let count = reader.u16()?;
                for _ in 0..count {
                    annotations.push(reader.annotation()?);
                }
            }
        }

        Ok(ClassFile {
            minor_version,
            major_version,
            access_flags,
            name,
            super_name,
            interfaces,
            annotations,
            annotation_defaults,
        })
    }

    fn read_constant_pool(&mut self) -> ExtensionResult<()> {
        let count = self.u16()? as usize;
        let mut pool = Vec::with_capacity(count);
        pool.push(None);

        while pool.len() < count {
            let tag = self.u8()?;
            let constant = match tag {
                1 => {
                    let len = self.u16()? as usize;
                    let raw = self.bytes(len)?;
                    Constant::Utf8(decode_modified_utf8(raw).ok_or_else(|| {
                        self.invalid(format!("malformed string constant #{}", pool.len()))
                    })?)
                }
                3 => Constant::Integer(self.u32()? as i32),
                4 => Constant::Float(f32::from_bits(self.u32()?)),
                5 | 6 => {
                    let high = self.u32()? as u64;
                    let low = self.u32()? as u64;
                    let bits = (high << 32) | low;
                    let constant = if tag == 5 {
                        Constant::Long(bits as i64)
                    } else {
                        Constant::Double(f64::from_bits(bits))
                    };
                    // Eight-byte constants occupy two slots.
                    pool.push(Some(constant));
                    pool.push(None);
                    continue;
                }
                7 => Constant::Class(self.u16()?),
                8 | 16 | 19 | 20 => {
                    self.u16()?;
                    Constant::Other
                }
                9 | 10 | 11 | 12 | 17 | 18 => {
                    self.u16()?;
                    self.u16()?;
                    Constant::Other
                }
                15 => {
                    self.u8()?;
                    self.u16()?;
                    Constant::Other
                }
                other => {
                    return Err(self.invalid(format!("unknown constant pool tag {}", other)));
                }
            };
            pool.push(Some(constant));
        }

        if pool.len() > count {
            return Err(self.invalid("eight-byte constant overruns the constant pool"));
        }

        self.pool = pool;
        Ok(())
    }

    fn constant(&self, index: u16) -> ExtensionResult<&Constant> {
        self.pool
            .get(index as usize)
            .and_then(|c| c.as_ref())
            .ok_or_else(|| self.invalid(format!("invalid constant pool index {}", index)))
    }

    fn utf8(&self, index: u16) -> ExtensionResult<String> {
        match self.constant(index)? {
            Constant::Utf8(s) => Ok(s.clone()),
            _ => Err(self.invalid(format!("constant #{} is not a string", index))),
        }
    }

    fn class_name(&self, index: u16) -> ExtensionResult<String> {
        match self.constant(index)? {
            Constant::Class(name_index) => Ok(binary_name(&self.utf8(*name_index)?)),
            _ => Err(self.invalid(format!("constant #{} is not a class", index))),
        }
    }

    fn attribute(&mut self) -> ExtensionResult<(String, &'a [u8])> {
        let name_index = self.u16()?;
        let len = self.u32()? as usize;
        let name = self.utf8(name_index)?;
        let body = self.bytes(len)?;
        Ok((name, body))
    }

    fn skip_attributes(&mut self) -> ExtensionResult<()> {
        let count = self.u16()?;
        for _ in 0..count {
            self.attribute()?;
        }
        Ok(())
    }

    /// A reader over an attribute body sharing this class's constant pool.
    fn nested(&self, body: &'a [u8]) -> NestedReader<'_, 'a> {
        NestedReader {
            cursor: Cursor::new(body),
            class: self,
        }
    }
}

/// Reads annotation structures out of one attribute body.
struct NestedReader<'r, 'a> {
    cursor: Cursor<&'a [u8]>,
    class: &'r ClassReader<'a>,
}

impl NestedReader<'_, '_> {
    fn u8(&mut self) -> ExtensionResult<u8> {
        self.cursor.read_u8().map_err(|_| self.class.truncated())
    }

    fn u16(&mut self) -> ExtensionResult<u16> {
        self.cursor
            .read_u16::<BigEndian>()
            .map_err(|_| self.class.truncated())
    }

    fn annotation(&mut self) -> ExtensionResult<Annotation> {
        let type_index = self.u16()?;
        let type_name = descriptor_to_name(&self.class.utf8(type_index)?);

        let pair_count = self.u16()?;
        let mut elements = Vec::with_capacity(pair_count as usize);
        for _ in 0..pair_count {
            let name_index = self.u16()?;
            let name = self.class.utf8(name_index)?;
            elements.push((name, self.element_value()?));
        }

        Ok(Annotation {
            type_name,
            elements,
        })
    }

    fn element_value(&mut self) -> ExtensionResult<ElementValue> {
        let tag = self.u8()?;
        let value = match tag {
            b'B' => ElementValue::Byte(self.int_constant()? as i8),
            b'C' => {
                let code = self.int_constant()? as u32;
                ElementValue::Char(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
            }
            b'S' => ElementValue::Short(self.int_constant()? as i16),
            b'I' => ElementValue::Int(self.int_constant()?),
            b'Z' => ElementValue::Boolean(self.int_constant()? != 0),
            b'J' => {
                let index = self.u16()?;
                match self.class.constant(index)? {
                    Constant::Long(v) => ElementValue::Long(*v),
                    _ => return Err(self.class.invalid("long element is not a long constant")),
                }
            }
            b'F' => {
                let index = self.u16()?;
                match self.class.constant(index)? {
                    Constant::Float(v) => ElementValue::Float(*v),
                    _ => return Err(self.class.invalid("float element is not a float constant")),
                }
            }
            b'D' => {
                let index = self.u16()?;
                match self.class.constant(index)? {
                    Constant::Double(v) => ElementValue::Double(*v),
                    _ => {
                        return Err(self.class.invalid("double element is not a double constant"))
                    }
                }
            }
            b's' => {
                let index = self.u16()?;
                ElementValue::String(self.class.utf8(index)?)
            }
            b'e' => {
                let type_index = self.u16()?;
                let const_index = self.u16()?;
                ElementValue::Enum {
                    type_name: descriptor_to_name(&self.class.utf8(type_index)?),
                    const_name: self.class.utf8(const_index)?,
                }
            }
            b'c' => {
                let index = self.u16()?;
                ElementValue::Class(descriptor_to_name(&self.class.utf8(index)?))
            }
            b'@' => ElementValue::Annotation(self.annotation()?),
            b'[' => {
                let count = self.u16()?;
                let mut values = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    values.push(self.element_value()?);
                }
                ElementValue::Array(values)
            }
            other => {
                return Err(self
                    .class
                    .invalid(format!("unknown element value tag '{}'", other as char)))
            }
        };
        Ok(value)
    }

    fn int_constant(&mut self) -> ExtensionResult<i32> {
        let index = self.u16()?;
        match self.class.constant(index)? {
            Constant::Integer(v) => Ok(*v),
            _ => Err(self
                .class
                .invalid(format!("constant #{} is not an integer", index))),
        }
    }
}

/// Decode the "modified UTF-8" used by class files: NUL is encoded in two
/// bytes and supplementary characters as surrogate pairs of three bytes
/// each.
fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    if let Ok(s) = std::str::from_utf8(bytes) {
        if !s.contains('\u{0}') {
            return Some(s.to_string());
        }
    }

    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 {
            units.push(b as u16);
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            let b2 = *bytes.get(i + 1)?;
            units.push((((b & 0x1F) as u16) << 6) | (b2 & 0x3F) as u16);
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            let b2 = *bytes.get(i + 1)?;
            let b3 = *bytes.get(i + 2)?;
            units.push(
                (((b & 0x0F) as u16) << 12) | (((b2 & 0x3F) as u16) << 6) | (b3 & 0x3F) as u16,
            );
            i += 3;
        } else {
            return None;
        }
    }

    String::from_utf16(&units).ok()
}

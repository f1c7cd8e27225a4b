//! Access-time value coercion: stateless converters dispatched per field type.

use crate::document::Document;
use crate::encoding;
use crate::error::*;
use crate::object::TypeTag;
use crate::primitive::{parse_datetime, Dictionary, PdfString, Primitive, Rectangle};

/// A stateless coercion strategy bound to a field at schema-construction time.
pub trait Converter: Sync {
    /// Registry dispatch predicate.
    fn usable_for(&self, ty: &TypeTag) -> bool;
    /// Extra types a bound field accepts on write.
    fn additional_types(&self) -> &'static [TypeTag] {
        &[]
    }
    /// Does this value still need coercion?
    fn needs_conversion(&self, data: &Primitive, types: &[TypeTag]) -> bool;
    /// Perform the coercion.
    fn convert(&self, data: &Primitive, types: &[TypeTag], doc: &Document) -> Result<Primitive>;
}

// Dispatch is first-match: the specific Filespec converter has to come before
// the generic dictionary wrapping, and the concrete Date/Rectangle coercions
// before the identity fallback.
static CONVERTERS: &[&dyn Converter] = &[
    &FileSpecConverter,
    &DictionaryConverter,
    &StringConverter,
    &ByteStringConverter,
    &DateConverter,
    &RectangleConverter,
    &IdentityConverter,
];

pub fn converter_for(ty: &TypeTag) -> &'static dyn Converter {
    CONVERTERS
        .iter()
        .copied()
        .find(|c| c.usable_for(ty))
        .unwrap_or(&IdentityConverter)
}

/// The first class-like tag decides what dictionary-shaped values wrap into.
fn wrap_target(types: &[TypeTag]) -> Option<&TypeTag> {
    types
        .iter()
        .find(|t| matches!(t, TypeTag::Class(_) | TypeTag::Dictionary))
}

fn needs_wrap(dict: &Dictionary, types: &[TypeTag]) -> bool {
    match (dict.class(), wrap_target(types)) {
        (None, _) => true,
        (Some(class), Some(TypeTag::Class(name))) => class.name != *name,
        (Some(_), _) => false,
    }
}

struct FileSpecConverter;
impl Converter for FileSpecConverter {
    fn usable_for(&self, ty: &TypeTag) -> bool {
        matches!(ty, TypeTag::Class("Filespec"))
    }
    fn additional_types(&self) -> &'static [TypeTag] {
        &[TypeTag::Dictionary, TypeTag::String]
    }
    fn needs_conversion(&self, data: &Primitive, types: &[TypeTag]) -> bool {
        match data {
            Primitive::String(_) => true,
            Primitive::Dictionary(d) => needs_wrap(d, types),
            Primitive::Stream(s) => needs_wrap(&s.info, types),
            _ => false,
        }
    }
    fn convert(&self, data: &Primitive, types: &[TypeTag], doc: &Document) -> Result<Primitive> {
        let value = match data {
            // a lone string is the file path
            Primitive::String(s) => {
                let mut dict = Dictionary::new();
                dict.insert("F", Primitive::String(s.clone()));
                Primitive::Dictionary(dict)
            }
            Primitive::Dictionary(_) | Primitive::Stream(_) => data.clone(),
            p => {
                return Err(PdfError::UnexpectedPrimitive {
                    expected: "String or Dictionary",
                    found: p.get_debug_name(),
                })
            }
        };
        Ok(doc.wrap(value, wrap_target(types)).value())
    }
}

struct DictionaryConverter;
impl Converter for DictionaryConverter {
    fn usable_for(&self, ty: &TypeTag) -> bool {
        matches!(ty, TypeTag::Class(_) | TypeTag::Dictionary)
    }
    fn additional_types(&self) -> &'static [TypeTag] {
        &[TypeTag::Dictionary]
    }
    fn needs_conversion(&self, data: &Primitive, types: &[TypeTag]) -> bool {
        match data {
            Primitive::Dictionary(d) => needs_wrap(d, types),
            Primitive::Stream(s) => needs_wrap(&s.info, types),
            _ => false,
        }
    }
    fn convert(&self, data: &Primitive, types: &[TypeTag], doc: &Document) -> Result<Primitive> {
        Ok(doc.wrap(data.clone(), wrap_target(types)).value())
    }
}

struct StringConverter;
impl Converter for StringConverter {
    fn usable_for(&self, ty: &TypeTag) -> bool {
        matches!(ty, TypeTag::String)
    }
    fn needs_conversion(&self, data: &Primitive, _types: &[TypeTag]) -> bool {
        matches!(data, Primitive::String(s) if s.is_binary())
    }
    fn convert(&self, data: &Primitive, _types: &[TypeTag], _doc: &Document) -> Result<Primitive> {
        let s = data.as_string()?;
        let bytes = s.as_bytes();
        let text = if bytes.starts_with(&[0xfe, 0xff]) {
            let utf16: Vec<u16> = bytes[2..]
                .chunks(2)
                .map(|c| (c[0] as u16) << 8 | c.get(1).copied().unwrap_or(0) as u16)
                .collect();
            String::from_utf16(&utf16)?
        } else {
            encoding::decode_bytes(bytes)
        };
        Ok(Primitive::String(PdfString::from_text(text)))
    }
}

struct ByteStringConverter;
impl Converter for ByteStringConverter {
    fn usable_for(&self, ty: &TypeTag) -> bool {
        matches!(ty, TypeTag::ByteString)
    }
    fn additional_types(&self) -> &'static [TypeTag] {
        &[TypeTag::String]
    }
    fn needs_conversion(&self, data: &Primitive, _types: &[TypeTag]) -> bool {
        matches!(data, Primitive::String(s) if !s.is_binary())
    }
    fn convert(&self, data: &Primitive, _types: &[TypeTag], _doc: &Document) -> Result<Primitive> {
        Ok(Primitive::String(data.as_string()?.force_binary()))
    }
}

struct DateConverter;
impl Converter for DateConverter {
    fn usable_for(&self, ty: &TypeTag) -> bool {
        matches!(ty, TypeTag::Date)
    }
    fn additional_types(&self) -> &'static [TypeTag] {
        &[TypeTag::String]
    }
    fn needs_conversion(&self, data: &Primitive, _types: &[TypeTag]) -> bool {
        match data {
            Primitive::String(s) => match std::str::from_utf8(s.as_bytes()) {
                Ok(s) => parse_datetime(s).is_some(),
                Err(_) => false,
            },
            _ => false,
        }
    }
    fn convert(&self, data: &Primitive, _types: &[TypeTag], _doc: &Document) -> Result<Primitive> {
        let s = data.as_string()?;
        let s = std::str::from_utf8(s.as_bytes())?;
        match parse_datetime(s) {
            Some(dt) => Ok(Primitive::Date(dt)),
            None => bail!("not a date string: {:?}", s),
        }
    }
}

struct RectangleConverter;
impl Converter for RectangleConverter {
    fn usable_for(&self, ty: &TypeTag) -> bool {
        matches!(ty, TypeTag::Rectangle)
    }
    fn additional_types(&self) -> &'static [TypeTag] {
        &[TypeTag::Array]
    }
    fn needs_conversion(&self, data: &Primitive, _types: &[TypeTag]) -> bool {
        matches!(data, Primitive::Array(_))
    }
    fn convert(&self, data: &Primitive, _types: &[TypeTag], _doc: &Document) -> Result<Primitive> {
        Ok(Primitive::Rectangle(Rectangle::from_array(data.as_array()?)?))
    }
}

/// Terminal fallback: matches every type, converts nothing.
struct IdentityConverter;
impl Converter for IdentityConverter {
    fn usable_for(&self, _ty: &TypeTag) -> bool {
        true
    }
    fn needs_conversion(&self, _data: &Primitive, _types: &[TypeTag]) -> bool {
        false
    }
    fn convert(&self, data: &Primitive, _types: &[TypeTag], _doc: &Document) -> Result<Primitive> {
        Ok(data.clone())
    }
}

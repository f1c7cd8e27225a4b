//! `Object` wrapper, field schemas and typed-dictionary classes.

mod convert;
mod types;

pub use self::convert::*;
pub use self::types::*;

use crate::document::{Document, Version};
use crate::error::*;
use crate::primitive::{Dictionary, Name, Primitive};

use once_cell::sync::OnceCell;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub type ObjNr = u64;
pub type GenNr = u16;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct PlainRef {
    pub id: ObjNr,
    pub gen: GenNr,
}
impl PlainRef {
    /// The oid of objects that live inline in their container.
    pub const DIRECT: PlainRef = PlainRef { id: 0, gen: 0 };

    pub fn new(id: ObjNr, gen: GenNr) -> PlainRef {
        PlainRef { id, gen }
    }
    pub fn is_direct(&self) -> bool {
        self.id == 0
    }
}
impl fmt::Display for PlainRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

/// One entry of a field's allowed type set.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TypeTag {
    Boolean,
    Integer,
    Real,
    Name,
    String,
    ByteString,
    Date,
    Array,
    Rectangle,
    Dictionary,
    Stream,
    /// Lazy reference into the configured type map.
    Class(&'static str),
}

impl TypeTag {
    /// Whether `value` is acceptable for this tag. References always pass;
    /// they are checked after dereferencing during validation.
    pub fn matches(&self, value: &Primitive, doc: &Document) -> bool {
        match (self, value) {
            (_, Primitive::Reference(_)) => true,
            (TypeTag::Boolean, Primitive::Boolean(_)) => true,
            (TypeTag::Integer, Primitive::Integer(_)) => true,
            (TypeTag::Real, Primitive::Integer(_) | Primitive::Real(_)) => true,
            (TypeTag::Name, Primitive::Name(_)) => true,
            (TypeTag::String | TypeTag::ByteString, Primitive::String(_)) => true,
            (TypeTag::Date, Primitive::Date(_)) => true,
            (TypeTag::Array, Primitive::Array(_)) => true,
            (TypeTag::Rectangle, Primitive::Rectangle(_)) => true,
            (TypeTag::Dictionary, Primitive::Dictionary(_) | Primitive::Stream(_)) => true,
            (TypeTag::Stream, Primitive::Stream(_)) => true,
            (&TypeTag::Class(name), Primitive::Dictionary(d)) => {
                class_matches(doc, name, d.class())
            }
            (&TypeTag::Class(name), Primitive::Stream(s)) => {
                class_matches(doc, name, s.info.class())
            }
            _ => false,
        }
    }
}

fn class_matches(doc: &Document, name: &str, bound: Option<&'static ObjectType>) -> bool {
    match (doc.config().class_for(name), bound) {
        (Some(target), Some(class)) => class.descends_from(target),
        _ => false,
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Indirect {
    Must,
    Direct,
    Either,
}

struct Resolved {
    converter: &'static dyn Converter,
    types: Vec<TypeTag>,
}

/// One schema entry of a typed-dictionary class.
pub struct Field {
    key: &'static str,
    types: &'static [TypeTag],
    required: bool,
    default: Option<fn() -> Primitive>,
    indirect: Indirect,
    min_version: Option<Version>,
    resolved: OnceCell<Resolved>,
}

impl Field {
    pub const fn new(key: &'static str, types: &'static [TypeTag]) -> Field {
        assert!(!types.is_empty());
        Field {
            key,
            types,
            required: false,
            default: None,
            indirect: Indirect::Either,
            min_version: None,
            resolved: OnceCell::new(),
        }
    }
    pub const fn require(mut self) -> Field {
        self.required = true;
        self
    }
    pub const fn with_default(mut self, default: fn() -> Primitive) -> Field {
        self.default = Some(default);
        self
    }
    pub const fn must_be_indirect(mut self) -> Field {
        self.indirect = Indirect::Must;
        self
    }
    pub const fn must_be_direct(mut self) -> Field {
        self.indirect = Indirect::Direct;
        self
    }
    pub const fn since(mut self, version: Version) -> Field {
        self.min_version = Some(version);
        self
    }

    pub fn key(&self) -> &'static str {
        self.key
    }
    pub fn required(&self) -> bool {
        self.required
    }
    pub fn indirect(&self) -> Indirect {
        self.indirect
    }
    pub fn min_version(&self) -> Option<Version> {
        self.min_version
    }
    /// A fresh duplicate of the field's default; composites never alias.
    pub fn default_value(&self) -> Option<Primitive> {
        self.default.map(|f| f())
    }
    /// The first declared type; dictionary-shaped coercions wrap into it.
    pub fn first_type(&self) -> &TypeTag {
        &self.types[0]
    }

    fn resolved(&self) -> &Resolved {
        self.resolved.get_or_init(|| {
            let converter = converter_for(&self.types[0]);
            let mut types = self.types.to_vec();
            for t in converter.additional_types() {
                if !types.contains(t) {
                    types.push(*t);
                }
            }
            Resolved { converter, types }
        })
    }
    pub fn converter(&self) -> &'static dyn Converter {
        self.resolved().converter
    }
    /// The declared types plus whatever the converter accepts, deduplicated.
    pub fn allowed_types(&self) -> &[TypeTag] {
        &self.resolved().types
    }
    pub fn matches(&self, value: &Primitive, doc: &Document) -> bool {
        self.allowed_types().iter().any(|t| t.matches(value, doc))
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Field(/{} {:?})", self.key, self.types)
    }
}

/// A typed-dictionary class: a name, an optional base class and the fields
/// declared at this level. A subclass redeclaring a key overrides the whole
/// field.
pub struct ObjectType {
    pub name: &'static str,
    pub base: Option<&'static ObjectType>,
    pub fields: &'static [Field],
    /// Default value of the /Type key.
    pub type_name: Option<&'static str>,
}

impl ObjectType {
    /// The effective schema entry for `key`, walking the class chain.
    pub fn field(&self, key: &str) -> Option<&'static Field> {
        let mut class = Some(self);
        while let Some(c) = class {
            let fields: &'static [Field] = c.fields;
            if let Some(field) = fields.iter().find(|f| f.key == key) {
                return Some(field);
            }
            class = c.base;
        }
        None
    }

    /// All effective fields, nearest declaration first.
    pub fn effective_fields(&self) -> Vec<&'static Field> {
        let mut seen: Vec<&str> = Vec::new();
        let mut out = Vec::new();
        let mut class = Some(self);
        while let Some(c) = class {
            let fields: &'static [Field] = c.fields;
            for field in fields {
                if !seen.contains(&field.key) {
                    seen.push(field.key);
                    out.push(field);
                }
            }
            class = c.base;
        }
        out
    }

    pub fn descends_from(&self, other: &'static ObjectType) -> bool {
        let mut class = Some(self);
        while let Some(c) = class {
            if std::ptr::eq(c, other) {
                return true;
            }
            class = c.base;
        }
        false
    }
}

impl fmt::Debug for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ObjectType({})", self.name)
    }
}

/// A PDF object: a value together with its identity and bookkeeping flags.
struct Object {
    oid: PlainRef,
    value: Primitive,
    class: &'static ObjectType,
    must_be_indirect: bool,
    dirty: bool,
}

/// Cheap-clone handle to an [`Object`]. All typed access goes through the
/// owning document, passed explicitly.
#[derive(Clone)]
pub struct ObjectRef {
    inner: Rc<RefCell<Object>>,
}

impl ObjectRef {
    pub(crate) fn create(oid: PlainRef, mut value: Primitive, class: &'static ObjectType) -> ObjectRef {
        bind_class(&mut value, class);
        // streams cannot live inline in their container
        let must_be_indirect = matches!(value, Primitive::Stream(_));
        ObjectRef {
            inner: Rc::new(RefCell::new(Object {
                oid,
                value,
                class,
                must_be_indirect,
                dirty: false,
            })),
        }
    }

    /// A transient wrapper that is not addressable by oid.
    pub fn direct(value: Primitive, class: &'static ObjectType) -> ObjectRef {
        ObjectRef::create(PlainRef::DIRECT, value, class)
    }

    pub fn oid(&self) -> PlainRef {
        self.inner.borrow().oid
    }
    pub fn is_indirect(&self) -> bool {
        !self.oid().is_direct()
    }
    pub fn class(&self) -> &'static ObjectType {
        self.inner.borrow().class
    }
    pub fn value(&self) -> Primitive {
        self.inner.borrow().value.clone()
    }
    pub fn with_value<R>(&self, f: impl FnOnce(&Primitive) -> R) -> R {
        f(&self.inner.borrow().value)
    }
    pub fn set_value(&self, mut value: Primitive) {
        let mut obj = self.inner.borrow_mut();
        bind_class(&mut value, obj.class);
        obj.value = value;
        obj.dirty = true;
    }
    /// Replaces the value without touching the dirty flag; used by the
    /// one-shot coercion write-back.
    pub(crate) fn memoize(&self, value: Primitive) {
        let mut obj = self.inner.borrow_mut();
        if let Some(class) = value_class(&value) {
            obj.class = class;
        }
        obj.value = value;
    }
    pub fn is_dirty(&self) -> bool {
        self.inner.borrow().dirty
    }
    pub fn must_be_indirect(&self) -> bool {
        self.inner.borrow().must_be_indirect
    }
    pub fn set_must_be_indirect(&self, flag: bool) {
        self.inner.borrow_mut().must_be_indirect = flag;
    }

    /// The /Type of this object, falling back to the class default.
    pub fn pdf_type(&self) -> Option<Name> {
        let obj = self.inner.borrow();
        if let Some(dict) = dict_of(&obj.value) {
            if let Some(Primitive::Name(n)) = dict.get("Type") {
                return Some(n.clone());
            }
        }
        obj.class.type_name.map(Name::from)
    }

    fn with_dict<R>(&self, f: impl FnOnce(&Dictionary) -> R) -> Option<R> {
        let obj = self.inner.borrow();
        dict_of(&obj.value).map(f)
    }
    fn with_dict_mut<R>(&self, f: impl FnOnce(&mut Dictionary) -> R) -> Option<R> {
        let mut obj = self.inner.borrow_mut();
        dict_of_mut(&mut obj.value).map(f)
    }

    /// The stored entry for `key`, without dereferencing or coercion.
    pub fn raw_get(&self, key: &str) -> Option<Primitive> {
        self.with_dict(|d| d.get(key).cloned()).flatten()
    }

    /// Read path: default lookup, dereferencing and one-shot coercion.
    pub fn get(&self, doc: &Document, key: &str) -> Primitive {
        let field = self.class().field(key);
        let raw = self.raw_get(key).unwrap_or(Primitive::Null);
        let target_ref = match &raw {
            Primitive::Reference(r) => Some(*r),
            _ => None,
        };
        let value = match target_ref {
            Some(r) => doc.deref_ref(r),
            None => raw,
        };
        if value.is_null() {
            // absent entries and dangling references fall back to the default
            return field
                .and_then(|f| f.default_value())
                .unwrap_or(Primitive::Null);
        }
        let field = match field {
            Some(f) => f,
            None => return value,
        };
        let converter = field.converter();
        if !converter.needs_conversion(&value, field.allowed_types()) {
            return value;
        }
        match converter.convert(&value, field.allowed_types(), doc) {
            Ok(converted) => {
                match target_ref.and_then(|r| doc.object(r)) {
                    // keep referenced values indirect: coerce the object itself
                    Some(obj) => obj.memoize(converted.clone()),
                    None => {
                        self.with_dict_mut(|d| d.insert(key, converted.clone()));
                    }
                }
                converted
            }
            Err(e) => {
                warn!("could not coerce /{} in {}: {}", key, self.class().name, e);
                value
            }
        }
    }

    /// Write path: schema type check and version bookkeeping.
    pub fn set(&self, doc: &Document, key: &str, value: Primitive) -> Result<()> {
        if let Some(field) = self.class().field(key) {
            if !field.matches(&value, doc) {
                return Err(PdfError::TypeMismatch {
                    typ: self.class().name,
                    field: key.into(),
                    found: value.get_debug_name(),
                });
            }
            if let Some(min) = field.min_version() {
                doc.request_version(key, min)?;
            }
        }
        match self.with_dict_mut(|d| d.insert(key, value)) {
            Some(_) => {
                self.inner.borrow_mut().dirty = true;
                Ok(())
            }
            None => Err(PdfError::UnexpectedPrimitive {
                expected: "Dictionary",
                found: self.with_value(|v| v.get_debug_name()),
            }),
        }
    }

    /// Removes an entry; returns the stored value.
    pub fn remove(&self, key: &str) -> Option<Primitive> {
        let removed = self.with_dict_mut(|d| d.remove(key)).flatten();
        if removed.is_some() {
            self.inner.borrow_mut().dirty = true;
        }
        removed
    }

    /// Checks this object against its schema. With `auto_correct`, missing
    /// required fields are materialized and indirect-ness is fixed up.
    pub fn validate(&self, doc: &Document, auto_correct: bool) -> Validation {
        let mut result = Validation::new();
        let class = self.class();
        if dict_of(&self.inner.borrow().value).is_none() {
            return result;
        }
        for field in class.effective_fields() {
            let key = field.key();
            let raw = self.raw_get(key);
            let raw = match raw {
                None => {
                    if field.required() {
                        if auto_correct && self.materialize(doc, field) {
                            result.corrected(format!(
                                "required field /{} in {} was missing and has been created",
                                key, class.name
                            ));
                        } else {
                            result.failed(format!(
                                "required field /{} is missing in {}",
                                key, class.name
                            ));
                        }
                    }
                    continue;
                }
                Some(raw) => raw,
            };
            let is_ref = matches!(raw, Primitive::Reference(_));
            let value = doc.deref(raw);
            if value.is_null() {
                if field.required() {
                    result.failed(format!(
                        "required field /{} in {} reads as null",
                        key, class.name
                    ));
                }
                continue;
            }
            if !field.matches(&value, doc) {
                result.failed(format!(
                    "value of field /{} in {} is not one of the allowed types (found {})",
                    key,
                    class.name,
                    value.get_debug_name()
                ));
                continue;
            }
            match field.indirect() {
                Indirect::Must if !is_ref => {
                    if auto_correct {
                        let obj = doc.add(value);
                        obj.set_must_be_indirect(true);
                        self.with_dict_mut(|d| d.insert(key, Primitive::Reference(obj.oid())));
                        result.corrected(format!(
                            "field /{} in {} has been moved into an indirect object",
                            key, class.name
                        ));
                    } else {
                        result.failed(format!(
                            "field /{} in {} must be an indirect object",
                            key, class.name
                        ));
                    }
                }
                Indirect::Direct if is_ref => {
                    if auto_correct {
                        self.with_dict_mut(|d| d.insert(key, value));
                        result.corrected(format!(
                            "field /{} in {} has been inlined",
                            key, class.name
                        ));
                    } else {
                        result.failed(format!(
                            "field /{} in {} must be a direct value",
                            key, class.name
                        ));
                    }
                }
                _ => {}
            }
        }
        result
    }

    /// Builds a value for a missing required field. Fields with a default get
    /// the default; dictionary-shaped fields get a fresh typed dictionary.
    fn materialize(&self, doc: &Document, field: &Field) -> bool {
        if let Some(value) = field.default_value() {
            self.with_dict_mut(|d| d.insert(field.key(), value));
            return true;
        }
        match *field.first_type() {
            tag @ (TypeTag::Class(_) | TypeTag::Dictionary) => {
                let wrapped = doc.wrap(Primitive::Dictionary(Dictionary::new()), Some(&tag));
                // fill in the new dictionary's own required defaults
                let _ = wrapped.validate(doc, true);
                let value = wrapped.value();
                if field.indirect() == Indirect::Must {
                    let obj = doc.add(value);
                    obj.set_must_be_indirect(true);
                    self.with_dict_mut(|d| d.insert(field.key(), Primitive::Reference(obj.oid())));
                } else {
                    self.with_dict_mut(|d| d.insert(field.key(), value));
                }
                true
            }
            _ => false,
        }
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let obj = self.inner.borrow();
        write!(
            f,
            "Object({} {} {})",
            obj.oid,
            obj.class.name,
            obj.value.get_debug_name()
        )
    }
}

fn dict_of(value: &Primitive) -> Option<&Dictionary> {
    match value {
        Primitive::Dictionary(d) => Some(d),
        Primitive::Stream(s) => Some(&s.info),
        _ => None,
    }
}
fn dict_of_mut(value: &mut Primitive) -> Option<&mut Dictionary> {
    match value {
        Primitive::Dictionary(d) => Some(d),
        Primitive::Stream(s) => Some(&mut s.info),
        _ => None,
    }
}
fn bind_class(value: &mut Primitive, class: &'static ObjectType) {
    if let Some(dict) = dict_of_mut(value) {
        dict.bind_class(class);
    }
}
pub(crate) fn value_class(value: &Primitive) -> Option<&'static ObjectType> {
    dict_of(value).and_then(|d| d.class())
}

/// Outcome of a validation run.
#[derive(Debug)]
pub struct Validation {
    pub ok: bool,
    pub messages: Vec<String>,
}

impl Validation {
    pub(crate) fn new() -> Validation {
        Validation {
            ok: true,
            messages: Vec::new(),
        }
    }
    fn corrected(&mut self, msg: String) {
        self.messages.push(msg);
    }
    fn failed(&mut self, msg: String) {
        self.ok = false;
        self.messages.push(msg);
    }
    pub(crate) fn merge(&mut self, other: Validation) {
        self.ok &= other.ok;
        self.messages.extend(other.messages);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::primitive::{PdfStream, PdfString};

    #[test]
    fn wrapper_basics() {
        let obj = ObjectRef::direct(Primitive::Dictionary(Dictionary::new()), &GENERIC);
        assert_eq!(obj.oid(), PlainRef::DIRECT);
        assert!(!obj.is_indirect());
        assert!(!obj.is_dirty());

        obj.set_value(Primitive::Integer(5));
        assert!(obj.is_dirty());
        assert_eq!(obj.value(), Primitive::Integer(5));
    }

    #[test]
    fn get_returns_fresh_default_copies() {
        let doc = Document::new();
        let obj = ObjectRef::direct(Primitive::Dictionary(Dictionary::new()), &PAGES);

        let first = obj.get(&doc, "Kids");
        assert_eq!(first, Primitive::Array(Vec::new()));
        // defaults are not written back ..
        assert!(obj.raw_get("Kids").is_none());
        // .. and each read gets its own copy
        if let Primitive::Array(mut kids) = first {
            kids.push(Primitive::Integer(1));
        }
        assert_eq!(obj.get(&doc, "Kids"), Primitive::Array(Vec::new()));
    }

    #[test]
    fn get_and_set_use_the_stream_dict() {
        let doc = Document::new();
        let mut info = Dictionary::new();
        info.insert("Length", Primitive::Integer(0));
        let obj = ObjectRef::direct(
            Primitive::Stream(PdfStream::new(info, Vec::<u8>::new())),
            &GENERIC,
        );
        obj.set(&doc, "N", Primitive::Integer(3)).unwrap();
        assert_eq!(obj.get(&doc, "N"), Primitive::Integer(3));
        assert_eq!(obj.get(&doc, "Length"), Primitive::Integer(0));

        // non-dictionary values have no keys
        let plain = ObjectRef::direct(Primitive::Integer(1), &GENERIC);
        assert!(plain.set(&doc, "N", Primitive::Integer(3)).is_err());
        assert_eq!(plain.get(&doc, "N"), Primitive::Null);
    }

    #[test]
    fn coercion_of_referenced_values_keeps_them_indirect() {
        let doc = Document::new();
        let date = doc.add(Primitive::String(PdfString::new(
            b"D:20200102120000Z".to_vec(),
        )));
        let info = ObjectRef::direct(Primitive::Dictionary(Dictionary::new()), &INFO);
        info.set(&doc, "CreationDate", Primitive::Reference(date.oid()))
            .unwrap();

        assert!(matches!(info.get(&doc, "CreationDate"), Primitive::Date(_)));
        // the reference stays; the coercion landed on the referenced object
        assert!(matches!(
            info.raw_get("CreationDate"),
            Some(Primitive::Reference(_))
        ));
        assert!(matches!(date.value(), Primitive::Date(_)));
        assert!(matches!(info.get(&doc, "CreationDate"), Primitive::Date(_)));
    }

    #[test]
    fn remove_entries() {
        let doc = Document::new();
        let obj = ObjectRef::direct(Primitive::Dictionary(Dictionary::new()), &GENERIC);
        obj.set(&doc, "A", Primitive::Integer(1)).unwrap();
        assert_eq!(obj.remove("Missing"), None);
        assert_eq!(obj.remove("A"), Some(Primitive::Integer(1)));
        assert!(obj.is_dirty());
        assert_eq!(obj.get(&doc, "A"), Primitive::Null);
    }
}

//! The document: object table, reference resolution and typed wrapping.

use crate::error::*;
use crate::object::{
    GenNr, ObjNr, ObjectRef, ObjectType, PlainRef, TypeTag, Validation, CATALOG, FILESPEC, GENERIC,
    INFO, PAGE, PAGES, TRAILER,
};
use crate::primitive::{Dictionary, PdfStream, Primitive};

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// A PDF version number, e.g. `1.7`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    pub const fn new(major: u8, minor: u8) -> Version {
        Version { major, minor }
    }
}
impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
impl FromStr for Version {
    type Err = PdfError;
    fn from_str(s: &str) -> Result<Version> {
        let (major, minor) = match s.split_once('.') {
            Some(parts) => parts,
            None => bail!("not a version string: {:?}", s),
        };
        Ok(Version::new(major.parse()?, minor.parse()?))
    }
}

/// Configuration consulted by the core. Set it up before creating documents;
/// it is read-only afterwards.
pub struct Config {
    /// zlib level used by the Flate encoder (0-9).
    pub flate_compression: u32,
    /// Whether writing a field with a higher `min_version` upgrades the
    /// document instead of failing.
    pub version_auto_upgrade: bool,
    type_map: HashMap<&'static str, &'static ObjectType>,
}

impl Default for Config {
    fn default() -> Config {
        let mut config = Config {
            flate_compression: 6,
            version_auto_upgrade: true,
            type_map: HashMap::new(),
        };
        config.register_type("Catalog", &CATALOG);
        config.register_type("Pages", &PAGES);
        config.register_type("Page", &PAGE);
        config.register_type("Filespec", &FILESPEC);
        config.register_type("Info", &INFO);
        config
    }
}

impl Config {
    pub fn register_type(&mut self, name: &'static str, class: &'static ObjectType) {
        self.type_map.insert(name, class);
    }
    pub fn class_for(&self, name: &str) -> Option<&'static ObjectType> {
        self.type_map.get(name).copied()
    }
}

struct Slot {
    gen: GenNr,
    object: ObjectRef,
    deleted: bool,
}

/// Owns all indirect objects of one PDF document and resolves references.
pub struct Document {
    objects: RefCell<BTreeMap<ObjNr, Slot>>,
    max_id: Cell<ObjNr>,
    version: Cell<Version>,
    trailer: ObjectRef,
    config: Config,
}

impl Default for Document {
    fn default() -> Document {
        Document::new()
    }
}

impl Document {
    pub fn new() -> Document {
        Document::with_config(Config::default())
    }
    pub fn with_config(config: Config) -> Document {
        Document {
            objects: RefCell::new(BTreeMap::new()),
            max_id: Cell::new(0),
            version: Cell::new(Version::new(1, 2)),
            trailer: ObjectRef::direct(Primitive::Dictionary(Dictionary::new()), &TRAILER),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn version(&self) -> Version {
        self.version.get()
    }
    pub fn set_version(&self, version: Version) {
        self.version.set(version);
    }
    /// Raises the document version to at least `min`, or fails when
    /// auto-upgrading is disabled. The version is never downgraded.
    pub(crate) fn request_version(&self, field: &str, min: Version) -> Result<()> {
        let current = self.version.get();
        if current < min {
            if !self.config.version_auto_upgrade {
                return Err(PdfError::VersionConflict {
                    field: field.into(),
                    required: min,
                    current,
                });
            }
            debug!("upgrading document version {} -> {} for /{}", current, min, field);
            self.version.set(min);
        }
        Ok(())
    }

    /// Stores `value` under a fresh object number.
    pub fn add(&self, value: Primitive) -> ObjectRef {
        let id = self.max_id.get() + 1;
        self.max_id.set(id);
        let oid = PlainRef::new(id, 0);
        let object = self.wrap_at(oid, value, None);
        self.objects.borrow_mut().insert(
            id,
            Slot {
                gen: 0,
                object: object.clone(),
                deleted: false,
            },
        );
        object
    }

    /// Parser hand-off: stores an `(objnum, gen, value)` tuple.
    pub fn insert(&self, oid: PlainRef, value: Primitive) -> ObjectRef {
        if oid.id > self.max_id.get() {
            self.max_id.set(oid.id);
        }
        let object = self.wrap_at(oid, value, None);
        self.objects.borrow_mut().insert(
            oid.id,
            Slot {
                gen: oid.gen,
                object: object.clone(),
                deleted: false,
            },
        );
        object
    }

    /// Creates a stream object, encoding `plain` through the filters named
    /// in `info` with the configured Flate compression level.
    pub fn create_stream(&self, info: Dictionary, plain: &[u8]) -> Result<ObjectRef> {
        let stream = PdfStream::from_plain_data(info, plain, self.config.flate_compression)?;
        Ok(self.add(Primitive::Stream(stream)))
    }

    /// Marks the slot deleted; later dereferences read Null.
    pub fn delete(&self, oid: PlainRef) {
        if let Some(slot) = self.objects.borrow_mut().get_mut(&oid.id) {
            if slot.gen == oid.gen {
                slot.deleted = true;
            }
        }
    }

    /// The live object stored under `r`, if any.
    pub fn object(&self, r: PlainRef) -> Option<ObjectRef> {
        let objects = self.objects.borrow();
        let slot = objects.get(&r.id)?;
        if slot.deleted || slot.gen != r.gen {
            return None;
        }
        Some(slot.object.clone())
    }

    /// Resolves a reference; anything else passes through. Dangling
    /// references read as Null.
    pub fn deref(&self, value: Primitive) -> Primitive {
        match value {
            Primitive::Reference(r) => self.deref_ref(r),
            v => v,
        }
    }
    pub fn deref_ref(&self, r: PlainRef) -> Primitive {
        self.object(r)
            .map(|o| o.value())
            .unwrap_or(Primitive::Null)
    }
    /// Like `deref`, but a dangling reference is an error.
    pub fn deref_strict(&self, value: &Primitive) -> Result<Primitive> {
        match value {
            Primitive::Reference(r) => self
                .object(*r)
                .map(|o| o.value())
                .ok_or(PdfError::NullRef { obj_nr: r.id }),
            v => Ok(v.clone()),
        }
    }

    /// Central factory: binds `value` to a typed-dictionary class. The hint
    /// wins over an existing binding, which wins over the /Type lookup.
    pub fn wrap(&self, value: Primitive, hint: Option<&TypeTag>) -> ObjectRef {
        self.wrap_at(PlainRef::DIRECT, value, hint)
    }

    fn wrap_at(&self, oid: PlainRef, value: Primitive, hint: Option<&TypeTag>) -> ObjectRef {
        let value = self.deref(value);
        let class = self.class_of(&value, hint);
        ObjectRef::create(oid, value, class)
    }

    fn class_of(&self, value: &Primitive, hint: Option<&TypeTag>) -> &'static ObjectType {
        let dict = match value {
            Primitive::Dictionary(d) => Some(d),
            Primitive::Stream(s) => Some(&s.info),
            _ => None,
        };
        if let Some(&TypeTag::Class(name)) = hint {
            if let Some(class) = self.config.class_for(name) {
                return class;
            }
        }
        if let Some(class) = dict.and_then(|d| d.class()) {
            return class;
        }
        if let Some(Primitive::Name(n)) = dict.and_then(|d| d.get("Type")) {
            if let Some(class) = self.config.class_for(n.as_str()) {
                return class;
            }
        }
        &GENERIC
    }

    /// All stored objects; `current: false` includes deleted slots.
    pub fn each(&self, current: bool) -> impl Iterator<Item = ObjectRef> {
        let objects: Vec<ObjectRef> = self
            .objects
            .borrow()
            .values()
            .filter(|slot| !current || !slot.deleted)
            .map(|slot| slot.object.clone())
            .collect();
        objects.into_iter()
    }

    /// Current objects whose /Type (or class default) matches `name`.
    pub fn iter_type(&self, name: &str) -> impl Iterator<Item = ObjectRef> {
        let want = name.to_owned();
        self.each(true)
            .filter(move |o| o.pdf_type().map_or(false, |t| t.as_str() == want))
    }

    pub fn trailer(&self) -> ObjectRef {
        self.trailer.clone()
    }
    pub fn set_trailer(&self, dict: Dictionary) {
        self.trailer.set_value(Primitive::Dictionary(dict));
    }

    /// The document catalog the trailer's /Root points to.
    pub fn catalog(&self) -> Result<ObjectRef> {
        // force coercion so the target object is typed
        let value = self.trailer.get(self, "Root");
        match self.trailer.raw_get("Root") {
            Some(Primitive::Reference(r)) => {
                self.object(r).ok_or(PdfError::NullRef { obj_nr: r.id })
            }
            Some(Primitive::Dictionary(_)) => {
                Ok(self.wrap(value, Some(&TypeTag::Class("Catalog"))))
            }
            Some(p) => Err(PdfError::UnexpectedPrimitive {
                expected: "Dictionary",
                found: p.get_debug_name(),
            }),
            None => Err(PdfError::MissingEntry {
                typ: "Trailer",
                field: "Root".into(),
            }),
        }
    }

    /// Validates the trailer and every current object.
    pub fn validate(&self, auto_correct: bool) -> Validation {
        let mut result = self.trailer.validate(self, auto_correct);
        for object in self.each(true) {
            result.merge(object.validate(self, auto_correct));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Indirect;
    use crate::primitive::{Name, PdfString};

    fn dict(entries: &[(&str, Primitive)]) -> Primitive {
        let mut d = Dictionary::new();
        for (k, v) in entries {
            d.insert(Name::from(*k), v.clone());
        }
        Primitive::Dictionary(d)
    }

    #[test]
    fn version_parsing_and_ordering() {
        let v: Version = "1.5".parse().unwrap();
        assert_eq!(v, Version::new(1, 5));
        assert_eq!(v.to_string(), "1.5");
        assert!(Version::new(1, 4) < v);
        assert!("15".parse::<Version>().is_err());
        assert!("a.b".parse::<Version>().is_err());
    }

    #[test]
    fn add_allocates_increasing_object_numbers() {
        let doc = Document::new();
        let a = doc.add(Primitive::Integer(1));
        let b = doc.add(Primitive::Integer(2));
        assert_eq!(a.oid(), PlainRef::new(1, 0));
        assert_eq!(b.oid(), PlainRef::new(2, 0));
        assert!(b.is_indirect());
    }

    #[test]
    fn deref_of_deleted_or_missing_reads_null() {
        let doc = Document::new();
        let obj = doc.add(Primitive::Integer(7));
        let r = obj.oid();
        assert_eq!(doc.deref(Primitive::Reference(r)), Primitive::Integer(7));

        doc.delete(r);
        assert_eq!(doc.deref(Primitive::Reference(r)), Primitive::Null);
        assert_eq!(
            doc.deref(Primitive::Reference(PlainRef::new(99, 0))),
            Primitive::Null
        );
        // wrong generation dangles as well
        let obj = doc.add(Primitive::Integer(8));
        let stale = PlainRef::new(obj.oid().id, 5);
        assert_eq!(doc.deref(Primitive::Reference(stale)), Primitive::Null);

        assert!(doc.deref_strict(&Primitive::Reference(r)).is_err());
    }

    #[test]
    fn each_and_iter_type() {
        let doc = Document::new();
        doc.add(dict(&[("Type", Primitive::name("Page"))]));
        doc.add(dict(&[("Type", Primitive::name("Page"))]));
        let pages = doc.add(dict(&[("Type", Primitive::name("Pages"))]));
        doc.delete(pages.oid());

        assert_eq!(doc.each(true).count(), 2);
        assert_eq!(doc.each(false).count(), 3);
        assert_eq!(doc.iter_type("Page").count(), 2);
        assert_eq!(doc.iter_type("Pages").count(), 0);
    }

    #[test]
    fn wrap_picks_class_from_type_key() {
        let doc = Document::new();
        let obj = doc.add(dict(&[("Type", Primitive::name("Catalog"))]));
        assert_eq!(obj.class().name, "Catalog");
        assert_eq!(obj.pdf_type().unwrap().as_str(), "Catalog");

        // unknown /Type falls back to the generic class
        let obj = doc.add(dict(&[("Type", Primitive::name("Widget"))]));
        assert_eq!(obj.class().name, "Dictionary");
    }

    #[test]
    fn wrap_keeps_exact_class_and_honors_hint() {
        let doc = Document::new();
        let wrapped = doc.wrap(dict(&[]), Some(&TypeTag::Class("Filespec")));
        assert_eq!(wrapped.class().name, "Filespec");

        // re-wrapping an already bound dictionary keeps the binding
        let again = doc.wrap(wrapped.value(), None);
        assert_eq!(again.class().name, "Filespec");
    }

    #[test]
    fn version_upgrade_on_write() {
        let doc = Document::new();
        doc.set_version(Version::new(1, 3));
        let catalog = doc.add(dict(&[("Type", Primitive::name("Catalog"))]));
        catalog
            .set(&doc, "OCProperties", dict(&[]))
            .unwrap();
        assert_eq!(doc.version(), Version::new(1, 5));

        // writes never downgrade
        catalog
            .set(&doc, "Lang", Primitive::String(PdfString::from_text("en")))
            .unwrap();
        assert_eq!(doc.version(), Version::new(1, 5));
    }

    #[test]
    fn pinned_version_conflicts() {
        let mut config = Config::default();
        config.version_auto_upgrade = false;
        let doc = Document::with_config(config);
        doc.set_version(Version::new(1, 3));
        let catalog = doc.add(dict(&[("Type", Primitive::name("Catalog"))]));
        let err = catalog.set(&doc, "OCProperties", dict(&[])).unwrap_err();
        assert!(matches!(err, PdfError::VersionConflict { .. }));
        assert_eq!(doc.version(), Version::new(1, 3));
    }

    #[test]
    fn set_rejects_wrong_types() {
        let doc = Document::new();
        let catalog = doc.add(dict(&[("Type", Primitive::name("Catalog"))]));
        let err = catalog
            .set(&doc, "Pages", Primitive::Integer(3))
            .unwrap_err();
        assert!(matches!(
            err,
            PdfError::TypeMismatch { typ: "Catalog", .. }
        ));
        // a reference passes; it is only checked on validation
        catalog
            .set(&doc, "Pages", Primitive::Reference(PlainRef::new(42, 0)))
            .unwrap();
    }

    #[test]
    fn catalog_validation_auto_corrects_missing_pages() {
        let doc = Document::new();
        let catalog = doc.add(dict(&[("Type", Primitive::name("Catalog"))]));

        let result = catalog.validate(&doc, false);
        assert!(!result.ok);
        assert!(result
            .messages
            .iter()
            .any(|m| m.contains("/Pages") && m.contains("missing")));

        let result = catalog.validate(&doc, true);
        assert!(result.ok);

        // /Pages now is an indirect Pages-typed object
        let pages_field = catalog.class().field("Pages").unwrap();
        assert_eq!(pages_field.indirect(), Indirect::Must);
        assert!(matches!(
            catalog.raw_get("Pages"),
            Some(Primitive::Reference(_))
        ));
        match catalog.get(&doc, "Pages") {
            Primitive::Dictionary(d) => {
                assert_eq!(d.class().unwrap().name, "Pages");
                assert_eq!(d.get("Count"), Some(&Primitive::Integer(0)));
                assert_eq!(d.get("Kids"), Some(&Primitive::Array(Vec::new())));
            }
            p => panic!("expected a dictionary, got {}", p.get_debug_name()),
        }
        assert!(catalog.validate(&doc, false).ok);
    }

    #[test]
    fn validation_moves_direct_values_behind_references() {
        let doc = Document::new();
        let catalog = doc.add(dict(&[
            ("Type", Primitive::name("Catalog")),
            ("Pages", dict(&[("Type", Primitive::name("Pages"))])),
        ]));
        let result = catalog.validate(&doc, false);
        assert!(!result.ok);

        let result = catalog.validate(&doc, true);
        assert!(result.ok, "{:?}", result.messages);
        let r = match catalog.raw_get("Pages") {
            Some(Primitive::Reference(r)) => r,
            other => panic!("expected a reference, got {:?}", other),
        };
        let pages = doc.object(r).unwrap();
        assert!(pages.must_be_indirect());
    }

    #[test]
    fn create_stream_compresses_with_the_configured_level() {
        let doc = Document::new();
        let mut info = Dictionary::new();
        info.insert("Filter", Primitive::name("FlateDecode"));
        let obj = doc.create_stream(info, b"stream payload").unwrap();
        assert!(obj.must_be_indirect());

        let stream = obj.value().into_stream().unwrap();
        assert_ne!(stream.source().bytes().unwrap(), b"stream payload");
        assert_eq!(stream.decoded_data().unwrap(), b"stream payload");
    }

    #[test]
    fn trailer_and_catalog_access() {
        let doc = Document::new();
        assert!(doc.catalog().is_err());

        let pages = doc.add(dict(&[("Type", Primitive::name("Pages"))]));
        let root = doc.add(dict(&[
            ("Type", Primitive::name("Catalog")),
            ("Pages", Primitive::Reference(pages.oid())),
        ]));
        let mut trailer = Dictionary::new();
        trailer.insert("Root", Primitive::Reference(root.oid()));
        doc.set_trailer(trailer);

        let catalog = doc.catalog().unwrap();
        assert_eq!(catalog.oid(), root.oid());
        assert_eq!(catalog.class().name, "Catalog");
    }

    #[test]
    fn document_validate_covers_trailer() {
        let doc = Document::new();
        let result = doc.validate(false);
        assert!(!result.ok); // the trailer wants a /Root

        let result = doc.validate(true);
        assert!(result.ok, "{:?}", result.messages);
        let catalog = doc.catalog().unwrap();
        assert_eq!(catalog.class().name, "Catalog");
        assert!(catalog.raw_get("Pages").is_some());
    }
}

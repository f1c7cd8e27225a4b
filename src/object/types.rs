//! Built-in typed dictionary classes.

use super::{Field, ObjectType};
use super::TypeTag::*;
use crate::document::Version;
use crate::primitive::Primitive;

/// Wrap fallback for dictionaries of no particular type.
pub static GENERIC: ObjectType = ObjectType {
    name: "Dictionary",
    base: None,
    fields: &[],
    type_name: None,
};

static CATALOG_FIELDS: [Field; 7] = [
    Field::new("Type", &[Name])
        .require()
        .with_default(|| Primitive::name("Catalog")),
    Field::new("Version", &[Name]).since(Version::new(1, 4)),
    Field::new("Pages", &[Class("Pages")]).require().must_be_indirect(),
    Field::new("Outlines", &[Dictionary]).must_be_indirect(),
    Field::new("Metadata", &[Stream])
        .must_be_indirect()
        .since(Version::new(1, 4)),
    Field::new("Lang", &[String]).since(Version::new(1, 4)),
    Field::new("OCProperties", &[Dictionary]).since(Version::new(1, 5)),
];

pub static CATALOG: ObjectType = ObjectType {
    name: "Catalog",
    base: Some(&GENERIC),
    type_name: Some("Catalog"),
    fields: &CATALOG_FIELDS,
};

static PAGES_FIELDS: [Field; 6] = [
    Field::new("Type", &[Name])
        .require()
        .with_default(|| Primitive::name("Pages")),
    Field::new("Parent", &[Class("Pages")]).must_be_indirect(),
    Field::new("Kids", &[Array])
        .require()
        .with_default(|| Primitive::Array(Vec::new())),
    Field::new("Count", &[Integer])
        .require()
        .with_default(|| Primitive::Integer(0)),
    Field::new("MediaBox", &[Rectangle]),
    Field::new("Resources", &[Dictionary]),
];

pub static PAGES: ObjectType = ObjectType {
    name: "Pages",
    base: Some(&GENERIC),
    type_name: Some("Pages"),
    fields: &PAGES_FIELDS,
};

static PAGE_FIELDS: [Field; 9] = [
    Field::new("Type", &[Name])
        .require()
        .with_default(|| Primitive::name("Page")),
    Field::new("Parent", &[Class("Pages")]).require().must_be_indirect(),
    Field::new("LastModified", &[Date]).since(Version::new(1, 3)),
    Field::new("Resources", &[Dictionary]),
    Field::new("MediaBox", &[Rectangle]),
    Field::new("CropBox", &[Rectangle]),
    Field::new("Contents", &[Stream, Array]),
    Field::new("Rotate", &[Integer]).with_default(|| Primitive::Integer(0)),
    Field::new("Annots", &[Array]),
];

pub static PAGE: ObjectType = ObjectType {
    name: "Page",
    base: Some(&GENERIC),
    type_name: Some("Page"),
    fields: &PAGE_FIELDS,
};

static FILESPEC_FIELDS: [Field; 6] = [
    Field::new("Type", &[Name]).with_default(|| Primitive::name("Filespec")),
    Field::new("FS", &[Name]),
    Field::new("F", &[String]),
    Field::new("UF", &[String]).since(Version::new(1, 7)),
    Field::new("EF", &[Dictionary]).since(Version::new(1, 3)),
    Field::new("Desc", &[String]).since(Version::new(1, 6)),
];

pub static FILESPEC: ObjectType = ObjectType {
    name: "Filespec",
    base: Some(&GENERIC),
    type_name: Some("Filespec"),
    fields: &FILESPEC_FIELDS,
};

static INFO_FIELDS: [Field; 9] = [
    Field::new("Title", &[String]).since(Version::new(1, 1)),
    Field::new("Author", &[String]),
    Field::new("Subject", &[String]).since(Version::new(1, 1)),
    Field::new("Keywords", &[String]).since(Version::new(1, 1)),
    Field::new("Creator", &[String]),
    Field::new("Producer", &[String]),
    Field::new("CreationDate", &[Date]),
    Field::new("ModDate", &[Date]),
    Field::new("Trapped", &[Name]).since(Version::new(1, 3)),
];

pub static INFO: ObjectType = ObjectType {
    name: "Info",
    base: Some(&GENERIC),
    type_name: None,
    fields: &INFO_FIELDS,
};

static TRAILER_FIELDS: [Field; 6] = [
    Field::new("Size", &[Integer]),
    Field::new("Prev", &[Integer]),
    Field::new("Root", &[Class("Catalog")]).require().must_be_indirect(),
    Field::new("Encrypt", &[Dictionary]),
    Field::new("Info", &[Class("Info")]).must_be_indirect(),
    Field::new("ID", &[Array]),
];

pub static TRAILER: ObjectType = ObjectType {
    name: "Trailer",
    base: Some(&GENERIC),
    type_name: None,
    fields: &TRAILER_FIELDS,
};

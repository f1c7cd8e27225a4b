//! Drives the object model the way a parser and serializer would: raw
//! `(objnum, gen, value)` tuples go in, typed access and decoded stream
//! payloads come out.

use pdf_model::document::Document;
use pdf_model::object::PlainRef;
use pdf_model::primitive::{Dictionary, Name, PdfStream, PdfString, Primitive};

fn name(s: &str) -> Primitive {
    Primitive::name(s)
}
fn reference(id: u64) -> Primitive {
    Primitive::Reference(PlainRef::new(id, 0))
}
fn dict(entries: Vec<(&str, Primitive)>) -> Dictionary {
    let mut d = Dictionary::new();
    for (k, v) in entries {
        d.insert(Name::from(k), v);
    }
    d
}

const CONTENT: &[u8] = b"BT /F1 12 Tf 72 712 Td (Hello, world!) Tj ET";

fn load_sample() -> Document {
    let doc = Document::new();

    doc.insert(
        PlainRef::new(1, 0),
        Primitive::Dictionary(dict(vec![
            ("Type", name("Catalog")),
            ("Pages", reference(2)),
        ])),
    );
    doc.insert(
        PlainRef::new(2, 0),
        Primitive::Dictionary(dict(vec![
            ("Type", name("Pages")),
            ("Kids", Primitive::Array(vec![reference(3)])),
            ("Count", Primitive::Integer(1)),
        ])),
    );
    doc.insert(
        PlainRef::new(3, 0),
        Primitive::Dictionary(dict(vec![
            ("Type", name("Page")),
            ("Parent", reference(2)),
            (
                "MediaBox",
                Primitive::Array(vec![
                    Primitive::Integer(0),
                    Primitive::Integer(0),
                    Primitive::Integer(612),
                    Primitive::Integer(792),
                ]),
            ),
            ("Contents", reference(4)),
        ])),
    );

    let stream_info = dict(vec![("Filter", name("FlateDecode"))]);
    let stream = PdfStream::from_plain_data(stream_info, CONTENT, 6).unwrap();
    doc.insert(PlainRef::new(4, 0), Primitive::Stream(stream));

    doc.insert(
        PlainRef::new(5, 0),
        Primitive::Dictionary(dict(vec![(
            "Title",
            Primitive::String(PdfString::new(vec![
                0xfe, 0xff, 0x00, 0x74, 0x00, 0x65, 0x00, 0x73, 0x00, 0x74,
            ])),
        )])),
    );

    doc.set_trailer(dict(vec![
        ("Root", reference(1)),
        ("Info", reference(5)),
        ("Size", Primitive::Integer(6)),
    ]));
    doc
}

#[test]
fn typed_traversal_from_the_trailer() {
    let doc = load_sample();

    let catalog = doc.catalog().unwrap();
    assert_eq!(catalog.class().name, "Catalog");
    assert_eq!(catalog.oid(), PlainRef::new(1, 0));

    let pages = doc.wrap(catalog.get(&doc, "Pages"), None);
    assert_eq!(pages.class().name, "Pages");
    assert_eq!(pages.get(&doc, "Count"), Primitive::Integer(1));

    let kids = pages.get(&doc, "Kids");
    let first = kids.as_array().unwrap()[0].clone();
    let page = doc.wrap(doc.deref(first), None);
    assert_eq!(page.class().name, "Page");

    match page.get(&doc, "MediaBox") {
        Primitive::Rectangle(r) => {
            assert_eq!(r.width(), 612.0);
            assert_eq!(r.height(), 792.0);
        }
        p => panic!("expected a rectangle, got {}", p.get_debug_name()),
    }
    // the rotation comes from the schema default
    assert_eq!(page.get(&doc, "Rotate"), Primitive::Integer(0));
}

#[test]
fn content_stream_decodes_through_the_filter_chain() {
    let doc = load_sample();
    let page = doc.object(PlainRef::new(3, 0)).unwrap();

    let contents = page.get(&doc, "Contents").into_stream().unwrap();
    assert_ne!(contents.source().bytes().unwrap(), CONTENT);
    assert_eq!(contents.decoded_data().unwrap(), CONTENT);

    // chunked reading yields the same bytes
    let mut producer = contents.decoded_producer(3).unwrap();
    let mut out = Vec::new();
    while let Some(chunk) = producer.resume().unwrap() {
        out.extend_from_slice(&chunk);
    }
    assert_eq!(out, CONTENT);
}

#[test]
fn info_strings_decode_lazily() {
    let doc = load_sample();

    // reading /Info through the trailer types the referenced object in place
    let value = doc.trailer().get(&doc, "Info");
    assert_eq!(value.as_dict().unwrap().class().unwrap().name, "Info");

    let info = doc.object(PlainRef::new(5, 0)).unwrap();
    assert_eq!(info.class().name, "Info");
    match info.get(&doc, "Title") {
        Primitive::String(s) => {
            assert!(!s.is_binary());
            assert_eq!(s.as_str().unwrap(), "test");
        }
        p => panic!("expected a string, got {}", p.get_debug_name()),
    }

    // the decoded text was memoized into the stored dictionary
    match info.raw_get("Title") {
        Some(Primitive::String(s)) => assert!(!s.is_binary()),
        other => panic!("unexpected /Title: {:?}", other),
    }
}

#[test]
fn sample_document_validates() {
    let doc = load_sample();
    let result = doc.validate(false);
    assert!(result.ok, "{:?}", result.messages);
}

#[test]
fn deleting_a_page_leaves_a_dangling_reference() {
    let doc = load_sample();
    doc.delete(PlainRef::new(3, 0));

    let pages = doc.wrap(doc.deref(reference(2)), None);
    let kids = pages.get(&doc, "Kids");
    let first = kids.as_array().unwrap()[0].clone();
    assert_eq!(doc.deref(first), Primitive::Null);

    assert_eq!(doc.iter_type("Page").count(), 0);
    assert_eq!(doc.each(true).count(), 4);
    assert_eq!(doc.each(false).count(), 5);
}

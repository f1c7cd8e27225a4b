//! In-memory PDF object model: primitives, typed dictionaries with field
//! schemas, indirect objects and the stream filter pipeline.
//!
//! Parsing and serializing PDF syntax is out of scope; the parser feeds
//! `(objnum, gen, value)` tuples into [`document::Document::insert`] and a
//! serializer walks [`document::Document::each`], driving stream producers
//! to completion.

#[macro_use]
extern crate snafu;
#[macro_use]
extern crate log;

#[macro_use]
pub mod error;
pub mod document;
pub mod enc;
pub mod encoding;
pub mod object;
pub mod primitive;

pub use crate::document::{Config, Document, Version};
pub use crate::error::PdfError;

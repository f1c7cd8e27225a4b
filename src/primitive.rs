use crate::enc::{self, Producer, StreamFilter, DEFAULT_CHUNK_SIZE};
use crate::error::*;
use crate::object::{ObjectType, PlainRef};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::{map, IndexMap};
use istring::SmallString;
use itertools::Itertools;

use std::borrow::{Borrow, Cow};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::rc::Rc;
use std::str;

macro_rules! unexpected_primitive {
    ($expected:ident, $found:expr) => {
        Err(PdfError::UnexpectedPrimitive {
            expected: stringify!($expected),
            found: $found,
        })
    };
}

#[derive(Clone, Debug)]
pub enum Primitive {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Name(Name),
    String(PdfString),
    Array(Vec<Primitive>),
    Dictionary(Dictionary),
    Stream(PdfStream),
    Reference(PlainRef),
    // the two forms below exist only in memory: field coercion produces them
    // from String and Array values
    Date(DateTime<FixedOffset>),
    Rectangle(Rectangle),
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Primitive::Null => write!(f, "null"),
            Primitive::Boolean(b) => b.fmt(f),
            Primitive::Integer(i) => i.fmt(f),
            Primitive::Real(n) => n.fmt(f),
            Primitive::Name(ref n) => n.fmt(f),
            Primitive::String(ref s) => write!(f, "{:?}", s),
            Primitive::Array(ref arr) => write!(f, "[{}]", arr.iter().format(", ")),
            Primitive::Dictionary(ref d) => d.fmt(f),
            Primitive::Stream(_) => write!(f, "stream"),
            Primitive::Reference(r) => write!(f, "@{}", r.id),
            Primitive::Date(ref d) => write!(f, "({})", format_datetime(d)),
            Primitive::Rectangle(ref r) => r.fmt(f),
        }
    }
}

impl PartialEq for Primitive {
    fn eq(&self, other: &Primitive) -> bool {
        match (self, other) {
            (Primitive::Null, Primitive::Null) => true,
            (Primitive::Boolean(a), Primitive::Boolean(b)) => a == b,
            // Integer and Real are distinct even at equal numeric value
            (Primitive::Integer(a), Primitive::Integer(b)) => a == b,
            (Primitive::Real(a), Primitive::Real(b)) => a == b,
            (Primitive::Name(a), Primitive::Name(b)) => a == b,
            (Primitive::String(a), Primitive::String(b)) => a == b,
            (Primitive::Array(a), Primitive::Array(b)) => a == b,
            (Primitive::Dictionary(a), Primitive::Dictionary(b)) => a == b,
            (Primitive::Stream(a), Primitive::Stream(b)) => a == b,
            (Primitive::Reference(a), Primitive::Reference(b)) => a == b,
            (Primitive::Date(a), Primitive::Date(b)) => a == b,
            (Primitive::Rectangle(a), Primitive::Rectangle(b)) => a == b,
            _ => false,
        }
    }
}

impl Primitive {
    pub fn name(name: impl Into<Name>) -> Primitive {
        Primitive::Name(name.into())
    }
    pub fn string(s: &str) -> Primitive {
        Primitive::String(PdfString::from_text(s))
    }
    /// For debugging / error messages: get the name of the variant
    pub fn get_debug_name(&self) -> &'static str {
        match *self {
            Primitive::Null => "Null",
            Primitive::Boolean(..) => "Boolean",
            Primitive::Integer(..) => "Integer",
            Primitive::Real(..) => "Real",
            Primitive::Name(..) => "Name",
            Primitive::String(..) => "String",
            Primitive::Array(..) => "Array",
            Primitive::Dictionary(..) => "Dictionary",
            Primitive::Stream(..) => "Stream",
            Primitive::Reference(..) => "Reference",
            Primitive::Date(..) => "Date",
            Primitive::Rectangle(..) => "Rectangle",
        }
    }
    pub fn is_null(&self) -> bool {
        matches!(*self, Primitive::Null)
    }
    pub fn as_integer(&self) -> Result<i64> {
        match *self {
            Primitive::Integer(n) => Ok(n),
            ref p => unexpected_primitive!(Integer, p.get_debug_name()),
        }
    }
    pub fn as_number(&self) -> Result<f64> {
        match *self {
            Primitive::Integer(n) => Ok(n as f64),
            Primitive::Real(f) => Ok(f),
            ref p => unexpected_primitive!(Number, p.get_debug_name()),
        }
    }
    pub fn as_bool(&self) -> Result<bool> {
        match *self {
            Primitive::Boolean(b) => Ok(b),
            ref p => unexpected_primitive!(Boolean, p.get_debug_name()),
        }
    }
    pub fn as_name(&self) -> Result<&str> {
        match self {
            Primitive::Name(ref name) => Ok(name.as_str()),
            p => unexpected_primitive!(Name, p.get_debug_name()),
        }
    }
    pub fn as_string(&self) -> Result<&PdfString> {
        match self {
            Primitive::String(ref s) => Ok(s),
            p => unexpected_primitive!(String, p.get_debug_name()),
        }
    }
    pub fn as_array(&self) -> Result<&[Primitive]> {
        match self {
            Primitive::Array(ref v) => Ok(v),
            p => unexpected_primitive!(Array, p.get_debug_name()),
        }
    }
    pub fn as_dict(&self) -> Result<&Dictionary> {
        match self {
            Primitive::Dictionary(ref d) => Ok(d),
            p => unexpected_primitive!(Dictionary, p.get_debug_name()),
        }
    }
    pub fn into_reference(self) -> Result<PlainRef> {
        match self {
            Primitive::Reference(id) => Ok(id),
            p => unexpected_primitive!(Reference, p.get_debug_name()),
        }
    }
    pub fn into_array(self) -> Result<Vec<Primitive>> {
        match self {
            Primitive::Array(v) => Ok(v),
            p => unexpected_primitive!(Array, p.get_debug_name()),
        }
    }
    pub fn into_dictionary(self) -> Result<Dictionary> {
        match self {
            Primitive::Dictionary(d) => Ok(d),
            p => unexpected_primitive!(Dictionary, p.get_debug_name()),
        }
    }
    pub fn into_name(self) -> Result<Name> {
        match self {
            Primitive::Name(name) => Ok(name),
            p => unexpected_primitive!(Name, p.get_debug_name()),
        }
    }
    pub fn into_string(self) -> Result<PdfString> {
        match self {
            Primitive::String(s) => Ok(s),
            p => unexpected_primitive!(String, p.get_debug_name()),
        }
    }
    pub fn into_stream(self) -> Result<PdfStream> {
        match self {
            Primitive::Stream(s) => Ok(s),
            p => unexpected_primitive!(Stream, p.get_debug_name()),
        }
    }
}

/// A PDF name. Two names are equal iff their byte sequences are equal.
#[derive(Clone)]
pub struct Name(SmallString);

impl Name {
    pub fn as_str(&self) -> &str {
        &self.0
    }
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}
impl PartialEq for Name {
    fn eq(&self, rhs: &Name) -> bool {
        self.as_bytes() == rhs.as_bytes()
    }
}
impl Eq for Name {}
impl PartialEq<str> for Name {
    fn eq(&self, rhs: &str) -> bool {
        self.as_str() == rhs
    }
}
impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // must agree with str hashing so dictionaries can be indexed by &str
        self.as_str().hash(state)
    }
}
impl Borrow<str> for Name {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}
impl Deref for Name {
    type Target = str;
    fn deref(&self) -> &str {
        self.as_str()
    }
}
impl From<&str> for Name {
    fn from(s: &str) -> Name {
        Name(SmallString::from(s))
    }
}
impl From<String> for Name {
    fn from(s: String) -> Name {
        Name(SmallString::from(s.as_str()))
    }
}
impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "/{}", self.as_str())
    }
}
impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "/{}", self.as_str())
    }
}

/// Primitive Dictionary type. Keys are names, insertion order is kept.
///
/// A dictionary may be bound to a typed-dictionary class by
/// `Document::wrap`; the binding never takes part in equality.
#[derive(Default, Clone)]
pub struct Dictionary {
    dict: IndexMap<Name, Primitive>,
    class: Option<&'static ObjectType>,
}

impl Dictionary {
    pub fn new() -> Dictionary {
        Dictionary::default()
    }
    pub fn len(&self) -> usize {
        self.dict.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn get(&self, key: &str) -> Option<&Primitive> {
        self.dict.get(key)
    }
    pub fn contains_key(&self, key: &str) -> bool {
        self.dict.contains_key(key)
    }
    pub fn insert(&mut self, key: impl Into<Name>, val: Primitive) -> Option<Primitive> {
        self.dict.insert(key.into(), val)
    }
    pub fn remove(&mut self, key: &str) -> Option<Primitive> {
        self.dict.shift_remove(key)
    }
    pub fn iter(&self) -> map::Iter<Name, Primitive> {
        self.dict.iter()
    }
    pub fn keys(&self) -> map::Keys<Name, Primitive> {
        self.dict.keys()
    }
    /// The typed-dictionary class this dictionary is bound to, if any.
    pub fn class(&self) -> Option<&'static ObjectType> {
        self.class
    }
    pub(crate) fn bind_class(&mut self, class: &'static ObjectType) {
        self.class = Some(class);
    }
}
impl PartialEq for Dictionary {
    fn eq(&self, rhs: &Dictionary) -> bool {
        // key sets and per-key values; iteration order does not matter
        self.dict == rhs.dict
    }
}
impl fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{{")?;
        for (k, v) in self {
            writeln!(f, "{:>15}: {}", k, v)?;
        }
        write!(f, "}}")
    }
}
impl fmt::Display for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<{}>",
            self.iter()
                .format_with(", ", |(k, v), f| f(&format_args!("{}={}", k, v)))
        )
    }
}
impl IntoIterator for Dictionary {
    type Item = (Name, Primitive);
    type IntoIter = map::IntoIter<Name, Primitive>;
    fn into_iter(self) -> Self::IntoIter {
        self.dict.into_iter()
    }
}
impl<'a> IntoIterator for &'a Dictionary {
    type Item = (&'a Name, &'a Primitive);
    type IntoIter = map::Iter<'a, Name, Primitive>;
    fn into_iter(self) -> Self::IntoIter {
        self.dict.iter()
    }
}

/// Primitive String type: uninterpreted octets.
///
/// Strings handed over by the parser are binary; the field schema decides at
/// access time whether they become UTF-8 text.
#[derive(Clone, PartialEq)]
pub struct PdfString {
    data: Vec<u8>,
    binary: bool,
}

impl PdfString {
    /// A binary (not yet interpreted) string.
    pub fn new(data: Vec<u8>) -> PdfString {
        PdfString { data, binary: true }
    }
    /// An already decoded text string; the bytes are valid UTF-8.
    pub fn from_text(s: impl Into<String>) -> PdfString {
        PdfString {
            data: s.into().into_bytes(),
            binary: false,
        }
    }
    pub fn is_binary(&self) -> bool {
        self.binary
    }
    pub(crate) fn force_binary(&self) -> PdfString {
        PdfString::new(self.data.clone())
    }
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
    pub fn as_str(&self) -> Result<Cow<str>> {
        if self.data.starts_with(&[0xfe, 0xff]) {
            let utf16: Vec<u16> = self.data[2..]
                .chunks(2)
                .map(|c| (c[0] as u16) << 8 | c.get(1).copied().unwrap_or(0) as u16)
                .collect();
            Ok(Cow::Owned(String::from_utf16(&utf16)?))
        } else {
            Ok(Cow::Borrowed(str::from_utf8(&self.data)?))
        }
    }
}
impl fmt::Debug for PdfString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"")?;
        for &b in &self.data {
            match b {
                b'"' => write!(f, "\\\"")?,
                b' '..=b'~' => write!(f, "{}", b as char)?,
                o @ 0..=7 => write!(f, "\\{}", o)?,
                x => write!(f, "\\x{:02x}", x)?,
            }
        }
        write!(f, "\"")
    }
}
impl AsRef<[u8]> for PdfString {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Where a stream gets its (encoded) bytes from: either an in-memory buffer
/// or a restartable producer, e.g. backed by a file section.
#[derive(Clone)]
pub enum StreamSource {
    Data(Rc<[u8]>),
    Producer(Rc<dyn Fn() -> Box<dyn Producer>>),
}

impl StreamSource {
    /// Start reading the source from the beginning.
    pub fn open(&self, chunk_size: usize) -> Box<dyn Producer> {
        match self {
            StreamSource::Data(data) => Box::new(enc::DataChunks::new(data.clone(), chunk_size)),
            StreamSource::Producer(f) => f(),
        }
    }
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            StreamSource::Data(data) => Some(data),
            StreamSource::Producer(_) => None,
        }
    }
}
impl From<Vec<u8>> for StreamSource {
    fn from(data: Vec<u8>) -> StreamSource {
        StreamSource::Data(data.into())
    }
}
impl PartialEq for StreamSource {
    fn eq(&self, rhs: &StreamSource) -> bool {
        match (self, rhs) {
            (StreamSource::Data(a), StreamSource::Data(b)) => a == b,
            (StreamSource::Producer(a), StreamSource::Producer(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}
impl fmt::Debug for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StreamSource::Data(d) => write!(f, "StreamSource::Data({} bytes)", d.len()),
            StreamSource::Producer(_) => write!(f, "StreamSource::Producer"),
        }
    }
}

/// Primitive Stream type: a dictionary plus a payload source.
#[derive(Clone, Debug, PartialEq)]
pub struct PdfStream {
    pub info: Dictionary,
    data: StreamSource,
}

impl PdfStream {
    pub fn new(info: Dictionary, data: impl Into<StreamSource>) -> PdfStream {
        PdfStream {
            info,
            data: data.into(),
        }
    }

    /// Encodes `plain` through the filters named in `info` and stores the
    /// result as the stream's payload.
    pub fn from_plain_data(info: Dictionary, plain: &[u8], compression: u32) -> Result<PdfStream> {
        let mut producer: Box<dyn Producer> =
            Box::new(enc::DataChunks::new(plain.to_vec().into(), DEFAULT_CHUNK_SIZE));
        // filters apply in reverse declaration order when encoding
        for filter in filters_from(&info)?.iter().rev() {
            producer = enc::encoder(producer, filter, compression)?;
        }
        let data = enc::drain(producer.as_mut())?;
        Ok(PdfStream::new(info, data))
    }

    pub fn source(&self) -> &StreamSource {
        &self.data
    }
    pub fn raw_producer(&self, chunk_size: usize) -> Box<dyn Producer> {
        self.data.open(chunk_size)
    }

    /// The filter chain declared by /Filter and /DecodeParms.
    pub fn filters(&self) -> Result<Vec<StreamFilter>> {
        filters_from(&self.info)
    }

    /// A producer yielding the decoded payload, chunk by chunk.
    pub fn decoded_producer(&self, chunk_size: usize) -> Result<Box<dyn Producer>> {
        let mut producer = self.data.open(chunk_size);
        for filter in self.filters()? {
            producer = enc::decoder(producer, &filter)?;
        }
        Ok(producer)
    }

    /// Drives the decode chain to completion.
    pub fn decoded_data(&self) -> Result<Vec<u8>> {
        let mut producer = self.decoded_producer(DEFAULT_CHUNK_SIZE)?;
        enc::drain(producer.as_mut())
    }
}

fn filters_from(info: &Dictionary) -> Result<Vec<StreamFilter>> {
    let names: Vec<&str> = match info.get("Filter") {
        None | Some(Primitive::Null) => return Ok(Vec::new()),
        Some(Primitive::Name(n)) => vec![n.as_str()],
        Some(Primitive::Array(arr)) => arr.iter().map(|p| p.as_name()).collect::<Result<_>>()?,
        Some(p) => {
            return Err(PdfError::UnexpectedPrimitive {
                expected: "Name or Array",
                found: p.get_debug_name(),
            })
        }
    };
    let no_params = Dictionary::new();
    let params: Vec<&Dictionary> = match info.get("DecodeParms") {
        None | Some(Primitive::Null) => Vec::new(),
        Some(Primitive::Dictionary(d)) => vec![d],
        Some(Primitive::Array(arr)) => arr
            .iter()
            .map(|p| match p {
                Primitive::Dictionary(d) => d,
                _ => &no_params,
            })
            .collect(),
        Some(p) => {
            return Err(PdfError::UnexpectedPrimitive {
                expected: "Dictionary or Array",
                found: p.get_debug_name(),
            })
        }
    };
    names
        .iter()
        .enumerate()
        .map(|(i, &name)| {
            StreamFilter::from_kind_and_params(name, params.get(i).copied().unwrap_or(&no_params))
        })
        .collect()
}

/// A rectangle given as `[llx lly urx ury]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl Rectangle {
    pub fn from_array(arr: &[Primitive]) -> Result<Rectangle> {
        if arr.len() != 4 {
            bail!("rectangle needs a 4-element array (found {})", arr.len());
        }
        Ok(Rectangle {
            left: arr[0].as_number()?,
            bottom: arr[1].as_number()?,
            right: arr[2].as_number()?,
            top: arr[3].as_number()?,
        })
    }
    pub fn width(&self) -> f64 {
        self.right - self.left
    }
    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }
}
impl fmt::Display for Rectangle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[{} {} {} {}]",
            self.left, self.bottom, self.right, self.top
        )
    }
}

impl From<i64> for Primitive {
    fn from(x: i64) -> Primitive {
        Primitive::Integer(x)
    }
}
impl From<f64> for Primitive {
    fn from(x: f64) -> Primitive {
        Primitive::Real(x)
    }
}
impl From<bool> for Primitive {
    fn from(x: bool) -> Primitive {
        Primitive::Boolean(x)
    }
}
impl From<Name> for Primitive {
    fn from(x: Name) -> Primitive {
        Primitive::Name(x)
    }
}
impl From<PdfString> for Primitive {
    fn from(x: PdfString) -> Primitive {
        Primitive::String(x)
    }
}
impl From<Dictionary> for Primitive {
    fn from(x: Dictionary) -> Primitive {
        Primitive::Dictionary(x)
    }
}
impl From<PdfStream> for Primitive {
    fn from(x: PdfStream) -> Primitive {
        Primitive::Stream(x)
    }
}
impl From<Vec<Primitive>> for Primitive {
    fn from(x: Vec<Primitive>) -> Primitive {
        Primitive::Array(x)
    }
}
impl From<PlainRef> for Primitive {
    fn from(x: PlainRef) -> Primitive {
        Primitive::Reference(x)
    }
}
impl From<Rectangle> for Primitive {
    fn from(x: Rectangle) -> Primitive {
        Primitive::Rectangle(x)
    }
}
impl From<DateTime<FixedOffset>> for Primitive {
    fn from(x: DateTime<FixedOffset>) -> Primitive {
        Primitive::Date(x)
    }
}

fn two_digits(b: &[u8], pos: usize) -> Option<u32> {
    if pos + 2 <= b.len() && b[pos].is_ascii_digit() && b[pos + 1].is_ascii_digit() {
        Some((b[pos] - b'0') as u32 * 10 + (b[pos + 1] - b'0') as u32)
    } else {
        None
    }
}

/// Parses `D:YYYY[MM[DD[hh[mm[ss[O[HH'[mm']]]]]]]]` where `O` is one of
/// `Z`, `+`, `-`. Components default to month=day=1, h=m=s=0, offset=0.
pub fn parse_datetime(s: &str) -> Option<DateTime<FixedOffset>> {
    let rest = s.strip_prefix("D:")?;
    let b = rest.as_bytes();
    if b.len() < 4 || !b[..4].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let year: i32 = rest[..4].parse().ok()?;

    let mut pos = 4;
    let mut parts = [1u32, 1, 0, 0, 0];
    for slot in parts.iter_mut() {
        match two_digits(b, pos) {
            Some(v) => {
                *slot = v;
                pos += 2;
            }
            None => break,
        }
    }

    let mut offset = 0i32;
    if pos < b.len() {
        let sign = match b[pos] {
            b'Z' => 0,
            b'+' => 1,
            b'-' => -1,
            _ => return None,
        };
        pos += 1;
        let mut hour = 0;
        let mut minute = 0;
        if let Some(v) = two_digits(b, pos) {
            hour = v;
            pos += 2;
            // the hour must carry its trailing quote unless the string ends here
            if pos < b.len() {
                if b[pos] != b'\'' {
                    return None;
                }
                pos += 1;
            }
            if let Some(v) = two_digits(b, pos) {
                minute = v;
                pos += 2;
                if pos < b.len() && b[pos] == b'\'' {
                    pos += 1;
                }
            }
        }
        offset = sign * (hour as i32 * 3600 + minute as i32 * 60);
    }
    if pos != b.len() {
        return None;
    }

    let [month, day, hour, minute, second] = parts;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = NaiveTime::from_hms_opt(hour, minute, second)?;
    let tz = FixedOffset::east_opt(offset)?;
    NaiveDateTime::new(date, time).and_local_timezone(tz).single()
}

pub fn format_datetime(dt: &DateTime<FixedOffset>) -> String {
    let offset = dt.offset().local_minus_utc();
    let sign = if offset < 0 { '-' } else { '+' };
    let offset = offset.abs();
    format!(
        "D:{}{}{:02}'{:02}'",
        dt.format("%Y%m%d%H%M%S"),
        sign,
        offset / 3600,
        offset % 3600 / 60
    )
}

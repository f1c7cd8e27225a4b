use crate::document::Version;
use crate::object::ObjNr;
use std::error::Error;
use std::io;

#[derive(Debug, Snafu)]
pub enum PdfError {
    // Value decoding
    #[snafu(display("Error parsing from string: {}", source))]
    Parse { source: Box<dyn Error> },

    #[snafu(display("Invalid UTF-8: {}", source))]
    Utf8 { source: Box<dyn Error> },

    //////////////////
    // Dictionary / schema
    #[snafu(display("Expected primitive {}, found primitive {} instead.", expected, found))]
    UnexpectedPrimitive {
        expected: &'static str,
        found: &'static str,
    },

    #[snafu(display("Value for field /{} of {} is not one of the allowed types (found {}).", field, typ, found))]
    TypeMismatch {
        typ: &'static str,
        field: String,
        found: &'static str,
    },

    #[snafu(display("Field /{} is missing in dictionary for type {}.", field, typ))]
    MissingEntry { typ: &'static str, field: String },

    #[snafu(display("Field /{} needs PDF version {} but the document is pinned to {}.", field, required, current))]
    VersionConflict {
        field: String,
        required: Version,
        current: Version,
    },

    //////////////////
    // Objects
    #[snafu(display("Tried to dereference non-existing object nr {}.", obj_nr))]
    NullRef { obj_nr: ObjNr },

    //////////////////
    // Encode/decode
    #[snafu(display("Problem while decoding {} encoded stream: {}", filter, msg))]
    FilterDecode { filter: &'static str, msg: String },

    #[snafu(display("Problem while encoding {} encoded stream: {}", filter, msg))]
    FilterEncode { filter: &'static str, msg: String },

    #[snafu(display("Failed to convert '{}' into PredictorType", n))]
    IncorrectPredictorType { n: u8 },

    //////////////////
    // Misc
    #[snafu(display("IO Error"))]
    Io { source: io::Error },

    #[snafu(display("{}", msg))]
    Other { msg: String },

    #[snafu(display("NoneError at {}:{}:{}", file, line, column))]
    NoneError {
        file: &'static str,
        line: u32,
        column: u32,
    },
}

pub type Result<T, E = PdfError> = std::result::Result<T, E>;

impl From<io::Error> for PdfError {
    fn from(source: io::Error) -> PdfError {
        PdfError::Io { source }
    }
}
impl From<String> for PdfError {
    fn from(msg: String) -> PdfError {
        PdfError::Other { msg }
    }
}

#[macro_export]
macro_rules! try_opt {
    ($e:expr) => {
        match $e {
            Some(v) => v,
            None => {
                return Err($crate::PdfError::NoneError {
                    file: file!(),
                    line: line!(),
                    column: column!(),
                })
            }
        }
    };
}

macro_rules! err_from {
    ($($st:ty),* => $variant:ident) => (
        $(
            impl From<$st> for PdfError {
                fn from(e: $st) -> PdfError {
                    PdfError::$variant { source: e.into() }
                }
            }
        )*
    )
}
err_from!(std::str::Utf8Error, std::string::FromUtf8Error, std::string::FromUtf16Error => Utf8);
err_from!(std::num::ParseIntError => Parse);

macro_rules! err {
    ($e: expr) => {{
        return Err($e);
    }};
}
macro_rules! bail {
    ($($t:tt)*) => {
        err!($crate::PdfError::Other { msg: format!($($t)*) })
    }
}

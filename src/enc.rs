//! Stream filters as cooperative chunk producers.
//!
//! A filter wraps an upstream producer and yields transformed chunks on each
//! `resume`; downstream never reads ahead of upstream.

#![allow(clippy::many_single_char_names)]

use crate::error::*;
use crate::primitive::{Dictionary, Primitive};

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use std::rc::Rc;

/// Bytes a data-backed producer hands out per resume.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// A cooperative byte-chunk producer.
pub trait Producer {
    /// Yield the next chunk, or `None` once the stream is exhausted.
    /// A failed resume leaves the producer in its error state for good.
    fn resume(&mut self) -> Result<Option<Vec<u8>>>;
    /// False once the producer has finished or failed.
    fn alive(&self) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Fresh,
    Streaming,
    Finished,
    Errored,
}

/// Hands out successive slices of a shared buffer.
pub struct DataChunks {
    data: Rc<[u8]>,
    pos: usize,
    chunk_size: usize,
}

impl DataChunks {
    pub fn new(data: Rc<[u8]>, chunk_size: usize) -> DataChunks {
        DataChunks {
            data,
            pos: 0,
            chunk_size: chunk_size.max(1),
        }
    }
}
impl Producer for DataChunks {
    fn resume(&mut self) -> Result<Option<Vec<u8>>> {
        if self.pos >= self.data.len() {
            return Ok(None);
        }
        let end = (self.pos + self.chunk_size).min(self.data.len());
        let chunk = self.data[self.pos..end].to_vec();
        self.pos = end;
        Ok(Some(chunk))
    }
    fn alive(&self) -> bool {
        self.pos < self.data.len()
    }
}

/// /DecodeParms entries relevant for Flate and its predictor.
#[derive(Debug, Clone)]
pub struct FlateParams {
    pub predictor: i64,
    pub colors: i64,
    pub bits_per_component: i64,
    pub columns: i64,
}
impl Default for FlateParams {
    fn default() -> FlateParams {
        FlateParams {
            predictor: 1,
            colors: 1,
            bits_per_component: 8,
            columns: 1,
        }
    }
}
impl FlateParams {
    pub fn from_dict(dict: &Dictionary) -> Result<FlateParams> {
        fn entry(dict: &Dictionary, key: &str, default: i64) -> Result<i64> {
            match dict.get(key) {
                None | Some(Primitive::Null) => Ok(default),
                Some(p) => p.as_integer(),
            }
        }
        Ok(FlateParams {
            predictor: entry(dict, "Predictor", 1)?,
            colors: entry(dict, "Colors", 1)?,
            bits_per_component: entry(dict, "BitsPerComponent", 8)?,
            columns: entry(dict, "Columns", 1)?,
        })
    }
    pub fn has_predictor(&self) -> bool {
        self.predictor > 1
    }
}

#[derive(Debug, Clone)]
pub enum StreamFilter {
    FlateDecode(FlateParams),
}
impl StreamFilter {
    pub fn from_kind_and_params(kind: &str, params: &Dictionary) -> Result<StreamFilter> {
        match kind {
            "FlateDecode" | "Fl" => Ok(StreamFilter::FlateDecode(FlateParams::from_dict(params)?)),
            ty => bail!("Unrecognized filter type {:?}", ty),
        }
    }
}

/// Build the decode chain for one filter.
pub fn decoder(source: Box<dyn Producer>, filter: &StreamFilter) -> Result<Box<dyn Producer>> {
    match filter {
        StreamFilter::FlateDecode(params) => {
            let mut p: Box<dyn Producer> = Box::new(FlateDecoder::new(source));
            if params.has_predictor() {
                p = Box::new(PredictorDecoder::new(p, params)?);
            }
            Ok(p)
        }
    }
}

/// Build the encode chain for one filter. The predictor runs before Flate.
pub fn encoder(
    source: Box<dyn Producer>,
    filter: &StreamFilter,
    compression: u32,
) -> Result<Box<dyn Producer>> {
    match filter {
        StreamFilter::FlateDecode(params) => {
            let mut p = source;
            if params.has_predictor() {
                p = Box::new(PredictorEncoder::new(p, params)?);
            }
            Ok(Box::new(FlateEncoder::new(p, compression)))
        }
    }
}

/// Drives a producer to completion.
pub fn drain(producer: &mut dyn Producer) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    while let Some(chunk) = producer.resume()? {
        out.extend_from_slice(&chunk);
    }
    Ok(out)
}

fn flate_decode_error(msg: impl ToString) -> PdfError {
    PdfError::FilterDecode {
        filter: "Flate",
        msg: msg.to_string(),
    }
}

pub struct FlateDecoder {
    upstream: Box<dyn Producer>,
    inflate: Decompress,
    stream_done: bool,
    state: State,
}

impl FlateDecoder {
    pub fn new(upstream: Box<dyn Producer>) -> FlateDecoder {
        FlateDecoder {
            upstream,
            inflate: Decompress::new(true),
            stream_done: false,
            state: State::Fresh,
        }
    }

    fn inflate_chunk(&mut self, input: &[u8], flush: FlushDecompress) -> Result<Vec<u8>> {
        let finish = matches!(flush, FlushDecompress::Finish);
        let mut out = Vec::with_capacity(input.len().max(512) * 2);
        let mut pos = 0;
        loop {
            if out.len() == out.capacity() {
                out.reserve(out.capacity().max(512));
            }
            let in_before = self.inflate.total_in();
            let out_before = out.len();
            let status = self
                .inflate
                .decompress_vec(&input[pos..], &mut out, flush)
                .map_err(flate_decode_error)?;
            pos += (self.inflate.total_in() - in_before) as usize;
            let progressed = self.inflate.total_in() > in_before || out.len() > out_before;
            match status {
                Status::StreamEnd => {
                    self.stream_done = true;
                    break;
                }
                Status::Ok | Status::BufError => {
                    if finish {
                        if !progressed {
                            return Err(flate_decode_error("incomplete compressed stream"));
                        }
                    } else if pos >= input.len() && out.len() < out.capacity() {
                        break;
                    } else if !progressed && out.len() < out.capacity() {
                        break;
                    }
                }
            }
        }
        Ok(out)
    }
}

impl Producer for FlateDecoder {
    fn resume(&mut self) -> Result<Option<Vec<u8>>> {
        match self.state {
            State::Finished => return Ok(None),
            State::Errored => return Err(flate_decode_error("stream already failed")),
            _ => {}
        }
        loop {
            if self.stream_done {
                self.state = State::Finished;
                return Ok(None);
            }
            let chunk = match self.upstream.resume() {
                Ok(c) => c,
                Err(e) => {
                    self.state = State::Errored;
                    return Err(e);
                }
            };
            match chunk {
                Some(data) => {
                    let fresh = self.state == State::Fresh;
                    self.state = State::Streaming;
                    let out = match self.inflate_chunk(&data, FlushDecompress::None) {
                        Ok(out) => out,
                        Err(_) if fresh => {
                            // no zlib header: some writers emit raw deflate
                            info!("invalid zlib header, trying raw deflate");
                            self.inflate = Decompress::new(false);
                            match self.inflate_chunk(&data, FlushDecompress::None) {
                                Ok(out) => out,
                                Err(e) => {
                                    self.state = State::Errored;
                                    return Err(e);
                                }
                            }
                        }
                        Err(e) => {
                            self.state = State::Errored;
                            return Err(e);
                        }
                    };
                    if !out.is_empty() {
                        return Ok(Some(out));
                    }
                }
                None => {
                    // upstream exhausted: flush the inflater's tail
                    let out = match self.inflate_chunk(&[], FlushDecompress::Finish) {
                        Ok(out) => out,
                        Err(e) => {
                            self.state = State::Errored;
                            return Err(e);
                        }
                    };
                    self.state = State::Finished;
                    return Ok(if out.is_empty() { None } else { Some(out) });
                }
            }
        }
    }
    fn alive(&self) -> bool {
        matches!(self.state, State::Fresh | State::Streaming)
    }
}

fn flate_encode_error(msg: impl ToString) -> PdfError {
    PdfError::FilterEncode {
        filter: "Flate",
        msg: msg.to_string(),
    }
}

pub struct FlateEncoder {
    upstream: Box<dyn Producer>,
    deflate: Compress,
    state: State,
}

impl FlateEncoder {
    /// `compression` is the zlib level (0-9), from `filter.flate_compression`.
    pub fn new(upstream: Box<dyn Producer>, compression: u32) -> FlateEncoder {
        FlateEncoder {
            upstream,
            deflate: Compress::new(Compression::new(compression.min(9)), true),
            state: State::Fresh,
        }
    }

    fn deflate_chunk(&mut self, input: &[u8], flush: FlushCompress) -> Result<Vec<u8>> {
        let finish = matches!(flush, FlushCompress::Finish);
        let mut out = Vec::with_capacity(input.len().max(512));
        let mut pos = 0;
        loop {
            if out.len() == out.capacity() {
                out.reserve(out.capacity().max(512));
            }
            let in_before = self.deflate.total_in();
            let out_before = out.len();
            let status = self
                .deflate
                .compress_vec(&input[pos..], &mut out, flush)
                .map_err(flate_encode_error)?;
            pos += (self.deflate.total_in() - in_before) as usize;
            let progressed = self.deflate.total_in() > in_before || out.len() > out_before;
            match status {
                Status::StreamEnd => break,
                Status::Ok | Status::BufError => {
                    if finish {
                        if !progressed && out.len() < out.capacity() {
                            return Err(flate_encode_error("deflate stalled"));
                        }
                    } else if pos >= input.len() && out.len() < out.capacity() {
                        break;
                    } else if !progressed && out.len() < out.capacity() {
                        break;
                    }
                }
            }
        }
        Ok(out)
    }
}

impl Producer for FlateEncoder {
    fn resume(&mut self) -> Result<Option<Vec<u8>>> {
        match self.state {
            State::Finished => return Ok(None),
            State::Errored => return Err(flate_encode_error("stream already failed")),
            _ => {}
        }
        loop {
            let chunk = match self.upstream.resume() {
                Ok(c) => c,
                Err(e) => {
                    self.state = State::Errored;
                    return Err(e);
                }
            };
            match chunk {
                Some(data) => {
                    self.state = State::Streaming;
                    let out = match self.deflate_chunk(&data, FlushCompress::None) {
                        Ok(out) => out,
                        Err(e) => {
                            self.state = State::Errored;
                            return Err(e);
                        }
                    };
                    if !out.is_empty() {
                        return Ok(Some(out));
                    }
                }
                None => {
                    let out = match self.deflate_chunk(&[], FlushCompress::Finish) {
                        Ok(out) => out,
                        Err(e) => {
                            self.state = State::Errored;
                            return Err(e);
                        }
                    };
                    self.state = State::Finished;
                    return Ok(if out.is_empty() { None } else { Some(out) });
                }
            }
        }
    }
    fn alive(&self) -> bool {
        matches!(self.state, State::Fresh | State::Streaming)
    }
}

/*
 * Predictor - row transforms copied and adapted from the PNG crate..
 */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PredictorType {
    NoFilter = 0,
    Sub = 1,
    Up = 2,
    Avg = 3,
    Paeth = 4,
}

impl PredictorType {
    /// u8 -> Self. Temporary solution until Rust provides a canonical one.
    pub fn from_u8(n: u8) -> Result<PredictorType> {
        match n {
            0 => Ok(PredictorType::NoFilter),
            1 => Ok(PredictorType::Sub),
            2 => Ok(PredictorType::Up),
            3 => Ok(PredictorType::Avg),
            4 => Ok(PredictorType::Paeth),
            n => Err(PdfError::IncorrectPredictorType { n }),
        }
    }
}

fn filter_paeth(a: u8, b: u8, c: u8) -> u8 {
    let ia = a as i16;
    let ib = b as i16;
    let ic = c as i16;

    let p = ia + ib - ic;

    let pa = (p - ia).abs();
    let pb = (p - ib).abs();
    let pc = (p - ic).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

pub fn unfilter(filter: PredictorType, bpp: usize, prev: &[u8], inp: &[u8], out: &mut [u8]) {
    use self::PredictorType::*;
    let len = inp.len();
    assert_eq!(len, out.len());
    assert_eq!(len, prev.len());

    match filter {
        NoFilter => {
            out[..len].copy_from_slice(&inp[..len]);
        }
        Sub => {
            out[..bpp].copy_from_slice(&inp[..bpp]);

            for i in bpp..len {
                out[i] = inp[i].wrapping_add(out[i - bpp]);
            }
        }
        Up => {
            for i in 0..len {
                out[i] = inp[i].wrapping_add(prev[i]);
            }
        }
        Avg => {
            for i in 0..bpp {
                out[i] = inp[i].wrapping_add(prev[i] / 2);
            }

            for i in bpp..len {
                out[i] = inp[i].wrapping_add(((out[i - bpp] as i16 + prev[i] as i16) / 2) as u8);
            }
        }
        Paeth => {
            for i in 0..bpp {
                out[i] = inp[i].wrapping_add(filter_paeth(0, prev[i], 0));
            }

            for i in bpp..len {
                out[i] = inp[i].wrapping_add(filter_paeth(out[i - bpp], prev[i], prev[i - bpp]));
            }
        }
    }
}

pub fn filter(method: PredictorType, bpp: usize, previous: &[u8], current: &mut [u8]) {
    use self::PredictorType::*;
    let len = current.len();

    match method {
        NoFilter => (),
        Sub => {
            for i in (bpp..len).rev() {
                current[i] = current[i].wrapping_sub(current[i - bpp]);
            }
        }
        Up => {
            for i in 0..len {
                current[i] = current[i].wrapping_sub(previous[i]);
            }
        }
        Avg => {
            for i in (bpp..len).rev() {
                current[i] =
                    current[i].wrapping_sub(current[i - bpp].wrapping_add(previous[i]) / 2);
            }

            for i in 0..bpp {
                current[i] = current[i].wrapping_sub(previous[i] / 2);
            }
        }
        Paeth => {
            for i in (bpp..len).rev() {
                current[i] = current[i].wrapping_sub(filter_paeth(
                    current[i - bpp],
                    previous[i],
                    previous[i - bpp],
                ));
            }

            for i in 0..bpp {
                current[i] = current[i].wrapping_sub(filter_paeth(0, previous[i], 0));
            }
        }
    }
}

struct RowGeometry {
    tiff: bool,
    colors: usize,
    bpc: usize,
    stride: usize,
    bpp: usize,
}

fn row_geometry(params: &FlateParams, decode: bool) -> Result<RowGeometry> {
    let tiff = match params.predictor {
        2 => true,
        10..=15 => false,
        n => bail!("Unsupported predictor {}", n),
    };
    let colors = params.colors;
    let bpc = params.bits_per_component;
    let columns = params.columns;
    if colors < 1 || columns < 1 || !matches!(bpc, 1 | 2 | 4 | 8 | 16) {
        let msg = format!(
            "invalid predictor options: Colors={} BitsPerComponent={} Columns={}",
            colors, bpc, columns
        );
        return Err(if decode {
            PdfError::FilterDecode { filter: "Predictor", msg }
        } else {
            PdfError::FilterEncode { filter: "Predictor", msg }
        });
    }
    if tiff && !matches!(bpc, 8 | 16) {
        let msg = format!("TIFF predictor needs 8 or 16 bits per component, got {}", bpc);
        return Err(if decode {
            PdfError::FilterDecode { filter: "Predictor", msg }
        } else {
            PdfError::FilterEncode { filter: "Predictor", msg }
        });
    }
    let (colors, bpc, columns) = (colors as usize, bpc as usize, columns as usize);
    Ok(RowGeometry {
        tiff,
        colors,
        bpc,
        stride: (columns * colors * bpc + 7) / 8,
        bpp: (colors * bpc / 8).max(1),
    })
}

fn tiff_undiff(row: &mut [u8], colors: usize, bpc: usize) {
    if bpc == 8 {
        for i in colors..row.len() {
            row[i] = row[i].wrapping_add(row[i - colors]);
        }
    } else {
        let step = colors * 2;
        for i in (step..row.len()).step_by(2) {
            let prev = u16::from_be_bytes([row[i - step], row[i - step + 1]]);
            let cur = u16::from_be_bytes([row[i], row[i + 1]]);
            row[i..i + 2].copy_from_slice(&cur.wrapping_add(prev).to_be_bytes());
        }
    }
}

fn tiff_diff(row: &mut [u8], colors: usize, bpc: usize) {
    if bpc == 8 {
        for i in (colors..row.len()).rev() {
            row[i] = row[i].wrapping_sub(row[i - colors]);
        }
    } else {
        let step = colors * 2;
        let mut i = row.len();
        while i >= step + 2 {
            i -= 2;
            let prev = u16::from_be_bytes([row[i - step], row[i - step + 1]]);
            let cur = u16::from_be_bytes([row[i], row[i + 1]]);
            row[i..i + 2].copy_from_slice(&cur.wrapping_sub(prev).to_be_bytes());
        }
    }
}

pub struct PredictorDecoder {
    upstream: Box<dyn Producer>,
    geo: RowGeometry,
    pending: Vec<u8>,
    prev: Vec<u8>,
    state: State,
}

impl PredictorDecoder {
    pub fn new(upstream: Box<dyn Producer>, params: &FlateParams) -> Result<PredictorDecoder> {
        let geo = row_geometry(params, true)?;
        let prev = vec![0; geo.stride];
        Ok(PredictorDecoder {
            upstream,
            geo,
            pending: Vec::new(),
            prev,
            state: State::Fresh,
        })
    }

    fn decode_pending(&mut self) -> Result<Vec<u8>> {
        let row_len = if self.geo.tiff {
            self.geo.stride
        } else {
            self.geo.stride + 1
        };
        let complete = self.pending.len() / row_len;
        let mut out = Vec::with_capacity(complete * self.geo.stride);
        for row in 0..complete {
            let row_in = &self.pending[row * row_len..(row + 1) * row_len];
            if self.geo.tiff {
                let mut row_out = row_in.to_vec();
                tiff_undiff(&mut row_out, self.geo.colors, self.geo.bpc);
                out.extend_from_slice(&row_out);
            } else {
                let ft = PredictorType::from_u8(row_in[0]).map_err(|_| {
                    PdfError::FilterDecode {
                        filter: "Predictor",
                        msg: format!("unknown row filter type {}", row_in[0]),
                    }
                })?;
                let mut row_out = vec![0; self.geo.stride];
                unfilter(ft, self.geo.bpp, &self.prev, &row_in[1..], &mut row_out);
                self.prev.copy_from_slice(&row_out);
                out.extend_from_slice(&row_out);
            }
        }
        self.pending.drain(..complete * row_len);
        Ok(out)
    }
}

impl Producer for PredictorDecoder {
    fn resume(&mut self) -> Result<Option<Vec<u8>>> {
        match self.state {
            State::Finished => return Ok(None),
            State::Errored => {
                return Err(PdfError::FilterDecode {
                    filter: "Predictor",
                    msg: "stream already failed".into(),
                })
            }
            _ => {}
        }
        loop {
            let chunk = match self.upstream.resume() {
                Ok(c) => c,
                Err(e) => {
                    self.state = State::Errored;
                    return Err(e);
                }
            };
            match chunk {
                Some(data) => {
                    self.state = State::Streaming;
                    self.pending.extend_from_slice(&data);
                    match self.decode_pending() {
                        Ok(out) if out.is_empty() => {}
                        Ok(out) => return Ok(Some(out)),
                        Err(e) => {
                            self.state = State::Errored;
                            return Err(e);
                        }
                    }
                }
                None => {
                    if !self.pending.is_empty() {
                        self.state = State::Errored;
                        return Err(PdfError::FilterDecode {
                            filter: "Predictor",
                            msg: format!(
                                "{} trailing bytes do not form a whole row",
                                self.pending.len()
                            ),
                        });
                    }
                    self.state = State::Finished;
                    return Ok(None);
                }
            }
        }
    }
    fn alive(&self) -> bool {
        matches!(self.state, State::Fresh | State::Streaming)
    }
}

pub struct PredictorEncoder {
    upstream: Box<dyn Producer>,
    geo: RowGeometry,
    png_filter: PredictorType,
    pending: Vec<u8>,
    prev: Vec<u8>,
    state: State,
}

impl PredictorEncoder {
    pub fn new(upstream: Box<dyn Producer>, params: &FlateParams) -> Result<PredictorEncoder> {
        let geo = row_geometry(params, false)?;
        let png_filter = match params.predictor {
            11 => PredictorType::Sub,
            12 => PredictorType::Up,
            13 => PredictorType::Avg,
            14 | 15 => PredictorType::Paeth,
            _ => PredictorType::NoFilter,
        };
        let prev = vec![0; geo.stride];
        Ok(PredictorEncoder {
            upstream,
            geo,
            png_filter,
            pending: Vec::new(),
            prev,
            state: State::Fresh,
        })
    }

    fn encode_pending(&mut self) -> Vec<u8> {
        let row_len = self.geo.stride;
        let complete = self.pending.len() / row_len;
        let mut out = Vec::with_capacity(complete * (row_len + 1));
        for row in 0..complete {
            let row_in = &self.pending[row * row_len..(row + 1) * row_len];
            let mut current = row_in.to_vec();
            if self.geo.tiff {
                tiff_diff(&mut current, self.geo.colors, self.geo.bpc);
                out.extend_from_slice(&current);
            } else {
                out.push(self.png_filter as u8);
                filter(self.png_filter, self.geo.bpp, &self.prev, &mut current);
                out.extend_from_slice(&current);
                self.prev.copy_from_slice(row_in);
            }
        }
        self.pending.drain(..complete * row_len);
        out
    }
}

impl Producer for PredictorEncoder {
    fn resume(&mut self) -> Result<Option<Vec<u8>>> {
        match self.state {
            State::Finished => return Ok(None),
            State::Errored => {
                return Err(PdfError::FilterEncode {
                    filter: "Predictor",
                    msg: "stream already failed".into(),
                })
            }
            _ => {}
        }
        loop {
            let chunk = match self.upstream.resume() {
                Ok(c) => c,
                Err(e) => {
                    self.state = State::Errored;
                    return Err(e);
                }
            };
            match chunk {
                Some(data) => {
                    self.state = State::Streaming;
                    self.pending.extend_from_slice(&data);
                    let out = self.encode_pending();
                    if !out.is_empty() {
                        return Ok(Some(out));
                    }
                }
                None => {
                    if !self.pending.is_empty() {
                        self.state = State::Errored;
                        return Err(PdfError::FilterEncode {
                            filter: "Predictor",
                            msg: format!(
                                "stream length is not a multiple of the row length ({} bytes left)",
                                self.pending.len()
                            ),
                        });
                    }
                    self.state = State::Finished;
                    return Ok(None);
                }
            }
        }
    }
    fn alive(&self) -> bool {
        matches!(self.state, State::Fresh | State::Streaming)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct VecChunks {
        chunks: Vec<Vec<u8>>,
        pos: usize,
    }
    impl VecChunks {
        fn new(chunks: Vec<Vec<u8>>) -> VecChunks {
            VecChunks { chunks, pos: 0 }
        }
    }
    impl Producer for VecChunks {
        fn resume(&mut self) -> Result<Option<Vec<u8>>> {
            let chunk = self.chunks.get(self.pos).cloned();
            self.pos += 1;
            Ok(chunk)
        }
        fn alive(&self) -> bool {
            self.pos < self.chunks.len()
        }
    }

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut enc = FlateEncoder::new(
            Box::new(DataChunks::new(data.to_vec().into(), DEFAULT_CHUNK_SIZE)),
            6,
        );
        drain(&mut enc).unwrap()
    }

    #[test]
    fn flate_roundtrip() {
        let case = &b"hello world, hello world, hello world!"[..];
        let encoded = deflate(case);
        assert_ne!(case, &*encoded);
        let mut dec = FlateDecoder::new(Box::new(DataChunks::new(encoded.into(), 3)));
        assert_eq!(drain(&mut dec).unwrap(), case);
    }

    #[test]
    fn flate_decodes_across_chunk_boundaries() {
        // one deflate stream whose compressed bytes arrive in two resumes
        let encoded = deflate(b"Hello, world!");
        let split = encoded.len() / 2;
        let upstream = VecChunks::new(vec![encoded[..split].to_vec(), encoded[split..].to_vec()]);
        let mut dec = FlateDecoder::new(Box::new(upstream));
        let mut out = Vec::new();
        while let Some(chunk) = dec.resume().unwrap() {
            out.extend_from_slice(&chunk);
        }
        assert_eq!(out, b"Hello, world!");
        assert!(!dec.alive());
    }

    #[test]
    fn flate_error_is_permanent() {
        let mut dec = FlateDecoder::new(Box::new(DataChunks::new(
            vec![0xff; 32].into(),
            DEFAULT_CHUNK_SIZE,
        )));
        let err = loop {
            match dec.resume() {
                Ok(Some(_)) => {}
                Ok(None) => panic!("expected a decode failure"),
                Err(e) => break e,
            }
        };
        assert!(matches!(err, PdfError::FilterDecode { filter: "Flate", .. }));
        assert!(err
            .to_string()
            .starts_with("Problem while decoding Flate encoded stream:"));
        assert!(!dec.alive());
        assert!(dec.resume().is_err());
    }

    #[test]
    fn flate_truncated_stream_fails() {
        let encoded = deflate(b"some reasonably long input so truncation matters");
        let truncated = encoded[..encoded.len() - 6].to_vec();
        let mut dec = FlateDecoder::new(Box::new(DataChunks::new(truncated.into(), 4)));
        assert!(drain(&mut dec).is_err());
    }

    #[test]
    fn png_predictor_roundtrip() {
        let params = FlateParams {
            predictor: 12,
            colors: 1,
            bits_per_component: 8,
            columns: 4,
        };
        let data: Vec<u8> = (0u8..16).collect();
        let source = Box::new(DataChunks::new(data.clone().into(), 3));
        let mut enc = PredictorEncoder::new(source, &params).unwrap();
        let encoded = drain(&mut enc).unwrap();
        assert_eq!(encoded.len(), 4 * 5);

        let mut dec =
            PredictorDecoder::new(Box::new(DataChunks::new(encoded.into(), 7)), &params).unwrap();
        assert_eq!(drain(&mut dec).unwrap(), data);
    }

    #[test]
    fn tiff_predictor_roundtrip() {
        let params = FlateParams {
            predictor: 2,
            colors: 3,
            bits_per_component: 8,
            columns: 2,
        };
        let data = vec![10, 20, 30, 13, 24, 35, 1, 2, 3, 4, 5, 6];
        let source = Box::new(DataChunks::new(data.clone().into(), 5));
        let mut enc = PredictorEncoder::new(source, &params).unwrap();
        let encoded = drain(&mut enc).unwrap();
        assert_eq!(&encoded[..6], &[10, 20, 30, 3, 4, 5]);

        let mut dec =
            PredictorDecoder::new(Box::new(DataChunks::new(encoded.into(), 4)), &params).unwrap();
        assert_eq!(drain(&mut dec).unwrap(), data);
    }

    #[test]
    fn tiff_predictor_16_bit() {
        let params = FlateParams {
            predictor: 2,
            colors: 1,
            bits_per_component: 16,
            columns: 3,
        };
        // one row of three big-endian 16-bit samples
        let data = vec![0x01, 0x00, 0x01, 0x10, 0x01, 0x30];
        let mut enc =
            PredictorEncoder::new(Box::new(DataChunks::new(data.clone().into(), 2)), &params)
                .unwrap();
        let encoded = drain(&mut enc).unwrap();
        assert_eq!(encoded, [0x01, 0x00, 0x00, 0x10, 0x00, 0x20]);

        let mut dec =
            PredictorDecoder::new(Box::new(DataChunks::new(encoded.into(), 3)), &params).unwrap();
        assert_eq!(drain(&mut dec).unwrap(), data);
    }

    #[test]
    fn full_chain_roundtrip() {
        let params = FlateParams {
            predictor: 15,
            colors: 1,
            bits_per_component: 8,
            columns: 8,
        };
        let filter = StreamFilter::FlateDecode(params);
        let data: Vec<u8> = (0..64u8).map(|i| i.wrapping_mul(37)).collect();
        let mut enc = encoder(
            Box::new(DataChunks::new(data.clone().into(), 10)),
            &filter,
            9,
        )
        .unwrap();
        let encoded = drain(enc.as_mut()).unwrap();
        let mut dec = decoder(Box::new(DataChunks::new(encoded.into(), 5)), &filter).unwrap();
        assert_eq!(drain(dec.as_mut()).unwrap(), data);
    }

    #[test]
    fn params_from_dict() {
        let mut dict = Dictionary::new();
        dict.insert("Predictor", Primitive::Integer(12));
        dict.insert("Columns", Primitive::Integer(5));
        let params = FlateParams::from_dict(&dict).unwrap();
        assert_eq!(params.predictor, 12);
        assert_eq!(params.columns, 5);
        assert_eq!(params.colors, 1);
        assert_eq!(params.bits_per_component, 8);
        assert!(params.has_predictor());
    }
}

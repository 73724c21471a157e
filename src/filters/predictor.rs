//! TIFF and PNG predictors for Flate and LZW streams.
//!
//! Predictors store each sample as a difference from its neighbours so the
//! following compressor sees longer runs. Decoding reverses the differences;
//! encoding produces them.

use crate::error::{Error, Result};
use crate::filters::param_int;
use crate::object::Dictionary;

/// Predictor parameters from a `/DecodeParms` dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictorParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Samples per row
    pub columns: usize,
    /// Color components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
}

impl Default for PredictorParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl PredictorParams {
    /// Read predictor entries, falling back to the PDF defaults.
    pub fn from_params(params: Option<&Dictionary>) -> Self {
        let positive = |key: &str, default: i64| param_int(params, key, default).max(1) as usize;
        Self {
            predictor: param_int(params, "Predictor", 1),
            columns: positive("Columns", 1),
            colors: positive("Colors", 1),
            bits_per_component: positive("BitsPerComponent", 8),
        }
    }

    /// Bytes of sample data per row (without the PNG tag byte).
    pub fn row_bytes(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }

    /// Distance in bytes to the corresponding byte of the previous pixel.
    fn pixel_bytes(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8).max(1)
    }

    /// True when the data is actually predicted.
    pub fn is_active(&self) -> bool {
        self.predictor > 1
    }
}

/// Undo prediction after decompression.
pub fn decode(data: Vec<u8>, params: &PredictorParams) -> Result<Vec<u8>> {
    match params.predictor {
        p if p <= 1 => Ok(data),
        2 => tiff(&data, params, false),
        10..=15 => png_decode(&data, params),
        other => Err(Error::decode("Predictor", format!("unsupported predictor {}", other))),
    }
}

/// Apply prediction before compression.
pub fn encode(data: &[u8], params: &PredictorParams) -> Result<Vec<u8>> {
    match params.predictor {
        p if p <= 1 => Ok(data.to_vec()),
        2 => tiff(data, params, true),
        10..=15 => Ok(png_encode(data, params)),
        other => Err(Error::decode("Predictor", format!("unsupported predictor {}", other))),
    }
}

/// TIFF predictor 2 on 8-bit samples: each component is stored as a difference
/// from the same component of the pixel to its left.
fn tiff(data: &[u8], params: &PredictorParams, encoding: bool) -> Result<Vec<u8>> {
    if params.bits_per_component != 8 {
        return Err(Error::decode(
            "Predictor",
            format!("TIFF predictor with {} bits per component", params.bits_per_component),
        ));
    }

    let row_len = params.row_bytes();
    let colors = params.colors;
    let mut out = data.to_vec();

    for row in out.chunks_mut(row_len) {
        if encoding {
            for i in (colors..row.len()).rev() {
                row[i] = row[i].wrapping_sub(row[i - colors]);
            }
        } else {
            for i in colors..row.len() {
                row[i] = row[i].wrapping_add(row[i - colors]);
            }
        }
    }

    Ok(out)
}

fn paeth(left: u8, up: u8, up_left: u8) -> u8 {
    let (a, b, c) = (i16::from(left), i16::from(up), i16::from(up_left));
    let p = a + b - c;
    let (pa, pb, pc) = ((p - a).abs(), (p - b).abs(), (p - c).abs());
    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        up
    } else {
        up_left
    }
}

/// The predicted value for byte `i` of a row.
fn png_prediction(tag: u8, row: &[u8], prev: &[u8], i: usize, bpp: usize) -> u8 {
    let left = if i >= bpp { row[i - bpp] } else { 0 };
    let up = prev.get(i).copied().unwrap_or(0);
    let up_left = if i >= bpp { prev.get(i - bpp).copied().unwrap_or(0) } else { 0 };
    match tag {
        1 => left,
        2 => up,
        3 => ((u16::from(left) + u16::from(up)) / 2) as u8,
        4 => paeth(left, up, up_left),
        _ => 0,
    }
}

/// PNG predictors: every row starts with a tag byte selecting the algorithm. A
/// truncated last row is decoded as far as it goes.
fn png_decode(data: &[u8], params: &PredictorParams) -> Result<Vec<u8>> {
    let row_len = params.row_bytes();
    let bpp = params.pixel_bytes();
    let mut out = Vec::with_capacity(data.len());
    let mut prev: Vec<u8> = Vec::new();

    for chunk in data.chunks(row_len + 1) {
        let tag = chunk[0];
        if tag > 4 {
            return Err(Error::decode("Predictor", format!("invalid PNG row tag {}", tag)));
        }
        let mut row = chunk[1..].to_vec();
        for i in 0..row.len() {
            let predicted = png_prediction(tag, &row, &prev, i, bpp);
            row[i] = row[i].wrapping_add(predicted);
        }
        out.extend_from_slice(&row);
        prev = row;
    }

    Ok(out)
}

/// Predictor 10-14 fix the row tag; 15 ("optimum") lets the encoder choose, and
/// Up is used for every row.
fn png_encode(data: &[u8], params: &PredictorParams) -> Vec<u8> {
    let row_len = params.row_bytes();
    let bpp = params.pixel_bytes();
    let tag = match params.predictor {
        15 => 2,
        p => (p - 10) as u8,
    };
    let mut out = Vec::with_capacity(data.len() + data.len() / row_len + 1);
    let mut prev: &[u8] = &[];

    for row in data.chunks(row_len) {
        out.push(tag);
        for i in 0..row.len() {
            out.push(row[i].wrapping_sub(png_prediction(tag, row, prev, i, bpp)));
        }
        prev = row;
    }

    out
}

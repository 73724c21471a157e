//! Attachment descriptors, PDF date strings and PDF text strings.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Timelike, Utc};
use lazy_static::lazy_static;
use regex::bytes::Regex;
use serde::Serialize;
use std::fmt;

lazy_static! {
    /// `D:YYYYMMDDHHmmSSOHH'mm'` with every field after the year optional.
    static ref RE_PDF_DATE: Regex = Regex::new(
        r"^(?:D:)?(\d{4})(\d{2})?(\d{2})?(\d{2})?(\d{2})?(\d{2})?(?:([Zz])|([+\-])(\d{2})'?(?:(\d{2})'?)?)?"
    )
    .expect("valid regex");
}

/// What the document says about one embedded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    /// Key in the EmbeddedFiles name tree
    pub name: String,
    /// `/Desc` of the file specification; empty when absent
    pub description: String,
    /// `/ModDate` of the embedded file, whole seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mod_time: Option<DateTime<Utc>>,
    /// Uncompressed payload size from `/Params /Size`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Lowercase hex MD5 from `/Params /CheckSum`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl fmt::Display for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.description.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} ({})", self.name, self.description)
        }
    }
}

/// Format a timestamp as a PDF date string, `D:YYYYMMDDHHmmSS+00'00'`.
pub fn format_pdf_date(time: &DateTime<Utc>) -> Vec<u8> {
    time.format("D:%Y%m%d%H%M%S+00'00'").to_string().into_bytes()
}

/// Parse a PDF date string. Missing fields default to the start of their
/// range and a missing offset means UTC.
pub fn parse_pdf_date(bytes: &[u8]) -> Option<DateTime<Utc>> {
    let caps = RE_PDF_DATE.captures(bytes)?;
    let field = |i: usize, default: u32| -> u32 {
        caps.get(i)
            .and_then(|m| std::str::from_utf8(m.as_bytes()).ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(default)
    };

    let year = i32::try_from(field(1, 0)).ok()?;
    let naive = NaiveDate::from_ymd_opt(year, field(2, 1), field(3, 1))?.and_hms_opt(
        field(4, 0),
        field(5, 0),
        field(6, 0),
    )?;

    let offset_secs = match caps.get(8).map(|m| m.as_bytes()) {
        Some(sign) => {
            let secs = i32::try_from(field(9, 0) * 3600 + field(10, 0) * 60).ok()?;
            if sign == b"-" {
                -secs
            } else {
                secs
            }
        },
        None => 0,
    };
    let offset = FixedOffset::east_opt(offset_secs)?;
    Some(offset.from_local_datetime(&naive).single()?.with_timezone(&Utc))
}

/// Drop the sub-second part; PDF dates cannot carry it.
pub fn truncate_to_seconds(time: DateTime<Utc>) -> DateTime<Utc> {
    time.with_nanosecond(0).unwrap_or(time)
}

/// Encode a text string: plain bytes for ASCII, UTF-16BE with a byte order
/// mark otherwise.
pub fn encode_text_string(text: &str) -> Vec<u8> {
    if text.is_ascii() {
        text.as_bytes().to_vec()
    } else {
        encode_utf16_be(text)
    }
}

/// Encode a string as UTF-16BE with BOM for PDF Unicode strings.
pub fn encode_utf16_be(s: &str) -> Vec<u8> {
    let mut result = vec![0xFE, 0xFF]; // UTF-16BE BOM
    for c in s.encode_utf16() {
        result.extend_from_slice(&c.to_be_bytes());
    }
    result
}

/// Decode a text string written as UTF-16BE (with BOM), UTF-8 (with BOM) or
/// PDFDocEncoding, which is read as Latin-1.
pub fn decode_text_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        },
        [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8_lossy(rest).into_owned(),
        _ => match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
        },
    }
}

/// Lowercase hex of `bytes`.
pub fn hex_lower(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

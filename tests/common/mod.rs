//! Shared fixtures: small PDFs built in memory.

#![allow(dead_code)]

use std::collections::BTreeMap;

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Builds a single-revision PDF with a classic xref table. Object 1 is the
/// catalog unless the trailer says otherwise.
#[derive(Debug, Clone)]
pub struct PdfBuilder {
    version: &'static str,
    objects: BTreeMap<u32, Vec<u8>>,
    trailer_extra: String,
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self {
            version: "1.4",
            objects: BTreeMap::new(),
            trailer_extra: String::new(),
        }
    }

    /// Catalog with an empty page tree as objects 1 and 2.
    pub fn minimal() -> Self {
        Self::new()
            .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
            .object(2, "<< /Type /Pages /Kids [] /Count 0 >>")
    }

    pub fn version(mut self, version: &'static str) -> Self {
        self.version = version;
        self
    }

    pub fn object(mut self, num: u32, body: &str) -> Self {
        self.objects.insert(num, body.as_bytes().to_vec());
        self
    }

    /// A stream object with a direct `/Length`.
    pub fn stream(mut self, num: u32, dict_entries: &str, data: &[u8]) -> Self {
        let mut body = format!("<< {} /Length {} >>\nstream\n", dict_entries, data.len()).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.objects.insert(num, body);
        self
    }

    pub fn trailer(mut self, extra: &str) -> Self {
        self.trailer_extra = extra.to_string();
        self
    }

    /// Header and object bodies only.
    pub fn body(&self) -> (Vec<u8>, BTreeMap<u32, usize>) {
        let mut pdf = format!("%PDF-{}\n%\u{e2}\u{e3}\n", self.version).into_bytes();
        let mut offsets = BTreeMap::new();
        for (num, body) in &self.objects {
            offsets.insert(*num, pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n", num).as_bytes());
            pdf.extend_from_slice(body);
            pdf.extend_from_slice(b"\nendobj\n");
        }
        (pdf, offsets)
    }

    /// The complete file.
    pub fn build(&self) -> Vec<u8> {
        let (mut pdf, offsets) = self.body();
        let size = offsets.keys().max().map_or(1, |max| max + 1);
        let xref_offset = pdf.len();

        pdf.extend_from_slice(format!("xref\n0 {}\n", size).as_bytes());
        for num in 0..size {
            match offsets.get(&num) {
                Some(offset) => pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes()),
                None => pdf.extend_from_slice(b"0000000000 65535 f \n"),
            }
        }
        pdf.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R {} >>\nstartxref\n{}\n%%EOF\n",
                size, self.trailer_extra, xref_offset
            )
            .as_bytes(),
        );
        pdf
    }

    /// The file with no xref table, trailer or `startxref`.
    pub fn build_without_xref(&self) -> Vec<u8> {
        let (mut pdf, _) = self.body();
        pdf.extend_from_slice(b"%%EOF\n");
        pdf
    }
}

/// Position of `needle` in `haystack`.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// A minimal PCM WAV file: 44-byte header plus a short sine-ish ramp.
pub fn wav_bytes() -> Vec<u8> {
    let samples: Vec<u8> = (0..2000u32).map(|i| ((i * 7) % 256) as u8).collect();
    let mut wav = Vec::with_capacity(44 + samples.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + samples.len() as u32).to_le_bytes());
    wav.extend_from_slice(b"WAVEfmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&8000u32.to_le_bytes());
    wav.extend_from_slice(&8000u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&8u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&(samples.len() as u32).to_le_bytes());
    wav.extend_from_slice(&samples);
    wav
}

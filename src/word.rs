//! Word extraction
//!
//! A word is the fixed-length symbol string used as the identity of a read
//! set: an optional UMI taken from the first read's header, followed by a
//! slice of every read's sequence.

use bstr::ByteSlice;

/// Pad byte for reads and UMIs shorter than their slot
pub const PAD: u8 = b'N';

/// Encoded word.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Word {
    /// Symbols in `0..4`
    pub data: Vec<u8>,
    /// Set when a position held something other than ACGT
    pub filtered: bool,
}

/// How many nucleotides each part of a read set contributes to a word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordLayout {
    /// Nucleotides taken from the header UMI
    pub header: usize,
    /// Nucleotides taken from each read, in file order
    pub per_file: Vec<usize>,
}

impl WordLayout {
    /// `umi_len` is the UMI length found in the first header; it is used
    /// first, the rest of `word_length` is split over the files.
    pub fn new(word_length: usize, umi_len: usize, files: usize) -> Self {
        Self {
            header: umi_len.min(word_length),
            per_file: nt_from_file(files, word_length.saturating_sub(umi_len)),
        }
    }

    #[inline]
    pub fn word_length(&self) -> usize {
        self.header + self.per_file.iter().sum::<usize>()
    }
}

/// A/C/G/T to 0/1/2/3.
#[inline]
pub fn encode(nucleotide: u8) -> Option<u8> {
    match nucleotide {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

/// Split `length` evenly over `files`, remainder to the last file.
pub fn nt_from_file(files: usize, length: usize) -> Vec<usize> {
    if files == 0 {
        return Vec::new();
    }
    let div = length / files;
    let mut v = vec![div; files];
    v[files - 1] += length % files;
    v
}

/// Non-empty and ACGT only.
pub fn valid_umi(umi: &[u8]) -> bool {
    !umi.is_empty() && umi.iter().all(|&c| encode(c).is_some())
}

/// Field after the last `sep`, if `sep` occurs.
fn last_field(s: &[u8], sep: u8) -> &[u8] {
    match s.rfind_byte(sep) {
        Some(pos) => &s[pos + 1..],
        None => b"",
    }
}

/// UMI from a read header: the last `_` field of the name, or failing that
/// the last `:` field (BCL Convert style). Only the part before the first
/// space is considered. Returns an empty slice when there is no UMI.
pub fn extract_umi(header: &[u8]) -> &[u8] {
    let name = match header.find_byte(b' ') {
        Some(pos) => &header[..pos],
        None => header,
    };
    for sep in [b'_', b':'] {
        let umi = last_field(name, sep);
        if valid_umi(umi) {
            return umi;
        }
    }
    b""
}

/// Cut or pad `s` with `PAD` to exactly `size` bytes.
fn fit(s: &[u8], size: usize, out: &mut Vec<u8>) {
    let take = s.len().min(size);
    out.extend_from_slice(&s[..take]);
    out.resize(out.len() + (size - take), PAD);
}

/// Raw nucleotides for a read set, UMI first.
pub fn nucleotides(header: &[u8], sequences: &[&[u8]], layout: &WordLayout) -> Vec<u8> {
    let mut out = Vec::with_capacity(layout.word_length());
    if layout.header > 0 {
        fit(extract_umi(header), layout.header, &mut out);
    }
    for (sequence, &length) in sequences.iter().zip(&layout.per_file) {
        fit(sequence, length, &mut out);
    }
    out
}

/// Encode a read set. `header` is the name of the first read.
///
/// Positions that are not ACGT are encoded as G and mark the word as
/// filtered.
pub fn make_word(header: &[u8], sequences: &[&[u8]], layout: &WordLayout) -> Word {
    let mut word = Word::default();
    for nucleotide in nucleotides(header, sequences, layout) {
        match encode(nucleotide) {
            Some(symbol) => word.data.push(symbol),
            None => {
                word.data.push(2);
                word.filtered = true;
            }
        }
    }
    word
}

use std::fmt;

use serde::{Serialize, Deserialize};

pub mod huffman_encoder;
pub mod huffman_decoder;

/// Code word type.
pub type Code = u32;

/// Width of [`Code`]; no requested code length may exceed it.
pub const CODE_BITS: u32 = Code::BITS;
/// Longest code either side will ever handle.
pub const MAX_CODE_BITS: u32 = 32;
/// Symbols are 16-bit indices.
pub const MAX_ALPHABET: usize = 1 << 16;
pub const DEFAULT_MAX_CODE_LEN: u32 = 15;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeEntry {
    pub symbol: u32,
    pub length: u32,
    pub code: Code,
}

/// Assigned codes of every symbol that has one, in symbol order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeTable {
    pub max_length: u32,
    pub entries: Vec<CodeEntry>,
}

impl CodeTable {
    /// Per-symbol lengths for an alphabet of `entry_cnt` symbols, 0 for unused ones.
    pub fn lengths(&self, entry_cnt: usize) -> Vec<u8> {
        let mut lengths = vec![0; entry_cnt];
        for e in self.entries.iter() {
            lengths[e.symbol as usize] = e.length as u8;
        }
        lengths
    }
}

impl fmt::Display for CodeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} codes, max length {}", self.entries.len(), self.max_length)?;
        for e in self.entries.iter() {
            writeln!(f, "{:>6} {:>3} {:0width$b}", e.symbol, e.length, e.code, width = e.length as usize)?;
        }
        Ok(())
    }
}

/// Shared view over a canonical code, implemented by both coder contexts.
pub trait Huffman {
    fn entry_cnt(&self) -> usize;

    fn max_length(&self) -> u32;

    /// Code length of `symbol`, 0 if it has no code.
    fn code_len(&self, symbol: usize) -> u32;

    fn code(&self, symbol: usize) -> Option<Code>;

    fn code_table(&self) -> CodeTable {
        let entries = (0..self.entry_cnt())
            .filter_map(|s| self.code(s).map(|code| CodeEntry { symbol: s as u32, length: self.code_len(s), code }))
            .collect();

        CodeTable { max_length: self.max_length(), entries }
    }
}

/// Number of symbols per code length, indexed by length (`[0]` counts unused symbols).
pub fn count_lengths(lengths: &[u8], max_len: u32) -> Vec<u32> {
    let mut counts = vec![0; max_len as usize + 1];
    for &len in lengths.iter() {
        counts[len as usize] += 1;
    }
    counts
}

/// First canonical code of every length, given the per-length counts.
///
/// The first code of length 1 is 0, and the first code of length `L` follows
/// the last code of length `L - 1` shifted left by one.
pub fn first_codes(counts: &[u32]) -> Vec<u64> {
    let mut first = vec![0; counts.len()];
    let mut code = 0u64;

    for len in 1..counts.len() {
        first[len] = code;
        code = (code + counts[len] as u64) << 1;
    }

    first
}

/// Kraft sum scaled by `2^max_len`: equal to `2^max_len` for a complete
/// code, smaller for an underfull one, larger if no prefix code exists.
pub fn kraft_sum(lengths: &[u8], max_len: u32) -> u64 {
    lengths.iter()
        .filter(|&&len| len != 0 && len as u32 <= max_len)
        .map(|&len| 1u64 << (max_len - len as u32))
        .sum()
}

/// Reverses the low `len` bits of `code`, for consumers that read LSB-first.
pub fn reverse_bits(code: Code, len: u32) -> Code {
    if len == 0 {
        return 0;
    }
    code.reverse_bits() >> (CODE_BITS - len)
}

/// Checks that no code is a prefix of another one.
pub fn is_prefix_free(entries: &[CodeEntry]) -> bool {
    let mut aligned: Vec<(u64, u32, Code)> = entries.iter()
        .map(|e| ((e.code as u64) << (64 - e.length), e.length, e.code))
        .collect();
    aligned.sort_unstable();

    // Codes sharing a prefix sort next to each other.
    !aligned.windows(2).any(|w| {
        let (_, short_len, short) = w[0];
        let (_, long_len, long) = w[1];
        long_len >= short_len && long >> (long_len - short_len) == short
    })
}

#[cfg(test)]
mod tests;

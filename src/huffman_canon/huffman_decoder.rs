use crate::{bitstreams::BitInput, error::{HuffError, Result}, mem::{charge_for, zeroed, MemContext, Workspace}};

use super::{count_lengths, first_codes, kraft_sum, Code, CodeEntry, CodeTable, Huffman, MAX_ALPHABET, MAX_CODE_BITS};

/// One decode step per code length.
#[derive(Clone, Copy, Default, Debug)]
struct Step {
    /// First canonical code of this length.
    code: Code,
    /// Position of that code's symbol in the canonical symbol order.
    index: u32,
    count: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DecodeState {
    LengthsSet,
    Reconstructed,
}

/// Canonical Huffman decoder.
///
/// Code lengths are set per symbol, then [`reconstruct_codes`](HuffmanDecoder::reconstruct_codes)
/// builds a step table holding, for every length, the first code of that
/// length and where its symbols start in canonical order. Decoding reads one
/// bit at a time and stops at the first length whose code range contains the
/// value read so far, so no tree is ever built.
#[derive(Debug)]
pub struct HuffmanDecoder<'a> {
    entry_cnt: usize,
    max_length: u32,
    lengths: Box<[u8]>,
    /// Symbols sorted by (length, symbol) once reconstructed.
    symbols: Box<[u16]>,
    steps: Box<[Step]>,
    state: DecodeState,
    workspace: Workspace<'a>,
}

impl Huffman for HuffmanDecoder<'_> {
    fn entry_cnt(&self) -> usize {
        self.entry_cnt
    }

    fn max_length(&self) -> u32 {
        self.max_length
    }

    fn code_len(&self, symbol: usize) -> u32 {
        self.lengths.get(symbol).map_or(0, |&len| len as u32)
    }

    fn code(&self, symbol: usize) -> Option<Code> {
        let len = self.code_len(symbol);
        if self.state != DecodeState::Reconstructed || len == 0 {
            return None;
        }

        // Symbols of one length are stored in increasing order.
        let step = self.steps[len as usize];
        let block = &self.symbols[step.index as usize..(step.index + step.count) as usize];
        block.binary_search(&(symbol as u16))
            .ok()
            .map(|rank| step.code + rank as Code)
    }

    fn code_table(&self) -> CodeTable {
        let mut entries = Vec::new();

        if self.state == DecodeState::Reconstructed {
            for len in 1..=self.max_length {
                let step = self.steps[len as usize];
                for rank in 0..step.count {
                    entries.push(CodeEntry {
                        symbol: self.symbols[(step.index + rank) as usize] as u32,
                        length: len,
                        code: step.code + rank,
                    });
                }
            }
        }

        entries.sort_unstable_by_key(|e| e.symbol);
        CodeTable { max_length: self.max_length, entries }
    }
}

impl<'a> HuffmanDecoder<'a> {
    /// Decoder for the symbols `0..=max_symbol`.
    pub fn init(mem: &'a dyn MemContext, max_symbol: usize) -> Result<Self> {
        if max_symbol >= MAX_ALPHABET {
            return Err(HuffError::InvalidConfiguration(
                format!("maximum symbol {} does not fit a 16-bit alphabet", max_symbol)));
        }

        let entry_cnt = max_symbol + 1;
        let steps = MAX_CODE_BITS as usize + 1;
        let workspace = Workspace::reserve(mem, &[
            charge_for::<u8>(entry_cnt),
            charge_for::<u16>(entry_cnt),
            charge_for::<Step>(steps),
        ])?;

        Ok(Self {
            entry_cnt,
            max_length: 0,
            lengths: zeroed(entry_cnt),
            symbols: zeroed(entry_cnt),
            steps: zeroed(steps),
            state: DecodeState::LengthsSet,
            workspace,
        })
    }

    /// Returns the tables to the arena. Dropping the decoder does the same.
    pub fn exit(self) {}

    /// Sets the code length of `symbol`; 0 marks it unused.
    pub fn set_length(&mut self, symbol: usize, length: u32) -> Result<()> {
        if self.state == DecodeState::Reconstructed {
            return Err(HuffError::InvalidState("code lengths cannot change after reconstruction"));
        }
        if symbol >= self.entry_cnt {
            return Err(HuffError::SymbolOutOfRange { symbol, alphabet: self.entry_cnt });
        }
        if length > MAX_CODE_BITS {
            return Err(HuffError::InvalidCodeLengths(
                format!("symbol {} has length {}, longer than {} bits", symbol, length, MAX_CODE_BITS)));
        }

        self.lengths[symbol] = length as u8;
        Ok(())
    }

    /// Sets the lengths of the symbols `0..lengths.len()`.
    pub fn set_lengths(&mut self, lengths: &[u8]) -> Result<()> {
        for (symbol, &len) in lengths.iter().enumerate() {
            self.set_length(symbol, len as u32)?;
        }
        Ok(())
    }

    /// Builds the canonical symbol order and the step table.
    ///
    /// Lengths over-subscribing the code space are rejected. Underfull codes
    /// are accepted; their unused bit patterns fail at decode time.
    pub fn reconstruct_codes(&mut self) -> Result<()> {
        if self.state == DecodeState::Reconstructed {
            return Err(HuffError::InvalidState("codes have already been reconstructed"));
        }

        let counts = count_lengths(&self.lengths, MAX_CODE_BITS);
        let max_length = counts.iter().skip(1).rposition(|&c| c != 0).map_or(0, |i| i as u32 + 1);

        if max_length > 0 && kraft_sum(&self.lengths, max_length) > 1u64 << max_length {
            return Err(HuffError::InvalidCodeLengths(
                "lengths over-subscribe the code space".to_string()));
        }

        let first = first_codes(&counts[..=max_length as usize]);

        self.steps.fill(Step::default());
        let mut index = 0;
        for len in 1..=max_length as usize {
            if counts[len] != 0 {
                self.steps[len] = Step { code: first[len] as Code, index, count: counts[len] };
            }
            index += counts[len];
        }

        // Counting sort of the symbols by length, symbol order kept within a length.
        let mut next = [0u32; MAX_CODE_BITS as usize + 1];
        for (len, n) in next.iter_mut().enumerate().take(max_length as usize + 1).skip(1) {
            *n = self.steps[len].index;
        }
        for (s, &len) in self.lengths.iter().enumerate() {
            if len == 0 {
                continue;
            }
            self.symbols[next[len as usize] as usize] = s as u16;
            next[len as usize] += 1;
        }

        self.max_length = max_length;
        self.state = DecodeState::Reconstructed;

        Ok(())
    }

    /// Decodes the next symbol from `input`.
    #[inline(always)]
    pub fn read_symbol<I: BitInput + ?Sized>(&self, input: &mut I) -> Result<u16> {
        if self.state != DecodeState::Reconstructed {
            return Err(HuffError::InvalidState("codes have not been reconstructed"));
        }

        let mut value = 0u64;

        for len in 1..=self.max_length {
            let bit = input.next_bit().ok_or(HuffError::StreamCorruption { bits_read: len - 1 })?;
            value = (value << 1) | bit as u64;

            let step = self.steps[len as usize];
            let offset = value.wrapping_sub(step.code as u64);
            if offset < step.count as u64 {
                return Ok(self.symbols[(step.index as u64 + offset) as usize]);
            }
        }

        Err(HuffError::StreamCorruption { bits_read: self.max_length })
    }

    /// Realigns `input` to its next boundary, e.g. at the end of a block.
    pub fn sync<I: BitInput + ?Sized>(&self, input: &mut I) {
        input.sync();
    }

    /// Bytes this context holds from its arena.
    pub fn reserved_bytes(&self) -> usize {
        self.workspace.charged()
    }

    pub fn is_reconstructed(&self) -> bool {
        self.state == DecodeState::Reconstructed
    }

    pub fn code_lengths(&self) -> &[u8] {
        &self.lengths
    }
}

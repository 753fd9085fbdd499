use std::{collections::BinaryHeap, cmp::Reverse};

use num_traits::ToPrimitive;

use crate::{bitstreams::BitOutput, error::{HuffError, Result}, mem::{charge_for, zeroed, MemContext, Workspace}};

use super::{first_codes, Code, Huffman, CODE_BITS, MAX_ALPHABET};

/// Canonical Huffman encoder.
///
/// Symbols are counted first, then [`create_coding`](HuffmanEncoder::create_coding)
/// freezes the frequencies and assigns a length-limited canonical code. The
/// frequency table stays readable after that; codes live in their own table.
#[derive(Debug)]
pub struct HuffmanEncoder<'a> {
    entry_cnt: usize,
    nonzero_entry_cnt: usize,
    max_length_requested: u32,
    max_length_assigned: u32,
    counts: Box<[u32]>,
    code_sizes: Box<[u8]>,
    codes: Box<[Code]>,
    /// Symbols per code length, `[0..=max_length_requested]`.
    code_count: Box<[u32]>,
    /// Next canonical code per code length while codes are being assigned.
    next_code: Box<[Code]>,
    coded: bool,
    workspace: Workspace<'a>,
}

impl Huffman for HuffmanEncoder<'_> {
    fn entry_cnt(&self) -> usize {
        self.entry_cnt
    }

    fn max_length(&self) -> u32 {
        self.max_length_assigned
    }

    fn code_len(&self, symbol: usize) -> u32 {
        self.code_sizes.get(symbol).map_or(0, |&len| len as u32)
    }

    fn code(&self, symbol: usize) -> Option<Code> {
        if !self.coded || self.code_len(symbol) == 0 {
            return None;
        }
        Some(self.codes[symbol])
    }
}

impl<'a> HuffmanEncoder<'a> {
    pub fn init(mem: &'a dyn MemContext, alphabet_size: usize, max_code_len: u32) -> Result<Self> {
        if alphabet_size == 0 || alphabet_size > MAX_ALPHABET {
            return Err(HuffError::InvalidConfiguration(
                format!("alphabet size {} outside 1..={}", alphabet_size, MAX_ALPHABET)));
        }
        if max_code_len == 0 || max_code_len > CODE_BITS {
            return Err(HuffError::InvalidConfiguration(
                format!("maximum code length {} outside 1..={}", max_code_len, CODE_BITS)));
        }
        if max_code_len < usize::BITS && alphabet_size > 1 << max_code_len {
            return Err(HuffError::InvalidConfiguration(
                format!("{} symbols cannot be coded in at most {} bits", alphabet_size, max_code_len)));
        }

        let lengths = max_code_len as usize + 1;
        let workspace = Workspace::reserve(mem, &[
            charge_for::<u32>(alphabet_size),
            charge_for::<u8>(alphabet_size),
            charge_for::<Code>(alphabet_size),
            charge_for::<u32>(lengths),
            charge_for::<Code>(lengths),
        ])?;

        Ok(Self {
            entry_cnt: alphabet_size,
            nonzero_entry_cnt: 0,
            max_length_requested: max_code_len,
            max_length_assigned: 0,
            counts: zeroed(alphabet_size),
            code_sizes: zeroed(alphabet_size),
            codes: zeroed(alphabet_size),
            code_count: zeroed(lengths),
            next_code: zeroed(lengths),
            coded: false,
            workspace,
        })
    }

    /// Returns the tables to the arena. Dropping the encoder does the same.
    pub fn exit(self) {}

    /// Adds `n` occurrences of `symbol`. Counts wrap on overflow.
    #[inline(always)]
    pub fn count_symbol(&mut self, symbol: usize, n: u32) -> Result<()> {
        if self.coded {
            return Err(HuffError::InvalidState("symbols cannot be counted once the coding exists"));
        }
        if symbol >= self.entry_cnt {
            return Err(HuffError::SymbolOutOfRange { symbol, alphabet: self.entry_cnt });
        }

        self.counts[symbol] = self.counts[symbol].wrapping_add(n);
        Ok(())
    }

    /// Counts every element of `data` once.
    ///
    /// An element that is not a valid index, e.g. a negative one, is reported
    /// as `SymbolOutOfRange` with its position in `data` as the symbol.
    pub fn count_symbols<T: ToPrimitive>(&mut self, data: &[T]) -> Result<()> {
        for (i, x) in data.iter().enumerate() {
            let symbol = x.to_usize().ok_or(HuffError::SymbolOutOfRange { symbol: i, alphabet: self.entry_cnt })?;
            self.count_symbol(symbol, 1)?;
        }
        Ok(())
    }

    /// Assigns a canonical code to every symbol with a nonzero count.
    pub fn create_coding(&mut self) -> Result<()> {
        if self.coded {
            return Err(HuffError::InvalidState("the coding has already been created"));
        }

        let symbols: Vec<usize> = (0..self.entry_cnt).filter(|&s| self.counts[s] != 0).collect();
        self.nonzero_entry_cnt = symbols.len();

        match symbols.len() {
            0 => {},
            // A lone symbol still needs one bit to be decodable.
            1 => self.code_sizes[symbols[0]] = 1,
            _ => {
                let weights: Vec<u64> = symbols.iter().map(|&s| self.counts[s] as u64).collect();

                let mut lengths = huffman_depths(&weights);
                if lengths.iter().any(|&len| len > self.max_length_requested) {
                    lengths = package_merge(&weights, self.max_length_requested);
                }

                for (&s, &len) in symbols.iter().zip(lengths.iter()) {
                    self.code_sizes[s] = len as u8;
                }
            }
        }

        self.assign_canonical_codes();
        self.coded = true;

        Ok(())
    }

    fn assign_canonical_codes(&mut self) {
        self.code_count.fill(0);
        for &len in self.code_sizes.iter() {
            if len != 0 {
                self.code_count[len as usize] += 1;
            }
        }

        self.max_length_assigned = self.code_count.iter().rposition(|&c| c != 0).unwrap_or(0) as u32;

        let first = first_codes(&self.code_count);
        for (next, &code) in self.next_code.iter_mut().zip(first.iter()) {
            *next = code as Code;
        }

        // Symbol order within a length gives the canonical (length, symbol) ordering.
        for (s, &len) in self.code_sizes.iter().enumerate() {
            if len == 0 {
                continue;
            }
            self.codes[s] = self.next_code[len as usize];
            self.next_code[len as usize] = self.next_code[len as usize].wrapping_add(1);
        }
    }

    /// Writes the code of `symbol` and returns its length.
    #[inline(always)]
    pub fn write_symbol<O: BitOutput + ?Sized>(&self, out: &mut O, symbol: usize) -> Result<u32> {
        if !self.coded {
            return Err(HuffError::InvalidState("the coding has not been created"));
        }
        if symbol >= self.entry_cnt {
            return Err(HuffError::SymbolOutOfRange { symbol, alphabet: self.entry_cnt });
        }

        let len = self.code_sizes[symbol] as u32;
        if len == 0 {
            return Err(HuffError::InvalidState("symbol was never counted and has no code"));
        }

        out.put_bits(self.codes[symbol], len);
        Ok(len)
    }

    pub fn frequency(&self, symbol: usize) -> u32 {
        self.counts[symbol]
    }

    pub fn code_lengths(&self) -> &[u8] {
        &self.code_sizes
    }

    /// Symbols per code length, indexed by length.
    pub fn code_counts(&self) -> &[u32] {
        &self.code_count
    }

    pub fn nonzero_entry_cnt(&self) -> usize {
        self.nonzero_entry_cnt
    }

    pub fn max_length_requested(&self) -> u32 {
        self.max_length_requested
    }

    pub fn max_length_assigned(&self) -> u32 {
        self.max_length_assigned
    }

    /// Bytes this context holds from its arena.
    pub fn reserved_bytes(&self) -> usize {
        self.workspace.charged()
    }

    pub fn is_coded(&self) -> bool {
        self.coded
    }

    /// Size in bits of the counted symbols once coded.
    pub fn encoded_bits(&self) -> u64 {
        self.counts.iter()
            .zip(self.code_sizes.iter())
            .map(|(&f, &len)| f as u64 * len as u64)
            .sum()
    }
}

/// Leaf depths of an unconstrained Huffman tree over `weights` (at least two).
///
/// Ties are broken by creation order, leaves first, so equal weights
/// give a balanced tree.
fn huffman_depths(weights: &[u64]) -> Vec<u32> {
    let n = weights.len();
    let mut parent = vec![0usize; 2 * n - 1];
    let mut freq_tree = BinaryHeap::with_capacity(n);

    for (i, &w) in weights.iter().enumerate() {
        freq_tree.push(Reverse((w, i)));
    }

    let mut next = n;
    while let Some(Reverse((w1, a))) = freq_tree.pop() {
        let Some(Reverse((w2, b))) = freq_tree.pop() else { break };

        parent[a] = next;
        parent[b] = next;
        freq_tree.push(Reverse((w1 + w2, next)));
        next += 1;
    }

    // Parents always come after their children, so one backward pass is enough.
    let root = 2 * n - 2;
    let mut depth = vec![0u32; 2 * n - 1];
    for i in (0..root).rev() {
        depth[i] = depth[parent[i]] + 1;
    }

    depth.truncate(n);
    depth
}

/// Optimal code lengths of at most `max_len` bits, by package-merge.
///
/// Requires `weights.len() <= 2^max_len`.
fn package_merge(weights: &[u64], max_len: u32) -> Vec<u32> {
    let n = weights.len();

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by_key(|&i| (weights[i], i));
    let leaves: Vec<(u64, bool)> = order.iter().map(|&i| (weights[i], true)).collect();

    // Each list holds (weight, is_leaf) sorted by weight. A package of list
    // `i` pairs two consecutive items of list `i - 1`.
    let mut lists: Vec<Vec<(u64, bool)>> = Vec::with_capacity(max_len as usize);
    lists.push(leaves.clone());

    for _ in 1..max_len {
        let prev = &lists[lists.len() - 1];
        let packages: Vec<(u64, bool)> = prev.chunks_exact(2).map(|p| (p[0].0 + p[1].0, false)).collect();

        let mut merged = Vec::with_capacity(n + packages.len());
        let (mut i, mut j) = (0, 0);
        while i < leaves.len() || j < packages.len() {
            if j >= packages.len() || (i < leaves.len() && leaves[i].0 <= packages[j].0) {
                merged.push(leaves[i]);
                i += 1;
            } else {
                merged.push(packages[j]);
                j += 1;
            }
        }

        lists.push(merged);
    }

    // Select the cheapest 2n - 2 items of the last list and unfold the
    // selected packages level by level. Every time a leaf is selected its
    // symbol gets one more bit. Selected leaves are always the lightest ones.
    let mut sorted_lengths = vec![0u32; n];
    let mut take = 2 * n - 2;

    for list in lists.iter().rev() {
        let leaves_taken = list.iter().take(take).filter(|item| item.1).count();
        for len in sorted_lengths.iter_mut().take(leaves_taken) {
            *len += 1;
        }
        take = 2 * (take - leaves_taken);
    }

    let mut lengths = vec![0u32; n];
    for (&i, &len) in order.iter().zip(sorted_lengths.iter()) {
        lengths[i] = len;
    }

    lengths
}

#[test]
fn test_huffman_depths_balanced() {
    let depths = huffman_depths(&[1; 8]);
    assert_eq!(depths, vec![3; 8]);
}

#[test]
fn test_package_merge_matches_huffman_when_unconstrained() {
    let weights = [5, 9, 12, 13, 16];
    assert_eq!(package_merge(&weights, 8), vec![3, 3, 2, 2, 2]);
    assert_eq!(huffman_depths(&weights), vec![3, 3, 2, 2, 2]);
}

#[test]
fn test_package_merge_limits_lengths() {
    // Fibonacci weights give a maximally skewed tree.
    let weights = [1, 1, 2, 3, 5, 8, 13, 21];
    assert_eq!(*huffman_depths(&weights).iter().max().unwrap(), 7);

    let lengths = package_merge(&weights, 4);
    assert!(lengths.iter().all(|&len| len <= 4));

    let kraft: u64 = lengths.iter().map(|&len| 1u64 << (4 - len)).sum();
    assert_eq!(kraft, 16);
}

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{bitstreams::{BinaryReader, BinaryWriterBuilder}, error::HuffError, mem::MemArena};

use super::{
    count_lengths, first_codes, is_prefix_free, kraft_sum, reverse_bits,
    huffman_decoder::HuffmanDecoder, huffman_encoder::HuffmanEncoder,
    CodeEntry, Huffman, MAX_CODE_BITS,
};

fn build_encoder<'a>(arena: &'a MemArena, freqs: &[u32], max_code_len: u32) -> HuffmanEncoder<'a> {
    let mut huff_encoder = HuffmanEncoder::init(arena, freqs.len(), max_code_len).unwrap();
    for (s, &f) in freqs.iter().enumerate() {
        huff_encoder.count_symbol(s, f).unwrap();
    }
    huff_encoder.create_coding().unwrap();
    huff_encoder
}

fn build_decoder<'a>(arena: &'a MemArena, lengths: &[u8]) -> HuffmanDecoder<'a> {
    let mut huff_decoder = HuffmanDecoder::init(arena, lengths.len() - 1).unwrap();
    huff_decoder.set_lengths(lengths).unwrap();
    huff_decoder.reconstruct_codes().unwrap();
    huff_decoder
}

fn random_freqs(rng: &mut StdRng, alphabet: usize) -> Vec<u32> {
    (0..alphabet)
        .map(|_| if rng.gen_bool(0.2) { 0 } else { rng.gen_range(1..10_000) })
        .collect()
}

#[test]
fn test_first_codes() {
    // Lengths 2, 2, 2, 3, 3
    let counts = count_lengths(&[3, 3, 2, 2, 2], 3);
    assert_eq!(counts, vec![0, 0, 3, 2]);
    assert_eq!(first_codes(&counts), vec![0, 0, 0, 6]);
}

#[test]
fn test_kraft_sum() {
    assert_eq!(kraft_sum(&[3, 3, 2, 2, 2], 3), 8);
    assert_eq!(kraft_sum(&[1, 0, 0], 1), 1);
    assert_eq!(kraft_sum(&[1, 1, 1], 1), 3);
}

#[test]
fn test_reverse_bits() {
    assert_eq!(reverse_bits(0b110, 3), 0b011);
    assert_eq!(reverse_bits(0b1, 1), 0b1);
    assert_eq!(reverse_bits(0x8000_0000, 32), 1);
    assert_eq!(reverse_bits(0, 0), 0);
}

#[test]
fn test_is_prefix_free() {
    let good = [
        CodeEntry { symbol: 0, length: 1, code: 0b0 },
        CodeEntry { symbol: 1, length: 2, code: 0b10 },
        CodeEntry { symbol: 2, length: 2, code: 0b11 },
    ];
    assert!(is_prefix_free(&good));

    let bad = [
        CodeEntry { symbol: 0, length: 1, code: 0b1 },
        CodeEntry { symbol: 1, length: 2, code: 0b10 },
    ];
    assert!(!is_prefix_free(&bad));
}

#[test]
fn test_concrete_scenario() {
    let arena = MemArena::unbounded();
    let freqs = [5, 9, 12, 13, 16];
    let huff_encoder = build_encoder(&arena, &freqs, 8);

    assert_eq!(huff_encoder.code_lengths(), &[3, 3, 2, 2, 2]);
    assert_eq!(huff_encoder.max_length_assigned(), 3);
    assert_eq!(huff_encoder.nonzero_entry_cnt(), 5);

    // C, D, E take 00, 01, 10 and A, B follow with 110, 111.
    assert_eq!(huff_encoder.code(2), Some(0b00));
    assert_eq!(huff_encoder.code(3), Some(0b01));
    assert_eq!(huff_encoder.code(4), Some(0b10));
    assert_eq!(huff_encoder.code(0), Some(0b110));
    assert_eq!(huff_encoder.code(1), Some(0b111));

    assert_eq!(huff_encoder.encoded_bits(), 124);

    // No other Kraft-complete assignment of at most 8 bits is cheaper.
    fn best(freqs: &[u32], lengths: &mut Vec<u32>, best_cost: &mut u64) {
        if lengths.len() == freqs.len() {
            let kraft: u64 = lengths.iter().map(|&l| 1u64 << (8 - l)).sum();
            if kraft <= 256 {
                let cost: u64 = freqs.iter().zip(lengths.iter()).map(|(&f, &l)| f as u64 * l as u64).sum();
                *best_cost = (*best_cost).min(cost);
            }
            return;
        }
        for l in 1..=4 {
            lengths.push(l);
            best(freqs, lengths, best_cost);
            lengths.pop();
        }
    }
    let mut best_cost = u64::MAX;
    best(&freqs, &mut Vec::new(), &mut best_cost);
    assert_eq!(best_cost, 124);

    huff_encoder.exit();
    assert_eq!(arena.in_use(), 0);
}

#[test]
fn test_uniform_256_symbols() {
    let arena = MemArena::unbounded();
    let huff_encoder = build_encoder(&arena, &[1; 256], 8);

    assert!(huff_encoder.code_lengths().iter().all(|&len| len == 8));
    for s in 0..256 {
        assert_eq!(huff_encoder.code(s), Some(s as u32));
    }
}

#[test]
fn test_single_symbol() {
    let arena = MemArena::unbounded();
    let mut freqs = [0; 10];
    freqs[7] = 42;
    let huff_encoder = build_encoder(&arena, &freqs, 8);

    assert_eq!(huff_encoder.code_len(7), 1);
    assert_eq!(huff_encoder.code(7), Some(0));
    assert_eq!(huff_encoder.max_length_assigned(), 1);

    let mut writer = BinaryWriterBuilder::new();
    for _ in 0..5 {
        huff_encoder.write_symbol(&mut writer, 7).unwrap();
    }
    assert_eq!(writer.written_bits, 5);

    let huff_decoder = build_decoder(&arena, huff_encoder.code_lengths());
    let mut reader = BinaryReader::new(writer.build().os);
    for _ in 0..5 {
        assert_eq!(huff_decoder.read_symbol(&mut reader).unwrap(), 7);
    }
}

#[test]
fn test_no_symbols() {
    let arena = MemArena::unbounded();
    let huff_encoder = build_encoder(&arena, &[0; 4], 8);

    assert_eq!(huff_encoder.max_length_assigned(), 0);
    assert!(huff_encoder.code_table().entries.is_empty());

    let huff_decoder = build_decoder(&arena, huff_encoder.code_lengths());
    let mut reader = BinaryReader::new(vec![0xFF].into_boxed_slice());
    assert!(matches!(huff_decoder.read_symbol(&mut reader), Err(HuffError::StreamCorruption { bits_read: 0 })));
}

#[test]
fn test_length_limit() {
    let arena = MemArena::unbounded();

    // Fibonacci frequencies would need 19 bits unconstrained.
    let mut freqs = vec![1u32, 1];
    while freqs.len() < 20 {
        let n = freqs.len();
        freqs.push(freqs[n - 1] + freqs[n - 2]);
    }

    for max_code_len in [5, 6, 8, 12, 19, 32] {
        let huff_encoder = build_encoder(&arena, &freqs, max_code_len);
        let lengths = huff_encoder.code_lengths();

        assert!(lengths.iter().all(|&len| len >= 1 && len as u32 <= max_code_len));
        assert!(huff_encoder.max_length_assigned() <= max_code_len);

        let max = huff_encoder.max_length_assigned();
        assert_eq!(kraft_sum(lengths, max), 1 << max);
        assert!(is_prefix_free(&huff_encoder.code_table().entries));

        huff_encoder.exit();
    }

    assert_eq!(arena.in_use(), 0);
}

#[test]
fn test_random_distributions_are_prefix_free_and_complete() {
    let mut rng = StdRng::seed_from_u64(0x5EED);
    let arena = MemArena::unbounded();

    for _ in 0..50 {
        let alphabet = rng.gen_range(2..600);
        let max_code_len = rng.gen_range(10..=MAX_CODE_BITS);
        let mut freqs = random_freqs(&mut rng, alphabet);
        freqs[0] = 1;
        freqs[1] = 1;

        let huff_encoder = build_encoder(&arena, &freqs, max_code_len);
        let table = huff_encoder.code_table();

        assert!(is_prefix_free(&table.entries));
        assert_eq!(table.entries.len(), huff_encoder.nonzero_entry_cnt());
        assert!(table.max_length <= max_code_len);

        let max = table.max_length;
        assert_eq!(kraft_sum(huff_encoder.code_lengths(), max), 1u64 << max);

        huff_encoder.exit();
    }
}

#[test]
fn test_canonical_determinism() {
    let mut rng = StdRng::seed_from_u64(7);
    let freqs = random_freqs(&mut rng, 300);

    let arena = MemArena::unbounded();
    let first = build_encoder(&arena, &freqs, 9);
    let second = build_encoder(&arena, &freqs, 9);

    assert_eq!(first.code_table(), second.code_table());
}

#[test]
fn test_decoder_reconstructs_encoder_codes() {
    let mut rng = StdRng::seed_from_u64(11);
    let arena = MemArena::unbounded();

    for max_code_len in [8, 11, 15] {
        let freqs = random_freqs(&mut rng, 200);
        let huff_encoder = build_encoder(&arena, &freqs, max_code_len);
        let huff_decoder = build_decoder(&arena, huff_encoder.code_lengths());

        assert_eq!(huff_decoder.max_length(), huff_encoder.max_length_assigned());
        assert_eq!(huff_decoder.code_table(), huff_encoder.code_table());
        for s in 0..freqs.len() {
            assert_eq!(huff_decoder.code(s), huff_encoder.code(s));
        }

        huff_encoder.exit();
        huff_decoder.exit();
    }

    assert_eq!(arena.in_use(), 0);
}

#[test]
fn test_round_trip_every_symbol() {
    let mut rng = StdRng::seed_from_u64(42);
    let arena = MemArena::unbounded();

    let freqs = random_freqs(&mut rng, 256);
    let huff_encoder = build_encoder(&arena, &freqs, 12);

    let mut writer = BinaryWriterBuilder::new();
    let present: Vec<usize> = (0..freqs.len()).filter(|&s| freqs[s] != 0).collect();
    for &s in present.iter() {
        huff_encoder.write_symbol(&mut writer, s).unwrap();
    }

    let huff_decoder = build_decoder(&arena, huff_encoder.code_lengths());
    let mut reader = BinaryReader::new(writer.build().os);

    for &s in present.iter() {
        assert_eq!(huff_decoder.read_symbol(&mut reader).unwrap() as usize, s);
    }
}

#[test]
fn test_round_trip_message() {
    let mut rng = StdRng::seed_from_u64(3);
    let message: Vec<u8> = (0..20_000)
        .map(|_| (rng.gen_range(0..64u32) * rng.gen_range(0..4u32)) as u8)
        .collect();

    let arena = MemArena::with_capacity(1 << 14);

    let mut huff_encoder = HuffmanEncoder::init(&arena, 256, 10).unwrap();
    huff_encoder.count_symbols(&message).unwrap();
    huff_encoder.create_coding().unwrap();

    let mut writer = BinaryWriterBuilder::new();
    let mut bits = 0;
    for &b in message.iter() {
        bits += huff_encoder.write_symbol(&mut writer, b as usize).unwrap() as u64;
    }
    assert_eq!(bits, huff_encoder.encoded_bits());
    assert_eq!(writer.written_bits as u64, bits);

    let huff_decoder = build_decoder(&arena, huff_encoder.code_lengths());
    let mut reader = BinaryReader::new(writer.build().os);

    for &b in message.iter() {
        assert_eq!(huff_decoder.read_symbol(&mut reader).unwrap(), b as u16);
    }

    huff_encoder.exit();
    huff_decoder.exit();
    assert_eq!(arena.in_use(), 0);
}

#[test]
fn test_blocks_with_sync() {
    let arena = MemArena::unbounded();
    let huff_encoder = build_encoder(&arena, &[5, 9, 12, 13, 16], 8);

    let blocks = [vec![0, 1, 2], vec![4, 4, 3, 0], vec![1]];

    let mut writer = BinaryWriterBuilder::new();
    for block in blocks.iter() {
        for &s in block.iter() {
            huff_encoder.write_symbol(&mut writer, s).unwrap();
        }
        crate::bitstreams::BitOutput::sync(&mut writer);
    }

    let huff_decoder = build_decoder(&arena, huff_encoder.code_lengths());
    let mut reader = BinaryReader::new(writer.build().os);

    for block in blocks.iter() {
        for &s in block.iter() {
            assert_eq!(huff_decoder.read_symbol(&mut reader).unwrap() as usize, s);
        }
        huff_decoder.sync(&mut reader);
        assert_eq!(reader.read_bits % 8, 0);
    }
    assert_eq!(reader.bits_left(), 0);
}

#[test]
fn test_underfull_code_decodes_valid_subset() {
    let arena = MemArena::unbounded();

    // 0 -> 0, 1 -> 10; the pattern 11 is unused.
    let huff_decoder = build_decoder(&arena, &[1, 2, 0]);
    assert!(kraft_sum(&[1, 2, 0], 2) < 4);

    let mut reader = BinaryReader::new(vec![0b0101_1000].into_boxed_slice());
    assert_eq!(huff_decoder.read_symbol(&mut reader).unwrap(), 0);
    assert_eq!(huff_decoder.read_symbol(&mut reader).unwrap(), 1);
    assert!(matches!(huff_decoder.read_symbol(&mut reader), Err(HuffError::StreamCorruption { bits_read: 2 })));
}

#[test]
fn test_over_subscribed_lengths_rejected() {
    let arena = MemArena::unbounded();
    let mut huff_decoder = HuffmanDecoder::init(&arena, 2).unwrap();
    huff_decoder.set_lengths(&[1, 1, 1]).unwrap();

    let res = huff_decoder.reconstruct_codes();
    assert!(matches!(res, Err(HuffError::InvalidCodeLengths(_))));
    assert_eq!(res.unwrap_err().code(), 4);
}

#[test]
fn test_length_above_ceiling_rejected() {
    let arena = MemArena::unbounded();
    let mut huff_decoder = HuffmanDecoder::init(&arena, 3).unwrap();

    assert!(huff_decoder.set_length(0, MAX_CODE_BITS).is_ok());
    assert!(matches!(huff_decoder.set_length(1, MAX_CODE_BITS + 1), Err(HuffError::InvalidCodeLengths(_))));
    assert!(matches!(huff_decoder.set_length(4, 1), Err(HuffError::SymbolOutOfRange { symbol: 4, alphabet: 4 })));
}

#[test]
fn test_end_of_stream_inside_code() {
    let arena = MemArena::unbounded();
    let huff_decoder = build_decoder(&arena, &[3, 3, 2, 2, 2]);

    // 0b11 followed by nothing.
    let mut writer = BinaryWriterBuilder::new();
    writer.push_bits(0b1111_1111, 8);
    let mut reader = BinaryReader::new(writer.build().os);

    assert_eq!(huff_decoder.read_symbol(&mut reader).unwrap(), 1);
    assert_eq!(huff_decoder.read_symbol(&mut reader).unwrap(), 1);
    assert!(matches!(huff_decoder.read_symbol(&mut reader), Err(HuffError::StreamCorruption { bits_read: 2 })));
}

#[test]
fn test_decoder_state_machine() {
    let arena = MemArena::unbounded();
    let mut huff_decoder = HuffmanDecoder::init(&arena, 4).unwrap();
    let mut reader = BinaryReader::new(vec![0].into_boxed_slice());

    assert!(!huff_decoder.is_reconstructed());
    assert!(matches!(huff_decoder.read_symbol(&mut reader), Err(HuffError::InvalidState(_))));
    assert_eq!(huff_decoder.code(0), None);

    huff_decoder.set_lengths(&[1, 1]).unwrap();
    huff_decoder.reconstruct_codes().unwrap();
    assert!(huff_decoder.is_reconstructed());

    assert!(matches!(huff_decoder.set_length(2, 1), Err(HuffError::InvalidState(_))));
    assert!(matches!(huff_decoder.reconstruct_codes(), Err(HuffError::InvalidState(_))));
    assert_eq!(huff_decoder.read_symbol(&mut reader).unwrap(), 0);
}

#[test]
fn test_encoder_state_machine() {
    let arena = MemArena::unbounded();
    let mut huff_encoder = HuffmanEncoder::init(&arena, 4, 8).unwrap();
    let mut writer = BinaryWriterBuilder::new();

    assert!(matches!(huff_encoder.write_symbol(&mut writer, 0), Err(HuffError::InvalidState(_))));
    assert!(matches!(huff_encoder.count_symbol(4, 1), Err(HuffError::SymbolOutOfRange { .. })));

    huff_encoder.count_symbol(0, 3).unwrap();
    huff_encoder.count_symbol(0, 2).unwrap();
    huff_encoder.count_symbol(2, 1).unwrap();
    assert_eq!(huff_encoder.frequency(0), 5);
    huff_encoder.create_coding().unwrap();

    assert!(huff_encoder.is_coded());
    assert_eq!(huff_encoder.frequency(0), 5);
    assert!(matches!(huff_encoder.count_symbol(1, 1), Err(HuffError::InvalidState(_))));
    assert!(matches!(huff_encoder.create_coding(), Err(HuffError::InvalidState(_))));
    assert!(matches!(huff_encoder.write_symbol(&mut writer, 1), Err(HuffError::InvalidState(_))));
    assert_eq!(huff_encoder.write_symbol(&mut writer, 2).unwrap(), 1);
}

#[test]
fn test_count_wraps_on_overflow() {
    let arena = MemArena::unbounded();
    let mut huff_encoder = HuffmanEncoder::init(&arena, 2, 8).unwrap();

    huff_encoder.count_symbol(0, u32::MAX).unwrap();
    huff_encoder.count_symbol(0, 2).unwrap();
    assert_eq!(huff_encoder.frequency(0), 1);
}

#[test]
fn test_invalid_configuration() {
    let arena = MemArena::unbounded();

    assert!(matches!(HuffmanEncoder::init(&arena, 0, 8), Err(HuffError::InvalidConfiguration(_))));
    assert!(matches!(HuffmanEncoder::init(&arena, 16, 0), Err(HuffError::InvalidConfiguration(_))));
    assert!(matches!(HuffmanEncoder::init(&arena, 16, 33), Err(HuffError::InvalidConfiguration(_))));
    assert!(matches!(HuffmanEncoder::init(&arena, 257, 8), Err(HuffError::InvalidConfiguration(_))));
    assert!(matches!(HuffmanEncoder::init(&arena, 1 << 16 | 1, 32), Err(HuffError::InvalidConfiguration(_))));
    assert!(matches!(HuffmanDecoder::init(&arena, 1 << 16), Err(HuffError::InvalidConfiguration(_))));

    assert!(HuffmanEncoder::init(&arena, 256, 8).is_ok());
    assert_eq!(HuffmanEncoder::init(&arena, 0, 8).unwrap_err().code(), 2);
}

#[test]
fn test_out_of_memory_at_init() {
    let arena = MemArena::with_capacity(64);

    let res = HuffmanEncoder::init(&arena, 256, 15);
    assert!(matches!(res, Err(HuffError::OutOfMemory { .. })));
    assert_eq!(res.unwrap_err().code(), 1);

    assert!(matches!(HuffmanDecoder::init(&arena, 255), Err(HuffError::OutOfMemory { .. })));
    assert_eq!(arena.in_use(), 0);
    assert_eq!(arena.allocations(), 0);
}

#[test]
fn test_sessions_on_separate_threads() {
    let handles: Vec<_> = (0..4u64)
        .map(|seed| std::thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(seed);
            let arena = MemArena::with_capacity(1 << 12);
            let freqs = random_freqs(&mut rng, 64);
            let huff_encoder = build_encoder(&arena, &freqs, 8);
            let table = huff_encoder.code_table();
            huff_encoder.exit();
            (table, arena.in_use())
        }))
        .collect();

    for handle in handles {
        let (table, in_use) = handle.join().unwrap();
        assert!(is_prefix_free(&table.entries));
        assert_eq!(in_use, 0);
    }
}

#[test]
fn test_dropped_contexts_return_their_memory() {
    let arena = MemArena::with_capacity(4096);

    let huff_encoder = HuffmanEncoder::init(&arena, 256, 15).unwrap();
    assert_eq!(arena.in_use(), huff_encoder.reserved_bytes());
    drop(huff_encoder);
    assert_eq!(arena.in_use(), 0);
    assert_eq!(arena.allocations(), 0);

    // A session abandoned half way through by an error.
    fn failing_session(arena: &MemArena) -> crate::error::Result<()> {
        let mut huff_encoder = HuffmanEncoder::init(arena, 256, 15)?;
        huff_encoder.count_symbols(&[1u16, 2, 300])?;
        huff_encoder.exit();
        Ok(())
    }
    for _ in 0..3 {
        assert!(matches!(failing_session(&arena), Err(HuffError::SymbolOutOfRange { symbol: 300, .. })));
        assert_eq!(arena.in_use(), 0);
    }

    let huff_encoder = HuffmanEncoder::init(&arena, 256, 15).unwrap();
    let huff_decoder = HuffmanDecoder::init(&arena, 255).unwrap();
    assert_eq!(arena.in_use(), huff_encoder.reserved_bytes() + huff_decoder.reserved_bytes());
    drop(huff_decoder);
    drop(huff_encoder);
    assert_eq!(arena.in_use(), 0);
}

#[test]
fn test_count_symbols_reports_position_of_invalid_element() {
    let arena = MemArena::unbounded();
    let mut huff_encoder = HuffmanEncoder::init(&arena, 16, 8).unwrap();

    let res = huff_encoder.count_symbols(&[3i32, 5, -1, 2]);
    assert!(matches!(res, Err(HuffError::SymbolOutOfRange { symbol: 2, alphabet: 16 })));
    assert_eq!(huff_encoder.frequency(3), 1);
    assert_eq!(huff_encoder.frequency(5), 1);
    assert_eq!(huff_encoder.frequency(2), 0);
}

#[test]
fn test_decoder_code_lookup_over_large_blocks() {
    let arena = MemArena::unbounded();

    // 4096 symbols of 12 bits and 4096 unused ones interleaved.
    let lengths: Vec<u8> = (0..8192).map(|s| if s % 2 == 0 { 12 } else { 0 }).collect();
    let huff_decoder = build_decoder(&arena, &lengths);

    for s in 0..lengths.len() {
        let expected = if s % 2 == 0 { Some((s / 2) as u32) } else { None };
        assert_eq!(huff_decoder.code(s), expected);
    }
    assert_eq!(huff_decoder.code_table().entries.len(), 4096);
}

use std::{fs, process};

use clap::Parser;
use huff_canon::{
    bitstreams::BinaryReader, properties::Properties, utils::timer::Timer,
    HuffError, HuffmanDecoder, MemArena,
};

#[derive(Parser, Debug)]
#[command(about = "Decode a file written by compress_huff")]
struct Args {
    /// The basename of the coded file
    source_name: String,
    /// The file to be written
    dest_name: String,
}

/// Decodes `symbols` bytes from `reader`.
fn decode_bytes(huff_decoder: &HuffmanDecoder, reader: &mut BinaryReader, symbols: u64) -> Result<Vec<u8>, HuffError> {
    // Every code takes at least one bit.
    if symbols > reader.bits_left() as u64 {
        return Err(HuffError::StreamCorruption { bits_read: 0 });
    }

    let mut out = Vec::with_capacity(symbols as usize);
    for _ in 0..symbols {
        out.push(huff_decoder.read_symbol(reader)? as u8);
    }
    Ok(out)
}

fn run(args: &Args) -> Result<(), HuffError> {
    let props = Properties::load(&format!("{}.properties", args.source_name))?;

    if props.alphabet_size != 256 {
        return Err(HuffError::Config(format!("Only byte alphabets can be decoded, found {} symbols", props.alphabet_size)));
    }

    let lengths: Vec<u8> = bincode::deserialize(&fs::read(format!("{}.lengths", args.source_name))?)
        .map_err(|e| HuffError::Config(format!("Failed deserializing the code lengths: {}", e)))?;
    let stream = fs::read(format!("{}.huff", args.source_name))?;

    let arena = match props.arena_bytes {
        Some(bytes) => MemArena::with_capacity(bytes),
        None => MemArena::unbounded(),
    };

    let mut timer = Timer::new();

    timer.start();
    let mut huff_decoder = HuffmanDecoder::init(&arena, props.alphabet_size - 1)?;
    huff_decoder.set_lengths(&lengths)?;
    huff_decoder.reconstruct_codes()?;
    let reconstruction_time = timer.stop();

    timer.start();
    let mut reader = BinaryReader::new(stream.into_boxed_slice());
    let out = decode_bytes(&huff_decoder, &mut reader, props.symbols)?;
    huff_decoder.sync(&mut reader);
    let decoding_time = timer.stop();

    if reader.read_bits as u64 != (props.encoded_bits + 7) / 8 * 8 {
        eprintln!("warning: {} bits read, {} expected", reader.read_bits, props.encoded_bits);
    }

    fs::write(&args.dest_name, &out)?;

    println!("decoded {} symbols", out.len());
    println!("reconstructed the code in {}ns, decoded in {}ns", reconstruction_time, decoding_time);

    huff_decoder.exit();
    Ok(())
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("{}", e);
        process::exit(e.code());
    }
}

#[test]
fn test_symbol_count_larger_than_stream() {
    let arena = MemArena::unbounded();
    let mut huff_decoder = HuffmanDecoder::init(&arena, 255).unwrap();
    huff_decoder.set_lengths(&[8; 256]).unwrap();
    huff_decoder.reconstruct_codes().unwrap();

    for symbols in [u64::MAX, 100_000_000_000, 25] {
        let mut reader = BinaryReader::new(vec![7, 42, 255].into_boxed_slice());
        let res = decode_bytes(&huff_decoder, &mut reader, symbols);
        assert!(matches!(res, Err(HuffError::StreamCorruption { bits_read: 0 })));
        assert_eq!(res.unwrap_err().code(), 3);
    }

    let mut reader = BinaryReader::new(vec![7, 42, 255].into_boxed_slice());
    assert_eq!(decode_bytes(&huff_decoder, &mut reader, 3).unwrap(), vec![7, 42, 255]);
}

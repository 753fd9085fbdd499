use std::{fs, process};

use clap::Parser;
use huff_canon::{HuffError, Huffman, HuffmanEncoder, MemArena, DEFAULT_MAX_CODE_LEN};

#[derive(Parser, Debug)]
#[command(about = "Print the canonical Huffman code of the bytes of a file")]
struct Args {
    /// The file whose byte frequencies are coded
    source_name: String,
    /// The maximum code length
    #[arg(short, long, default_value_t = DEFAULT_MAX_CODE_LEN)]
    max_code_len: u32,
    /// Print the table as JSON
    #[arg(short, long, default_value_t = false)]
    json: bool,
}

fn run(args: &Args) -> Result<(), HuffError> {
    let data = fs::read(&args.source_name)?;

    let arena = MemArena::unbounded();
    let mut huff_encoder = HuffmanEncoder::init(&arena, 256, args.max_code_len)?;
    huff_encoder.count_symbols(&data)?;
    huff_encoder.create_coding()?;

    let table = huff_encoder.code_table();

    if args.json {
        let out = serde_json::to_string_pretty(&table)
            .map_err(|e| HuffError::Config(format!("Failed serializing the code table: {}", e)))?;
        println!("{}", out);
    } else {
        print!("{}", table);
        println!(
            "{} bytes -> {} bits ({:.3} bits per byte)",
            data.len(),
            huff_encoder.encoded_bits(),
            if data.is_empty() { 0.0 } else { huff_encoder.encoded_bits() as f64 / data.len() as f64 }
        );
    }

    huff_encoder.exit();
    Ok(())
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("{}", e);
        process::exit(e.code());
    }
}

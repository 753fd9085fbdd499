use std::{fs, process};

use clap::Parser;
use huff_canon::{
    bitstreams::BinaryWriterBuilder, properties::Properties, utils::timer::Timer,
    HuffError, HuffmanEncoder, MemArena,
};

#[derive(Parser, Debug)]
#[command(about = "Huffman-code the bytes of a file with a length-limited canonical code")]
struct Args {
    /// The file to be coded
    source_name: String,
    /// The destination basename (.huff, .lengths and .properties are written)
    dest_name: String,
    /// A .properties file with the coding parameters
    #[arg(short, long)]
    config: Option<String>,
    /// The maximum code length, overrides the configuration
    #[arg(short, long)]
    max_code_len: Option<u32>,
    /// The arena budget in bytes, overrides the configuration
    #[arg(short, long)]
    arena_bytes: Option<usize>,
}

/// The coding parameters: the configuration file, overridden by the command line.
fn coding_properties(args: &Args) -> Result<Properties, HuffError> {
    let mut props = match &args.config {
        Some(path) => Properties::load(path)?,
        None => Properties::default(),
    };
    if let Some(max_code_len) = args.max_code_len {
        props.max_code_len = max_code_len;
    }
    if let Some(arena_bytes) = args.arena_bytes {
        props.arena_bytes = Some(arena_bytes);
    }
    if props.alphabet_size != 256 {
        return Err(HuffError::Config(format!("Only byte alphabets can be coded, configured {} symbols", props.alphabet_size)));
    }

    Ok(props)
}

fn run(args: &Args) -> Result<(), HuffError> {
    let mut props = coding_properties(args)?;

    let data = fs::read(&args.source_name)?;

    let arena = match props.arena_bytes {
        Some(bytes) => MemArena::with_capacity(bytes),
        None => MemArena::unbounded(),
    };

    let mut timer = Timer::new();

    timer.start();
    let mut huff_encoder = HuffmanEncoder::init(&arena, props.alphabet_size, props.max_code_len)?;
    huff_encoder.count_symbols(&data)?;
    huff_encoder.create_coding()?;
    let coding_time = timer.stop();

    timer.start();
    let mut writer = BinaryWriterBuilder::new();
    for &b in data.iter() {
        huff_encoder.write_symbol(&mut writer, b as usize)?;
    }
    writer.align();
    let writing_time = timer.stop();

    props.symbols = data.len() as u64;
    props.encoded_bits = huff_encoder.encoded_bits();

    let lengths = bincode::serialize(&huff_encoder.code_lengths().to_vec())
        .map_err(|e| HuffError::Config(format!("Failed serializing the code lengths: {}", e)))?;

    fs::write(format!("{}.huff", args.dest_name), writer.build().os)?;
    fs::write(format!("{}.lengths", args.dest_name), lengths)?;
    props.store(&format!("{}.properties", args.dest_name))?;

    println!("{} symbols, {} distinct, max code length {}", data.len(), huff_encoder.nonzero_entry_cnt(), huff_encoder.max_length_assigned());
    println!("{} bytes -> {} bytes", data.len(), (props.encoded_bits + 7) / 8);
    println!("built the code in {}ns, wrote the stream in {}ns", coding_time, writing_time);
    println!("arena peak {} bytes", arena.peak());

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

#[test]
fn test_configured_alphabet_must_be_bytes() {
    let dir = std::env::temp_dir();
    let path = dir.join(format!("compress_huff_alphabet_{}.properties", process::id()));
    let path = path.to_str().unwrap().to_string();

    let mut args = Args {
        source_name: String::new(),
        dest_name: String::new(),
        config: Some(path.clone()),
        max_code_len: Some(12),
        arena_bytes: None,
    };

    Properties { alphabet_size: 16, ..Properties::default() }.store(&path).unwrap();
    let res = coding_properties(&args);
    assert!(matches!(res, Err(HuffError::Config(_))));
    assert_eq!(res.unwrap_err().code(), 8);

    Properties { max_code_len: 9, ..Properties::default() }.store(&path).unwrap();
    let props = coding_properties(&args).unwrap();
    assert_eq!(props.alphabet_size, 256);
    assert_eq!(props.max_code_len, 12);

    fs::remove_file(&path).unwrap();

    args.config = None;
    assert_eq!(coding_properties(&args).unwrap().max_code_len, 12);
}

pub mod bitstreams;
pub mod error;
pub mod huffman_canon;
pub mod mem;
pub mod properties;
pub mod utils;

pub use error::{HuffError, Result};
pub use huffman_canon::{
    huffman_decoder::HuffmanDecoder,
    huffman_encoder::HuffmanEncoder,
    Code, CodeEntry, CodeTable, Huffman,
    CODE_BITS, DEFAULT_MAX_CODE_LEN, MAX_ALPHABET, MAX_CODE_BITS,
};
pub use mem::{MemArena, MemContext};

use thiserror::Error;

/// Errors raised by the canonical Huffman core and the tools built on it.
///
/// Every variant maps to a stable numeric code (see [`HuffError::code`]) so
/// that callers embedding the core can report failures without matching on
/// the message text.
#[derive(Debug, Error)]
pub enum HuffError {
    /// The memory arena could not satisfy a table allocation.
    #[error("out of memory: requested {requested} bytes, {available} available")]
    OutOfMemory { requested: usize, available: usize },

    /// Alphabet size or maximum code length outside the representable range.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A bit sequence that does not name any code within the maximum length.
    #[error("stream corruption after {bits_read} bits of a code word")]
    StreamCorruption { bits_read: u32 },

    /// Code lengths that cannot form a prefix code.
    #[error("invalid code lengths: {0}")]
    InvalidCodeLengths(String),

    /// Operation called in the wrong phase of the context lifecycle.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("symbol {symbol} is outside the alphabet of {alphabet} symbols")]
    SymbolOutOfRange { symbol: usize, alphabet: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl HuffError {
    /// Stable error code, also used as the process exit status by the tools.
    pub fn code(&self) -> i32 {
        match self {
            HuffError::OutOfMemory { .. } => 1,
            HuffError::InvalidConfiguration(_) => 2,
            HuffError::StreamCorruption { .. } => 3,
            HuffError::InvalidCodeLengths(_) => 4,
            HuffError::InvalidState(_) => 5,
            HuffError::SymbolOutOfRange { .. } => 6,
            HuffError::Io(_) => 7,
            HuffError::Config(_) => 8,
        }
    }

    /// Rebuilds an error from its code. Detail fields are zeroed.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(HuffError::OutOfMemory { requested: 0, available: 0 }),
            2 => Some(HuffError::InvalidConfiguration(String::new())),
            3 => Some(HuffError::StreamCorruption { bits_read: 0 }),
            4 => Some(HuffError::InvalidCodeLengths(String::new())),
            5 => Some(HuffError::InvalidState("")),
            6 => Some(HuffError::SymbolOutOfRange { symbol: 0, alphabet: 0 }),
            7 => Some(HuffError::Io(std::io::Error::from(std::io::ErrorKind::Other))),
            8 => Some(HuffError::Config(String::new())),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, HuffError>;

#[test]
fn test_error_code_roundtrip() {
    for code in 1..=8 {
        let err = HuffError::from_code(code).unwrap();
        assert_eq!(err.code(), code);
    }
    assert!(HuffError::from_code(0).is_none());
    assert!(HuffError::from_code(9).is_none());
}

#[test]
fn test_error_display() {
    let err = HuffError::OutOfMemory { requested: 2048, available: 512 };
    let msg = err.to_string();
    assert!(msg.contains("2048"));
    assert!(msg.contains("512"));

    let err = HuffError::SymbolOutOfRange { symbol: 300, alphabet: 256 };
    assert!(err.to_string().contains("300"));
}

use std::{collections::HashMap, fs::{self, File}, io::BufReader, str::FromStr};

use serde::{Serialize, Deserialize};

use crate::{error::{HuffError, Result}, huffman_canon::DEFAULT_MAX_CODE_LEN};

/// Coding parameters, stored as a Java-style `.properties` file next to the
/// coded data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Properties {
    pub alphabet_size: usize,
    pub max_code_len: u32,
    /// Arena budget in bytes, unbounded if absent.
    pub arena_bytes: Option<usize>,
    /// Number of coded symbols.
    pub symbols: u64,
    pub encoded_bits: u64,
}

impl Default for Properties {
    fn default() -> Self {
        Self {
            alphabet_size: 256,
            max_code_len: DEFAULT_MAX_CODE_LEN,
            arena_bytes: None,
            symbols: 0,
            encoded_bits: 0,
        }
    }
}

fn parse_value<T: FromStr>(value: &HashMap<String, String>, key: &str) -> Result<Option<T>> {
    match value.get(key) {
        Some(v) if !v.trim().is_empty() => v.trim().parse()
            .map(Some)
            .map_err(|_| HuffError::Config(format!("Malformed value {:?} for {}", v, key))),
        _ => Ok(None),
    }
}

impl TryFrom<HashMap<String, String>> for Properties {
    type Error = HuffError;

    fn try_from(value: HashMap<String, String>) -> Result<Self> {
        let mut props = Properties::default();

        if let Some(alphabet_size) = parse_value(&value, "alphabetsize")? {
            props.alphabet_size = alphabet_size;
        }
        if let Some(max_code_len) = parse_value(&value, "maxcodelen")? {
            props.max_code_len = max_code_len;
        }
        props.arena_bytes = parse_value(&value, "arenabytes")?;
        if let Some(symbols) = parse_value(&value, "symbols")? {
            props.symbols = symbols;
        }
        if let Some(encoded_bits) = parse_value(&value, "encodedbits")? {
            props.encoded_bits = encoded_bits;
        }

        Ok(props)
    }
}

impl From<Properties> for String {
    fn from(val: Properties) -> Self {
        let mut s = String::new();

        s.push_str("#Canonical Huffman properties\n");
        s.push_str("version=0\n");
        s.push_str(&format!("alphabetsize={}\n", val.alphabet_size));
        s.push_str(&format!("maxcodelen={}\n", val.max_code_len));
        if let Some(arena_bytes) = val.arena_bytes {
            s.push_str(&format!("arenabytes={}\n", arena_bytes));
        }
        s.push_str(&format!("symbols={}\n", val.symbols));
        s.push_str(&format!("encodedbits={}\n", val.encoded_bits));

        s
    }
}

impl Properties {
    pub fn load(path: &str) -> Result<Self> {
        let file = File::open(path)?;
        let p = java_properties::read(BufReader::new(file))
            .map_err(|e| HuffError::Config(format!("Failed parsing {}: {}", path, e)))?;

        Properties::try_from(p)
    }

    pub fn store(&self, path: &str) -> Result<()> {
        fs::write(path, String::from(self.clone()))?;
        Ok(())
    }
}

#[test]
fn test_defaults_when_empty() {
    let props = Properties::try_from(HashMap::new()).unwrap();
    assert_eq!(props, Properties::default());
}

#[test]
fn test_parse_values() {
    let mut map = HashMap::new();
    map.insert("alphabetsize".to_string(), "300".to_string());
    map.insert("maxcodelen".to_string(), " 12 ".to_string());
    map.insert("arenabytes".to_string(), "65536".to_string());
    map.insert("symbols".to_string(), "1000".to_string());

    let props = Properties::try_from(map).unwrap();
    assert_eq!(props.alphabet_size, 300);
    assert_eq!(props.max_code_len, 12);
    assert_eq!(props.arena_bytes, Some(65536));
    assert_eq!(props.symbols, 1000);
    assert_eq!(props.encoded_bits, 0);
}

#[test]
fn test_malformed_value() {
    let mut map = HashMap::new();
    map.insert("maxcodelen".to_string(), "twelve".to_string());

    let err = Properties::try_from(map).unwrap_err();
    assert_eq!(err.code(), 8);
    assert!(err.to_string().contains("maxcodelen"));
}

#[test]
fn test_store_and_load() {
    let props = Properties { alphabet_size: 256, max_code_len: 11, arena_bytes: Some(4096), symbols: 77, encoded_bits: 300 };

    let path = std::env::temp_dir().join(format!("huff_canon_props_{}.properties", std::process::id()));
    let path = path.to_str().unwrap();

    props.store(path).unwrap();
    assert_eq!(Properties::load(path).unwrap(), props);

    fs::remove_file(path).unwrap();
}

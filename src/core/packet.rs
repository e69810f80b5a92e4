//! GameSpy key/value packet.
//!
//! ```text
//! \key1\value1\key2\value2\...\final\
//! ```
//!
//! Keys may repeat; repeated keys carry repeated sub-records, so pairs are kept
//! in a list rather than a map. Values may be empty. There is no escaping, a `\`
//! inside a key or value cannot be represented.

use crate::error::{ProtocolError, Result};
use std::fmt;

/// Leading delimiter of every packet
pub const PREFIX: &str = "\\";

/// Terminator of every packet
pub const SUFFIX: &str = "\\final\\";

/// Field separator
pub const SEPARATOR: char = '\\';

/// A single key/value element of a packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValuePair {
    pub key: String,
    pub value: String,
}

impl KeyValuePair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for KeyValuePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.key, SEPARATOR, self.value)
    }
}

/// Ordered list of key/value pairs as exchanged on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packet {
    elements: Vec<KeyValuePair>,
}

impl Packet {
    /// Create an empty packet
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a packet from an ordered list of pairs
    pub fn from_pairs(elements: Vec<KeyValuePair>) -> Self {
        Self { elements }
    }

    /// Decode a raw packet.
    ///
    /// # Errors
    /// - `MalformedFraming` if the `\` prefix or `\final\` terminator is missing
    /// - `OddElementCount` if a key has no value
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        // The prefix must not overlap with the terminator's leading backslash
        if bytes.len() < PREFIX.len() + SUFFIX.len()
            || !bytes.starts_with(PREFIX.as_bytes())
            || !bytes.ends_with(SUFFIX.as_bytes())
        {
            return Err(ProtocolError::MalformedFraming);
        }

        let body = String::from_utf8_lossy(&bytes[PREFIX.len()..bytes.len() - SUFFIX.len()]);
        if body.is_empty() {
            return Ok(Self::new());
        }

        let tokens: Vec<&str> = body.split(SEPARATOR).collect();
        if tokens.len() % 2 != 0 {
            return Err(ProtocolError::OddElementCount);
        }

        let elements = tokens
            .chunks_exact(2)
            .map(|pair| KeyValuePair::new(pair[0], pair[1]))
            .collect();

        Ok(Self { elements })
    }

    /// Encode the packet into its wire representation
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    /// Replace the value of the first pair with a matching key, or append a new pair.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        match self.elements.iter_mut().find(|e| e.key == key) {
            Some(element) => element.value = value.into(),
            None => self.elements.push(KeyValuePair::new(key, value)),
        }
    }

    /// Append a pair, regardless of whether the key already exists.
    pub fn add(&mut self, key: &str, value: impl Into<String>) {
        self.elements.push(KeyValuePair::new(key, value));
    }

    /// `set` with a decimal integer value
    pub fn set_int(&mut self, key: &str, value: impl Into<i64>) {
        self.set(key, value.into().to_string());
    }

    /// `add` with a decimal integer value
    pub fn add_int(&mut self, key: &str, value: impl Into<i64>) {
        self.add(key, value.into().to_string());
    }

    /// First value with a matching key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.elements
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    /// First value with a matching key, parsed as base-10 integer.
    ///
    /// Returns `Ok(None)` if the key is absent.
    pub fn get_int(&self, key: &str) -> Result<Option<i64>> {
        self.get(key).map(|value| parse_int(key, value)).transpose()
    }

    /// All values with a matching key, in packet order
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.elements
            .iter()
            .filter(|e| e.key == key)
            .map(|e| e.value.as_str())
            .collect()
    }

    /// Whether at least one pair has the given key
    pub fn contains_key(&self, key: &str) -> bool {
        self.elements.iter().any(|e| e.key == key)
    }

    /// Remove every pair with a matching key
    pub fn remove(&mut self, key: &str) {
        self.elements.retain(|e| e.key != key);
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyValuePair> {
        self.elements.iter()
    }

    pub fn pairs(&self) -> &[KeyValuePair] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(PREFIX)?;
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                write!(f, "{SEPARATOR}")?;
            }
            write!(f, "{element}")?;
        }
        f.write_str(SUFFIX)
    }
}

impl<'a> IntoIterator for &'a Packet {
    type Item = &'a KeyValuePair;
    type IntoIter = std::slice::Iter<'a, KeyValuePair>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

/// Parse a decimal wire value, reporting the offending field on failure.
pub fn parse_int<T: std::str::FromStr>(field: &str, value: &str) -> Result<T> {
    value.parse::<T>().map_err(|_| ProtocolError::FieldType {
        field: field.to_string(),
        value: value.to_string(),
    })
}

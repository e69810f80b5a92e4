//! # Packet Binding
//!
//! Projects packet pairs onto typed records.
//!
//! Every target type declares its wire keys explicitly by implementing
//! [`FromPacket`], a `match` from wire key to field setter. Keys a type does not
//! declare are ignored.
//!
//! ## Semantics
//! - **Single record** ([`Packet::bind`]): pairs are applied in order, so the last
//!   occurrence of a repeated key wins.
//! - **Record list** ([`Packet::bind_all`]): the wire format has no array
//!   delimiter, so a new record starts whenever a key repeats within the current
//!   record. Every key counts toward that rule, declared or not.
//!
//! ```text
//! \nick\a\uniquenick\a1\nick\b\uniquenick\b1\final\
//!  └──── record 0 ─────┘└──── record 1 ─────┘
//! ```

use crate::core::packet::{parse_int, Packet};
use crate::error::Result;
use std::collections::HashSet;

/// A record that can be populated from packet pairs.
pub trait FromPacket: Default {
    /// Apply a single pair. Unknown keys must be ignored.
    ///
    /// # Errors
    /// `FieldType` if a numeric field receives a non-numeric value.
    fn assign(&mut self, key: &str, value: &str) -> Result<()>;
}

impl Packet {
    /// Bind the packet into a single record; the last occurrence of a key wins.
    pub fn bind<T: FromPacket>(&self) -> Result<T> {
        let mut target = T::default();
        for element in self {
            target.assign(&element.key, &element.value)?;
        }
        Ok(target)
    }

    /// Bind the packet into a list of records, splitting on key recurrence.
    pub fn bind_all<T: FromPacket>(&self) -> Result<Vec<T>> {
        let mut records = Vec::new();
        let mut current = T::default();
        let mut seen: HashSet<&str> = HashSet::new();

        for element in self {
            if !seen.insert(element.key.as_str()) {
                records.push(std::mem::take(&mut current));
                seen.clear();
                seen.insert(element.key.as_str());
            }
            current.assign(&element.key, &element.value)?;
        }

        // Trailing record
        if !seen.is_empty() {
            records.push(current);
        }

        Ok(records)
    }
}

/// Parse a numeric field value into `slot`
pub fn bind_int<T: std::str::FromStr>(slot: &mut T, field: &str, value: &str) -> Result<()> {
    *slot = parse_int(field, value)?;
    Ok(())
}

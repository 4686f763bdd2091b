//! Compact string-to-ordinal lookup tables serialized as printable text.
//!
//! A table is a path-compressed trie. It is stored as a string so that it can be embedded as a
//! single string constant and queried at runtime without any deserialization step.
//!
//! # Format
//!
//! ```text
//! node  := value count child{count}
//! child := label_len label node_len node
//! ```
//!
//! `value` is the ordinal stored for the key ending at this node (`0` when none ends here),
//! `count` the number of children, `label` the edge label (raw characters) and `node_len` the
//! encoded length of the child node so that non-matching children can be skipped. All lengths
//! count characters. Children of a node are sorted and start with distinct characters.
//!
//! Numbers are base-32 varints, most significant digit first. A continuation digit `d` is the
//! character `0x40 + d` (`@`..`_`), the final digit is `0x20 + d` (` `..`?`), so every number
//! is printable ASCII.
//!
//! # Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use dexopt::utils::stringtree;
//!
//! let mut map = BTreeMap::new();
//! map.insert("com.example.Cat".to_string(), 1);
//! map.insert("com.example.Dog".to_string(), 2);
//!
//! let table = stringtree::encode(&map)?;
//! assert_eq!(stringtree::lookup(&table, "com.example.Dog", 0), 2);
//! assert_eq!(stringtree::lookup(&table, "com.example.Cow", 0), 0);
//! # Ok::<(), dexopt::Error>(())
//! ```

use std::collections::BTreeMap;

use crate::{Error, Result};

const DIGIT_BITS: u32 = 5;
const DIGIT_MASK: u32 = (1 << DIGIT_BITS) - 1;
const FINAL_BASE: u32 = 0x20;
const CONTINUATION_BASE: u32 = 0x40;

/// Encodes `map` into a lookup table.
///
/// # Errors
///
/// Returns [`Error::Encoding`] if any value is not strictly positive; `0` is reserved for
/// "not found".
pub fn encode(map: &BTreeMap<String, i16>) -> Result<String> {
    if let Some((key, value)) = map.iter().find(|(_, value)| **value <= 0) {
        return Err(Error::Encoding(format!(
            "value {value} for key {key:?} is not a positive ordinal"
        )));
    }

    let keys: Vec<Vec<char>> = map.keys().map(|key| key.chars().collect()).collect();
    let entries: Vec<(&[char], i16)> = keys
        .iter()
        .zip(map.values())
        .map(|(key, value)| (key.as_slice(), *value))
        .collect();

    let mut out = String::new();
    encode_node(&entries, &mut out);
    Ok(out)
}

/// Looks up `key` in an encoded table.
///
/// Returns `default` if the key is absent or the table is malformed.
#[must_use]
pub fn lookup(encoded: &str, key: &str, default: i16) -> i16 {
    let table: Vec<char> = encoded.chars().collect();
    let key: Vec<char> = key.chars().collect();
    match Decoder::new(&table).find(&key) {
        Some(value) if value > 0 => value,
        _ => default,
    }
}

/// Encodes one node. `entries` is sorted and holds the key suffixes below this node.
fn encode_node(entries: &[(&[char], i16)], out: &mut String) {
    let value = entries
        .iter()
        .find(|(key, _)| key.is_empty())
        .map_or(0, |(_, value)| *value);
    let rest: Vec<(&[char], i16)> = entries
        .iter()
        .filter(|(key, _)| !key.is_empty())
        .copied()
        .collect();

    let mut groups: Vec<&[(&[char], i16)]> = Vec::new();
    let mut start = 0;
    for i in 1..=rest.len() {
        if i == rest.len() || rest[i].0[0] != rest[start].0[0] {
            groups.push(&rest[start..i]);
            start = i;
        }
    }

    write_varint(u32::from(value.unsigned_abs()), out);
    write_varint(groups.len() as u32, out);
    for group in groups {
        let label_len = common_prefix_len(group);
        let children: Vec<(&[char], i16)> = group
            .iter()
            .map(|(key, value)| (&key[label_len..], *value))
            .collect();

        let mut child = String::new();
        encode_node(&children, &mut child);

        write_varint(label_len as u32, out);
        out.extend(&group[0].0[..label_len]);
        write_varint(child.chars().count() as u32, out);
        out.push_str(&child);
    }
}

fn common_prefix_len(group: &[(&[char], i16)]) -> usize {
    let first = group[0].0;
    group.iter().skip(1).fold(first.len(), |len, (key, _)| {
        first[..len]
            .iter()
            .zip(key.iter())
            .take_while(|(a, b)| a == b)
            .count()
    })
}

fn write_varint(value: u32, out: &mut String) {
    let mut digits = vec![value & DIGIT_MASK];
    let mut rest = value >> DIGIT_BITS;
    while rest > 0 {
        digits.push(rest & DIGIT_MASK);
        rest >>= DIGIT_BITS;
    }

    let last = digits.len() - 1;
    for (i, digit) in digits.iter().rev().enumerate() {
        let base = if i == last { FINAL_BASE } else { CONTINUATION_BASE };
        out.push(char::from_u32(base + digit).unwrap_or('?'));
    }
}

struct Decoder<'a> {
    table: &'a [char],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn new(table: &'a [char]) -> Self {
        Decoder { table, pos: 0 }
    }

    fn read_varint(&mut self) -> Option<u32> {
        let mut value: u32 = 0;
        loop {
            let c = u32::from(*self.table.get(self.pos)?);
            self.pos += 1;
            let (digit, last) = match c {
                0x20..=0x3F => (c - FINAL_BASE, true),
                0x40..=0x5F => (c - CONTINUATION_BASE, false),
                _ => return None,
            };
            value = value.checked_mul(1 << DIGIT_BITS)?.checked_add(digit)?;
            if last {
                return Some(value);
            }
        }
    }

    fn read_len(&mut self) -> Option<usize> {
        let len = usize::try_from(self.read_varint()?).ok()?;
        if self.pos + len > self.table.len() {
            return None;
        }
        Some(len)
    }

    fn find(&mut self, mut key: &[char]) -> Option<i16> {
        loop {
            let value = i16::try_from(self.read_varint()?).ok()?;
            let count = self.read_varint()?;
            if key.is_empty() {
                return Some(value);
            }

            let mut descended = false;
            for _ in 0..count {
                let label_len = self.read_len()?;
                let label = &self.table[self.pos..self.pos + label_len];
                self.pos += label_len;
                let node_len = self.read_len()?;

                if label.first() == key.first() {
                    if !key.starts_with(label) {
                        return Some(0);
                    }
                    key = &key[label_len..];
                    descended = true;
                    break;
                }
                self.pos += node_len;
            }
            if !descended {
                return Some(0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, i16)]) -> BTreeMap<String, i16> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_varint_digits() {
        let mut out = String::new();
        write_varint(0, &mut out);
        assert_eq!(out, " ");

        out.clear();
        write_varint(31, &mut out);
        assert_eq!(out, "?");

        out.clear();
        write_varint(32, &mut out);
        assert_eq!(out, "A ");

        let chars: Vec<char> = "A ".chars().collect();
        assert_eq!(Decoder::new(&chars).read_varint(), Some(32));
    }

    #[test]
    fn test_lookup_hits_and_misses() {
        let map = table(&[
            ("com.example.Alpha", 1),
            ("com.example.Alphabet", 2),
            ("com.example.Beta", 3),
            ("org.other.Gamma", 4),
        ]);
        let encoded = encode(&map).unwrap();
        for (key, value) in &map {
            assert_eq!(lookup(&encoded, key, 0), *value, "{key}");
        }
        assert_eq!(lookup(&encoded, "com.example.Alph", 0), 0);
        assert_eq!(lookup(&encoded, "com.example.Alphabets", 0), 0);
        assert_eq!(lookup(&encoded, "com.example.Delta", -1), -1);
        assert_eq!(lookup(&encoded, "", 0), 0);
        assert_eq!(lookup(&encoded, "zzz", 7), 7);
    }

    #[test]
    fn test_output_is_printable() {
        let map = table(&[("a.B", 1), ("a.C", 300), ("b.D", i16::MAX)]);
        let encoded = encode(&map).unwrap();
        assert!(encoded.chars().all(|c| (' '..='~').contains(&c)));
        assert_eq!(lookup(&encoded, "b.D", 0), i16::MAX);
        assert_eq!(lookup(&encoded, "a.C", 0), 300);
    }

    #[test]
    fn test_non_ascii_keys() {
        let map = table(&[("caf\u{e9}", 1), ("cafe", 2)]);
        let encoded = encode(&map).unwrap();
        assert_eq!(lookup(&encoded, "caf\u{e9}", 0), 1);
        assert_eq!(lookup(&encoded, "cafe", 0), 2);
    }

    #[test]
    fn test_empty_table() {
        let encoded = encode(&BTreeMap::new()).unwrap();
        assert_eq!(encoded, "  ");
        assert_eq!(lookup(&encoded, "anything", 5), 5);
    }

    #[test]
    fn test_rejects_non_positive_values() {
        assert!(matches!(
            encode(&table(&[("a", 0)])),
            Err(Error::Encoding(_))
        ));
        assert!(encode(&table(&[("a", -3)])).is_err());
    }

    #[test]
    fn test_malformed_input_returns_default() {
        assert_eq!(lookup("", "a", 9), 9);
        assert_eq!(lookup("\u{7f}", "a", 9), 9);
        // Claims one child with a label longer than the remaining input.
        assert_eq!(lookup(" !A?", "a", 9), 9);
    }
}

//! Canonical JSON Lines dump of one day's events
//!
//! Each line is the event with object keys sorted at every level, written
//! with `", "` / `": "` separators and every character outside printable
//! ASCII escaped as `\uXXXX` (UTF-16 units). Archives and their names stay
//! identical to those written by earlier archiver deployments. The SHA-1 of
//! the lines names the archive file.

use std::io::{self, Write};

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use serde_json::ser::Formatter;
use sha1::{Digest, Sha1};

use crate::event::Event;

/// Hex characters of the digest used in file names
const HASH_PREFIX_LEN: usize = 6;

#[derive(Debug, Clone)]
pub struct Dump {
    pub day: String,
    pub content: String,
    pub sha1_hex: String,
    pub event_count: usize,
}

impl Dump {
    pub fn build(day: &str, events: &[Event]) -> Result<Self, serde_json::Error> {
        let mut content = String::new();
        let mut hasher = Sha1::new();

        for event in events {
            let line = canonical_line(event)?;
            hasher.update(line.as_bytes());
            content.push_str(&line);
        }

        Ok(Self {
            day: day.to_string(),
            content,
            sha1_hex: hex::encode(hasher.finalize()),
            event_count: events.len(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.content.as_bytes()
    }

    pub fn hash_prefix(&self) -> &str {
        &self.sha1_hex[..HASH_PREFIX_LEN]
    }

    /// `<day>_<hash-prefix>.jsonl.<extension>`
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}_{}.jsonl.{}", self.day, self.hash_prefix(), extension)
    }
}

/// One event as a `\n`-terminated canonical line
fn canonical_line(event: &Event) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedAsciiFormatter);
    Canonical::object(event.fields()).serialize(&mut ser)?;
    buf.push(b'\n');
    String::from_utf8(buf).map_err(<serde_json::Error as serde::ser::Error>::custom)
}

/// `", "` and `": "` separators, non-ASCII escaped
struct SpacedAsciiFormatter;

impl Formatter for SpacedAsciiFormatter {
    fn begin_array_value<W: ?Sized + Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    // Quotes, backslashes and control characters never reach here
    fn write_string_fragment<W: ?Sized + Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            if (' '..='~').contains(&ch) {
                continue;
            }
            writer.write_all(fragment[start..i].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = i + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

/// Serializes a JSON value with object keys in sorted order, independent of
/// how `serde_json::Map` orders its entries.
enum Canonical<'a> {
    Object(&'a serde_json::Map<String, Value>),
    Value(&'a Value),
}

impl<'a> Canonical<'a> {
    fn object(map: &'a serde_json::Map<String, Value>) -> Self {
        Canonical::Object(map)
    }
}

impl Serialize for Canonical<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let map = match self {
            Canonical::Object(map) => *map,
            Canonical::Value(Value::Object(map)) => map,
            Canonical::Value(Value::Array(items)) => {
                return serializer.collect_seq(items.iter().map(Canonical::Value));
            }
            Canonical::Value(other) => return other.serialize(serializer),
        };

        let mut entries: Vec<_> = map.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        let mut out = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in entries {
            out.serialize_entry(key, &Canonical::Value(value))?;
        }
        out.end()
    }
}

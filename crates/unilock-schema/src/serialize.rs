//! Byte-stable JSON output for canonical lock files.
//!
//! The layout is fixed: 4-space indentation, `","` and `": "` separators,
//! object keys sorted at every depth, every non-ASCII code point escaped as
//! `\uXXXX`, and a single trailing newline. Identical data always produces
//! identical bytes.

use crate::lock::LockError;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::ser::{Formatter, PrettyFormatter};
use serde_json::Value;
use std::io;

/// JSON formatter producing the canonical lock layout.
pub struct CanonicalFormatter {
    inner: PrettyFormatter<'static>,
}

impl Default for CanonicalFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl CanonicalFormatter {
    pub fn new() -> Self {
        Self {
            inner: PrettyFormatter::with_indent(b"    "),
        }
    }
}

impl Formatter for CanonicalFormatter {
    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_array(writer)
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.inner.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object(writer)
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.inner.begin_object_key(writer, first)
    }

    fn end_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object_key(writer)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object_value(writer)
    }

    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            if ch.is_ascii() {
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

/// Serializes a JSON value with object entries in key order, independent of
/// how the underlying map orders them.
struct Sorted<'a>(&'a Value);

impl Serialize for Sorted<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                let mut out = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    out.serialize_entry(key, &Sorted(value))?;
                }
                out.end()
            }
            Value::Array(items) => serializer.collect_seq(items.iter().map(Sorted)),
            other => other.serialize(serializer),
        }
    }
}

/// Write `value` in canonical layout, including the trailing newline.
pub fn write_canonical<W: io::Write>(value: &Value, writer: W) -> Result<(), LockError> {
    let mut writer = writer;
    {
        let mut ser = serde_json::Serializer::with_formatter(&mut writer, CanonicalFormatter::new());
        Sorted(value).serialize(&mut ser)?;
    }
    writer.write_all(b"\n")?;
    Ok(())
}

/// Render `value` in canonical layout.
pub fn to_canonical_string(value: &Value) -> Result<String, LockError> {
    let mut buf = Vec::with_capacity(4096);
    write_canonical(value, &mut buf)?;
    String::from_utf8(buf).map_err(|e| LockError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn layout_matches_canonical_form() {
        let value = json!({
            "b": {"z": null, "a": ["x", "y"]},
            "a": {},
            "c": []
        });
        let expected = "{\n    \"a\": {},\n    \"b\": {\n        \"a\": [\n            \"x\",\n            \"y\"\n        ],\n        \"z\": null\n    },\n    \"c\": []\n}\n";
        assert_eq!(to_canonical_string(&value).unwrap(), expected);
    }

    #[test]
    fn non_ascii_is_escaped() {
        let value = json!({"name": "caf\u{e9} \u{1f600}"});
        let out = to_canonical_string(&value).unwrap();
        assert!(out.is_ascii());
        assert!(out.contains("caf\\u00e9 \\ud83d\\ude00"));
        let back: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn exactly_one_trailing_newline() {
        let out = to_canonical_string(&json!({"a": 1})).unwrap();
        assert!(out.ends_with("}\n"));
        assert!(!out.ends_with("\n\n"));
    }

    #[test]
    fn keys_sorted_at_depth() {
        let value = json!({"dependencies": {"zeta": {"python": {"version": "1", "name": "zeta"}}, "": {}}});
        let out = to_canonical_string(&value).unwrap();
        let empty = out.find("\"\": {}").unwrap();
        let zeta = out.find("\"zeta\"").unwrap();
        assert!(empty < zeta);
        assert!(out.find("\"name\"").unwrap() < out.find("\"version\"").unwrap());
    }

    #[test]
    fn output_is_stable() {
        let value = json!({"x": ["\u{fc}", {"k": true}], "a": 1.5});
        assert_eq!(
            to_canonical_string(&value).unwrap(),
            to_canonical_string(&value.clone()).unwrap()
        );
    }
}

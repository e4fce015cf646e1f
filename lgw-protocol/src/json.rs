//! Minimal field scanner for the forwarder's flat JSON bodies.
//!
//! The wire bodies are small, have unique field names and carry no escape
//! sequences, so fields are located by name anywhere in the body rather
//! than through a document parser.

/// Returns the raw value of `name`: the inner text for quoted strings,
/// the bare token for numbers and booleans.
pub(crate) fn raw_field<'a>(json: &'a str, name: &str) -> Option<&'a str> {
    let bytes = json.as_bytes();
    let mut from = 0;
    while let Some(pos) = json[from..].find(name) {
        let start = from + pos;
        let end = start + name.len();
        from = end;
        // Must be a quoted key followed by a colon.
        if start == 0 || bytes[start - 1] != b'"' || bytes.get(end) != Some(&b'"') {
            continue;
        }
        let mut i = end + 1;
        while i < bytes.len() && bytes[i] == b' ' {
            i += 1;
        }
        if bytes.get(i) != Some(&b':') {
            continue;
        }
        i += 1;
        while i < bytes.len() && bytes[i] == b' ' {
            i += 1;
        }
        return value_at(json, i);
    }
    None
}

fn value_at(json: &str, start: usize) -> Option<&str> {
    let bytes = json.as_bytes();
    match bytes.get(start)? {
        b'"' => {
            let inner = &json[start + 1..];
            let close = inner.find('"')?;
            Some(&inner[..close])
        }
        _ => {
            let rest = &json[start..];
            let end = rest
                .find(&[',', '}', ']'][..])
                .unwrap_or(rest.len());
            Some(rest[..end].trim())
        }
    }
}

pub(crate) fn u32_field(json: &str, name: &str) -> Option<u32> {
    raw_field(json, name)?.parse().ok()
}

pub(crate) fn i32_field(json: &str, name: &str) -> Option<i32> {
    raw_field(json, name)?.parse().ok()
}

pub(crate) fn f64_field(json: &str, name: &str) -> Option<f64> {
    raw_field(json, name)?.parse().ok()
}

pub(crate) fn bool_field(json: &str, name: &str) -> Option<bool> {
    match raw_field(json, name)? {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

pub(crate) fn str_field<'a>(json: &'a str, name: &str) -> Option<&'a str> {
    raw_field(json, name)
}

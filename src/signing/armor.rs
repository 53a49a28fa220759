//! ASCII armor for detached signatures and public keys.
//!
//! ```text
//! -----BEGIN FIRESTD SIGNATURE-----
//! Key-Id: 3F2A9C01D4E5B6A7
//!
//! <hex body, 64 columns>
//! -----END FIRESTD SIGNATURE-----
//! ```

use std::collections::BTreeMap;

use crate::error::{Result, StdFileError};

/// Label of armored detached signatures.
pub const SIGNATURE_LABEL: &str = "FIRESTD SIGNATURE";
/// Label of armored public keys.
pub const PUBLIC_KEY_LABEL: &str = "FIRESTD PUBLIC KEY";
/// Header carrying the key id.
pub const KEY_ID_HEADER: &str = "Key-Id";

const LINE_WIDTH: usize = 64;

/// A parsed armor block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Armored {
    /// Text between `BEGIN ` and the trailing dashes
    pub label: String,
    /// `Name: value` header lines
    pub headers: BTreeMap<String, String>,
    /// Decoded body
    pub body: Vec<u8>,
}

impl Armored {
    /// Value of the `Key-Id` header, if any.
    pub fn key_id(&self) -> Option<&str> {
        self.headers.get(KEY_ID_HEADER).map(String::as_str)
    }
}

/// Renders `body` as an armor block.
pub fn armor(label: &str, headers: &[(&str, &str)], body: &[u8]) -> String {
    let mut out = format!("-----BEGIN {}-----\n", label);
    for (name, value) in headers {
        out.push_str(name);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
    out.push('\n');
    let encoded = hex::encode(body);
    for line in encoded.as_bytes().chunks(LINE_WIDTH) {
        // hex output is ASCII
        out.push_str(&String::from_utf8_lossy(line));
        out.push('\n');
    }
    out.push_str(&format!("-----END {}-----\n", label));
    out
}

/// Parses an armor block and checks its label.
pub fn dearmor(expected_label: &str, text: &str) -> Result<Armored> {
    let begin = format!("-----BEGIN {}-----", expected_label);
    let end = format!("-----END {}-----", expected_label);
    let mut lines = text.lines().map(str::trim_end);

    loop {
        match lines.next() {
            Some(line) if line == begin => break,
            Some(line) if line.trim().is_empty() => continue,
            Some(line) => {
                return Err(StdFileError::InvalidArmor(format!(
                    "expected '{}', found '{}'",
                    begin, line
                )))
            }
            None => return Err(StdFileError::InvalidArmor(format!("missing '{}'", begin))),
        }
    }

    let mut headers = BTreeMap::new();
    for line in lines.by_ref() {
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| StdFileError::InvalidArmor(format!("bad header line '{}'", line)))?;
        headers.insert(name.trim().to_string(), value.trim().to_string());
    }

    let mut encoded = String::new();
    let mut closed = false;
    for line in lines {
        if line == end {
            closed = true;
            break;
        }
        encoded.push_str(line.trim());
    }
    if !closed {
        return Err(StdFileError::InvalidArmor(format!("missing '{}'", end)));
    }
    let body = hex::decode(&encoded)
        .map_err(|e| StdFileError::InvalidArmor(format!("body is not hex: {}", e)))?;
    Ok(Armored {
        label: expected_label.to_string(),
        headers,
        body,
    })
}

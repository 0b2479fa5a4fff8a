//! Request-body fingerprinting for idempotency checks.
//!
//! The body is rendered canonically (object keys sorted at every depth) and fed
//! through a 64-bit polynomial rolling hash. This is not a cryptographic digest:
//! two different bodies may collide, which is accepted for duplicate detection.
//! Swapping in a real digest only changes [`rolling_hash`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical form of an absent body
const ABSENT_BODY: &str = "undefined";

/// Deterministic digest of a request body
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a body; `None` stands for "no body at all"
    pub fn of(body: Option<&Value>) -> Self {
        let canonical = match body {
            Some(value) => canonical_json(value),
            None => ABSENT_BODY.to_string(),
        };
        Self(to_base36(rolling_hash(&canonical)))
    }

    /// Wrap a fingerprint read back from storage
    pub fn from_stored(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serialize with object keys sorted, independent of map ordering features
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// `h = h * 31 + c`, wrapping
fn rolling_hash(input: &str) -> u64 {
    input
        .chars()
        .fold(0u64, |h, c| h.wrapping_mul(31).wrapping_add(c as u64))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8_lossy(&buf).into_owned()
}

//! Wire encoding for ledger numerics.
//!
//! The ledger encodes `Numeric` values as strings. Outgoing amounts use the
//! shortest round-trip decimal form (`500.0` → `"500"`, `150.5` → `"150.5"`).
//! Incoming payloads are parsed leniently: ledgers may return either JSON
//! numbers or numeric strings, and partially populated payloads are common,
//! so anything missing or unparseable decodes to zero.

use serde_json::Value;

/// Encode an amount as the ledger's string numeric.
pub fn encode_decimal(value: f64) -> String {
    if !value.is_finite() {
        return "0".into();
    }
    format!("{value}")
}

/// Parse a decimal field; missing or invalid values decode to `0.0`.
pub fn parse_decimal(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Parse a non-negative integer field; missing or invalid values decode to `0`.
///
/// Strings are read up to the first non-digit, so `"4"` and `"4.0"` both
/// yield 4. Negative values clamp to 0.
pub fn parse_count(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Number(n)) => {
            if let Some(v) = n.as_u64() {
                u32::try_from(v).unwrap_or(u32::MAX)
            } else {
                n.as_f64()
                    .filter(|v| v.is_finite() && *v > 0.0)
                    .map(|v| v.trunc().min(u32::MAX as f64) as u32)
                    .unwrap_or(0)
            }
        }
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
            let digits: String = unsigned.chars().take_while(char::is_ascii_digit).collect();
            if digits.is_empty() {
                return 0;
            }
            digits
                .parse::<u64>()
                .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
                .unwrap_or(u32::MAX)
        }
        _ => 0,
    }
}

/// Parse a string field; non-string values decode to the empty string.
pub fn parse_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

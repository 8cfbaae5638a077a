//! Boolean-as-string parsing.
//!
//! Every channel that carries an on/off value over the wire (liveness,
//! control, switch commands, local inputs) goes through [`parse_flag`].
//! JSON payloads use [`deserialize_opt_flag`], which additionally accepts
//! native booleans and the numbers `0`/`1`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};

/// Parse `"on"`/`"off"`, `"1"`/`"0"` or `"true"`/`"false"`, ignoring case
/// and surrounding whitespace.
pub fn parse_flag(raw: &str) -> CoreResult<bool> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true")
        || trimmed.eq_ignore_ascii_case("on")
        || trimmed == "1"
    {
        Ok(true)
    } else if trimmed.eq_ignore_ascii_case("false")
        || trimmed.eq_ignore_ascii_case("off")
        || trimmed == "0"
    {
        Ok(false)
    } else {
        Err(CoreError::InvalidFlag(raw.to_string()))
    }
}

/// Render a flag the way retained status topics carry it.
pub fn flag_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Serde helper for optional flag fields.
///
/// Absent and `null` both map to `None`, so a partial message leaves the
/// previous value in place.
pub fn deserialize_opt_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(b)),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(v) if v == 0.0 => Ok(Some(false)),
            Some(v) if v == 1.0 => Ok(Some(true)),
            _ => Err(D::Error::custom(format!("expected 0 or 1, got {n}"))),
        },
        Some(Value::String(s)) => parse_flag(&s).map(Some).map_err(D::Error::custom),
        Some(other) => Err(D::Error::custom(format!(
            "expected a boolean flag, got {other}"
        ))),
    }
}

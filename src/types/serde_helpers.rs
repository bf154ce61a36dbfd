//! Custom serde deserializers for flexible type handling
//!
//! The upstream API is duck-typed JSON; some numeric fields (clip durations
//! in particular) have been observed as both numbers and strings across
//! deployments.

use serde::{Deserialize, Deserializer, de};

/// Deserialize a flexible float value that can be:
/// - JSON number: `123.4`
/// - String: `"123.4"`
/// - null / missing: `None`
pub fn deserialize_flexible_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlexibleF64 {
        Num(f64),
        String(String),
    }

    let value: Option<FlexibleF64> = Option::deserialize(deserializer)?;

    match value {
        None => Ok(None),
        Some(FlexibleF64::Num(n)) => Ok(Some(n)),
        Some(FlexibleF64::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<f64>()
                .map(Some)
                .map_err(|_| de::Error::custom(format!("invalid float string: {}", s)))
        }
    }
}

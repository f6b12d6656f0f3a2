//! Attribute validation shared by the media variants.

use std::sync::LazyLock;

use std::collections::BTreeMap;

use regex::Regex;

use crate::codec::keys;
use crate::error::ValidationError;

/// Resolution value used when the real one is not known.
pub const UNKNOWN_RESOLUTION: &str = "unknown";

static RESOLUTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[1-9][0-9]*x[1-9][0-9]*$").expect("valid resolution regex"));

pub fn validate_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(())
}

/// Finite and >= 0. Zero doubles as "unknown" for decoded assets.
pub fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::NegativeOrNonFinite { field, value });
    }
    Ok(())
}

/// A codec doubles as the content-type subtype, so it must be a bare token.
pub fn validate_codec(codec: &str) -> Result<(), ValidationError> {
    let valid = !codec.is_empty()
        && codec
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.' | '_'));
    if !valid {
        return Err(ValidationError::InvalidCodec(codec.to_string()));
    }
    Ok(())
}

pub fn validate_resolution(resolution: &str) -> Result<(), ValidationError> {
    if resolution == UNKNOWN_RESOLUTION || RESOLUTION_RE.is_match(resolution) {
        return Ok(());
    }
    Err(ValidationError::InvalidResolution(resolution.to_string()))
}

/// Extra metadata keys must be header-safe tokens outside the reserved and
/// `typed` namespaces.
pub fn validate_extra_keys(
    extra: &BTreeMap<String, String>,
    typed: &[&str],
) -> Result<(), ValidationError> {
    for key in extra.keys() {
        let token = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !token {
            return Err(ValidationError::InvalidMetadataKey(key.clone()));
        }
        if keys::RESERVED.contains(&key.as_str())
            || typed.contains(&key.as_str())
            || key.to_ascii_lowercase().starts_with(keys::PROVIDER_PREFIX)
        {
            return Err(ValidationError::ReservedMetadataKey(key.clone()));
        }
    }
    Ok(())
}

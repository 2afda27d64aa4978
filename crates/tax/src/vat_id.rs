//! VAT-id normalization.

use storefront_core::CountryCode;

/// Normalize a customer-supplied VAT-id for validation.
///
/// Strips everything non-alphanumeric, uppercases, and removes a redundant
/// leading country prefix (customers often repeat it: `SE SE5565...`).
/// Returns `None` when nothing usable remains.
pub fn normalize_vat_id(raw: &str, country: CountryCode) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let prefix = country.as_str();
    let mut rest = cleaned.as_str();
    while rest.starts_with(prefix) {
        rest = &rest[prefix.len()..];
    }

    // A bare country prefix or empty input normalizes to nothing.
    if rest.is_empty() || rest.len() < 2 {
        return None;
    }

    Some(format!("{prefix}{rest}"))
}

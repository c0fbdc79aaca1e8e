//! Free-text normalization used for cross-hotel product matching.

/// Lowercase, keep only alphanumerics and whitespace, trim the ends.
///
/// Inner whitespace is kept as-is so "Beef  Stew" and "Beef Stew" stay distinct,
/// matching how names were indexed historically.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .trim()
        .to_string()
}

/// A slug is non-empty lowercase ASCII alphanumerics joined by single hyphens.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

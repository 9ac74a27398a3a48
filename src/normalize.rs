use unicode_normalization::UnicodeNormalization;

use crate::error::{Error, Result};

/// Turns a free-form display name into a storage key.
///
/// Diacritics are stripped after NFKD decomposition, the rest is lowercased
/// and every run outside `[a-z0-9]` becomes a single `-`. Names with nothing
/// left map to `"user"`, so distinct names may collide.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name
        .nfkd()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .flat_map(char::to_lowercase)
    {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "user".to_string()
    } else {
        slug
    }
}

/// Rejects keys that could not be used as a single directory name.
pub fn check_identifier(identifier: &str) -> Result<()> {
    let bad = identifier.is_empty()
        || identifier == "."
        || identifier == ".."
        || identifier
            .chars()
            .any(|c| c == '/' || c == '\\' || c == '\0');
    if bad {
        return Err(Error::Validation(format!(
            "normalizer produced an unusable identifier {identifier:?}"
        )));
    }
    Ok(())
}

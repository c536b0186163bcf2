//! Alias token derivation.
//!
//! A token is derived from the decoded display name when it yields anything,
//! otherwise from the local part of the address:
//!
//! - `"Doe, Jürgen"` → `jurgen-doe`
//! - `""` with `a.b+tag@x.com` → `a-b-tag`

use crate::alias::fold::fold_ascii;

/// Derive the alias token for an address.
///
/// Returns `None` only if neither the name nor the local part contains a
/// single ASCII-foldable letter or digit.
pub fn build(display_name: &str, local_part: &str) -> Option<String> {
    from_display_name(display_name).or_else(|| from_local_part(local_part))
}

/// Token from a decoded display name.
pub fn from_display_name(name: &str) -> Option<String> {
    let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");
    let ordered = reorder_last_first(&collapsed);
    sanitize(&fold_ascii(&ordered).to_lowercase())
}

/// Token from the local part of an email address.
pub fn from_local_part(local_part: &str) -> Option<String> {
    sanitize(&fold_ascii(local_part).to_lowercase())
}

/// `"Doe, John"` → `"John Doe"`; anything else is returned unchanged.
fn reorder_last_first(name: &str) -> String {
    if let Some((last, first)) = name.split_once(',') {
        let (last, first) = (last.trim(), first.trim());
        if !last.is_empty() && !first.is_empty() && !first.contains(',') {
            return format!("{first} {last}");
        }
    }
    name.to_string()
}

/// Collapse every run outside `[a-z0-9]` into one hyphen and trim hyphens.
fn sanitize(s: &str) -> Option<String> {
    let token = s
        .split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit()))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    (!token.is_empty()).then_some(token)
}

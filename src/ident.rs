//! The path grammar: conversions between descriptor and identifier form.
//!
//! Config files and the request API address columns in *descriptor* form
//! (`person_firstName` — camelCase segments joined by `_`), while physical
//! table and column names use *identifier* form (`person_first_name` — fully
//! lower snake). These two functions are the only bridge between the two
//! worlds.

use once_cell::sync::Lazy;
use regex::Regex;

static SNAKE_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new("(_[a-z])").unwrap());

/// Convert a descriptor to an identifier by replacing every run of uppercase
/// letters with `_` followed by its lowercase form.
///
/// Underscores that already separate logical segments are preserved.
///
/// ```
/// use tabula::ident::descriptor_to_identifier;
///
/// assert_eq!(descriptor_to_identifier("person_firstName"), "person_first_name");
/// assert_eq!(descriptor_to_identifier("personKey"), "person_key");
/// ```
pub fn descriptor_to_identifier(descriptor: &str) -> String {
    let mut out = String::with_capacity(descriptor.len() + 4);
    let mut in_upper_run = false;

    for ch in descriptor.chars() {
        if ch.is_ascii_uppercase() {
            if !in_upper_run {
                out.push('_');
            }
            in_upper_run = true;
            out.push(ch.to_ascii_lowercase());
        } else {
            in_upper_run = false;
            out.push(ch);
        }
    }

    out
}

/// Convert an identifier back to descriptor form by replacing each `_x`
/// (lowercase x) with uppercase `X`.
///
/// ```
/// use tabula::ident::identifier_to_descriptor;
///
/// assert_eq!(identifier_to_descriptor("person_key"), "personKey");
/// ```
pub fn identifier_to_descriptor(identifier: &str) -> String {
    SNAKE_SEGMENT
        .replace_all(identifier, |caps: &regex::Captures<'_>| {
            caps[0].trim_start_matches('_').to_ascii_uppercase()
        })
        .into_owned()
}

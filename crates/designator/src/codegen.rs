//! Turns harvested element identifiers into Playwright page-object property lines

use once_cell::sync::Lazy;
use regex::Regex;

// Matches a hyphen followed by a lowercase ASCII letter or digit. Hyphens in any
// other position (trailing, doubled, before an uppercase letter) are left alone.
static CAMEL_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-([a-z0-9])").expect("camel boundary pattern compiles"));

/// Convert a kebab-case identifier to camelCase.
///
/// Only `-x` pairs where `x` is a lowercase ASCII letter or digit collapse; the
/// hyphen is dropped and `x` is uppercased. Everything else passes through
/// unchanged, so an identifier that is already camelCase survives a round trip.
pub fn kebab_to_camel(identifier: &str) -> String {
    CAMEL_BOUNDARY
        .replace_all(identifier, |caps: &regex::Captures<'_>| {
            caps[1].to_uppercase()
        })
        .into_owned()
}

/// Uppercase the first character of a word, leaving the rest untouched.
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Render one `private readonly` page-object property declaration.
///
/// Unique identifiers use Playwright's `getByTestId`. When the identifier is
/// shared by several elements the line falls back to an attribute selector
/// scoped to the element's tag, and the property name gets the capitalized tag
/// as a suffix so sibling declarations do not collide:
///
/// ```
/// use designator::codegen::property_line;
///
/// assert_eq!(
///     property_line("save-item", "button", false, "data-element-id"),
///     "private readonly saveItem = this.page.getByTestId('save-item');",
/// );
/// assert_eq!(
///     property_line("user-name", "input", true, "data-qa"),
///     "private readonly userNameInput = this.page.locator('input[data-qa=\"user-name\"]');",
/// );
/// ```
///
/// The formatter is total: it never validates its inputs and always returns a
/// line, even for empty identifiers.
pub fn property_line(identifier: &str, tag: &str, is_duplicate: bool, attribute_name: &str) -> String {
    let camel = kebab_to_camel(identifier);
    if is_duplicate && !tag.is_empty() {
        let suffix = capitalize(tag);
        format!(
            "private readonly {camel}{suffix} = this.page.locator('{tag}[{attribute_name}=\"{identifier}\"]');"
        )
    } else {
        format!("private readonly {camel} = this.page.getByTestId('{identifier}');")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_basic() {
        assert_eq!(kebab_to_camel("save-item"), "saveItem");
        assert_eq!(kebab_to_camel("user-name-input"), "userNameInput");
    }

    #[test]
    fn camel_digits_collapse() {
        assert_eq!(kebab_to_camel("item-2-row"), "item2Row");
    }

    #[test]
    fn camel_is_idempotent() {
        let once = kebab_to_camel("main-nav-link");
        assert_eq!(kebab_to_camel(&once), once);
    }

    #[test]
    fn camel_leaves_odd_hyphens_alone() {
        // Trailing hyphen: no letter follows, nothing to collapse.
        assert_eq!(kebab_to_camel("save-"), "save-");
        // Uppercase after hyphen is not a boundary.
        assert_eq!(kebab_to_camel("save-Item"), "save-Item");
        // Doubled hyphen: only the second pair matches.
        assert_eq!(kebab_to_camel("save--item"), "save-Item");
    }

    #[test]
    fn capitalize_first_char_only() {
        assert_eq!(capitalize("input"), "Input");
        assert_eq!(capitalize("a"), "A");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn unique_identifier_uses_get_by_test_id() {
        assert_eq!(
            property_line("save-item", "button", false, "data-element-id"),
            "private readonly saveItem = this.page.getByTestId('save-item');"
        );
    }

    #[test]
    fn duplicate_identifier_uses_tag_scoped_locator() {
        assert_eq!(
            property_line("user-name", "input", true, "data-qa"),
            "private readonly userNameInput = this.page.locator('input[data-qa=\"user-name\"]');"
        );
    }

    #[test]
    fn duplicate_without_tag_falls_back_to_test_id() {
        assert_eq!(
            property_line("user-name", "", true, "data-qa"),
            "private readonly userName = this.page.getByTestId('user-name');"
        );
    }

    #[test]
    fn formatter_is_total() {
        assert_eq!(
            property_line("", "", false, "data-element-id"),
            "private readonly  = this.page.getByTestId('');"
        );
    }
}

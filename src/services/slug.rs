//! Slug derivation shared by posts, categories and tags
//!
//! Slugs are lowercase ASCII words joined by single hyphens. Text is NFKD
//! decomposed first, so accented letters fold to their base letter and the
//! combining marks are dropped along with anything else outside ASCII.
//! ASCII punctuation and whitespace separate words.

use unicode_normalization::UnicodeNormalization;

/// Derive a slug from `text`, or return `fallback` when nothing survives.
pub fn slugify(text: &str, fallback: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.nfkd() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !result.is_empty() {
                result.push('-');
            }
            pending_hyphen = false;
            result.push(c.to_ascii_lowercase());
        } else if c.is_ascii() {
            pending_hyphen = true;
        }
    }

    if result.is_empty() {
        fallback.to_string()
    } else {
        result
    }
}

/// `base` with a numeric suffix: `-2`, `-3`, ...
pub fn with_suffix(base: &str, n: u32) -> String {
    format!("{}-{}", base, n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_slugify_simple() {
        assert_eq!(slugify("Hello World", "post"), "hello-world");
        assert_eq!(slugify("Hello, World!", "post"), "hello-world");
        assert_eq!(slugify("  --Rust__and  Go--  ", "post"), "rust-and-go");
    }

    #[test]
    fn test_slugify_folds_accents_to_ascii() {
        assert_eq!(slugify("Café au lait", "post"), "cafe-au-lait");
        assert_eq!(slugify("Crème Brûlée", "post"), "creme-brulee");
        assert_eq!(slugify("naïve façade", "post"), "naive-facade");
        // Compatibility forms decompose too
        assert_eq!(slugify("ﬁne Ｒｕｓｔ", "post"), "fine-rust");
    }

    #[test]
    fn test_slugify_drops_unfoldable_text() {
        assert_eq!(slugify("日本語", "post"), "post");
        assert_eq!(slugify("Straße", "post"), "strae");
        assert_eq!(slugify("", "tag"), "tag");
    }

    #[test]
    fn test_with_suffix() {
        assert_eq!(with_suffix("hello", 2), "hello-2");
    }

    proptest! {
        #[test]
        fn slug_is_lowercase_ascii_without_edge_hyphens(text in "\\PC{0,60}") {
            let slug = slugify(&text, "post");
            prop_assert!(!slug.is_empty());
            prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            prop_assert!(!slug.starts_with('-'));
            prop_assert!(!slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
        }

        #[test]
        fn combining_marks_do_not_change_slug(text in "[a-zA-Z0-9 ]{1,40}") {
            let marked: String = text.chars().flat_map(|c| [c, '\u{301}']).collect();
            prop_assert_eq!(slugify(&marked, "post"), slugify(&text, "post"));
        }

        #[test]
        fn slugify_is_idempotent(text in "[a-zA-Z0-9 ,.!?-]{1,40}") {
            let once = slugify(&text, "post");
            prop_assert_eq!(slugify(&once, "post"), once);
        }
    }
}

//! Static keyword hints added as general context.

const KEYWORD_HINTS: [(&str, &str); 10] = [
    ("bacon", "processed meat carcinogen WHO Group 1"),
    ("sausage", "processed meat carcinogen WHO Group 1"),
    ("hot dog", "processed meat carcinogen WHO Group 1"),
    ("artificial colors", "food dyes carcinogen FDA"),
    ("preservatives", "food preservatives carcinogen risk"),
    ("nitrites", "nitrites processed meat carcinogen"),
    ("aspartame", "artificial sweetener aspartame carcinogen"),
    ("saccharin", "artificial sweetener saccharin carcinogen"),
    ("bha", "BHA preservative carcinogen"),
    ("bht", "BHT preservative carcinogen"),
];

/// Context hint for the first keyword contained in `ingredient`, or a
/// generic hint naming the ingredient.
pub fn keyword_context(ingredient: &str) -> String {
    let lower = ingredient.to_lowercase();
    KEYWORD_HINTS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, hint)| hint.to_string())
        .unwrap_or_else(|| format!("carcinogen risk assessment {} food safety", ingredient))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        assert_eq!(keyword_context("Smoked Bacon"), "processed meat carcinogen WHO Group 1");
        assert_eq!(keyword_context("BHA"), "BHA preservative carcinogen");
        assert_eq!(
            keyword_context("sodium nitrites"),
            "nitrites processed meat carcinogen"
        );
    }

    #[test]
    fn test_generic_hint() {
        assert_eq!(
            keyword_context("tofu"),
            "carcinogen risk assessment tofu food safety"
        );
    }

    proptest! {
        #[test]
        fn hint_is_never_empty(ingredient in "\\PC{0,40}") {
            prop_assert!(!keyword_context(&ingredient).is_empty());
        }

        #[test]
        fn generic_hint_names_ingredient(ingredient in "[0-9]{1,12}") {
            prop_assert!(keyword_context(&ingredient).contains(&ingredient));
        }
    }
}

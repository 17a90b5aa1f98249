use serde::{Deserialize, Serialize};

/// The four fixed content-sensitivity dimensions of an advisory report.
///
/// Every analysis run covers exactly these four; there is no support for
/// arbitrary dimension sets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Nudity,
    Violence,
    Profanity,
    Frightening,
}

impl Category {
    /// All categories, in declaration order. Declaration order carries no
    /// delivery guarantee: fragments surface in completion order.
    pub const ALL: [Category; 4] = [
        Category::Nudity,
        Category::Violence,
        Category::Profanity,
        Category::Frightening,
    ];

    /// Stable snake_case key, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nudity => "nudity",
            Self::Violence => "violence",
            Self::Profanity => "profanity",
            Self::Frightening => "frightening",
        }
    }

    /// Section heading as it appears on the advisory source site.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Nudity => "Sex & Nudity",
            Self::Violence => "Violence & Gore",
            Self::Profanity => "Profanity",
            Self::Frightening => "Frightening Scenes",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw advisory text for one category, as supplied by the scraper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRawText {
    pub category: Category,
    pub text: String,
    /// True when the scraper could not fetch real text and substituted a
    /// fallback placeholder. Propagated to the extractor so it lowers
    /// confidence instead of hallucinating structure from empty input.
    pub is_degraded: bool,
}

impl CategoryRawText {
    pub fn new(category: Category, text: impl Into<String>) -> Self {
        Self {
            category,
            text: text.into(),
            is_degraded: false,
        }
    }

    /// A degraded placeholder for a category whose source text could not
    /// be fetched.
    pub fn degraded(category: Category) -> Self {
        Self {
            category,
            text: String::new(),
            is_degraded: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_lists_each_category_once() {
        assert_eq!(Category::ALL.len(), 4);
        for category in Category::ALL {
            assert_eq!(
                Category::ALL.iter().filter(|c| **c == category).count(),
                1
            );
        }
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&Category::Frightening).unwrap();
        assert_eq!(json, "\"frightening\"");
        let back: Category = serde_json::from_str("\"nudity\"").unwrap();
        assert_eq!(back, Category::Nudity);
    }

    #[test]
    fn display_matches_as_str() {
        for category in Category::ALL {
            assert_eq!(category.to_string(), category.as_str());
        }
    }

    #[test]
    fn labels_match_source_site_headings() {
        assert_eq!(Category::Nudity.label(), "Sex & Nudity");
        assert_eq!(Category::Violence.label(), "Violence & Gore");
    }

    #[test]
    fn degraded_constructor_flags_and_empties() {
        let raw = CategoryRawText::degraded(Category::Profanity);
        assert!(raw.is_degraded);
        assert!(raw.text.is_empty());
    }
}

//! Keyword classification of market titles into diversification buckets.

/// Bucket reported when no keyword matches.
pub const OTHER: &str = "other";

/// Ordered buckets of lowercase keywords. Earlier buckets win ties.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTable {
    buckets: Vec<(String, Vec<String>)>,
}

const DEFAULT_BUCKETS: &[(&str, &[&str])] = &[
    (
        "politics",
        &["election", "president", "congress", "senate", "vote", "trump", "biden"],
    ),
    (
        "crypto",
        &["bitcoin", "btc", "ethereum", "eth", "crypto", "token", "coin"],
    ),
    (
        "sports",
        &["nfl", "nba", "soccer", "football", "championship", "super bowl"],
    ),
    (
        "entertainment",
        &["oscar", "grammy", "movie", "song", "album", "celebrity"],
    ),
    (
        "economics",
        &["fed", "interest rate", "inflation", "gdp", "recession", "stock"],
    ),
    (
        "tech",
        &["ai", "openai", "google", "apple", "microsoft", "meta", "tesla"],
    ),
    (
        "world",
        &["war", "ukraine", "russia", "china", "europe", "asia"],
    ),
];

impl Default for CategoryTable {
    fn default() -> Self {
        CategoryTable::from_entries(DEFAULT_BUCKETS.iter().map(|(name, keywords)| {
            (
                name.to_string(),
                keywords.iter().map(|k| k.to_string()).collect::<Vec<_>>(),
            )
        }))
    }
}

impl CategoryTable {
    /// Builds a table from `(bucket, keywords)` pairs in iteration order. Keywords are
    /// lowercased and trimmed; empty ones are dropped.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        let buckets = entries
            .into_iter()
            .map(|(name, keywords)| {
                let keywords = keywords
                    .into_iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect();
                (name.trim().to_lowercase(), keywords)
            })
            .collect();
        CategoryTable { buckets }
    }

    /// Parses a comma-separated keyword list as found in the `[categories]` section.
    pub fn parse_keywords(raw: &str) -> Vec<String> {
        raw.split(',').map(|k| k.trim().to_string()).collect()
    }

    /// Case-insensitive substring match; first matching bucket wins.
    pub fn classify(&self, title: &str) -> &str {
        let lowered = title.to_lowercase();
        self.buckets
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k.as_str())))
            .map(|(name, _)| name.as_str())
            .unwrap_or(OTHER)
    }

    pub fn bucket_names(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

use config::shared::SyncConfig;

use crate::types::TouchedIdentifiers;

/// Decides whether a cache key references a coder.
///
/// A key references coder `id` when it starts with `{prefix}{delimiter}{id}` and the identifier
/// is followed by the delimiter or by the end of the key. `coder:7:profile` references 7 but
/// `coder:77:profile` and `coder:7x` do not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeyMatcher {
    prefix: String,
    delimiter: char,
}

impl CacheKeyMatcher {
    pub fn new(prefix: impl Into<String>, delimiter: char) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.cache_key_prefix.clone(), config.cache_key_delimiter)
    }

    /// Returns the coder identifier referenced by `key`, if any.
    ///
    /// Identifiers must be written in canonical decimal form.
    pub fn referenced_id(&self, key: &str) -> Option<i64> {
        let rest = key.strip_prefix(self.prefix.as_str())?;
        let rest = rest.strip_prefix(self.delimiter)?;
        let segment = rest.split(self.delimiter).next()?;

        let id = segment.parse::<i64>().ok()?;
        (id.to_string() == segment).then_some(id)
    }

    /// Returns true when `key` references one of the touched identifiers.
    pub fn matches(&self, key: &str, touched: &TouchedIdentifiers) -> bool {
        self.referenced_id(key)
            .is_some_and(|id| touched.contains(id))
    }

    /// Glob pattern selecting every key under the prefix, for `SCAN ... MATCH`.
    pub fn scan_pattern(&self) -> String {
        let mut pattern = String::with_capacity(self.prefix.len() + 4);
        for c in self.prefix.chars().chain(std::iter::once(self.delimiter)) {
            if matches!(c, '*' | '?' | '[' | ']' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push('*');
        pattern
    }
}

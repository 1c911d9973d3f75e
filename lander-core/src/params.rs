//! Query-string key/value collections
//!
//! [`Params`] keeps pairs in insertion order with their original key casing.
//! Lookups fall back to a case-insensitive match so `UTM_Source` on a landing
//! URL still attributes.

use url::form_urlencoded;

/// An ordered list of decoded query pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `key=value&key2=value2`, decoding `+` and `%XX` escapes.
    ///
    /// A single leading `?` or `#` is ignored so both `location.search` and
    /// `location.hash` style inputs are accepted. Pairs without `=` get an
    /// empty value and empty segments are skipped.
    pub fn parse(text: &str) -> Self {
        let text = text
            .strip_prefix('?')
            .or_else(|| text.strip_prefix('#'))
            .unwrap_or(text);
        Self {
            pairs: form_urlencoded::parse(text.as_bytes())
                .into_owned()
                .collect(),
        }
    }

    /// Value for `key`: exact match first, then the first case-insensitive
    /// match. Trimmed; empty string when missing.
    pub fn lookup(&self, key: &str) -> String {
        if let Some(value) = self.get(key) {
            return value.trim().to_string();
        }
        let lower = key.to_lowercase();
        self.pairs
            .iter()
            .find(|(k, _)| k.to_lowercase() == lower)
            .map(|(_, v)| v.trim().to_string())
            .unwrap_or_default()
    }

    /// Raw value of the first pair whose key matches exactly.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Overwrite the first exact match and drop any later duplicates, or
    /// append when the key is new.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter().position(|(k, _)| *k == key) {
            Some(index) => {
                self.pairs[index].1 = value;
                let mut seen = 0usize;
                self.pairs.retain(|(k, _)| {
                    if *k != key {
                        return true;
                    }
                    seen += 1;
                    seen == 1
                });
            }
            None => self.pairs.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Form-encode the pairs in insertion order.
    pub fn serialize(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.pairs {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// A URL split by hand into the part before `?`, the query and the fragment.
///
/// Used wherever `url::Url` refuses the input (relative paths, bare
/// fragments). `query` and `fragment` exclude their delimiters; `None` means
/// the delimiter was absent, `Some("")` means it was present but empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlParts<'a> {
    pub base: &'a str,
    pub query: Option<&'a str>,
    pub fragment: Option<&'a str>,
}

impl<'a> UrlParts<'a> {
    pub fn split(text: &'a str) -> Self {
        let (before_fragment, fragment) = match text.split_once('#') {
            Some((head, fragment)) => (head, Some(fragment)),
            None => (text, None),
        };
        let (base, query) = match before_fragment.split_once('?') {
            Some((base, query)) => (base, Some(query)),
            None => (before_fragment, None),
        };
        Self {
            base,
            query,
            fragment,
        }
    }

    pub fn query_params(&self) -> Params {
        self.query.map(Params::parse).unwrap_or_default()
    }

    pub fn fragment_params(&self) -> Params {
        self.fragment.map(Params::parse).unwrap_or_default()
    }
}

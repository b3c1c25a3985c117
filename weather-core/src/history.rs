use serde::{Deserialize, Deserializer, Serialize};

pub const MAX_HISTORY: usize = 5;

/// Recently loaded place names, most recent first, without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SearchHistory {
    entries: Vec<String>,
}

impl SearchHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `name` in front unless it is already present.
    ///
    /// Returns `true` when the history changed.
    pub fn record(&mut self, name: &str) -> bool {
        if self.contains(name) {
            return false;
        }
        self.entries.insert(0, name.to_string());
        self.entries.truncate(MAX_HISTORY);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e == name)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn most_recent(&self) -> Option<&str> {
        self.entries.first().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<String> for SearchHistory {
    /// Keeps the first occurrence of each name, up to capacity.
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut entries: Vec<String> = Vec::with_capacity(MAX_HISTORY);
        for name in iter {
            if entries.len() == MAX_HISTORY {
                break;
            }
            if !name.trim().is_empty() && !entries.contains(&name) {
                entries.push(name);
            }
        }
        Self { entries }
    }
}

impl<'de> Deserialize<'de> for SearchHistory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Vec::<String>::deserialize(deserializer)?;
        Ok(raw.into_iter().collect())
    }
}

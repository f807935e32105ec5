use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

type ChangeCallback = Arc<dyn Fn(&str, Option<&str>) + Send + Sync>;

/// Headers applied to every request unless overridden per call.
///
/// Clones share the same underlying map. Every mutation invokes the change
/// callback with the header name and its new value (`None` on removal). Names
/// compare case-insensitively and keep the spelling they were first written with.
#[derive(Clone)]
pub struct DefaultHeaders {
    entries: Arc<RwLock<Vec<(String, String)>>>,
    on_change: ChangeCallback,
}

impl DefaultHeaders {
    /// Creates the registry, firing `on_change` once for every present initial value.
    pub fn new<I, K, V>(
        initial: I,
        on_change: impl Fn(&str, Option<&str>) + Send + Sync + 'static,
    ) -> Self
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: Into<String>,
        V: Into<String>,
    {
        let headers = Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            on_change: Arc::new(on_change),
        };
        for (name, value) in initial {
            if let Some(value) = value {
                headers.set(name, value);
            }
        }
        headers
    }

    /// Writes a header, replacing any existing value.
    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let stored_name = {
            let mut entries = self.entries.write();
            if let Some(entry) = entries
                .iter_mut()
                .find(|(key, _)| key.eq_ignore_ascii_case(&name))
            {
                entry.1.clone_from(&value);
                entry.0.clone()
            } else {
                entries.push((name.clone(), value.clone()));
                name
            }
        };
        (self.on_change)(&stored_name, Some(&value));
    }

    /// Removes a header. Returns the previous value, if any.
    pub fn remove(&self, name: &str) -> Option<String> {
        let removed = {
            let mut entries = self.entries.write();
            let index = entries
                .iter()
                .position(|(key, _)| key.eq_ignore_ascii_case(name))?;
            entries.remove(index)
        };
        (self.on_change)(&removed.0, None);
        Some(removed.1)
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.entries
            .read()
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Current headers in insertion order.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl fmt::Debug for DefaultHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.snapshot()).finish()
    }
}

/// Merges per-request headers over defaults. Later sources win per name.
pub(crate) fn merge_headers(
    defaults: Vec<(String, String)>,
    overrides: &[(String, String)],
) -> Vec<(String, String)> {
    let mut merged = defaults;
    for (name, value) in overrides {
        match merged
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1.clone_from(value),
            None => merged.push((name.clone(), value.clone())),
        }
    }
    merged
}

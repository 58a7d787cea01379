use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;

use tracing::warn;

use super::error::ScopeError;
use super::value::{Instance, TypeIdentifier, TypeTaxonomy};

/// Reserved output key carrying a domain-level activity failure.
pub const ERROR_KEY: &str = "error";

mod sealed {
    pub trait Sealed {}
}

/// Marker distinguishing the three scope kinds.
pub trait ScopeKind: sealed::Sealed {
    const NAME: &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyInput {}

impl sealed::Sealed for Input {}
impl sealed::Sealed for Output {}
impl sealed::Sealed for PolicyInput {}

impl ScopeKind for Input {
    const NAME: &'static str = "InputScope";
}

impl ScopeKind for Output {
    const NAME: &'static str = "OutputScope";
}

impl ScopeKind for PolicyInput {
    const NAME: &'static str = "PolicyInputScope";
}

pub type InputScope = Scope<Input>;
pub type OutputScope = Scope<Output>;
pub type PolicyInputScope = Scope<PolicyInput>;

/// Unique-keyed mapping from names to typed values.
///
/// A bound key is never overwritten; build a new scope instead.
pub struct Scope<K: ScopeKind> {
    values: HashMap<String, Instance>,
    kind: PhantomData<K>,
}

impl<K: ScopeKind> Scope<K> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
            kind: PhantomData,
        }
    }

    /// Bind `key` to `value` unless it is already bound.
    ///
    /// Returns `false` (and logs a warning) when the key exists.
    pub fn add(&mut self, key: impl Into<String>, value: Instance) -> bool {
        let key = key.into();
        if self.values.contains_key(&key) {
            warn!(scope = K::NAME, key = %key, "key already bound, keeping first value");
            return false;
        }
        self.values.insert(key, value);
        true
    }

    /// Builder-style [`add`](Self::add); duplicate keys are ignored.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: Instance) -> Self {
        self.add(key, value);
        self
    }

    /// Look up a binding, logging a warning when it is absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Instance> {
        let found = self.values.get(key);
        if found.is_none() {
            warn!(scope = K::NAME, key = %key, "no value bound");
        }
        found
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Instance)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Flat JSON object of `key -> serialized instance string`, keys sorted.
    #[must_use]
    pub fn to_json(&self) -> String {
        let flat: serde_json::Map<String, serde_json::Value> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.serialize())))
            .collect();
        serde_json::Value::Object(flat).to_string()
    }

    /// Replace every binding with the contents of a [`to_json`](Self::to_json) document.
    ///
    /// The scope is left untouched when any entry fails to load.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError`] for invalid JSON, a non-object document, a
    /// non-string value, or a value the taxonomy rejects.
    pub fn from_json(&mut self, json: &str, taxonomy: &dyn TypeTaxonomy) -> Result<(), ScopeError> {
        let document: serde_json::Value = serde_json::from_str(json)?;
        let serde_json::Value::Object(entries) = document else {
            return Err(ScopeError::NotAnObject);
        };

        let mut loaded = HashMap::with_capacity(entries.len());
        for (key, value) in entries {
            let serde_json::Value::String(serialized) = value else {
                return Err(ScopeError::NotAString { key });
            };
            match taxonomy.deserialize(&serialized) {
                Ok(instance) => {
                    loaded.insert(key, instance);
                }
                Err(source) => return Err(ScopeError::Value { key, source }),
            }
        }

        self.values = loaded;
        Ok(())
    }

    /// Parse a [`to_json`](Self::to_json) document into a new scope.
    ///
    /// # Errors
    ///
    /// Same as [`from_json`](Self::from_json).
    pub fn parse_json(json: &str, taxonomy: &dyn TypeTaxonomy) -> Result<Self, ScopeError> {
        let mut scope = Self::new();
        scope.from_json(json, taxonomy)?;
        Ok(scope)
    }
}

impl OutputScope {
    /// An output carrying only the reserved `"error"` binding.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new().with(
            ERROR_KEY,
            Instance::new(TypeIdentifier::core("Error"), message),
        )
    }

    /// The domain-level error message, if the activity reported one.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.values.get(ERROR_KEY).map(Instance::read)
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.values.contains_key(ERROR_KEY)
    }
}

impl<K: ScopeKind> Default for Scope<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ScopeKind> Clone for Scope<K> {
    fn clone(&self) -> Self {
        Self {
            values: self.values.clone(),
            kind: PhantomData,
        }
    }
}

impl<K: ScopeKind> PartialEq for Scope<K> {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl<K: ScopeKind> fmt::Debug for Scope<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sorted: BTreeMap<_, _> = self.values.iter().collect();
        f.debug_map().entries(sorted).finish()?;
        write!(f, " ({})", K::NAME)
    }
}

impl<K: ScopeKind, S: Into<String>> FromIterator<(S, Instance)> for Scope<K> {
    fn from_iter<I: IntoIterator<Item = (S, Instance)>>(iter: I) -> Self {
        let mut scope = Self::new();
        for (key, value) in iter {
            scope.add(key, value);
        }
        scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CoreTaxonomy;

    fn text(s: &str) -> Instance {
        Instance::new(TypeIdentifier::core("Text"), s)
    }

    #[test]
    fn add_never_overwrites() {
        let mut scope = InputScope::new();
        assert!(scope.add("k", text("v")));
        assert!(!scope.add("k", text("v2")));
        assert_eq!(scope.get("k"), Some(&text("v")));
        assert_eq!(scope.len(), 1);
    }

    #[test]
    fn missing_key_is_none() {
        let scope = PolicyInputScope::new();
        assert!(scope.get("absent").is_none());
        assert!(!scope.contains_key("absent"));
    }

    #[test]
    fn json_is_flat_and_double_encoded() {
        let scope = OutputScope::new()
            .with("b", text("x"))
            .with("a", Instance::new(TypeIdentifier::core("UnsignedInt"), "7"));
        assert_eq!(
            scope.to_json(),
            r#"{"a":"{\"type\":\"core.UnsignedInt\",\"value\":\"7\"}","b":"{\"type\":\"core.Text\",\"value\":\"x\"}"}"#
        );
    }

    #[test]
    fn from_json_replaces_bindings() {
        let tax = CoreTaxonomy::new();
        let source = InputScope::new().with("fresh", text("new"));
        let mut target = InputScope::new().with("stale", text("old"));
        target.from_json(&source.to_json(), &tax).unwrap();
        assert!(!target.contains_key("stale"));
        assert_eq!(target, source);
    }

    #[test]
    fn failed_load_leaves_scope_untouched() {
        let tax = CoreTaxonomy::new();
        let mut scope = InputScope::new().with("keep", text("me"));
        let err = scope
            .from_json(r#"{"x":"{\"type\":\"ext.Blob\",\"value\":\"1\"}"}"#, &tax)
            .unwrap_err();
        assert!(matches!(err, ScopeError::Value { ref key, .. } if key == "x"));
        assert!(matches!(
            scope.from_json("[1,2]", &tax),
            Err(ScopeError::NotAnObject)
        ));
        assert!(matches!(
            scope.from_json(r#"{"n":3}"#, &tax),
            Err(ScopeError::NotAString { .. })
        ));
        assert_eq!(scope.get("keep"), Some(&text("me")));
    }

    #[test]
    fn failure_output() {
        let out = OutputScope::failure("missing input 'url'");
        assert!(out.is_failure());
        assert_eq!(out.error(), Some("missing input 'url'"));
        assert!(out.get(ERROR_KEY).unwrap().has_type("core.Error"));
        assert!(!OutputScope::new().is_failure());
    }

    #[test]
    fn collect_keeps_first_binding() {
        let scope: InputScope = vec![("k", text("1")), ("k", text("2"))].into_iter().collect();
        assert_eq!(scope.get("k").map(Instance::read), Some("1"));
    }
}

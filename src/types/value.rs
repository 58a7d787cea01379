use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::error::ValueError;

/// Dotted type name of a typed value, `namespace.Name` (e.g. `core.Text`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeIdentifier {
    namespace: String,
    name: String,
}

impl TypeIdentifier {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// An identifier in the `core` namespace.
    pub fn core(name: impl Into<String>) -> Self {
        Self::new("core", name)
    }

    /// Parse `namespace.Name`.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::InvalidIdentifier`] when either part is missing
    /// or contains characters other than ASCII alphanumerics and `_`.
    pub fn parse(identifier: &str) -> Result<Self, ValueError> {
        let invalid = || ValueError::InvalidIdentifier {
            identifier: identifier.to_owned(),
        };
        let (namespace, name) = identifier.rsplit_once('.').ok_or_else(invalid)?;
        let valid_part = |part: &str| {
            !part.is_empty()
                && part
                    .split('.')
                    .all(|seg| !seg.is_empty() && seg.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
        };
        if !valid_part(namespace) || !valid_part(name) || name.contains('.') {
            return Err(invalid());
        }
        Ok(Self::new(namespace, name))
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compare against a dotted identifier without allocating.
    #[must_use]
    pub fn matches(&self, identifier: &str) -> bool {
        identifier.rsplit_once('.') == Some((self.namespace.as_str(), self.name.as_str()))
    }
}

impl fmt::Display for TypeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

impl FromStr for TypeIdentifier {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TypeIdentifier {
    type Error = ValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TypeIdentifier> for String {
    fn from(value: TypeIdentifier) -> Self {
        value.to_string()
    }
}

/// Serialized form of an instance: `{"type":"core.Text","value":"..."}`.
#[derive(Serialize, Deserialize)]
struct WireInstance {
    #[serde(rename = "type")]
    ty: String,
    value: String,
}

/// A typed runtime value: a type identifier plus primitive content.
///
/// Instances are created and validated through a [`TypeTaxonomy`]; the
/// engine only ever inspects the identifier and the primitive content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    type_id: TypeIdentifier,
    content: String,
}

impl Instance {
    /// Build an instance without validating `content` against its type.
    pub fn new(type_id: TypeIdentifier, content: impl Into<String>) -> Self {
        Self {
            type_id,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn type_identifier(&self) -> &TypeIdentifier {
        &self.type_id
    }

    #[must_use]
    pub fn has_type(&self, identifier: &str) -> bool {
        self.type_id.matches(identifier)
    }

    #[must_use]
    pub fn read(&self) -> &str {
        &self.content
    }

    pub fn write(&mut self, value: impl Into<String>) {
        self.content = value.into();
    }

    #[must_use]
    pub fn serialize(&self) -> String {
        serde_json::json!({
            "type": self.type_id.to_string(),
            "value": self.content,
        })
        .to_string()
    }

    /// Extract the type identifier from a serialized instance.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::Malformed`] if `serialized` is not an instance
    /// document, or [`ValueError::InvalidIdentifier`] for a bad type name.
    pub fn parse_identifier(serialized: &str) -> Result<TypeIdentifier, ValueError> {
        let wire: WireInstance =
            serde_json::from_str(serialized).map_err(|e| ValueError::Malformed(e.to_string()))?;
        TypeIdentifier::parse(&wire.ty)
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.type_id, self.content)
    }
}

/// Factory and validator for typed values.
pub trait TypeTaxonomy: Send + Sync {
    /// Check that `content` is acceptable for `identifier`.
    ///
    /// # Errors
    ///
    /// [`ValueError::UnknownType`] or [`ValueError::InvalidContent`].
    fn validate(&self, identifier: &TypeIdentifier, content: &str) -> Result<(), ValueError>;

    /// Create a fresh instance carrying the type's default content.
    ///
    /// # Errors
    ///
    /// [`ValueError::UnknownType`] if the taxonomy does not know `identifier`.
    fn create(&self, identifier: &TypeIdentifier) -> Result<Instance, ValueError>;

    /// Create an instance and write `content` into it.
    ///
    /// # Errors
    ///
    /// Same as [`validate`](Self::validate).
    fn instantiate(
        &self,
        identifier: &TypeIdentifier,
        content: &str,
    ) -> Result<Instance, ValueError> {
        self.validate(identifier, content)?;
        let mut instance = self.create(identifier)?;
        instance.write(content);
        Ok(instance)
    }

    /// Rebuild an instance from its serialized form.
    ///
    /// # Errors
    ///
    /// Any error of [`Instance::parse_identifier`] or
    /// [`instantiate`](Self::instantiate).
    fn deserialize(&self, serialized: &str) -> Result<Instance, ValueError> {
        let wire: WireInstance =
            serde_json::from_str(serialized).map_err(|e| ValueError::Malformed(e.to_string()))?;
        let identifier = TypeIdentifier::parse(&wire.ty)?;
        self.instantiate(&identifier, &wire.value)
    }
}

/// Shape of the primitive content a core type accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Text,
    UnsignedInt,
    Boolean,
    LocalDateTime,
    Choice(&'static [&'static str]),
}

impl PrimitiveKind {
    fn default_content(self) -> &'static str {
        match self {
            Self::Text => "",
            Self::UnsignedInt => "0",
            Self::Boolean => "false",
            Self::LocalDateTime => "1970-01-01T00:00:00",
            Self::Choice(options) => options.first().copied().unwrap_or(""),
        }
    }

    fn check(self, content: &str) -> Result<(), String> {
        match self {
            Self::Text => Ok(()),
            Self::UnsignedInt => content
                .parse::<u64>()
                .map(|_| ())
                .map_err(|_| "not an unsigned integer".to_owned()),
            Self::Boolean => match content {
                "true" | "false" => Ok(()),
                _ => Err("expected 'true' or 'false'".to_owned()),
            },
            Self::LocalDateTime => content
                .parse::<NaiveDateTime>()
                .map(|_| ())
                .map_err(|e| e.to_string()),
            Self::Choice(options) => {
                if options.contains(&content) {
                    Ok(())
                } else {
                    Err(format!("expected one of {}", options.join(", ")))
                }
            }
        }
    }
}

/// Allowed values of `core.PathMatchingStrategy`.
pub const PATH_MATCHING_STRATEGIES: &[&str] = &["EXACT", "SUBDIR"];

/// The built-in `core` types used by activities and policies.
#[derive(Debug, Clone)]
pub struct CoreTaxonomy {
    types: HashMap<TypeIdentifier, PrimitiveKind>,
}

impl CoreTaxonomy {
    #[must_use]
    pub fn new() -> Self {
        use PrimitiveKind as P;
        let types = [
            ("Text", P::Text),
            ("Error", P::Text),
            ("Path", P::Text),
            ("Tag", P::Text),
            ("Username", P::Text),
            ("Userrole", P::Text),
            ("URL", P::Text),
            ("UnsignedInt", P::UnsignedInt),
            ("Boolean", P::Boolean),
            ("LocalDateTime", P::LocalDateTime),
            ("PathMatchingStrategy", P::Choice(PATH_MATCHING_STRATEGIES)),
        ]
        .into_iter()
        .map(|(name, kind)| (TypeIdentifier::core(name), kind))
        .collect();
        Self { types }
    }

    /// Register an additional type.
    #[must_use]
    pub fn with_type(mut self, identifier: TypeIdentifier, kind: PrimitiveKind) -> Self {
        self.types.insert(identifier, kind);
        self
    }

    #[must_use]
    pub fn contains(&self, identifier: &TypeIdentifier) -> bool {
        self.types.contains_key(identifier)
    }

    fn kind(&self, identifier: &TypeIdentifier) -> Result<PrimitiveKind, ValueError> {
        self.types
            .get(identifier)
            .copied()
            .ok_or_else(|| ValueError::UnknownType {
                identifier: identifier.to_string(),
            })
    }
}

impl Default for CoreTaxonomy {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTaxonomy for CoreTaxonomy {
    fn validate(&self, identifier: &TypeIdentifier, content: &str) -> Result<(), ValueError> {
        self.kind(identifier)?
            .check(content)
            .map_err(|reason| ValueError::InvalidContent {
                identifier: identifier.to_string(),
                content: content.to_owned(),
                reason,
            })
    }

    fn create(&self, identifier: &TypeIdentifier) -> Result<Instance, ValueError> {
        let kind = self.kind(identifier)?;
        Ok(Instance::new(identifier.clone(), kind.default_content()))
    }
}

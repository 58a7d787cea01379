//! Identifier-keyed registries for activities and policies.
//!
//! Activities are registered with a [`ExecutionContainer::Noop`] container
//! and resolved exactly once, either to an in-process factory or through an
//! [`ActivityProvider`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::activity::{core_activities, Activity, ActivityFactory};
use crate::policy::{core_policies, Policy};
use crate::types::{ExecutionContainer, RegistryError};

/// Loads activities that live outside the crate.
pub trait ActivityProvider: Send + Sync {
    /// Turn an implementation name into a runnable activity.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Provider`] when the name cannot be loaded.
    fn load(&self, implementation: &str) -> Result<Arc<dyn Activity>, RegistryError>;
}

#[derive(Clone)]
enum Binding {
    Unbound,
    Factory(ActivityFactory),
    Loaded(Arc<dyn Activity>),
}

#[derive(Clone)]
struct Entry {
    container: ExecutionContainer,
    binding: Binding,
}

/// Activity identifiers mapped to their execution container.
#[derive(Clone, Default)]
pub struct ActivityRegistry {
    entries: HashMap<String, Entry>,
}

impl ActivityRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in activity, resolved as embedded.
    #[must_use]
    pub fn with_core_activities() -> Self {
        let mut registry = Self::new();
        for (identifier, factory) in core_activities() {
            registry.entries.insert(
                identifier.to_owned(),
                Entry {
                    container: ExecutionContainer::Embedded,
                    binding: Binding::Factory(factory),
                },
            );
        }
        registry
    }

    /// Add an unresolved entry.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateActivity`] if `identifier` is taken.
    pub fn register(&mut self, identifier: impl Into<String>) -> Result<(), RegistryError> {
        let identifier = identifier.into();
        if self.entries.contains_key(&identifier) {
            return Err(RegistryError::DuplicateActivity { identifier });
        }
        debug!(activity = %identifier, "activity registered");
        self.entries.insert(
            identifier,
            Entry {
                container: ExecutionContainer::Noop,
                binding: Binding::Unbound,
            },
        );
        Ok(())
    }

    fn unresolved(&mut self, identifier: &str) -> Result<&mut Entry, RegistryError> {
        let entry = self
            .entries
            .get_mut(identifier)
            .ok_or_else(|| RegistryError::UnknownActivity {
                identifier: identifier.to_owned(),
            })?;
        if entry.container.is_resolved() {
            return Err(RegistryError::AlreadyResolved {
                identifier: identifier.to_owned(),
                container: entry.container.to_string(),
            });
        }
        Ok(entry)
    }

    /// Bind a registered activity to an in-process factory.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownActivity`] or [`RegistryError::AlreadyResolved`].
    pub fn resolve_embedded(
        &mut self,
        identifier: &str,
        factory: ActivityFactory,
    ) -> Result<(), RegistryError> {
        let entry = self.unresolved(identifier)?;
        entry.container = ExecutionContainer::Embedded;
        entry.binding = Binding::Factory(factory);
        debug!(activity = identifier, "resolved as embedded");
        Ok(())
    }

    /// Bind a registered activity to an implementation loaded by `provider`.
    ///
    /// The entry stays unresolved if the provider fails.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownActivity`], [`RegistryError::AlreadyResolved`]
    /// or whatever the provider reports.
    pub fn resolve_external(
        &mut self,
        identifier: &str,
        implementation: &str,
        provider: &dyn ActivityProvider,
    ) -> Result<(), RegistryError> {
        self.unresolved(identifier)?;
        let activity = provider.load(implementation)?;
        let entry = self.unresolved(identifier)?;
        entry.container = ExecutionContainer::External {
            implementation: implementation.to_owned(),
        };
        entry.binding = Binding::Loaded(activity);
        debug!(activity = identifier, implementation, "resolved as external");
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The container currently recorded for `identifier`.
    #[must_use]
    pub fn container(&self, identifier: &str) -> Option<&ExecutionContainer> {
        self.entries.get(identifier).map(|e| &e.container)
    }

    /// Persisted form of every entry, ordered by identifier.
    #[must_use]
    pub fn containers(&self) -> BTreeMap<&str, &ExecutionContainer> {
        self.entries
            .iter()
            .map(|(id, e)| (id.as_str(), &e.container))
            .collect()
    }

    /// A runnable instance of `identifier`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownActivity`] or, for a `Noop` entry,
    /// [`RegistryError::NotResolved`].
    pub fn instantiate(&self, identifier: &str) -> Result<Arc<dyn Activity>, RegistryError> {
        let entry = self
            .entries
            .get(identifier)
            .ok_or_else(|| RegistryError::UnknownActivity {
                identifier: identifier.to_owned(),
            })?;
        match &entry.binding {
            Binding::Unbound => {
                warn!(activity = identifier, "instantiating unresolved activity");
                Err(RegistryError::NotResolved {
                    identifier: identifier.to_owned(),
                })
            }
            Binding::Factory(factory) => Ok(factory()),
            Binding::Loaded(activity) => Ok(Arc::clone(activity)),
        }
    }

    /// `{identifier: container}` as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_value(self.containers())
            .map(|v| v.to_string())
            .unwrap_or_default()
    }

    /// Rebuild a registry from the form written by [`to_json`](Self::to_json).
    ///
    /// Embedded entries are bound from `factories`, external ones through
    /// `provider`; `Noop` entries stay unresolved.
    ///
    /// # Errors
    ///
    /// [`crate::DataAppError::Json`] for a malformed document, or any
    /// [`RegistryError`] raised while resolving.
    pub fn from_json(
        json: &str,
        factories: &[(&str, ActivityFactory)],
        provider: &dyn ActivityProvider,
    ) -> Result<Self, crate::DataAppError> {
        let containers: BTreeMap<String, ExecutionContainer> = serde_json::from_str(json)?;
        Ok(Self::from_containers(containers, factories, provider)?)
    }

    pub(crate) fn from_containers(
        containers: impl IntoIterator<Item = (String, ExecutionContainer)>,
        factories: &[(&str, ActivityFactory)],
        provider: &dyn ActivityProvider,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for (identifier, container) in containers {
            registry.register(identifier.as_str())?;
            match container {
                ExecutionContainer::Noop => {}
                ExecutionContainer::Embedded => {
                    let factory = factories
                        .iter()
                        .find(|(id, _)| *id == identifier)
                        .map(|(_, f)| *f)
                        .ok_or_else(|| RegistryError::NotResolved {
                            identifier: identifier.clone(),
                        })?;
                    registry.resolve_embedded(&identifier, factory)?;
                }
                ExecutionContainer::External { implementation } => {
                    registry.resolve_external(&identifier, &implementation, provider)?;
                }
            }
        }
        Ok(registry)
    }
}

impl std::fmt::Debug for ActivityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.containers()).finish()
    }
}

/// Policy identifiers mapped to shared policy instances.
#[derive(Clone, Default)]
pub struct PolicyRegistry {
    policies: HashMap<String, Arc<dyn Policy>>,
}

impl PolicyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_core_policies() -> Self {
        let mut registry = Self::new();
        for policy in core_policies() {
            registry
                .policies
                .insert(policy.identifier().to_owned(), policy);
        }
        registry
    }

    /// # Errors
    ///
    /// [`RegistryError::DuplicatePolicy`] if the identifier is taken.
    pub fn register(&mut self, policy: Arc<dyn Policy>) -> Result<(), RegistryError> {
        let identifier = policy.identifier().to_owned();
        if self.policies.contains_key(&identifier) {
            return Err(RegistryError::DuplicatePolicy { identifier });
        }
        self.policies.insert(identifier, policy);
        Ok(())
    }

    /// # Errors
    ///
    /// [`RegistryError::UnknownPolicy`].
    pub fn get(&self, identifier: &str) -> Result<Arc<dyn Policy>, RegistryError> {
        self.policies
            .get(identifier)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownPolicy {
                identifier: identifier.to_owned(),
            })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&str> = self.identifiers().collect();
        ids.sort_unstable();
        f.debug_set().entries(ids).finish()
    }
}

use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use super::error::ContextError;

/// Placeholder value for facts that are not known.
pub const NO_VALUE: &str = "UNKNOWN";

pub const OS_USER_INFORMATION: &str = "OsUserInformation";
pub const JWT_USER_INFORMATION: &str = "JwtUserInformation";
pub const TAGS_MODULE: &str = "TagsContextModule";
/// Logical module name, mapped to [`OS_USER_INFORMATION`] by default.
pub const USER_INFORMATION: &str = "UserInformation";

pub const USERNAME: &str = "username";
pub const USERROLES: &str = "userroles";

/// What the host may do with an entity after it was added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    ReadOnly,
    ReadWrite,
    Switch,
    Counter,
}

/// A named ambient fact. Policies only ever read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    name: String,
    value: String,
    kind: EntityKind,
}

impl Entity {
    fn with_kind(name: impl Into<String>, value: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            kind,
        }
    }

    pub fn read_only(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::with_kind(name, value, EntityKind::ReadOnly)
    }

    pub fn read_write(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::with_kind(name, value, EntityKind::ReadWrite)
    }

    pub fn switch(name: impl Into<String>, on: bool) -> Self {
        Self::with_kind(name, on.to_string(), EntityKind::Switch)
    }

    pub fn counter(name: impl Into<String>, start: i64) -> Self {
        Self::with_kind(name, start.to_string(), EntityKind::Counter)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    #[must_use]
    pub fn read(&self) -> &str {
        &self.value
    }
}

/// A named group of entities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Module {
    name: String,
    entities: HashMap<String, Entity>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entities: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.add_entity(entity);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up an entity by name.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::UnknownEntity`] if the module has no such entity.
    pub fn entity(&self, key: &str) -> Result<&Entity, ContextError> {
        self.entities
            .get(key)
            .ok_or_else(|| ContextError::UnknownEntity {
                module: self.name.clone(),
                key: key.to_owned(),
            })
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entities.contains_key(key)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    fn add_entity(&mut self, entity: Entity) -> bool {
        if self.entities.contains_key(&entity.name) {
            warn!(module = %self.name, key = %entity.name, "context entity already present");
            return false;
        }
        self.entities.insert(entity.name.clone(), entity);
        true
    }

    fn remove_entity(&mut self, key: &str) -> bool {
        if self.entities.remove(key).is_none() {
            warn!(module = %self.name, key = %key, "context entity not present");
            return false;
        }
        true
    }

    fn entity_mut(&mut self, key: &str) -> Result<&mut Entity, ContextError> {
        let module = self.name.clone();
        self.entities
            .get_mut(key)
            .ok_or_else(|| ContextError::UnknownEntity {
                module,
                key: key.to_owned(),
            })
    }
}

#[derive(Debug, Clone, Default)]
struct ContextState {
    modules: HashMap<String, Module>,
    mappings: HashMap<String, String>,
}

impl ContextState {
    fn resolve_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.mappings.get(name).map_or(name, String::as_str)
    }

    fn module(&self, name: &str) -> Result<&Module, ContextError> {
        self.modules
            .get(self.resolve_name(name))
            .ok_or_else(|| ContextError::UnknownModule {
                name: name.to_owned(),
            })
    }

    fn module_mut(&mut self, name: &str) -> Result<&mut Module, ContextError> {
        let resolved = self.resolve_name(name).to_owned();
        self.modules
            .get_mut(&resolved)
            .ok_or_else(|| ContextError::UnknownModule {
                name: name.to_owned(),
            })
    }
}

/// Shared registry of ambient facts consulted by policies.
///
/// Cloning yields another handle to the same state. Writers are serialized
/// by a reader/writer lock; readers take a [`ContextSnapshot`] so one
/// evaluation sees a consistent view without holding the lock.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    state: Arc<RwLock<ContextState>>,
}

impl ExecutionContext {
    /// An empty context with no modules and no mappings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Context with the OS user, token user and tag modules, and
    /// `UserInformation` mapped to the OS user module.
    #[must_use]
    pub fn with_defaults() -> Self {
        let os_user = env::var("USER")
            .or_else(|_| env::var("USERNAME"))
            .unwrap_or_else(|_| NO_VALUE.to_owned());

        let ctx = Self::new();
        ctx.add_module(
            Module::new(OS_USER_INFORMATION)
                .with_entity(Entity::read_only(USERNAME, os_user))
                .with_entity(Entity::read_only(USERROLES, "")),
        );
        ctx.add_module(
            Module::new(JWT_USER_INFORMATION)
                .with_entity(Entity::read_only(USERNAME, NO_VALUE))
                .with_entity(Entity::read_only(USERROLES, NO_VALUE)),
        );
        ctx.add_module(Module::new(TAGS_MODULE));
        ctx.set_mapping(USER_INFORMATION, OS_USER_INFORMATION);
        ctx
    }

    /// Add a module unless one with the same name exists.
    pub fn add_module(&self, module: Module) -> bool {
        let mut state = self.state.write();
        if state.modules.contains_key(&module.name) {
            warn!(module = %module.name, "context module already present");
            return false;
        }
        state.modules.insert(module.name.clone(), module);
        true
    }

    /// Remove a module, following alias mappings. The mapping itself stays.
    pub fn remove_module(&self, name: &str) -> bool {
        let mut state = self.state.write();
        let resolved = state.resolve_name(name).to_owned();
        let removed = state.modules.remove(&resolved).is_some();
        if !removed {
            warn!(module = %name, "context module not present");
        }
        removed
    }

    /// Route lookups of `alias` to the module named `target`.
    pub fn set_mapping(&self, alias: impl Into<String>, target: impl Into<String>) {
        self.state.write().mappings.insert(alias.into(), target.into());
    }

    /// Add an entity to a module. Returns `Ok(false)` if the key exists.
    ///
    /// # Errors
    ///
    /// [`ContextError::UnknownModule`] if the module does not exist.
    pub fn add_entity(&self, module: &str, entity: Entity) -> Result<bool, ContextError> {
        Ok(self.state.write().module_mut(module)?.add_entity(entity))
    }

    /// Remove an entity from a module. Returns `Ok(false)` if it was absent.
    ///
    /// # Errors
    ///
    /// [`ContextError::UnknownModule`] if the module does not exist.
    pub fn remove_entity(&self, module: &str, key: &str) -> Result<bool, ContextError> {
        Ok(self.state.write().module_mut(module)?.remove_entity(key))
    }

    /// Replace the value of a read-write entity.
    ///
    /// # Errors
    ///
    /// Unknown module or entity, or [`ContextError::Unsupported`] for other kinds.
    pub fn write_entity(
        &self,
        module: &str,
        key: &str,
        value: impl Into<String>,
    ) -> Result<(), ContextError> {
        let mut state = self.state.write();
        let target = state.module_mut(module)?;
        let entity = target.entity_mut(key)?;
        if entity.kind != EntityKind::ReadWrite {
            return Err(unsupported(module, key, "write"));
        }
        entity.value = value.into();
        Ok(())
    }

    /// Flip a switch entity and return its new state.
    ///
    /// # Errors
    ///
    /// Unknown module or entity, or [`ContextError::Unsupported`] for other kinds.
    pub fn toggle(&self, module: &str, key: &str) -> Result<bool, ContextError> {
        let mut state = self.state.write();
        let entity = state.module_mut(module)?.entity_mut(key)?;
        if entity.kind != EntityKind::Switch {
            return Err(unsupported(module, key, "toggle"));
        }
        let on = entity.value != "true";
        entity.value = on.to_string();
        Ok(on)
    }

    /// Decrement a counter entity and return its new value.
    ///
    /// # Errors
    ///
    /// Unknown module or entity, or [`ContextError::Unsupported`] for other kinds.
    pub fn decrement(&self, module: &str, key: &str) -> Result<i64, ContextError> {
        let mut state = self.state.write();
        let entity = state.module_mut(module)?.entity_mut(key)?;
        if entity.kind != EntityKind::Counter {
            return Err(unsupported(module, key, "decrement"));
        }
        let next = entity.value.parse::<i64>().unwrap_or(0).saturating_sub(1);
        entity.value = next.to_string();
        Ok(next)
    }

    /// Replace all entities of `module` with one entity per tag.
    ///
    /// # Errors
    ///
    /// [`ContextError::UnknownModule`] if the module does not exist.
    pub fn set_tags<I, S>(&self, module: &str, tags: I) -> Result<(), ContextError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.write();
        let target = state.module_mut(module)?;
        target.entities.clear();
        for tag in tags {
            let tag = tag.into();
            target.add_entity(Entity::read_only(tag.clone(), tag));
        }
        Ok(())
    }

    /// Consistent copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            state: self.state.read().clone(),
        }
    }
}

fn unsupported(module: &str, key: &str, operation: &'static str) -> ContextError {
    ContextError::Unsupported {
        module: module.to_owned(),
        key: key.to_owned(),
        operation,
    }
}

/// Read-only view of an [`ExecutionContext`] taken at one instant.
#[derive(Debug, Clone, Default)]
pub struct ContextSnapshot {
    state: ContextState,
}

impl ContextSnapshot {
    /// Look up a module, following alias mappings.
    ///
    /// # Errors
    ///
    /// [`ContextError::UnknownModule`] if no module is registered under the
    /// (mapped) name.
    pub fn module(&self, name: &str) -> Result<&Module, ContextError> {
        self.state.module(name)
    }

    /// Resolve a `Module.entity` path.
    ///
    /// # Errors
    ///
    /// [`ContextError::InvalidPath`], or a missing module or entity.
    pub fn resolve(&self, path: &str) -> Result<&Entity, ContextError> {
        let (module, key) = path
            .split_once('.')
            .filter(|(m, k)| !m.is_empty() && !k.is_empty())
            .ok_or_else(|| ContextError::InvalidPath {
                path: path.to_owned(),
            })?;
        self.module(module)?.entity(key)
    }

    /// Whether `Module.entity` resolves.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.resolve(path).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_provide_user_and_tag_modules() {
        let snap = ExecutionContext::with_defaults().snapshot();
        assert!(snap.module(OS_USER_INFORMATION).is_ok());
        assert_eq!(
            snap.module(JWT_USER_INFORMATION)
                .unwrap()
                .entity(USERNAME)
                .unwrap()
                .read(),
            NO_VALUE
        );
        assert_eq!(snap.module(USER_INFORMATION).unwrap().name(), OS_USER_INFORMATION);
        assert!(snap.module(TAGS_MODULE).unwrap().entities().next().is_none());
    }

    #[test]
    fn unknown_module_and_entity_are_errors() {
        let snap = ExecutionContext::new().snapshot();
        assert_eq!(
            snap.module("Nope").unwrap_err(),
            ContextError::UnknownModule {
                name: "Nope".into()
            }
        );
        let ctx = ExecutionContext::new();
        ctx.add_module(Module::new("M"));
        assert!(matches!(
            ctx.snapshot().resolve("M.x"),
            Err(ContextError::UnknownEntity { .. })
        ));
        assert!(matches!(
            ctx.snapshot().resolve("M"),
            Err(ContextError::InvalidPath { .. })
        ));
    }

    #[test]
    fn duplicate_and_missing_entities() {
        let ctx = ExecutionContext::new();
        assert!(ctx.add_module(Module::new("M")));
        assert!(!ctx.add_module(Module::new("M")));
        assert!(ctx.add_entity("M", Entity::read_only("a", "1")).unwrap());
        assert!(!ctx.add_entity("M", Entity::read_only("a", "2")).unwrap());
        assert_eq!(ctx.snapshot().resolve("M.a").unwrap().read(), "1");
        assert!(ctx.remove_entity("M", "a").unwrap());
        assert!(!ctx.remove_entity("M", "a").unwrap());
        assert!(ctx.add_entity("Other", Entity::read_only("a", "1")).is_err());
    }

    #[test]
    fn remapping_switches_module() {
        let ctx = ExecutionContext::with_defaults();
        ctx.set_mapping(USER_INFORMATION, JWT_USER_INFORMATION);
        let snap = ctx.snapshot();
        assert_eq!(snap.module(USER_INFORMATION).unwrap().name(), JWT_USER_INFORMATION);
    }

    #[test]
    fn snapshot_is_isolated_from_later_writes() {
        let ctx = ExecutionContext::with_defaults();
        ctx.set_tags(TAGS_MODULE, ["DEBUG"]).unwrap();
        let before = ctx.snapshot();
        ctx.set_tags(TAGS_MODULE, ["PRODUCTION"]).unwrap();
        assert!(before.contains("TagsContextModule.DEBUG"));
        assert!(!before.contains("TagsContextModule.PRODUCTION"));
        assert!(ctx.snapshot().contains("TagsContextModule.PRODUCTION"));
    }

    #[test]
    fn host_mutations_respect_entity_kind() {
        let ctx = ExecutionContext::new();
        ctx.add_module(
            Module::new("M")
                .with_entity(Entity::read_only("fixed", "x"))
                .with_entity(Entity::read_write("note", "a"))
                .with_entity(Entity::switch("flag", false))
                .with_entity(Entity::counter("budget", 2)),
        );
        ctx.write_entity("M", "note", "b").unwrap();
        assert!(ctx.toggle("M", "flag").unwrap());
        assert_eq!(ctx.decrement("M", "budget").unwrap(), 1);
        assert!(matches!(
            ctx.write_entity("M", "fixed", "y"),
            Err(ContextError::Unsupported { operation: "write", .. })
        ));
        let snap = ctx.snapshot();
        assert_eq!(snap.resolve("M.note").unwrap().read(), "b");
        assert_eq!(snap.resolve("M.flag").unwrap().read(), "true");
        assert_eq!(snap.resolve("M.fixed").unwrap().kind(), EntityKind::ReadOnly);
    }

    #[test]
    fn removing_through_an_alias_removes_the_target() {
        let ctx = ExecutionContext::with_defaults();
        assert!(ctx.remove_module(USER_INFORMATION));
        let snap = ctx.snapshot();
        assert!(snap.module(USER_INFORMATION).is_err());
        assert!(snap.module(OS_USER_INFORMATION).is_err());
        assert!(snap.module(JWT_USER_INFORMATION).is_ok());
        assert!(!ctx.remove_module(USER_INFORMATION));
    }
}

//! Factory system: type-name keyed construction of pipeline components.
//!
//! Registration happens on a `RegistryBuilder`, which is consumed by `build()`
//! into an immutable `Registry`. The registry only answers lookups, so once
//! built it can be shared across threads freely.
//!
//! Constructors receive `ComponentArgs` untouched. Malformed arguments are a
//! construction fault and surface as `FactoryError::InvalidArgs`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::backup::DataBackup;
use super::calculator::Calculator;
use super::saver::DataSaver;
use super::scraper::Scraper;
use super::source::DataSource;

// ─── Kinds ───────────────────────────────────────────────────────────

/// The five capability sets a component can implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Source,
    Saver,
    Backup,
    Calculator,
    Scraper,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 5] = [
        ComponentKind::Source,
        ComponentKind::Saver,
        ComponentKind::Backup,
        ComponentKind::Calculator,
        ComponentKind::Scraper,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Source => "source",
            ComponentKind::Saver => "saver",
            ComponentKind::Backup => "backup",
            ComponentKind::Calculator => "calculator",
            ComponentKind::Scraper => "scraper",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentKind {
    type Err = FactoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| FactoryError::UnknownKind(s.to_string()))
    }
}

// ─── Error types ─────────────────────────────────────────────────────

/// Problems with the arguments handed to a constructor.
#[derive(Debug, thiserror::Error)]
pub enum ArgsError {
    #[error("missing required parameter '{key}'")]
    Missing { key: String },
    #[error("parameter '{key}' must be {expected}")]
    WrongType { key: String, expected: &'static str },
    #[error("{0}")]
    Invalid(String),
}

/// Errors that can occur during registration or component construction.
#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    #[error("unknown {kind} type: {type_name}")]
    UnknownType {
        kind: ComponentKind,
        type_name: String,
    },
    #[error("{kind} type '{type_name}' is already registered")]
    DuplicateType {
        kind: ComponentKind,
        type_name: String,
    },
    #[error("invalid arguments for {kind} '{type_name}': {source}")]
    InvalidArgs {
        kind: ComponentKind,
        type_name: String,
        #[source]
        source: ArgsError,
    },
    #[error("unknown component kind: {0}")]
    UnknownKind(String),
}

// ─── Construction arguments ──────────────────────────────────────────

/// Opaque constructor arguments, passed through unchanged by the registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentArgs {
    #[serde(flatten)]
    pub params: BTreeMap<String, Value>,
}

impl ComponentArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Optional string parameter.
    pub fn str_param(&self, key: &str) -> Result<Option<&str>, ArgsError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(wrong_type(key, "a string")),
        }
    }

    /// Required string parameter.
    pub fn required_str(&self, key: &str) -> Result<&str, ArgsError> {
        self.str_param(key)?.ok_or_else(|| ArgsError::Missing {
            key: key.to_string(),
        })
    }

    /// Required filesystem path parameter.
    pub fn path_param(&self, key: &str) -> Result<PathBuf, ArgsError> {
        self.required_str(key).map(PathBuf::from)
    }

    /// Non-negative integer parameter, falling back to `default`.
    pub fn usize_param(&self, key: &str, default: usize) -> Result<usize, ArgsError> {
        match self.params.get(key) {
            None => Ok(default),
            Some(value) => value
                .as_u64()
                .map(|v| v as usize)
                .ok_or_else(|| wrong_type(key, "a non-negative integer")),
        }
    }

    /// Boolean parameter, falling back to `default`.
    pub fn bool_param(&self, key: &str, default: bool) -> Result<bool, ArgsError> {
        match self.params.get(key) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(wrong_type(key, "a boolean")),
        }
    }

    /// List of strings, empty when absent.
    pub fn string_list_param(&self, key: &str) -> Result<Vec<String>, ArgsError> {
        match self.params.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| wrong_type(key, "a list of strings"))
                })
                .collect(),
            Some(_) => Err(wrong_type(key, "a list of strings")),
        }
    }

    /// Table of string values, empty when absent.
    pub fn string_map_param(&self, key: &str) -> Result<BTreeMap<String, String>, ArgsError> {
        match self.params.get(key) {
            None => Ok(BTreeMap::new()),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| {
                    v.as_str()
                        .map(|s| (k.clone(), s.to_string()))
                        .ok_or_else(|| wrong_type(key, "a table of strings"))
                })
                .collect(),
            Some(_) => Err(wrong_type(key, "a table of strings")),
        }
    }
}

fn wrong_type(key: &str, expected: &'static str) -> ArgsError {
    ArgsError::WrongType {
        key: key.to_string(),
        expected,
    }
}

// ─── Constructed components ──────────────────────────────────────────

/// A constructor closure for components of trait-object type `T`.
pub type Constructor<T> = Box<dyn Fn(&ComponentArgs) -> Result<Box<T>, ArgsError> + Send + Sync>;

/// A constructed component, tagged by kind.
pub enum Component {
    Source(Box<dyn DataSource>),
    Saver(Box<dyn DataSaver>),
    Backup(Box<dyn DataBackup>),
    Calculator(Box<dyn Calculator>),
    Scraper(Box<dyn Scraper>),
}

impl Component {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Component::Source(_) => ComponentKind::Source,
            Component::Saver(_) => ComponentKind::Saver,
            Component::Backup(_) => ComponentKind::Backup,
            Component::Calculator(_) => ComponentKind::Calculator,
            Component::Scraper(_) => ComponentKind::Scraper,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Component::Source(c) => c.name(),
            Component::Saver(c) => c.name(),
            Component::Backup(c) => c.name(),
            Component::Calculator(c) => c.name(),
            Component::Scraper(c) => c.name(),
        }
    }

    pub fn health_check(&self) -> bool {
        match self {
            Component::Source(c) => c.health_check(),
            Component::Saver(c) => c.health_check(),
            Component::Backup(c) => c.health_check(),
            Component::Calculator(c) => c.health_check(),
            Component::Scraper(c) => c.health_check(),
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .finish()
    }
}

// ─── Registry ────────────────────────────────────────────────────────

/// Ordered constructors for one kind.
struct Slot<T: ?Sized> {
    entries: Vec<(String, Constructor<T>)>,
}

impl<T: ?Sized> Default for Slot<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: ?Sized> Slot<T> {
    fn insert(
        &mut self,
        kind: ComponentKind,
        type_name: &str,
        ctor: Constructor<T>,
    ) -> Result<(), FactoryError> {
        if self.get(type_name).is_some() {
            return Err(FactoryError::DuplicateType {
                kind,
                type_name: type_name.to_string(),
            });
        }
        self.entries.push((type_name.to_string(), ctor));
        Ok(())
    }

    fn get(&self, type_name: &str) -> Option<&Constructor<T>> {
        self.entries
            .iter()
            .find(|(name, _)| name == type_name)
            .map(|(_, ctor)| ctor)
    }

    fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    fn create(
        &self,
        kind: ComponentKind,
        type_name: &str,
        args: &ComponentArgs,
    ) -> Result<Box<T>, FactoryError> {
        let ctor = self.get(type_name).ok_or_else(|| FactoryError::UnknownType {
            kind,
            type_name: type_name.to_string(),
        })?;
        ctor(args).map_err(|source| FactoryError::InvalidArgs {
            kind,
            type_name: type_name.to_string(),
            source,
        })
    }
}

/// Mutable registration phase.
#[derive(Default)]
pub struct RegistryBuilder {
    sources: Slot<dyn DataSource>,
    savers: Slot<dyn DataSaver>,
    backups: Slot<dyn DataBackup>,
    calculators: Slot<dyn Calculator>,
    scrapers: Slot<dyn Scraper>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pre-populated with every built-in backend and calculator.
    pub fn with_builtins() -> Result<Self, FactoryError> {
        let mut builder = Self::new();
        crate::backends::register_builtins(&mut builder)?;
        crate::calculators::register_builtins(&mut builder)?;
        Ok(builder)
    }

    pub fn register_source<F>(&mut self, type_name: &str, ctor: F) -> Result<&mut Self, FactoryError>
    where
        F: Fn(&ComponentArgs) -> Result<Box<dyn DataSource>, ArgsError> + Send + Sync + 'static,
    {
        self.sources
            .insert(ComponentKind::Source, type_name, Box::new(ctor))?;
        Ok(self)
    }

    pub fn register_saver<F>(&mut self, type_name: &str, ctor: F) -> Result<&mut Self, FactoryError>
    where
        F: Fn(&ComponentArgs) -> Result<Box<dyn DataSaver>, ArgsError> + Send + Sync + 'static,
    {
        self.savers
            .insert(ComponentKind::Saver, type_name, Box::new(ctor))?;
        Ok(self)
    }

    pub fn register_backup<F>(&mut self, type_name: &str, ctor: F) -> Result<&mut Self, FactoryError>
    where
        F: Fn(&ComponentArgs) -> Result<Box<dyn DataBackup>, ArgsError> + Send + Sync + 'static,
    {
        self.backups
            .insert(ComponentKind::Backup, type_name, Box::new(ctor))?;
        Ok(self)
    }

    pub fn register_calculator<F>(
        &mut self,
        type_name: &str,
        ctor: F,
    ) -> Result<&mut Self, FactoryError>
    where
        F: Fn(&ComponentArgs) -> Result<Box<dyn Calculator>, ArgsError> + Send + Sync + 'static,
    {
        self.calculators
            .insert(ComponentKind::Calculator, type_name, Box::new(ctor))?;
        Ok(self)
    }

    pub fn register_scraper<F>(&mut self, type_name: &str, ctor: F) -> Result<&mut Self, FactoryError>
    where
        F: Fn(&ComponentArgs) -> Result<Box<dyn Scraper>, ArgsError> + Send + Sync + 'static,
    {
        self.scrapers
            .insert(ComponentKind::Scraper, type_name, Box::new(ctor))?;
        Ok(self)
    }

    /// Freeze registrations.
    pub fn build(self) -> Registry {
        Registry {
            sources: self.sources,
            savers: self.savers,
            backups: self.backups,
            calculators: self.calculators,
            scrapers: self.scrapers,
        }
    }
}

/// Immutable lookup table from `(kind, type_name)` to constructor.
pub struct Registry {
    sources: Slot<dyn DataSource>,
    savers: Slot<dyn DataSaver>,
    backups: Slot<dyn DataBackup>,
    calculators: Slot<dyn Calculator>,
    scrapers: Slot<dyn Scraper>,
}

impl Registry {
    /// Registry with every built-in backend and calculator.
    pub fn builtin() -> Result<Self, FactoryError> {
        Ok(RegistryBuilder::with_builtins()?.build())
    }

    /// Construct a component of `kind` registered under `type_name`.
    pub fn create(
        &self,
        kind: ComponentKind,
        type_name: &str,
        args: &ComponentArgs,
    ) -> Result<Component, FactoryError> {
        Ok(match kind {
            ComponentKind::Source => Component::Source(self.create_source(type_name, args)?),
            ComponentKind::Saver => Component::Saver(self.create_saver(type_name, args)?),
            ComponentKind::Backup => Component::Backup(self.create_backup(type_name, args)?),
            ComponentKind::Calculator => {
                Component::Calculator(self.create_calculator(type_name, args)?)
            }
            ComponentKind::Scraper => Component::Scraper(self.create_scraper(type_name, args)?),
        })
    }

    pub fn create_source(
        &self,
        type_name: &str,
        args: &ComponentArgs,
    ) -> Result<Box<dyn DataSource>, FactoryError> {
        self.sources.create(ComponentKind::Source, type_name, args)
    }

    pub fn create_saver(
        &self,
        type_name: &str,
        args: &ComponentArgs,
    ) -> Result<Box<dyn DataSaver>, FactoryError> {
        self.savers.create(ComponentKind::Saver, type_name, args)
    }

    pub fn create_backup(
        &self,
        type_name: &str,
        args: &ComponentArgs,
    ) -> Result<Box<dyn DataBackup>, FactoryError> {
        self.backups.create(ComponentKind::Backup, type_name, args)
    }

    pub fn create_calculator(
        &self,
        type_name: &str,
        args: &ComponentArgs,
    ) -> Result<Box<dyn Calculator>, FactoryError> {
        self.calculators
            .create(ComponentKind::Calculator, type_name, args)
    }

    pub fn create_scraper(
        &self,
        type_name: &str,
        args: &ComponentArgs,
    ) -> Result<Box<dyn Scraper>, FactoryError> {
        self.scrapers.create(ComponentKind::Scraper, type_name, args)
    }

    /// Registered type names for `kind`, in registration order.
    pub fn list(&self, kind: ComponentKind) -> Vec<&str> {
        match kind {
            ComponentKind::Source => self.sources.names(),
            ComponentKind::Saver => self.savers.names(),
            ComponentKind::Backup => self.backups.names(),
            ComponentKind::Calculator => self.calculators.names(),
            ComponentKind::Scraper => self.scrapers.names(),
        }
    }

    pub fn contains(&self, kind: ComponentKind, type_name: &str) -> bool {
        self.list(kind).contains(&type_name)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for kind in ComponentKind::ALL {
            map.entry(&kind.as_str(), &self.list(kind));
        }
        map.finish()
    }
}

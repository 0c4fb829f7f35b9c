//! Subgroups: a field selecting exactly one of several named record types.
use std::fmt::{self, Debug, Display};
use std::hash::Hash;
use std::sync::Arc;

use clap::Command;
use indexmap::IndexMap;

use crate::choice::ChoiceSource;
use crate::error::{FieldError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// A structured record with named, typed fields.
    Record,
    Other,
}

#[derive(Debug, PartialEq, Eq)]
struct TypeInfo {
    name: String,
    kind: TypeKind,
}

/// Handle to a type that a subgroup or sub-command can select.
///
/// Clones share identity ([`VariantType::is_same`]); separately constructed
/// handles with the same name and kind are equal but not the same.
#[derive(Clone)]
pub struct VariantType {
    info: Arc<TypeInfo>,
    augment: Option<fn(Command) -> Command>,
}

impl VariantType {
    /// A record type known only by name.
    pub fn record(name: impl Into<String>) -> Self {
        Self::new(name.into(), TypeKind::Record, None)
    }

    /// A type that is not a record, e.g. a bare scalar.
    pub fn other(name: impl Into<String>) -> Self {
        Self::new(name.into(), TypeKind::Other, None)
    }

    /// A record type backed by a clap `Args` implementation, whose arguments
    /// are added to the command when the variant is bound.
    pub fn of<T: clap::Args + 'static>() -> Self {
        let full = std::any::type_name::<T>();
        let name = full.rsplit("::").next().unwrap_or(full);
        Self::new(name.to_string(), TypeKind::Record, Some(T::augment_args as fn(Command) -> Command))
    }

    fn new(name: String, kind: TypeKind, augment: Option<fn(Command) -> Command>) -> Self {
        VariantType {
            info: Arc::new(TypeInfo { name, kind }),
            augment,
        }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn kind(&self) -> TypeKind {
        self.info.kind
    }

    pub fn is_record(&self) -> bool {
        self.info.kind == TypeKind::Record
    }

    /// Identity comparison.
    pub fn is_same(&self, other: &VariantType) -> bool {
        Arc::ptr_eq(&self.info, &other.info)
    }

    /// Adds this variant's arguments to `cmd`; a name-only variant adds none.
    pub fn augment_args(&self, cmd: Command) -> Command {
        match self.augment {
            Some(augment) => augment(cmd),
            None => cmd,
        }
    }
}

impl PartialEq for VariantType {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other) || self.info == other.info
    }
}

impl Debug for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariantType")
            .field("name", &self.info.name)
            .field("kind", &self.info.kind)
            .finish()
    }
}

impl Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.info.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubgroupChoices<K: Hash + Eq> {
    subgroups: IndexMap<K, VariantType>,
    default: Option<K>,
}

impl<K: Hash + Eq> SubgroupChoices<K> {
    pub fn subgroups(&self) -> &IndexMap<K, VariantType> {
        &self.subgroups
    }

    /// Key of the default subgroup. `None` means a subgroup must be selected.
    pub fn default(&self) -> Option<&K> {
        self.default.as_ref()
    }

    /// The variant built when nothing is selected.
    pub fn default_factory(&self) -> Option<&VariantType> {
        self.default.as_ref().and_then(|k| self.subgroups.get(k))
    }

    pub fn variant(&self, key: &K) -> Option<&VariantType> {
        self.subgroups.get(key)
    }
}

impl<K: Hash + Eq + Display> ChoiceSource for SubgroupChoices<K> {
    fn keys(&self) -> Vec<String> {
        self.subgroups.keys().map(ToString::to_string).collect()
    }
    fn default_key(&self) -> Option<String> {
        self.default.as_ref().map(ToString::to_string)
    }
}

/// Resolves a subgroup declaration.
///
/// At most one of `default` (a key) and `default_factory` (one of the mapped
/// types) may be given. A factory is looked up by identity first, then by
/// equality, and must match exactly one key.
pub fn resolve_subgroups<K: Hash + Eq + Clone + Debug>(
    subgroups: IndexMap<K, VariantType>,
    default: Option<K>,
    default_factory: Option<VariantType>,
) -> Result<SubgroupChoices<K>> {
    if subgroups.is_empty() {
        return Err(FieldError::EmptyChoiceSet);
    }
    if let Some((key, ty)) = subgroups.iter().find(|(_, ty)| !ty.is_record()) {
        return Err(FieldError::InvalidSubgroupValue {
            key: format!("{key:?}"),
            type_name: ty.name().to_string(),
        });
    }
    let default = match (default, default_factory) {
        (Some(_), Some(_)) => return Err(FieldError::ConflictingDefaultSpecification),
        (Some(key), None) => {
            if !subgroups.contains_key(&key) {
                return Err(FieldError::invalid_default(
                    &key,
                    "must be a key of the subgroups",
                ));
            }
            Some(key)
        }
        (None, Some(factory)) => Some(matching_key(&subgroups, &factory)?),
        (None, None) => None,
    };
    Ok(SubgroupChoices { subgroups, default })
}

fn matching_key<K: Clone + Debug>(
    subgroups: &IndexMap<K, VariantType>,
    factory: &VariantType,
) -> Result<K> {
    let mut keys: Vec<&K> = subgroups
        .iter()
        .filter(|(_, ty)| ty.is_same(factory))
        .map(|(k, _)| k)
        .collect();
    if keys.is_empty() {
        keys = subgroups
            .iter()
            .filter(|(_, ty)| *ty == factory)
            .map(|(k, _)| k)
            .collect();
    }
    match keys.as_slice() {
        [] => Err(FieldError::invalid_default(
            factory,
            "default factory must be a value of the subgroups",
        )),
        [key] => Ok((*key).clone()),
        _ => Err(FieldError::AmbiguousDefaultFactory {
            factory: factory.name().to_string(),
            keys: keys.iter().map(|k| format!("{k:?}")).collect(),
        }),
    }
}

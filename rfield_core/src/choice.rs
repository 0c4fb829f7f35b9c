//! Choice resolution.
//!
//! A choice set comes in three shapes: a plain sequence of keys, an enumerated
//! type, or a mapping from key to value. Each shape has its own named resolver
//! which reduces it to an ordered list of canonical keys and validates the
//! default selection. Downstream consumers read the result through
//! [`ChoiceSource`].
use std::fmt::{self, Debug, Display};
use std::hash::Hash;

use clap::ValueEnum;
use indexmap::IndexMap;

use crate::error::{FieldError, Result};
use crate::Value;

/// A hashable choice key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl Key {
    /// Converts a plain value into a key. Floats, arrays, tables and datetimes
    /// are not hashable keys.
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::String(s) => Some(Key::Str(s.clone())),
            Value::Integer(i) => Some(Key::Int(*i)),
            Value::Boolean(b) => Some(Key::Bool(*b)),
            _ => None,
        }
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(s) => f.write_str(s),
            Key::Int(i) => write!(f, "{i}"),
            Key::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_string())
    }
}
impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(s)
    }
}
impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Int(i)
    }
}
impl From<bool> for Key {
    fn from(b: bool) -> Self {
        Key::Bool(b)
    }
}
impl From<Key> for Value {
    fn from(key: Key) -> Self {
        match key {
            Key::Str(s) => Value::String(s),
            Key::Int(i) => Value::Integer(i),
            Key::Bool(b) => Value::Boolean(b),
        }
    }
}

/// Read-only view of a resolved choice set, as consumed by the CLI binding.
pub trait ChoiceSource {
    /// Canonical keys, in declaration order.
    fn keys(&self) -> Vec<String>;
    /// The default key, if a default was selected.
    fn default_key(&self) -> Option<String>;
}

/// Non-fatal conditions noticed during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveWarning {
    /// An enum default was given by member name rather than as the member.
    AmbiguousEnumDefault { name: String },
}

impl Display for ResolveWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveWarning::AmbiguousEnumDefault { name } => write!(
                f,
                "default={name} could be ambiguous (enum names vs enum members); \
                 consider passing the member instead of its name"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlainChoices<T> {
    choices: Vec<T>,
    default: Option<T>,
}

impl<T> PlainChoices<T> {
    pub fn choices(&self) -> &[T] {
        &self.choices
    }
    pub fn default(&self) -> Option<&T> {
        self.default.as_ref()
    }
}

impl<T: Display> ChoiceSource for PlainChoices<T> {
    fn keys(&self) -> Vec<String> {
        self.choices.iter().map(ToString::to_string).collect()
    }
    fn default_key(&self) -> Option<String> {
        self.default.as_ref().map(ToString::to_string)
    }
}

/// Resolves a plain sequence of choices. The default, when given, must be one
/// of them.
pub fn resolve_plain<T: PartialEq + Debug>(
    choices: Vec<T>,
    default: Option<T>,
) -> Result<PlainChoices<T>> {
    if choices.is_empty() {
        return Err(FieldError::EmptyChoiceSet);
    }
    if let Some(d) = &default
        && !choices.contains(d)
    {
        return Err(FieldError::invalid_default(
            d,
            format!("not one of the choices {choices:?}"),
        ));
    }
    Ok(PlainChoices { choices, default })
}

/// Default selection for an enum choice: either the member itself or its name.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumDefault<E> {
    Member(E),
    Name(String),
}

impl<E> EnumDefault<E> {
    pub fn name(name: impl Into<String>) -> Self {
        EnumDefault::Name(name.into())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumChoices<E> {
    names: Vec<String>,
    default: Option<E>,
    warnings: Vec<ResolveWarning>,
}

impl<E: ValueEnum> EnumChoices<E> {
    pub fn names(&self) -> &[String] {
        &self.names
    }
    pub fn default(&self) -> Option<&E> {
        self.default.as_ref()
    }
    pub fn warnings(&self) -> &[ResolveWarning] {
        &self.warnings
    }
}

impl<E: ValueEnum> ChoiceSource for EnumChoices<E> {
    fn keys(&self) -> Vec<String> {
        self.names.clone()
    }
    fn default_key(&self) -> Option<String> {
        self.default
            .as_ref()
            .and_then(|e| e.to_possible_value())
            .map(|pv| pv.get_name().to_string())
    }
}

/// Resolves an enumerated type. Canonical keys are the member names, as clap
/// renders them, in declaration order. Skipped members are not selectable.
///
/// A default given by name may use the member identifier or its rendered
/// name; either way it is replaced by the member and a warning is recorded.
pub fn resolve_enum<E: ValueEnum + Debug>(
    default: Option<EnumDefault<E>>,
) -> Result<EnumChoices<E>> {
    let names: Vec<String> = E::value_variants()
        .iter()
        .filter_map(|v| v.to_possible_value())
        .map(|pv| pv.get_name().to_string())
        .collect();
    if names.is_empty() {
        return Err(FieldError::EmptyChoiceSet);
    }
    let type_name = std::any::type_name::<E>();
    let mut warnings = Vec::new();
    let default = match default {
        None => None,
        Some(EnumDefault::Member(member)) => {
            if member.to_possible_value().is_none() {
                return Err(FieldError::invalid_default(
                    &member,
                    format!("not a valid member of {type_name}"),
                ));
            }
            Some(member)
        }
        Some(EnumDefault::Name(name)) => {
            // Either the member identifier (`Green`) or clap's spelling (`green`).
            let member = E::value_variants()
                .iter()
                .find(|v| {
                    v.to_possible_value().is_some_and(|pv| {
                        pv.get_name() == name || format!("{v:?}") == name
                    })
                })
                .cloned()
                .ok_or_else(|| {
                    FieldError::invalid_default(&name, format!("not a valid member of {type_name}"))
                })?;
            let warning = ResolveWarning::AmbiguousEnumDefault { name };
            tracing::warn!(enum_type = type_name, "{warning}");
            warnings.push(warning);
            Some(member)
        }
    };
    Ok(EnumChoices {
        names,
        default,
        warnings,
    })
}

/// A key or a value of a mapping choice set, as seen by the codec.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<K, V> {
    Key(K),
    Value(V),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappingChoices<K: Hash + Eq, V> {
    map: IndexMap<K, V>,
    default: Option<K>,
}

impl<K: Hash + Eq + Clone, V: PartialEq + Clone> MappingChoices<K, V> {
    pub fn map(&self) -> &IndexMap<K, V> {
        &self.map
    }
    pub fn default(&self) -> Option<&K> {
        self.default.as_ref()
    }
    /// The value selected by default.
    pub fn default_value(&self) -> Option<&V> {
        self.default.as_ref().and_then(|k| self.map.get(k))
    }

    /// First key whose value equals `value`.
    pub fn key_of(&self, value: &V) -> Option<&K> {
        self.map.iter().find(|(_, v)| *v == value).map(|(k, _)| k)
    }

    /// Maps a value back to its key. Keys, and values outside the mapping,
    /// pass through unchanged.
    pub fn encode(&self, token: Token<K, V>) -> Token<K, V> {
        match token {
            Token::Value(v) => match self.key_of(&v) {
                Some(k) => Token::Key(k.clone()),
                None => Token::Value(v),
            },
            key => key,
        }
    }

    /// Maps a key to its value. Unknown keys pass through unchanged.
    pub fn decode(&self, key: K) -> Token<K, V> {
        match self.map.get(&key) {
            Some(v) => Token::Value(v.clone()),
            None => Token::Key(key),
        }
    }
}

impl<K: Hash + Eq + Display, V> ChoiceSource for MappingChoices<K, V> {
    fn keys(&self) -> Vec<String> {
        self.map.keys().map(ToString::to_string).collect()
    }
    fn default_key(&self) -> Option<String> {
        self.default.as_ref().map(ToString::to_string)
    }
}

/// Resolves a mapping choice set. Canonical keys are the mapping keys in
/// insertion order; the default, when given, must be one of them.
pub fn resolve_mapping<K: Hash + Eq + Debug, V>(
    map: IndexMap<K, V>,
    default: Option<K>,
) -> Result<MappingChoices<K, V>> {
    if map.is_empty() {
        return Err(FieldError::EmptyChoiceSet);
    }
    if let Some(d) = &default
        && !map.contains_key(d)
    {
        return Err(FieldError::invalid_default(
            d,
            format!("not a key of the choices {:?}", map.keys().collect::<Vec<_>>()),
        ));
    }
    Ok(MappingChoices { map, default })
}

//! Field declarations.
//!
//! A [`Field`] carries everything the CLI binding and the record codec need to
//! know about one configuration entry: its default, aliases, choices and
//! codecs. Fields are declared through [`FieldBuilder`], returned by the
//! constructor functions of this module ([`field`], [`choice`],
//! [`subgroups`], ...), and validated once by [`FieldBuilder::build`].
use std::fmt::{self, Debug};
use std::sync::Arc;

use clap::ValueEnum;
use indexmap::IndexMap;

use crate::Value;
use crate::choice::{
    ChoiceSource, EnumDefault, Key, MappingChoices, PlainChoices, ResolveWarning, Token,
    resolve_enum, resolve_mapping, resolve_plain,
};
use crate::error::{FieldError, Result};
use crate::subgroup::{SubgroupChoices, VariantType, resolve_subgroups};

/// Converts a field value to or from its serialized form.
pub type Codec = Arc<dyn Fn(Value) -> Value + Send + Sync>;
/// Produces a fresh default value.
pub type Factory = Arc<dyn Fn() -> Value + Send + Sync>;

#[derive(Clone, Default)]
pub enum FieldDefault {
    /// No default: the value must be supplied.
    #[default]
    Missing,
    Value(Value),
    /// Called once per record, so records never share a mutable default.
    Factory(Factory),
}

impl Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldDefault::Missing => f.write_str("Missing"),
            FieldDefault::Value(v) => f.debug_tuple("Value").field(v).finish(),
            FieldDefault::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagAction {
    StoreTrue,
    StoreFalse,
}

impl FlagAction {
    pub fn name(&self) -> &'static str {
        match self {
            FlagAction::StoreTrue => "store_true",
            FlagAction::StoreFalse => "store_false",
        }
    }

    /// The only default compatible with this action.
    pub fn implied_default(&self) -> bool {
        matches!(self, FlagAction::StoreFalse)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    List,
    Set,
    Dict,
}

/// Command-line hints forwarded to the binding layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgHints {
    pub help: Option<String>,
    pub env: Option<String>,
    pub value_name: Option<String>,
    pub required: Option<bool>,
    pub action: Option<FlagAction>,
    /// Hints with no dedicated slot, kept verbatim.
    pub extra: IndexMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChoiceMeta {
    Plain(PlainChoices<Key>),
    /// Member names of an enumerated type.
    Enum {
        type_name: String,
        choices: PlainChoices<Key>,
    },
    Mapping(MappingChoices<Key, Value>),
}

impl ChoiceMeta {
    pub fn source(&self) -> &dyn ChoiceSource {
        match self {
            ChoiceMeta::Plain(c) => c,
            ChoiceMeta::Enum { choices, .. } => choices,
            ChoiceMeta::Mapping(c) => c,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Value,
    /// Boolean that may be given bare (`--flag`) or with a value (`--flag false`).
    Flag,
    Collection(CollectionKind),
    Choice(ChoiceMeta),
    Subgroups(SubgroupChoices<Key>),
    Subparsers(IndexMap<String, VariantType>),
}

impl FieldKind {
    /// The default a choice or subgroup declaration resolved to, in record
    /// form. `None` for kinds without a choice set.
    fn resolved_default(&self) -> Option<Option<Value>> {
        match self {
            FieldKind::Choice(ChoiceMeta::Plain(c) | ChoiceMeta::Enum { choices: c, .. }) => {
                Some(c.default().cloned().map(Value::from))
            }
            FieldKind::Choice(ChoiceMeta::Mapping(m)) => Some(m.default_value().cloned()),
            FieldKind::Subgroups(s) => Some(s.default().cloned().map(Value::from)),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct Field {
    name: String,
    kind: FieldKind,
    default: FieldDefault,
    aliases: Vec<String>,
    cmd: bool,
    positional: bool,
    to_dict: bool,
    encoding_fn: Option<Codec>,
    decoding_fn: Option<Codec>,
    hints: ArgHints,
    warnings: Vec<ResolveWarning>,
}

impl Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("default", &self.default)
            .field("aliases", &self.aliases)
            .field("cmd", &self.cmd)
            .field("positional", &self.positional)
            .field("to_dict", &self.to_dict)
            .field("encoding_fn", &self.encoding_fn.is_some())
            .field("decoding_fn", &self.decoding_fn.is_some())
            .field("hints", &self.hints)
            .finish()
    }
}

impl Field {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }
    pub fn default(&self) -> &FieldDefault {
        &self.default
    }
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }
    pub fn is_cmd(&self) -> bool {
        self.cmd
    }
    pub fn is_positional(&self) -> bool {
        self.positional
    }
    pub fn to_dict(&self) -> bool {
        self.to_dict
    }
    pub fn hints(&self) -> &ArgHints {
        &self.hints
    }
    pub fn warnings(&self) -> &[ResolveWarning] {
        &self.warnings
    }

    pub fn has_default(&self) -> bool {
        !matches!(self.default, FieldDefault::Missing)
    }

    /// The default value; a factory default is invoked on every call.
    pub fn default_value(&self) -> Option<Value> {
        match &self.default {
            FieldDefault::Missing => None,
            FieldDefault::Value(v) => Some(v.clone()),
            FieldDefault::Factory(f) => Some(f()),
        }
    }

    /// The resolved choices of a choice or subgroup field.
    pub fn choices(&self) -> Option<&dyn ChoiceSource> {
        match &self.kind {
            FieldKind::Choice(meta) => Some(meta.source()),
            FieldKind::Subgroups(s) => Some(s),
            _ => None,
        }
    }

    pub fn encode(&self, value: Value) -> Value {
        match &self.encoding_fn {
            Some(f) => f(value),
            None => value,
        }
    }

    pub fn decode(&self, value: Value) -> Value {
        match &self.decoding_fn {
            Some(f) => f(value),
            None => value,
        }
    }
}

/// Accumulates a field declaration; see [`FieldBuilder::build`].
#[derive(Debug, Clone)]
pub struct FieldBuilder {
    field: Field,
}

impl FieldBuilder {
    fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        FieldBuilder {
            field: Field {
                name: name.into(),
                kind,
                default: FieldDefault::Missing,
                aliases: Vec::new(),
                cmd: true,
                positional: false,
                to_dict: true,
                encoding_fn: None,
                decoding_fn: None,
                hints: ArgHints::default(),
                warnings: Vec::new(),
            },
        }
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.field.default = FieldDefault::Value(value.into());
        self
    }

    pub fn default_factory(mut self, factory: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.field.default = FieldDefault::Factory(Arc::new(factory));
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.field.aliases.push(alias.into());
        self
    }

    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.field.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    /// Whether a command-line option is generated for this field.
    pub fn cmd(mut self, cmd: bool) -> Self {
        self.field.cmd = cmd;
        self
    }

    pub fn positional(mut self, positional: bool) -> Self {
        self.field.positional = positional;
        self
    }

    /// Whether the field is written out by the record encoder.
    pub fn to_dict(mut self, to_dict: bool) -> Self {
        self.field.to_dict = to_dict;
        self
    }

    pub fn encoding_fn(mut self, f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.field.encoding_fn = Some(Arc::new(f));
        self
    }

    pub fn decoding_fn(mut self, f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.field.decoding_fn = Some(Arc::new(f));
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.field.hints.help = Some(help.into());
        self
    }

    pub fn env(mut self, env: impl Into<String>) -> Self {
        self.field.hints.env = Some(env.into());
        self
    }

    pub fn value_name(mut self, value_name: impl Into<String>) -> Self {
        self.field.hints.value_name = Some(value_name.into());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.field.hints.required = Some(required);
        self
    }

    pub fn action(mut self, action: FlagAction) -> Self {
        self.field.hints.action = Some(action);
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.field.hints.extra.insert(key.into(), value.into());
        self
    }

    /// Validates the declaration. Errors name the field.
    pub fn build(self) -> Result<Field> {
        let mut field = self.field;
        if field.name.is_empty() {
            return Err(FieldError::malformed("field name can't be empty"));
        }
        if let Some(action) = field.hints.action {
            let implied = action.implied_default();
            match field.default {
                FieldDefault::Missing => field.default = FieldDefault::Value(Value::Boolean(implied)),
                FieldDefault::Value(Value::Boolean(b)) if b == implied => {}
                _ => {
                    return Err(FieldError::InvalidFlagDefault {
                        action: action.name().to_string(),
                        expected: implied,
                    }
                    .in_field(field.name));
                }
            }
        }
        if let Some(resolved) = field.kind.resolved_default() {
            let consistent = match (&field.default, &resolved) {
                (FieldDefault::Missing, None) => true,
                (FieldDefault::Value(v), Some(r)) => v == r,
                _ => false,
            };
            if !consistent {
                let given = field
                    .default_value()
                    .map_or_else(|| "missing".to_string(), |v| v.to_string());
                return Err(FieldError::invalid_default(
                    given,
                    "a choice default must be given to the declarator, which checks it against the choices",
                )
                .in_field(field.name));
            }
        }
        tracing::debug!(field = %field.name, kind = ?field.kind, default = ?field.default, "declared field");
        Ok(field)
    }
}

/// A plain field.
pub fn field(name: impl Into<String>) -> FieldBuilder {
    FieldBuilder::new(name, FieldKind::Value)
}

/// A field restricted to a plain sequence of keys.
pub fn choice<I, K>(name: impl Into<String>, choices: I, default: Option<Key>) -> Result<FieldBuilder>
where
    I: IntoIterator<Item = K>,
    K: Into<Key>,
{
    let name = name.into();
    let resolved = resolve_plain(choices.into_iter().map(Into::into).collect(), default)
        .map_err(|e| e.in_field(&name))?;
    let mut builder = FieldBuilder::new(name, FieldKind::Value);
    if let Some(d) = resolved.default() {
        builder = builder.default(d.clone());
    }
    builder.field.kind = FieldKind::Choice(ChoiceMeta::Plain(resolved));
    Ok(builder)
}

/// A field selecting a member of the enumerated type `E`, stored by name.
///
/// Passing the member name instead of the member is accepted but recorded as
/// a warning on the field.
pub fn enum_choice<E: ValueEnum + Debug>(
    name: impl Into<String>,
    default: Option<EnumDefault<E>>,
) -> Result<FieldBuilder> {
    let name = name.into();
    let resolved = resolve_enum(default).map_err(|e| e.in_field(&name))?;
    let choices = resolve_plain(
        resolved.keys().into_iter().map(Key::Str).collect(),
        resolved.default_key().map(Key::Str),
    )
    .map_err(|e| e.in_field(&name))?;
    enum_field(name, std::any::type_name::<E>(), choices, resolved.warnings().to_vec())
}

pub(crate) fn enum_field(
    name: String,
    type_name: &str,
    choices: PlainChoices<Key>,
    warnings: Vec<ResolveWarning>,
) -> Result<FieldBuilder> {
    let mut builder = FieldBuilder::new(name, FieldKind::Value);
    if let Some(d) = choices.default() {
        builder = builder.default(d.clone());
    }
    builder.field.warnings = warnings;
    builder.field.kind = FieldKind::Choice(ChoiceMeta::Enum {
        type_name: type_name.to_string(),
        choices,
    });
    Ok(builder)
}

/// A field selected by key from a mapping; the record holds the mapped value.
///
/// The mapping codecs are installed as the field's encoding and decoding
/// functions; calling [`FieldBuilder::encoding_fn`] or
/// [`FieldBuilder::decoding_fn`] afterwards replaces them.
pub fn mapping_choice(
    name: impl Into<String>,
    choices: IndexMap<Key, Value>,
    default: Option<Key>,
) -> Result<FieldBuilder> {
    let name = name.into();
    let resolved = resolve_mapping(choices, default).map_err(|e| e.in_field(&name))?;
    let mut builder = FieldBuilder::new(name, FieldKind::Value);
    if let Some(v) = resolved.default_value() {
        builder = builder.default(v.clone());
    }
    let for_encode = resolved.clone();
    let for_decode = resolved.clone();
    builder = builder
        .encoding_fn(move |value| encode_mapped(&for_encode, value))
        .decoding_fn(move |value| decode_mapped(&for_decode, value));
    builder.field.kind = FieldKind::Choice(ChoiceMeta::Mapping(resolved));
    Ok(builder)
}

fn encode_mapped(choices: &MappingChoices<Key, Value>, value: Value) -> Value {
    let token = match Key::from_value(&value) {
        Some(key) if choices.map().contains_key(&key) => Token::Key(key),
        _ => Token::Value(value),
    };
    match choices.encode(token) {
        Token::Key(key) => key.into(),
        Token::Value(value) => value,
    }
}

fn decode_mapped(choices: &MappingChoices<Key, Value>, value: Value) -> Value {
    match Key::from_value(&value) {
        Some(key) => match choices.decode(key) {
            Token::Value(value) => value,
            Token::Key(key) => key.into(),
        },
        None => value,
    }
}

/// A field selecting one of several record types by key.
pub fn subgroups(
    name: impl Into<String>,
    subgroups: IndexMap<Key, VariantType>,
    default: Option<Key>,
    default_factory: Option<VariantType>,
) -> Result<FieldBuilder> {
    let name = name.into();
    let resolved =
        resolve_subgroups(subgroups, default, default_factory).map_err(|e| e.in_field(&name))?;
    let mut builder = FieldBuilder::new(name, FieldKind::Value);
    if let Some(key) = resolved.default() {
        builder = builder.default(key.clone());
    }
    builder.field.kind = FieldKind::Subgroups(resolved);
    Ok(builder)
}

/// A sub-command field: one record type per command name.
pub fn subparsers(name: impl Into<String>, commands: IndexMap<String, VariantType>) -> FieldBuilder {
    FieldBuilder::new(name, FieldKind::Subparsers(commands))
}

/// A boolean flag. Given bare on the command line it flips `default`.
pub fn flag(name: impl Into<String>, default: bool) -> FieldBuilder {
    let action = if default {
        FlagAction::StoreFalse
    } else {
        FlagAction::StoreTrue
    };
    FieldBuilder::new(name, FieldKind::Flag)
        .default(default)
        .action(action)
}

/// A collection field whose default comes from `factory`.
pub fn mutable_field(
    name: impl Into<String>,
    kind: CollectionKind,
    factory: impl Fn() -> Value + Send + Sync + 'static,
) -> FieldBuilder {
    FieldBuilder::new(name, FieldKind::Collection(kind)).default_factory(factory)
}

/// A list field; every record gets its own copy of `items`.
pub fn list_field<I, V>(name: impl Into<String>, items: I) -> FieldBuilder
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    let items: Vec<Value> = items.into_iter().map(Into::into).collect();
    mutable_field(name, CollectionKind::List, move || Value::Array(items.clone()))
}

/// A set field: like [`list_field`], with duplicates dropped in order.
pub fn set_field<I, V>(name: impl Into<String>, items: I) -> FieldBuilder
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    let mut unique: Vec<Value> = Vec::new();
    for item in items.into_iter().map(Into::into) {
        if !unique.contains(&item) {
            unique.push(item);
        }
    }
    mutable_field(name, CollectionKind::Set, move || Value::Array(unique.clone()))
}

/// A dict field; every record gets its own copy of `items`.
pub fn dict_field<I, K, V>(name: impl Into<String>, items: I) -> FieldBuilder
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    let table: toml::Table = items
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();
    mutable_field(name, CollectionKind::Dict, move || Value::Table(table.clone()))
}

//! Field declarations loaded from a TOML manifest.
//!
//! Every top-level table declares one field, in file order:
//!
//! ```toml
//! [lr]
//! default = 0.001
//! alias = ["l", "learning_rate"]
//! help = "Learning rate"
//!
//! [size]
//! choices = { small = 1, big = 100 }
//! default = "small"
//!
//! [model]
//! subgroups = { resnet = "ResNet", vit = "ViT" }
//! default = "resnet"
//! ```
//!
//! Subgroup and sub-command values name types looked up in a
//! [`TypeRegistry`].
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::Value;
use crate::choice::{Key, resolve_plain};
use crate::error::{FieldError, Result};
use crate::field::{
    self, Field, FieldBuilder, FlagAction, choice, dict_field, enum_field, flag, list_field,
    mapping_choice, set_field, subgroups, subparsers,
};
use crate::subgroup::VariantType;
use crate::table::FieldTable;

/// Named types available to subgroup and sub-command declarations.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: IndexMap<String, VariantType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `ty` under its own name.
    pub fn with(mut self, ty: VariantType) -> Self {
        self.register(ty);
        self
    }

    pub fn register(&mut self, ty: VariantType) -> &mut Self {
        self.types.insert(ty.name().to_string(), ty);
        self
    }

    pub fn get(&self, name: &str) -> Option<&VariantType> {
        self.types.get(name)
    }

    /// Unregistered names resolve to a non-record type.
    fn resolve(&self, name: &str) -> VariantType {
        self.get(name)
            .cloned()
            .unwrap_or_else(|| VariantType::other(name))
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawChoices {
    Sequence(Vec<Value>),
    Mapping(IndexMap<String, Value>),
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawAction {
    StoreTrue,
    StoreFalse,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawField {
    default: Option<Value>,
    default_factory: Option<String>,
    alias: Option<OneOrMany>,
    cmd: Option<bool>,
    positional: Option<bool>,
    to_dict: Option<bool>,
    help: Option<String>,
    env: Option<String>,
    value_name: Option<String>,
    required: Option<bool>,
    action: Option<RawAction>,
    extra: Option<IndexMap<String, Value>>,

    flag: Option<bool>,
    list: Option<Vec<Value>>,
    set: Option<Vec<Value>>,
    dict: Option<toml::Table>,
    choices: Option<RawChoices>,
    #[serde(rename = "enum")]
    enum_name: Option<String>,
    variants: Option<Vec<String>>,
    subgroups: Option<IndexMap<String, String>>,
    subparsers: Option<IndexMap<String, String>>,
}

impl RawField {
    fn kind_keys(&self) -> Vec<&'static str> {
        [
            ("flag", self.flag.is_some()),
            ("list", self.list.is_some()),
            ("set", self.set.is_some()),
            ("dict", self.dict.is_some()),
            ("choices", self.choices.is_some()),
            ("enum", self.enum_name.is_some()),
            ("subgroups", self.subgroups.is_some()),
            ("subparsers", self.subparsers.is_some()),
        ]
        .into_iter()
        .filter_map(|(key, present)| present.then_some(key))
        .collect()
    }

    fn default_key(&self) -> Result<Option<Key>> {
        match &self.default {
            None => Ok(None),
            Some(value) => Key::from_value(value).map(Some).ok_or_else(|| {
                FieldError::malformed(format!(
                    "a choice default must be a string, integer or boolean, got {value}"
                ))
            }),
        }
    }
}

impl FieldTable {
    /// Loads field declarations from a `.toml` manifest.
    pub fn from_file(path: &Path, registry: &TypeRegistry) -> Result<Self> {
        if path.extension().and_then(|s| s.to_str()) != Some("toml") {
            return Err(FieldError::UnsupportedFormat {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content, registry)
    }

    pub fn from_toml_str(content: &str, registry: &TypeRegistry) -> Result<Self> {
        let manifest: toml::Table = toml::from_str(content)?;
        let mut table = FieldTable::new();
        for (name, value) in manifest {
            if !value.is_table() {
                tracing::warn!(field = %name, "skipping non-table entry in field manifest");
                continue;
            }
            let field = declare(&name, value, registry).map_err(|e| e.in_field(&name))?;
            table.push(field)?;
        }
        tracing::debug!(fields = table.len(), "loaded field manifest");
        Ok(table)
    }
}

fn declare(name: &str, value: Value, registry: &TypeRegistry) -> Result<Field> {
    let raw: RawField = value.try_into()?;
    let builder = match raw.kind_keys().as_slice() {
        [] => {
            if raw.variants.is_some() {
                return Err(FieldError::malformed("'variants' requires 'enum'"));
            }
            match raw.default.clone() {
                Some(default) => field::field(name).default(default),
                None => field::field(name),
            }
        }
        [kind] => declare_kind(name, kind, &raw, registry)?,
        kinds => {
            return Err(FieldError::malformed(format!(
                "conflicting field kinds: {}",
                kinds.join(", ")
            )));
        }
    };
    if raw.default_factory.is_some() && raw.subgroups.is_none() {
        return Err(FieldError::malformed(
            "'default_factory' is only valid with 'subgroups'",
        ));
    }
    apply_options(builder, raw).build()
}

fn declare_kind(
    name: &str,
    kind: &str,
    raw: &RawField,
    registry: &TypeRegistry,
) -> Result<FieldBuilder> {
    let collection_default = |kind: &str| -> Result<()> {
        match raw.default {
            Some(_) => Err(FieldError::malformed(format!(
                "a {kind} field takes its default from '{kind}', not 'default'"
            ))),
            None => Ok(()),
        }
    };
    match kind {
        "flag" => {
            let default = raw.flag.unwrap_or(false);
            if raw.default.is_some() {
                return Err(FieldError::malformed(
                    "a flag takes its default from 'flag', not 'default'",
                ));
            }
            Ok(flag(name, default))
        }
        "list" => {
            collection_default("list")?;
            Ok(list_field(name, raw.list.clone().unwrap_or_default()))
        }
        "set" => {
            collection_default("set")?;
            Ok(set_field(name, raw.set.clone().unwrap_or_default()))
        }
        "dict" => {
            collection_default("dict")?;
            Ok(dict_field(name, raw.dict.clone().unwrap_or_default()))
        }
        "choices" => match &raw.choices {
            Some(RawChoices::Sequence(values)) => {
                let keys = values
                    .iter()
                    .map(|v| {
                        Key::from_value(v).ok_or_else(|| {
                            FieldError::malformed(format!(
                                "choices must be strings, integers or booleans, got {v}"
                            ))
                        })
                    })
                    .collect::<Result<Vec<Key>>>()?;
                choice(name, keys, raw.default_key()?)
            }
            Some(RawChoices::Mapping(map)) => {
                let map = map
                    .iter()
                    .map(|(k, v)| (Key::from(k.as_str()), v.clone()))
                    .collect();
                mapping_choice(name, map, raw.default_key()?)
            }
            None => Err(FieldError::malformed("missing 'choices'")),
        },
        "enum" => {
            let type_name = raw.enum_name.clone().unwrap_or_default();
            let variants = raw.variants.clone().unwrap_or_default();
            let choices = resolve_plain(
                variants.into_iter().map(Key::Str).collect(),
                raw.default_key()?,
            )?;
            enum_field(name.to_string(), &type_name, choices, Vec::new())
        }
        "subgroups" => {
            let map = raw
                .subgroups
                .iter()
                .flatten()
                .map(|(k, ty)| (Key::from(k.as_str()), registry.resolve(ty)))
                .collect();
            let factory = raw.default_factory.as_deref().map(|ty| registry.resolve(ty));
            subgroups(name, map, raw.default_key()?, factory)
        }
        "subparsers" => {
            let map = raw
                .subparsers
                .iter()
                .flatten()
                .map(|(k, ty)| (k.clone(), registry.resolve(ty)))
                .collect();
            Ok(subparsers(name, map))
        }
        other => Err(FieldError::malformed(format!("unknown field kind '{other}'"))),
    }
}

fn apply_options(mut builder: FieldBuilder, raw: RawField) -> FieldBuilder {
    builder = match raw.alias {
        Some(OneOrMany::One(alias)) => builder.alias(alias),
        Some(OneOrMany::Many(aliases)) => builder.aliases(aliases),
        None => builder,
    };
    if let Some(cmd) = raw.cmd {
        builder = builder.cmd(cmd);
    }
    if let Some(positional) = raw.positional {
        builder = builder.positional(positional);
    }
    if let Some(to_dict) = raw.to_dict {
        builder = builder.to_dict(to_dict);
    }
    if let Some(help) = raw.help {
        builder = builder.help(help);
    }
    if let Some(env) = raw.env {
        builder = builder.env(env);
    }
    if let Some(value_name) = raw.value_name {
        builder = builder.value_name(value_name);
    }
    if let Some(required) = raw.required {
        builder = builder.required(required);
    }
    if let Some(action) = raw.action {
        builder = builder.action(match action {
            RawAction::StoreTrue => FlagAction::StoreTrue,
            RawAction::StoreFalse => FlagAction::StoreFalse,
        });
    }
    for (key, value) in raw.extra.into_iter().flatten() {
        builder = builder.extra(key, value);
    }
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choice::ChoiceSource;
    use crate::field::{ChoiceMeta, CollectionKind, FieldKind};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn registry() -> TypeRegistry {
        TypeRegistry::new()
            .with(VariantType::record("ResNet"))
            .with(VariantType::record("ViT"))
    }

    // Helper function to create a temporary TOML file
    fn create_temp_toml(content: &str) -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("fields.toml");
        fs::write(&file_path, content).unwrap();
        (temp_dir, file_path)
    }

    #[test]
    fn test_simple_field_parsing() {
        let toml_content = r#"
port = { default = 8080, help = "Server port", env = "PORT" }
name = { default = "test", alias = "n" }
"#;
        let table = FieldTable::from_toml_str(toml_content, &registry()).unwrap();
        assert_eq!(table.len(), 2);

        let port = table.get("port").unwrap();
        assert_eq!(port.kind(), &FieldKind::Value);
        assert_eq!(port.default_value(), Some(Value::Integer(8080)));
        assert_eq!(port.hints().help.as_deref(), Some("Server port"));
        assert_eq!(port.hints().env.as_deref(), Some("PORT"));

        let name = table.get("name").unwrap();
        assert_eq!(name.aliases(), &["n"]);
    }

    #[test]
    fn test_keeps_file_order() {
        let toml_content = r#"
zeta = {}
alpha = {}
mid = {}
"#;
        let table = FieldTable::from_toml_str(toml_content, &registry()).unwrap();
        let names: Vec<&str> = table.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_choice_fields() {
        let toml_content = r#"
[optimizer]
choices = ["adam", "sgd"]
default = "sgd"

[size]
choices = { small = 1, big = 100 }
default = "big"

[color]
enum = "Color"
variants = ["Red", "Green"]
"#;
        let table = FieldTable::from_toml_str(toml_content, &registry()).unwrap();

        let optimizer = table.get("optimizer").unwrap();
        assert_eq!(optimizer.choices().unwrap().keys(), vec!["adam", "sgd"]);
        assert_eq!(optimizer.default_value(), Some(Value::from("sgd")));

        let size = table.get("size").unwrap();
        assert_eq!(size.choices().unwrap().keys(), vec!["small", "big"]);
        assert_eq!(size.default_value(), Some(Value::Integer(100)));
        assert_eq!(size.decode(Value::from("small")), Value::Integer(1));

        let color = table.get("color").unwrap();
        let FieldKind::Choice(ChoiceMeta::Enum { type_name, choices }) = color.kind() else {
            panic!("Expected enum choice");
        };
        assert_eq!(type_name, "Color");
        assert_eq!(choices.keys(), vec!["Red", "Green"]);
        assert!(!color.has_default());
    }

    #[test]
    fn test_invalid_choice_default() {
        let toml_content = r#"
[optimizer]
choices = ["adam", "sgd"]
default = "rmsprop"
"#;
        let err = FieldTable::from_toml_str(toml_content, &registry()).unwrap_err();
        assert!(matches!(err.root(), FieldError::InvalidDefault { .. }));
        assert!(err.to_string().starts_with("field 'optimizer'"));
    }

    #[test]
    fn test_float_choices_rejected() {
        let toml_content = r#"
ratio = { choices = [0.5, 1.0] }
"#;
        let err = FieldTable::from_toml_str(toml_content, &registry()).unwrap_err();
        assert!(matches!(err.root(), FieldError::Malformed { .. }));
    }

    #[test]
    fn test_subgroups() {
        let toml_content = r#"
[model]
subgroups = { resnet = "ResNet", vit = "ViT" }
default_factory = "ViT"
"#;
        let registry = registry();
        let table = FieldTable::from_toml_str(toml_content, &registry).unwrap();
        let model = table.get("model").unwrap();
        let FieldKind::Subgroups(s) = model.kind() else {
            panic!("Expected subgroups");
        };
        assert_eq!(s.default(), Some(&Key::from("vit")));
        assert!(s.default_factory().unwrap().is_same(registry.get("ViT").unwrap()));
    }

    #[test]
    fn test_subgroups_errors() {
        let both = r#"
[model]
subgroups = { resnet = "ResNet", vit = "ViT" }
default = "resnet"
default_factory = "ViT"
"#;
        let err = FieldTable::from_toml_str(both, &registry()).unwrap_err();
        assert!(matches!(err.root(), FieldError::ConflictingDefaultSpecification));

        let unregistered = r#"
[model]
subgroups = { resnet = "ResNet", mlp = "Mlp" }
"#;
        let err = FieldTable::from_toml_str(unregistered, &registry()).unwrap_err();
        assert!(matches!(err.root(), FieldError::InvalidSubgroupValue { .. }));

        let ambiguous = r#"
[model]
subgroups = { a = "ResNet", b = "ResNet" }
default_factory = "ResNet"
"#;
        let err = FieldTable::from_toml_str(ambiguous, &registry()).unwrap_err();
        assert!(matches!(err.root(), FieldError::AmbiguousDefaultFactory { .. }));
    }

    #[test]
    fn test_collections_and_flags() {
        let toml_content = r#"
layers = { list = [64, 64] }
tags = { set = ["a", "a", "b"] }
weights = { dict = { a = 1.0 } }
verbose = { flag = false }
no_cache = { action = "store_true" }
"#;
        let table = FieldTable::from_toml_str(toml_content, &registry()).unwrap();
        assert_eq!(
            table.get("layers").unwrap().kind(),
            &FieldKind::Collection(CollectionKind::List)
        );
        assert_eq!(
            table.get("tags").unwrap().default_value(),
            Some(Value::Array(vec!["a".into(), "b".into()]))
        );
        assert!(table.get("weights").unwrap().default_value().unwrap().is_table());
        assert_eq!(table.get("verbose").unwrap().kind(), &FieldKind::Flag);
        let no_cache = table.get("no_cache").unwrap();
        assert_eq!(no_cache.hints().action, Some(FlagAction::StoreTrue));
        assert_eq!(no_cache.default_value(), Some(Value::Boolean(false)));
    }

    #[test]
    fn test_store_true_with_true_default() {
        let toml_content = r#"
debug = { action = "store_true", default = true }
"#;
        let err = FieldTable::from_toml_str(toml_content, &registry()).unwrap_err();
        assert!(matches!(err.root(), FieldError::InvalidFlagDefault { .. }));
    }

    #[test]
    fn test_options() {
        let toml_content = r#"
[token]
cmd = false
to_dict = false
positional = false
required = false
value_name = "TOKEN"
extra = { hide = true }
"#;
        let table = FieldTable::from_toml_str(toml_content, &registry()).unwrap();
        let token = table.get("token").unwrap();
        assert!(!token.is_cmd());
        assert!(!token.to_dict());
        assert_eq!(token.hints().required, Some(false));
        assert_eq!(token.hints().value_name.as_deref(), Some("TOKEN"));
        assert_eq!(token.hints().extra.get("hide"), Some(&Value::Boolean(true)));
    }

    #[test]
    fn test_conflicting_kinds() {
        let toml_content = r#"
odd = { flag = true, list = [1] }
"#;
        let err = FieldTable::from_toml_str(toml_content, &registry()).unwrap_err();
        assert!(err.to_string().contains("conflicting field kinds: flag, list"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let toml_content = r#"
port = { defualt = 8080 }
"#;
        let err = FieldTable::from_toml_str(toml_content, &registry()).unwrap_err();
        assert!(matches!(err.root(), FieldError::Toml(_)));
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn test_non_table_entries_skipped() {
        let toml_content = r#"
title = "not a field"
port = { default = 1 }
"#;
        let table = FieldTable::from_toml_str(toml_content, &registry()).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.get("title").is_none());
    }

    #[test]
    fn test_subparsers() {
        let toml_content = r#"
command = { subparsers = { train = "ResNet", eval = "ViT" } }
"#;
        let table = FieldTable::from_toml_str(toml_content, &registry()).unwrap();
        let FieldKind::Subparsers(commands) = table.get("command").unwrap().kind() else {
            panic!("Expected subparsers");
        };
        assert_eq!(commands.keys().collect::<Vec<_>>(), vec!["train", "eval"]);
    }

    #[test]
    fn test_from_file_toml() {
        let toml_content = r#"
port = { default = 8080 }
host = { default = "localhost" }
"#;
        let (_temp_dir, file_path) = create_temp_toml(toml_content);
        let table = FieldTable::from_file(&file_path, &registry()).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_from_file_unsupported_format() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("fields.yaml");
        fs::write(&file_path, "port: 8080").unwrap();

        let err = FieldTable::from_file(&file_path, &registry()).unwrap_err();
        assert!(matches!(err, FieldError::UnsupportedFormat { .. }));
        assert!(err.to_string().contains("only .toml is supported"));
    }

    #[test]
    fn test_from_file_nonexistent() {
        let file_path = PathBuf::from("nonexistent.toml");
        let err = FieldTable::from_file(&file_path, &registry()).unwrap_err();
        assert!(matches!(err, FieldError::Io(_)));
    }

    #[test]
    fn test_invalid_toml_parsing() {
        let invalid_toml = r#"
invalid toml content
port =
"#;
        let err = FieldTable::from_toml_str(invalid_toml, &registry()).unwrap_err();
        assert!(matches!(err, FieldError::Toml(_)));
    }
}

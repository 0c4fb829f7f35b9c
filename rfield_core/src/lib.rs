//! Field declarations for command-line driven records.
//!
//! A [`Field`] describes one attribute of a record: its default, how it is
//! serialized, and how it shows up on the command line. Choice fields
//! restrict the value to a set of keys, subgroup fields pick one of several
//! record types. A [`FieldTable`] collects fields in declaration order and
//! turns them into a [`clap::Command`].
pub mod choice;
pub mod cli;
pub mod error;
pub mod field;
pub mod manifest;
pub mod subgroup;
pub mod table;
mod utils;

pub use choice::{
    ChoiceSource, EnumChoices, EnumDefault, Key, MappingChoices, PlainChoices, ResolveWarning,
    Token, resolve_enum, resolve_mapping, resolve_plain,
};
pub use error::{FieldError, Result};
pub use field::{
    ArgHints, ChoiceMeta, CollectionKind, Field, FieldBuilder, FieldDefault, FieldKind,
    FlagAction, choice, dict_field, enum_choice, field, flag, list_field, mapping_choice,
    mutable_field, set_field, subgroups, subparsers,
};
pub use manifest::TypeRegistry;
pub use subgroup::{SubgroupChoices, TypeKind, VariantType, resolve_subgroups};
pub use table::{FieldTable, Record};
pub use utils::str2bool;

/// Dynamic value held by records and defaults.
pub type Value = toml::Value;

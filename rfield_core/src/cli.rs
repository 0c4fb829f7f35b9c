//! Binding declared fields to clap.
//!
//! Each command-line field becomes one [`clap::Arg`]; a subparsers field
//! becomes a set of subcommands. Tokenizing, validation against the possible
//! values and help output are left to clap.
use clap::builder::{PossibleValuesParser, ValueParser};
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::Value;
use crate::error::{FieldError, Result};
use crate::field::{ChoiceMeta, CollectionKind, Field, FieldKind, FlagAction};
use crate::table::{FieldTable, Record};
use crate::utils::{option_string, parse_scalar, str2bool, value_token};

impl Field {
    /// The clap argument for this field, or `None` when the field is not on
    /// the command line (`cmd = false`, or a subparsers field).
    pub fn to_arg(&self) -> Option<Arg> {
        if !self.is_cmd() || matches!(self.kind(), FieldKind::Subparsers(_)) {
            return None;
        }
        let mut arg = Arg::new(self.name().to_string());
        if !self.is_positional() {
            arg = self.with_option_strings(arg.long(self.name().to_string()));
        }
        let hints = self.hints();
        if let Some(help) = &hints.help {
            arg = arg.help(help.clone());
        }
        if let Some(env) = &hints.env {
            arg = arg.env(env.clone());
        }
        if let Some(value_name) = &hints.value_name {
            arg = arg.value_name(value_name.clone());
        }
        for (key, value) in &hints.extra {
            arg = match (key.as_str(), value) {
                ("hide", Value::Boolean(hide)) => arg.hide(*hide),
                ("long_help", Value::String(text)) => arg.long_help(text.clone()),
                ("help_heading", Value::String(heading)) => arg.help_heading(heading.clone()),
                _ => {
                    tracing::debug!(field = %self.name(), hint = %key, "hint not used by clap binding");
                    arg
                }
            };
        }
        let arg = match (self.kind(), hints.action) {
            (FieldKind::Flag, action) => {
                let default = self.default_value().unwrap_or(Value::Boolean(false));
                let missing = action.is_none_or(|a| a == FlagAction::StoreTrue);
                let required = hints.required.unwrap_or(false);
                let arg = arg
                    .num_args(0..=1)
                    .value_parser(ValueParser::new(str2bool))
                    .default_missing_value(missing.to_string())
                    .action(ArgAction::Set)
                    .required(required);
                // A required flag must be given; a clap default would satisfy it.
                if required {
                    arg
                } else {
                    arg.default_value(value_token(&default))
                }
            }
            (_, Some(FlagAction::StoreTrue)) => arg.action(ArgAction::SetTrue),
            (_, Some(FlagAction::StoreFalse)) => arg.action(ArgAction::SetFalse),
            (FieldKind::Choice(_) | FieldKind::Subgroups(_), None) => {
                let keys = self.choices().map(|c| c.keys()).unwrap_or_default();
                let mut arg = arg.value_parser(PossibleValuesParser::new(keys));
                if let Some(default) = self.choices().and_then(|c| c.default_key()) {
                    arg = arg.default_value(default);
                }
                arg.required(hints.required.unwrap_or(!self.has_choice_default()))
            }
            (FieldKind::Collection(CollectionKind::Dict), None) => arg
                .num_args(0..)
                .action(ArgAction::Append)
                .value_name(hints.value_name.clone().unwrap_or_else(|| "KEY=VALUE".into()))
                .required(hints.required.unwrap_or(false)),
            (FieldKind::Collection(_), None) => {
                let defaults = self.default_value();
                let items = match &defaults {
                    Some(Value::Array(items)) => items.as_slice(),
                    _ => &[],
                };
                arg.num_args(0..)
                    .action(ArgAction::Append)
                    .value_parser(scalar_parser(items.first()))
                    .default_values(items.iter().map(value_token))
                    .required(hints.required.unwrap_or(false))
            }
            (_, None) => {
                let default = self.default_value();
                let mut arg = arg
                    .value_parser(scalar_parser(default.as_ref()))
                    .action(ArgAction::Set);
                if let Some(default) = &default {
                    arg = arg.default_value(value_token(default));
                }
                arg.required(hints.required.unwrap_or(default.is_none()))
            }
        };
        Some(arg)
    }

    fn with_option_strings(&self, mut arg: Arg) -> Arg {
        let mut has_short = false;
        for alias in self.aliases() {
            let option = option_string(alias);
            if let Some(long) = option.strip_prefix("--") {
                arg = arg.visible_alias(long.to_string());
                continue;
            }
            let name = option.trim_start_matches('-');
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if !has_short => {
                    arg = arg.short(c);
                    has_short = true;
                }
                (Some(c), None) => arg = arg.visible_short_alias(c),
                _ => arg = arg.visible_alias(name.to_string()),
            }
        }
        arg
    }

    fn has_choice_default(&self) -> bool {
        self.choices().and_then(|c| c.default_key()).is_some()
    }

    /// The canonical key spelled by a choice token.
    fn choice_key(&self, token: &str) -> Option<Value> {
        let found = match self.kind() {
            FieldKind::Choice(ChoiceMeta::Plain(c) | ChoiceMeta::Enum { choices: c, .. }) => {
                c.choices().iter().find(|k| k.to_string() == token)
            }
            FieldKind::Choice(ChoiceMeta::Mapping(m)) => {
                m.map().keys().find(|k| k.to_string() == token)
            }
            FieldKind::Subgroups(s) => s.subgroups().keys().find(|k| k.to_string() == token),
            _ => None,
        };
        found.cloned().map(Value::from)
    }

    fn collection_template(&self) -> Option<Value> {
        match self.default_value() {
            Some(Value::Array(items)) => items.into_iter().next(),
            _ => None,
        }
    }
}

fn scalar_parser(template: Option<&Value>) -> ValueParser {
    match template {
        Some(Value::Integer(_)) => ValueParser::new(|raw: &str| raw.parse::<i64>()),
        Some(Value::Float(_)) => ValueParser::new(|raw: &str| raw.parse::<f64>()),
        Some(Value::Boolean(_)) => ValueParser::new(str2bool),
        _ => ValueParser::string(),
    }
}

/// Reads the values of `id` with the same typing `scalar_parser` gave it.
fn read_values(matches: &ArgMatches, id: &str, template: Option<&Value>) -> Option<Vec<Value>> {
    match template {
        Some(Value::Integer(_)) => matches
            .get_many::<i64>(id)
            .map(|vs| vs.map(|v| Value::Integer(*v)).collect()),
        Some(Value::Float(_)) => matches
            .get_many::<f64>(id)
            .map(|vs| vs.map(|v| Value::Float(*v)).collect()),
        Some(Value::Boolean(_)) => matches
            .get_many::<bool>(id)
            .map(|vs| vs.map(|v| Value::Boolean(*v)).collect()),
        Some(Value::String(_)) => matches
            .get_many::<String>(id)
            .map(|vs| vs.map(|v| Value::String(v.clone())).collect()),
        _ => matches
            .get_many::<String>(id)
            .map(|vs| vs.filter_map(|v| parse_scalar(v, None).ok()).collect()),
    }
}

fn parse_pair(raw: &str) -> Result<(String, Value)> {
    let (key, value) = raw.split_once('=').ok_or_else(|| FieldError::InvalidValue {
        message: format!("expected KEY=VALUE, got '{raw}'"),
    })?;
    let value = parse_scalar(value, None).map_err(|message| FieldError::InvalidValue { message })?;
    Ok((key.trim().to_string(), value))
}

impl FieldTable {
    /// A clap command with one argument per command-line field, plus one
    /// subcommand per entry of a subparsers field.
    pub fn command(&self, name: impl Into<String>) -> Command {
        let mut cmd = Command::new(name.into());
        for field in self {
            match field.kind() {
                FieldKind::Subparsers(commands) if field.is_cmd() => {
                    for (command, variant) in commands {
                        cmd = cmd.subcommand(variant.augment_args(Command::new(command.clone())));
                    }
                    cmd = cmd.subcommand_required(!field.has_default());
                }
                _ => {
                    if let Some(arg) = field.to_arg() {
                        cmd = cmd.arg(arg);
                    }
                }
            }
        }
        cmd
    }

    /// Builds a record from parsed matches. Every command-line value goes
    /// through the field's decoding function, so a mapping choice yields the
    /// value its key selects; fields clap has no value for take their default.
    pub fn bind(&self, matches: &ArgMatches) -> Result<Record> {
        let mut record = Record::new();
        for field in self {
            let name = field.name();
            let bound = if !field.is_cmd() {
                None
            } else if let FieldKind::Subparsers(_) = field.kind() {
                matches
                    .subcommand_name()
                    .map(|n| Value::String(n.to_string()))
            } else if matches.value_source(name) == Some(ValueSource::DefaultValue) {
                None
            } else {
                match (field.kind(), field.hints().action) {
                    (FieldKind::Flag, _) => matches.get_one::<bool>(name).map(|b| Value::Boolean(*b)),
                    (_, Some(_)) => Some(Value::Boolean(matches.get_flag(name))),
                    (FieldKind::Choice(_) | FieldKind::Subgroups(_), None) => matches
                        .get_one::<String>(name)
                        .and_then(|token| field.choice_key(token)),
                    (FieldKind::Collection(CollectionKind::Dict), None) => {
                        match matches.get_many::<String>(name) {
                            Some(pairs) => Some(Value::Table(
                                pairs
                                    .map(|p| parse_pair(p))
                                    .collect::<Result<toml::Table>>()
                                    .map_err(|e| e.in_field(name))?,
                            )),
                            None => None,
                        }
                    }
                    (FieldKind::Collection(_), None) => {
                        let template = field.collection_template();
                        read_values(matches, name, template.as_ref()).map(Value::Array)
                    }
                    (_, None) => {
                        let template = field.default_value();
                        read_values(matches, name, template.as_ref())
                            .and_then(|values| values.into_iter().next())
                    }
                }
            };
            // Defaults are already in record form; only supplied values are decoded.
            if let Some(value) = bound
                .map(|v| field.decode(v))
                .or_else(|| field.default_value())
            {
                record.insert(name.to_string(), value);
            }
        }
        tracing::debug!(fields = record.len(), "bound command-line record");
        Ok(record)
    }
}

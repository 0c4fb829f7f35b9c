use std::path::Path;

use clap::{Args, FromArgMatches};
use rfield::{FieldError, FieldTable, Record, TypeRegistry, Value, VariantType};
use serial_test::serial;

#[derive(Args, Debug, PartialEq)]
struct Fit {
    #[arg(long)]
    resume: bool,
}

#[derive(Args, Debug)]
struct Eval {
    #[arg(long, default_value = "val")]
    split: String,
}

fn registry() -> TypeRegistry {
    TypeRegistry::new()
        .with(VariantType::record("ResNet"))
        .with(VariantType::record("ViT"))
        .with(VariantType::of::<Fit>())
        .with(VariantType::of::<Eval>())
}

fn load() -> FieldTable {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("fields.toml");
    FieldTable::from_file(&path, &registry()).unwrap()
}

fn parse(args: &[&str]) -> Record {
    let table = load();
    let matches = table.command("trainer").try_get_matches_from(args).unwrap();
    table.bind(&matches).unwrap()
}

#[test]
#[serial]
fn test_basic_file() {
    let record = parse(&["trainer", "fit"]);
    assert_eq!(record.get("lr"), Some(&Value::Float(0.001)));
    assert_eq!(record.get("epochs"), Some(&Value::Integer(10)));
    assert_eq!(record.get("optimizer"), Some(&Value::from("adam")));
    assert_eq!(record.get("batch"), Some(&Value::Integer(16)));
    assert_eq!(record.get("activation"), Some(&Value::from("relu")));
    assert_eq!(record.get("model"), Some(&Value::from("vit")));
    assert_eq!(record.get("verbose"), Some(&Value::Boolean(false)));
    assert_eq!(record.get("command"), Some(&Value::from("fit")));
    assert_eq!(record.get("api_key"), Some(&Value::from("")));
}

#[test]
#[serial]
fn test_basic_file_with_env() {
    unsafe {
        std::env::set_var("LR", "0.5");
        std::env::set_var("EPOCHS", "3");
    }
    let record = parse(&["trainer", "eval"]);
    assert_eq!(record.get("lr"), Some(&Value::Float(0.5)));
    assert_eq!(record.get("epochs"), Some(&Value::Integer(3)));
    unsafe {
        std::env::remove_var("LR");
        std::env::remove_var("EPOCHS");
    }
}

#[test]
#[serial]
fn test_command_line_wins_over_env() {
    unsafe {
        std::env::set_var("EPOCHS", "3");
    }
    let record = parse(&["trainer", "--epochs", "7", "fit"]);
    assert_eq!(record.get("epochs"), Some(&Value::Integer(7)));
    unsafe {
        std::env::remove_var("EPOCHS");
    }
}

#[test]
#[serial]
fn test_aliases() {
    let record = parse(&["trainer", "-v", "-l", "0.1", "fit"]);
    assert_eq!(record.get("lr"), Some(&Value::Float(0.1)));
    assert_eq!(record.get("verbose"), Some(&Value::Boolean(true)));

    let record = parse(&["trainer", "--learning_rate", "0.2", "fit"]);
    assert_eq!(record.get("lr"), Some(&Value::Float(0.2)));
}

#[test]
#[serial]
fn test_choices() {
    let record = parse(&[
        "trainer",
        "--optimizer",
        "sgd",
        "--batch",
        "big",
        "--model",
        "resnet",
        "fit",
    ]);
    assert_eq!(record.get("optimizer"), Some(&Value::from("sgd")));
    assert_eq!(record.get("batch"), Some(&Value::Integer(256)));
    assert_eq!(record.get("model"), Some(&Value::from("resnet")));

    let err = load()
        .command("trainer")
        .try_get_matches_from(["trainer", "--optimizer", "rmsprop", "fit"])
        .unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
}

#[test]
#[serial]
fn test_collections() {
    // An attached value ends the occurrence, so `fit` is not read as an item.
    let record = parse(&[
        "trainer",
        "--layers=128",
        "--layers=32",
        "--weights=b=2.5",
        "fit",
    ]);
    assert_eq!(
        record.get("layers"),
        Some(&Value::Array(vec![Value::Integer(128), Value::Integer(32)]))
    );
    assert_eq!(
        record.get("tags"),
        Some(&Value::Array(vec![Value::from("baseline")]))
    );
    let Some(Value::Table(weights)) = record.get("weights") else {
        panic!("Expected a table");
    };
    assert_eq!(weights.get("b"), Some(&Value::Float(2.5)));
}

#[test]
#[serial]
fn test_subcommand() {
    let table = load();
    let matches = table
        .command("trainer")
        .try_get_matches_from(["trainer", "fit", "--resume"])
        .unwrap();
    let (name, sub) = matches.subcommand().unwrap();
    assert_eq!(name, "fit");
    assert_eq!(Fit::from_arg_matches(sub).unwrap(), Fit { resume: true });

    let err = table
        .command("trainer")
        .try_get_matches_from(["trainer"])
        .unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::MissingSubcommand);
}

#[test]
#[serial]
fn test_stored_record() {
    let table = load();
    let record = parse(&["trainer", "--batch", "big", "fit"]);
    let stored = table.encode_record(&record);
    assert_eq!(stored.get("batch"), Some(&Value::from("big")));
    assert!(!stored.contains_key("api_key"));

    let restored = table.decode_record(&stored);
    assert_eq!(restored.get("batch"), Some(&Value::Integer(256)));
    assert_eq!(restored.get("api_key"), Some(&Value::from("")));
}

#[test]
fn test_unregistered_subgroup_type() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("fields.toml");
    let err = FieldTable::from_file(&path, &TypeRegistry::new()).unwrap_err();
    assert!(matches!(err.root(), FieldError::InvalidSubgroupValue { .. }));
    assert!(err.to_string().starts_with("field 'model'"));
}

#[test]
#[serial]
fn test_subgroup_is_selected_by_key_only() {
    let err = load()
        .command("trainer")
        .try_get_matches_from(["trainer", "--model", "resnet", "--depth", "3", "fit"])
        .unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
}

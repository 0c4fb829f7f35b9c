use std::path::Path;

use clap::{Args, FromArgMatches};
use rfield::{FieldTable, TypeRegistry, VariantType};
use tracing_subscriber::EnvFilter;

#[derive(Args, Debug)]
struct Fit {
    #[arg(long)]
    resume: bool,
}

#[derive(Args, Debug)]
struct Eval {
    #[arg(long, default_value = "val")]
    split: String,
}

/// Subgroup variants are selected by key only, so they are registered by
/// name. Sub-commands carry their own `clap::Args`.
fn registry() -> TypeRegistry {
    TypeRegistry::new()
        .with(VariantType::record("ResNet"))
        .with(VariantType::record("ViT"))
        .with(VariantType::of::<Fit>())
        .with(VariantType::of::<Eval>())
}

fn main() -> rfield::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("fields.toml");
    let table = FieldTable::from_file(&path, &registry())?;
    let matches = table.command("trainer").get_matches();
    let record = table.bind(&matches)?;
    println!("Record: {:#?}", record);

    match matches.subcommand() {
        Some(("fit", sub)) => {
            let fit = Fit::from_arg_matches(sub).unwrap_or_else(|e| e.exit());
            println!("Fit: {:#?}", fit);
        }
        Some(("eval", sub)) => {
            let eval = Eval::from_arg_matches(sub).unwrap_or_else(|e| e.exit());
            println!("Eval: {:#?}", eval);
        }
        _ => {}
    }
    println!("Stored: {:#?}", table.encode_record(&record));
    Ok(())
}

// Licensed under the MIT license
// (see LICENSE or <http://opensource.org/licenses/MIT>) All files in the project carrying such
//! > rfield is a Rust utility for declaring the fields of a configuration record: defaults, choices, subgroups, collections and command-line aliases. Every declaration is validated once, up front, and the result is exposed as typed metadata that clap and a plain-mapping codec can consume.
//!
//! # How it works
//!
//! 1- Declare the fields, either in code or in a TOML manifest. Each top-level table is one field.
//!
//! ```toml
//! lr = { default = 0.001, alias = ["l", "learning_rate"], help = "Learning rate" }
//! optimizer = { choices = ["adam", "sgd"], default = "adam" }
//! size = { choices = { small = 1, big = 100 }, default = "small" }
//! ```
//!
//! The same declarations in code:
//!
//! ```
//! use rfield::{FieldTable, Key, Value, choice, field, mapping_choice};
//! use indexmap::indexmap;
//!
//! # fn main() -> rfield::Result<()> {
//! let table = FieldTable::new()
//!     .with(field("lr").default(0.001).aliases(["l", "learning_rate"]).build()?)?
//!     .with(choice("optimizer", ["adam", "sgd"], Some("adam".into()))?.build()?)?
//!     .with(
//!         mapping_choice(
//!             "size",
//!             indexmap! { Key::from("small") => Value::Integer(1), Key::from("big") => Value::Integer(100) },
//!             Some("small".into()),
//!         )?
//!         .build()?,
//!     )?;
//! assert_eq!(table.len(), 3);
//! # Ok(())
//! # }
//! ```
//!
//! An invalid declaration, such as a default that is not one of the choices, fails right there with a [`FieldError`] naming the field.
//!
//! 2- Build the command and bind the matches back to a record.
//!
//! ```text
//! let matches = table.command("train").get_matches();
//! let record = table.bind(&matches)?;
//! println!("{:#?}", record);
//! ```
//!
//! Mapping choices are selected by key on the command line, while the record holds the mapped value:
//!
//! ```text
//!
//! Usage: train [OPTIONS]
//!
//! Options:
//!   -l, --lr <lr>                  Learning rate [default: 0.001]
//!       --optimizer <optimizer>    [default: adam] [possible values: adam, sgd]
//!       --size <size>              [default: small] [possible values: small, big]
//!   -h, --help                     Print help
//! ```
//!
//! 3- Store the record. [`FieldTable::encode_record`] turns mapped values back into their keys and drops fields declared with `to_dict = false`; [`FieldTable::decode_record`] reverses it and fills in defaults.
pub use rfield_core::*;

use indexmap::IndexMap;

use crate::Value;
use crate::error::{FieldError, Result};
use crate::field::Field;

/// A record as a plain mapping from field name to value.
pub type Record = IndexMap<String, Value>;

/// An ordered collection of declared fields, one per record attribute.
#[derive(Debug, Clone, Default)]
pub struct FieldTable {
    fields: Vec<Field>,
}

impl FieldTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field; names must be unique.
    pub fn push(&mut self, field: Field) -> Result<()> {
        if self.get(field.name()).is_some() {
            return Err(FieldError::DuplicateField {
                name: field.name().to_string(),
            });
        }
        self.fields.push(field);
        Ok(())
    }

    pub fn with(mut self, field: Field) -> Result<Self> {
        self.push(field)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Converts a record to its serialized form: each value goes through its
    /// field's encoding function. Fields marked `to_dict = false`, and entries
    /// that are not declared fields, are left out.
    pub fn encode_record(&self, record: &Record) -> Record {
        self.fields
            .iter()
            .filter(|f| f.to_dict())
            .filter_map(|f| {
                record
                    .get(f.name())
                    .map(|v| (f.name().to_string(), f.encode(v.clone())))
            })
            .collect()
    }

    /// Rebuilds a record from its serialized form. Absent fields take their
    /// default; a field with neither a value nor a default is left out.
    pub fn decode_record(&self, serialized: &Record) -> Record {
        self.fields
            .iter()
            .filter_map(|f| {
                let value = match serialized.get(f.name()) {
                    Some(v) => Some(f.decode(v.clone())),
                    None => f.default_value(),
                };
                value.map(|v| (f.name().to_string(), v))
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a FieldTable {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choice::Key;
    use crate::field::{field, list_field, mapping_choice};
    use indexmap::indexmap;

    fn sample_table() -> FieldTable {
        FieldTable::new()
            .with(field("name").default("run").build().unwrap())
            .unwrap()
            .with(
                mapping_choice(
                    "size",
                    indexmap! { Key::from("small") => Value::Integer(1), Key::from("big") => Value::Integer(100) },
                    Some("small".into()),
                )
                .unwrap()
                .build()
                .unwrap(),
            )
            .unwrap()
            .with(field("secret").to_dict(false).build().unwrap())
            .unwrap()
            .with(list_field("layers", [8]).build().unwrap())
            .unwrap()
    }

    #[test]
    fn test_duplicate_field() {
        let mut table = sample_table();
        let err = table.push(field("name").build().unwrap()).unwrap_err();
        assert!(matches!(err, FieldError::DuplicateField { .. }));
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_encode_record() {
        let table = sample_table();
        let record = indexmap! {
            "name".to_string() => Value::from("exp"),
            "size".to_string() => Value::Integer(100),
            "secret".to_string() => Value::from("hunter2"),
            "unknown".to_string() => Value::from("x"),
        };
        let encoded = table.encode_record(&record);
        assert_eq!(
            encoded,
            indexmap! {
                "name".to_string() => Value::from("exp"),
                "size".to_string() => Value::from("big"),
            }
        );
    }

    #[test]
    fn test_decode_record_fills_defaults() {
        let table = sample_table();
        let decoded = table.decode_record(&indexmap! {
            "size".to_string() => Value::from("big"),
        });
        assert_eq!(decoded.get("name"), Some(&Value::from("run")));
        assert_eq!(decoded.get("size"), Some(&Value::Integer(100)));
        assert_eq!(decoded.get("layers"), Some(&Value::Array(vec![Value::Integer(8)])));
        assert!(!decoded.contains_key("secret"));
        assert_eq!(
            decoded.keys().collect::<Vec<_>>(),
            vec!["name", "size", "layers"]
        );
    }

    #[test]
    fn test_decode_then_encode_restores_keys() {
        let table = sample_table();
        let decoded = table.decode_record(&Record::new());
        assert_eq!(decoded.get("size"), Some(&Value::Integer(1)));
        let encoded = table.encode_record(&decoded);
        assert_eq!(encoded.get("size"), Some(&Value::from("small")));
    }
}

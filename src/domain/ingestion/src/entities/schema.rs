// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashSet;

use thiserror::Error;

use crate::Field;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Ordered list of fields with unique (case-insensitive) names
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(try_from = "Vec<Field>", into = "Vec<Field>")]
pub struct SchemaDefinition {
    fields: Vec<Field>,
}

impl SchemaDefinition {
    pub fn new(fields: Vec<Field>) -> Result<Self, SchemaDefinitionError> {
        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.to_ascii_lowercase()) {
                return Err(SchemaDefinitionError::DuplicateField {
                    field_name: field.name.clone(),
                });
            }
        }
        Ok(Self { fields })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.has_name(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn primary_keys(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.primary_key)
    }

    pub fn primary_key_names(&self) -> Vec<String> {
        self.primary_keys().map(|f| f.name.clone()).collect()
    }

    /// Returns a copy of the schema with the field appended
    pub fn with_field(&self, field: Field) -> Result<Self, SchemaDefinitionError> {
        let mut fields = self.fields.clone();
        fields.push(field);
        Self::new(fields)
    }

    /// Returns a copy of the schema with all fields whose name is listed removed
    pub fn without_fields<S: AsRef<str>>(&self, names: &[S]) -> Self {
        Self {
            fields: self
                .fields
                .iter()
                .filter(|f| !names.iter().any(|n| f.has_name(n.as_ref())))
                .cloned()
                .collect(),
        }
    }

    /// Renames every field. The mapping must keep names unique.
    pub fn map_names(&self, f: impl Fn(&str) -> String) -> Result<Self, SchemaDefinitionError> {
        Self::new(
            self.fields
                .iter()
                .map(|field| field.with_name(f(&field.name)))
                .collect(),
        )
    }
}

impl TryFrom<Vec<Field>> for SchemaDefinition {
    type Error = SchemaDefinitionError;

    fn try_from(fields: Vec<Field>) -> Result<Self, Self::Error> {
        Self::new(fields)
    }
}

impl From<SchemaDefinition> for Vec<Field> {
    fn from(schema: SchemaDefinition) -> Self {
        schema.fields
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaDefinitionError {
    #[error("Field \"{field_name}\" is defined more than once")]
    DuplicateField { field_name: String },
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

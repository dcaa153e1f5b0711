// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use tidemark_ingestion::*;

use crate::planning_context::{engine_managed_fields, staging_only_fields};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaEvolutionResult {
    /// `ALTER` operations: added columns first, then type and nullability
    /// changes in field order
    pub logical_plan: LogicalPlan,
    pub evolved_dataset: Dataset,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Reconciles the schema of a main dataset with an incoming staging schema
/// under the capabilities granted by the user and supported by the sink
pub struct SchemaEvolution<'a> {
    sink: &'a dyn RelationalSink,
    capabilities: &'a BTreeSet<SchemaEvolutionCapability>,
    staging_ignored: Vec<String>,
    main_ignored: Vec<String>,
}

impl<'a> SchemaEvolution<'a> {
    pub fn new(
        sink: &'a dyn RelationalSink,
        ingest_mode: &IngestMode,
        capabilities: &'a BTreeSet<SchemaEvolutionCapability>,
    ) -> Result<Self, ConfigurationError> {
        for kind in [SizeKind::Length, SizeKind::Scale] {
            if capabilities.contains(&kind.user_capability())
                && capabilities.contains(&kind.increment_only_capability())
            {
                return Err(ConfigurationError::new(format!(
                    "Invalid schema evolution capabilities. Select either {} or {}.",
                    kind.user_capability(),
                    kind.increment_only_capability()
                )));
            }
        }

        Ok(Self {
            sink,
            capabilities,
            staging_ignored: staging_only_fields(ingest_mode),
            main_ignored: engine_managed_fields(ingest_mode),
        })
    }

    fn allows(&self, capability: SchemaEvolutionCapability) -> bool {
        self.capabilities.contains(&capability)
    }

    fn is_ignored(names: &[String], field: &Field) -> bool {
        names.iter().any(|n| field.has_name(n))
    }

    fn primary_keys_match(&self, main: &SchemaDefinition, staging: &SchemaDefinition) -> bool {
        let keys = |schema: &SchemaDefinition, ignored: &[String]| -> BTreeSet<String> {
            schema
                .primary_keys()
                .filter(|f| !Self::is_ignored(ignored, f))
                .map(|f| f.name.to_ascii_lowercase())
                .collect()
        };
        keys(main, &self.main_ignored) == keys(staging, &self.staging_ignored)
    }

    /// Whether the staging schema can be reconciled with main at all, which
    /// is only ruled out by a different primary key
    pub fn is_schema_evolvable(&self, main: &Dataset, staging: &SchemaDefinition) -> bool {
        self.primary_keys_match(main.schema(), staging)
    }

    #[tracing::instrument(level = "debug", skip_all, fields(main = %main.reference()))]
    pub fn build_logical_plan(
        &self,
        main: &Dataset,
        staging: &SchemaDefinition,
    ) -> Result<SchemaEvolutionResult, IncompatibleSchemaChangeError> {
        let main_schema = main.schema();
        if !self.primary_keys_match(main_schema, staging) {
            return Err(IncompatibleSchemaChangeError::new(
                "Primary keys for main table has changed which is not allowed",
            ));
        }

        let target = main.reference().without_alias();
        let alter = |change: AlterChange, field: &Field| Operation::Alter {
            dataset: target.clone(),
            change,
            field: field.clone(),
        };

        let mut additions = Vec::new();
        let mut modifications = Vec::new();
        let mut evolved_fields = main_schema.fields().to_vec();
        let mut added_fields = Vec::new();

        for staging_field in staging
            .fields()
            .iter()
            .filter(|f| !Self::is_ignored(&self.staging_ignored, f))
        {
            let Some(position) = evolved_fields
                .iter()
                .position(|f| f.has_name(&staging_field.name))
            else {
                let field = self.added_column(staging_field)?;
                additions.push(alter(AlterChange::AddColumn, &field));
                added_fields.push(field);
                continue;
            };

            let main_field = evolved_fields[position].clone();
            let mut evolved = main_field.clone();

            if let Some(changed) = self.evolve_type(&main_field, staging_field)? {
                modifications.push(alter(AlterChange::ChangeDataType, &changed));
                evolved = changed;
            }
            if staging_field.nullable && !main_field.nullable && !main_field.primary_key {
                self.require_nullability_change(&main_field.name)?;
                evolved.nullable = true;
                modifications.push(alter(AlterChange::MakeNullable, &evolved));
            }

            evolved_fields[position] = evolved;
        }

        // Main columns staging no longer carries must accept NULLs
        for field in evolved_fields.iter_mut().filter(|f| {
            !f.nullable
                && !f.primary_key
                && !staging.contains(&f.name)
                && !Self::is_ignored(&self.main_ignored, f)
        }) {
            self.require_nullability_change(&field.name)?;
            field.nullable = true;
            modifications.push(alter(AlterChange::MakeNullable, field));
        }

        evolved_fields.extend(added_fields);
        let evolved_schema = SchemaDefinition::new(evolved_fields)
            .map_err(|e| IncompatibleSchemaChangeError::new(e.to_string()))?;

        tracing::debug!(
            added = additions.len(),
            modified = modifications.len(),
            "Built schema evolution plan"
        );

        Ok(SchemaEvolutionResult {
            logical_plan: additions.into_iter().chain(modifications).collect(),
            evolved_dataset: main.with_schema(evolved_schema),
        })
    }

    fn added_column(&self, staging_field: &Field) -> Result<Field, IncompatibleSchemaChangeError> {
        if self.allows(SchemaEvolutionCapability::AddColumn)
            && self.sink.supports(Capability::AddColumn)
        {
            // Existing rows get NULL in the new column
            Ok(staging_field.clone().as_nullable())
        } else {
            Err(IncompatibleSchemaChangeError::new(format!(
                "Field \"{}\" in staging dataset does not exist in main dataset. Couldn't add \
                 column since sink/user capabilities do not permit operation.",
                staging_field.name
            )))
        }
    }

    fn require_nullability_change(&self, name: &str) -> Result<(), IncompatibleSchemaChangeError> {
        if self.allows(SchemaEvolutionCapability::ColumnNullabilityChange)
            && self.sink.supports(Capability::ColumnNullabilityChange)
        {
            Ok(())
        } else {
            Err(IncompatibleSchemaChangeError::new(format!(
                "Column \"{name}\" couldn't be made nullable since user capability does not allow \
                 it"
            )))
        }
    }

    /// New declaration of `main` able to hold values of `staging`, if it
    /// needs to change. Nullability is left as declared in main.
    fn evolve_type(
        &self,
        main: &Field,
        staging: &Field,
    ) -> Result<Option<Field>, IncompatibleSchemaChangeError> {
        let (main_type, staging_type) = (main.data_type(), staging.data_type());

        let same_type = main_type == staging_type;
        let implicit = self.sink.supports_implicit_mapping(main_type, staging_type);
        let field_type = if same_type || implicit {
            // Decrements are only reported between identical types
            let length = self.size_change(&main.name, SizeKind::Length, main, staging, same_type)?;
            let scale = self.size_change(&main.name, SizeKind::Scale, main, staging, same_type)?;
            if length.is_none() && scale.is_none() {
                return Ok(None);
            }
            FieldType {
                data_type: main_type,
                length: length.or(main.field_type.length),
                scale: scale.or(main.field_type.scale),
            }
        } else if self.sink.supports_explicit_mapping(main_type, staging_type) {
            if !self.allows(SchemaEvolutionCapability::DataTypeConversion)
                || !self.sink.supports(Capability::ExplicitDataTypeConversion)
            {
                return Err(IncompatibleSchemaChangeError::explicit_conversion_not_allowed(
                    main_type,
                    staging_type,
                ));
            }
            self.sink.evolve_field_length(main, staging).field_type
        } else {
            return Err(IncompatibleSchemaChangeError::breaking_change(
                main_type,
                staging_type,
            ));
        };

        Ok(Some(Field {
            field_type,
            ..main.clone()
        }))
    }

    /// New length or scale of a column, `None` when it stays as declared.
    /// Sizes only grow; an unspecified size on either side changes nothing.
    fn size_change(
        &self,
        name: &str,
        kind: SizeKind,
        main: &Field,
        staging: &Field,
        check_decrement: bool,
    ) -> Result<Option<u32>, IncompatibleSchemaChangeError> {
        let (Some(current), Some(incoming)) = (kind.of(main), kind.of(staging)) else {
            return Ok(None);
        };

        let full = self.allows(kind.user_capability());
        let increment_only = self.allows(kind.increment_only_capability());

        match incoming.cmp(&current) {
            Ordering::Equal => Ok(None),
            Ordering::Greater => {
                if self.sink.supports(kind.sink_capability()) && (full || increment_only) {
                    Ok(Some(incoming))
                } else {
                    Err(IncompatibleSchemaChangeError::new(format!(
                        "Data type {kind} changes couldn't be performed on column \"{name}\" \
                         since user capability does not allow it"
                    )))
                }
            }
            Ordering::Less => {
                if check_decrement && increment_only && !full {
                    Err(IncompatibleSchemaChangeError::new(format!(
                        "Data type {kind} is decremented for column \"{name}\", but user \
                         capability does not allow it"
                    )))
                } else {
                    Ok(None)
                }
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, strum::Display)]
#[strum(serialize_all = "lowercase")]
enum SizeKind {
    Length,
    Scale,
}

impl SizeKind {
    fn of(self, field: &Field) -> Option<u32> {
        match self {
            Self::Length => field.field_type.length,
            Self::Scale => field.field_type.scale,
        }
    }

    fn user_capability(self) -> SchemaEvolutionCapability {
        match self {
            Self::Length => SchemaEvolutionCapability::DataTypeLengthChange,
            Self::Scale => SchemaEvolutionCapability::DataTypeScaleChange,
        }
    }

    fn increment_only_capability(self) -> SchemaEvolutionCapability {
        match self {
            Self::Length => SchemaEvolutionCapability::DataTypeLengthChangeAllowIncrementOnly,
            Self::Scale => SchemaEvolutionCapability::DataTypeScaleChangeAllowIncrementOnly,
        }
    }

    fn sink_capability(self) -> Capability {
        match self {
            Self::Length => Capability::DataTypeLengthChange,
            Self::Scale => Capability::DataTypeScaleChange,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

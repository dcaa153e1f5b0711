// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use itertools::Itertools;
use tidemark_ingestion::*;

use super::{Dialect, string_literal};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Lowers logical plans into SQL text of one dialect, substituting batch
/// placeholders from the transform context
pub(crate) struct SqlRenderer<'a> {
    dialect: &'a dyn Dialect,
    context: &'a TransformContext,
}

type RenderResult = Result<String, TransformError>;

impl<'a> SqlRenderer<'a> {
    pub fn new(dialect: &'a dyn Dialect, context: &'a TransformContext) -> Self {
        Self { dialect, context }
    }

    pub fn context(&self) -> &TransformContext {
        self.context
    }

    pub fn render_plan(&self, plan: &LogicalPlan) -> Result<Vec<String>, TransformError> {
        let mut statements = Vec::with_capacity(plan.operations.len());
        for operation in &plan.operations {
            statements.extend(self.render_operation(operation)?);
        }
        Ok(statements)
    }

    fn render_operation(&self, operation: &Operation) -> Result<Vec<String>, TransformError> {
        let sql = match operation {
            Operation::Create {
                dataset,
                schema,
                if_not_exists,
            } => self.create(dataset, schema, *if_not_exists),
            Operation::Drop { dataset, if_exists } => format!(
                "DROP TABLE {}{}",
                if *if_exists { "IF EXISTS " } else { "" },
                self.table(dataset)
            ),
            Operation::Delete { dataset, condition } => {
                format!(
                    "DELETE FROM {}{}",
                    self.table_as(dataset),
                    self.where_clause(condition.as_ref())?
                )
            }
            Operation::Insert {
                target,
                fields,
                source,
            } => self.insert(target, fields, source)?,
            Operation::Update {
                target,
                assignments,
                condition,
            } => self.update(target, assignments, condition.as_ref())?,
            Operation::Merge(merge) => self.merge(merge)?,
            Operation::Alter {
                dataset,
                change,
                field,
            } => self.dialect.alter(
                &self.table(dataset),
                *change,
                &self.identifier(&field.name),
                &self.dialect.column_type(&field.field_type),
            )?,
            Operation::Copy(copy) => return self.dialect.copy(self, copy),
        };
        Ok(vec![sql])
    }

    fn create(
        &self,
        dataset: &DatasetReference,
        schema: &SchemaDefinition,
        if_not_exists: bool,
    ) -> String {
        let mut columns: Vec<String> = schema
            .fields()
            .iter()
            .map(|f| {
                let mut column = format!(
                    "{} {}",
                    self.identifier(&f.name),
                    self.dialect.column_type(&f.field_type)
                );
                if !f.nullable {
                    column.push_str(" NOT NULL");
                }
                column
            })
            .collect();

        let keys = schema.primary_key_names();
        if !keys.is_empty() {
            columns.push(format!("PRIMARY KEY ({})", self.identifier_list(&keys)));
        }

        format!(
            "CREATE TABLE {}{}({})",
            if if_not_exists { "IF NOT EXISTS " } else { "" },
            self.table(dataset),
            columns.join(",")
        )
    }

    fn insert(
        &self,
        target: &DatasetReference,
        fields: &[String],
        source: &Selection,
    ) -> RenderResult {
        let selection = self.selection(source)?;
        let selection = if self.dialect.parenthesize_insert_selection() {
            format!("({selection})")
        } else {
            selection
        };
        Ok(format!(
            "INSERT INTO {} ({}) {selection}",
            self.table(target),
            self.identifier_list(fields)
        ))
    }

    fn update(
        &self,
        target: &DatasetReference,
        assignments: &[(String, Value)],
        condition: Option<&Condition>,
    ) -> RenderResult {
        let alias = target
            .alias
            .as_deref()
            .filter(|_| self.dialect.qualify_update_columns());
        let assignments = self.assignments(alias, assignments)?;
        Ok(format!(
            "UPDATE {} SET {assignments}{}",
            self.table_as(target),
            self.where_clause(condition)?
        ))
    }

    fn merge(&self, merge: &MergeOperation) -> RenderResult {
        if !self.dialect.supports_merge() {
            return Err(TransformError::Unsupported {
                sink: self.dialect.dialect_name(),
                operation: "MERGE".to_string(),
            });
        }

        let mut sql = format!(
            "MERGE INTO {} USING {} ON {} WHEN MATCHED",
            self.table_as(&merge.target),
            self.source(&merge.source)?,
            self.condition(&merge.on)?
        );
        if let Some(matched) = &merge.matched_condition {
            sql.push_str(" AND ");
            sql.push_str(&self.condition(matched)?);
        }
        sql.push_str(&format!(
            " THEN UPDATE SET {} WHEN NOT MATCHED THEN INSERT ({}) VALUES ({})",
            self.assignments(merge.target.alias.as_deref(), &merge.update_assignments)?,
            self.identifier_list(&merge.insert_fields),
            self.values(&merge.insert_values)?
        ));
        Ok(sql)
    }

    fn assignments(&self, alias: Option<&str>, assignments: &[(String, Value)]) -> RenderResult {
        Ok(assignments
            .iter()
            .map(|(field, value)| {
                let column = match alias {
                    Some(alias) => format!("{alias}.{}", self.identifier(field)),
                    None => self.identifier(field),
                };
                Ok::<_, TransformError>(format!("{column} = {}", self.value(value)?))
            })
            .collect::<Result<Vec<_>, _>>()?
            .join(","))
    }

    fn where_clause(&self, condition: Option<&Condition>) -> RenderResult {
        match condition {
            Some(condition) => Ok(format!(" WHERE {}", self.condition(condition)?)),
            None => Ok(String::new()),
        }
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

    pub fn identifier(&self, identifier: &str) -> String {
        self.dialect.quote_identifier(identifier)
    }

    fn identifier_list(&self, identifiers: &[String]) -> String {
        identifiers.iter().map(|i| self.identifier(i)).join(", ")
    }

    /// Qualified table name
    pub fn table(&self, dataset: &DatasetReference) -> String {
        [dataset.database.as_deref(), dataset.group.as_deref(), Some(dataset.name.as_str())]
            .into_iter()
            .flatten()
            .map(|part| self.identifier(part))
            .join(".")
    }

    fn table_as(&self, dataset: &DatasetReference) -> String {
        match &dataset.alias {
            Some(alias) => format!("{} as {alias}", self.table(dataset)),
            None => self.table(dataset),
        }
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

    /// Top-level `SELECT` without surrounding parentheses
    pub fn selection(&self, selection: &Selection) -> RenderResult {
        let mut sql = String::from("SELECT ");
        if selection.distinct {
            sql.push_str("DISTINCT ");
        }
        if selection.fields.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.values(&selection.fields)?);
        }
        if let Some(source) = &selection.source {
            sql.push_str(" FROM ");
            sql.push_str(&self.source(source)?);
        }
        sql.push_str(&self.where_clause(selection.condition.as_ref())?);
        if !selection.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.values(&selection.group_by)?);
        }
        Ok(sql)
    }

    fn source(&self, source: &Source) -> RenderResult {
        match source {
            Source::Dataset(dataset) => Ok(self.table_as(dataset)),
            Source::Selection(selection) => {
                let sql = format!("({})", self.selection(selection)?);
                Ok(match &selection.alias {
                    Some(alias) => format!("{sql} as {alias}"),
                    None => sql,
                })
            }
            Source::Join(join) => Ok(format!(
                "{} {} {} ON {}",
                self.source(&join.left)?,
                match join.kind {
                    JoinKind::Inner => "INNER JOIN",
                    JoinKind::LeftOuter => "LEFT OUTER JOIN",
                },
                self.source(&join.right)?,
                self.condition(&join.on)?
            )),
        }
    }

    pub fn condition(&self, condition: &Condition) -> RenderResult {
        match condition {
            Condition::And(conditions) => self.junction(conditions, "AND", "1 = 1"),
            Condition::Or(conditions) => self.junction(conditions, "OR", "1 = 0"),
            Condition::Not(inner) => Ok(format!("NOT ({})", self.condition(inner)?)),
            Condition::Compare { left, op, right } => Ok(format!(
                "{} {} {}",
                self.value(left)?,
                match op {
                    ComparisonOperator::Equals => "=",
                    ComparisonOperator::NotEquals => "<>",
                    ComparisonOperator::GreaterThan => ">",
                    ComparisonOperator::GreaterThanEqualTo => ">=",
                    ComparisonOperator::LessThan => "<",
                    ComparisonOperator::LessThanEqualTo => "<=",
                },
                self.value(right)?
            )),
            Condition::IsNull(value) => Ok(format!("{} IS NULL", self.value(value)?)),
            Condition::IsNotNull(value) => Ok(format!("{} IS NOT NULL", self.value(value)?)),
            Condition::In { value, list } => {
                Ok(format!("{} IN ({})", self.value(value)?, self.values(list)?))
            }
            Condition::NotIn { value, list } => {
                Ok(format!("{} NOT IN ({})", self.value(value)?, self.values(list)?))
            }
            Condition::InSelection { value, selection } => Ok(format!(
                "{} IN ({})",
                self.value(value)?,
                self.selection(selection)?
            )),
            Condition::NotInSelection { value, selection } => Ok(format!(
                "{} NOT IN ({})",
                self.value(value)?,
                self.selection(selection)?
            )),
            Condition::Exists(selection) => Ok(format!("EXISTS ({})", self.selection(selection)?)),
        }
    }

    fn junction(&self, conditions: &[Condition], keyword: &str, empty: &str) -> RenderResult {
        match conditions {
            [] => Ok(empty.to_string()),
            [single] => self.condition(single),
            _ => Ok(conditions
                .iter()
                .map(|c| self.condition(c).map(|sql| format!("({sql})")))
                .collect::<Result<Vec<_>, _>>()?
                .join(&format!(" {keyword} "))),
        }
    }

    fn values(&self, values: &[Value]) -> RenderResult {
        Ok(values
            .iter()
            .map(|v| self.value(v))
            .collect::<Result<Vec<_>, _>>()?
            .join(","))
    }

    pub fn value(&self, value: &Value) -> RenderResult {
        match value {
            Value::All => Ok("*".to_string()),
            Value::Field(field) => Ok(match &field.dataset_alias {
                Some(alias) => format!("{alias}.{}", self.identifier(&field.name)),
                None => self.identifier(&field.name),
            }),
            Value::String(s) => Ok(string_literal(s)),
            Value::Integer(i) => Ok(i.to_string()),
            Value::DateTime(dt) => Ok(self.dialect.date_time_literal(dt)),
            Value::Null => Ok("NULL".to_string()),
            Value::BatchStartTimestamp => {
                Ok(self.dialect.date_time_literal(&self.context.batch_start_literal()))
            }
            Value::BatchEndTimestamp => Ok(self.dialect.current_timestamp().to_string()),
            Value::BatchId {
                metadata,
                table_name,
            } => self.batch_id(metadata, table_name),
            Value::DataSplitLowerBound => self
                .context
                .data_split
                .map(|range| range.lower.to_string())
                .ok_or(TransformError::MissingDataSplit),
            Value::DataSplitUpperBound => self
                .context
                .data_split
                .map(|range| range.upper.to_string())
                .ok_or(TransformError::MissingDataSplit),
            Value::Function { name, args } => self.function(name, args),
            Value::Window {
                name,
                partition_by,
                order_by,
            } => {
                let mut window = Vec::new();
                if !partition_by.is_empty() {
                    window.push(format!("PARTITION BY {}", self.values(partition_by)?));
                }
                if !order_by.is_empty() {
                    let order = order_by
                        .iter()
                        .map(|o| {
                            self.value(&o.value)
                                .map(|v| if o.descending { format!("{v} DESC") } else { v })
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    window.push(format!("ORDER BY {}", order.join(",")));
                }
                Ok(format!(
                    "{} OVER ({})",
                    self.function(name, &[])?,
                    window.join(" ")
                ))
            }
            Value::Subquery(selection) => Ok(format!("({})", self.selection(selection)?)),
            Value::Binary { op, left, right } => Ok(format!(
                "{}{}{}",
                self.value(left)?,
                match op {
                    BinaryOperator::Plus => "+",
                    BinaryOperator::Minus => "-",
                },
                self.value(right)?
            )),
            Value::Aliased { value, alias } => {
                Ok(format!("{} as {}", self.value(value)?, self.identifier(alias)))
            }
        }
    }

    fn function(&self, name: &FunctionName, args: &[Value]) -> RenderResult {
        let args = self.values(args)?;
        Ok(match name {
            FunctionName::Count => format!("COUNT({args})"),
            FunctionName::CountDistinct => format!("COUNT(DISTINCT {args})"),
            FunctionName::Sum => format!("SUM({args})"),
            FunctionName::Max => format!("MAX({args})"),
            FunctionName::Min => format!("MIN({args})"),
            FunctionName::Coalesce => format!("COALESCE({args})"),
            FunctionName::Upper => format!("UPPER({args})"),
            FunctionName::DenseRank => format!("DENSE_RANK({args})"),
            FunctionName::RowNumber => format!("ROW_NUMBER({args})"),
            FunctionName::Custom(udf) => format!("{udf}({args})"),
        })
    }

    /// Literal once resolved, otherwise the next id of the main table in the
    /// metadata dataset
    fn batch_id(&self, metadata: &MetadataDataset, table_name: &str) -> RenderResult {
        if let Some(batch_id) = self.context.batch_id {
            return Ok(batch_id.to_string());
        }
        let alias = &metadata.name;
        Ok(format!(
            "(SELECT COALESCE(MAX({alias}.{}),0)+1 FROM {} as {alias} WHERE {alias}.{} = {})",
            self.identifier(&metadata.table_batch_id_field),
            self.table(&metadata.reference()),
            self.identifier(&metadata.table_name_field),
            string_literal(table_name)
        ))
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

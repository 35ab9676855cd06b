//! Pure schema planning
//!
//! [`plan_table`] compares a declared [`TableSpec`] with an inspected
//! [`TableState`] and returns the DDL needed to close the gap. It never
//! drops a column and never rewrites a column type.

use super::catalog::{ColumnSpec, TableSpec};
use super::inspect::TableState;
use std::fmt;

/// One DDL step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
    CreateEnum {
        name: String,
        values: Vec<String>,
    },
    AddEnumValue {
        name: String,
        value: String,
    },
    /// Destructive: dependent columns are dropped with the type.
    DropEnum {
        name: String,
    },
    CreateTable {
        table: String,
        columns: Vec<ColumnSpec>,
        primary_key: Vec<String>,
    },
    AddColumn {
        table: String,
        column: ColumnSpec,
    },
    SetNotNull {
        table: String,
        column: String,
    },
    DropNotNull {
        table: String,
        column: String,
    },
    AddPrimaryKey {
        table: String,
        columns: Vec<String>,
    },
}

impl SchemaChange {
    /// Table or enum type this change applies to.
    pub fn object(&self) -> &str {
        match self {
            SchemaChange::CreateEnum { name, .. }
            | SchemaChange::AddEnumValue { name, .. }
            | SchemaChange::DropEnum { name } => name,
            SchemaChange::CreateTable { table, .. }
            | SchemaChange::AddColumn { table, .. }
            | SchemaChange::SetNotNull { table, .. }
            | SchemaChange::DropNotNull { table, .. }
            | SchemaChange::AddPrimaryKey { table, .. } => table,
        }
    }

    pub fn to_sql(&self) -> String {
        match self {
            SchemaChange::CreateEnum { name, values } => format!(
                "CREATE TYPE {} AS ENUM ({})",
                quote_ident(name),
                values.iter().map(|v| quote_literal(v)).collect::<Vec<_>>().join(", ")
            ),
            SchemaChange::AddEnumValue { name, value } => format!(
                "ALTER TYPE {} ADD VALUE IF NOT EXISTS {}",
                quote_ident(name),
                quote_literal(value)
            ),
            SchemaChange::DropEnum { name } => {
                format!("DROP TYPE IF EXISTS {} CASCADE", quote_ident(name))
            },
            SchemaChange::CreateTable {
                table,
                columns,
                primary_key,
            } => {
                let mut parts: Vec<String> = columns.iter().map(column_definition).collect();
                parts.push(format!("PRIMARY KEY ({})", ident_list(primary_key)));
                format!("CREATE TABLE {} (\n    {}\n)", quote_ident(table), parts.join(",\n    "))
            },
            SchemaChange::AddColumn { table, column } => format!(
                "ALTER TABLE {} ADD COLUMN {}",
                quote_ident(table),
                column_definition(column)
            ),
            SchemaChange::SetNotNull { table, column } => format!(
                "ALTER TABLE {} ALTER COLUMN {} SET NOT NULL",
                quote_ident(table),
                quote_ident(column)
            ),
            SchemaChange::DropNotNull { table, column } => format!(
                "ALTER TABLE {} ALTER COLUMN {} DROP NOT NULL",
                quote_ident(table),
                quote_ident(column)
            ),
            SchemaChange::AddPrimaryKey { table, columns } => format!(
                "ALTER TABLE {} ADD PRIMARY KEY ({})",
                quote_ident(table),
                ident_list(columns)
            ),
        }
    }
}

impl fmt::Display for SchemaChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaChange::CreateEnum { name, .. } => write!(f, "create enum {name}"),
            SchemaChange::AddEnumValue { name, value } => write!(f, "add value '{value}' to {name}"),
            SchemaChange::DropEnum { name } => write!(f, "drop enum {name}"),
            SchemaChange::CreateTable { table, .. } => write!(f, "create table {table}"),
            SchemaChange::AddColumn { table, column } => {
                write!(f, "add column {table}.{}", column.name)
            },
            SchemaChange::SetNotNull { table, column } => write!(f, "set {table}.{column} NOT NULL"),
            SchemaChange::DropNotNull { table, column } => {
                write!(f, "drop NOT NULL on {table}.{column}")
            },
            SchemaChange::AddPrimaryKey { table, .. } => write!(f, "add primary key to {table}"),
        }
    }
}

/// A live column whose type differs from the declared one. Reported, never fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDrift {
    pub table: String,
    pub column: String,
    pub expected: String,
    pub actual: String,
}

/// Changes that bring `state` in line with `spec`.
pub fn plan_table(spec: &TableSpec, state: &TableState) -> Vec<SchemaChange> {
    if !state.exists {
        return vec![SchemaChange::CreateTable {
            table: spec.name.to_string(),
            columns: spec.columns.to_vec(),
            primary_key: spec.primary_key.iter().map(|c| c.to_string()).collect(),
        }];
    }

    let mut changes = Vec::new();

    for column in spec.columns {
        match state.column(column.name) {
            None => changes.push(SchemaChange::AddColumn {
                table: spec.name.to_string(),
                column: *column,
            }),
            Some(live) if live.nullable && !column.nullable => {
                changes.push(SchemaChange::SetNotNull {
                    table: spec.name.to_string(),
                    column: column.name.to_string(),
                })
            },
            Some(live) if !live.nullable && column.nullable => {
                changes.push(SchemaChange::DropNotNull {
                    table: spec.name.to_string(),
                    column: column.name.to_string(),
                })
            },
            Some(_) => {},
        }
    }

    if !state.has_primary_key {
        changes.push(SchemaChange::AddPrimaryKey {
            table: spec.name.to_string(),
            columns: spec.primary_key.iter().map(|c| c.to_string()).collect(),
        });
    }

    changes
}

/// Declared columns whose live type does not match.
pub fn type_drift(spec: &TableSpec, state: &TableState) -> Vec<TypeDrift> {
    spec.columns
        .iter()
        .filter_map(|column| {
            let live = state.column(column.name)?;
            if column.ty.matches_live(&live.data_type, &live.udt_name) {
                return None;
            }
            Some(TypeDrift {
                table: spec.name.to_string(),
                column: column.name.to_string(),
                expected: column.ty.sql(),
                actual: live.udt_name.clone(),
            })
        })
        .collect()
}

fn column_definition(column: &ColumnSpec) -> String {
    format!(
        "{} {}{}",
        quote_ident(column.name),
        column.ty.sql(),
        if column.nullable { "" } else { " NOT NULL" }
    )
}

fn ident_list<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

//! Enum type evolution

use super::catalog::EnumSpec;
use super::plan::SchemaChange;
use serde::{Deserialize, Serialize};

/// How existing enum types are brought up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumMode {
    /// Create missing types and append missing values. Never removes anything.
    #[default]
    Additive,
    /// `DROP TYPE .. CASCADE` then recreate.
    ///
    /// Every column using the type is dropped along with it, taking its data
    /// with it. Tables must be reconciled in the same transaction so the
    /// columns come back before commit.
    Rebuild,
}

/// Changes that bring the live enum (`None` when absent) in line with `spec`.
pub fn plan_enum(spec: &EnumSpec, live: Option<&[String]>, mode: EnumMode) -> Vec<SchemaChange> {
    let create = SchemaChange::CreateEnum {
        name: spec.name.to_string(),
        values: spec.values.iter().map(|v| v.to_string()).collect(),
    };

    let Some(live) = live else {
        return vec![create];
    };

    match mode {
        EnumMode::Rebuild => vec![
            SchemaChange::DropEnum {
                name: spec.name.to_string(),
            },
            create,
        ],
        EnumMode::Additive => spec
            .values
            .iter()
            .filter(|value| !live.iter().any(|l| l.as_str() == **value))
            .map(|value| SchemaChange::AddEnumValue {
                name: spec.name.to_string(),
                value: value.to_string(),
            })
            .collect(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const ROUTE_TYPE: EnumSpec = EnumSpec {
        name: "route_type_enum",
        values: &["0", "1", "2", "3", "4", "5", "6", "7", "11", "12", "800", "900"],
    };

    fn owned(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_missing_type_is_created() {
        let changes = plan_enum(&ROUTE_TYPE, None, EnumMode::Additive);
        assert_eq!(changes.len(), 1);
        assert!(changes[0]
            .to_sql()
            .starts_with("CREATE TYPE \"route_type_enum\" AS ENUM ('0', '1'"));
    }

    #[test]
    fn test_additive_appends_only_missing_values() {
        let live = owned(&["0", "1", "2", "3", "4", "5", "6", "7", "800", "900"]);
        let changes = plan_enum(&ROUTE_TYPE, Some(live.as_slice()), EnumMode::Additive);

        let sql: Vec<String> = changes.iter().map(SchemaChange::to_sql).collect();
        assert_eq!(
            sql,
            [
                "ALTER TYPE \"route_type_enum\" ADD VALUE IF NOT EXISTS '11'",
                "ALTER TYPE \"route_type_enum\" ADD VALUE IF NOT EXISTS '12'",
            ]
        );
    }

    #[test]
    fn test_additive_ignores_extra_live_values() {
        let mut live = owned(ROUTE_TYPE.values);
        live.push("1700".into());
        assert!(plan_enum(&ROUTE_TYPE, Some(live.as_slice()), EnumMode::Additive).is_empty());
    }

    #[test]
    fn test_rebuild_drops_then_creates() {
        let live = owned(ROUTE_TYPE.values);
        let changes = plan_enum(&ROUTE_TYPE, Some(live.as_slice()), EnumMode::Rebuild);
        assert!(matches!(changes[0], SchemaChange::DropEnum { .. }));
        assert_eq!(changes[0].to_sql(), "DROP TYPE IF EXISTS \"route_type_enum\" CASCADE");
        assert!(matches!(changes[1], SchemaChange::CreateEnum { .. }));
    }
}

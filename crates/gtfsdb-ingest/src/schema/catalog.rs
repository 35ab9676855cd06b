//! Declared shape of the GTFS tables and enum types
//!
//! [`TABLES`] lists the loaded tables in processing order. That order is a
//! topological sort of the `depends_on` edges, so a parent table is always
//! filled before its children. [`SERVICE_TABLES`] are reconciled alongside
//! them but never loaded from a feed or truncated.

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// `VARCHAR(255)`
    ShortText,
    /// `TEXT`
    LongText,
    Integer,
    Decimal { precision: u8, scale: u8 },
    /// GTFS 0/1 flags, stored as `SMALLINT`
    Flag,
    Date,
    /// Named PostgreSQL enum type
    Enum(&'static str),
    /// Array of a named enum type
    EnumArray(&'static str),
    Uuid,
    Boolean,
    /// `TIMESTAMP` without time zone
    Timestamp,
}

impl ColumnType {
    pub fn sql(&self) -> String {
        match self {
            ColumnType::ShortText => "VARCHAR(255)".to_string(),
            ColumnType::LongText => "TEXT".to_string(),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::Decimal { precision, scale } => format!("NUMERIC({precision},{scale})"),
            ColumnType::Flag => "SMALLINT".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Enum(name) => (*name).to_string(),
            ColumnType::EnumArray(name) => format!("{name}[]"),
            ColumnType::Uuid => "UUID".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
        }
    }

    /// Whether a live column, described by `information_schema.columns`
    /// `data_type` and `udt_name`, has this type.
    pub fn matches_live(&self, data_type: &str, udt_name: &str) -> bool {
        match self {
            ColumnType::ShortText => data_type == "character varying",
            ColumnType::LongText => data_type == "text",
            ColumnType::Integer => data_type == "integer",
            ColumnType::Decimal { .. } => data_type == "numeric",
            ColumnType::Flag => data_type == "smallint",
            ColumnType::Date => data_type == "date",
            ColumnType::Enum(name) => data_type == "USER-DEFINED" && udt_name == *name,
            // array udt names carry a leading underscore
            ColumnType::EnumArray(name) => {
                data_type == "ARRAY" && udt_name.strip_prefix('_') == Some(*name)
            },
            ColumnType::Uuid => data_type == "uuid",
            ColumnType::Boolean => data_type == "boolean",
            ColumnType::Timestamp => data_type == "timestamp without time zone",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
}

const fn col(name: &'static str, ty: ColumnType) -> ColumnSpec {
    ColumnSpec {
        name,
        ty,
        nullable: false,
    }
}

const fn opt(name: &'static str, ty: ColumnType) -> ColumnSpec {
    ColumnSpec {
        name,
        ty,
        nullable: true,
    }
}

/// One table and the feed file that fills it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    pub name: &'static str,
    /// Feed file stem; the file is `<file>.txt`. Empty for service tables.
    pub file: &'static str,
    pub columns: &'static [ColumnSpec],
    pub primary_key: &'static [&'static str],
    pub depends_on: &'static [&'static str],
}

impl TableSpec {
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// A named PostgreSQL enum type and its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumSpec {
    pub name: &'static str,
    pub values: &'static [&'static str],
}

use ColumnType::{
    Boolean, Date, Decimal, Enum, EnumArray, Flag, Integer, LongText, ShortText, Timestamp, Uuid,
};

const LAT: ColumnType = Decimal {
    precision: 10,
    scale: 8,
};
const LON: ColumnType = Decimal {
    precision: 11,
    scale: 8,
};
const DISTANCE: ColumnType = Decimal {
    precision: 10,
    scale: 2,
};

pub const AGENCY: TableSpec = TableSpec {
    name: "agency",
    file: "agency",
    columns: &[
        col("agency_id", ShortText),
        col("agency_name", ShortText),
        col("agency_url", LongText),
        col("agency_timezone", ShortText),
        opt("agency_lang", ShortText),
        opt("agency_phone", ShortText),
        opt("agency_fare_url", LongText),
        opt("agency_email", ShortText),
    ],
    primary_key: &["agency_id"],
    depends_on: &[],
};

pub const STOPS: TableSpec = TableSpec {
    name: "stops",
    file: "stops",
    columns: &[
        col("stop_id", ShortText),
        opt("stop_code", ShortText),
        col("stop_name", ShortText),
        opt("tts_stop_name", ShortText),
        opt("stop_desc", LongText),
        col("stop_lat", LAT),
        col("stop_lon", LON),
        opt("zone_id", ShortText),
        opt("stop_url", LongText),
        opt("location_type", Enum("location_type_enum")),
        opt("parent_station", ShortText),
        opt("stop_timezone", ShortText),
        opt("wheelchair_boarding", Enum("wheelchair_accessible_enum")),
        opt("level_id", ShortText),
        opt("platform_code", ShortText),
    ],
    primary_key: &["stop_id"],
    depends_on: &[],
};

pub const ROUTES: TableSpec = TableSpec {
    name: "routes",
    file: "routes",
    columns: &[
        col("route_id", ShortText),
        col("agency_id", ShortText),
        col("route_short_name", ShortText),
        col("route_long_name", ShortText),
        opt("route_desc", LongText),
        col("route_type", Enum("route_type_enum")),
        opt("route_url", LongText),
        opt("route_color", ShortText),
        opt("route_text_color", ShortText),
        opt("route_sort_order", Integer),
        opt("continuous_pickup", ShortText),
        opt("continuous_drop_off", ShortText),
        opt("network_id", ShortText),
    ],
    primary_key: &["route_id"],
    depends_on: &["agency"],
};

pub const CALENDAR: TableSpec = TableSpec {
    name: "calendar",
    file: "calendar",
    columns: &[
        col("service_id", ShortText),
        col("monday", Flag),
        col("tuesday", Flag),
        col("wednesday", Flag),
        col("thursday", Flag),
        col("friday", Flag),
        col("saturday", Flag),
        col("sunday", Flag),
        col("start_date", Date),
        col("end_date", Date),
    ],
    primary_key: &["service_id"],
    depends_on: &[],
};

pub const CALENDAR_DATES: TableSpec = TableSpec {
    name: "calendar_dates",
    file: "calendar_dates",
    columns: &[
        col("service_id", ShortText),
        col("date", Date),
        col("exception_type", Enum("exception_type_enum")),
    ],
    primary_key: &["service_id", "date"],
    depends_on: &["calendar"],
};

pub const SHAPES: TableSpec = TableSpec {
    name: "shapes",
    file: "shapes",
    columns: &[
        col("shape_id", ShortText),
        col("shape_pt_lat", LAT),
        col("shape_pt_lon", LON),
        col("shape_pt_sequence", Integer),
        opt("shape_dist_traveled", DISTANCE),
    ],
    primary_key: &["shape_id", "shape_pt_sequence"],
    depends_on: &[],
};

pub const TRIPS: TableSpec = TableSpec {
    name: "trips",
    file: "trips",
    columns: &[
        col("trip_id", ShortText),
        col("route_id", ShortText),
        col("service_id", ShortText),
        opt("trip_headsign", ShortText),
        opt("trip_short_name", ShortText),
        opt("direction_id", Flag),
        opt("block_id", ShortText),
        opt("shape_id", ShortText),
        opt("wheelchair_accessible", Enum("wheelchair_accessible_enum")),
        opt("bikes_allowed", Enum("bikes_allowed_enum")),
    ],
    primary_key: &["trip_id"],
    depends_on: &["routes", "calendar", "shapes"],
};

pub const STOP_TIMES: TableSpec = TableSpec {
    name: "stop_times",
    file: "stop_times",
    columns: &[
        col("trip_id", ShortText),
        opt("arrival_time", ShortText),
        opt("departure_time", ShortText),
        col("stop_id", ShortText),
        col("stop_sequence", Integer),
        opt("stop_headsign", ShortText),
        opt("stop_tts_headsign", ShortText),
        opt("pickup_type", Enum("pickup_type_enum")),
        opt("drop_off_type", Enum("drop_off_type_enum")),
        opt("continuous_pickup", ShortText),
        opt("continuous_drop_off", ShortText),
        opt("shape_dist_traveled", DISTANCE),
        opt("timepoint", Flag),
    ],
    primary_key: &["trip_id", "stop_sequence"],
    depends_on: &["trips", "stops"],
};

/// Loaded tables in processing order.
pub const TABLES: &[TableSpec] = &[
    AGENCY,
    STOPS,
    ROUTES,
    CALENDAR,
    CALENDAR_DATES,
    SHAPES,
    TRIPS,
    STOP_TIMES,
];

/// Accounts of the API that serves the imported data.
pub const USERS: TableSpec = TableSpec {
    name: "users",
    file: "",
    columns: &[
        col("id", Uuid),
        col("username", ShortText),
        col("email", ShortText),
        col("password", ShortText),
        opt("roles", EnumArray("role_enum")),
        opt("isEmailVerified", Boolean),
        opt("createdAt", Timestamp),
        opt("updatedAt", Timestamp),
    ],
    primary_key: &["id"],
    depends_on: &[],
};

/// Reconciled with the feed tables; no feed file fills them.
pub const SERVICE_TABLES: &[TableSpec] = &[USERS];

/// Every table the reconciler manages: loaded tables first, then service tables.
pub fn reconciled_tables() -> Vec<TableSpec> {
    [TABLES, SERVICE_TABLES].concat()
}

pub const ENUMS: &[EnumSpec] = &[
    EnumSpec {
        name: "role_enum",
        values: &["user", "admin", "super_admin"],
    },
    EnumSpec {
        name: "exception_type_enum",
        values: &["1", "2"],
    },
    EnumSpec {
        name: "route_type_enum",
        values: &["0", "1", "2", "3", "4", "5", "6", "7", "11", "12", "800", "900"],
    },
    EnumSpec {
        name: "wheelchair_accessible_enum",
        values: &["0", "1", "2"],
    },
    EnumSpec {
        name: "bikes_allowed_enum",
        values: &["0", "1", "2"],
    },
    EnumSpec {
        name: "location_type_enum",
        values: &["0", "1", "2", "3", "4"],
    },
    EnumSpec {
        name: "pickup_type_enum",
        values: &["0", "1", "2", "3"],
    },
    EnumSpec {
        name: "drop_off_type_enum",
        values: &["0", "1", "2", "3"],
    },
];

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_processing_order_is_topological() {
        for (position, table) in TABLES.iter().enumerate() {
            for parent in table.depends_on {
                let parent_position = TABLES
                    .iter()
                    .position(|t| t.name == *parent)
                    .unwrap_or_else(|| panic!("{} depends on unknown {parent}", table.name));
                assert!(
                    parent_position < position,
                    "{parent} must load before {}",
                    table.name
                );
            }
        }
    }

    #[test]
    fn test_order_matches_gtfs_convention() {
        let names: Vec<&str> = TABLES.iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            [
                "agency",
                "stops",
                "routes",
                "calendar",
                "calendar_dates",
                "shapes",
                "trips",
                "stop_times"
            ]
        );
    }

    #[test]
    fn test_primary_keys_are_declared_non_null_columns() {
        for table in TABLES {
            assert!(!table.primary_key.is_empty(), "{} has no key", table.name);
            for key in table.primary_key {
                let column = table
                    .column(key)
                    .unwrap_or_else(|| panic!("{}.{key} not declared", table.name));
                assert!(!column.nullable, "{}.{key} is nullable", table.name);
            }
        }
    }

    fn enum_of(ty: ColumnType) -> Option<&'static str> {
        match ty {
            ColumnType::Enum(name) | ColumnType::EnumArray(name) => Some(name),
            _ => None,
        }
    }

    #[test]
    fn test_primary_keys_of_service_tables() {
        for table in SERVICE_TABLES {
            assert!(table.file.is_empty());
            for key in table.primary_key {
                assert!(!table.column(key).unwrap().nullable, "{}.{key}", table.name);
            }
        }
    }

    #[test]
    fn test_enum_columns_reference_declared_types() {
        let declared: HashSet<&str> = ENUMS.iter().map(|e| e.name).collect();
        for table in reconciled_tables() {
            for column in table.columns {
                if let Some(name) = enum_of(column.ty) {
                    assert!(declared.contains(name), "{}.{} uses {name}", table.name, column.name);
                }
            }
        }
    }

    #[test]
    fn test_every_enum_type_is_used_by_a_column() {
        let used: HashSet<&str> = reconciled_tables()
            .iter()
            .flat_map(|t| t.columns.iter())
            .filter_map(|c| enum_of(c.ty))
            .collect();
        for spec in ENUMS {
            assert!(used.contains(spec.name), "{} is not used by any table", spec.name);
        }
    }

    #[test]
    fn test_service_tables_follow_feed_tables() {
        let names: Vec<&str> = reconciled_tables().iter().map(|t| t.name).collect();
        assert_eq!(names.len(), TABLES.len() + SERVICE_TABLES.len());
        assert_eq!(names.last(), Some(&"users"));
        assert!(TABLES.iter().all(|t| !t.file.is_empty()));
    }

    #[test]
    fn test_required_feed_fields_have_columns() {
        for table in TABLES {
            for field in crate::feed::rules::required_fields(table.file) {
                assert!(
                    table.column(field).is_some(),
                    "{} lacks column for required field {field}",
                    table.name
                );
            }
        }
    }

    #[test]
    fn test_sql_types() {
        assert_eq!(LAT.sql(), "NUMERIC(10,8)");
        assert_eq!(ColumnType::Enum("route_type_enum").sql(), "route_type_enum");
        assert!(ColumnType::Enum("route_type_enum").matches_live("USER-DEFINED", "route_type_enum"));
        assert!(!ColumnType::ShortText.matches_live("text", "text"));

        let roles = ColumnType::EnumArray("role_enum");
        assert_eq!(roles.sql(), "role_enum[]");
        assert!(roles.matches_live("ARRAY", "_role_enum"));
        assert!(!roles.matches_live("USER-DEFINED", "role_enum"));
        assert!(ColumnType::Timestamp.matches_live("timestamp without time zone", "timestamp"));
        assert!(ColumnType::Uuid.matches_live("uuid", "uuid"));
    }
}

//! Schema reconciliation
//!
//! The declared schema lives in [`catalog`]. A run inspects the live
//! database ([`inspect`]), plans the difference without touching it
//! ([`plan`], [`enums`]) and applies the plan in transactions
//! ([`reconcile`]).

pub mod catalog;
pub mod enums;
pub mod inspect;
pub mod plan;
pub mod reconcile;

pub use catalog::{
    reconciled_tables, ColumnSpec, ColumnType, EnumSpec, TableSpec, ENUMS, SERVICE_TABLES, TABLES,
};
pub use enums::{plan_enum, EnumMode};
pub use inspect::{ColumnState, TableState};
pub use plan::{plan_table, SchemaChange, TypeDrift};
pub use reconcile::{reconcile, ReconcileReport, Reconciler};

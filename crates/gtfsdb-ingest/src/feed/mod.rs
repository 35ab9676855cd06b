//! Feed files on disk
//!
//! - [`reader`]: directory listing and streaming record access
//! - [`rules`]: required files, required fields and content checks

pub mod reader;
pub mod rules;

pub use reader::{Feed, FeedFile, Record, Records};
pub use rules::{ContentRules, FieldRule};

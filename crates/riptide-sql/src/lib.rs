//! Statement compilation for Riptide.
//!
//! Lowers the declarative pipeline representation and topic descriptors
//! from `riptide-core` into the engine's query text. Compilation is
//! pure: the same inputs always produce the same statement, and every
//! unsupported construct fails here rather than at the engine.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod ddl;
pub mod interval;
pub mod select;
pub mod statement;

pub use ddl::{create_source, create_source_as, drop_source, insert, DerivedOptions};
pub use interval::{render_duration, render_window};
pub use select::{compile_select, render_expr};
pub use statement::{CompiledStatement, StatementKind};

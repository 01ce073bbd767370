//! Taskdeck storage crate - SQLite persistence for to-do records.
//!
//! Provides a WAL-mode SQLite database with migrations and the
//! `SqliteTodoStore` implementation of the core `TodoStore` trait.

pub mod db;
pub mod migrations;
pub mod repository;

pub use db::Database;
pub use repository::SqliteTodoStore;

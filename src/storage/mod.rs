//! SQLite persistence for the vendor bookkeeping kept per order.

pub mod db;
mod migrations;
pub mod plugin_meta;

pub use db::Db;
pub use plugin_meta::PluginMetaStore;

// Library root: SQLite storage, configuration and CSV bootstrap for the
// league core.

pub mod bootstrap;
pub mod config;
pub mod db;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::app::storage::DbConfig;

pub const DB_NAME: &str = "todo_list";
pub const DB_VERSION: u32 = 1;

// Command line options of the task list
#[derive(Parser, Debug)]
#[command(name = "todo_list", version, about = "Terminal task list backed by a local object store")]
pub struct Config {
    /// Path of the database file
    #[arg(long, default_value = "todo_list.db")]
    pub database: PathBuf,

    /// File that receives the log output (filter with RUST_LOG)
    #[arg(long, default_value = "todo_list.log")]
    pub log_file: PathBuf,

    /// Redraw interval of the terminal UI in milliseconds
    #[arg(long, default_value_t = 250)]
    pub tick_rate_ms: u64,
}

impl Config {
    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            name: DB_NAME.to_string(),
            path: self.database.clone(),
            version: DB_VERSION,
        }
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::parse_from(["todo_list"]);
        assert_eq!(config.database, PathBuf::from("todo_list.db"));
        assert_eq!(config.tick_rate(), Duration::from_millis(250));

        let db = config.db_config();
        assert_eq!(db.name, DB_NAME);
        assert_eq!(db.version, DB_VERSION);
    }

    #[test]
    fn test_overrides() {
        let config = Config::parse_from([
            "todo_list",
            "--database",
            "/tmp/other.db",
            "--tick-rate-ms",
            "100",
        ]);
        assert_eq!(config.db_config().path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.tick_rate(), Duration::from_millis(100));
    }
}

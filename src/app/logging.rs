use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::app::error::Result;

// The terminal belongs to the UI, so log lines are appended to a file instead.
// RUST_LOG picks the level, "info" by default.
pub fn init(log_file: &Path) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(log_file)?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();

    Ok(())
}

use chrono::Local;
use fern::Dispatch;
use log::{info, LevelFilter};
use std::fs;
use std::path::PathBuf;

/// Initialize logging to a daily file and to stdout.
/// Logs are written to <data_dir>/image-selector/logs/.
pub fn init_logging(level: LevelFilter) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let log_dir = get_log_directory()?;
    fs::create_dir_all(&log_dir)?;

    let log_file_path = log_dir.join(format!(
        "image-selector-{}.log",
        Local::now().format("%Y%m%d")
    ));

    let file_config = Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(LevelFilter::Warn)
        .level_for("image_selector", level)
        .chain(fern::log_file(&log_file_path)?);

    let stdout_config = Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                Local::now().format("%H:%M:%S"),
                record.level(),
                message
            ))
        })
        .level(LevelFilter::Warn)
        .level_for("image_selector", level)
        .chain(std::io::stdout());

    Dispatch::new()
        .chain(file_config)
        .chain(stdout_config)
        .apply()?;

    info!("Logging initialized. Log file: {}", log_file_path.display());
    Ok(log_file_path)
}

/// Get the log directory path
pub fn get_log_directory() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut path = dirs::data_dir()
        .or_else(dirs::home_dir)
        .ok_or("Could not determine user data directory")?;

    path.push("image-selector");
    path.push("logs");
    Ok(path)
}

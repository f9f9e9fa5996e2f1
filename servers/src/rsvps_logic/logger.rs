use anyhow::Result;
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber: stdout always, plus a log file when
/// `log_dir` is set. `RUST_LOG` overrides `log_level`.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// lifetime of the process.
pub fn setup_logging(log_dir: Option<&Path>, log_level: &str) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(log_level))?;

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
            }

            // Clean up old log files, keeping only the most recent one
            cleanup_old_logs(dir, 1)?;

            let log_file_name = format!(
                "server_rsvps_{}.log",
                chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
            );
            let appender = tracing_appender::rolling::never(dir, log_file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

/// Deletes `.log` files in `log_dir` except the `keep` newest ones.
fn cleanup_old_logs(log_dir: &Path, keep: usize) -> Result<()> {
    let mut entries: Vec<_> = fs::read_dir(log_dir)?
        .filter_map(|res| res.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "log"))
        .map(|e| {
            let modified = e.metadata().and_then(|m| m.modified()).ok();
            (modified, e.path())
        })
        .collect();

    // Sort by modification time, newest first
    entries.sort_by(|a, b| b.0.cmp(&a.0));

    for (_, path) in entries.iter().skip(keep) {
        if let Err(e) = fs::remove_file(path) {
            eprintln!("Failed to delete old log file {:?}: {}", path, e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_keeps_newest_logs_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.log", "b.log", "c.log", "notes.txt"] {
            fs::write(dir.path().join(name), name).unwrap();
        }

        cleanup_old_logs(dir.path(), 1).unwrap();

        let remaining: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.contains(&"notes.txt".to_string()));
        assert_eq!(remaining.iter().filter(|n| n.ends_with(".log")).count(), 1);
    }

    #[test]
    fn cleanup_of_empty_dir_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        cleanup_old_logs(dir.path(), 1).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

//! relocate - move files between a local tree and a mounted network share.
//!
//! Reads a YAML configuration (share, folders, direction), sets up logging to
//! the console and a log file, then relocates every configured folder once.

mod logging;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use engine::{
    config::DEFAULT_CONFIG_FILE, create_plan, run_plan, ConfigError, EngineError, FolderReport,
    FsShare, LogConfig, RelocateObserver, RelocateOutcome, RelocatePath, RelocationConfig,
    RunReport, TransferDirection,
};

/// Relocate files to or from a network share
#[derive(Parser, Debug)]
#[command(name = "relocate")]
#[command(version)]
#[command(about = "Move files between local folders and a mounted network share")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Print every file outcome on stderr
    #[arg(long)]
    verbose: bool,
}

/// Observer printing per-file lines (verbose) and the final summary on stderr.
struct CliProgress {
    verbose: bool,
    start_time: Instant,
}

impl CliProgress {
    fn new(verbose: bool) -> Self {
        CliProgress {
            verbose,
            start_time: Instant::now(),
        }
    }

    fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_idx = 0;

        while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
            size /= 1024.0;
            unit_idx += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_idx])
    }

    fn format_duration(elapsed: Duration) -> String {
        let secs = elapsed.as_secs();
        let mins = secs / 60;
        if mins > 0 {
            format!("{}m {}s", mins, secs % 60)
        } else {
            format!("{}.{:01}s", secs, elapsed.subsec_millis() / 100)
        }
    }
}

impl RelocateObserver for CliProgress {
    fn on_run_started(&self, direction: TransferDirection, folders: &[String]) {
        if self.verbose {
            eprintln!("{} {} folder(s): {}", direction, folders.len(), folders.join(", "));
        }
    }

    fn on_folder_started(&self, folder: &str) {
        if self.verbose {
            eprintln!("== {}", folder);
        }
    }

    fn on_file_started(&self, _path: &RelocatePath) {}

    fn on_file_progress(&self, _path: &RelocatePath, _bytes_copied: u64) {}

    fn on_file_completed(&self, path: &RelocatePath, outcome: &RelocateOutcome) {
        if !self.verbose {
            return;
        }
        let status = match outcome {
            RelocateOutcome::Relocated { bytes } => format!("Done ({})", Self::format_bytes(*bytes)),
            RelocateOutcome::SourceKept { .. } => "Copied, source kept".to_string(),
            RelocateOutcome::Failed(_) => "Failed".to_string(),
        };
        eprintln!("  {}: {}", status, path.local.display());
        if let Some(error) = outcome.error() {
            eprintln!("    {}", error);
        }
    }

    fn on_folder_completed(&self, report: &FolderReport) {
        if self.verbose {
            eprintln!(
                "   {} relocated, {} kept, {} failed, {} directories skipped",
                report.relocated, report.kept, report.failed, report.skipped_dirs
            );
        }
    }

    fn on_run_completed(&self, report: &RunReport) {
        eprintln!();
        eprintln!(
            "{} run {} started {}",
            report.direction,
            report.id,
            report
                .started_at
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
        );
        eprintln!(
            "Summary: {} relocated, {} copied but source kept, {} failed",
            report.relocated(),
            report.kept(),
            report.failed()
        );
        eprintln!("Bytes copied: {}", Self::format_bytes(report.bytes()));
        eprintln!("Elapsed: {}", Self::format_duration(self.start_time.elapsed()));

        let problems: Vec<_> = report
            .folders
            .iter()
            .flat_map(|f| f.problems.iter().map(move |p| (f.folder.as_str(), p)))
            .collect();
        if !problems.is_empty() {
            eprintln!();
            eprintln!("Problems:");
            for (folder, (name, message)) in problems {
                eprintln!("  {}/{}: {}", folder, name, message);
            }
        }
    }
}

fn main() {
    let args = Args::parse();

    let config = match RelocationConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            log_startup_error(&LogConfig::default(), &e);
            std::process::exit(2);
        }
    };

    let guard = match logging::init_logging(&config.log) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    };

    tracing::info!("-------------------------------START-----------------------------------");
    tracing::info!(config = %args.config.display(), direction = %config.direction, "Configuration loaded");

    let exit_code = match execute(&config, args.verbose) {
        Ok(_) => {
            tracing::info!("-------------------------------DONE-----------------------------------");
            0
        }
        Err(e) => {
            match e.downcast_ref::<EngineError>().and_then(EngineError::raw_os_error) {
                Some(code) => tracing::error!(os_error = code, "Relocation aborted: {:#}", e),
                None => tracing::error!("Relocation aborted: {:#}", e),
            }
            2
        }
    };

    // process::exit skips destructors; flush the log file first
    drop(guard);
    std::process::exit(exit_code);
}

/// Report an error raised before the configured log file is known.
///
/// Falls back to the default log file; stderr only if that cannot be opened.
fn log_startup_error(log: &LogConfig, error: &ConfigError) {
    match logging::init_logging(log) {
        Ok(guard) => {
            tracing::error!("Cannot load configuration: {}", error);
            drop(guard);
        }
        Err(_) => eprintln!("Error: {}", error),
    }
}

/// Connect, plan and run - separated from `main` for testability
fn execute(config: &RelocationConfig, verbose: bool) -> Result<RunReport> {
    let remote = FsShare::connect(&config.samba).context("Share is not reachable")?;
    let local = FsShare::local(&config.local_root);

    let plan = create_plan(config.direction, config.folders.clone(), config.options())?;
    let progress = CliProgress::new(verbose);

    let report = run_plan(&plan, &local, &remote, Some(&progress))?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct Setup {
        _temp: TempDir,
        local: PathBuf,
        remote: PathBuf,
        config_path: PathBuf,
    }

    fn setup(direction: &str, extra: &str) -> Setup {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let local = temp.path().join("local");
        let remote = temp.path().join("remote");
        fs::create_dir(&local).expect("Failed to create local");
        fs::create_dir(&remote).expect("Failed to create remote");

        let config_path = temp.path().join("config.yml");
        let yaml = format!(
            "samba:\n  host: nas\n  user: svc\n  password: pw\n  share: exchange\n  mount_point: '{}'\n\
             folders: [reports]\ndirection: {}\nlocal_root: '{}'\n{}",
            remote.display(),
            direction,
            local.display(),
            extra
        );
        fs::write(&config_path, yaml).expect("Failed to write config");

        Setup {
            _temp: temp,
            local,
            remote,
            config_path,
        }
    }

    fn put(root: &Path, name: &str, content: &[u8]) {
        let dir = root.join("reports");
        fs::create_dir_all(&dir).expect("Failed to create folder");
        fs::write(dir.join(name), content).expect("Failed to write file");
    }

    #[test]
    fn test_execute_upload() {
        let setup = setup("PUT_FILE", "");
        put(&setup.local, "a.txt", b"hello");

        let config = RelocationConfig::load(&setup.config_path).expect("load config");
        let report = execute(&config, false).expect("upload should succeed");

        assert_eq!(report.relocated(), 1);
        assert!(!setup.local.join("reports/a.txt").exists());
        assert_eq!(fs::read(setup.remote.join("reports/a.txt")).expect("remote"), b"hello");
    }

    #[test]
    fn test_execute_download_with_verification() {
        let setup = setup("GET_FILE", "verify: sha256\n");
        put(&setup.remote, "c.csv", b"1,2,3");

        let config = RelocationConfig::load(&setup.config_path).expect("load config");
        let report = execute(&config, true).expect("download should succeed");

        assert_eq!(report.relocated(), 1);
        assert!(!setup.remote.join("reports/c.csv").exists());
        assert_eq!(fs::read(setup.local.join("reports/c.csv")).expect("local"), b"1,2,3");
    }

    #[test]
    fn test_execute_fails_when_share_is_not_mounted() {
        let setup = setup("PUT_FILE", "");
        fs::remove_dir(&setup.remote).expect("Failed to remove remote");

        let config = RelocationConfig::load(&setup.config_path).expect("load config");
        assert!(execute(&config, false).is_err());
    }

    #[test]
    fn test_execute_fails_when_folder_is_missing() {
        let setup = setup("PUT_FILE", "");

        let config = RelocationConfig::load(&setup.config_path).expect("load config");
        let err = execute(&config, false).expect_err("missing local folder is fatal");
        assert!(err.to_string().contains("reports"), "unexpected error: {:#}", err);
    }

    #[test]
    fn test_config_error_reaches_log_file() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let log = LogConfig {
            file: temp.path().join("logs/app.log"),
            level: "info".to_string(),
        };
        let missing = temp.path().join("missing.yml");
        let error = RelocationConfig::load(&missing).expect_err("config is missing");

        log_startup_error(&log, &error);

        let content = fs::read_to_string(&log.file).expect("log file written");
        assert!(content.contains("Cannot load configuration"), "log was: {}", content);
        assert!(content.contains("missing.yml"));
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(CliProgress::format_bytes(512), "512.00 B");
        assert_eq!(CliProgress::format_bytes(2048), "2.00 KB");
        assert_eq!(CliProgress::format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(CliProgress::format_duration(Duration::from_millis(1500)), "1.5s");
    }

    #[test]
    fn test_args_default_config_path() {
        let args = Args::parse_from(["relocate"]);
        assert_eq!(args.config, PathBuf::from("config.yml"));
        assert!(!args.verbose);
    }
}

//! Logging bootstrap for gateway services
//!
//! Console output plus a daily rolling log file per service. Events with the
//! [`WIRE_TARGET`] target (raw datagrams) go to a separate wire log file.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::{Mutex, MutexGuard};
use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    filter,
    fmt::{
        self,
        format::{FmtSpan, Writer},
        FmtContext, FormatEvent, FormatFields, MakeWriter,
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    reload,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Tracing target for raw wire traffic
pub const WIRE_TARGET: &str = "wire";

/// Environment variable overriding the log root directory
pub const LOG_DIR_ENV: &str = "WIFFI_LOG_DIR";

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

/// Event formatter that outputs: `timestamp [LEVEL] message`
///
/// Example output: `2026-10-19T08:15:02.114203Z [INFO] Listening on 0.0.0.0:8189`
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m",
                Level::DEBUG => "\x1b[34m",
                Level::INFO => "\x1b[32m",
                Level::WARN => "\x1b[33m",
                Level::ERROR => "\x1b[31m",
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

// Worker guards must outlive the subscriber or buffered lines are lost
static GUARDS: OnceLock<Mutex<Vec<WorkerGuard>>> = OnceLock::new();

// ============================================================================
// Log Root Directory Configuration
// ============================================================================

/// Global log root directory (initialized once from env or config)
static LOG_ROOT: OnceLock<PathBuf> = OnceLock::new();

/// Initialize log root directory
///
/// Priority:
/// 1. `WIFFI_LOG_DIR` environment variable
/// 2. `config_dir` parameter
/// 3. `logs`
pub fn init_log_root(config_dir: Option<&str>) {
    LOG_ROOT.get_or_init(|| resolve_log_root(config_dir));
}

fn resolve_log_root(config_dir: Option<&str>) -> PathBuf {
    std::env::var(LOG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            config_dir
                .filter(|d| !d.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("logs"))
        })
}

/// Get log root directory
///
/// Falls back to the environment or `logs` if `init_log_root` was not called.
pub fn get_log_root() -> PathBuf {
    LOG_ROOT
        .get()
        .cloned()
        .unwrap_or_else(|| resolve_log_root(None))
}

/// Default max file size: 100MB
const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Daily rolling file writer
///
/// File names are `{YYYYMMDD}_{stem}.log`; within a day the file is rotated
/// to `{YYYYMMDD}_{stem}.{n}.log` once it exceeds `max_file_size`.
#[derive(Clone)]
struct DailyRollingWriter {
    stem: String,
    log_dir: PathBuf,
    current_date: Arc<Mutex<String>>,
    current_file: Arc<Mutex<Option<File>>>,
    current_size: Arc<AtomicU64>,
    max_file_size: u64,
    rotation_count: Arc<AtomicU32>,
}

impl DailyRollingWriter {
    fn new(stem: String, log_dir: PathBuf) -> std::io::Result<Self> {
        Self::with_max_size(stem, log_dir, DEFAULT_MAX_FILE_SIZE)
    }

    fn with_max_size(stem: String, log_dir: PathBuf, max_file_size: u64) -> std::io::Result<Self> {
        let current_date = today();
        fs::create_dir_all(&log_dir)?;

        let file = open_append(&log_dir.join(daily_file_name(&current_date, &stem)))?;
        let initial_size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            stem,
            log_dir,
            current_date: Arc::new(Mutex::new(current_date)),
            current_file: Arc::new(Mutex::new(Some(file))),
            current_size: Arc::new(AtomicU64::new(initial_size)),
            max_file_size,
            rotation_count: Arc::new(AtomicU32::new(0)),
        })
    }

    fn rotate_by_size(&self) -> std::io::Result<()> {
        let current_date = self.current_date.lock();
        let count = self.rotation_count.fetch_add(1, Ordering::SeqCst) + 1;

        let new_file_path = self
            .log_dir
            .join(format!("{}_{}.{}.log", *current_date, self.stem, count));
        let new_file = open_append(&new_file_path)?;

        self.current_size.store(0, Ordering::SeqCst);
        *self.current_file.lock() = Some(new_file);
        Ok(())
    }

    fn get_writer(&self) -> std::io::Result<MutexGuard<'_, Option<File>>> {
        let today = today();
        let mut current_date = self.current_date.lock();

        let current_path = self
            .log_dir
            .join(daily_file_name(&current_date, &self.stem));
        let file_deleted = !current_path.exists();

        if *current_date != today || file_deleted {
            if *current_date != today {
                *current_date = today;
                self.rotation_count.store(0, Ordering::SeqCst);
            }

            fs::create_dir_all(&self.log_dir)?;
            let new_file = open_append(
                &self
                    .log_dir
                    .join(daily_file_name(&current_date, &self.stem)),
            )?;
            let initial_size = new_file.metadata().map(|m| m.len()).unwrap_or(0);
            self.current_size.store(initial_size, Ordering::SeqCst);
            *self.current_file.lock() = Some(new_file);
        }

        Ok(self.current_file.lock())
    }
}

impl Write for DailyRollingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let current_size = self.current_size.load(Ordering::Relaxed);
        if current_size + buf.len() as u64 > self.max_file_size {
            self.rotate_by_size()?;
        }

        if let Some(ref mut file) = *self.get_writer()? {
            let written = file.write(buf)?;
            self.current_size
                .fetch_add(written as u64, Ordering::Relaxed);
            Ok(written)
        } else {
            Ok(0)
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if let Some(ref mut file) = *self.get_writer()? {
            file.flush()
        } else {
            Ok(())
        }
    }
}

fn today() -> String {
    chrono::Local::now().format("%Y%m%d").to_string()
}

fn daily_file_name(date: &str, stem: &str) -> String {
    format!("{}_{}.log", date, stem)
}

fn open_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Writer whose target can be swapped after the subscriber is installed
#[derive(Clone)]
struct ReloadableWriter {
    inner: Arc<Mutex<Option<NonBlocking>>>,
}

impl ReloadableWriter {
    fn new(writer: NonBlocking) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(writer))),
        }
    }

    fn reload(&self, new_writer: NonBlocking) {
        *self.inner.lock() = Some(new_writer);
    }
}

impl Write for ReloadableWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match *self.inner.lock() {
            Some(ref mut writer) => writer.write(buf),
            None => Ok(0),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match *self.inner.lock() {
            Some(ref mut writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl MakeWriter<'_> for ReloadableWriter {
    type Writer = Self;

    fn make_writer(&'_ self) -> Self::Writer {
        self.clone()
    }
}

// Files owned by the running subscriber, kept for reopen
struct OpenLog {
    stem: String,
    writer: ReloadableWriter,
}

struct LogRuntime {
    log_dir: PathBuf,
    files: Vec<OpenLog>,
}

static LOG_RUNTIME: OnceLock<Mutex<LogRuntime>> = OnceLock::new();

// Dynamic log level reload support
type EnvFilterReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;
static LOG_FILTER_HANDLE: OnceLock<EnvFilterReloadHandle> = OnceLock::new();
static CURRENT_LOG_LEVEL: OnceLock<Mutex<String>> = OnceLock::new();

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Service name (e.g., "wiffisrv")
    pub service_name: String,
    /// Directory for this service's log files
    pub log_dir: PathBuf,
    /// Base log level when `RUST_LOG` is not set
    pub console_level: Level,
    /// Enable JSON format for the service log file
    pub enable_json: bool,
    /// Colored console output
    pub ansi: bool,
    /// Write wire traffic to `{YYYYMMDD}_{service}_wire.log`
    pub enable_wire_log: bool,
    /// Level for the wire target
    pub wire_log_level: Level,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".to_string(),
            log_dir: get_log_root(),
            console_level: Level::INFO,
            enable_json: false,
            ansi: true,
            enable_wire_log: true,
            wire_log_level: Level::DEBUG,
        }
    }
}

impl LogConfig {
    /// Filter directive used when `RUST_LOG` is absent
    pub fn default_filter(&self) -> String {
        let wire_level = if self.enable_wire_log {
            self.wire_log_level.as_str().to_lowercase()
        } else {
            "off".to_string()
        };
        format!(
            "{},{}={}",
            self.console_level.as_str().to_lowercase(),
            WIRE_TARGET,
            wire_level
        )
    }
}

fn file_writer(stem: String, log_dir: PathBuf) -> std::io::Result<ReloadableWriter> {
    let (non_blocking, guard) = tracing_appender::non_blocking(DailyRollingWriter::new(stem, log_dir)?);
    GUARDS.get_or_init(|| Mutex::new(Vec::new())).lock().push(guard);
    Ok(ReloadableWriter::new(non_blocking))
}

/// Initialize logging system with configuration
pub fn init_with_config(config: LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all(&config.log_dir)?;

    // RUST_LOG wins; the wire target keeps its own level unless named there
    let filter_str = match std::env::var("RUST_LOG") {
        Ok(env_str) if env_str.contains(WIRE_TARGET) => env_str,
        Ok(env_str) => {
            let wire_level = if !config.enable_wire_log {
                "off"
            } else if env_str.contains("debug") || env_str.contains("trace") {
                "debug"
            } else {
                config.wire_log_level.as_str()
            };
            format!("{},{}={}", env_str, WIRE_TARGET, wire_level.to_lowercase())
        },
        Err(_) => config.default_filter(),
    };
    let env_filter = EnvFilter::try_new(&filter_str)?;

    let (reload_filter, reload_handle) = reload::Layer::new(env_filter);
    let _ = LOG_FILTER_HANDLE.set(reload_handle);
    let _ = CURRENT_LOG_LEVEL.set(Mutex::new(filter_str));

    let registry = tracing_subscriber::registry().with(reload_filter);

    // Wire traffic only reaches the console at debug verbosity
    let console_wire = config.console_level >= Level::DEBUG;
    let console_layer = fmt::layer()
        .with_ansi(config.ansi)
        .event_format(BracketedLevelFormat)
        .with_filter(filter::filter_fn(move |metadata| {
            console_wire || metadata.target() != WIRE_TARGET
        }))
        .boxed();

    let service_writer = file_writer(config.service_name.clone(), config.log_dir.clone())?;
    let mut files = vec![OpenLog {
        stem: config.service_name.clone(),
        writer: service_writer.clone(),
    }];

    let service_file_layer = if config.enable_json {
        fmt::layer()
            .json()
            .with_writer(service_writer)
            .with_level(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(filter::filter_fn(|metadata| {
                metadata.target() != WIRE_TARGET
            }))
            .boxed()
    } else {
        fmt::layer()
            .with_writer(service_writer)
            .with_ansi(false)
            .event_format(BracketedLevelFormat)
            .with_filter(filter::filter_fn(|metadata| {
                metadata.target() != WIRE_TARGET
            }))
            .boxed()
    };

    let wire_file_layer = if config.enable_wire_log {
        let stem = format!("{}_wire", config.service_name);
        let wire_writer = file_writer(stem.clone(), config.log_dir.clone())?;
        files.push(OpenLog {
            stem,
            writer: wire_writer.clone(),
        });
        Some(
            fmt::layer()
                .with_writer(wire_writer)
                .with_ansi(false)
                .event_format(BracketedLevelFormat)
                .with_filter(filter::filter_fn(|metadata| {
                    metadata.target() == WIRE_TARGET
                }))
                .boxed(),
        )
    } else {
        None
    };

    registry
        .with(console_layer)
        .with(service_file_layer)
        .with(wire_file_layer)
        .try_init()?;

    let runtime = LogRuntime {
        log_dir: config.log_dir.clone(),
        files,
    };
    let slot = LOG_RUNTIME.get_or_init(|| {
        Mutex::new(LogRuntime {
            log_dir: PathBuf::new(),
            files: Vec::new(),
        })
    });
    *slot.lock() = runtime;

    tracing::info!("Logging: {} @ {:?}", config.service_name, config.log_dir);

    start_log_compression_task(config.log_dir, config.service_name);

    Ok(())
}

/// Reopen log file writers (e.g., after logrotate moved the files)
pub fn reopen_logs_now() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = LOG_RUNTIME
        .get()
        .ok_or("logging not initialized (runtime config missing)")?
        .lock();

    fs::create_dir_all(&runtime.log_dir)?;

    let mut new_guards = Vec::with_capacity(runtime.files.len());
    for open in &runtime.files {
        let writer = DailyRollingWriter::new(open.stem.clone(), runtime.log_dir.clone())?;
        let (non_blocking, guard) = tracing_appender::non_blocking(writer);
        open.writer.reload(non_blocking);
        new_guards.push(guard);
    }

    // Dropping the old guards flushes and closes the moved files
    if let Some(guards) = GUARDS.get() {
        *guards.lock() = new_guards;
    }

    tracing::debug!("Log reopened");
    Ok(())
}

/// Install SIGHUP listener to reopen logs on demand (Unix only)
pub fn enable_sighup_log_reopen() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        tokio::spawn(async move {
            match signal(SignalKind::hangup()) {
                Ok(mut hup) => loop {
                    hup.recv().await;
                    if let Err(e) = reopen_logs_now() {
                        tracing::warn!("SIGHUP reopen: {}", e);
                    }
                },
                Err(e) => tracing::warn!("SIGHUP handler: {}", e),
            }
        });
    }
}

/// Dynamically set log filter level at runtime
///
/// Accepts a level (`debug`) or a full filter spec (`info,wiffisrv=debug`).
pub fn set_log_level(level: &str) -> Result<(), String> {
    let handle = LOG_FILTER_HANDLE
        .get()
        .ok_or("Logging not initialized with reload support")?;

    let new_filter =
        EnvFilter::try_new(level).map_err(|e| format!("Invalid log level '{}': {}", level, e))?;

    handle
        .reload(new_filter)
        .map_err(|e| format!("Failed to reload log filter: {}", e))?;

    if let Some(current) = CURRENT_LOG_LEVEL.get() {
        *current.lock() = level.to_string();
    }

    tracing::info!("Log level changed to: {}", level);
    Ok(())
}

/// Get current log filter level
pub fn get_log_level() -> String {
    CURRENT_LOG_LEVEL
        .get()
        .map(|m| m.lock().clone())
        .unwrap_or_else(|| "unknown".to_string())
}

// ==================== Log Compression Support ====================

use tokio::time::{interval, Duration};

/// Start background log compression task
pub fn start_log_compression_task(log_dir: PathBuf, service_name: String) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(60)).await;

        let mut interval = interval(Duration::from_secs(86400));

        loop {
            interval.tick().await;
            if let Err(e) = compress_old_logs(&log_dir, &service_name).await {
                tracing::error!("Log compression error for {}: {}", service_name, e);
            }
        }
    });
}

/// Whether `file_name` is an uncompressed log of `service_name`
fn is_service_log(file_name: &str, service_name: &str) -> bool {
    file_name.ends_with(".log")
        && (file_name.contains(&format!("_{}.", service_name))
            || file_name.contains(&format!("_{}_wire.", service_name)))
}

/// Compress log files older than 7 days, delete compressed logs older than 365 days
async fn compress_old_logs(
    log_dir: &Path,
    service_name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    use std::time::SystemTime;

    let mut entries = tokio::fs::read_dir(log_dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let file_name = match path.file_name() {
            Some(name) => name.to_string_lossy().to_string(),
            None => continue,
        };

        let compressed = file_name.ends_with(".log.gz");
        if !compressed && !is_service_log(&file_name, service_name) {
            continue;
        }

        let metadata = tokio::fs::metadata(&path).await?;
        let age = SystemTime::now().duration_since(metadata.modified()?)?;

        if !compressed {
            if age > Duration::from_secs(7 * 86400) {
                compress_file(&path).await?;
                tokio::fs::remove_file(&path).await?;
                tracing::debug!("Compressed: {}", file_name);
            }
        } else if age > Duration::from_secs(365 * 86400) {
            tokio::fs::remove_file(&path).await?;
            tracing::debug!("Deleted: {}", file_name);
        }
    }

    Ok(())
}

/// Compress a single file to `<path>.gz`
async fn compress_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let buffer = tokio::fs::read(path).await?;

    let output_path = format!("{}.gz", path.display());
    let output = File::create(&output_path)?;
    let mut encoder = GzEncoder::new(output, Compression::best());
    encoder.write_all(&buffer)?;
    encoder.finish()?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_default_filter() {
        let config = LogConfig {
            console_level: Level::WARN,
            ..Default::default()
        };
        assert_eq!(config.default_filter(), "warn,wire=debug");

        let config = LogConfig {
            enable_wire_log: false,
            ..Default::default()
        };
        assert_eq!(config.default_filter(), "info,wire=off");
    }

    #[test]
    fn test_is_service_log() {
        assert!(is_service_log("20261019_wiffisrv.log", "wiffisrv"));
        assert!(is_service_log("20261019_wiffisrv.2.log", "wiffisrv"));
        assert!(is_service_log("20261019_wiffisrv_wire.log", "wiffisrv"));
        assert!(!is_service_log("20261019_other.log", "wiffisrv"));
        assert!(!is_service_log("20261019_wiffisrv.log.gz", "wiffisrv"));
    }

    #[test]
    fn test_daily_writer_rotates_by_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer =
            DailyRollingWriter::with_max_size("svc".to_string(), dir.path().to_path_buf(), 16)
                .unwrap();

        writer.write_all(b"0123456789\n").unwrap();
        writer.write_all(b"0123456789\n").unwrap();
        writer.flush().unwrap();

        let date = today();
        assert!(dir.path().join(daily_file_name(&date, "svc")).exists());
        assert!(dir.path().join(format!("{}_svc.1.log", date)).exists());
    }

    #[test]
    fn test_daily_writer_recreates_deleted_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer =
            DailyRollingWriter::new("svc".to_string(), dir.path().to_path_buf()).unwrap();
        let path = dir.path().join(daily_file_name(&today(), "svc"));

        fs::remove_file(&path).unwrap();
        writer.write_all(b"after delete\n").unwrap();
        writer.flush().unwrap();

        let mut content = String::new();
        File::open(&path)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "after delete\n");
    }

    #[tokio::test]
    async fn test_compress_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("20200101_wiffisrv.log");
        fs::write(&path, "line\n".repeat(100)).unwrap();

        compress_file(&path).await.unwrap();

        let gz = dir.path().join("20200101_wiffisrv.log.gz");
        let mut decoder = flate2::read::GzDecoder::new(File::open(gz).unwrap());
        let mut out = String::new();
        decoder.read_to_string(&mut out).unwrap();
        assert_eq!(out, "line\n".repeat(100));
    }
}

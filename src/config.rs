use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use serde::Deserialize;

use crate::leaderboard::manager::{DEFAULT_DOCUMENT_KEY, DEFAULT_MAX_SCORES};
use crate::leaderboard::{ManagerOptions, MutationPolicy};
use crate::store::StoreKind;
use crate::util::dates;
use crate::{fmt, Error};

const CONFIG_FILE_NAME: &str = "topscores.toml";
const CONFIG_PATH_VAR: &str = "TOPSCORES_CONFIG";

#[derive(Debug, Deserialize, Clone)]
struct FileConfig {
    #[serde(default)]
    pub store: StoreKind,
    pub database_path: String,
    #[serde(default = "default_document_key")]
    pub document_key: String,
    #[serde(default = "default_max_scores")]
    pub max_scores: usize,
    #[serde(default)]
    pub mutation_policy: MutationPolicy,
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    #[serde(default = "default_read_retry_ms")]
    pub read_retry_ms: u64,
    pub log: FileLogConfig,
}

#[derive(Debug, Deserialize, Clone)]
struct FileLogConfig {
    pub level: String,
    pub path: String,
    pub json_path: String,
}

fn default_document_key() -> String {
    DEFAULT_DOCUMENT_KEY.to_string()
}

fn default_max_scores() -> usize {
    DEFAULT_MAX_SCORES
}

fn default_store_timeout_ms() -> u64 {
    5_000
}

fn default_read_retry_ms() -> u64 {
    1_000
}

#[derive(Clone, Debug)]
pub struct LogConfig {
    pub level: String,
    pub path: PathBuf,
    pub json_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub store: StoreKind,
    pub database_path: PathBuf,
    pub document_key: String,
    pub max_scores: usize,
    pub mutation_policy: MutationPolicy,
    pub store_timeout: Duration,
    pub read_retry: Duration,
    pub log: LogConfig,
}

impl AppConfig {
    pub fn manager_options(&self) -> ManagerOptions {
        ManagerOptions {
            document_key: self.document_key.clone(),
            max_scores: self.max_scores,
            mutation_policy: self.mutation_policy,
            store_timeout: self.store_timeout,
            read_retry: self.read_retry,
        }
    }
}

fn expand_tilde(path: &str) -> Result<PathBuf, Error> {
    if path.starts_with("~/") {
        let home = env::var("HOME")?;
        Ok(PathBuf::from(path.replacen("~", &home, 1)))
    } else {
        Ok(PathBuf::from(path))
    }
}

/// Reads `$TOPSCORES_CONFIG`, or `topscores.toml` next to the executable.
pub fn load_config() -> Result<AppConfig, Error> {
    let config_path = match env::var_os(CONFIG_PATH_VAR) {
        Some(path) => PathBuf::from(path),
        None => {
            let exe_path = env::current_exe()?;
            match exe_path.parent() {
                Some(dir) => dir.join(CONFIG_FILE_NAME),
                _ => return Err("failed to determine executable directory".into()),
            }
        }
    };

    if !config_path.exists() || !config_path.is_file() {
        return Err(fmt!(
            "Config file does not exist or is not a file: {}",
            config_path.display()
        )
        .into());
    }
    let s = fs::read_to_string(&config_path)?;
    parse_config(&s)
}

pub fn parse_config(s: &str) -> Result<AppConfig, Error> {
    let cfg: FileConfig = toml::from_str(s)?;

    let database_path = expand_tilde(&cfg.database_path)?;
    if cfg.store == StoreKind::Sqlite {
        check_file_path(&database_path, &cfg.database_path, "Database")?;
    }

    let document_key = cfg.document_key.trim().to_string();
    if document_key.is_empty() {
        return Err("document_key must not be empty".into());
    }
    if cfg.store_timeout_ms == 0 {
        return Err("store_timeout_ms must be greater than zero".into());
    }
    if cfg.read_retry_ms == 0 {
        return Err("read_retry_ms must be greater than zero".into());
    }

    Ok(AppConfig {
        store: cfg.store,
        database_path,
        document_key,
        max_scores: cfg.max_scores,
        mutation_policy: cfg.mutation_policy,
        store_timeout: Duration::from_millis(cfg.store_timeout_ms),
        read_retry: Duration::from_millis(cfg.read_retry_ms),
        log: build_log_config(cfg.log)?,
    })
}

fn build_log_config(file_log: FileLogConfig) -> Result<LogConfig, Error> {
    let path = log_file_replacements(&file_log.path)?;
    check_file_path(&path, &file_log.path, "Log")?;

    let json_path = log_file_replacements(&file_log.json_path)?;
    check_file_path(&json_path, &file_log.json_path, "Log")?;

    Ok(LogConfig {
        level: file_log.level,
        path,
        json_path,
    })
}

/// The parent directory must exist; the file itself is created on demand.
fn check_file_path(path: &Path, cfg_path: &str, kind: &str) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(fmt!("{kind} file directory does not exist: {}", parent.display()).into());
        }
    }
    if path.exists() && !path.is_file() {
        return Err(fmt!("{kind} path exists but is not a file: {cfg_path}").into());
    }
    Ok(())
}

fn log_file_replacements(cfg_path: &str) -> Result<PathBuf, Error> {
    let date_str = dates::local_date_yyyy_mm_dd();
    let replaced = cfg_path.replace("{DATE}", &date_str);
    expand_tilde(&replaced)
}

use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::workflows::admissions::domain::AcademicYear;
use crate::workflows::admissions::intake::UploadPolicy;
use crate::workflows::admissions::service::LifecycleSettings;

const DEFAULT_ACADEMIC_YEAR: &str = "2024-25";
const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;
const DEFAULT_MAX_UPLOAD_FILES: usize = 5;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the admissions service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub admissions: AdmissionsConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                ansi: environment == AppEnvironment::Development,
            },
            admissions: AdmissionsConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub ansi: bool,
}

/// Storage locations and intake limits for the admission lifecycle.
#[derive(Debug, Clone)]
pub struct AdmissionsConfig {
    pub academic_year: AcademicYear,
    /// SQLite database file; the in-memory store is used when unset.
    pub database_path: Option<PathBuf>,
    pub upload_dir: PathBuf,
    /// CSV cutoff table replacing the built-in seed.
    pub cutoffs_csv: Option<PathBuf>,
    pub max_upload_bytes: u64,
    pub max_upload_files: usize,
}

impl AdmissionsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw_year =
            env::var("APP_ACADEMIC_YEAR").unwrap_or_else(|_| DEFAULT_ACADEMIC_YEAR.to_string());
        let academic_year = AcademicYear::parse(&raw_year)
            .ok_or(ConfigError::InvalidAcademicYear { value: raw_year })?;

        let max_upload_bytes = match env::var("APP_MAX_UPLOAD_BYTES") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|value| *value > 0)
                .ok_or(ConfigError::InvalidUploadLimit {
                    variable: "APP_MAX_UPLOAD_BYTES",
                })?,
            Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let max_upload_files = match env::var("APP_MAX_UPLOAD_FILES") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|value| *value > 0)
                .ok_or(ConfigError::InvalidUploadLimit {
                    variable: "APP_MAX_UPLOAD_FILES",
                })?,
            Err(_) => DEFAULT_MAX_UPLOAD_FILES,
        };

        Ok(Self {
            academic_year,
            database_path: non_empty_path("APP_DATABASE_PATH"),
            upload_dir: non_empty_path("APP_UPLOAD_DIR")
                .unwrap_or_else(|| PathBuf::from("uploads")),
            cutoffs_csv: non_empty_path("APP_CUTOFFS_CSV"),
            max_upload_bytes,
            max_upload_files,
        })
    }

    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy::new(self.max_upload_bytes, self.max_upload_files)
    }

    pub fn lifecycle_settings(&self) -> LifecycleSettings {
        LifecycleSettings {
            academic_year: self.academic_year.clone(),
            upload_policy: self.upload_policy(),
        }
    }

    /// Upper bound for a single multipart request body.
    pub fn request_body_limit(&self) -> usize {
        self.upload_policy().request_body_limit()
    }
}

impl Default for AdmissionsConfig {
    fn default() -> Self {
        Self {
            academic_year: AcademicYear::default(),
            database_path: None,
            upload_dir: PathBuf::from("uploads"),
            cutoffs_csv: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_upload_files: DEFAULT_MAX_UPLOAD_FILES,
        }
    }
}

fn non_empty_path(variable: &str) -> Option<PathBuf> {
    env::var(variable)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidAcademicYear { value: String },
    InvalidUploadLimit { variable: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidAcademicYear { value } => write!(
                f,
                "APP_ACADEMIC_YEAR must look like 2024-25 (found '{value}')"
            ),
            ConfigError::InvalidUploadLimit { variable } => {
                write!(f, "{variable} must be a positive integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidAcademicYear { .. }
            | ConfigError::InvalidUploadLimit { .. } => None,
        }
    }
}

use crate::services::s3_store::S3Settings;
use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand, ValueEnum};
use std::{env, path::PathBuf};
use url::Url;

const DEFAULT_API_PORT: u16 = 3000;
const DEFAULT_WORKER_PORT: u16 = 3001;
const DEFAULT_MAX_BODY_MB: usize = 20;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub max_body_bytes: usize,
    /// Bucket receiving original uploads; its creation events drive the worker.
    pub source_bucket: String,
    /// Bucket receiving derived variants.
    pub destination_bucket: String,
    pub backend: BackendConfig,
    pub sorted_hsv: bool,
}

#[derive(Clone)]
pub enum BackendConfig {
    S3(S3Settings),
    Local {
        storage_dir: PathBuf,
        public_url: Url,
        signing_secret: String,
    },
}

// Keeps secrets out of the startup log line.
impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::S3(s3) => f
                .debug_struct("S3")
                .field("region", &s3.region)
                .field("endpoint", &s3.endpoint)
                .finish_non_exhaustive(),
            Self::Local {
                storage_dir,
                public_url,
                ..
            } => f
                .debug_struct("Local")
                .field("storage_dir", storage_dir)
                .field("public_url", &public_url.as_str())
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    S3,
    Local,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Image upload API and channel-splitting worker")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Host to bind to (overrides PHOTO_SPLITTER_HOST)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Port to bind to (overrides PHOTO_SPLITTER_PORT)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Storage backend (overrides PHOTO_SPLITTER_BACKEND)
    #[arg(long, global = true, value_enum)]
    pub backend: Option<BackendKind>,

    /// Root directory of the local backend (overrides PHOTO_SPLITTER_STORAGE_DIR)
    #[arg(long, global = true)]
    pub storage_dir: Option<PathBuf>,

    /// Also produce the sorted hue/saturation/brightness variants
    #[arg(long, global = true)]
    pub sorted_hsv: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Serve the upload/retrieve HTTP API
    Api,
    /// Serve the event endpoint that runs the transform worker
    Worker,
    /// Run the worker once on an event read from a file or stdin
    Process {
        /// Path of the event JSON; stdin when omitted
        #[arg(long)]
        event: Option<PathBuf>,
    },
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the command to run.
    pub fn from_env_and_args() -> Result<(Self, Command)> {
        let args = Args::parse();
        let cfg = Self::resolve(&args, |name: &str| env::var(name).ok())?;
        Ok((cfg, args.command))
    }

    /// Merge `args` over values looked up through `var`.
    ///
    /// Fails when a variable required by the selected backend is absent.
    pub fn resolve(args: &Args, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |name: &str| -> Result<String> {
            var(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("missing required environment variable {}", name))
        };

        // --- Environment fallback ---
        let env_host = var("PHOTO_SPLITTER_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let env_port = match var("PHOTO_SPLITTER_PORT") {
            Some(value) => Some(
                value
                    .parse::<u16>()
                    .with_context(|| format!("parsing PHOTO_SPLITTER_PORT value `{}`", value))?,
            ),
            None => None,
        };
        let default_port = match args.command {
            Command::Worker => DEFAULT_WORKER_PORT,
            _ => DEFAULT_API_PORT,
        };
        let max_body_mb = match var("PHOTO_SPLITTER_MAX_BODY_MB") {
            Some(value) => value
                .parse::<usize>()
                .with_context(|| format!("parsing PHOTO_SPLITTER_MAX_BODY_MB value `{}`", value))?,
            None => DEFAULT_MAX_BODY_MB,
        };
        let env_sorted_hsv = match var("PHOTO_SPLITTER_SORTED_HSV") {
            Some(value) => parse_flag(&value)
                .with_context(|| format!("parsing PHOTO_SPLITTER_SORTED_HSV value `{}`", value))?,
            None => false,
        };
        let env_backend = match var("PHOTO_SPLITTER_BACKEND").as_deref() {
            None | Some("s3") => BackendKind::S3,
            Some("local") => BackendKind::Local,
            Some(other) => bail!("unknown PHOTO_SPLITTER_BACKEND `{}`", other),
        };

        // --- Merge ---
        let host = args.host.clone().unwrap_or(env_host);
        let port = args.port.or(env_port).unwrap_or(default_port);

        let backend = match args.backend.unwrap_or(env_backend) {
            BackendKind::S3 => BackendConfig::S3(S3Settings {
                access_key_id: require("AWS_ACCESS_KEY_ID")?,
                secret_access_key: require("AWS_SECRET_ACCESS_KEY")?,
                region: require("AWS_REGION")?,
                endpoint: var("AWS_ENDPOINT_URL"),
            }),
            BackendKind::Local => {
                let storage_dir = args
                    .storage_dir
                    .clone()
                    .or_else(|| var("PHOTO_SPLITTER_STORAGE_DIR").map(PathBuf::from))
                    .unwrap_or_else(|| PathBuf::from("./data/objects"));
                let public_url = match var("PHOTO_SPLITTER_PUBLIC_URL") {
                    Some(value) => Url::parse(&value)
                        .with_context(|| format!("parsing PHOTO_SPLITTER_PUBLIC_URL value `{}`", value))?,
                    None => default_public_url(&host, port)?,
                };
                BackendConfig::Local {
                    storage_dir,
                    public_url,
                    signing_secret: require("PHOTO_SPLITTER_SIGNING_SECRET")?,
                }
            }
        };

        let source_bucket = require("AWS_BUCKET_NAME")?;
        let destination_bucket = require("DESTINATION_BUCKET")?;
        // variants written to the source bucket would re-trigger the worker
        if source_bucket == destination_bucket {
            bail!(
                "AWS_BUCKET_NAME and DESTINATION_BUCKET must differ (both are `{}`)",
                source_bucket
            );
        }

        Ok(Self {
            host,
            port,
            max_body_bytes: max_body_mb * 1024 * 1024,
            source_bucket,
            destination_bucket,
            backend,
            sorted_hsv: args.sorted_hsv || env_sorted_hsv,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_public_url(host: &str, port: u16) -> Result<Url> {
    let host = match host {
        "0.0.0.0" | "::" => "127.0.0.1",
        other => other,
    };
    Url::parse(&format!("http://{}:{}/", host, port)).context("building default public url")
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => bail!("expected a boolean"),
    }
}

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Relay listening host
    #[arg(long, env = "TEMPO_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Relay listening port
    #[arg(short, long, env = "TEMPO_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Directory holding the local (ephemeral) copies
    #[arg(long, env = "TEMPO_UPLOAD_DIR", default_value = "./uploads")]
    pub upload_dir: String,

    /// Content store backend type
    #[arg(
        short = 's',
        long,
        env = "TEMPO_CONTENT_STORE",
        default_value = "FILESYSTEM"
    )]
    pub content_store: String,

    /// Root directory of the FILESYSTEM content store
    #[arg(long, env = "TEMPO_CONTENT_ROOT", default_value = "./content")]
    pub content_root: String,

    /// Bucket of the S3 content store
    #[arg(long, env = "TEMPO_S3_BUCKET", default_value = "tempo")]
    pub s3_bucket: String,

    /// Endpoint of an S3 compatible service, AWS when unset
    #[arg(long, env = "TEMPO_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    #[arg(long, env = "TEMPO_S3_REGION", default_value = "us-east-1")]
    pub s3_region: String,

    /// How the eviction loop reaches the delete path: IN_PROCESS or LOOPBACK
    #[arg(long, env = "TEMPO_DELETION_MODE", default_value = "IN_PROCESS")]
    pub deletion_mode: String,

    #[arg(long, env = "TEMPO_EVICTION_INTERVAL_SECS", default_value_t = 1800)]
    pub eviction_interval_secs: u64,

    /// Deadline for every content store call
    #[arg(long, env = "TEMPO_STORE_TIMEOUT_SECS", default_value_t = 10)]
    pub store_timeout_secs: u64,

    /// Deadline for one eviction delete invocation
    #[arg(long, env = "TEMPO_DELETE_TIMEOUT_SECS", default_value_t = 10)]
    pub delete_timeout_secs: u64,

    /// Delay before a downloaded file is removed from local storage
    #[arg(long, env = "TEMPO_DOWNLOAD_CLEANUP_SECS", default_value_t = 20)]
    pub download_cleanup_secs: u64,

    #[arg(long, env = "TEMPO_SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,

    /// How long shutdown waits for an in-flight eviction cycle
    #[arg(long, env = "TEMPO_EVICTION_GRACE_SECS", default_value_t = 30)]
    pub eviction_grace_secs: u64,

    /// Consecutive failed evictions before a file is quarantined, 0 retries forever
    #[arg(long, env = "TEMPO_MAX_EVICTION_ATTEMPTS", default_value_t = 0)]
    pub max_eviction_attempts: u32,

    #[arg(long, env = "TEMPO_MAX_UPLOAD_BYTES", default_value_t = 1 << 30)]
    pub max_upload_bytes: usize,

    /// Also append logs to this file
    #[arg(long, env = "TEMPO_LOG_FILE")]
    pub log_file: Option<String>,
}

use clap::Args;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::auth::DEFAULT_IDENTITY_HEADER;
use crate::billing::signature::DEFAULT_TOLERANCE_SECS;
use crate::usage::DEFAULT_DAILY_LIMIT;

const MB: u64 = 1024 * 1024;

/// Settings for `pagesmith serve`. Every flag can also come from the
/// environment.
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "PAGESMITH_BIND", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// SQLite database for usage counts and subscriptions (in-memory if unset)
    #[arg(long, env = "PAGESMITH_DATABASE")]
    pub database: Option<PathBuf>,

    /// Free conversions per identity per UTC day
    #[arg(long, env = "PAGESMITH_DAILY_LIMIT", default_value_t = DEFAULT_DAILY_LIMIT)]
    pub daily_limit: u32,

    /// Per-file upload limit for free callers, in MB
    #[arg(long, env = "PAGESMITH_FREE_UPLOAD_MB", default_value_t = 10)]
    pub free_upload_mb: u64,

    /// Per-file upload limit for subscribers, in MB
    #[arg(long, env = "PAGESMITH_PRO_UPLOAD_MB", default_value_t = 100)]
    pub pro_upload_mb: u64,

    /// Largest accepted request body, in MB
    #[arg(long, env = "PAGESMITH_MAX_REQUEST_MB", default_value_t = 200)]
    pub max_request_mb: u64,

    /// Header in which the auth proxy passes the signed-in email
    #[arg(long, env = "PAGESMITH_IDENTITY_HEADER", default_value = DEFAULT_IDENTITY_HEADER)]
    pub identity_header: String,

    /// Stripe webhook endpoint secret
    #[arg(long, env = "STRIPE_WEBHOOK_SECRET", default_value = "", hide_env_values = true)]
    pub stripe_webhook_secret: String,

    /// Stripe API key, used to look up customers on subscription events
    #[arg(long, env = "STRIPE_SECRET_KEY", default_value = "", hide_env_values = true)]
    pub stripe_secret_key: String,

    #[arg(long, env = "STRIPE_PRICE_MONTHLY")]
    pub stripe_price_monthly: Option<String>,

    #[arg(long, env = "STRIPE_PRICE_YEARLY")]
    pub stripe_price_yearly: Option<String>,

    /// Accepted clock skew for webhook signatures, in seconds
    #[arg(long, env = "PAGESMITH_WEBHOOK_TOLERANCE", default_value_t = DEFAULT_TOLERANCE_SECS)]
    pub webhook_tolerance: i64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub database: Option<PathBuf>,
    pub daily_limit: u32,
    pub free_upload_mb: u64,
    pub pro_upload_mb: u64,
    pub max_request_bytes: usize,
    pub identity_header: String,
    pub stripe_webhook_secret: String,
    pub stripe_secret_key: String,
    pub stripe_price_monthly: Option<String>,
    pub stripe_price_yearly: Option<String>,
    pub webhook_tolerance_secs: i64,
}

impl ServerConfig {
    pub fn upload_limit_mb(&self, entitled: bool) -> u64 {
        if entitled {
            self.pro_upload_mb
        } else {
            self.free_upload_mb
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            database: None,
            daily_limit: DEFAULT_DAILY_LIMIT,
            free_upload_mb: 10,
            pro_upload_mb: 100,
            max_request_bytes: (200 * MB) as usize,
            identity_header: DEFAULT_IDENTITY_HEADER.to_string(),
            stripe_webhook_secret: String::new(),
            stripe_secret_key: String::new(),
            stripe_price_monthly: None,
            stripe_price_yearly: None,
            webhook_tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }
}

impl From<ServeArgs> for ServerConfig {
    fn from(args: ServeArgs) -> Self {
        ServerConfig {
            bind: args.bind,
            database: args.database,
            daily_limit: args.daily_limit,
            free_upload_mb: args.free_upload_mb,
            pro_upload_mb: args.pro_upload_mb,
            max_request_bytes: (args.max_request_mb * MB) as usize,
            identity_header: args.identity_header,
            stripe_webhook_secret: args.stripe_webhook_secret,
            stripe_secret_key: args.stripe_secret_key,
            stripe_price_monthly: args.stripe_price_monthly,
            stripe_price_yearly: args.stripe_price_yearly,
            webhook_tolerance_secs: args.webhook_tolerance,
        }
    }
}

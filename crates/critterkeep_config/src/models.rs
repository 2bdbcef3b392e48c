// --- File: crates/critterkeep_config/src/models.rs ---

use serde::{Deserialize, Serialize};

// --- General Server Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origin allowed by CORS, e.g. the PWA frontend URL.
    #[serde(default)]
    pub frontend_url: Option<String>,
}

// --- Database Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String, // e.g. "sqlite:data/critterkeep.db", overridable via CRITTERKEEP__DATABASE__URL
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

// --- Web Push Config ---
// The private key is a secret; keep "secret_from_env" in the config file and
// provide CRITTERKEEP_SECRET_PUSH_VAPID_PRIVATE_KEY.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PushConfig {
    /// Base64url (no padding) uncompressed P-256 public key, handed to browsers.
    pub vapid_public_key: String,
    /// Base64url (no padding) raw P-256 private scalar.
    pub vapid_private_key: String,
    /// Contact subject for the push service, "mailto:..." or "https://...".
    pub vapid_subject: String,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Maximum number of reset batches waiting for delivery.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

fn default_ttl_secs() -> u32 {
    60 * 60 * 24
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_queue_depth() -> usize {
    64
}

// --- Auth Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String, // Secret loaded from env: CRITTERKEEP_SECRET_AUTH_JWT_SECRET
    /// Users allowed to act on other users' tasks.
    #[serde(default)]
    pub admin_user_ids: Vec<i64>,
}

// --- Unified App Configuration ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    // Server config is mandatory
    pub server: ServerConfig,

    #[serde(default)]
    pub use_push: bool,

    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub push: Option<PushConfig>,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                frontend_url: None,
            },
            use_push: false,
            database: None,
            push: None,
            auth: None,
        }
    }
}

impl AppConfig {
    /// Returns the push section only when push delivery is switched on.
    pub fn push_enabled(&self) -> Option<&PushConfig> {
        if self.use_push {
            self.push.as_ref()
        } else {
            None
        }
    }
}

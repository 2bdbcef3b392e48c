use config::{Config, ConfigError, Environment, File};
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::env;
use std::path::PathBuf;
use tracing::debug;

pub mod env_vars;
pub mod models;
pub use models::*;

/// Loads the application configuration.
///
/// Sources are layered in order, later ones winning:
/// `config/default.toml`, `config/{RUN_ENV}.toml`, then environment
/// variables prefixed with `CRITTERKEEP__`. Values left as
/// `"secret_from_env"` are finally resolved from the secret environment
/// variables (see [`env_vars`]).
///
/// The config directory defaults to `./config` and can be moved with
/// `CRITTERKEEP_CONFIG_DIR`.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    ensure_dotenv_loaded();

    let run_env = env::var("RUN_ENV").unwrap_or_else(|_| "debug".to_string());
    let prefix = env_vars::get_config_prefix();
    let config_dir = PathBuf::from(
        env::var("CRITTERKEEP_CONFIG_DIR").unwrap_or_else(|_| "config".to_string()),
    );

    let default_path = config_dir.join("default");
    let env_path = config_dir.join(&run_env);

    debug!(
        default_path = %default_path.display(),
        env_path = %env_path.display(),
        "Loading configuration"
    );

    let raw_config: AppConfig = Config::builder()
        .add_source(File::from(default_path).required(false))
        .add_source(File::from(env_path).required(false))
        .add_source(
            Environment::with_prefix(&prefix)
                .prefix_separator(env_vars::CONFIG_SEPARATOR)
                .separator(env_vars::CONFIG_SEPARATOR)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("auth.admin_user_ids"),
        )
        .build()?
        .try_deserialize()?;

    apply_env_overrides_from_marker(raw_config)
}

/// Replaces every `"secret_from_env"` marker in the config with the
/// matching secret environment variable.
pub fn apply_env_overrides_from_marker(config: AppConfig) -> Result<AppConfig, ConfigError> {
    let mut json: Value =
        serde_json::to_value(&config).map_err(|e| ConfigError::Foreign(Box::new(e)))?;
    if env_vars::inject_env_vars(&mut json) {
        debug!("Injected secrets from environment");
    }
    serde_json::from_value(json).map_err(|e| ConfigError::Foreign(Box::new(e)))
}

static INIT_DOTENV: OnceCell<()> = OnceCell::new();

/// Ensures that the dotenv file is loaded into the environment variables.
///
/// `DOTENV_OVERRIDE` selects another file, otherwise `.env` in the working
/// directory is used. Loading happens at most once per process; a missing
/// file is not an error.
///
/// # Returns
///
/// The path that was (or would have been) loaded.
pub fn ensure_dotenv_loaded() -> String {
    let dotenv_path = env::var("DOTENV_OVERRIDE").unwrap_or_else(|_| ".env".to_string());

    INIT_DOTENV.get_or_init(|| {
        dotenv::from_filename(&dotenv_path).ok();
    });

    dotenv_path
}

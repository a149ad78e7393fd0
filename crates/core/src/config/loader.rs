use std::path::Path;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};

use super::{types::Config, ConfigError};

/// Prefix of environment variable overrides. Nested keys are separated by
/// `__`, e.g. `MARQUEE_SCHEDULER__MOVIE_INDEX_SECS=0` turns off automatic
/// library indexing.
pub const ENV_PREFIX: &str = "MARQUEE_";

/// Load configuration from file with environment variable overrides.
///
/// Relative library and database paths are taken relative to the directory
/// holding the config file, so the daemon behaves the same whatever its
/// working directory is.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let mut config = extract(
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__")),
    )?;

    if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        resolve_paths(&mut config, base);
    }
    Ok(config)
}

/// Load configuration from a TOML string. No environment overrides and no
/// path resolution; meant for tests and embedded defaults.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    extract(Figment::from(Toml::string(toml_str)))
}

fn extract(figment: Figment) -> Result<Config, ConfigError> {
    figment
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

fn resolve_paths(config: &mut Config, base: &Path) {
    for path in [
        &mut config.database.path,
        &mut config.library.movie_dir,
        &mut config.library.tv_dir,
    ] {
        if path.is_relative() && !path.as_os_str().is_empty() {
            *path = base.join(&*path);
        }
    }
}

use std::path::Path;

use crate::config::schema::{Config, KNOWN_KEYS};
use crate::error::ConfigError;
use crate::validate::command::parse_command_line;

/// A validated configuration plus the non-fatal findings of decoding it.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    /// Unknown top-level keys, reported but otherwise ignored.
    pub warnings: Vec<String>,
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<LoadedConfig, ConfigError> {
    let path = path.as_ref();
    log::info!("Loading configuration from '{}'", path.display());
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<LoadedConfig, ConfigError> {
    let value: serde_yaml::Value = serde_yaml::from_str(content)?;
    let warnings = unknown_keys(&value)?;

    let mut config: Config = serde_yaml::from_value(value)?;
    normalize(&mut config)?;
    validate_config(&config)?;

    Ok(LoadedConfig { config, warnings })
}

fn unknown_keys(value: &serde_yaml::Value) -> Result<Vec<String>, ConfigError> {
    let mapping = match value {
        serde_yaml::Value::Mapping(mapping) => mapping,
        serde_yaml::Value::Null => return Ok(Vec::new()),
        _ => return Err(ConfigError::NotAMapping),
    };

    Ok(mapping
        .keys()
        .filter_map(|key| match key.as_str() {
            Some(name) if KNOWN_KEYS.contains(&name) => None,
            Some(name) => Some(format!("unknown field in config: {}", name)),
            None => Some(format!("non-string key in config: {:?}", key)),
        })
        .collect())
}

fn normalize(config: &mut Config) -> Result<(), ConfigError> {
    if config.check_command_ok_exit_code.is_empty() {
        config.check_command_ok_exit_code = vec![0];
    }

    // A single-line Template naming an existing file is read from disk.
    if !config.template.contains('\n') && !config.template.is_empty() {
        let path = Path::new(config.template.trim());
        if path.is_file() {
            config.template =
                std::fs::read_to_string(path).map_err(|e| ConfigError::ReadTemplate {
                    path: path.to_path_buf(),
                    source: e,
                })?;
        }
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.is_templated() && config.to_file_name.is_empty() {
        return Err(ConfigError::MissingField("ToFileName"));
    }

    if config.is_templated()
        && config.to_directory.is_empty()
        && config.to_secret_name.is_empty()
        && config.to_config_map_name.is_empty()
    {
        return Err(ConfigError::MissingField(
            "destination (ToDirectory, ToSecretName or ToConfigMapName)",
        ));
    }

    if !config.is_templated() && config.to_directory.is_empty() {
        return Err(ConfigError::MissingField("ToDirectory"));
    }

    if (!config.to_secret_name.is_empty() || !config.to_config_map_name.is_empty())
        && config.to_namespace.is_empty()
    {
        return Err(ConfigError::MissingField("ToNamespace"));
    }

    if config.selectors.is_empty() {
        return Err(ConfigError::MissingField("Selectors"));
    }
    config.parsed_selectors()?;

    if config.check_yaml && config.check_json {
        return Err(ConfigError::ConflictingSyntaxChecks);
    }

    if !config.check_command.is_empty() {
        let args =
            parse_command_line(&config.check_command).map_err(|reason| {
                ConfigError::InvalidCommand {
                    command: config.check_command.clone(),
                    reason,
                }
            })?;
        if args.is_empty() {
            return Err(ConfigError::InvalidCommand {
                command: config.check_command.clone(),
                reason: "command is blank".to_string(),
            });
        }
    }

    Ok(())
}

//! Syntax validation of rendered outputs.

pub mod command;

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::config::Config;
use crate::error::ConfigError;

pub use command::{parse_command_line, CommandCheck, CHECK_FILE_ENV};

/// Parser-based syntax checks. Only one may be enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxCheck {
    Yaml,
    Json,
}

impl SyntaxCheck {
    pub fn accepts(&self, text: &str) -> bool {
        match self {
            SyntaxCheck::Yaml => check_yaml(text),
            SyntaxCheck::Json => check_json(text),
        }
    }
}

/// ANDs every enabled check.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    syntax: Option<SyntaxCheck>,
    command: Option<CommandCheck>,
}

impl Validator {
    pub fn new(syntax: Option<SyntaxCheck>, command: Option<CommandCheck>) -> Self {
        Self { syntax, command }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let syntax = match (config.check_yaml, config.check_json) {
            (true, true) => return Err(ConfigError::ConflictingSyntaxChecks),
            (true, false) => Some(SyntaxCheck::Yaml),
            (false, true) => Some(SyntaxCheck::Json),
            (false, false) => None,
        };

        let command = if config.check_command.is_empty() {
            None
        } else {
            let tmp_directory = if config.tmp_directory.is_empty() {
                std::env::temp_dir()
            } else {
                PathBuf::from(&config.tmp_directory)
            };
            let check = CommandCheck::new(
                &config.check_command,
                tmp_directory,
                config.check_command_ok_exit_code.clone(),
                Duration::from_secs(config.check_command_timeout),
            )
            .map_err(|reason| ConfigError::InvalidCommand {
                command: config.check_command.clone(),
                reason,
            })?;
            Some(check)
        };

        Ok(Self::new(syntax, command))
    }

    pub fn is_enabled(&self) -> bool {
        self.syntax.is_some() || self.command.is_some()
    }

    /// Returns true when every enabled check accepts `output`.
    ///
    /// `file_name` names the temporary copy handed to the check command.
    pub async fn check(&self, output: &str, file_name: &str) -> bool {
        if let Some(syntax) = &self.syntax {
            log::debug!("checkSyntax - {:?}", syntax);
            if !syntax.accepts(output) {
                return false;
            }
        }

        if let Some(command) = &self.command {
            log::debug!("checkSyntax - CheckCommand");
            match command.check(output, file_name).await {
                Ok(true) => {}
                Ok(false) => return false,
                Err(e) => {
                    log::warn!("{}", e);
                    return false;
                }
            }
        }

        true
    }
}

/// Accepts any well-formed YAML stream, multi-document streams included.
pub fn check_yaml(text: &str) -> bool {
    for document in serde_yaml::Deserializer::from_str(text) {
        if let Err(e) = serde_yaml::Value::deserialize(document) {
            log::warn!("{}", e);
            return false;
        }
    }
    true
}

pub fn check_json(text: &str) -> bool {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(_) => true,
        Err(e) => {
            log::warn!("{}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    #[test]
    fn test_check_yaml() {
        assert!(check_yaml("a: 1\nb: [1, 2]\n"));
        assert!(check_yaml(""));
        assert!(check_yaml("a: 1\n---\nb: 2\n"));
        assert!(!check_yaml("a: [1, 2\n"));
        assert!(!check_yaml("a: 1\n  b: 2\n"));
        assert!(!check_yaml("a: 1\n---\nb: [1, 2\n"));
    }

    #[test]
    fn test_check_json() {
        assert!(check_json("{\"a\": 1}"));
        assert!(!check_json("{\"a\": 1"));
        assert!(!check_json(""));
    }

    #[tokio::test]
    async fn test_no_checks_accepts_everything() {
        let validator = Validator::default();
        assert!(!validator.is_enabled());
        assert!(validator.check("{{{ not anything", "f").await);
    }

    #[test]
    fn test_conflicting_checks_rejected() {
        let mut config = load_config_from_str("Selectors: [secret/a=b]\nToDirectory: /o/\n")
            .unwrap()
            .config;
        config.check_yaml = true;
        config.check_json = true;
        assert!(matches!(
            Validator::from_config(&config),
            Err(ConfigError::ConflictingSyntaxChecks)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_syntax_and_command_are_anded() {
        let dir = tempfile::TempDir::new().unwrap();
        let command = CommandCheck::new(
            "sh -c 'exit 1'",
            dir.path(),
            vec![0],
            Duration::from_secs(10),
        )
        .unwrap();

        let yaml_only = Validator::new(Some(SyntaxCheck::Yaml), None);
        let both = Validator::new(Some(SyntaxCheck::Yaml), Some(command));

        assert!(yaml_only.check("a: 1\n", "f.yml").await);
        assert!(!both.check("a: 1\n", "f.yml").await);
        assert!(!both.check("a: [\n", "f.yml").await);
    }

    #[test]
    fn test_from_config_builds_command() {
        let loaded = load_config_from_str(
            "Selectors: [secret/a=b]\nToDirectory: /o/\nCheckYaml: true\nCheckCommand: promtool check config\nTmpDirectory: /tmp/sidecar\nCheckCommandOKExitCode: [0, 3]\n",
        )
        .unwrap();
        let validator = Validator::from_config(&loaded.config).unwrap();
        assert!(validator.is_enabled());

        let command = validator.command.as_ref().unwrap();
        assert_eq!(command.program(), "promtool");
        assert_eq!(
            command.check_path("p.yml"),
            PathBuf::from("/tmp/sidecar/p.yml")
        );
    }
}

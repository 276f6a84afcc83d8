use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Every key accepted at the top level of the config file.
pub const KNOWN_KEYS: &[&str] = &[
    "Template",
    "CheckYaml",
    "Selectors",
    "CheckSelfConfig",
    "CheckJSON",
    "CheckCommand",
    "CheckCommandOKExitCode",
    "CheckCommandTimeout",
    "TmpDirectory",
    "RemoveComment",
    "RemoveEmptyLines",
    "ToFileName",
    "ToDirectory",
    "ToNamespace",
    "ToSecretName",
    "ToConfigMapName",
    "FromNamespace",
    "URLRealoads",
    "URLReloads",
    "URLReloadTimeout",
    "SelectorStartDelay",
    "PrometheusMetricsPort",
    "PrometheusMetricsURL",
];

/// Namespace value meaning "watch every namespace".
pub const ALL_NAMESPACES: &str = "ALL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "Template", default)]
    pub template: String,
    #[serde(rename = "CheckYaml", default)]
    pub check_yaml: bool,
    #[serde(rename = "Selectors", default)]
    pub selectors: Vec<String>,
    #[serde(rename = "CheckSelfConfig", default)]
    pub check_self_config: bool,
    #[serde(rename = "CheckJSON", default)]
    pub check_json: bool,
    #[serde(rename = "CheckCommand", default)]
    pub check_command: String,
    #[serde(rename = "CheckCommandOKExitCode", default = "default_ok_exit_codes")]
    pub check_command_ok_exit_code: Vec<i32>,
    #[serde(rename = "CheckCommandTimeout", default = "default_check_timeout")]
    pub check_command_timeout: u64,
    #[serde(rename = "TmpDirectory", default)]
    pub tmp_directory: String,
    #[serde(rename = "RemoveComment", default)]
    pub remove_comment: bool,
    #[serde(rename = "RemoveEmptyLines", default)]
    pub remove_empty_lines: bool,
    #[serde(rename = "ToFileName", default)]
    pub to_file_name: String,
    #[serde(rename = "ToDirectory", default)]
    pub to_directory: String,
    #[serde(rename = "ToNamespace", default)]
    pub to_namespace: String,
    #[serde(rename = "ToSecretName", default)]
    pub to_secret_name: String,
    #[serde(rename = "ToConfigMapName", default)]
    pub to_config_map_name: String,
    #[serde(rename = "FromNamespace", default)]
    pub from_namespace: String,
    #[serde(rename = "URLRealoads", alias = "URLReloads", default)]
    pub url_reloads: Vec<String>,
    #[serde(rename = "URLReloadTimeout", default = "default_reload_timeout")]
    pub url_reload_timeout: u64,
    #[serde(rename = "SelectorStartDelay", default = "default_selector_delay")]
    pub selector_start_delay: u64,
    #[serde(rename = "PrometheusMetricsPort", default = "default_metrics_port")]
    pub prometheus_metrics_port: u16,
    #[serde(rename = "PrometheusMetricsURL", default = "default_metrics_url")]
    pub prometheus_metrics_url: String,
}

fn default_ok_exit_codes() -> Vec<i32> {
    vec![0]
}

fn default_check_timeout() -> u64 {
    30
}

fn default_reload_timeout() -> u64 {
    10
}

fn default_selector_delay() -> u64 {
    5
}

fn default_metrics_port() -> u16 {
    2112
}

fn default_metrics_url() -> String {
    "/metrics".to_string()
}

impl Config {
    /// Returns true when a single aggregated artifact is rendered from `Template`.
    pub fn is_templated(&self) -> bool {
        !self.template.is_empty()
    }

    /// Parses every entry of `Selectors`.
    pub fn parsed_selectors(&self) -> Result<Vec<Selector>, ConfigError> {
        self.selectors.iter().map(|s| s.parse()).collect()
    }

    /// Returns the namespace scope to watch, `None` meaning all namespaces.
    pub fn watch_namespace(&self) -> Option<&str> {
        if self.from_namespace == ALL_NAMESPACES {
            None
        } else {
            Some(&self.from_namespace)
        }
    }
}

/// The kind of cluster object a selector watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    ConfigMap,
    Secret,
}

impl std::fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectorKind::ConfigMap => write!(f, "configmap"),
            SelectorKind::Secret => write!(f, "secret"),
        }
    }
}

impl std::str::FromStr for SelectorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "configmap" => Ok(SelectorKind::ConfigMap),
            "secret" => Ok(SelectorKind::Secret),
            _ => Err(format!("Wrong kind for Selectors: {}", s)),
        }
    }
}

/// A `kind/labelSelector` pair from the `Selectors` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub kind: SelectorKind,
    pub labels: String,
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.labels)
    }
}

impl std::str::FromStr for Selector {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        let [kind, labels] = parts.as_slice() else {
            return Err(ConfigError::InvalidSelector {
                selector: s.to_string(),
                reason: format!("expected 'kind/labelSelector', found {} part(s)", parts.len()),
            });
        };

        let kind = kind.parse().map_err(|reason| ConfigError::InvalidSelector {
            selector: s.to_string(),
            reason,
        })?;

        Ok(Selector {
            kind,
            labels: labels.to_string(),
        })
    }
}

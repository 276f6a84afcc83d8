//! Table-driven tests for configuration loading and validation.

use kube_sidecar::config::{load_config, load_config_from_str, SelectorKind};

/// Represents a single config loading test case.
struct ConfigTestCase {
    /// Test case name for identification.
    name: &'static str,
    /// The config YAML content to test.
    config_yaml: &'static str,
    /// Whether loading should succeed.
    should_succeed: bool,
    /// Expected error substring (if should_succeed is false).
    expected_error: Option<&'static str>,
}

const CONFIG_TESTS: &[ConfigTestCase] = &[
    ConfigTestCase {
        name: "valid_templated",
        config_yaml: r#"
Template: "{{ data }}"
Selectors: [configmap/app=prometheus, secret/app=prometheus]
ToFileName: prometheus.yml
ToDirectory: /etc/prometheus/
"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "valid_passthrough",
        config_yaml: r#"
Selectors: [configmap/grafana_dashboard=1]
ToDirectory: "/var/lib/grafana/dashboards/{{ namespace }}/"
FromNamespace: ALL
"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "valid_secret_output",
        config_yaml: r#"
Template: "{{ data }}"
Selectors: [configmap/app=alertmanager]
ToFileName: alertmanager.yml
ToNamespace: monitoring
ToSecretName: alertmanager-config
"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "valid_yaml_and_command",
        config_yaml: r#"
Template: "{{ data }}"
Selectors: [configmap/app=prometheus]
CheckYaml: true
CheckCommand: promtool check config /tmp/prometheus.yml
ToFileName: prometheus.yml
ToDirectory: /etc/prometheus/
"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "template_without_file_name",
        config_yaml: r#"
Template: "{{ data }}"
Selectors: [configmap/app=prometheus]
ToDirectory: /etc/prometheus/
"#,
        should_succeed: false,
        expected_error: Some("ToFileName"),
    },
    ConfigTestCase {
        name: "template_without_destination",
        config_yaml: r#"
Template: "{{ data }}"
Selectors: [configmap/app=prometheus]
ToFileName: prometheus.yml
URLRealoads: [http://localhost:9090/-/reload]
"#,
        should_succeed: false,
        expected_error: Some("ToDirectory, ToSecretName or ToConfigMapName"),
    },
    ConfigTestCase {
        name: "passthrough_without_directory",
        config_yaml: r#"
Selectors: [configmap/grafana_dashboard=1]
"#,
        should_succeed: false,
        expected_error: Some("ToDirectory"),
    },
    ConfigTestCase {
        name: "secret_without_namespace",
        config_yaml: r#"
Template: "{{ data }}"
Selectors: [configmap/app=prometheus]
ToFileName: prometheus.yml
ToSecretName: prometheus
"#,
        should_succeed: false,
        expected_error: Some("ToNamespace"),
    },
    ConfigTestCase {
        name: "config_map_without_namespace",
        config_yaml: r#"
Template: "{{ data }}"
Selectors: [configmap/app=prometheus]
ToFileName: prometheus.yml
ToConfigMapName: prometheus
"#,
        should_succeed: false,
        expected_error: Some("ToNamespace"),
    },
    ConfigTestCase {
        name: "no_selectors",
        config_yaml: r#"
ToDirectory: /out/
"#,
        should_succeed: false,
        expected_error: Some("Selectors"),
    },
    ConfigTestCase {
        name: "selector_wrong_kind",
        config_yaml: r#"
Selectors: [deployment/app=x]
ToDirectory: /out/
"#,
        should_succeed: false,
        expected_error: Some("Wrong kind for Selectors"),
    },
    ConfigTestCase {
        name: "selector_too_many_parts",
        config_yaml: r#"
Selectors: [configmap/app=x/y]
ToDirectory: /out/
"#,
        should_succeed: false,
        expected_error: Some("Invalid selector"),
    },
    ConfigTestCase {
        name: "yaml_and_json",
        config_yaml: r#"
Selectors: [configmap/app=x]
ToDirectory: /out/
CheckYaml: true
CheckJSON: true
"#,
        should_succeed: false,
        expected_error: Some("Yaml != Json"),
    },
    ConfigTestCase {
        name: "blank_command",
        config_yaml: r#"
Selectors: [configmap/app=x]
ToDirectory: /out/
CheckCommand: "   "
"#,
        should_succeed: false,
        expected_error: Some("Invalid CheckCommand"),
    },
    ConfigTestCase {
        name: "wrong_type",
        config_yaml: r#"
Selectors: [configmap/app=x]
ToDirectory: /out/
CheckYaml: [1, 2]
"#,
        should_succeed: false,
        expected_error: Some("parse config"),
    },
];

#[test]
fn test_config_loading() {
    for test_case in CONFIG_TESTS {
        let result = load_config_from_str(test_case.config_yaml);

        if test_case.should_succeed {
            assert!(
                result.is_ok(),
                "Test '{}': Expected success but got error: {:?}",
                test_case.name,
                result.err()
            );
        } else {
            assert!(
                result.is_err(),
                "Test '{}': Expected error but got success",
                test_case.name
            );

            if let Some(expected_error) = test_case.expected_error {
                let error_msg = result.err().unwrap().to_string();
                assert!(
                    error_msg.contains(expected_error),
                    "Test '{}': Expected error containing '{}', got '{}'",
                    test_case.name,
                    expected_error,
                    error_msg
                );
            }
        }
    }
}

#[test]
fn test_valid_config_field_values() {
    let loaded = load_config_from_str(
        r#"
Template: "{{ data }}"
Selectors:
  - configmap/app=prometheus
  - secret/app=prometheus-extra
CheckYaml: true
CheckSelfConfig: true
CheckCommand: promtool check config
CheckCommandOKExitCode: [0, 3]
CheckCommandTimeout: 5
TmpDirectory: /tmp/sidecar/
RemoveComment: true
RemoveEmptyLines: true
ToFileName: prometheus.yml
ToDirectory: /etc/prometheus/
ToNamespace: monitoring
ToConfigMapName: prometheus-rendered
FromNamespace: monitoring
URLRealoads: [http://localhost:9090/-/reload]
URLReloadTimeout: 3
SelectorStartDelay: 1
PrometheusMetricsPort: 9102
PrometheusMetricsURL: /sidecar-metrics
"#,
    )
    .unwrap();

    assert!(loaded.warnings.is_empty());
    let config = loaded.config;
    assert!(config.is_templated());
    assert!(config.check_self_config);
    assert_eq!(config.check_command_ok_exit_code, vec![0, 3]);
    assert_eq!(config.check_command_timeout, 5);
    assert_eq!(config.url_reload_timeout, 3);
    assert_eq!(config.selector_start_delay, 1);
    assert_eq!(config.prometheus_metrics_port, 9102);
    assert_eq!(config.prometheus_metrics_url, "/sidecar-metrics");
    assert_eq!(config.watch_namespace(), Some("monitoring"));

    let selectors = config.parsed_selectors().unwrap();
    assert_eq!(selectors.len(), 2);
    assert_eq!(selectors[0].kind, SelectorKind::ConfigMap);
    assert_eq!(selectors[1].kind, SelectorKind::Secret);
    assert_eq!(selectors[1].labels, "app=prometheus-extra");
}

#[test]
fn test_unknown_keys_reported() {
    let loaded = load_config_from_str(
        r#"
Selectors: [configmap/app=x]
ToDirectory: /out/
ToFilename: typo.yml
"#,
    )
    .unwrap();

    assert_eq!(loaded.warnings.len(), 1);
    assert!(loaded.warnings[0].contains("ToFilename"));
}

#[test]
fn test_load_from_file() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let template = temp_dir.path().join("prometheus.tmpl");
    std::fs::write(&template, "global:\n  scrape_interval: 15s\n").unwrap();

    let config_path = temp_dir.path().join("sidecar.yaml");
    std::fs::write(
        &config_path,
        format!(
            "Template: {}\nSelectors: [configmap/app=x]\nToFileName: p.yml\nToDirectory: /out/\n",
            template.display()
        ),
    )
    .unwrap();

    let loaded = load_config(&config_path).unwrap();
    assert_eq!(
        loaded.config.template,
        "global:\n  scrape_interval: 15s\n"
    );
}

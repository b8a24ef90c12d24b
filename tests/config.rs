// ABOUTME: Integration tests for dashboard configuration parsing.
// ABOUTME: Tests YAML parsing, defaults, validation, and file discovery.

use berth::config::*;
use berth::runtime::BackendMode;
use std::fs;
use std::time::Duration;

mod parsing {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = DashboardConfig::from_yaml("").unwrap();
        assert_eq!(config, DashboardConfig::default());
        assert_eq!(config.backend.mode, None);
        assert_eq!(config.backend.cli_binary, "container");
        assert_eq!(config.backend.connect_timeout, Duration::from_secs(120));
        assert_eq!(config.discovery.validate_timeout, Duration::from_secs(3));
        assert_eq!(config.discovery.tunnel_timeout, Duration::from_secs(8));
        assert_eq!(config.discovery.remote_socket, "/var/run/docker.sock");
        assert_eq!(config.stats.max_duration, Duration::from_secs(300));
        assert_eq!(config.labels.service, "com.docker.compose.service");
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
backend:
  mode: cli
  cli_binary: /usr/local/bin/container
  connect_timeout: 30s

discovery:
  validate_timeout: 500ms
  tunnel_timeout: 15s
  remote_socket: /run/user/1000/podman/podman.sock

stats:
  max_duration: 10m
  poll_interval: 2s

compose:
  command: docker compose
  project_dir: /srv/app

labels:
  service: io.podman.compose.service
"#;
        let config = DashboardConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.backend.mode, Some(BackendMode::Cli));
        assert_eq!(config.backend.cli_binary, "/usr/local/bin/container");
        assert_eq!(config.backend.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.backend.podman_binary, "podman");
        assert_eq!(config.discovery.validate_timeout, Duration::from_millis(500));
        assert_eq!(config.discovery.tunnel_timeout, Duration::from_secs(15));
        assert_eq!(
            config.discovery.remote_socket,
            "/run/user/1000/podman/podman.sock"
        );
        assert_eq!(config.stats.max_duration, Duration::from_secs(600));
        assert_eq!(config.stats.poll_interval, Duration::from_secs(2));
        assert_eq!(config.compose.command.as_deref(), Some("docker compose"));
        assert_eq!(config.labels.service, "io.podman.compose.service");
        assert_eq!(config.labels.project, "com.docker.compose.project");
    }

    #[test]
    fn auto_mode_means_discovery() {
        let config = DashboardConfig::from_yaml("backend:\n  mode: auto\n").unwrap();
        assert_eq!(config.backend.mode, None);
    }

    #[test]
    fn mode_is_case_insensitive() {
        let config = DashboardConfig::from_yaml("backend:\n  mode: Legacy\n").unwrap();
        assert_eq!(config.backend.mode, Some(BackendMode::Legacy));
    }

    #[test]
    fn compose_candidates_keep_order() {
        let yaml = r#"
compose:
  candidates:
    - "  nerdctl   compose "
    - docker-compose
"#;
        let config = DashboardConfig::from_yaml(yaml).unwrap();
        let candidates: Vec<&str> = config.compose.candidates.iter().map(String::as_str).collect();
        assert_eq!(candidates, vec!["nerdctl compose", "docker-compose"]);
    }

    #[test]
    fn default_compose_candidates() {
        let config = DashboardConfig::default();
        let candidates: Vec<&str> = config.compose.candidates.iter().map(String::as_str).collect();
        assert_eq!(
            candidates,
            vec!["podman-compose", "podman compose", "docker-compose", "docker compose"]
        );
    }
}

mod validation {
    use super::*;

    #[test]
    fn unknown_mode_is_rejected() {
        let err = DashboardConfig::from_yaml("backend:\n  mode: kubernetes\n").unwrap_err();
        assert!(err.to_string().contains("unknown backend mode"));
    }

    #[test]
    fn empty_compose_candidates_are_rejected() {
        let err = DashboardConfig::from_yaml("compose:\n  candidates: []\n").unwrap_err();
        assert!(err.to_string().contains("at least one compose command"));
    }

    #[test]
    fn blank_compose_candidates_are_rejected() {
        let err = DashboardConfig::from_yaml("compose:\n  candidates: [\"  \"]\n").unwrap_err();
        assert!(err.to_string().contains("at least one compose command"));
    }

    #[test]
    fn bad_duration_is_rejected() {
        assert!(DashboardConfig::from_yaml("stats:\n  poll_interval: often\n").is_err());
    }
}

mod discovery {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = DashboardConfig::discover(dir.path()).unwrap();
        assert_eq!(config, DashboardConfig::default());
    }

    #[test]
    fn finds_primary_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "backend:\n  mode: socket\n").unwrap();
        let config = DashboardConfig::discover(dir.path()).unwrap();
        assert_eq!(config.backend.mode, Some(BackendMode::Socket));
    }

    #[test]
    fn finds_config_in_dot_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".berth")).unwrap();
        fs::write(
            dir.path().join(CONFIG_FILENAME_DIR),
            "stats:\n  poll_interval: 5s\n",
        )
        .unwrap();
        let config = DashboardConfig::discover(dir.path()).unwrap();
        assert_eq!(config.stats.poll_interval, Duration::from_secs(5));
    }

    #[test]
    fn primary_file_wins_over_alternatives() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "backend:\n  mode: cli\n").unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME_ALT), "backend:\n  mode: legacy\n").unwrap();
        let config = DashboardConfig::discover(dir.path()).unwrap();
        assert_eq!(config.backend.mode, Some(BackendMode::Cli));
    }
}

//! Duplicate-bind and error-page/document-root sanity checks, adapted from
//! the teacher's `config/validate.rs` `validate_configs` (same
//! drop-the-conflicting-block strategy, same wildcard-vs-specific-host
//! bind-conflict detection) generalized from a route-table model to this
//! design's single document root plus sig cache directory.

use std::collections::{HashMap, HashSet};

use super::types::ServerConfig;

pub fn validate_configs(configs: Vec<ServerConfig>) -> Vec<ServerConfig> {
    let mut conflict_indices = HashSet::new();

    let mut usage_map: HashMap<(String, u16), Vec<usize>> = HashMap::new();
    for (idx, config) in configs.iter().enumerate() {
        usage_map.entry((config.host.clone(), config.port)).or_default().push(idx);
    }

    let mut port_hosts: HashMap<u16, HashSet<String>> = HashMap::new();
    for config in &configs {
        port_hosts.entry(config.port).or_default().insert(config.host.clone());
    }
    for (port, hosts) in port_hosts {
        if hosts.contains("0.0.0.0") && hosts.len() > 1 {
            access_log::warn!(
                "bind conflict on port {}: wildcard 0.0.0.0 mixed with specific hosts {:?}",
                port, hosts
            );
            for (idx, config) in configs.iter().enumerate() {
                if config.port == port {
                    conflict_indices.insert(idx);
                }
            }
        }
    }

    for (idx, config) in configs.iter().enumerate() {
        let mut valid = true;

        for (code, path) in &config.error_pages {
            if *code < 100 || *code > 599 {
                access_log::warn!("invalid error page status code {} for {}", code, path);
                valid = false;
            }
            if std::fs::metadata(path).is_err() {
                access_log::warn!("error page {} for status {} does not exist", path, code);
                valid = false;
            }
        }

        if std::fs::read_dir(&config.dir).is_err() {
            access_log::warn!("document root '{}' is not a readable directory", config.dir);
            valid = false;
        }

        if let Some(sig_cachedir) = &config.sig_cachedir {
            if std::fs::metadata(sig_cachedir).is_err() {
                access_log::warn!("sig_cachedir '{}' does not exist yet; will be created on demand", sig_cachedir);
            }
        }

        if !valid {
            conflict_indices.insert(idx);
        }
    }

    let _ = usage_map;

    configs
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| !conflict_indices.contains(idx))
        .map(|(_, c)| c)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config(host: &str, port: u16) -> ServerConfig {
        ServerConfig { host: host.to_string(), port, ..ServerConfig::default() }
    }

    #[test]
    fn no_conflicts_keeps_all_configs() {
        let configs = vec![make_config("127.0.0.1", 11371), make_config("127.0.0.1", 11372)];
        assert_eq!(validate_configs(configs).len(), 2);
    }

    #[test]
    fn wildcard_vs_specific_host_is_a_bind_conflict() {
        let configs = vec![make_config("0.0.0.0", 11371), make_config("127.0.0.1", 11371)];
        assert_eq!(validate_configs(configs).len(), 0);
    }

    #[test]
    fn invalid_status_code_drops_the_block() {
        let mut config = make_config("127.0.0.1", 11371);
        config.dir = ".".to_string();
        config.error_pages.insert(99, "exists".to_string());
        assert_eq!(validate_configs(vec![config]).len(), 0);
    }

    #[test]
    fn missing_document_root_drops_the_block() {
        let mut config = make_config("127.0.0.1", 11371);
        config.dir = "/nonexistent/pgpd-test-dir".to_string();
        assert_eq!(validate_configs(vec![config]).len(), 0);
    }
}

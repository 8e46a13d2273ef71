//! Server configuration, per §6's recognized runtime options plus the
//! ambient knobs named across §3-5 (timers, mmap budgets, sigcache).
//! Adapted from the teacher's `config_handler/types.rs` `ServerConfig`/
//! `RouteConfig` pair (`#[derive(FromYaml)]`, same default-constant
//! convention) but reshaped for a single-vhost-tree document root rather
//! than a route table, since this design resolves paths directly under
//! `cwd`/`<host>/` rather than matching a route list.

use std::collections::HashMap;

use config_yaml_derive::FromYaml;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 11371;
pub const DEFAULT_CHARSET: &str = "utf-8";
pub const DEFAULT_CGI_TIMELIMIT: u64 = 30;
pub const DEFAULT_IDLE_READ_TIMELIMIT: u64 = 15;
pub const DEFAULT_IDLE_SEND_TIMELIMIT: u64 = 300;
pub const DEFAULT_LINGER_TIME_MILLIS: u64 = 500;
pub const DEFAULT_OCCASIONAL_TIME: u64 = 60;
pub const DEFAULT_STATS_TIME: u64 = 3600;
pub const DEFAULT_DESIRED_MAX_MAPPED_FILES: usize = 256;
pub const DEFAULT_DESIRED_MAX_MAPPED_BYTES: u64 = 64 * 1024 * 1024;
pub const DEFAULT_LISTEN_BACKLOG: u32 = 128;
pub const DEFAULT_SPARE_FDS: u32 = 16;
pub const DEFAULT_MAX_LINKS: u32 = 16;

#[derive(Debug, Clone, FromYaml)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub dir: String,
    pub data_dir: Option<String>,
    pub user: Option<String>,
    pub cgipat: Option<String>,
    pub fastcgi_pass: Option<String>,
    pub sigpat: Option<String>,
    pub sig_exclude_pattern: Option<String>,
    pub sig_cachedir: Option<String>,
    pub cgilimit: u32,
    pub connlimit: u32,
    pub charset: String,
    pub log_file: Option<String>,
    pub no_log: bool,
    pub chroot: Option<String>,
    pub virtual_host: bool,
    pub p3p: Option<String>,
    pub forbid_hidden_resource: bool,
    pub index_names: Vec<String>,
    pub autoindex: bool,
    pub error_pages: HashMap<u16, String>,
    pub cgi_timelimit: u64,
    pub idle_read_timelimit: u64,
    pub idle_send_timelimit: u64,
    pub linger_time_millis: u64,
    pub occasional_time: u64,
    pub stats_time: u64,
    pub desired_max_mapped_files: usize,
    pub desired_max_mapped_bytes: u64,
    pub listen_backlog: u32,
    pub spare_fds: u32,
    pub max_links: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            dir: ".".to_string(),
            data_dir: None,
            user: None,
            cgipat: None,
            fastcgi_pass: None,
            sigpat: None,
            sig_exclude_pattern: None,
            sig_cachedir: None,
            cgilimit: 0,
            connlimit: 0,
            charset: DEFAULT_CHARSET.to_string(),
            log_file: None,
            no_log: false,
            chroot: None,
            virtual_host: false,
            p3p: None,
            forbid_hidden_resource: true,
            index_names: vec!["index.html".to_string(), "index.htm".to_string()],
            autoindex: false,
            error_pages: HashMap::new(),
            cgi_timelimit: DEFAULT_CGI_TIMELIMIT,
            idle_read_timelimit: DEFAULT_IDLE_READ_TIMELIMIT,
            idle_send_timelimit: DEFAULT_IDLE_SEND_TIMELIMIT,
            linger_time_millis: DEFAULT_LINGER_TIME_MILLIS,
            occasional_time: DEFAULT_OCCASIONAL_TIME,
            stats_time: DEFAULT_STATS_TIME,
            desired_max_mapped_files: DEFAULT_DESIRED_MAX_MAPPED_FILES,
            desired_max_mapped_bytes: DEFAULT_DESIRED_MAX_MAPPED_BYTES,
            listen_backlog: DEFAULT_LISTEN_BACKLOG,
            spare_fds: DEFAULT_SPARE_FDS,
            max_links: DEFAULT_MAX_LINKS,
        }
    }
}

#[derive(Debug, Clone, FromYaml)]
pub struct Config {
    pub servers: Vec<ServerConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self { servers: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_is_the_hkp_standard_port() {
        assert_eq!(ServerConfig::default().port, 11371);
    }

    #[test]
    fn default_cgi_limit_is_unlimited() {
        assert_eq!(ServerConfig::default().cgilimit, 0);
    }
}

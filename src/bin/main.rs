use pgpd::config;
use pgpd::Server;

fn main() {
    let path = std::env::args().nth(1).unwrap_or_else(|| "config.yaml".to_string());

    let servers = match config::load(&path) {
        Ok(s) => s,
        Err(e) => {
            access_log::error!("config load failed: {}", e);
            std::process::exit(1);
        }
    };

    config::display_config(&servers);

    let Some(cfg) = servers.into_iter().next() else {
        access_log::error!("no server blocks defined in {}", path);
        std::process::exit(1);
    };

    let mut server = match Server::new(cfg) {
        Ok(s) => s,
        Err(e) => {
            access_log::error!("server startup failed: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        access_log::error!("server loop exited: {}", e);
        std::process::exit(1);
    }
}

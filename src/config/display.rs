//! ANSI dashboard pretty-printer, adapted from the teacher's
//! `config/display.rs` `Display for ServerConfig` (same box-drawing/
//! escape-code conventions) but reshaped around this design's single
//! document-root-plus-CGI-pattern model instead of a route table.

use std::fmt;

use super::types::ServerConfig;

impl fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  \x1b[38;5;244m───────────────────────────────────────────────\x1b[0m")?;
        writeln!(
            f,
            "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mNetwork:\x1b[0m     \x1b[32m{}\x1b[0m \x1b[38;5;244mport\x1b[0m \x1b[1;32m{}\x1b[0m",
            self.host, self.port
        )?;
        writeln!(
            f,
            "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mDocument root:\x1b[0m \x1b[36m{}\x1b[0m",
            self.dir
        )?;
        writeln!(
            f,
            "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mVirtual hosting:\x1b[0m \x1b[{}m{}\x1b[0m",
            if self.virtual_host { "32" } else { "31" },
            if self.virtual_host { "ON" } else { "OFF" }
        )?;
        writeln!(
            f,
            "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mCGI pattern:\x1b[0m \x1b[38;5;208m{}\x1b[0m",
            self.cgipat.as_deref().unwrap_or("DISABLED")
        )?;
        writeln!(
            f,
            "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mSign pattern:\x1b[0m \x1b[35m{}\x1b[0m",
            self.sigpat.as_deref().unwrap_or("DISABLED")
        )?;
        writeln!(
            f,
            "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mCGI limit:\x1b[0m   \x1b[33m{}\x1b[0m",
            if self.cgilimit == 0 { "unlimited".to_string() } else { self.cgilimit.to_string() }
        )?;

        if !self.error_pages.is_empty() {
            writeln!(f, "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mError Pages:\x1b[0m")?;
            let mut pages: Vec<_> = self.error_pages.iter().collect();
            pages.sort_by_key(|(code, _)| **code);
            for (code, path) in pages {
                writeln!(f, "    \x1b[38;5;244m{:4}\x1b[0m → \x1b[31m{}\x1b[0m", code, path)?;
            }
        }
        Ok(())
    }
}

pub fn display_config(configs: &[ServerConfig]) {
    println!("\n\x1b[1;35m 🔑 PGPD CONFIGURATION DASHBOARD\x1b[0m");
    println!("\x1b[38;5;240m ════════════════════════════════════════════════════════════════\x1b[0m");
    for (i, server) in configs.iter().enumerate() {
        println!("\n  \x1b[1;37mSERVER BLOCK {:02}\x1b[0m", i + 1);
        print!("{}", server);
    }
    println!("\n\x1b[38;5;240m ════════════════════════════════════════════════════════════════\x1b[0m");
    println!(" \x1b[1;32m✔\x1b[0m Configuration loaded successfully - Ready for requests!\n");
}

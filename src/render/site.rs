//! Site rendering: virtual host + ordered routes → nginx config text.
//!
//! # Responsibilities
//! - Emit the HTTP→HTTPS redirect block for TLS hosts
//! - Emit the primary server block with TLS material and policy
//! - Emit one location block per route, in repository order
//! - Emit the 404 fallback and per-domain log directives
//!
//! # Design Decisions
//! - Pure and deterministic: identical input renders byte-identical text,
//!   so later diffing/drift detection can compare strings directly
//! - Extra directives are emitted verbatim, preserving the operator's
//!   literal values

use std::path::{Path, PathBuf};

use crate::model::{normalize_path, Route, VirtualHost};
use crate::render::document::{Block, Document, Item};

/// Renders one virtual host into configuration text.
///
/// Owns only the log directory; everything else comes from the records,
/// so rendering stays a pure function of its inputs.
#[derive(Debug, Clone)]
pub struct ConfigRenderer {
    log_dir: PathBuf,
}

impl ConfigRenderer {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    /// Render the full per-domain configuration file.
    pub fn render(&self, host: &VirtualHost, routes: &[Route]) -> String {
        let mut doc = Document::new();

        if host.tls_enabled {
            doc.comment(format!(
                "{} - HTTP server block to redirect all traffic to HTTPS",
                host.name
            ));
            doc.block(redirect_block(host));
            doc.blank();
        }

        doc.comment(format!(
            "{} - {} server block",
            host.name,
            if host.tls_enabled { "HTTPS" } else { "HTTP" }
        ));
        doc.block(self.server_block(host, routes));

        doc.to_string()
    }

    fn server_block(&self, host: &VirtualHost, routes: &[Route]) -> Block {
        let mut server = Block::new("server", "");

        if host.tls_enabled {
            server.directive("listen", "443 ssl");
        } else {
            server.directive("listen", "80");
        }
        server.directive("server_name", &host.domain);

        if host.tls_enabled {
            server.directive("ssl_certificate", &host.cert_path);
            server.directive("ssl_certificate_key", &host.key_path);
            server.directive("ssl_protocols", "TLSv1.2 TLSv1.3");
            server.directive("ssl_ciphers", "HIGH:!aNULL:!MD5");
            server.directive("ssl_prefer_server_ciphers", "on");
        }

        // IPv6 upstream resolution breaks proxy_pass to v4-only targets.
        server.directive("resolver", "8.8.8.8 ipv6=off");

        for route in routes {
            server.blank();
            server.push(Item::Block(location_block(route)));
        }

        server.blank();
        server.comment("Default location for unmatched routes");
        let mut fallback = Block::new("location", "/");
        fallback.directive("return", "404 \"Route not found\"");
        server.push(Item::Block(fallback));

        server.blank();
        server.directive("access_log", self.log_path(&host.domain, "access"));
        server.directive("error_log", self.log_path(&host.domain, "error"));

        server
    }

    fn log_path(&self, domain: &str, stream: &str) -> String {
        self.log_dir
            .join(format!("{domain}.{stream}.log"))
            .display()
            .to_string()
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

fn redirect_block(host: &VirtualHost) -> Block {
    let mut block = Block::new("server", "");
    block.directive("listen", "80");
    block.directive("server_name", &host.domain);
    block.directive("return", "301 https://$host$request_uri");
    block
}

fn location_block(route: &Route) -> Block {
    let path = normalize_path(&route.path);
    let mut location = Block::new("location", &path);

    if route.use_rewrite {
        // Strip the matched prefix before forwarding upstream.
        location.directive("rewrite", format!("^{path}(.*)$ $1 break"));
    }

    location.directive("proxy_pass", format!("https://{}", route.target_domain));
    location.directive("proxy_set_header", format!("Host {}", route.target_domain));
    location.directive("proxy_set_header", "X-Real-IP $remote_addr");
    location.directive("proxy_set_header", "X-Forwarded-For $proxy_add_x_forwarded_for");
    location.directive("proxy_set_header", "X-Forwarded-Proto $scheme");
    location.directive("proxy_ssl_protocols", "TLSv1.2 TLSv1.3");
    location.directive("proxy_ssl_server_name", "on");
    location.directive("proxy_ssl_verify", "off");

    for (key, value) in route.extra_directives.iter() {
        // Verbatim, no escaping. Operator-owned power-user surface.
        location.directive(key, value);
    }

    location
}

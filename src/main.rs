//! nginx-manager CLI.
//!
//! Operator front end for the library: virtual-host and route CRUD against
//! the record store, plus the deployment pipeline (preview, deploy,
//! delete, reload). Replaces what a web layer would call.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nginx_manager::config::loader::{load_config, load_config_or_default};
use nginx_manager::config::ManagerConfig;
use nginx_manager::deploy::Deployer;
use nginx_manager::model::{ExtraDirectives, Route, VirtualHost};
use nginx_manager::repository::{JsonFileRepository, Repository};
use nginx_manager::system::{NginxChecker, SystemdReloader};

const DEFAULT_CONFIG_PATH: &str = "/etc/nginx-manager/config.toml";

#[derive(Parser)]
#[command(name = "nginx-manager")]
#[command(about = "Manage nginx reverse-proxy virtual hosts", long_about = None)]
struct Cli {
    /// Path to the manager config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage virtual hosts
    Host {
        #[command(subcommand)]
        command: HostCommands,
    },
    /// Manage routes within a virtual host
    Route {
        #[command(subcommand)]
        command: RouteCommands,
    },
    /// Print a host's rendered configuration without touching the filesystem
    Preview {
        /// Host name or domain
        host: String,
    },
    /// Render, activate, validate, and reload a host's configuration
    Deploy {
        /// Host name or domain
        host: String,
    },
    /// Re-trigger a reload without re-rendering
    Reload,
}

#[derive(Subcommand)]
enum HostCommands {
    /// Add a virtual host
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        domain: String,
        /// Terminate TLS on this host
        #[arg(long)]
        tls: bool,
        /// PEM certificate path (required with --tls)
        #[arg(long, default_value = "")]
        cert: String,
        /// PEM key path (required with --tls)
        #[arg(long, default_value = "")]
        key: String,
    },
    /// List virtual hosts
    List,
    /// Show a host and its routes
    Show {
        /// Host name or domain
        host: String,
    },
    /// Update a host's fields
    Update {
        /// Host name or domain
        host: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        domain: Option<String>,
        #[arg(long)]
        tls: Option<bool>,
        #[arg(long)]
        cert: Option<String>,
        #[arg(long)]
        key: Option<String>,
    },
    /// Delete a host, its routes, and its filesystem artifacts
    Rm {
        /// Host name or domain
        host: String,
    },
}

#[derive(Subcommand)]
enum RouteCommands {
    /// Add a route to a host (appended after existing routes)
    Add {
        /// Host name or domain
        host: String,
        /// Match prefix; a leading `/` is added when missing
        #[arg(long)]
        path: String,
        /// Upstream domain to forward to
        #[arg(long)]
        target: String,
        /// Forward without stripping the matched prefix
        #[arg(long)]
        no_rewrite: bool,
        /// Extra nginx directive, `key=value`, rendered verbatim (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },
    /// List a host's routes in rendering order
    List {
        /// Host name or domain
        host: String,
    },
    /// Update a route selected by host and path
    Update {
        /// Host name or domain
        host: String,
        /// Current match prefix of the route
        path: String,
        #[arg(long)]
        new_path: Option<String>,
        #[arg(long)]
        target: Option<String>,
        #[arg(long)]
        rewrite: Option<bool>,
        /// Replacement extra directives; providing any `--set` replaces all
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },
    /// Remove a route selected by host and path
    Rm {
        /// Host name or domain
        host: String,
        path: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nginx_manager=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => load_config_or_default(std::path::Path::new(DEFAULT_CONFIG_PATH))?,
    };

    let repository: Arc<dyn Repository> =
        Arc::new(JsonFileRepository::open(&config.store.path)?);
    let deployer = build_deployer(&config, repository.clone());

    match cli.command {
        Commands::Host { command } => run_host(command, repository.as_ref(), &deployer).await,
        Commands::Route { command } => run_route(command, repository.as_ref()),
        Commands::Preview { host } => {
            let host = resolve_host(repository.as_ref(), &host)?;
            print!("{}", deployer.render_preview(host.id).await?);
            Ok(())
        }
        Commands::Deploy { host } => {
            let host = resolve_host(repository.as_ref(), &host)?;
            deployer.deploy(host.id).await?;
            println!("{} deployed", host.domain);
            Ok(())
        }
        Commands::Reload => {
            deployer.reload().await?;
            println!("reload triggered");
            Ok(())
        }
    }
}

fn build_deployer(config: &ManagerConfig, repository: Arc<dyn Repository>) -> Deployer {
    Deployer::new(
        config.paths.clone(),
        config.timeouts.clone(),
        repository,
        Arc::new(NginxChecker::new(config.commands.check.clone())),
        Arc::new(SystemdReloader::new(config.commands.reload.clone())),
    )
}

async fn run_host(
    command: HostCommands,
    repository: &dyn Repository,
    deployer: &Deployer,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        HostCommands::Add {
            name,
            domain,
            tls,
            cert,
            key,
        } => {
            let host = VirtualHost::new(name, domain, tls, cert, key)?;
            repository.create_host(host.clone())?;
            println!("added {} ({})", host.name, host.domain);
        }
        HostCommands::List => {
            for host in repository.list()? {
                let tls = if host.tls_enabled { "tls" } else { "plain" };
                println!("{}\t{}\t{}", host.name, host.domain, tls);
            }
        }
        HostCommands::Show { host } => {
            let host = resolve_host(repository, &host)?;
            println!("name:   {}", host.name);
            println!("domain: {}", host.domain);
            println!("tls:    {}", host.tls_enabled);
            if host.tls_enabled {
                println!("cert:   {}", host.cert_path);
                println!("key:    {}", host.key_path);
            }
            println!("routes:");
            for route in repository.routes_for(host.id)? {
                let rewrite = if route.use_rewrite { "rewrite" } else { "as-is" };
                println!("  {} -> {} ({})", route.path, route.target_domain, rewrite);
            }
        }
        HostCommands::Update {
            host,
            name,
            domain,
            tls,
            cert,
            key,
        } => {
            let mut host = resolve_host(repository, &host)?;
            if let Some(name) = name {
                host.name = name;
            }
            if let Some(domain) = domain {
                host.domain = domain;
            }
            if let Some(tls) = tls {
                host.tls_enabled = tls;
            }
            if let Some(cert) = cert {
                host.cert_path = cert;
            }
            if let Some(key) = key {
                host.key_path = key;
            }
            repository.update_host(host.clone())?;
            println!("updated {}", host.name);
        }
        HostCommands::Rm { host } => {
            let host = resolve_host(repository, &host)?;
            let report = deployer.delete(host.id).await?;
            println!("deleted {}", host.domain);
            if !report.reload.success {
                eprintln!("warning: reload failed: {}", report.reload.diagnostic);
            }
        }
    }
    Ok(())
}

fn run_route(
    command: RouteCommands,
    repository: &dyn Repository,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        RouteCommands::Add {
            host,
            path,
            target,
            no_rewrite,
            set,
        } => {
            let host = resolve_host(repository, &host)?;
            let route = Route::new(host.id, path, target, !no_rewrite, parse_directives(&set)?)?;
            repository.create_route(route.clone())?;
            println!("added {} -> {}", route.path, route.target_domain);
        }
        RouteCommands::List { host } => {
            let host = resolve_host(repository, &host)?;
            for route in repository.routes_for(host.id)? {
                let rewrite = if route.use_rewrite { "rewrite" } else { "as-is" };
                println!("{}\t{}\t{}", route.path, route.target_domain, rewrite);
            }
        }
        RouteCommands::Update {
            host,
            path,
            new_path,
            target,
            rewrite,
            set,
        } => {
            let host = resolve_host(repository, &host)?;
            let mut route = resolve_route(repository, &host, &path)?;
            if let Some(new_path) = new_path {
                route.path = new_path;
            }
            if let Some(target) = target {
                route.target_domain = target;
            }
            if let Some(rewrite) = rewrite {
                route.use_rewrite = rewrite;
            }
            if !set.is_empty() {
                route.extra_directives = parse_directives(&set)?;
            }
            repository.update_route(route.clone())?;
            println!("updated {}", route.path);
        }
        RouteCommands::Rm { host, path } => {
            let host = resolve_host(repository, &host)?;
            let route = resolve_route(repository, &host, &path)?;
            repository.delete_route(route.id)?;
            println!("removed {}", route.path);
        }
    }
    Ok(())
}

/// Look a host up by name first, then by domain.
fn resolve_host(
    repository: &dyn Repository,
    needle: &str,
) -> Result<VirtualHost, Box<dyn std::error::Error>> {
    if let Some(host) = repository.find_by_name(needle)? {
        return Ok(host);
    }
    if let Some(host) = repository.find_by_domain(needle)? {
        return Ok(host);
    }
    Err(format!("no virtual host named {needle:?}").into())
}

fn resolve_route(
    repository: &dyn Repository,
    host: &VirtualHost,
    path: &str,
) -> Result<Route, Box<dyn std::error::Error>> {
    let normalized = nginx_manager::model::normalize_path(path);
    repository
        .routes_for(host.id)?
        .into_iter()
        .find(|r| r.path == normalized)
        .ok_or_else(|| format!("no route {normalized:?} on {}", host.domain).into())
}

fn parse_directives(pairs: &[String]) -> Result<ExtraDirectives, Box<dyn std::error::Error>> {
    let mut directives = ExtraDirectives::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("expected KEY=VALUE, got {pair:?}"))?;
        directives.insert(key, value);
    }
    Ok(directives)
}

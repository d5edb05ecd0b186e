use clap::{Parser, Subcommand};
use pktredir::config;
use pktredir::telemetry::{init_logging, EngineMetrics};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Looked for when `run` is given no explicit --config
const DEFAULT_CONFIG_PATH: &str = "pktredir.toml";

#[derive(Parser)]
#[command(name = "pktredir")]
#[command(about = "IPv4 destination address and port rewrite engine")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Run the capture and rewrite loop
    Run {
        /// Path to pktredir.toml; compiled-in defaults when absent
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Send a rule update to a running instance
    Set {
        /// Control socket path
        #[arg(short, long, default_value = config::DEFAULT_CONTROL_SOCKET)]
        socket: PathBuf,
        /// Update text: `<match_port> <target_ip> <target_port>` or key=value
        #[arg(required = true)]
        update: Vec<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate pktredir.toml without running
    Validate {
        /// Path to pktredir.toml
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Config { action }) => match action {
            ConfigAction::Validate {
                config: config_path,
            } => {
                init_logging(None);
                if let Err(e) = cmd_config_validate(&config_path) {
                    eprintln!("[ERROR] {}", e);
                    std::process::exit(1);
                }
            }
        },
        Some(Commands::Run {
            config: config_path,
        }) => {
            if let Err(e) = cmd_run(config_path.as_deref()) {
                eprintln!("[ERROR] {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Set { socket, update }) => {
            init_logging(None);
            if let Err(e) = cmd_set(&socket, &update.join(" ")) {
                eprintln!("[ERROR] {}", e);
                std::process::exit(1);
            }
        }
        None => {
            // Default: run with pktredir.toml when present
            if let Err(e) = cmd_run(None) {
                eprintln!("[ERROR] {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn load_config(config_path: Option<&Path>) -> Result<config::Config, String> {
    match config_path {
        Some(path) => {
            config::load(path).map_err(|e| format!("Failed to load {}: {}", path.display(), e))
        }
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if default.exists() {
                config::load(default)
                    .map_err(|e| format!("Failed to load {}: {}", default.display(), e))
            } else {
                Ok(config::Config::default())
            }
        }
    }
}

fn cmd_run(config_path: Option<&Path>) -> Result<(), String> {
    use pktredir::capture::AfPacketSocket;
    use pktredir::config::RuleStore;
    use pktredir::control::ControlServer;
    use pktredir::engine::{Disposition, RewriteEngine};
    use pktredir::protocol::ethernet::Frame;
    use tokio::runtime::Runtime;
    use tracing::{debug, error, trace, warn};

    let cfg = load_config(config_path)?;
    init_logging(Some(&cfg.log));

    let validation = config::validate(&cfg);
    validation.print_diagnostics();
    if validation.has_errors() {
        return Err("Validation failed with errors".to_string());
    }

    let ifname = cfg
        .capture
        .interface
        .clone()
        .ok_or_else(|| "No capture interface configured (set [capture] interface)".to_string())?;

    let store = Arc::new(RuleStore::new(cfg.rule.to_rule()));
    let metrics = Arc::new(EngineMetrics::new());
    let engine = RewriteEngine::new(Arc::clone(&store), Arc::clone(&metrics))
        .with_match_field(cfg.rule.match_field)
        .with_mode(cfg.engine.mode)
        .with_dump_payload(cfg.engine.dump_payload);

    info!(
        rule = %store.current(),
        mode = ?cfg.engine.mode,
        match_field = ?cfg.rule.match_field,
        "active rule loaded"
    );

    let rt = Runtime::new().map_err(|e| format!("Failed to create runtime: {}", e))?;

    rt.block_on(async move {
        info!("Binding to interface {}...", ifname);
        let mut socket = AfPacketSocket::bind(&ifname, cfg.capture.promiscuous).map_err(|e| {
            format!(
                "Failed to bind to {}: {}. Run with root privileges.",
                ifname, e
            )
        })?;

        if cfg.control.enabled {
            let server = ControlServer::bind(
                &cfg.control.socket,
                Arc::clone(&store),
                Arc::clone(&metrics),
            )
            .await
            .map_err(|e| format!("Failed to bind control socket: {}", e))?;
            tokio::spawn(server.serve());
        }

        info!("Engine started, processing packets...");

        let mut stats_timer = tokio::time::interval(std::time::Duration::from_secs(30));
        let mut buf = vec![0u8; 2048];

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down");
                    break;
                }
                _ = stats_timer.tick() => {
                    let line: Vec<String> = metrics
                        .export()
                        .iter()
                        .map(|(name, value)| format!("{name}={value}"))
                        .collect();
                    debug!("stats: {}", line.join(" "));
                }
                result = socket.recv(&mut buf) => {
                    let len = match result {
                        Ok(len) => len,
                        Err(e) => {
                            error!("Receive error: {}", e);
                            continue;
                        }
                    };
                    metrics.frames_received.inc();
                    metrics.rx_bytes.add(len as u64);

                    let frame = match Frame::parse(&mut buf[..len]) {
                        Ok(frame) if frame.is_ipv4() => frame,
                        _ => {
                            metrics.frames_non_ipv4.inc();
                            trace!(len, "skipped non-IPv4 frame");
                            continue;
                        }
                    };

                    let disposition = engine.process(frame.into_payload());

                    if disposition == Disposition::Rewritten && cfg.capture.reinject {
                        match socket.send(&buf[..len]).await {
                            Ok(_) => metrics.reinjected.inc(),
                            Err(e) => {
                                metrics.reinject_errors.inc();
                                warn!("Failed to reinject frame: {}", e);
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    })
}

fn cmd_config_validate(config_path: &Path) -> Result<(), String> {
    println!("[INFO] Validating {}...", config_path.display());

    let cfg = config::load(config_path).map_err(|e| format!("Failed to parse config: {}", e))?;

    let validation = config::validate(&cfg);
    validation.print_diagnostics();

    if validation.has_errors() {
        Err("Validation failed".to_string())
    } else {
        println!("[INFO] Configuration is valid");
        Ok(())
    }
}

fn cmd_set(socket: &Path, update: &str) -> Result<(), String> {
    use pktredir::control;
    use tokio::runtime::Runtime;

    let rt = Runtime::new().map_err(|e| format!("Failed to create runtime: {}", e))?;
    let reply = rt
        .block_on(control::send_update(socket, update))
        .map_err(|e| format!("Failed to reach {}: {}", socket.display(), e))?;

    println!("{}", reply);
    if reply.starts_with("ERR") {
        return Err("Update rejected".to_string());
    }
    Ok(())
}

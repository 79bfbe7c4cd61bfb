//! Herald — notification relay for browser extensions
//!
//! Without a subcommand this is the native messaging host: the browser
//! launches it, talks frames over stdin/stdout, and local producers submit
//! notifications through the Unix socket. `herald serve` runs the HTTP
//! polling transport instead.

use clap::Parser;
use herald::bridge::Bridge;
use herald::config::{self, Config};
use herald::error::ClientError;
use herald::manifest::{Browser, HostManifest};
use herald::server::IngressSocket;
use herald::store::NotificationStore;
use herald::{NotificationRequest, Priority, SubmitResponse, client, http, ipc};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// Exit status of `herald send` when the relay cannot be reached.
const EXIT_NOT_RUNNING: u8 = 2;

#[derive(Parser)]
#[command(name = "herald", about = "Notification relay for browser extensions")]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Relay socket path
    #[arg(long, global = true, env = ipc::SOCKET_ENV)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,

    /// Arguments the browser passes when launching the host (ignored)
    #[arg(hide = true)]
    launcher_args: Vec<String>,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the HTTP polling server
    Serve {
        /// Port to listen on (127.0.0.1)
        #[arg(long)]
        port: Option<u16>,
        /// Number of notifications to keep
        #[arg(long)]
        capacity: Option<usize>,
    },
    /// Send a notification to the running relay
    Send {
        title: String,
        message: String,
        #[arg(value_enum, default_value_t = Priority::Info)]
        priority: Priority,
    },
    /// Register the native messaging host with the browser
    InstallManifest {
        /// ID of the extension allowed to connect
        #[arg(long)]
        extension_id: String,
        #[arg(long, value_enum, default_value_t = Browser::Chrome)]
        browser: Browser,
        /// Directory to write into instead of the browser's default
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Print the resolved configuration
    Config {
        /// Also save it to the config file
        #[arg(long)]
        write: bool,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_env("HERALD_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));
    // stdout carries the native messaging frames.
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if !cli.launcher_args.is_empty() {
        debug!(args = ?cli.launcher_args, "launched by browser");
    }

    let mut config = config::load_config();
    if let Some(socket) = cli.socket {
        config.socket_path = Some(socket);
    }

    match cli.command {
        None => run_relay(&config),
        Some(Command::Serve { port, capacity }) => {
            if let Some(port) = port {
                config.http_port = port;
            }
            if let Some(capacity) = capacity {
                config.capacity = capacity;
            }
            run_polling_server(&config)
        }
        Some(Command::Send {
            title,
            message,
            priority,
        }) => send(&config, NotificationRequest::new(title, message, priority)),
        Some(Command::InstallManifest {
            extension_id,
            browser,
            dir,
        }) => install_manifest(&config, &extension_id, browser, dir),
        Some(Command::Config { write }) => show_config(&config, write),
    }
}

fn runtime() -> Option<tokio::runtime::Runtime> {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => Some(rt),
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            None
        }
    }
}

/// Resolves on Ctrl-C. If the handler cannot be installed, never resolves.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// Native messaging host: socket ingress plus the stdio bridge.
fn run_relay(config: &Config) -> ExitCode {
    let Some(rt) = runtime() else {
        return ExitCode::FAILURE;
    };
    let socket_path = ipc::socket_path(config.socket_path.as_deref());

    let status = rt.block_on(async move {
        let ingress = match IngressSocket::bind(&socket_path) {
            Ok(ingress) => ingress,
            Err(e) => {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
        };
        info!("Native host started");

        let bridge = Arc::new(Bridge::new(tokio::io::stdout()));
        let status = tokio::select! {
            result = bridge.run_inbound(tokio::io::stdin()) => match result {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!("Extension channel failed: {}", e);
                    ExitCode::FAILURE
                }
            },
            () = ingress.serve(Arc::clone(&bridge), interrupted()) => ExitCode::SUCCESS,
        };

        // Removes the socket file.
        drop(ingress);
        status
    });

    // A pending stdin read would otherwise hold the runtime open.
    rt.shutdown_background();
    status
}

fn run_polling_server(config: &Config) -> ExitCode {
    let Some(rt) = runtime() else {
        return ExitCode::FAILURE;
    };
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, config.http_port));
    let store = Arc::new(NotificationStore::new(config.capacity));

    match rt.block_on(http::serve(addr, store, interrupted())) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn send(config: &Config, request: NotificationRequest) -> ExitCode {
    let path = ipc::socket_path(config.socket_path.as_deref());
    match client::send(&path, &request) {
        Ok(SubmitResponse::Ok { id }) => {
            println!("Notification sent: {} (id {id})", request.title);
            ExitCode::SUCCESS
        }
        Ok(SubmitResponse::Error { message }) => {
            eprintln!("Failed: {message}");
            ExitCode::FAILURE
        }
        Err(e @ ClientError::Connect { .. }) => {
            eprintln!("herald is not running: {e}");
            eprintln!("Open the browser and make sure the extension is loaded.");
            ExitCode::from(EXIT_NOT_RUNNING)
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn install_manifest(
    config: &Config,
    extension_id: &str,
    browser: Browser,
    dir: Option<PathBuf>,
) -> ExitCode {
    let executable = match std::env::current_exe() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Could not determine the herald executable: {e}");
            return ExitCode::FAILURE;
        }
    };
    let result = browser.resolve_hosts_dir(dir).and_then(|dir| {
        HostManifest::new(&config.host_name, &executable, extension_id)?.install(&dir)
    });
    match result {
        Ok(path) => {
            println!("Installed native messaging host manifest: {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn show_config(config: &Config, write: bool) -> ExitCode {
    match serde_json::to_string_pretty(config) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    }

    if write {
        match config::save_config(config) {
            Ok(path) => eprintln!("Saved to {}", path.display()),
            Err(e) => {
                eprintln!("Failed to save config: {e}");
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn cli_no_subcommand() {
        let cli = Cli::try_parse_from(["herald"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 0);
        assert!(cli.launcher_args.is_empty());
    }

    #[test]
    fn cli_accepts_chrome_launch_origin() {
        let cli =
            Cli::try_parse_from(["herald", "chrome-extension://abcdefghijklmnopabcdefghijklmnop/"])
                .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.launcher_args.len(), 1);
    }

    #[test]
    fn cli_accepts_firefox_launch_args() {
        let cli = Cli::try_parse_from([
            "herald",
            "/home/user/.mozilla/native-messaging-hosts/com.herald.monitor.json",
            "herald@example.org",
        ])
        .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.launcher_args.len(), 2);
    }

    #[test]
    fn cli_verbose_three() {
        let cli = Cli::try_parse_from(["herald", "-vvv"]).unwrap();
        assert_eq!(cli.verbose, 3);
    }

    #[test]
    fn cli_send_defaults_to_info() {
        let cli = Cli::try_parse_from(["herald", "send", "Build", "done"]).unwrap();
        match cli.command {
            Some(Command::Send {
                title,
                message,
                priority,
            }) => {
                assert_eq!(title, "Build");
                assert_eq!(message, "done");
                assert_eq!(priority, Priority::Info);
            }
            _ => panic!("expected Send command"),
        }
    }

    #[test]
    fn cli_send_with_priority() {
        let cli =
            Cli::try_parse_from(["herald", "send", "Error", "Build failed", "error"]).unwrap();
        match cli.command {
            Some(Command::Send { priority, .. }) => assert_eq!(priority, Priority::Error),
            _ => panic!("expected Send command"),
        }
    }

    #[test]
    fn cli_send_rejects_unknown_priority() {
        assert!(Cli::try_parse_from(["herald", "send", "T", "M", "urgent"]).is_err());
    }

    #[test]
    fn cli_serve_port() {
        let cli = Cli::try_parse_from(["herald", "serve", "--port", "9000"]).unwrap();
        match cli.command {
            Some(Command::Serve { port, capacity }) => {
                assert_eq!(port, Some(9000));
                assert_eq!(capacity, None);
            }
            _ => panic!("expected Serve command"),
        }
    }

    #[test]
    fn cli_global_socket_after_subcommand() {
        let cli =
            Cli::try_parse_from(["herald", "send", "T", "M", "--socket", "/tmp/x.sock"]).unwrap();
        assert_eq!(cli.socket, Some(PathBuf::from("/tmp/x.sock")));
    }

    #[test]
    fn cli_install_manifest() {
        let cli = Cli::try_parse_from([
            "herald",
            "install-manifest",
            "--extension-id",
            "abcdefghijklmnopabcdefghijklmnop",
            "--browser",
            "chromium",
        ])
        .unwrap();
        match cli.command {
            Some(Command::InstallManifest {
                extension_id,
                browser,
                dir,
            }) => {
                assert_eq!(extension_id, "abcdefghijklmnopabcdefghijklmnop");
                assert_eq!(browser, Browser::Chromium);
                assert!(dir.is_none());
            }
            _ => panic!("expected InstallManifest command"),
        }
    }
}

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use songbook::auth::{ADMINISTRATOR_KEY_FILE, KeyRing};
use songbook::config::ServerConfig;
use songbook::server::{AppState, create_router};

#[cfg(unix)]
fn set_restrictive_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

#[derive(Parser)]
#[command(name = "songbook")]
#[command(about = "A song catalog server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, env = "HOST", default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, env = "PORT", default_value = "8080")]
        port: u16,

        /// Data directory for keys and songs
        #[arg(long, env = "DATA_ROOT", default_value = "./data")]
        data_dir: PathBuf,

        /// Directory of static web assets
        #[arg(long, env = "WEB_ROOT", default_value = "./web")]
        web_root: PathBuf,

        /// Song directory, defaults to <data-dir>/songs
        #[arg(long, env = "SONGS_ROOT")]
        songs_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Create the data directory and print the administrator key
    Init {
        /// Data directory for keys and songs
        #[arg(long, env = "DATA_ROOT", default_value = "./data")]
        data_dir: PathBuf,
    },

    /// Replace the administrator key
    RotateKey {
        /// Data directory for keys and songs
        #[arg(long, env = "DATA_ROOT", default_value = "./data")]
        data_dir: PathBuf,
    },
}

fn print_key(key: &str, key_file: &Path) {
    println!();
    println!("========================================");
    println!("Administrator key:");
    println!();
    println!("  {key}");
    println!();
    println!("Key stored in: {}", key_file.display());
    println!("========================================");
    println!();
}

fn run_init(data_dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(data_dir)?;

    let keys = KeyRing::load(data_dir);
    let Some(key) = keys.administrator_key() else {
        anyhow::bail!("No administrator key available in {}", data_dir.display());
    };

    let key_file = data_dir.join(ADMINISTRATOR_KEY_FILE);
    #[cfg(unix)]
    set_restrictive_permissions(&key_file);

    print_key(&key, &key_file);
    Ok(())
}

fn run_rotate_key(data_dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(data_dir)?;

    let keys = KeyRing::load(data_dir);
    let key = keys.rotate_administrator_key()?;

    let key_file = data_dir.join(ADMINISTRATOR_KEY_FILE);
    #[cfg(unix)]
    set_restrictive_permissions(&key_file);

    print_key(&key, &key_file);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("songbook=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init { data_dir } => run_init(&data_dir)?,
            AdminCommands::RotateKey { data_dir } => run_rotate_key(&data_dir)?,
        },
        Commands::Serve {
            host,
            port,
            data_dir,
            web_root,
            songs_dir,
        } => {
            let config = ServerConfig {
                host,
                port,
                data_dir,
                web_root,
                songs_dir,
            };

            let state = Arc::new(AppState::open(&config)?);
            if let Some(key) = state.keys.pending_alert() {
                info!("Administrator key not yet used: {key}");
            }

            let app = create_router(state);
            let addr = config.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}

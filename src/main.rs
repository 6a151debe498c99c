//! gitconf - a Git-backed multi-tenant configuration store
//!
//! This is the main entry point for the gitconf server.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use gitconf::events::PushBus;
use gitconf::server::{self, AppState};
use gitconf::settings::Settings;
use gitconf::storage::RepoManager;
use gitconf::validator::SchemaValidator;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let mut settings = Settings::from_env();

    // Parse simple command line args.
    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-r" | "--root" => {
                i += 1;
                if i < args.len() {
                    settings.root = PathBuf::from(&args[i]);
                }
            }
            "-l" | "--listen" => {
                i += 1;
                if i < args.len() {
                    match args[i].parse() {
                        Ok(addr) => settings.listen = addr,
                        Err(_) => {
                            eprintln!("Invalid listen address: {}", args[i]);
                            return ExitCode::FAILURE;
                        }
                    }
                }
            }
            "-s" | "--schemas" => {
                i += 1;
                if i < args.len() {
                    settings.schema_dir = Some(PathBuf::from(&args[i]));
                }
            }
            "--git-auth-on-private-networks" => {
                settings.git_auth_on_private_networks = true;
            }
            "-h" | "--help" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            "--version" => {
                println!("gitconf v{}", env!("CARGO_PKG_VERSION"));
                return ExitCode::SUCCESS;
            }
            arg => {
                eprintln!("Unknown option: {}", arg);
                return ExitCode::FAILURE;
            }
        }
        i += 1;
    }

    let repos = match RepoManager::new(&settings.root) {
        Ok(repos) => repos,
        Err(e) => {
            eprintln!("Error opening repository root: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let validator = match load_validator(settings.schema_dir.as_deref()) {
        Ok(validator) => validator,
        Err(e) => {
            eprintln!("Error loading schemas: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let listen = settings.listen;
    let state = AppState::new(repos, PushBus::new(), validator, settings);
    let app = server::router(state);

    tracing::info!(%listen, "gitconf listening");
    let listener = match tokio::net::TcpListener::bind(listen).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Error binding {}: {}", listen, e);
            return ExitCode::FAILURE;
        }
    };

    let service = app.into_make_service_with_connect_info::<SocketAddr>();
    if let Err(e) = axum::serve(listener, service).await {
        eprintln!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Register every `<name>.json` in the schema directory; each schema
/// governs files named `<name>` anywhere in the working tree.
fn load_validator(
    schema_dir: Option<&std::path::Path>,
) -> Result<SchemaValidator, Box<dyn std::error::Error>> {
    let mut validator = SchemaValidator::new();
    let Some(dir) = schema_dir else {
        return Ok(validator);
    };

    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    entries.sort();

    for path in entries {
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let text = std::fs::read_to_string(&path)?;
        let schema: serde_json::Value = serde_json::from_str(&text)?;
        validator.add_schema(name, &schema)?;
        validator.add_rule(&format!("(^|/){}$", regex::escape(name)), name)?;
        tracing::info!(schema = name, "registered schema");
    }

    Ok(validator)
}

fn print_help() {
    println!("gitconf - a Git-backed multi-tenant configuration store");
    println!();
    println!("Usage: gitconf [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -r, --root PATH        Repository root directory (default: ./repos)");
    println!("  -l, --listen ADDR      Bind address (default: 0.0.0.0:3002)");
    println!("  -s, --schemas PATH     Directory of JSON Schema documents");
    println!("  --git-auth-on-private-networks");
    println!("                         Require credentials even on private networks");
    println!("  -h, --help             Show this help message");
    println!("  --version              Show version");
    println!();
    println!("Environment: GITCONF_ROOT, GITCONF_LISTEN, GITCONF_SCHEMA_DIR,");
    println!("             GITCONF_GIT_AUTH_ON_PRIVATE_NETWORKS");
}

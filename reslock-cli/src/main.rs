mod handlers;
mod server;

use clap::{Parser, Subcommand};

use reslock_core::types::ResourceType;

#[derive(Parser)]
#[command(
    name = "reslock",
    about = "reslock — Advisory resource locks with automatic expiry",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the reslock HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3100")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Storage backend: "memory" or "sqlite:<path>"
        #[arg(long, default_value = "memory", env = "RESLOCK_STORAGE")]
        storage: String,

        /// Lock lifetime in seconds when a request does not give one
        #[arg(long, default_value = "600", env = "RESLOCK_DEFAULT_TTL")]
        default_ttl: u64,
    },

    /// Reap expired locks of one resource type from a persistent store
    Sweep {
        /// Storage backend: "sqlite:<path>"
        #[arg(long, env = "RESLOCK_STORAGE")]
        storage: String,

        /// Resource type to sweep
        #[arg(long = "type")]
        resource_type: String,

        /// Also sweep the holders of this resource
        #[arg(long)]
        resource: Option<String>,
    },

    /// Print version information
    Version,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            host,
            storage,
            default_ttl,
        } => {
            server::run(&host, port, &storage, default_ttl).await;
        }
        Commands::Sweep {
            storage,
            resource_type,
            resource,
        } => {
            if let Err(e) = sweep(&storage, &resource_type, resource.as_deref()) {
                tracing::error!("Sweep failed: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Version => {
            println!("reslock {}", env!("CARGO_PKG_VERSION"));
            println!("Advisory, time-bounded resource locking");
        }
    }
}

fn sweep(storage: &str, resource_type: &str, resource: Option<&str>) -> Result<(), String> {
    if storage == "memory" {
        return Err("an in-memory store is empty at startup; use sqlite:<path>".to_string());
    }
    let resource_type = ResourceType::new(resource_type).map_err(|e| e.to_string())?;
    let registry = server::create_registry(storage, reslock_core::config::DEFAULT_TTL_SECS)?;
    let report = registry
        .sweep(&resource_type, resource)
        .map_err(|e| e.to_string())?;

    println!(
        "{}",
        serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_rejects_memory_storage() {
        assert!(sweep("memory", "Order", None).is_err());
    }

    #[test]
    fn test_sweep_rejects_unknown_backend_and_bad_type() {
        assert!(sweep("redis://localhost", "Order", None).is_err());
        assert!(sweep("sqlite:/nonexistent-dir/locks.db", "Sales Order", None).is_err());
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_sweep_runs_against_sqlite_file() {
        let path = std::env::temp_dir().join(format!("reslock-cli-sweep-{}.db", std::process::id()));
        let path = path.to_str().unwrap().to_string();
        let storage = format!("sqlite:{}", path);

        {
            let registry = server::create_registry(&storage, 600).unwrap();
            let order = ResourceType::new("Order").unwrap();
            registry.acquire(&order, 42, 7).unwrap();
        }

        assert!(sweep(&storage, "Order", Some("42")).is_ok());

        let registry = server::create_registry(&storage, 600).unwrap();
        let order = ResourceType::new("Order").unwrap();
        assert_eq!(registry.holders(&order, 42).unwrap(), vec!["7"]);

        drop(registry);
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path, suffix));
        }
    }
}

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::list::ListCmd;
use ordl_config::{report_unused_keys, UnusedKeyPolicy};
use ordl_list::ListSettings;
use ordl_store::ListStore;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ordl")]
#[command(about = "Ordered id lists over PostgreSQL", long_about = None)]
struct Cli {
    /// Layered config paths in merge order (base -> env -> overrides)
    #[arg(long = "config", global = true)]
    config_paths: Vec<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<String>,

        /// Fail when the config carries keys nothing reads
        #[arg(long, default_value_t = false)]
        strict: bool,
    },

    /// Ordered list operations on one list key
    List {
        /// Full list key (e.g. ordlist:people:group_id:1)
        key: String,

        #[command(subcommand)]
        cmd: ListCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    /// Connectivity + schema presence
    Status,

    /// Apply SQL migrations
    Migrate,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Dev-time convenience; absent in deployments.
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let loaded = commands::load_config(&cli.config_paths)?;
            let pool = commands::connect_pool(&loaded).await?;
            match cmd {
                DbCmd::Status => {
                    let s = ordl_store::status(&pool).await?;
                    println!(
                        "db_ok={} has_lists_table={} list_count={}",
                        s.ok, s.has_lists_table, s.list_count
                    );
                }
                DbCmd::Migrate => {
                    ordl_store::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths, strict } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = ordl_config::load_layered_yaml(&path_refs)?;
            let policy = if strict {
                UnusedKeyPolicy::Fail
            } else {
                UnusedKeyPolicy::Warn
            };
            let report = report_unused_keys(&loaded.config_json, policy)?;
            // Reject invalid tunables here too, not only at first use.
            ListSettings::from_config_json(&loaded.config_json)?;
            ordl_config::StoreSettings::from_config_json(&loaded.config_json)?;

            println!("config_hash={}", loaded.config_hash);
            println!("unused_keys={}", report.unused_leaf_pointers.len());
            println!("{}", loaded.canonical_json);
        }

        Commands::List { key, cmd } => {
            let loaded = commands::load_config(&cli.config_paths)?;
            let settings = ListSettings::from_config_json(&loaded.config_json)?;
            let store: Arc<dyn ListStore> = Arc::new(commands::open_store(&loaded).await?);
            for line in commands::list::run(store, &key, settings, cmd).await? {
                println!("{line}");
            }
        }
    }

    Ok(())
}

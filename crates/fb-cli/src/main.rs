use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "fb")]
#[command(about = "FinnBourse order workflow console", long_about = None)]
struct Cli {
    /// Layered config paths in merge order (base -> env -> local)
    #[arg(long = "config", global = true)]
    config_paths: Vec<String>,

    /// Act as another stage granted by the token (`roles` claim)
    #[arg(long, global = true)]
    role: Option<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Order commands
    Order {
        #[command(subcommand)]
        cmd: OrderCmd,
    },

    /// Residual order commands
    Residual {
        #[command(subcommand)]
        cmd: ResidualCmd,
    },

    /// Workflow reference
    Workflow {
        #[command(subcommand)]
        cmd: WorkflowCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[derive(Subcommand)]
enum OrderCmd {
    /// Print an order, its status and the actions available to the caller
    Show {
        #[arg(long)]
        id: String,
    },

    /// List orders visible to the caller
    List {
        /// Status code or name (repeatable)
        #[arg(long = "status")]
        statuses: Vec<String>,

        #[arg(long)]
        investor: Option<String>,

        #[arg(long)]
        negotiator: Option<String>,
    },

    /// Request a transition (submit | validate | partial | reject | cancel | expire)
    Act {
        #[arg(long)]
        id: String,

        #[arg(long)]
        action: String,

        /// Validated quantity (required for partial)
        #[arg(long)]
        quantity: Option<u64>,

        /// Validated price in currency units, e.g. 540.5
        #[arg(long)]
        price: Option<f64>,

        /// Reason attached to reject / cancel
        #[arg(long)]
        motif: Option<String>,
    },
}

#[derive(Subcommand)]
enum ResidualCmd {
    /// Create the residual owed by a partially validated order.
    /// Safe to repeat: the backend dedups on the residual key.
    Retry {
        /// Parent order id
        #[arg(long)]
        parent: String,
    },
}

#[derive(Subcommand)]
enum WorkflowCmd {
    /// Print the role -> (source states, target states) table
    Table {
        /// Emit JSON instead of key=value lines
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience).
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();
    let role = cli.role.as_deref();

    match cli.cmd {
        Commands::Order { cmd } => match cmd {
            OrderCmd::Show { id } => commands::order::show(&cli.config_paths, role, &id).await?,
            OrderCmd::List {
                statuses,
                investor,
                negotiator,
            } => {
                commands::order::list(&cli.config_paths, role, &statuses, investor, negotiator)
                    .await?
            }
            OrderCmd::Act {
                id,
                action,
                quantity,
                price,
                motif,
            } => {
                let req = commands::order::ActArgs {
                    id,
                    action,
                    quantity,
                    price,
                    motif,
                };
                commands::order::act(&cli.config_paths, role, req).await?
            }
        },

        Commands::Residual { cmd } => match cmd {
            ResidualCmd::Retry { parent } => {
                commands::residual::retry(&cli.config_paths, role, &parent).await?
            }
        },

        Commands::Workflow { cmd } => match cmd {
            WorkflowCmd::Table { json } => commands::workflow::table(json)?,
        },

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = fb_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }
    }

    Ok(())
}

/// Logs go to stderr; stdout carries command output only.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}

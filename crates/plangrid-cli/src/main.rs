use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "plangrid",
    about = "plangrid: execution-plan lifecycle tooling",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the metadata a plan file declares through its annotations.
    ///
    /// Reads `@Plan:name`, `@Plan:description`, `@Plan:trace`,
    /// `@Plan:statistics` and the `@Import`/`@Export` stream bindings.
    Inspect {
        /// Path to the plan file
        path: String,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// List the plan files in a tenant repository
    Files {
        /// Processor configuration (plangrid.toml)
        #[arg(short, long, default_value = "plangrid.toml")]
        config: String,
        /// Tenant id
        #[arg(short, long, allow_hyphen_values = true)]
        tenant: i32,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("plangrid=info".parse()?)
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { path, format } => commands::inspect::inspect(&path, &format),
        Commands::Files { config, tenant } => commands::files::files(&config, tenant),
    }
}

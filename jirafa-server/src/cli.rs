use clap::{Parser, Subcommand};

const HELP_EPILOG: &str = r#"Server options can also be provided via environment variables:
  CONFIG_PATH (default: ./config.yaml)
  DB_PATH     (default: data/app.db)
  PORT        (default: 5151 or config.listen_port)
  RUST_LOG    (default: info)

Parent accounts listed under `users` in the config are created at startup;
use `hash-password` to produce their bcrypt hashes.
"#;

#[derive(Debug, Parser)]
#[command(
    name = "jirafa-server",
    version,
    about = "Jirafa growth tracking server",
    long_about = None,
    after_long_help = HELP_EPILOG,
)]
pub struct Cli {
    /// Optional subcommand. Without one, runs the server.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print a bcrypt hash suitable for the `users` config section
    HashPassword {
        /// Password to hash
        password: String,
        /// bcrypt cost factor
        #[arg(long, default_value_t = bcrypt::DEFAULT_COST)]
        cost: u32,
    },
}

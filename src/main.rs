use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

use rostersync::{app, commands, config, db, logging};

#[derive(Parser, Debug)]
#[command(name = "rostersync")]
#[command(about = "Keep an encrypted offline copy of the employee roster in sync")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/rostersync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let _log_guard = logging::init(&db::data_dir()?)?;

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  let app = app::App::new(config)?;
  app.run(args.command).await?;

  Ok(())
}

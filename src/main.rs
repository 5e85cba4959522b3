// Entrypoint for the CLI application.
// - Keeps `main` small: load configuration, set up logging and hand over
//   to the command loop.

use legym_cli::{config::Config, ui::main_loop};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    init_logging();

    // Configuration comes from `LEGYM_*` environment variables (or `.env`).
    let config = Config::from_env()?;
    tracing::debug!(base_url = %config.base_url, "Configuration loaded");

    // Start the interactive loop. This call blocks until the user quits.
    main_loop(config)?;
    Ok(())
}

/// Log to stderr so diagnostics never interleave with command output.
/// Verbosity follows `RUST_LOG` and defaults to warnings only.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

use clap::Parser;
use tracing::debug;

use seohub::cli::{Cli, Commands};
use seohub::config::{get_config, init_config, init_config_from};
use seohub::runtime::modes;
use seohub::system::init_logging;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match cli.config.as_deref() {
        Some(path) => init_config_from(path),
        None => init_config(),
    }

    match cli.command {
        None | Some(Commands::Serve) => {
            let config = get_config();
            // guard 必须存活到进程结束，否则非阻塞日志不会刷盘
            let _guard = init_logging(&config.logging)?;
            debug!(
                "Configuration loaded from {}",
                cli.config.as_deref().unwrap_or("config.toml")
            );
            modes::run_server().await
        }
        Some(cmd) => {
            if let Err(e) = modes::run_cli(cmd).await {
                eprintln!("{}", e.format_colored());
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

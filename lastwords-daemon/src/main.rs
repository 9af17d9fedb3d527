use anyhow::Result;
use clap::Parser;

use lastwords_daemon::cli::DaemonCli;
use lastwords_daemon::logging::init_tracing;
use lastwords_daemon::orchestrator::{Orchestrator, load_config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // 설정 로딩: 파일 → 환경변수 → CLI 인자 순으로 적용
    let config = load_config(&cli).await?;

    if cli.validate {
        println!("configuration OK: {}", cli.config.display());
        return Ok(());
    }

    init_tracing(&config.general)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "lastwords-daemon starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config)?;
    orchestrator.run().await?;

    tracing::info!("lastwords-daemon shut down");
    Ok(())
}

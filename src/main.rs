use anyhow::Result;
use clap::Parser;
use skillpath::cli::Args;
use skillpath::launch;
use tokio_util::sync::CancellationToken;
use tracing::{Level, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let request = args.research_request()?;
    let config = args.into_config()?;

    // 日志写到stderr，stdout只输出报告
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if config.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("收到中断信号，正在取消调研");
            on_signal.cancel();
        }
    });

    launch(&config, request, cancel).await
}

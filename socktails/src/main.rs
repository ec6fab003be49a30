use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use socktails::{Acceptor, Config};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = Config::parse();

    // 根令牌：运行时长到期或收到终止信号时取消
    let shutdown = CancellationToken::new();
    tokio::spawn(watch_lifetime(shutdown.clone(), config.duration));

    let acceptor = Acceptor::bind(
        config.listen_addr(),
        config.relay_config(),
        shutdown.child_token(),
    )
    .await?;
    info!(
        "SOCKS5 代理启动在 {} (运行时长: {:?})",
        acceptor.local_addr()?,
        config.duration
    );

    acceptor.run().await?;
    info!("代理已关闭");
    Ok(())
}

async fn watch_lifetime(shutdown: CancellationToken, lifetime: Duration) {
    tokio::select! {
        _ = tokio::time::sleep(lifetime) => info!("运行时长 {:?} 已到，开始关闭", lifetime),
        signal = termination_signal() => info!("收到信号 {}，开始关闭", signal),
    }
    shutdown.cancel();
}

#[cfg(unix)]
async fn termination_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!("无法监听 SIGTERM: {}", e);
            return ctrl_c().await;
        }
    };

    tokio::select! {
        _ = terminate.recv() => "SIGTERM",
        name = ctrl_c() => name,
    }
}

#[cfg(not(unix))]
async fn termination_signal() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // 无法监听时只靠运行时长退出
        warn!("无法监听 Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    "SIGINT"
}

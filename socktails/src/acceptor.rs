use crate::session::{handle_connection, RelayConfig};
use anyhow::{Context, Result};
use log::{debug, error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// 监听循环：每个连接一个独立任务，取消令牌触发后关闭监听套接字
pub struct Acceptor {
    listener: TcpListener,
    config: Arc<RelayConfig>,
    shutdown: CancellationToken,
}

impl Acceptor {
    pub fn new(listener: TcpListener, config: RelayConfig, shutdown: CancellationToken) -> Self {
        Self {
            listener,
            config: Arc::new(config),
            shutdown,
        }
    }

    pub async fn bind(
        addr: SocketAddr,
        config: RelayConfig,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("监听 {} 失败", addr))?;
        Ok(Self::new(listener, config, shutdown))
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// 运行到取消令牌触发（返回 `Ok`）或 accept 出错（返回错误）。
    ///
    /// 监听套接字随本函数返回而关闭，只关闭一次；已建立的会话不受影响。
    pub async fn run(self) -> Result<()> {
        let Acceptor {
            listener,
            config,
            shutdown,
        } = self;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("停止接受新连接");
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok((socket, addr)) => spawn_session(socket, addr, Arc::clone(&config)),
                    Err(e) => {
                        error!("接受连接时出错: {}", e);
                        return Err(e).context("监听循环异常退出");
                    }
                },
            }
        }
    }
}

fn spawn_session(socket: TcpStream, addr: SocketAddr, config: Arc<RelayConfig>) {
    tokio::spawn(async move {
        let session_id = new_session_id();
        debug!("[{}] 新连接来自: {}", session_id, addr);
        match handle_connection(socket, &session_id, &config).await {
            Ok(_) => debug!("[{}] 连接结束", session_id),
            Err(e) => debug!("[{}] 处理连接时出错: {}", session_id, e),
        }
    });
}

/// 日志里区分会话用的短 ID
fn new_session_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_stops_accept_loop() {
        let shutdown = CancellationToken::new();
        let acceptor = Acceptor::bind(
            "127.0.0.1:0".parse().unwrap(),
            RelayConfig::default(),
            shutdown.clone(),
        )
        .await
        .unwrap();
        let handle = tokio::spawn(acceptor.run());

        shutdown.cancel();
        // 重复取消无副作用
        shutdown.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("监听循环没有退出")
            .unwrap();
        assert!(result.is_ok());
    }

    #[test]
    fn test_session_id_is_short_hex() {
        let id = new_session_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}

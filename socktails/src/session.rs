use crate::error::SessionError;
use crate::protocol::{
    encode_reply, ReplyCode, TargetAddr, CONNECT_COMMAND, NO_AUTHENTICATION, SOCKS_VERSION,
};
use log::{debug, info, warn};
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
};

/// 连接目标服务器的默认超时
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub dial_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
        }
    }
}

/// 转发阶段先结束的方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToTarget,
    TargetToClient,
}

#[derive(Debug)]
pub struct RelaySummary {
    pub first_done: Direction,
    /// 先结束方向上复制的字节数，出错时为 `None`
    pub bytes: Option<u64>,
}

/// 处理一个客户端连接：握手、解析请求、连接目标、回复、双向转发。
///
/// `client` 和目标连接都归本函数所有，任何返回路径上都会被关闭。
/// 每个会话最多发送一次最终回复。
pub async fn handle_connection<S>(
    client: S,
    session_id: &str,
    config: &RelayConfig,
) -> Result<RelaySummary, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    relay_session(client, session_id, config, |addr| async move {
        TcpStream::connect(addr).await
    })
    .await
}

/// 会话主体，`connect` 负责按 `host:port` 建立到目标的连接
async fn relay_session<S, T, F, Fut>(
    mut client: S,
    session_id: &str,
    config: &RelayConfig,
    connect: F,
) -> Result<RelaySummary, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    T: AsyncRead + AsyncWrite,
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    // 处理握手
    handle_handshake(&mut client).await?;

    // 处理请求
    let target_addr = match handle_request(&mut client).await {
        Ok(addr) => addr,
        Err(e) => {
            send_failure_response(&mut client, &e).await;
            return Err(e);
        }
    };
    info!("[{}] 目标地址: {}", session_id, target_addr);

    // 连接到目标服务器，域名解析也计入超时，不重试
    let addr = target_addr.to_string();
    let target = match connect_within(connect(addr.clone()), config.dial_timeout, &addr).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("[{}] {}", session_id, e);
            send_failure_response(&mut client, &e).await;
            return Err(e);
        }
    };

    // 发送成功响应
    client.write_all(&encode_reply(ReplyCode::Succeeded)).await?;

    // 开始转发数据
    let summary = forward_data(client, target).await;
    debug!(
        "[{}] 转发结束: {:?} 先完成, {:?} 字节",
        session_id, summary.first_done, summary.bytes
    );
    Ok(summary)
}

async fn handle_handshake<S>(client: &mut S) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = [0u8; 2];
    client.read_exact(&mut buf).await?;
    let [version, nmethods] = buf;

    if version != SOCKS_VERSION {
        return Err(SessionError::BadVersion(version));
    }

    // 只支持无认证，客户端提供的方法列表读出后丢弃
    let mut methods = vec![0u8; nmethods as usize];
    client.read_exact(&mut methods).await?;

    client.write_all(&[SOCKS_VERSION, NO_AUTHENTICATION]).await?;
    Ok(())
}

async fn handle_request<R>(client: &mut R) -> Result<TargetAddr, SessionError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 4];
    client.read_exact(&mut buf).await?;
    let [version, command, _reserved, address_type] = buf;

    if version != SOCKS_VERSION {
        return Err(SessionError::BadVersion(version));
    }

    if command != CONNECT_COMMAND {
        return Err(SessionError::UnsupportedCommand(command));
    }

    TargetAddr::read_from(client, address_type).await
}

/// 失败回复尽力发送，写失败也没有别的可报告
async fn send_failure_response<W>(client: &mut W, err: &SessionError)
where
    W: AsyncWrite + Unpin,
{
    if let Some(code) = err.reply_code() {
        let _ = client.write_all(&encode_reply(code)).await;
    }
}

async fn connect_within<T, F>(connect: F, timeout: Duration, target: &str) -> Result<T, SessionError>
where
    F: Future<Output = io::Result<T>>,
{
    match tokio::time::timeout(timeout, connect).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(SessionError::Unreachable {
            target: target.to_string(),
            source,
        }),
        Err(_) => Err(SessionError::DialTimeout {
            target: target.to_string(),
            timeout,
        }),
    }
}

/// 双向转发，任一方向结束（EOF 或出错）即返回。
///
/// 返回时两端连接都被释放，另一方向上挂起的读写随之取消。
pub async fn forward_data<C, T>(client: C, target: T) -> RelaySummary
where
    C: AsyncRead + AsyncWrite,
    T: AsyncRead + AsyncWrite,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut target_read, mut target_write) = tokio::io::split(target);

    let client_to_target = tokio::io::copy(&mut client_read, &mut target_write);
    let target_to_client = tokio::io::copy(&mut target_read, &mut client_write);

    let (first_done, result) = tokio::select! {
        result = client_to_target => (Direction::ClientToTarget, result),
        result = target_to_client => (Direction::TargetToClient, result),
    };

    let bytes = match result {
        Ok(n) => Some(n),
        Err(e) => {
            debug!("{:?} 方向转发出错: {}", first_done, e);
            None
        }
    };

    RelaySummary { first_done, bytes }
}

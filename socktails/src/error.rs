use crate::protocol::ReplyCode;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// 单个会话内的错误，不会传播到其他会话或监听循环
#[derive(Debug, Error)]
pub enum SessionError {
    /// 读写失败或提前断开，不回复客户端
    #[error("连接读写错误: {0}")]
    Io(#[from] io::Error),
    #[error("不支持的SOCKS版本: {0}")]
    BadVersion(u8),
    #[error("不支持的命令: {0}")]
    UnsupportedCommand(u8),
    #[error("不支持的地址类型: {0}")]
    UnsupportedAddressType(u8),
    #[error("连接目标 {target} 超时 ({timeout:?})")]
    DialTimeout { target: String, timeout: Duration },
    #[error("连接目标 {target} 失败: {source}")]
    Unreachable {
        target: String,
        #[source]
        source: io::Error,
    },
}

impl SessionError {
    /// 该错误对应的回复码；`None` 表示直接断开，不回复
    pub fn reply_code(&self) -> Option<ReplyCode> {
        match self {
            SessionError::Io(_) | SessionError::BadVersion(_) => None,
            SessionError::UnsupportedCommand(_) => Some(ReplyCode::CommandNotSupported),
            SessionError::UnsupportedAddressType(_) => Some(ReplyCode::AddressTypeNotSupported),
            SessionError::DialTimeout { .. } | SessionError::Unreachable { .. } => {
                Some(ReplyCode::HostUnreachable)
            }
        }
    }
}

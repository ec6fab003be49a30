//! socktails：最小化的 SOCKS5 代理。
//!
//! 只支持无认证方式下的 CONNECT 命令。每个连接一个独立任务，
//! 任一方向关闭后结束转发。

pub mod acceptor;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;

pub use acceptor::Acceptor;
pub use config::Config;
pub use error::SessionError;
pub use protocol::{ReplyCode, TargetAddr};
pub use session::{handle_connection, RelayConfig, DEFAULT_DIAL_TIMEOUT};

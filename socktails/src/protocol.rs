use crate::error::SessionError;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use tokio::io::{AsyncRead, AsyncReadExt};

pub const SOCKS_VERSION: u8 = 0x05;
pub const NO_AUTHENTICATION: u8 = 0x00;
pub const CONNECT_COMMAND: u8 = 0x01;
pub const IPV4_ADDRESS: u8 = 0x01;
pub const DOMAIN_NAME: u8 = 0x03;
pub const IPV6_ADDRESS: u8 = 0x04;

/// 回复固定为 10 字节：VER REP RSV ATYP(IPv4) BND.ADDR(4) BND.PORT(2)
pub const REPLY_LEN: usize = 10;

/// RFC 1928 定义的回复状态码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReplyCode {
    Succeeded = 0x00,
    GeneralFailure = 0x01,
    ConnectionNotAllowed = 0x02,
    NetworkUnreachable = 0x03,
    HostUnreachable = 0x04,
    ConnectionRefused = 0x05,
    TtlExpired = 0x06,
    CommandNotSupported = 0x07,
    AddressTypeNotSupported = 0x08,
}

impl ReplyCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// 编码回复。绑定地址始终填 0.0.0.0:0，不报告真实的出口地址。
pub fn encode_reply(code: ReplyCode) -> [u8; REPLY_LEN] {
    [
        SOCKS_VERSION,           // 版本
        code.as_u8(),            // 状态码
        0x00,                    // 保留字段
        IPV4_ADDRESS,            // 地址类型 (IPv4)
        0x00, 0x00, 0x00, 0x00,  // IP地址 (0.0.0.0)
        0x00, 0x00,              // 端口 (0)
    ]
}

/// 请求中的目标地址 (DST.ADDR + DST.PORT)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetAddr {
    Ipv4(Ipv4Addr, u16),
    Ipv6(Ipv6Addr, u16),
    /// 域名不在解析阶段解析，留给拨号时处理
    Domain(String, u16),
}

impl TargetAddr {
    /// 按地址类型读取地址和端口。
    ///
    /// 未知的地址类型在读取任何地址字节之前就返回
    /// [`SessionError::UnsupportedAddressType`]。
    pub async fn read_from<R>(reader: &mut R, address_type: u8) -> Result<Self, SessionError>
    where
        R: AsyncRead + Unpin,
    {
        match address_type {
            IPV4_ADDRESS => {
                let mut addr_buf = [0u8; 4];
                reader.read_exact(&mut addr_buf).await?;
                let port = reader.read_u16().await?;
                Ok(TargetAddr::Ipv4(Ipv4Addr::from(addr_buf), port))
            }
            DOMAIN_NAME => {
                let domain_len = reader.read_u8().await? as usize;
                let mut domain_buf = vec![0u8; domain_len];
                reader.read_exact(&mut domain_buf).await?;
                let domain = String::from_utf8_lossy(&domain_buf).into_owned();
                let port = reader.read_u16().await?;
                Ok(TargetAddr::Domain(domain, port))
            }
            IPV6_ADDRESS => {
                let mut addr_buf = [0u8; 16];
                reader.read_exact(&mut addr_buf).await?;
                let port = reader.read_u16().await?;
                Ok(TargetAddr::Ipv6(Ipv6Addr::from(addr_buf), port))
            }
            other => Err(SessionError::UnsupportedAddressType(other)),
        }
    }
}

/// 拨号用的 `host:port` 形式，IPv6 地址加方括号
impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetAddr::Ipv4(ip, port) => write!(f, "{}:{}", ip, port),
            TargetAddr::Ipv6(ip, port) => write!(f, "[{}]:{}", ip, port),
            TargetAddr::Domain(domain, port) if domain.contains(':') => {
                write!(f, "[{}]:{}", domain, port)
            }
            TargetAddr::Domain(domain, port) => write!(f, "{}:{}", domain, port),
        }
    }
}

use crate::session::RelayConfig;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// 命令行参数，每一项都可以用环境变量设置
#[derive(Parser, Debug)]
#[command(name = "socktails")]
#[command(about = "Minimal SOCKS5 relay (CONNECT only, no authentication)")]
pub struct Config {
    /// SOCKS5 listen port
    #[arg(short, long, env = "SOCKS_PORT", default_value_t = 1080)]
    pub port: u16,

    /// Listen IP address
    #[arg(short, long = "listen", env = "LISTEN_ADDR", default_value = "0.0.0.0")]
    pub listen_ip: IpAddr,

    /// How long to run before exiting (e.g. 4h, 30m)
    #[arg(short, long, env = "DURATION", default_value = "4h", value_parser = parse_duration)]
    pub duration: Duration,

    /// Timeout for connecting to the destination (e.g. 15s)
    #[arg(long, env = "DIAL_TIMEOUT", default_value = "15s", value_parser = parse_duration)]
    pub dial_timeout: Duration,
}

impl Config {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_ip, self.port)
    }

    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            dial_timeout: self.dial_timeout,
        }
    }
}

/// 解析 `4h`、`1h30m`、`1.5s`、`500ms` 这类时长，单位 ns/us/µs/ms/s/m/h。
/// 单独的 `0` 可以不带单位。
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("时长不能为空".to_string());
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut nanos = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_end == 0 {
            return Err(format!("无效的时长: {}", input));
        }
        let value: f64 = rest[..num_end]
            .parse()
            .map_err(|_| format!("无效的时长: {}", input))?;
        rest = &rest[num_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_end] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err(format!("时长缺少单位: {}", input)),
            unit => return Err(format!("未知的时长单位 {:?}: {}", unit, input)),
        };
        nanos += value * scale;
        rest = &rest[unit_end..];
    }

    if !nanos.is_finite() || nanos > u64::MAX as f64 {
        return Err(format!("时长过大: {}", input));
    }
    Ok(Duration::from_nanos(nanos.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    /// 从参数定义里取默认值和环境变量名，不受当前环境影响
    fn arg_defaults(id: &str) -> (String, Option<String>) {
        let command = Config::command();
        let arg = command
            .get_arguments()
            .find(|a| a.get_id() == id)
            .unwrap();
        let default = arg.get_default_values()[0].to_string_lossy().into_owned();
        let env = arg.get_env().map(|e| e.to_string_lossy().into_owned());
        (default, env)
    }

    #[test]
    fn test_default_config() {
        assert_eq!(
            arg_defaults("port"),
            ("1080".to_string(), Some("SOCKS_PORT".to_string()))
        );
        assert_eq!(
            arg_defaults("listen_ip"),
            ("0.0.0.0".to_string(), Some("LISTEN_ADDR".to_string()))
        );

        let (duration, env) = arg_defaults("duration");
        assert_eq!(parse_duration(&duration).unwrap(), Duration::from_secs(4 * 3600));
        assert_eq!(env.as_deref(), Some("DURATION"));

        let (dial_timeout, env) = arg_defaults("dial_timeout");
        assert_eq!(parse_duration(&dial_timeout).unwrap(), Duration::from_secs(15));
        assert_eq!(env.as_deref(), Some("DIAL_TIMEOUT"));
    }

    #[test]
    fn test_custom_flags() {
        let config = Config::try_parse_from([
            "socktails",
            "--port",
            "9050",
            "--listen",
            "127.0.0.1",
            "--duration",
            "30m",
            "--dial-timeout",
            "2s",
        ])
        .unwrap();
        assert_eq!(config.listen_addr(), "127.0.0.1:9050".parse().unwrap());
        assert_eq!(config.duration, Duration::from_secs(30 * 60));
        assert_eq!(config.dial_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_invalid_port_and_duration() {
        assert!(Config::try_parse_from(["socktails", "-p", "notanumber"]).is_err());
        assert!(Config::try_parse_from(["socktails", "-d", "forever"]).is_err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("4h").unwrap(), Duration::from_secs(14400));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("10µs").unwrap(), Duration::from_micros(10));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_duration_errors() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("15").is_err());
        assert!(parse_duration("3d").is_err());
        assert!(parse_duration("-1h").is_err());
        assert!(parse_duration("h").is_err());
    }
}

//! Configuration utilities: env-var driven, no config file parsing.

use std::env;
use std::net::{Ipv4Addr, SocketAddr};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub jwt_secret: String,
    /// `true` when `NODE_ENV`/`MODE` marks this a test run; the binary
    /// skips binding the network listener so it can be driven in-process.
    pub test_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let port = env::var("PORT").ok().and_then(|v| v.parse::<u16>().ok()).unwrap_or(8080);
        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| "dev-secret-do-not-use-in-prod".to_string());
        let mode = env::var("NODE_ENV").or_else(|_| env::var("MODE")).unwrap_or_default();
        let test_mode = matches!(mode.as_str(), "test" | "testing");
        Config { port, jwt_secret, test_mode }
    }

    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

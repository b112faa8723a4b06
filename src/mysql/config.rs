use mysql_async::{Opts, OptsBuilder};

use crate::config::Credentials;
use crate::error::MiddlewareError;

pub const DEFAULT_PORT: u16 = 3306;

/// Statements every new link runs before it is handed out.
pub const INIT_STATEMENTS: &[&str] = &["SET NAMES 'UTF8'"];

/// Connection options for `host`, which may carry a `:port` suffix.
///
/// # Errors
/// Returns `MiddlewareError::Configuration` if the host is empty or the port is not a number.
pub fn build_opts(host: &str, credentials: &Credentials) -> Result<Opts, MiddlewareError> {
    let (hostname, port) = match host.rsplit_once(':') {
        Some((name, port)) => {
            let port = port.parse::<u16>().map_err(|e| {
                MiddlewareError::Configuration(format!("Invalid port in host \"{host}\": {e}"))
            })?;
            (name, port)
        }
        None => (host, DEFAULT_PORT),
    };
    if hostname.is_empty() {
        return Err(MiddlewareError::Configuration(
            "host is required".to_string(),
        ));
    }

    let builder = OptsBuilder::default()
        .ip_or_hostname(hostname)
        .tcp_port(port)
        .user(Some(credentials.user.as_str()))
        .pass(Some(credentials.password.as_str()))
        .init(INIT_STATEMENTS.to_vec());
    Ok(builder.into())
}

//! Opening handshake classification
//!
//! Peers identify themselves through the upgrade request's query string:
//!
//! ```text
//! /?role=worker&sysInfo=%7B%22publicIP%22%3A%22203.0.113.7%22%7D
//! ```
//!
//! `isClient=true|false` is accepted in place of `role` for older peers.

use tokio_tungstenite::tungstenite::handshake::server::ErrorResponse;
use tokio_tungstenite::tungstenite::http::{StatusCode, Uri};
use url::form_urlencoded;

use crate::error::{Error, Result};
use crate::types::{Handshake, Role, SysInfo};

/// Extract role and system info from an upgrade request URI
pub fn parse_handshake(uri: &Uri) -> Result<Handshake> {
    let mut role = None;
    let mut is_client = None;
    let mut sys_info = None;

    for (key, value) in form_urlencoded::parse(uri.query().unwrap_or("").as_bytes()) {
        match &*key {
            "role" => role = Some(value.into_owned()),
            "isClient" => is_client = Some(value.into_owned()),
            "sysInfo" => sys_info = Some(value.into_owned()),
            _ => {}
        }
    }

    let role = match (role, is_client) {
        (Some(role), _) => role.parse::<Role>().map_err(Error::handshake)?,
        (None, Some(flag)) => match flag.as_str() {
            "true" => Role::Requester,
            "false" => Role::Worker,
            other => return Err(Error::handshake(format!("invalid isClient value '{}'", other))),
        },
        (None, None) => return Err(Error::handshake("missing role")),
    };

    let sys_info = match sys_info {
        Some(raw) => parse_sys_info(&raw)?,
        None => SysInfo::default(),
    };

    Ok(Handshake { role, sys_info })
}

fn parse_sys_info(raw: &str) -> Result<SysInfo> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| Error::handshake(format!("sysInfo is not JSON: {}", e)))?;

    let object = value
        .as_object()
        .ok_or_else(|| Error::handshake("sysInfo must be a JSON object"))?;

    if !object.is_empty() && !object.get("publicIP").is_some_and(|ip| ip.is_string()) {
        return Err(Error::handshake("sysInfo must carry a string publicIP"));
    }

    serde_json::from_value(value).map_err(|e| Error::handshake(format!("invalid sysInfo: {}", e)))
}

/// HTTP response refusing an upgrade
pub fn reject(status: StatusCode, reason: impl Into<String>) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.into()));
    *response.status_mut() = status;
    response
}

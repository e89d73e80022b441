//! Hub wire format
//!
//! The JSON flavour of the SignalR hub protocol: records are JSON objects
//! terminated by `0x1e`, and the first record on a connection is the
//! handshake. Only what a listening client needs is modelled.

use plansync_domain::{PlanSyncError, Result};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

pub const RECORD_SEPARATOR: char = '\u{1e}';

const TYPE_INVOCATION: u8 = 1;
const TYPE_PING: u8 = 6;
const TYPE_CLOSE: u8 = 7;

/// One decoded hub record.
#[derive(Debug, Clone, PartialEq)]
pub enum HubRecord {
    /// Reply to our handshake; `error` set when the hub refused it.
    Handshake { error: Option<String> },
    /// A server-to-client call of the named event.
    Invocation { target: String, arguments: Vec<Value> },
    Ping,
    Close { error: Option<String>, allow_reconnect: bool },
    /// Completions, stream items and anything newer than this client.
    Other(u8),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    #[serde(rename = "type")]
    kind: Option<u8>,
    target: Option<String>,
    #[serde(default)]
    arguments: Vec<Value>,
    error: Option<String>,
    allow_reconnect: Option<bool>,
}

/// `{"protocol":"json","version":1}` plus the terminator.
pub fn handshake_request() -> String {
    format!(r#"{{"protocol":"json","version":1}}{RECORD_SEPARATOR}"#)
}

pub fn ping_record() -> String {
    format!(r#"{{"type":{TYPE_PING}}}{RECORD_SEPARATOR}"#)
}

/// Non-empty records of one text frame.
pub fn split_records(frame: &str) -> impl Iterator<Item = &str> {
    frame.split(RECORD_SEPARATOR).map(str::trim).filter(|record| !record.is_empty())
}

/// Decode a single record.
///
/// # Errors
/// `PlanSyncError::Transport` when the record is not a JSON object or an
/// invocation has no target.
pub fn parse_record(record: &str) -> Result<HubRecord> {
    let raw: RawRecord = serde_json::from_str(record)
        .map_err(|err| PlanSyncError::Transport(format!("unreadable hub record: {err}")))?;

    let parsed = match raw.kind {
        None => HubRecord::Handshake { error: raw.error },
        Some(TYPE_INVOCATION) => {
            let target = raw.target.ok_or_else(|| {
                PlanSyncError::Transport("hub invocation without a target".into())
            })?;
            HubRecord::Invocation { target, arguments: raw.arguments }
        }
        Some(TYPE_PING) => HubRecord::Ping,
        Some(TYPE_CLOSE) => HubRecord::Close {
            error: raw.error,
            allow_reconnect: raw.allow_reconnect.unwrap_or(true),
        },
        Some(other) => HubRecord::Other(other),
    };
    Ok(parsed)
}

/// Reply to `POST <hub>/negotiate`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiateResponse {
    #[serde(default)]
    pub connection_id: Option<String>,
    #[serde(default)]
    pub connection_token: Option<String>,
    /// Redirect to another hub endpoint.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `<hub>/negotiate?<hub query>&negotiateVersion=1`.
///
/// # Errors
/// `PlanSyncError::Config` for an unparsable hub URL.
pub fn negotiate_url(hub_url: &str) -> Result<Url> {
    let mut url = parse_hub_url(hub_url)?;
    let path = format!("{}/negotiate", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.query_pairs_mut().append_pair("negotiateVersion", "1");
    Ok(url)
}

/// WebSocket endpoint for a negotiated connection.
///
/// # Errors
/// `PlanSyncError::Config` for an unparsable hub URL or a scheme other than
/// http(s) or ws(s).
pub fn websocket_url(hub_url: &str, connection_token: &str, access_token: &str) -> Result<Url> {
    let mut url = parse_hub_url(hub_url)?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(PlanSyncError::Config(format!("unsupported hub URL scheme: {other}")));
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| PlanSyncError::Config(format!("cannot use {scheme} for {hub_url}")))?;
    url.query_pairs_mut()
        .append_pair("id", connection_token)
        .append_pair("access_token", access_token);
    Ok(url)
}

fn parse_hub_url(hub_url: &str) -> Result<Url> {
    Url::parse(hub_url).map_err(|err| PlanSyncError::Config(format!("invalid hub URL: {err}")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn frames_split_on_separator() {
        let frame = format!("{{}}{RECORD_SEPARATOR}{{\"type\":6}}{RECORD_SEPARATOR}");
        let records: Vec<_> = split_records(&frame).collect();
        assert_eq!(records, vec!["{}", r#"{"type":6}"#]);
    }

    #[test]
    fn parses_the_records_a_listener_cares_about() {
        assert_eq!(parse_record("{}").unwrap(), HubRecord::Handshake { error: None });
        assert_eq!(
            parse_record(r#"{"error":"Requested protocol 'json' is not available"}"#).unwrap(),
            HubRecord::Handshake { error: Some("Requested protocol 'json' is not available".into()) }
        );
        assert_eq!(
            parse_record(
                r#"{"type":1,"target":"dateAdded","arguments":[{"id":"2025-01-02","byUser":"bob"}]}"#
            )
            .unwrap(),
            HubRecord::Invocation {
                target: "dateAdded".into(),
                arguments: vec![json!({"id": "2025-01-02", "byUser": "bob"})],
            }
        );
        assert_eq!(parse_record(r#"{"type":6}"#).unwrap(), HubRecord::Ping);
        assert_eq!(
            parse_record(r#"{"type":7,"error":"idle","allowReconnect":false}"#).unwrap(),
            HubRecord::Close { error: Some("idle".into()), allow_reconnect: false }
        );
        assert_eq!(
            parse_record(r#"{"type":7}"#).unwrap(),
            HubRecord::Close { error: None, allow_reconnect: true }
        );
        assert_eq!(parse_record(r#"{"type":3,"invocationId":"1"}"#).unwrap(), HubRecord::Other(3));
    }

    #[test]
    fn invocation_without_target_is_rejected() {
        assert!(matches!(parse_record(r#"{"type":1}"#), Err(PlanSyncError::Transport(_))));
        assert!(parse_record("not json").is_err());
    }

    #[test]
    fn negotiate_url_keeps_hub_query() {
        let url = negotiate_url("https://hub.example/client/?hub=plans").unwrap();
        assert_eq!(url.as_str(), "https://hub.example/client/negotiate?hub=plans&negotiateVersion=1");
    }

    #[test]
    fn websocket_url_switches_scheme_and_adds_credentials() {
        let url = websocket_url("https://hub.example/client/?hub=plans", "tok en", "jwt").unwrap();
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.query(), Some("hub=plans&id=tok+en&access_token=jwt"));

        let url = websocket_url("http://localhost:8080/hub", "c", "t").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8080/hub?id=c&access_token=t");

        assert!(websocket_url("ftp://hub", "c", "t").is_err());
    }
}

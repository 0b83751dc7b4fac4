use serde::Serialize;

/// Everything the `json` command could find out about a server.
///
/// Fields are filled in as each step succeeds; a server that only answers
/// the ping still yields a report.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct JsonReport {
    pub online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ping: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_max: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub players: Vec<PlayerSample>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugins: Option<Vec<String>>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PlayerSample {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

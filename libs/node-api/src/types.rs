//! Wire types exchanged with the node session service.

use serde::{Deserialize, Serialize};

/// Body of `POST /instance/create`.
///
/// The gateway only inspects the name and token; the raw client body is
/// what actually gets forwarded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInstanceRequest {
    #[serde(rename = "instanceName", default)]
    pub instance_name: String,

    #[serde(default)]
    pub token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qrcode: Option<bool>,
}

/// One entry of a node's `fetchInstances` report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReportedInstance {
    #[serde(rename = "instanceName", alias = "name", default)]
    pub name: Option<String>,

    #[serde(default, alias = "state", alias = "connectionStatus")]
    pub status: Option<String>,

    #[serde(rename = "apikey", alias = "apiKey", alias = "token", default)]
    pub api_key: Option<String>,
}

// Older node builds wrap each entry in an `instance` object.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawReportedInstance {
    Nested { instance: ReportedInstance },
    Flat(ReportedInstance),
}

impl ReportedInstance {
    /// Decode a `fetchInstances` body, accepting both flat and nested entries.
    pub fn parse_list(body: &[u8]) -> Result<Vec<Self>, serde_json::Error> {
        let raw: Vec<RawReportedInstance> = serde_json::from_slice(body)?;
        Ok(raw
            .into_iter()
            .map(|entry| match entry {
                RawReportedInstance::Nested { instance } => instance,
                RawReportedInstance::Flat(instance) => instance,
            })
            .collect())
    }
}

/// Body of `GET /instance/connectionState/{name}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ConnectionStateReport {
    Nested { instance: StateField },
    Flat(StateField),
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateField {
    #[serde(alias = "status")]
    pub state: String,
}

impl ConnectionStateReport {
    /// Extract the reported state, if the body carries one.
    pub fn parse_state(body: &[u8]) -> Option<String> {
        let report: Self = serde_json::from_slice(body).ok()?;
        let state = match report {
            Self::Nested { instance } => instance.state,
            Self::Flat(field) => field.state,
        };
        Some(state)
    }
}

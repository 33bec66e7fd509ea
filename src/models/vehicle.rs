//! Vehicle resource models

use serde::{Deserialize, Deserializer, Serialize};

/// Returned by [`component_status`] when no entry matches.
pub const NOT_FOUND: &str = "Not Found";

/// Accept either a JSON string or number, keeping the text form.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Num(n) => n.to_string(),
    })
}

/// Response of `GET /vehicles`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleList {
    #[serde(rename = "vehicles")]
    pub vehicle_ids: Vec<String>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paging {
    #[serde(deserialize_with = "string_or_number")]
    pub count: String,
    #[serde(deserialize_with = "string_or_number")]
    pub offset: String,
}

/// Response of `GET /vehicles/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleSummary {
    pub id: String,
    pub make: String,
    pub model: String,
    #[serde(deserialize_with = "string_or_number")]
    pub year: String,
}

/// One component's state inside a [`LockStatus`] list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentStatus {
    #[serde(rename = "type")]
    pub component_type: String,
    pub status: String,
}

/// Response of `GET /vehicles/{id}/security`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockStatus {
    pub is_locked: bool,
    #[serde(default)]
    pub doors: Vec<ComponentStatus>,
    #[serde(default)]
    pub windows: Vec<ComponentStatus>,
    #[serde(default)]
    pub sunroof: Vec<ComponentStatus>,
    #[serde(default)]
    pub storage: Vec<ComponentStatus>,
    #[serde(default)]
    pub charging_port: Vec<ComponentStatus>,
}

/// Look up a component's status by type. The provider does not guarantee
/// unique types; the first match wins.
pub fn component_status<'a>(components: &'a [ComponentStatus], component_type: &str) -> &'a str {
    components
        .iter()
        .find(|c| c.component_type == component_type)
        .map(|c| c.status.as_str())
        .unwrap_or(NOT_FOUND)
}

/// Flattened view of the components a lock status screen shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleStatusSummary {
    pub sunroof: String,
    pub charging_port: String,
    pub front_storage: String,
    pub rear_storage: String,
}

impl From<&LockStatus> for VehicleStatusSummary {
    fn from(status: &LockStatus) -> Self {
        // Some makes report the sunroof under "front" rather than "sunroof".
        let sunroof = match component_status(&status.sunroof, "sunroof") {
            NOT_FOUND => component_status(&status.sunroof, "front"),
            found => found,
        };

        Self {
            sunroof: sunroof.to_string(),
            charging_port: component_status(&status.charging_port, "chargingPort").to_string(),
            front_storage: component_status(&status.storage, "front").to_string(),
            rear_storage: component_status(&status.storage, "rear").to_string(),
        }
    }
}

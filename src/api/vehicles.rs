//! Vehicle list, info, and security endpoints

use serde_json::json;

use super::client::VehicleClient;
use crate::error::{Error, ErrorKind, Result};
use crate::models::{LockStatus, VehicleList, VehicleSummary};

/// Vehicle IDs go into the URL as one encoded segment. Empty and dot
/// segments would address the collection itself, so they are refused.
fn vehicle_segment(kind: ErrorKind, id: &str) -> Result<&str> {
    match id {
        "" | "." | ".." => Err(Error::InvalidVehicleId {
            kind,
            id: id.to_string(),
        }),
        _ => Ok(id),
    }
}

impl VehicleClient {
    /// IDs of every vehicle the user connected.
    pub async fn list_vehicles(&self) -> Result<Vec<String>> {
        Ok(self.list_vehicles_page().await?.vehicle_ids)
    }

    /// Full `GET /vehicles` response, including paging.
    pub async fn list_vehicles_page(&self) -> Result<VehicleList> {
        tracing::debug!("Listing vehicles");
        let resp = self.send(&[], None).await?;
        resp.parse(ErrorKind::VehicleList, "GetVehicleList")
    }

    pub async fn get_vehicle_info(&self, id: &str) -> Result<VehicleSummary> {
        tracing::debug!(vehicle = %id, "Fetching vehicle info");
        let id = vehicle_segment(ErrorKind::VehicleInfo, id)?;
        let resp = self.send(&[id], None).await?;
        resp.parse(ErrorKind::VehicleInfo, "GetVehicleInfo")
    }

    pub async fn get_lock_status(&self, id: &str) -> Result<LockStatus> {
        tracing::debug!(vehicle = %id, "Fetching lock status");
        let id = vehicle_segment(ErrorKind::LockStatus, id)?;
        let resp = self.send(&[id, "security"], None).await?;
        resp.parse(ErrorKind::LockStatus, "GetLockStatus")
    }

    /// Send a lock or unlock command. The provider does not report when the
    /// command completes; re-read the lock status to observe it.
    pub async fn set_lock(&self, id: &str, locked: bool) -> Result<()> {
        let action = if locked { "LOCK" } else { "UNLOCK" };
        tracing::debug!(vehicle = %id, action, "Sending security command");

        let id = vehicle_segment(ErrorKind::LockOrUnlock, id)?;
        let body = json!({ "action": action });
        let resp = self.send(&[id, "security"], Some(&body)).await?;
        resp.check(ErrorKind::LockOrUnlock, "LockOrUnlock")?;

        tracing::info!(vehicle = %id, "Response from {} attempt: {}", action, resp.body);
        Ok(())
    }
}

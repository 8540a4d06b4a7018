//! Portal endpoint wrappers
//!
//! The portal serves pre-rendered JSON blobs out of its cache plus an
//! `api3.php` query interface. Shapes are passed through verbatim as
//! `serde_json::Value`. All of these expect JSON, so an HTML body counts as
//! an expired session and triggers the self-heal retry.

use common::ApiResponse;
use serde_json::Value;

use crate::client::{PortalRequestOptions, ZwiftPowerApi, to_json};
use crate::error::Result;

fn json_options() -> PortalRequestOptions {
    PortalRequestOptions {
        expect_json: true,
        ..Default::default()
    }
}

impl ZwiftPowerApi {
    /// Critical power profile for an athlete, optionally scoped to one event.
    pub async fn get_critical_power_profile(
        &self,
        athlete_id: u64,
        event_id: Option<u64>,
        profile_type: &str,
    ) -> Result<ApiResponse<Value>> {
        let event = event_id.map(|id| id.to_string()).unwrap_or_default();
        let url = format!(
            "{}/api3.php?do=critical_power_profile&zwift_id={athlete_id}&zwift_event_id={event}&type={profile_type}",
            self.base_url()
        );
        Ok(to_json(self.get_authenticated(&url, None, json_options()).await?))
    }

    pub async fn get_event_results(&self, event_id: u64) -> Result<ApiResponse<Value>> {
        let url = format!("{}/cache3/results/{event_id}_zwift.json", self.base_url());
        Ok(to_json(self.get_authenticated(&url, None, json_options()).await?))
    }

    pub async fn get_event_view_results(&self, event_id: u64) -> Result<ApiResponse<Value>> {
        let url = format!("{}/cache3/results/{event_id}_view.json", self.base_url());
        Ok(to_json(self.get_authenticated(&url, None, json_options()).await?))
    }

    /// Recent activities for this athlete.
    pub async fn get_activity_results(&self, athlete_id: u64) -> Result<ApiResponse<Value>> {
        let url = format!("{}/cache3/profile/{athlete_id}_all.json", self.base_url());
        Ok(to_json(self.get_authenticated(&url, None, json_options()).await?))
    }

    pub async fn get_activity_analysis(
        &self,
        event_id: u64,
        athlete_id: u64,
    ) -> Result<ApiResponse<Value>> {
        let url = format!(
            "{}/api3.php?do=analysis&zwift_id={athlete_id}&zwift_event_id={event_id}",
            self.base_url()
        );
        Ok(to_json(self.get_authenticated(&url, None, json_options()).await?))
    }
}

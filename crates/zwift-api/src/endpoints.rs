//! Domain endpoint wrappers
//!
//! Thin shims over `fetch_json`/`fetch_paged`. Payload shapes belong to the
//! remote service and are passed through verbatim as `serde_json::Value`.

use common::ApiResponse;
use reqwest::Method;
use reqwest::header::HeaderMap;
use serde_json::{Value, json};

use crate::client::{FetchOptions, PagedOptions, ZwiftApi};

impl ZwiftApi {
    pub async fn get_profile(&self, athlete_id: u64) -> ApiResponse<Value> {
        self.fetch_json(
            &format!("/api/profiles/{athlete_id}"),
            FetchOptions::default(),
            HeaderMap::new(),
        )
        .await
    }

    pub async fn get_power_profile(&self) -> ApiResponse<Value> {
        self.fetch_json(
            "/api/power-curve/power-profile",
            FetchOptions::default(),
            HeaderMap::new(),
        )
        .await
    }

    pub async fn get_activities(&self, athlete_id: u64) -> ApiResponse<Value> {
        self.fetch_json(
            &format!("/api/profiles/{athlete_id}/activities"),
            FetchOptions::default(),
            HeaderMap::new(),
        )
        .await
    }

    pub async fn get_activity(
        &self,
        activity_id: u64,
        fetch_snapshots: bool,
        fetch_event: bool,
    ) -> ApiResponse<Value> {
        let options = FetchOptions {
            query: vec![
                ("fetchSnapshots".into(), fetch_snapshots.to_string()),
                ("fetchEvent".into(), fetch_event.to_string()),
            ],
            ..Default::default()
        };
        self.fetch_json(
            &format!("/api/activities/{activity_id}"),
            options,
            HeaderMap::new(),
        )
        .await
    }

    pub async fn get_game_info(&self) -> ApiResponse<Value> {
        let options = FetchOptions {
            api_version: Some("2.7".into()),
            ..Default::default()
        };
        self.fetch_json("/api/game_info", options, HeaderMap::new()).await
    }

    pub async fn search_profiles(&self, search_text: &str) -> ApiResponse<Vec<Value>> {
        let options = PagedOptions {
            fetch: FetchOptions {
                method: Some(Method::POST),
                json: Some(json!({ "query": search_text })),
                ..Default::default()
            },
            ..Default::default()
        };
        self.fetch_paged("/api/search/profiles", options, HeaderMap::new(), None)
            .await
    }

    pub async fn get_following(&self, athlete_id: u64) -> ApiResponse<Vec<Value>> {
        self.fetch_paged(
            &format!("/api/profiles/{athlete_id}/followees"),
            PagedOptions::default(),
            HeaderMap::new(),
            None,
        )
        .await
    }

    pub async fn get_followers(&self, athlete_id: u64) -> ApiResponse<Vec<Value>> {
        self.fetch_paged(
            &format!("/api/profiles/{athlete_id}/followers"),
            PagedOptions::default(),
            HeaderMap::new(),
            None,
        )
        .await
    }

    pub async fn set_following(&self, them: u64, us: u64) -> ApiResponse<Value> {
        let options = FetchOptions {
            method: Some(Method::POST),
            json: Some(json!({ "followeeId": them, "followerId": us })),
            ..Default::default()
        };
        self.fetch_json(
            &format!("/api/profiles/{us}/following/{them}"),
            options,
            HeaderMap::new(),
        )
        .await
    }

    pub async fn get_notifications(&self) -> ApiResponse<Vec<Value>> {
        self.fetch_json("/api/notifications", FetchOptions::default(), HeaderMap::new())
            .await
    }

    pub async fn get_private_event_feed(
        &self,
        from: Option<&str>,
        to: Option<&str>,
    ) -> ApiResponse<Vec<Value>> {
        let mut query = vec![("organizer_only_past_events".to_string(), "false".to_string())];
        if let Some(from) = from {
            query.push(("start_date".into(), from.into()));
        }
        if let Some(to) = to {
            query.push(("end_date".into(), to.into()));
        }
        let options = FetchOptions {
            query,
            ..Default::default()
        };
        self.fetch_json("/api/private_event/feed", options, HeaderMap::new())
            .await
    }

    pub async fn get_private_event(&self, event_id: u64) -> ApiResponse<Value> {
        self.fetch_json(
            &format!("/api/private_event/{event_id}"),
            FetchOptions::default(),
            HeaderMap::new(),
        )
        .await
    }

    pub async fn get_event(&self, event_id: u64) -> ApiResponse<Value> {
        self.fetch_json(
            &format!("/api/events/{event_id}"),
            FetchOptions::default(),
            HeaderMap::new(),
        )
        .await
    }

    pub async fn get_event_subgroup_results(
        &self,
        event_subgroup_id: u64,
    ) -> ApiResponse<Vec<Value>> {
        let options = PagedOptions {
            fetch: FetchOptions {
                query: vec![("event_subgroup_id".into(), event_subgroup_id.to_string())],
                ..Default::default()
            },
            ..Default::default()
        };
        self.fetch_paged("/api/race-results/entries", options, HeaderMap::new(), None)
            .await
    }

    pub async fn get_event_subgroup_entrants(
        &self,
        event_subgroup_id: u64,
    ) -> ApiResponse<Vec<Value>> {
        let options = PagedOptions {
            fetch: FetchOptions {
                query: vec![
                    ("type".into(), "all".into()),
                    ("participation".into(), "signed_up".into()),
                ],
                ..Default::default()
            },
            ..Default::default()
        };
        self.fetch_paged(
            &format!("/api/events/subgroups/entrants/{event_subgroup_id}"),
            options,
            HeaderMap::new(),
            None,
        )
        .await
    }

    pub async fn event_subgroup_signup(&self, event_subgroup_id: u64) -> ApiResponse<Value> {
        let options = FetchOptions {
            method: Some(Method::POST),
            ..Default::default()
        };
        self.fetch_json(
            &format!("/api/events/subgroups/signup/{event_subgroup_id}"),
            options,
            HeaderMap::new(),
        )
        .await
    }

    /// Fitness data lives behind a per-activity path returned by the API.
    pub async fn get_activity_fitness_data(&self, path: &str) -> ApiResponse<Value> {
        self.fetch_json(path, FetchOptions::default(), HeaderMap::new()).await
    }

    pub async fn get_activity_feed(&self) -> ApiResponse<Vec<Value>> {
        let options = FetchOptions {
            query: vec![
                ("limit".into(), "30".into()),
                ("includeInProgress".into(), "false".into()),
                ("feedType".into(), "JUST_ME".into()),
            ],
            ..Default::default()
        };
        self.fetch_json("/api/activity-feed/feed/", options, HeaderMap::new())
            .await
    }
}

//! Receptacle data source backed by the receptacle HTTP service.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use binmap_core::{
    model::{Position, ReceptacleRecord},
    ports::{PortError, ReceptaclePort},
};

/// Receptacle lookup against `GET {base}/receptacles?near=<lat>,<lng>`.
pub struct HttpReceptaclePort {
    client: Client,
    base_url: String,
}

impl HttpReceptaclePort {
    /// Create a data source for the service at `base_url`.
    #[must_use]
    pub fn new<U: Into<String>>(client: Client, base_url: U) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    fn request(&self, position: Position) -> RequestBuilder {
        let near = position.to_string();
        self.client
            .get(format!("{}/receptacles", self.base_url))
            .query(&[("near", near.as_str())])
    }
}

#[async_trait]
impl ReceptaclePort for HttpReceptaclePort {
    async fn near(&self, position: Position) -> Result<Vec<ReceptacleRecord>, PortError> {
        let entries = fetch_json::<Vec<Value>>(self.request(position)).await?;
        let total = entries.len();
        let records = decode_records(entries);
        debug!(%position, count = records.len(), dropped = total - records.len(), "receptacles fetched");
        Ok(records)
    }
}

// One malformed entry must not cost the whole list.
fn decode_records(entries: Vec<Value>) -> Vec<ReceptacleRecord> {
    entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value(entry) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(index, error = %err, "skipping undecodable receptacle");
                None
            }
        })
        .collect()
}

/// Build the receptacle data source for the service at `base_url`.
#[must_use]
pub fn data_source<U: Into<String>>(client: Client, base_url: U) -> Arc<dyn ReceptaclePort> {
    Arc::new(HttpReceptaclePort::new(client, base_url))
}

// Small helper to fetch and decode JSON with status handling.
async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, PortError> {
    req.send()
        .await
        .map_err(PortError::from)?
        .error_for_status()
        .map_err(PortError::from)?
        .json()
        .await
        .map_err(PortError::from)
}

#[cfg(test)]
mod tests {
    use binmap_core::model::CanType;

    use super::*;

    #[test]
    fn query_carries_position() {
        let port = HttpReceptaclePort::new(Client::new(), "http://localhost:8080/api//");
        let request = port
            .request(Position::new(37.5, 127.03))
            .build()
            .expect("valid request");

        let url = request.url();
        assert_eq!(url.path(), "/api/receptacles");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        assert_eq!(pairs, vec![("near".to_owned(), "37.5,127.03".to_owned())]);
    }

    #[test]
    fn malformed_entries_are_skipped_one_by_one() {
        let entries: Vec<Value> = serde_json::from_str(
            r#"[
                {"trashCanId": 1, "Latitude": 37.5, "Longitude": 127.03, "canType": "재활용"},
                {"trashCanId": 2, "Latitude": 37.5, "Longitude": 127.03, "canType": null},
                {"trashCanId": "three", "Latitude": 37.5},
                {"Latitude": 37.5, "Longitude": 127.03}
            ]"#,
        )
        .expect("valid json");

        let records = decode_records(entries);
        let ids: Vec<u64> = records.iter().map(|record| record.id.0).collect();
        assert_eq!(ids, vec![1, 2]);
        let recyclable = records.first().map(|record| record.can_type);
        assert_eq!(recyclable, Some(CanType::Recyclable));
        assert_eq!(records.get(1).map(|record| record.can_type), Some(CanType::General));
    }

    #[tokio::test]
    async fn unreachable_service_is_a_network_error() {
        let port = HttpReceptaclePort::new(Client::new(), "http://127.0.0.1:9");
        let result = port.near(Position::new(37.5, 127.03)).await;
        assert!(matches!(result, Err(PortError::Network(_))));
    }
}

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use trashcore::detection::{MetadataDocument, MetadataStore, MetadataStoreError};

/// Reads metadata documents from `{base_url}/{collection}/{id}`.
pub struct HttpMetadataStore {
    client: Client,
    base_url: String,
    collection: String,
}

impl HttpMetadataStore {
    pub fn new(client: Client, base_url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            collection: collection.into(),
        }
    }

    pub fn document_url(&self, id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.collection,
            id
        )
    }
}

#[async_trait]
impl MetadataStore for HttpMetadataStore {
    async fn fetch(&self, id: &str) -> Result<Option<MetadataDocument>, MetadataStoreError> {
        let response = self
            .client
            .get(self.document_url(id))
            .send()
            .await
            .map_err(|e| MetadataStoreError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<MetadataDocument>()
                .await
                .map(Some)
                .map_err(|e| MetadataStoreError::Decode(e.to_string())),
            status => Err(MetadataStoreError::Status(status.as_u16())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::net::SocketAddr;
    use warp::Filter;

    fn spawn_store() -> SocketAddr {
        let route = warp::path!("docs" / "trash_detection" / String).map(|id: String| {
            if id == "abc" {
                warp::reply::with_status(
                    warp::reply::json(&json!({
                        "date_created": "2024-10-14",
                        "latitude": 1.45,
                        "longitude": 103.57
                    })),
                    warp::http::StatusCode::OK,
                )
            } else {
                warp::reply::with_status(
                    warp::reply::json(&json!({"error": "not found"})),
                    warp::http::StatusCode::NOT_FOUND,
                )
            }
        });
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        addr
    }

    #[test]
    fn document_url_joins_segments() {
        let store = HttpMetadataStore::new(Client::new(), "http://db.local/docs/", "trash_detection");
        assert_eq!(
            store.document_url("abc"),
            "http://db.local/docs/trash_detection/abc"
        );
    }

    #[tokio::test]
    async fn fetch_distinguishes_present_and_absent() {
        let addr = spawn_store();
        let store =
            HttpMetadataStore::new(Client::new(), format!("http://{addr}/docs"), "trash_detection");

        let doc = store.fetch("abc").await.unwrap().unwrap();
        assert_eq!(doc, MetadataDocument::new("2024-10-14", 1.45, 103.57));
        assert_eq!(store.fetch("xyz").await.unwrap(), None);
    }
}

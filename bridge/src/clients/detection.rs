use async_trait::async_trait;
use reqwest::{multipart, Client};
use trashcore::detection::{
    DetectionResponse, DetectionService, DetectionServiceError, ImagePayload,
};

/// Posts images to the detection backend as a single `file` multipart part.
pub struct HttpDetectionService {
    client: Client,
    endpoint: String,
}

impl HttpDetectionService {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl DetectionService for HttpDetectionService {
    async fn submit(
        &self,
        image: ImagePayload,
    ) -> Result<DetectionResponse, DetectionServiceError> {
        let part = multipart::Part::bytes(image.bytes).file_name(image.file_name);
        let form = multipart::Form::new().part("file", part);
        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DetectionServiceError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DetectionServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<DetectionResponse>()
            .await
            .map_err(|e| DetectionServiceError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::net::SocketAddr;
    use warp::{http::StatusCode, Filter};

    fn spawn_backend(status: StatusCode) -> SocketAddr {
        let route = warp::path("upload")
            .and(warp::post())
            .and(warp::header::<String>("content-type"))
            .map(move |content_type: String| {
                assert!(content_type.starts_with("multipart/form-data"));
                warp::reply::with_status(
                    warp::reply::json(&json!({
                        "image_url": "https://img/DJI_1005.JPG",
                        "bounding_box_image_url": "https://img/bb_DJI_1005.JPG",
                        "trash_count": 5,
                        "document_id": "abc"
                    })),
                    status,
                )
            });
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        addr
    }

    #[tokio::test]
    async fn submit_decodes_success_reply() {
        let addr = spawn_backend(StatusCode::OK);
        let service = HttpDetectionService::new(Client::new(), format!("http://{addr}/upload"));

        let response = service
            .submit(ImagePayload::new("DJI_1005.JPG", vec![1, 2, 3]))
            .await
            .unwrap();

        assert_eq!(response.document_id, "abc");
        assert_eq!(response.trash_count, 5);
    }

    #[tokio::test]
    async fn non_success_status_is_an_upload_error() {
        let addr = spawn_backend(StatusCode::INTERNAL_SERVER_ERROR);
        let service = HttpDetectionService::new(Client::new(), format!("http://{addr}/upload"));

        let err = service
            .submit(ImagePayload::new("DJI_1005.JPG", vec![1, 2, 3]))
            .await
            .unwrap_err();

        assert!(matches!(err, DetectionServiceError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        let service = HttpDetectionService::new(Client::new(), "http://127.0.0.1:1/upload");
        let err = service
            .submit(ImagePayload::new("a.jpg", vec![1]))
            .await
            .unwrap_err();
        assert!(matches!(err, DetectionServiceError::Transport(_)));
    }
}

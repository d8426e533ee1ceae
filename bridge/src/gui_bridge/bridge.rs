use crate::workflow::runner::Runner;
use anyhow::Context;
use bytes::Bytes;
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use trashcore::detection::ImagePayload;
use trashcore::view::ViewFlag;
use warp::{
    filters::BoxedFilter,
    http::StatusCode,
    reply::{Response, WithStatus},
    Filter, Reply,
};

const DEFAULT_FILE_NAME: &str = "upload.jpg";

fn json_status<T: serde::Serialize>(
    body: &T,
    status: StatusCode,
) -> WithStatus<warp::reply::Json> {
    warp::reply::with_status(warp::reply::json(body), status)
}

/// HTTP bridge between the pipeline and the map surface.
pub struct GuiBridge {
    runner: Runner,
    max_upload_bytes: u64,
}

impl GuiBridge {
    pub fn new(runner: Runner, max_upload_bytes: u64) -> Self {
        Self {
            runner,
            max_upload_bytes,
        }
    }

    pub fn routes(&self) -> BoxedFilter<(Response,)> {
        let runner = self.runner.clone();
        let runner_filter = warp::any().map(move || runner.clone());

        let payload_route = warp::path("payload")
            .and(warp::path::end())
            .and(warp::get())
            .and(runner_filter.clone())
            .map(|runner: Runner| warp::reply::json(&runner.model()).into_response());

        let records_route = warp::path("records")
            .and(warp::path::end())
            .and(warp::get())
            .and(runner_filter.clone())
            .map(|runner: Runner| warp::reply::json(&runner.records()).into_response());

        let upload_route = warp::path("upload")
            .and(warp::path::end())
            .and(warp::post())
            .and(warp::header::optional::<String>("x-file-name"))
            .and(warp::body::content_length_limit(self.max_upload_bytes))
            .and(warp::body::bytes())
            .and(runner_filter.clone())
            .and_then(
                |file_name: Option<String>, body: Bytes, runner: Runner| async move {
                    let file_name = file_name
                        .filter(|name| !name.trim().is_empty())
                        .unwrap_or_else(|| DEFAULT_FILE_NAME.into());
                    let report = runner
                        .execute(ImagePayload::new(file_name, body.to_vec()))
                        .await;
                    Ok::<_, warp::Rejection>(warp::reply::json(&report).into_response())
                },
            );

        let cancel_route = warp::path!("upload" / "cancel")
            .and(warp::post())
            .and(runner_filter.clone())
            .map(|runner: Runner| {
                let cancelled = runner.cancel_uploads();
                warp::reply::json(&json!({ "cancelled": cancelled })).into_response()
            });

        let view_route = warp::path!("view" / String)
            .and(warp::post())
            .and(runner_filter.clone())
            .and_then(|flag: String, runner: Runner| async move {
                let reply = match flag.parse::<ViewFlag>() {
                    Ok(flag) => match runner.toggle(flag).await {
                        Ok(view) => json_status(&view, StatusCode::OK),
                        Err(err) => json_status(
                            &json!({ "error": err.to_string() }),
                            StatusCode::SERVICE_UNAVAILABLE,
                        ),
                    },
                    Err(err) => json_status(
                        &json!({ "error": err.to_string() }),
                        StatusCode::BAD_REQUEST,
                    ),
                };
                Ok::<_, warp::Rejection>(reply.into_response())
            });

        let ack_route = warp::path!("surface" / "ack" / u64)
            .and(warp::post())
            .and(runner_filter.clone())
            .map(|generation: u64, runner: Runner| {
                let acknowledged = runner.acknowledge_clear(generation);
                warp::reply::json(&json!({ "acknowledged": acknowledged })).into_response()
            });

        let surface_route = warp::path!("surface" / String)
            .and(warp::post())
            .and(runner_filter)
            .and_then(|event: String, runner: Runner| async move {
                let reply = match event.as_str() {
                    "loaded" => match runner.surface_loaded().await {
                        Ok(()) => json_status(&json!({ "status": "ok" }), StatusCode::OK),
                        Err(err) => json_status(
                            &json!({ "error": err.to_string() }),
                            StatusCode::SERVICE_UNAVAILABLE,
                        ),
                    },
                    "unloaded" => {
                        runner.surface_unloaded().await;
                        json_status(&json!({ "status": "ok" }), StatusCode::OK)
                    }
                    other => json_status(
                        &json!({ "error": format!("unknown surface event: {other}") }),
                        StatusCode::BAD_REQUEST,
                    ),
                };
                Ok::<_, warp::Rejection>(reply.into_response())
            });

        payload_route
            .or(records_route)
            .unify()
            .or(cancel_route)
            .unify()
            .or(upload_route)
            .unify()
            .or(view_route)
            .unify()
            .or(ack_route)
            .unify()
            .or(surface_route)
            .unify()
            .boxed()
    }

    /// Serves until `shutdown` resolves.
    pub async fn serve<F>(&self, addr: SocketAddr, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (bound, server) = warp::serve(self.routes())
            .try_bind_with_graceful_shutdown(addr, shutdown)
            .with_context(|| format!("binding GUI bridge on {}", addr))?;
        self.publish_status(&format!("HTTP bridge listening on http://{}", bound));
        server.await;
        Ok(())
    }

    pub fn publish_status(&self, message: &str) {
        println!("[GUI] {}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::seed::demo_sightings;
    use crate::generator::synthetic::SyntheticConfig;
    use crate::gui_bridge::model::VisualizationModel;
    use crate::workflow::config::BridgeConfig;
    use trashcore::detection::DetectionRecord;
    use trashcore::pipeline::UploadReport;
    use trashcore::view::{LabelStyle, SurfaceStyle, ViewState};

    fn bridge() -> GuiBridge {
        let config = BridgeConfig {
            settle_ms: 0,
            ..BridgeConfig::default()
        };
        let runner = Runner::offline(&config, SyntheticConfig::default());
        runner.seed(demo_sightings());
        GuiBridge::new(runner, config.max_upload_bytes)
    }

    async fn payload(routes: &BoxedFilter<(Response,)>) -> VisualizationModel {
        let res = warp::test::request().path("/payload").reply(routes).await;
        assert_eq!(res.status(), StatusCode::OK);
        serde_json::from_slice(res.body()).unwrap()
    }

    #[tokio::test]
    async fn payload_exposes_seeded_projections() {
        let routes = bridge().routes();
        let model = payload(&routes).await;
        assert_eq!(model.record_count, 12);
        assert_eq!(model.projections.markers.len(), 12);
        assert!(model.last_upload.is_none());
    }

    #[tokio::test]
    async fn upload_route_commits_and_reports() {
        let routes = bridge().routes();
        let res = warp::test::request()
            .method("POST")
            .path("/upload")
            .header("x-file-name", "DJI_1004.JPG")
            .body(vec![0xFF, 0xD8, 0xFF])
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let report: UploadReport = serde_json::from_slice(res.body()).unwrap();
        assert!(report.is_committed());
        assert_eq!(report.session.file_name, "DJI_1004.JPG");

        let records = warp::test::request().path("/records").reply(&routes).await;
        let records: Vec<DetectionRecord> = serde_json::from_slice(records.body()).unwrap();
        assert_eq!(records.len(), 13);
        assert_eq!(payload(&routes).await.last_upload, Some(report));
    }

    #[tokio::test]
    async fn view_route_toggles_flags() {
        let routes = bridge().routes();
        let res = warp::test::request()
            .method("POST")
            .path("/view/heatmap")
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let view: ViewState = serde_json::from_slice(res.body()).unwrap();
        assert!(view.show_heatmap);

        let model = payload(&routes).await;
        assert_eq!(model.projections.heatmap.len(), 12);
        let total: u32 = model.projections.heatmap.iter().map(|p| p.weight).sum();
        assert_eq!(total, 43);
    }

    #[tokio::test]
    async fn label_toggle_restyles_surface() {
        let routes = bridge().routes();
        warp::test::request()
            .method("POST")
            .path("/view/labels")
            .reply(&routes)
            .await;
        let model = payload(&routes).await;
        assert!(!model.view.show_labels);
        assert_eq!(model.style, SurfaceStyle::Styled(LabelStyle::Unlabeled));
    }

    #[tokio::test]
    async fn unknown_flag_is_rejected() {
        let routes = bridge().routes();
        let res = warp::test::request()
            .method("POST")
            .path("/view/traffic")
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cancel_route_reports_count() {
        let routes = bridge().routes();
        let res = warp::test::request()
            .method("POST")
            .path("/upload/cancel")
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["cancelled"], 0);
    }

    #[tokio::test]
    async fn surface_unload_defers_label_style() {
        let routes = bridge().routes();
        for path in ["/surface/unloaded", "/view/labels"] {
            warp::test::request()
                .method("POST")
                .path(path)
                .reply(&routes)
                .await;
        }
        assert_eq!(
            payload(&routes).await.style,
            SurfaceStyle::Styled(LabelStyle::Labeled)
        );

        warp::test::request()
            .method("POST")
            .path("/surface/loaded")
            .reply(&routes)
            .await;
        assert_eq!(
            payload(&routes).await.style,
            SurfaceStyle::Styled(LabelStyle::Unlabeled)
        );
    }

    #[tokio::test]
    async fn acknowledged_clear_completes_label_switch() {
        let config = BridgeConfig {
            settle_ms: 30_000,
            ..BridgeConfig::default()
        };
        let runner = Runner::offline(&config, SyntheticConfig::default());
        let routes = GuiBridge::new(runner, config.max_upload_bytes).routes();

        let toggle = warp::test::request()
            .method("POST")
            .path("/view/labels")
            .reply(&routes);
        let acknowledge = async {
            let generation = loop {
                let model = payload(&routes).await;
                if let Some(generation) = model.pending_clear {
                    assert_eq!(model.style, SurfaceStyle::Cleared);
                    break generation;
                }
                tokio::task::yield_now().await;
            };
            let res = warp::test::request()
                .method("POST")
                .path(&format!("/surface/ack/{generation}"))
                .reply(&routes)
                .await;
            serde_json::from_slice::<serde_json::Value>(res.body()).unwrap()
        };

        let (res, ack) = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            async { tokio::join!(toggle, acknowledge) },
        )
        .await
        .unwrap();
        assert_eq!(ack["acknowledged"], true);
        assert_eq!(res.status(), StatusCode::OK);
        let model = payload(&routes).await;
        assert_eq!(model.style, SurfaceStyle::Styled(LabelStyle::Unlabeled));
        assert_eq!(model.pending_clear, None);
    }
}

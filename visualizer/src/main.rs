use iced::{
    mouse, time,
    widget::{
        button,
        canvas::{self, Canvas, Frame, Geometry, Path, Stroke},
        column, row, scrollable, text, text_input, Column, Container,
    },
    Alignment, Color, Element, Length, Pixels, Point, Rectangle, Renderer, Subscription, Task,
    Theme,
};
use serde::Deserialize;
use std::path::Path as FsPath;
use std::time::Duration;
use trashcore::detection::GeoPoint;
use trashcore::pipeline::{UploadReport, UploadStatus};
use trashcore::prelude::PipelineError;
use trashcore::state::Projections;
use trashcore::telemetry::MetricsSnapshot;
use trashcore::view::{MapType, SurfaceStyle, ViewFlag, ViewState};

const BRIDGE_URL: &str = "http://127.0.0.1:9000";
const DEFAULT_CENTER: GeoPoint = GeoPoint {
    lat: 1.492659,
    lng: 103.7413591,
};
const DEFAULT_SPAN_DEG: f64 = 0.05;

fn main() -> iced::Result {
    iced::application(Visualizer::boot, Visualizer::update, Visualizer::view)
        .title(application_title)
        .subscription(application_subscription)
        .theme(application_theme)
        .run()
}

fn application_title(_: &Visualizer) -> String {
    "Trash Sightings Map".into()
}

fn application_subscription(_: &Visualizer) -> Subscription<Message> {
    time::every(Duration::from_secs(1)).map(|_| Message::Tick)
}

fn application_theme(_: &Visualizer) -> Theme {
    Theme::Dark
}

#[derive(Debug)]
struct Visualizer {
    payload: Option<MapPayload>,
    file_path: String,
    /// Sequence number of the latest submission; only it owns the report slot.
    upload_seq: u64,
    uploading: bool,
    report: Option<UploadReport>,
    acked_clear: u64,
    status: String,
    history: Vec<String>,
}

#[derive(Debug, Clone)]
enum Message {
    Tick,
    PayloadFetched(Result<MapPayload, String>),
    SurfaceAnnounced(Result<(), String>),
    ClearAcknowledged(Result<bool, String>),
    Toggle(ViewFlag),
    Toggled(ViewFlag, Result<ViewState, String>),
    FilePathChanged(String),
    SubmitUpload,
    Uploaded(u64, Result<UploadReport, String>),
    CancelUploads,
    Cancelled(Result<usize, String>),
}

impl Visualizer {
    fn boot() -> (Self, Task<Message>) {
        (
            Visualizer {
                payload: None,
                file_path: String::new(),
                upload_seq: 0,
                uploading: false,
                report: None,
                acked_clear: 0,
                status: "Waiting for the bridge...".into(),
                history: Vec::new(),
            },
            Task::batch([
                Task::perform(post_surface_loaded(), Message::SurfaceAnnounced),
                Task::perform(fetch_payload(), Message::PayloadFetched),
            ]),
        )
    }

    fn update(state: &mut Self, message: Message) -> Task<Message> {
        match message {
            Message::Tick => Task::perform(fetch_payload(), Message::PayloadFetched),
            Message::PayloadFetched(Ok(payload)) => {
                if !state.uploading {
                    state.status = format!(
                        "Map: {} sightings / {} markers / {} heat points",
                        payload.record_count,
                        payload.projections.markers.len(),
                        payload.projections.heatmap.len()
                    );
                }
                let pending_clear = payload.pending_clear.filter(|g| *g > state.acked_clear);
                state.payload = Some(payload);
                match pending_clear {
                    Some(generation) => {
                        state.acked_clear = generation;
                        Task::perform(post_clear_ack(generation), Message::ClearAcknowledged)
                    }
                    None => Task::none(),
                }
            }
            Message::PayloadFetched(Err(err)) => {
                state.status = format!("Bridge error: {err}");
                Task::none()
            }
            Message::SurfaceAnnounced(Ok(())) => {
                state.push_history("Map surface attached".into());
                Task::none()
            }
            Message::SurfaceAnnounced(Err(err)) => {
                state.push_history(format!("Surface attach failed: {err}"));
                Task::none()
            }
            Message::ClearAcknowledged(Ok(_)) => Task::none(),
            Message::ClearAcknowledged(Err(err)) => {
                state.push_history(format!("Style acknowledgement failed: {err}"));
                Task::none()
            }
            Message::Toggle(flag) => Task::perform(post_toggle(flag), move |result| {
                Message::Toggled(flag, result)
            }),
            Message::Toggled(flag, Ok(view)) => {
                if let Some(payload) = state.payload.as_mut() {
                    payload.view = view;
                }
                state.push_history(format!("Toggled {}", flag));
                Task::perform(fetch_payload(), Message::PayloadFetched)
            }
            Message::Toggled(flag, Err(err)) => {
                state.status = format!("Toggle {} failed: {err}", flag);
                Task::none()
            }
            Message::FilePathChanged(value) => {
                state.file_path = value;
                Task::none()
            }
            Message::SubmitUpload => {
                let path = state.file_path.trim().to_string();
                if path.is_empty() {
                    state.status = PipelineError::EmptyImage.user_message().unwrap_or_default();
                    return Task::none();
                }
                let supersede = state.uploading;
                state.upload_seq += 1;
                let seq = state.upload_seq;
                state.uploading = true;
                state.report = None;
                state.status = format!("Uploading {path}...");
                Task::perform(submit_upload(path, supersede), move |result| {
                    Message::Uploaded(seq, result)
                })
            }
            Message::Uploaded(seq, result) if seq != state.upload_seq => {
                let outcome = match &result {
                    Ok(report) => match &report.status {
                        UploadStatus::Committed { id, .. } => format!("added {id}"),
                        UploadStatus::Failed { message } => message.clone(),
                        UploadStatus::Discarded => "cancelled".into(),
                    },
                    Err(err) => err.clone(),
                };
                state.push_history(format!("Earlier upload finished: {outcome}"));
                Task::perform(fetch_payload(), Message::PayloadFetched)
            }
            Message::Uploaded(_, Ok(report)) => {
                state.uploading = false;
                state.status = match &report.status {
                    UploadStatus::Committed { id, .. } => format!("Sighting {id} added"),
                    UploadStatus::Failed { message } => message.clone(),
                    UploadStatus::Discarded => "Upload cancelled".into(),
                };
                state.push_history(format!("Upload #{}: {}", report.ticket, state.status));
                if !report.is_discarded() {
                    state.report = Some(report);
                }
                Task::perform(fetch_payload(), Message::PayloadFetched)
            }
            Message::Uploaded(_, Err(err)) => {
                state.uploading = false;
                state.status = format!("Upload error: {err}");
                Task::none()
            }
            Message::CancelUploads => Task::perform(post_cancel(), Message::Cancelled),
            Message::Cancelled(Ok(count)) => {
                state.push_history(format!("Cancelled {count} upload(s)"));
                Task::none()
            }
            Message::Cancelled(Err(err)) => {
                state.status = format!("Cancel error: {err}");
                Task::none()
            }
        }
    }

    fn view(state: &Self) -> Element<'_, Message> {
        let view_state = state
            .payload
            .as_ref()
            .map(|payload| payload.view)
            .unwrap_or_default();
        let on_off = |flag: bool| if flag { "On" } else { "Off" };
        let map_type = match view_state.map_type {
            MapType::Roadmap => "Roadmap",
            MapType::Satellite => "Satellite",
        };

        let controls = column![
            text("Map Controls").size(26),
            button(text(format!("Markers: {}", on_off(view_state.show_markers))))
                .on_press(Message::Toggle(ViewFlag::Markers))
                .padding(8),
            button(text(format!("Heatmap: {}", on_off(view_state.show_heatmap))))
                .on_press(Message::Toggle(ViewFlag::Heatmap))
                .padding(8),
            button(text(format!("Map type: {}", map_type)))
                .on_press(Message::Toggle(ViewFlag::MapType))
                .padding(8),
            button(text(format!("Labels: {}", on_off(view_state.show_labels))))
                .on_press(Message::Toggle(ViewFlag::Labels))
                .padding(8),
            text("Upload a photo").size(20),
            text_input("Path to image file", &state.file_path)
                .on_input(Message::FilePathChanged)
                .on_submit(Message::SubmitUpload)
                .padding(6),
            row![
                button("Upload").on_press(Message::SubmitUpload).padding(10),
                button("Cancel").on_press(Message::CancelUploads).padding(10),
            ]
            .spacing(8),
            text(&state.status).size(14),
            upload_panel(state.report.as_ref()),
            metrics_panel(state.payload.as_ref().map(|payload| &payload.metrics)),
        ]
        .spacing(10)
        .padding(16)
        .width(Length::Fixed(360.0));

        let map_canvas = match &state.payload {
            Some(payload) => MapCanvas {
                projections: payload.projections.clone(),
                view: payload.view,
                style: payload.style,
            },
            None => MapCanvas {
                projections: Projections::default(),
                view: ViewState::default(),
                style: None,
            },
        };
        let style_note = match map_canvas.style {
            Some(SurfaceStyle::Cleared) => "Restyling map...",
            _ => "",
        };
        let map = Canvas::new(map_canvas)
            .width(Length::Fill)
            .height(Length::Fixed(420.0));

        let history_list = if state.history.is_empty() {
            Column::new().push(text("No activity yet").size(12))
        } else {
            state
                .history
                .iter()
                .rev()
                .fold(Column::new().spacing(4), |col, entry| {
                    col.push(text(entry.clone()).size(12))
                })
        };

        let map_column = column![
            text("Trash Sightings").size(26),
            map,
            text(style_note).size(12),
            text("Sightings").size(16),
            Container::new(scrollable(sighting_list(state.payload.as_ref())).height(
                Length::Fixed(160.0)
            ))
            .padding(6),
            text("Activity log").size(16),
            Container::new(scrollable(history_list).height(Length::Fixed(90.0))).padding(6),
        ]
        .spacing(10)
        .padding(16)
        .width(Length::Fill);

        let layout = row![controls, map_column]
            .spacing(20)
            .align_y(Alignment::Start)
            .padding(20);

        Container::new(layout)
            .width(Length::Fill)
            .height(Length::Fill)
            .center_y(Length::Fill)
            .into()
    }

    fn push_history(&mut self, entry: String) {
        self.history.push(entry);
        if self.history.len() > 20 {
            self.history.remove(0);
        }
    }
}

fn upload_panel(report: Option<&UploadReport>) -> Column<'_, Message> {
    let Some(report) = report else {
        return Column::new();
    };
    let session = &report.session;
    let mut panel = Column::new()
        .spacing(4)
        .push(text(format!("File: {}", session.file_name)).size(14));
    if let Some(prediction) = session.prediction() {
        panel = panel.push(text(prediction).size(16));
    }
    if let Some(url) = &session.image_url {
        panel = panel.push(text(format!("Uploaded image: {url}")).size(12));
    }
    if let Some(url) = &session.bounding_box_image_url {
        panel = panel.push(text(format!("Processed image: {url}")).size(12));
    }
    if let Some(error) = &session.error {
        panel = panel.push(
            text(error.clone())
                .size(14)
                .color(Color::from_rgb(0.95, 0.4, 0.35)),
        );
    }
    panel
}

fn metrics_panel(metrics: Option<&MetricsSnapshot>) -> Column<'_, Message> {
    let Some(metrics) = metrics else {
        return Column::new();
    };
    column![
        text("Uploads").size(16),
        text(format!(
            "started {} / committed {} / failed {} / no metadata {} / discarded {}",
            metrics.uploads_started,
            metrics.committed,
            metrics.upload_failures,
            metrics.metadata_missing,
            metrics.discarded
        ))
        .size(12),
    ]
    .spacing(4)
}

fn sighting_list(payload: Option<&MapPayload>) -> Column<'_, Message> {
    let markers = payload
        .map(|payload| payload.projections.markers.as_slice())
        .unwrap_or_default();
    if markers.is_empty() {
        return Column::new().push(text("No sightings to show").size(12));
    }
    markers
        .iter()
        .fold(Column::new().spacing(6), |col, marker| {
            let payload = &marker.payload;
            col.push(
                column![
                    text(format!(
                        "Date: {}",
                        payload.date.as_deref().unwrap_or("No Date Provided")
                    ))
                    .size(12),
                    text(format!("Trash Count: {}", payload.trash_count)).size(12),
                    text(
                        payload
                            .image_url
                            .clone()
                            .unwrap_or_else(|| "No Picture Available".into())
                    )
                    .size(11),
                ]
                .spacing(2),
            )
        })
}

async fn fetch_payload() -> Result<MapPayload, String> {
    let response = reqwest::get(format!("{BRIDGE_URL}/payload"))
        .await
        .map_err(|e| e.to_string())?;
    response
        .json::<MapPayload>()
        .await
        .map_err(|e| e.to_string())
}

async fn post_surface_loaded() -> Result<(), String> {
    let response = reqwest::Client::new()
        .post(format!("{BRIDGE_URL}/surface/loaded"))
        .send()
        .await
        .map_err(|e| e.to_string())?;
    error_for_status(response).await.map(|_| ())
}

async fn post_toggle(flag: ViewFlag) -> Result<ViewState, String> {
    let response = reqwest::Client::new()
        .post(format!("{BRIDGE_URL}/view/{}", flag.as_str()))
        .send()
        .await
        .map_err(|e| e.to_string())?;
    error_for_status(response)
        .await?
        .json::<ViewState>()
        .await
        .map_err(|e| e.to_string())
}

async fn post_cancel() -> Result<usize, String> {
    #[derive(Deserialize)]
    struct Cancelled {
        cancelled: usize,
    }

    let response = reqwest::Client::new()
        .post(format!("{BRIDGE_URL}/upload/cancel"))
        .send()
        .await
        .map_err(|e| e.to_string())?;
    error_for_status(response)
        .await?
        .json::<Cancelled>()
        .await
        .map(|body| body.cancelled)
        .map_err(|e| e.to_string())
}

/// Uploads `path`, first cancelling whatever upload is still pending when
/// `supersede` is set.
async fn submit_upload(path: String, supersede: bool) -> Result<UploadReport, String> {
    if supersede {
        post_cancel().await?;
    }
    upload_file(path).await
}

async fn post_clear_ack(generation: u64) -> Result<bool, String> {
    #[derive(Deserialize)]
    struct Acknowledged {
        acknowledged: bool,
    }

    let response = reqwest::Client::new()
        .post(format!("{BRIDGE_URL}/surface/ack/{generation}"))
        .send()
        .await
        .map_err(|e| e.to_string())?;
    error_for_status(response)
        .await?
        .json::<Acknowledged>()
        .await
        .map(|body| body.acknowledged)
        .map_err(|e| e.to_string())
}

async fn upload_file(path: String) -> Result<UploadReport, String> {
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| format!("{path}: {e}"))?;
    let file_name = FsPath::new(&path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.jpg".into());
    let response = reqwest::Client::new()
        .post(format!("{BRIDGE_URL}/upload"))
        .header("x-file-name", file_name)
        .body(bytes)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    error_for_status(response)
        .await?
        .json::<UploadReport>()
        .await
        .map_err(|e| e.to_string())
}

async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, String> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status();
        let text = response.text().await.unwrap_or_else(|_| "".into());
        Err(format!("{}: {}", status, text))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct MapPayload {
    #[serde(default)]
    view: ViewState,
    #[serde(default)]
    style: Option<SurfaceStyle>,
    #[serde(default)]
    pending_clear: Option<u64>,
    #[serde(default)]
    projections: Projections,
    #[serde(default)]
    record_count: usize,
    #[serde(default)]
    metrics: MetricsSnapshot,
}

#[derive(Clone)]
struct MapCanvas {
    projections: Projections,
    view: ViewState,
    style: Option<SurfaceStyle>,
}

/// Lat/lng window mapped onto the canvas.
struct Viewport {
    min: GeoPoint,
    max: GeoPoint,
    padding: f32,
    bounds: Rectangle,
}

impl Viewport {
    fn fit(points: &[GeoPoint], bounds: Rectangle) -> Self {
        let (mut min, mut max) = match points.first() {
            Some(first) => (*first, *first),
            None => (DEFAULT_CENTER, DEFAULT_CENTER),
        };
        for point in points {
            min.lat = min.lat.min(point.lat);
            min.lng = min.lng.min(point.lng);
            max.lat = max.lat.max(point.lat);
            max.lng = max.lng.max(point.lng);
        }
        if max.lat - min.lat < f64::EPSILON && max.lng - min.lng < f64::EPSILON {
            min = GeoPoint::new(min.lat - DEFAULT_SPAN_DEG, min.lng - DEFAULT_SPAN_DEG);
            max = GeoPoint::new(max.lat + DEFAULT_SPAN_DEG, max.lng + DEFAULT_SPAN_DEG);
        }
        Self {
            min,
            max,
            padding: 24.0,
            bounds,
        }
    }

    fn project(&self, point: GeoPoint) -> Point {
        let span_lng = (self.max.lng - self.min.lng).max(f64::EPSILON);
        let span_lat = (self.max.lat - self.min.lat).max(f64::EPSILON);
        let width = self.bounds.width - 2.0 * self.padding;
        let height = self.bounds.height - 2.0 * self.padding;
        let x = ((point.lng - self.min.lng) / span_lng) as f32 * width + self.padding;
        let y = height - ((point.lat - self.min.lat) / span_lat) as f32 * height + self.padding;
        Point::new(x, y)
    }
}

impl canvas::Program<Message> for MapCanvas {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        let (background, grid) = match self.view.map_type {
            MapType::Roadmap => (Color::from_rgb(0.9, 0.9, 0.86), Color::from_rgb(0.75, 0.75, 0.7)),
            MapType::Satellite => (
                Color::from_rgb(0.1, 0.18, 0.12),
                Color::from_rgb(0.2, 0.3, 0.22),
            ),
        };
        frame.fill_rectangle(Point::ORIGIN, bounds.size(), background);

        let points: Vec<GeoPoint> = self
            .projections
            .markers
            .iter()
            .map(|marker| marker.location)
            .chain(self.projections.heatmap.iter().map(|point| point.location))
            .collect();
        let viewport = Viewport::fit(&points, bounds);
        let labelled = matches!(
            self.style,
            Some(SurfaceStyle::Styled(style)) if style.shows_labels()
        );

        for step in 1..4 {
            let fraction = step as f32 / 4.0;
            let lines = Path::new(|builder| {
                builder.move_to(Point::new(bounds.width * fraction, 0.0));
                builder.line_to(Point::new(bounds.width * fraction, bounds.height));
                builder.move_to(Point::new(0.0, bounds.height * fraction));
                builder.line_to(Point::new(bounds.width, bounds.height * fraction));
            });
            frame.stroke(&lines, Stroke::default().with_color(grid).with_width(1.0));
        }

        let max_weight = self.projections.max_weight().max(1) as f32;
        for point in &self.projections.heatmap {
            let intensity = point.weight as f32 / max_weight;
            let spot = Path::new(|builder| {
                builder.circle(viewport.project(point.location), 8.0 + 22.0 * intensity)
            });
            frame.fill(
                &spot,
                Color::from_rgba(0.95, 0.3 - 0.2 * intensity, 0.1, 0.15 + 0.45 * intensity),
            );
        }

        for marker in &self.projections.markers {
            let position = viewport.project(marker.location);
            let pin = Path::new(|builder| builder.circle(position, 5.0));
            frame.fill(&pin, Color::from_rgb(0.85, 0.15, 0.15));
            frame.stroke(&pin, Stroke::default().with_color(Color::WHITE).with_width(1.5));
            if labelled {
                frame.fill_text(canvas::Text {
                    content: marker.payload.trash_count.to_string(),
                    position: Point::new(position.x + 7.0, position.y - 14.0),
                    color: Color::BLACK,
                    size: Pixels(11.0),
                    ..canvas::Text::default()
                });
            }
        }

        if labelled {
            frame.fill_text(canvas::Text {
                content: format!("{:.4}, {:.4}", viewport.max.lat, viewport.min.lng),
                position: Point::new(6.0, 4.0),
                color: Color::from_rgb(0.3, 0.3, 0.3),
                size: Pixels(11.0),
                ..canvas::Text::default()
            });
            frame.fill_text(canvas::Text {
                content: format!("{:.4}, {:.4}", viewport.min.lat, viewport.max.lng),
                position: Point::new(bounds.width - 120.0, bounds.height - 16.0),
                color: Color::from_rgb(0.3, 0.3, 0.3),
                size: Pixels(11.0),
                ..canvas::Text::default()
            });
        }

        vec![frame.into_geometry()]
    }
}

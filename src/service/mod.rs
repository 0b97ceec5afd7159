use super::error::LookupError;
use super::lookup::{ListRequest, LookupService};
use super::store::RecordFilter;
use super::PostalRecord;
use actix_web::dev::{Server, Service as _};
use actix_web::http::StatusCode;
use actix_web::{
    error, get, post, web, App, HttpResponse, HttpServer, Responder, ResponseError, Result,
};
use futures_util::future::FutureExt;
use lazy_static::lazy_static;
use prometheus::{register_histogram_vec, register_int_counter_vec, register_int_gauge};
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::net::TcpListener;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{error, info};
use tracing_actix_web::TracingLogger;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

lazy_static! {
    static ref RESPONSE_CODE_COLLECTOR: IntCounterVec = register_int_counter_vec!(
        Opts::new("http_requests_total", "Total Requests"),
        &["code", "method", "route"],
    )
    .expect("could not register http_requests_total");
    static ref RESPONSE_TIME_COLLECTOR: HistogramVec = register_histogram_vec!(
        HistogramOpts::new("http_request_duration_seconds", "Response Times"),
        &["code", "method", "route"]
    )
    .expect("could not register http_request_duration_seconds");
    static ref INDEX_POINTS_GAUGE: IntGauge = register_int_gauge!(
        "zip_index_points",
        "Points in the published geospatial index"
    )
    .expect("could not register zip_index_points");
}

type AppState = Arc<LookupService>;

#[derive(Deserialize, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl ResponseError for LookupError {
    fn status_code(&self) -> StatusCode {
        match self {
            LookupError::Validation(_) => StatusCode::BAD_REQUEST,
            LookupError::NotFound(_) | LookupError::EmptyDataset => StatusCode::NOT_FOUND,
            LookupError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            LookupError::Inconsistent(_) | LookupError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "lookup failed");
        }
        HttpResponse::build(status).json(ErrorResponse {
            detail: self.to_string(),
        })
    }
}

#[derive(Deserialize, Serialize)]
pub struct ReloadResponse {
    pub points: usize,
}

#[derive(Deserialize)]
pub struct RandomQuery {
    #[serde(default)]
    city_and_state_only: bool,
}

#[derive(Deserialize)]
pub struct NearestQuery {
    lat: f64,
    lng: f64,
}

fn default_page() -> u32 {
    1
}

fn default_sort_by() -> String {
    "population".into()
}

fn default_order() -> String {
    "desc".into()
}

#[derive(Deserialize)]
pub struct ZipsQuery {
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_sort_by")]
    sort_by: String,
    #[serde(default = "default_order")]
    order: String,
    #[serde(default)]
    city_and_state_only: bool,
}

#[get("/random")]
async fn random(
    query: web::Query<RandomQuery>,
    state: web::Data<AppState>,
) -> Result<web::Json<PostalRecord>> {
    let filter = RecordFilter::from(query.city_and_state_only);
    let record = web::block(move || state.random(filter)).await??;
    Ok(web::Json(record))
}

#[get("/nearest")]
async fn nearest(
    query: web::Query<NearestQuery>,
    state: web::Data<AppState>,
) -> Result<web::Json<PostalRecord>> {
    let NearestQuery { lat, lng } = query.into_inner();
    let record = web::block(move || state.nearest(lat, lng)).await??;
    Ok(web::Json(record))
}

#[get("/zips")]
async fn zips(
    query: web::Query<ZipsQuery>,
    state: web::Data<AppState>,
) -> Result<web::Json<Vec<PostalRecord>>> {
    let request = ListRequest::parse(
        query.page,
        &query.sort_by,
        &query.order,
        query.city_and_state_only.into(),
    )
    .map_err(LookupError::from)?;
    let records = web::block(move || state.list(&request)).await??;
    Ok(web::Json(records))
}

#[post("/reload")]
async fn reload(state: web::Data<AppState>) -> Result<web::Json<ReloadResponse>> {
    let points = web::block(move || state.load()).await??;
    record_index_size(points);
    Ok(web::Json(ReloadResponse { points }))
}

#[get("/health")]
async fn health() -> &'static str {
    "Ok"
}

#[get("/metrics")]
async fn metrics() -> Result<String> {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .map_err(error::ErrorInternalServerError)
}

#[get("/{query}")]
async fn lookup(path: web::Path<String>, state: web::Data<AppState>) -> Result<impl Responder> {
    let query = path.into_inner();
    let record = web::block(move || state.resolve(&query)).await??;
    Ok(web::Json(record))
}

/// Registers every route. The catch-all `/{query}` goes last.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(metrics)
        .service(random)
        .service(nearest)
        .service(zips)
        .service(reload)
        .service(lookup);
}

pub fn record_index_size(points: usize) {
    INDEX_POINTS_GAUGE.set(points as i64);
}

fn track_metrics(code: u16, method: &str, route: &str, time: f64) {
    let normalized_code = match code {
        200..=299 => "2XX",
        300..=399 => "3XX",
        400..=499 => "4XX",
        500..=599 => "5XX",
        _ => "invalid",
    };

    RESPONSE_CODE_COLLECTOR
        .with_label_values(&[normalized_code, method, route])
        .inc();

    RESPONSE_TIME_COLLECTOR
        .with_label_values(&[normalized_code, method, route])
        .observe(time);
}

pub fn init_logging() {
    let app_name = env!("CARGO_PKG_NAME");
    let formatting_layer = BunyanFormattingLayer::new(app_name.into(), std::io::stdout);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::Registry::default()
        .with(env_filter)
        .with(JsonStorageLayer)
        .with(formatting_layer)
        .init();
}

pub fn run(listener: TcpListener, state: AppState) -> std::io::Result<Server> {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(TracingLogger::default())
            .wrap_fn(|req, srv| {
                // label by route pattern, not raw path, so /{query} stays one series
                let route = req
                    .match_pattern()
                    .unwrap_or_else(|| String::from("unmatched"));
                let method = String::from(req.method().as_str());
                let offset = OffsetDateTime::now_utc();
                srv.call(req).map(move |res| {
                    let time = OffsetDateTime::now_utc() - offset;
                    if let Ok(ref res) = res {
                        let status = res.response().status();
                        track_metrics(status.into(), &method, &route, time.as_seconds_f64());
                    }
                    res
                })
            })
            .configure(routes)
    })
    .listen(listener)?
    .run();
    Ok(server)
}

pub async fn start(
    state: AppState,
    host: &str,
    port: u16,
) -> std::result::Result<(), Box<dyn Error>> {
    let listener = TcpListener::bind((host, port))?;
    info!(host, port, "listening");
    run(listener, state)?.await?;
    Ok(())
}

use axum::extract::{Path as AxumPath, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use crate::aggregate::Granularity;
use crate::dashboard::{bucket_keys, category_bars, paginate, DashboardData, PaperFilter};
use crate::paper::Paper;

const DEFAULT_PER_PAGE: usize = 20;
const RELOAD_ROUTE: &str = "/api/reload";

#[derive(Debug, Clone)]
pub struct ServeArgs {
    pub port: u16,
    pub per_page: usize,
    /// Directory holding the published JSON artifacts.
    pub data_dir: PathBuf,
    /// Static site root served for every non-API path.
    pub static_dir: PathBuf,
}

impl ServeArgs {
    pub fn new(port: u16, per_page: Option<usize>, data_dir: PathBuf, static_dir: PathBuf) -> Self {
        Self {
            port,
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).max(1),
            data_dir,
            static_dir,
        }
    }
}

/// Either the loaded artifacts or the reason they could not be loaded.
type Loaded = std::result::Result<DashboardData, String>;

#[derive(Clone)]
pub struct AppState {
    data_dir: PathBuf,
    per_page: usize,
    data: Arc<RwLock<Loaded>>,
}

impl AppState {
    pub fn load(data_dir: PathBuf, per_page: usize) -> Self {
        let data = load_data(&data_dir);
        Self {
            data_dir,
            per_page: per_page.max(1),
            data: Arc::new(RwLock::new(data)),
        }
    }

    fn reload(&self) -> Loaded {
        let fresh = load_data(&self.data_dir);
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = fresh.clone();
        fresh
    }

    fn with_data<F>(&self, view: F) -> Response
    where
        F: FnOnce(&DashboardData) -> Response,
    {
        let guard = match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match &*guard {
            Ok(data) => view(data),
            Err(reason) => unavailable(reason),
        }
    }
}

fn load_data(dir: &std::path::Path) -> Loaded {
    DashboardData::load(dir).map_err(|err| {
        error!(dir = %dir.display(), error = %err, "failed to load dashboard data");
        err.to_string()
    })
}

fn unavailable(reason: &str) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "error": reason,
            "retry": RELOAD_ROUTE,
        })),
    )
        .into_response()
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/summary", get(summary))
        .route("/api/chart/:granularity", get(chart_buckets))
        .route("/api/chart/:granularity/:bucket", get(chart))
        .route("/api/papers", get(papers))
        .route("/api/trends", get(trends))
        .route(RELOAD_ROUTE, post(reload))
        .with_state(state)
}

pub async fn run_with_args(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::load(args.data_dir.clone(), args.per_page);
    let app = build_router(state).fallback_service(ServeDir::new(args.static_dir.clone()));

    let addr = format!("0.0.0.0:{}", args.port);
    info!(%addr, data_dir = %args.data_dir.display(), "starting dashboard server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "ok": true,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn summary(State(state): State<AppState>) -> Response {
    state.with_data(|data| {
        Json(json!({
            "metadata": data.metadata,
            "keywords": data.keywords,
            "tfidf_keywords": data.tfidf_keywords,
            "buckets": {
                "daily": bucket_keys(&data.counts, Granularity::Daily),
                "weekly": bucket_keys(&data.counts, Granularity::Weekly),
                "monthly": bucket_keys(&data.counts, Granularity::Monthly),
            },
            "missing": data.missing_sections(),
        }))
        .into_response()
    })
}

async fn chart_buckets(
    State(state): State<AppState>,
    AxumPath(granularity): AxumPath<String>,
) -> Response {
    let Some(granularity) = Granularity::parse(&granularity) else {
        return bad_request(format!("unknown granularity: {granularity}"));
    };
    state.with_data(|data| Json(bucket_keys(&data.counts, granularity)).into_response())
}

async fn chart(
    State(state): State<AppState>,
    AxumPath((granularity, bucket)): AxumPath<(String, String)>,
) -> Response {
    let Some(parsed) = Granularity::parse(&granularity) else {
        return bad_request(format!("unknown granularity: {granularity}"));
    };
    state.with_data(|data| {
        Json(json!({
            "granularity": granularity,
            "bucket": bucket,
            "bars": category_bars(&data.counts, parsed, &bucket),
        }))
        .into_response()
    })
}

#[derive(Debug, Default, Deserialize)]
struct PapersQuery {
    q: Option<String>,
    category: Option<String>,
    keyword: Option<String>,
    safety: Option<bool>,
    page: Option<usize>,
    /// Search the accumulated history instead of the current window.
    #[serde(default)]
    history: bool,
}

async fn papers(State(state): State<AppState>, Query(query): Query<PapersQuery>) -> Response {
    let filter = PaperFilter {
        q: query.q,
        category: query.category,
        keyword: query.keyword,
        safety: query.safety,
    };
    let page = query.page.unwrap_or(1);
    let per_page = state.per_page;
    state.with_data(|data| {
        let source: &[Paper] = match (query.history, &data.historical_papers) {
            (true, Some(history)) => history,
            (true, None) => return bad_request("historical papers are not available".into()),
            (false, _) => &data.papers,
        };
        let matched: Vec<Paper> = filter.apply(source).into_iter().cloned().collect();
        Json(paginate(&matched, page, per_page)).into_response()
    })
}

async fn trends(State(state): State<AppState>) -> Response {
    state.with_data(|data| {
        Json(json!({
            "safety": data.safety_trend(),
            "monthly_keywords": data.monthly_keywords,
        }))
        .into_response()
    })
}

async fn reload(State(state): State<AppState>) -> Response {
    match state.reload() {
        Ok(data) => {
            info!(papers = data.papers.len(), "dashboard data reloaded");
            Json(json!({
                "ok": true,
                "total_papers": data.metadata.total_papers,
            }))
            .into_response()
        }
        Err(reason) => {
            warn!(%reason, "reload failed");
            unavailable(&reason)
        }
    }
}

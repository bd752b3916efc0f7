//! JSON and SSE surface for a map front end.
//!
//! `POST /api/year/:year` is what a timeline control calls while scrubbing.
//! Each request gets a generation number; a grid finishing after a newer one
//! has already been published is dropped, so the last query wins.

use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{net::TcpListener, sync::broadcast};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{info, warn};

use crate::{
    cache::GridCache,
    config::EngineConfig,
    dataset::Dataset,
    engine::{DensityEngine, Grid},
    expeditions::{active_annotations, active_expeditions, ExpeditionAnnotation},
    markers::{settlement_statuses, SettlementStatus},
    snapshot::{expeditions_geojson, GridSnapshot},
};

const CACHED_YEARS: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub generation: u64,
    pub snapshot: GridSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEnvelope {
    pub dataset: String,
    pub requested_generation: u64,
    pub frame: Option<Frame>,
}

/// Expedition routes (GeoJSON) and their annotations for one year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpeditionsView {
    pub year: i32,
    pub routes: Value,
    pub annotations: Vec<ExpeditionAnnotation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearAccepted {
    pub year: i32,
    pub generation: u64,
}

pub struct AppState {
    dataset: Arc<Dataset>,
    engine: Arc<DensityEngine>,
    cache: Mutex<GridCache>,
    requested: AtomicU64,
    latest_frame: Mutex<Option<Frame>>,
    broadcaster: broadcast::Sender<String>,
}

impl AppState {
    pub fn new(dataset: Dataset, config: EngineConfig) -> Arc<Self> {
        let engine = DensityEngine::from_dataset(&dataset, config);
        Self::with_engine(dataset, engine)
    }

    /// Serve `dataset` through an engine assembled by the caller.
    pub fn with_engine(dataset: Dataset, engine: DensityEngine) -> Arc<Self> {
        let (tx, _) = broadcast::channel::<String>(64);
        Arc::new(Self {
            dataset: Arc::new(dataset),
            engine: Arc::new(engine),
            cache: Mutex::new(GridCache::new(CACHED_YEARS)),
            requested: AtomicU64::new(0),
            latest_frame: Mutex::new(None),
            broadcaster: tx,
        })
    }

    /// Cached or freshly built grid. The cache lock is never held while
    /// building, so concurrent requests for different years overlap.
    pub fn grid(&self, year: i32) -> Arc<Grid> {
        let cached = self
            .cache
            .lock()
            .expect("grid cache lock poisoned")
            .get(year);
        if let Some(grid) = cached {
            return grid;
        }

        let grid = Arc::new(self.engine.build_grid(year));
        self.cache
            .lock()
            .expect("grid cache lock poisoned")
            .insert(year, Arc::clone(&grid));
        grid
    }

    fn snapshot(&self, year: i32) -> GridSnapshot {
        let grid = self.grid(year);
        GridSnapshot::new(
            &self.dataset.name,
            &grid,
            settlement_statuses(&self.dataset, year),
            &self.engine.config().encoding,
        )
    }

    /// Publish `frame` unless a newer generation is already visible.
    pub fn publish(&self, frame: Frame) -> bool {
        let mut guard = self.latest_frame.lock().expect("latest frame lock poisoned");
        if guard
            .as_ref()
            .is_some_and(|current| current.generation >= frame.generation)
        {
            warn!(
                generation = frame.generation,
                year = frame.snapshot.year,
                "discarding stale grid"
            );
            return false;
        }
        if let Ok(payload) = serde_json::to_string(&frame) {
            let _ = self.broadcaster.send(payload);
        }
        *guard = Some(frame);
        true
    }

    pub fn latest_frame(&self) -> Option<Frame> {
        self.latest_frame
            .lock()
            .expect("latest frame lock poisoned")
            .clone()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/state", get(latest_state))
        .route("/api/grid/:year", get(grid_for_year))
        .route("/api/settlements/:year", get(settlements_for_year))
        .route("/api/expeditions/:year", get(expeditions_for_year))
        .route("/api/year/:year", post(request_year))
        .route("/api/events", get(stream_events))
        .with_state(state)
}

pub struct WebServerConfig {
    pub dataset: Dataset,
    pub config: EngineConfig,
    pub host: String,
    pub port: u16,
}

pub async fn run(config: WebServerConfig) -> Result<()> {
    let WebServerConfig {
        dataset,
        config,
        host,
        port,
    } = config;

    let dataset_name = dataset.name.clone();
    let state = AppState::new(dataset, config);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;

    info!(dataset = %dataset_name, %addr, "density API listening");

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down density API");
}

async fn health() -> &'static str {
    "ok"
}

async fn latest_state(State(state): State<Arc<AppState>>) -> Json<StateEnvelope> {
    Json(StateEnvelope {
        dataset: state.dataset.name.clone(),
        requested_generation: state.requested.load(Ordering::SeqCst),
        frame: state.latest_frame(),
    })
}

async fn grid_for_year(
    State(state): State<Arc<AppState>>,
    Path(year): Path<i32>,
) -> Result<Json<GridSnapshot>, StatusCode> {
    let snapshot = tokio::task::spawn_blocking(move || state.snapshot(year))
        .await
        .map_err(|err| {
            warn!("grid task failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(snapshot))
}

async fn settlements_for_year(
    State(state): State<Arc<AppState>>,
    Path(year): Path<i32>,
) -> Json<Vec<SettlementStatus>> {
    Json(settlement_statuses(&state.dataset, year))
}

async fn expeditions_for_year(
    State(state): State<Arc<AppState>>,
    Path(year): Path<i32>,
) -> Json<ExpeditionsView> {
    Json(ExpeditionsView {
        year,
        routes: expeditions_geojson(&active_expeditions(&state.dataset, year)),
        annotations: active_annotations(&state.dataset, year),
    })
}

async fn request_year(
    State(state): State<Arc<AppState>>,
    Path(year): Path<i32>,
) -> (StatusCode, Json<YearAccepted>) {
    let generation = state.requested.fetch_add(1, Ordering::SeqCst) + 1;
    let worker = Arc::clone(&state);
    tokio::task::spawn_blocking(move || {
        let snapshot = worker.snapshot(year);
        worker.publish(Frame {
            generation,
            snapshot,
        });
    });
    (StatusCode::ACCEPTED, Json(YearAccepted { year, generation }))
}

async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.broadcaster.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(payload) => Some(Ok(Event::default().data(payload))),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}

use actix_cors::Cors;
use actix_web::{error, http::StatusCode, web, App, HttpRequest, HttpResponse, HttpServer, Result as ActixResult};
use nextspin_core::{Error, FeatureEncoder, FilterParams, IdentityKey, Metric, Neighbor, RecordStore, Snapshot, SnapshotCell};
use nextspin_scoring::{BlendWeights, CrateBuilder, Ranking, ScoreKind, DEFAULT_K};
use nextspin_storage::Dataset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared server state: the published snapshot plus what is needed to
/// rebuild it.
pub struct AppState {
    cell: SnapshotCell,
    data_path: Option<PathBuf>,
    encoder: FeatureEncoder,
    metric: Metric,
}

impl AppState {
    pub fn new(cell: SnapshotCell, encoder: FeatureEncoder, metric: Metric) -> Self {
        Self {
            cell,
            data_path: None,
            encoder,
            metric,
        }
    }

    /// Build the initial snapshot from `store`.
    pub fn from_store(store: RecordStore, encoder: FeatureEncoder, metric: Metric) -> Self {
        let cell = SnapshotCell::new(Snapshot::build(store, &encoder, metric));
        Self::new(cell, encoder, metric)
    }

    /// File re-read by `POST /reload`.
    #[must_use]
    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = Some(path.into());
        self
    }

    pub fn cell(&self) -> &SnapshotCell {
        &self.cell
    }

    /// Re-read the dataset file, rebuild and publish a new snapshot.
    /// Requests in flight keep the snapshot they started with.
    pub fn reload(&self) -> anyhow::Result<Arc<Snapshot>> {
        let path = self
            .data_path
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("server was started without a dataset file"))?;
        let dataset = Dataset::load(path)?;
        let snapshot = self.cell.rebuild(dataset.into_store(), &self.encoder, self.metric);
        tracing::info!(
            records = snapshot.store().len(),
            generation = snapshot.generation(),
            "snapshot reloaded"
        );
        Ok(snapshot)
    }
}

#[derive(Deserialize)]
struct CrateQuery {
    score: Option<String>,
    k: Option<usize>,
    price_weight: Option<f64>,
    min_known: Option<usize>,
}

#[derive(Deserialize)]
struct BlendRequest {
    weights: BTreeMap<String, f64>,
    k: Option<usize>,
    price_weight: Option<f64>,
    min_known: Option<usize>,
    #[serde(default)]
    filter: FilterParams,
}

#[derive(Deserialize)]
struct SimilarQuery {
    artist: String,
    title: String,
    k: Option<usize>,
}

#[derive(Deserialize)]
struct TasteQuery {
    k: Option<usize>,
}

#[derive(Serialize)]
struct NeighborView {
    artist: String,
    title: String,
    key: IdentityKey,
    score: f32,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    records: usize,
    generation: u64,
}

pub struct RestApi;

impl RestApi {
    pub async fn start(state: Arc<AppState>, port: u16) -> std::io::Result<()> {
        let state = web::Data::from(state);
        tracing::info!(port, "starting HTTP API");
        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .wrap(cors)
                .app_data(state.clone())
                .configure(Self::configure)
        })
        .bind(("0.0.0.0", port))?
        .run()
        .await
    }

    /// Routes and extractor settings; `AppState` must be registered as app data.
    pub fn configure(cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::QueryConfig::default().error_handler(|err, _req| {
            let message = err.to_string();
            error::InternalError::from_response(err, error_body(StatusCode::BAD_REQUEST, message)).into()
        }))
        .app_data(web::JsonConfig::default().error_handler(|err, _req| {
            let message = err.to_string();
            error::InternalError::from_response(err, error_body(StatusCode::BAD_REQUEST, message)).into()
        }))
        .route("/health", web::get().to(health))
        .route("/records", web::get().to(list_records))
        .route("/crate", web::get().to(build_crate))
        .route("/crate/blend", web::post().to(build_blend_crate))
        .route("/similar", web::get().to(similar))
        .route("/taste", web::get().to(taste))
        .route("/reload", web::post().to(reload));
    }
}

fn error_body(status: StatusCode, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(serde_json::json!({ "error": message.into() }))
}

fn error_response(err: &Error) -> HttpResponse {
    let status = match err {
        Error::UnknownRecord(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_REQUEST,
    };
    error_body(status, err.to_string())
}

fn neighbor_views(snapshot: &Snapshot, neighbors: Vec<Neighbor>) -> Vec<NeighborView> {
    neighbors
        .into_iter()
        .filter_map(|n| {
            let record = snapshot.store().get(&n.key)?;
            Some(NeighborView {
                artist: record.artist.clone(),
                title: record.title.clone(),
                key: n.key,
                score: n.score,
            })
        })
        .collect()
}

async fn health(state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    let snapshot = state.cell().load();
    Ok(HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        records: snapshot.store().len(),
        generation: snapshot.generation(),
    }))
}

async fn list_records(state: web::Data<AppState>, filter: web::Query<FilterParams>) -> ActixResult<HttpResponse> {
    let snapshot = state.cell().load();
    let filter = filter.into_inner().into_filter();
    let records = snapshot.store().filtered(&filter);
    Ok(HttpResponse::Ok().json(records))
}

fn crate_response(
    snapshot: &Snapshot,
    filter: FilterParams,
    k: Option<usize>,
    price_weight: Option<f64>,
    min_known: Option<usize>,
    ranking: &Ranking,
) -> HttpResponse {
    let builder = match CrateBuilder::from_params(k.unwrap_or(DEFAULT_K), price_weight.unwrap_or(1.0), min_known) {
        Ok(builder) => builder,
        Err(e) => return error_response(&e),
    };
    let filter = filter.into_filter();
    let records = snapshot.store().filtered(&filter);
    let report = builder.build(&records, ranking);
    tracing::debug!(
        ranking = %report.ranking,
        population = records.len(),
        picks = report.picks.len(),
        "crate built"
    );
    HttpResponse::Ok().json(report)
}

async fn build_crate(
    state: web::Data<AppState>,
    query: web::Query<CrateQuery>,
    filter: web::Query<FilterParams>,
) -> ActixResult<HttpResponse> {
    let query = query.into_inner();
    let kind = match query.score.as_deref().map(str::parse::<ScoreKind>).transpose() {
        Ok(kind) => kind.unwrap_or(ScoreKind::Value),
        Err(e) => return Ok(error_response(&e)),
    };
    let snapshot = state.cell().load();
    Ok(crate_response(
        &snapshot,
        filter.into_inner(),
        query.k,
        query.price_weight,
        query.min_known,
        &Ranking::Score(kind),
    ))
}

async fn build_blend_crate(state: web::Data<AppState>, body: web::Json<BlendRequest>) -> ActixResult<HttpResponse> {
    let body = body.into_inner();
    let weights = match BlendWeights::from_names(body.weights.iter().map(|(name, w)| (name.as_str(), *w))) {
        Ok(weights) => weights,
        Err(e) => return Ok(error_response(&e)),
    };
    let snapshot = state.cell().load();
    Ok(crate_response(
        &snapshot,
        body.filter,
        body.k,
        body.price_weight,
        body.min_known,
        &Ranking::Blend(weights),
    ))
}

async fn similar(state: web::Data<AppState>, query: web::Query<SimilarQuery>) -> ActixResult<HttpResponse> {
    let query = query.into_inner();
    let k = query.k.unwrap_or(DEFAULT_K);
    let snapshot = state.cell().load();
    let key = IdentityKey::new(&query.artist, &query.title);
    match snapshot.similar(&key, k) {
        Ok(neighbors) => Ok(HttpResponse::Ok().json(neighbor_views(&snapshot, neighbors))),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn taste(state: web::Data<AppState>, query: web::Query<TasteQuery>) -> ActixResult<HttpResponse> {
    let k = query.k.unwrap_or(DEFAULT_K);
    let snapshot = state.cell().load();
    match snapshot.taste(k) {
        Ok(neighbors) => Ok(HttpResponse::Ok().json(neighbor_views(&snapshot, neighbors))),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn reload(state: web::Data<AppState>, req: HttpRequest) -> ActixResult<HttpResponse> {
    tracing::info!(peer = ?req.peer_addr(), "reload requested");
    let worker = state.clone();
    match web::block(move || worker.reload()).await {
        Ok(Ok(snapshot)) => Ok(HttpResponse::Ok().json(HealthResponse {
            status: "reloaded",
            records: snapshot.store().len(),
            generation: snapshot.generation(),
        })),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "reload failed");
            Ok(error_body(StatusCode::BAD_REQUEST, format!("{e:#}")))
        }
        Err(e) => Ok(error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

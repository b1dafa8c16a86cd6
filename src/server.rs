//! HTTP request layer.
//!
//! Thin axum front over [`Household`]: decode the body, call the engine on
//! the blocking pool, map [`Error`] to a status code. Push subscriptions
//! are served as server-sent events on `/events?memberId=<id>`.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::{get, patch, post},
    Router,
};
use futures::stream::Stream;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::activity::{ActivityStats, CountEntry, DEFAULT_STATS_DAYS};
use crate::config::Config;
use crate::error::{Error, ErrorKind, JsonError, Result};
use crate::household::{ActionResult, Household, MemberPatch, NewTask};
use crate::hub::SubscriptionId;
use crate::lifecycle::ActionRequest;
use crate::model::{Member, Snapshot, Task};

pub struct AppState {
    pub household: Arc<Household>,
    pub keep_alive: Duration,
    /// Flips to true when the server is going down; ends open push streams.
    pub shutdown: watch::Receiver<bool>,
}

/// Error body: `{"error": "...", "kind": "...", "code": n}` plus details
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if self.0.kind() == ErrorKind::Internal {
            tracing::error!(error = %self.0, "request failed");
        }
        (status, Json(JsonError::from(&self.0))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Run household work on the blocking pool; it takes the store mutex and
/// may fsync.
async fn blocking<T, F>(work: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let outcome = tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| Error::OperationFailed(format!("request worker failed: {err}")))?;
    Ok(outcome?)
}

/// Decode a JSON body; an empty body reads as `{}`.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    let raw: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        body
    };
    serde_json::from_slice(raw).map_err(|err| Error::Validation(format!("invalid request body: {err}")))
}

fn require_actor(actor_id: &str) -> Result<()> {
    if actor_id.trim().is_empty() {
        return Err(Error::Validation("actorId is required".to_string()));
    }
    Ok(())
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/members", post(create_member))
        .route("/api/members/:id", patch(update_member))
        .route("/api/tasks", post(create_task))
        .route("/api/tasks/:id", patch(apply_action).delete(delete_task))
        .route("/api/activity/stats", get(activity_stats))
        .route("/api/stats/reminders", get(reminder_stats))
        .route("/api/stats/reminders/trend", get(reminder_trend))
        .route("/api/stats/tasks", get(task_stats))
        .route("/api/stats/members", get(member_stats))
        .route("/events", get(events))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind, serve until `shutdown` resolves, then drain connections.
pub async fn serve(
    household: Arc<Household>,
    config: &Config,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let state = Arc::new(AppState {
        household,
        keep_alive: Duration::from_secs(config.hub.keep_alive_secs),
        shutdown: shutdown.clone(),
    });
    let app = router(state);

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "chorehub listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for(shutdown))
        .await?;
    info!("server stopped");
    Ok(())
}

/// Resolves once the flag is set or its sender is gone.
fn wait_for(mut shutdown: watch::Receiver<bool>) -> impl Future<Output = ()> + Send + 'static {
    async move {
        while !*shutdown.borrow_and_update() {
            if shutdown.changed().await.is_err() {
                break;
            }
        }
    }
}

async fn get_state(State(state): State<Arc<AppState>>) -> ApiResult<Json<Snapshot>> {
    let household = Arc::clone(&state.household);
    Ok(Json(blocking(move || Ok(household.snapshot())).await?))
}

#[derive(Debug, Deserialize)]
struct CreateMemberBody {
    #[serde(default)]
    name: String,
}

async fn create_member(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult<Json<Member>> {
    let body: CreateMemberBody = parse_body(&body)?;
    let household = Arc::clone(&state.household);
    Ok(Json(blocking(move || household.create_member(&body.name)).await?))
}

async fn update_member(
    State(state): State<Arc<AppState>>,
    Path(member_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Member>> {
    let patch: MemberPatch = parse_body(&body)?;
    let household = Arc::clone(&state.household);
    Ok(Json(blocking(move || household.update_member(&member_id, &patch)).await?))
}

async fn create_task(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult<Json<Task>> {
    let request: NewTask = parse_body(&body)?;
    let household = Arc::clone(&state.household);
    Ok(Json(blocking(move || household.create_task(&request)).await?))
}

async fn apply_action(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let request: ActionRequest = parse_body(&body)?;
    require_actor(&request.actor_id)?;

    let household = Arc::clone(&state.household);
    let body = match blocking(move || household.apply_action(&task_id, &request)).await? {
        ActionResult::Updated { task, spawned } => json!({ "task": task, "spawned": spawned }),
        ActionResult::Purged { .. } => json!({ "ok": true }),
    };
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
struct DeleteBody {
    #[serde(rename = "actorId", default)]
    actor_id: String,
}

async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let body: DeleteBody = parse_body(&body)?;
    require_actor(&body.actor_id)?;
    let household = Arc::clone(&state.household);
    blocking(move || household.delete_task(&task_id, &body.actor_id)).await?;
    Ok(Json(json!({ "ok": true })))
}

/// `?days=N`; missing, unparsable or zero reads as the default window.
#[derive(Debug, Default, Deserialize)]
struct StatsQuery {
    #[serde(default)]
    days: Option<String>,
}

impl StatsQuery {
    fn days(&self) -> u32 {
        self.days
            .as_deref()
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|days| *days > 0)
            .unwrap_or(DEFAULT_STATS_DAYS)
    }
}

async fn load_stats(state: &AppState, query: &StatsQuery) -> ApiResult<ActivityStats> {
    let household = Arc::clone(&state.household);
    let days = query.days();
    blocking(move || household.activity_stats(days)).await
}

/// Count table keyed the way the dashboard reads it, e.g. `{"type": .., "count": n}`.
fn keyed(entries: &[CountEntry], field: &str) -> Vec<Value> {
    entries
        .iter()
        .map(|entry| {
            let mut row = Map::new();
            row.insert(field.to_string(), Value::String(entry.key.clone()));
            row.insert("count".to_string(), json!(entry.count));
            Value::Object(row)
        })
        .collect()
}

async fn activity_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Json<ActivityStats>> {
    Ok(Json(load_stats(&state, &query).await?))
}

async fn reminder_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Json<Value>> {
    let stats = load_stats(&state, &query).await?;
    Ok(Json(json!({
        "byType": keyed(&stats.by_reminder_type, "type"),
        "byMember": keyed(&stats.by_member, "memberId"),
        "byTask": keyed(&stats.by_task, "taskId"),
    })))
}

async fn reminder_trend(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Json<Value>> {
    let stats = load_stats(&state, &query).await?;
    Ok(Json(json!({ "rows": stats.reminder_trend })))
}

async fn task_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Json<Value>> {
    let stats = load_stats(&state, &query).await?;
    Ok(Json(json!({
        "byAction": keyed(&stats.by_action, "action"),
        "byActor": keyed(&stats.by_actor, "actorId"),
    })))
}

async fn member_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Json<Value>> {
    let stats = load_stats(&state, &query).await?;
    Ok(Json(json!({ "members": stats.members })))
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    #[serde(rename = "memberId", default)]
    member_id: String,
}

/// Unsubscribes when the response stream is dropped.
struct SubscriptionGuard {
    household: Arc<Household>,
    id: SubscriptionId,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.household.unsubscribe(self.id);
    }
}

async fn events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Sse<impl Stream<Item = std::result::Result<SseEvent, Infallible>>>> {
    let member_id = query.member_id.trim().to_string();
    if member_id.is_empty() {
        return Err(Error::Validation("memberId is required".to_string()).into());
    }

    let mut subscription = state.household.subscribe(&member_id);
    let guard = SubscriptionGuard {
        household: Arc::clone(&state.household),
        id: subscription.id,
    };
    let mut shutdown = state.shutdown.clone();
    debug!(member = %member_id, subscription = subscription.id, "push stream opened");

    let stream = async_stream::stream! {
        let _guard = guard;
        yield Ok(SseEvent::default().comment("connected"));

        loop {
            let next = tokio::select! {
                event = subscription.recv() => event,
                _ = shutdown.changed() => None,
            };
            let Some(event) = next else {
                break;
            };
            yield Ok(SseEvent::default().event(event.kind.as_str()).data(event.data.as_str()));
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(state.keep_alive).text("ping")))
}

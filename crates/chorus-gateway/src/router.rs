use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chorus_core::{Priority, Task, TaskStatus};
use chorus_orchestrator::{AgentSnapshot, GatewayEvent, TaskSupervisor};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::warn;
use uuid::Uuid;

/// Body accepted by `POST /tasks` (spec §6 "Task REST surface").
#[derive(Debug, Deserialize)]
pub struct SubmitTaskBody {
    pub description: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(rename = "dueDate", default)]
    pub due_date: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePriorityBody {
    pub priority: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn bad_request(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorBody { error: message.into() })).into_response()
}

fn not_found(message: impl Into<String>) -> Response {
    (StatusCode::NOT_FOUND, Json(ErrorBody { error: message.into() })).into_response()
}

pub async fn submit_task(State(supervisor): State<Arc<TaskSupervisor>>, Json(body): Json<SubmitTaskBody>) -> Response {
    if body.description.trim().is_empty() {
        return bad_request("description is required");
    }

    let priority = match body.priority.as_deref() {
        Some(raw) => match raw.parse::<Priority>() {
            Ok(p) => p,
            Err(()) => return bad_request(format!("invalid priority: {raw}")),
        },
        None => Priority::default(),
    };

    let task = supervisor.submit(body.description, priority, body.due_date).await;
    (StatusCode::CREATED, Json(task)).into_response()
}

pub async fn list_tasks(State(supervisor): State<Arc<TaskSupervisor>>) -> Json<Vec<Task>> {
    Json(supervisor.list().await)
}

pub async fn get_task(State(supervisor): State<Arc<TaskSupervisor>>, Path(id): Path<Uuid>) -> Response {
    match supervisor.get(id).await {
        Some(task) => Json(task).into_response(),
        None => not_found(format!("no such task {id}")),
    }
}

pub async fn get_task_agents(State(supervisor): State<Arc<TaskSupervisor>>, Path(id): Path<Uuid>) -> Response {
    if supervisor.get(id).await.is_none() {
        return not_found(format!("no such task {id}"));
    }
    let agents: HashMap<String, AgentSnapshot> = supervisor.get_agents(id);
    Json(agents).into_response()
}

pub async fn update_task_status(
    State(supervisor): State<Arc<TaskSupervisor>>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateStatusBody>,
) -> Response {
    let status = match body.status.parse::<TaskStatus>() {
        Ok(s) => s,
        Err(()) => return bad_request(format!("invalid status: {}", body.status)),
    };

    match supervisor.update_status(id, status).await {
        Ok(()) => match supervisor.get(id).await {
            Some(task) => Json(task).into_response(),
            None => not_found(format!("no such task {id}")),
        },
        Err(err) => {
            warn!(task_id = %id, error = %err, "update_status failed");
            not_found(err.to_string())
        }
    }
}

pub async fn update_task_priority(
    State(supervisor): State<Arc<TaskSupervisor>>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdatePriorityBody>,
) -> Response {
    let priority = match body.priority.parse::<Priority>() {
        Ok(p) => p,
        Err(()) => return bad_request(format!("invalid priority: {}", body.priority)),
    };

    match supervisor.update_priority(id, priority).await {
        Ok(()) => match supervisor.get(id).await {
            Some(task) => Json(task).into_response(),
            None => not_found(format!("no such task {id}")),
        },
        Err(err) => {
            warn!(task_id = %id, error = %err, "update_priority failed");
            not_found(err.to_string())
        }
    }
}

pub async fn delete_task(State(supervisor): State<Arc<TaskSupervisor>>, Path(id): Path<Uuid>) -> Response {
    if supervisor.delete(id).await {
        Json(serde_json::json!({ "message": format!("task {id} deleted") })).into_response()
    } else {
        not_found(format!("no such task {id}"))
    }
}

pub async fn system_stats(State(supervisor): State<Arc<TaskSupervisor>>) -> Json<chorus_orchestrator::SystemStats> {
    Json(supervisor.stats().await)
}

/// `GET /events`: one SSE stream per subscriber, fed from the
/// Supervisor's broadcast channel (spec §6 "Event stream").
pub async fn events_stream(
    State(supervisor): State<Arc<TaskSupervisor>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let initial_tasks = supervisor.list().await;
    let initial = futures_util::stream::once(async move { render_event(GatewayEvent::Tasks(initial_tasks)) });

    let receiver = supervisor.subscribe();
    let rest = BroadcastStream::new(receiver).filter_map(|item| item.ok().map(render_event));

    Sse::new(initial.chain(rest)).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

fn render_event(event: GatewayEvent) -> Result<Event, Infallible> {
    let (name, payload) = match event {
        GatewayEvent::Tasks(tasks) => ("tasks", serde_json::to_value(tasks)),
        GatewayEvent::Agents(agents) => ("agents", serde_json::to_value(agents)),
        GatewayEvent::Stats(stats) => ("stats", serde_json::to_value(stats)),
    };
    let data = payload.unwrap_or(serde_json::Value::Null);
    Ok(Event::default().event(name).json_data(data).unwrap_or_else(|_| Event::default().event(name).data("null")))
}

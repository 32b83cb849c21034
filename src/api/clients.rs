use std::sync::Arc;

use axum::{
    extract::{rejection::PathRejection, Path, State},
    Json,
};
use validator::Validate;

use crate::errors::ApiError;
use crate::middleware::bearer::CurrentUser;
use crate::models::client::{Client, ClientRequest};
use crate::models::envelope::Envelope;
use crate::AppState;

fn missing_client(id: i32) -> ApiError {
    ApiError::NotFound {
        message: Some(format!("The client {} doesn't exist", id)),
    }
}

fn client_id(path: Result<Path<i32>, PathRejection>) -> Result<i32, ApiError> {
    path.map(|Path(id)| id).map_err(|rejection| {
        tracing::debug!("rejected client id: {}", rejection);
        ApiError::validation("Invalid client id")
    })
}

/// Absent, malformed or invalid bodies are all a bad request.
fn accept(payload: Option<Json<ClientRequest>>) -> Result<ClientRequest, ApiError> {
    let Json(request) = payload.ok_or_else(|| ApiError::validation("Bad request"))?;
    if request.validate().is_err() || request.name.trim().is_empty() {
        return Err(ApiError::validation("The Name field is required."));
    }
    Ok(request)
}

/// GET /api/client - list every client
pub async fn list_clients(
    State(state): State<Arc<AppState>>,
) -> Result<Envelope<Vec<Client>>, ApiError> {
    let clients = state.store.clients().get_all().await?;
    Ok(Envelope::ok(clients))
}

/// GET /api/client/:id - fetch one client
pub async fn get_client(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i32>, PathRejection>,
) -> Result<Envelope<Client>, ApiError> {
    let id = client_id(path)?;
    let client = state
        .store
        .clients()
        .get_by_id(id)
        .await?
        .ok_or(ApiError::NotFound { message: None })?;
    Ok(Envelope::ok(client))
}

/// POST /api/client - create a client
pub async fn create_client(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    payload: Option<Json<ClientRequest>>,
) -> Result<Envelope<Client>, ApiError> {
    let request = accept(payload)?;
    let repo = state.store.clients();

    repo.add(Client::new(request.name));
    let client = repo
        .save()
        .await?
        .inserted
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("insert returned no row")))?;

    tracing::info!(client_id = client.id, by = %user.username, "client created");
    Ok(Envelope::ok(client))
}

/// PUT /api/client - replace an existing client's fields
pub async fn update_client(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    payload: Option<Json<ClientRequest>>,
) -> Result<Envelope<Client>, ApiError> {
    let request = accept(payload)?;
    let repo = state.store.clients();

    let mut client = repo
        .get_by_id(request.id)
        .await?
        .ok_or_else(|| missing_client(request.id))?;

    client.name = request.name;
    repo.update(client.clone());
    let client = repo.save().await?.updated.into_iter().next().unwrap_or(client);

    tracing::info!(client_id = client.id, by = %user.username, "client updated");
    Ok(Envelope::ok(client))
}

/// DELETE /api/client/:id - remove a client
pub async fn delete_client(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    path: Result<Path<i32>, PathRejection>,
) -> Result<Envelope<()>, ApiError> {
    let id = client_id(path)?;
    let repo = state.store.clients();

    let client = repo.get_by_id(id).await?.ok_or_else(|| missing_client(id))?;

    repo.remove(client);
    repo.save().await?;

    tracing::info!(client_id = id, by = %user.username, "client deleted");
    Ok(Envelope::empty())
}

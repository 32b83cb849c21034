use std::sync::Arc;

use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post},
    Router,
};

use crate::middleware::bearer::require_bearer;
use crate::AppState;

pub mod auth;
pub mod clients;

/// Build the REST router. All routes are relative; the caller mounts this under `/api`.
pub fn api_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .route(
            "/client",
            get(clients::list_clients)
                .post(clients::create_client)
                .put(clients::update_client),
        )
        .route(
            "/client/:id",
            get(clients::get_client).delete(clients::delete_client),
        );

    let register = Router::new().route("/auth/register", post(auth::register));
    let register = if state.config.open_registration {
        register
    } else {
        guarded(register, &state)
    };

    Router::new()
        .route("/auth/login", post(auth::login))
        .merge(register)
        .merge(guarded(protected, &state))
        .fallback(fallback_404)
}

fn guarded(routes: Router<Arc<AppState>>, state: &Arc<AppState>) -> Router<Arc<AppState>> {
    routes.route_layer(middleware::from_fn_with_state(state.clone(), require_bearer))
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}

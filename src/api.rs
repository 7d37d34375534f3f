use rocket::{http::Status, serde::json::Json, Catcher, Request, Route};
use serde::Serialize;

mod auth;
mod common;
mod health;
mod voting;

/// Every route is mounted under this prefix.
pub const BASE: &str = "/api/v1";

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(voting::routes());
    routes.extend(health::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}

#[derive(Serialize)]
struct CaughtError {
    error: &'static str,
}

/// Requests that never reached a handler, e.g. a failed guard or an
/// unparseable body, still get a JSON error.
#[catch(default)]
fn default_catcher(status: Status, _req: &Request<'_>) -> (Status, Json<CaughtError>) {
    let error = match status.code {
        401 => "Not authorized to access this route",
        404 => "Not found",
        400 | 422 => "Invalid request body",
        _ => status.reason().unwrap_or("Unknown error"),
    };
    (status, Json(CaughtError { error }))
}

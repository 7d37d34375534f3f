use rocket::{serde::json::Json, Route, State};
use serde::Serialize;

use crate::error::Result;
use crate::model::store::Stores;

pub fn routes() -> Vec<Route> {
    routes![health]
}

#[derive(Debug, Serialize)]
pub struct Health {
    status: &'static str,
}

/// Report whether the credential store can be reached.
#[get("/health")]
async fn health(stores: &State<Stores>) -> Result<Json<Health>> {
    stores.credentials.ping().await?;
    Ok(Json(Health { status: "ok" }))
}

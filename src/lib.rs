#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod service;

pub use config::Config;

use collaborators::Collaborators;
use config::{CollaboratorsFairing, ConfigFairing, DatabaseFairing};
use logging::LoggerFairing;
use model::store::Stores;
use service::AttestationBackfillFairing;

/// Build the server, configured from `Rocket.toml` and `ROCKET_*` variables.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount(api::BASE, api::routes())
        .register(api::BASE, api::catchers())
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(CollaboratorsFairing)
        .attach(AttestationBackfillFairing)
        .attach(LoggerFairing)
}

/// Build the server around already constructed state, skipping the fairings
/// that would otherwise load it.
pub fn rocket_for_backend(
    config: Config,
    stores: Stores,
    collaborators: Collaborators,
) -> Rocket<Build> {
    rocket::build()
        .mount(api::BASE, api::routes())
        .register(api::BASE, api::catchers())
        .manage(config)
        .manage(stores)
        .manage(collaborators)
        .attach(LoggerFairing)
}

#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, DatabaseFairing, ResolverFairing};
use crate::logging::LoggerFairing;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod postcode;
pub mod ranking;
pub mod store;
pub mod sync;

/// The server: configuration, the store and the postcode resolver are all
/// set up by fairings at ignition.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(ResolverFairing)
}

/// A server around an existing store and resolver, with no configuration needed.
#[cfg(test)]
pub(crate) fn rocket_with(
    store: impl store::BallotStore + 'static,
    resolver: postcode::PostcodeResolver,
) -> Rocket<Build> {
    let store: Box<dyn store::BallotStore> = Box::new(store);
    rocket::build()
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .manage(store)
        .manage(resolver)
}

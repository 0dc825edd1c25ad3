//! Aircraft visit recorder: polls an ADS-B snapshot feed, folds sightings
//! into visit sessions, keeps a live map and resolves registrations.

pub mod aircraft_type;
pub mod config;
pub mod database;
pub mod errors;
pub mod gateway;
pub mod live;
pub mod lookup;
pub mod models;
pub mod pipeline;
pub mod ratelimit;
pub mod recorder;
pub mod resolver;
pub mod session;
pub mod source;

#[cfg(test)]
mod testing;

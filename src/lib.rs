pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod pos_db;
pub mod pricing;
pub mod schema_doctor;
pub mod server;

use std::sync::Arc;

use config::Settings;
use pos_db::PosDb;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<PosDb>,
    pub settings: Arc<Settings>,
}

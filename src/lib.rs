pub mod api;
pub mod checkout;
pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod models;
pub mod response;
pub mod seed;
pub mod slug;

use sqlx::PgPool;

use config::Config;

/// Shared by every worker through `web::Data`.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
}

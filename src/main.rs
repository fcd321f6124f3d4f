// src/main.rs
use std::io;

use actix_web::{App, HttpServer, middleware::Logger, web};
use dotenvy::dotenv;
use env_logger::Env;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use jewel_storefront::config::Config;
use jewel_storefront::{AppState, api, db, docs, seed};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(io::Error::other)?;

    let pool = db::connect(&config).await.map_err(|e| {
        log::error!("failed to connect to database: {e}");
        io::Error::other(e)
    })?;

    sqlx::migrate!().run(&pool).await.map_err(|e| {
        log::error!("failed to run migrations: {e}");
        io::Error::other(e)
    })?;

    if config.seed_on_start {
        match seed::seed(&pool, &config).await {
            Ok(true) => log::info!("seed data created"),
            Ok(false) => {}
            Err(e) => log::error!("seeding failed: {e}"),
        }
    }

    let addr = (config.bind_addr.clone(), config.port);
    let state = web::Data::new(AppState { pool, config });
    log::info!("listening on {}:{}", addr.0, addr.1);

    HttpServer::new(move || {
        App::new()
            .wrap(api::cors(&state.config))
            .wrap(Logger::default())
            .app_data(state.clone())
            .service(
                SwaggerUi::new("/docs/{_:.*}")
                    .url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
            )
            .configure(api::configure)
    })
    .bind(addr)?
    .run()
    .await
}

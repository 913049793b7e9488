use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use log::{error, info};

use travel_desk::{config::Config, db::MongoDB, routes};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let db = match MongoDB::new(&config.mongodb_uri, &config.database_name).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to configure MongoDB client: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = db.ensure_indexes().await {
        error!("Failed to create indexes: {e}");
        std::process::exit(1);
    }
    if let Err(e) = db.seed_platform_admin(&config).await {
        error!("Failed to seed platform admin: {e}");
        std::process::exit(1);
    }

    let bind_address = config.bind_address();
    info!("Starting server at http://{}:{}", bind_address.0, bind_address.1);

    let db = web::Data::new(db);
    let config = web::Data::new(config);
    HttpServer::new(move || {
        let cors = match config.cors_origin.as_deref() {
            Some(origin) => Cors::default()
                .allowed_origin(origin)
                .allow_any_method()
                .allow_any_header()
                .max_age(3600),
            None => Cors::permissive(),
        };
        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(db.clone())
            .app_data(config.clone())
            .configure(routes::configure)
    })
    .bind(bind_address)?
    .run()
    .await
}

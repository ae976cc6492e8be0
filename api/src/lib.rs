pub mod password;
pub mod routes;
pub mod store;
pub mod telemetry;
pub mod time;

use actix_cors::Cors;
use actix_identity::IdentityMiddleware;
use actix_session::{
    SessionMiddleware, config::BrowserSession, storage::CookieSessionStore,
};
use actix_web::cookie::{Key, time::Duration};
use actix_web::dev::Server;
use actix_web::{App, HttpServer, web};
use anyhow::Context;
use sqlx::PgPool;
use std::net::TcpListener;

use crate::telemetry::LogFormat;
use crate::time::TimeSource;

/// Build the server, but not await it.
///
/// Returns the port that the server has bound to by modifying the config.
pub async fn build(
    config: &mut Config,
    time_source: TimeSource,
) -> std::io::Result<Server> {
    let secret_key = Key::generate(); // key for signing session cookies
    let db_pool = PgPool::connect(&config.database_url)
        .await
        .map_err(std::io::Error::other)?;
    let db_pool = web::Data::new(db_pool);
    let time_source = web::Data::new(time_source);

    let allowed_origins = config.allowed_origins.clone();

    // OS assigns the port if binding to 0
    let listener = TcpListener::bind(format!("{}:{}", config.ip, config.port))?;
    config.port = listener.local_addr()?.port();
    tracing::info!(ip = %config.ip, port = config.port, "listening");

    let server = HttpServer::new(move || {
        App::new()
            .wrap(cors(&allowed_origins))
            // Signed cookie holding the user id. Sessions can't be revoked
            // server side and don't survive a restart.
            .wrap(IdentityMiddleware::default())
            .wrap(
                SessionMiddleware::builder(
                    CookieSessionStore::default(),
                    secret_key.clone(),
                )
                .cookie_name("bank".into())
                .session_lifecycle(
                    BrowserSession::default().state_ttl(Duration::days(30)),
                )
                .build(),
            )
            .service(routes::api_services())
            .app_data(db_pool.clone())
            .app_data(time_source.clone())
    })
    .listen(listener)?
    .run();
    Ok(server)
}

fn cors(allowed_origins: &[String]) -> Cors {
    let cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .supports_credentials();
    if allowed_origins.iter().any(|origin| origin == "*") {
        return cors.allow_any_origin();
    }
    allowed_origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
}

pub struct Config {
    pub database_url: String,
    /// set to "0.0.0.0" for public access, "127.0.0.1" for local dev
    pub ip: String,
    /// set to 0 to get an os-assigned port
    pub port: u16,
    /// List of allowed CORS origins. Use "*" to allow any origin (development only)
    pub allowed_origins: Vec<String>,
    pub log_format: LogFormat,
}

impl Config {
    /// Read the configuration from environment variables. Only
    /// `DATABASE_URL` is required.
    pub fn from_env() -> anyhow::Result<Self> {
        use std::env::var;

        let database_url =
            var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let ip = var("IP_ADDRESS").unwrap_or_else(|_| "127.0.0.1".into());
        let port = match var("PORT") {
            Ok(port) => port
                .parse()
                .with_context(|| format!("Invalid PORT {port:?}"))?,
            Err(_) => 8000,
        };
        let allowed_origins = parse_origins(
            &var("ALLOWED_ORIGINS").unwrap_or_else(|_| "*".into()),
        );
        let log_format = match var("LOG_FORMAT") {
            Ok(format) => format.parse()?,
            Err(_) => LogFormat::default(),
        };

        Ok(Config {
            database_url,
            ip,
            port,
            allowed_origins,
            log_format,
        })
    }
}

fn parse_origins(origins: &str) -> Vec<String> {
    origins
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

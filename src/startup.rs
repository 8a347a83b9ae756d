use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::PgPool;
use std::net::TcpListener;

use crate::auth::{CsrfStore, ADMIN_ONLY, SUPERVISOR_AND_UP};
use crate::configuration::Settings;
use crate::middleware::{CsrfProtect, RequestLogger, RequireRole, SessionAuth};
use crate::routes::{
    dashboard_status, get_current_user, health_check, issue_csrf_token, login, logout,
    purge_tokens, refresh, register,
};
use crate::security::{LoginRateLimiter, RateLimitConfig};

pub fn run(
    listener: TcpListener,
    connection: PgPool,
    settings: Settings,
) -> Result<Server, std::io::Error> {
    let connection = web::Data::new(connection);
    let jwt = web::Data::new(settings.jwt.clone());
    let session = web::Data::new(settings.session.clone());
    let csrf_store = web::Data::new(CsrfStore::new());
    let login_limiter = web::Data::new(LoginRateLimiter::new(RateLimitConfig::default()));

    let use_cookies = settings.session.use_cookies;
    let jwt_config = settings.jwt.clone();

    let server = HttpServer::new(move || {
        App::new()
            // Mutating requests need an anti-forgery token once cookie
            // transport is on; bearer-header requests are exempt
            .wrap(CsrfProtect::new(csrf_store.clone(), use_cookies))
            // Registered last so it runs outermost and logs every response
            .wrap(RequestLogger)
            // Shared state
            .app_data(connection.clone())
            .app_data(jwt.clone())
            .app_data(session.clone())
            .app_data(csrf_store.clone())
            .app_data(login_limiter.clone())
            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/csrf-token", web::get().to(issue_csrf_token))
            .route("/auth/register", web::post().to(register))
            .route("/auth/login", web::post().to(login))
            .route("/auth/refresh", web::post().to(refresh))
            .route("/auth/logout", web::post().to(logout))
            // Authenticated routes
            .service(
                web::scope("/api")
                    .wrap(SessionAuth::new(jwt_config.clone(), use_cookies))
                    .route("/me", web::get().to(get_current_user))
                    .service(
                        web::scope("/dashboard")
                            .wrap(RequireRole::new(SUPERVISOR_AND_UP))
                            .route("/status", web::get().to(dashboard_status)),
                    )
                    .service(
                        web::scope("/admin")
                            .wrap(RequireRole::new(ADMIN_ONLY))
                            .route("/tokens/purge", web::post().to(purge_tokens)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}

extern crate actix_web;
extern crate chrono;
extern crate dotenv;
extern crate env_logger;
extern crate hex;
extern crate itertools;
extern crate jsonwebtoken;
extern crate log;
extern crate once_cell;
extern crate rand;
extern crate regex;
extern crate serde;
extern crate serde_json;
extern crate sha2;
extern crate sqlx;
extern crate thiserror;
extern crate tokio;

mod context;
mod error;
mod handlers;
mod middlewares;
pub mod models;
pub mod request;
pub mod response;

use actix_web::web::{delete, get, patch, post, put, resource, scope, Data};
use actix_web::HttpServer;
use middlewares::jwt::{Jwt, JWT_SECRET};
use middlewares::role::RoleGuard;
use models::user::Role;
use sqlx::postgres::PgPoolOptions;

#[actix_web::main]
async fn main() -> Result<(), std::io::Error> {
    dotenv::dotenv().ok();
    env_logger::init();
    let database_url = dotenv::var("DATABASE_URL").expect("environment variable DATABASE_URL not been set");
    let jwt_secret = dotenv::var(JWT_SECRET).expect("environment variable JWT_SECRET not been set");
    let bind_addr = dotenv::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_owned());
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("failed to connect to database");
    HttpServer::new(move || {
        actix_web::App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(Data::new(pool.clone()))
            .service(
                scope("")
                    .wrap(Jwt::new(jwt_secret.as_bytes().to_owned()))
                    .service(resource("signup").route(post().to(handlers::signup)))
                    .service(resource("login").route(post().to(handlers::login)))
                    .service(resource("logout").route(post().to(handlers::logout)))
                    .service(resource("daftar-petani").route(post().to(handlers::application::submit)))
                    .route("petani-application/status", get().to(handlers::application::status))
                    .service(
                        scope("user")
                            .service(
                                resource("profile")
                                    .route(get().to(handlers::user::profile))
                                    .route(put().to(handlers::user::update_profile)),
                            )
                            .route("delete", delete().to(handlers::user::delete_account))
                            .route("projects", get().to(handlers::project::name_list)),
                    )
                    .route("profile-view", post().to(handlers::user::record_profile_view))
                    .route("dashboard/stats", get().to(handlers::project::dashboard_stats))
                    .service(
                        scope("proyek")
                            .service(
                                resource("")
                                    .route(post().to(handlers::project::create))
                                    .route(get().to(handlers::project::list)),
                            )
                            .service(
                                scope("{proyek_id}")
                                    .service(
                                        resource("")
                                            .route(get().to(handlers::project::detail))
                                            .route(put().to(handlers::project::update))
                                            .route(delete().to(handlers::project::delete_proyek)),
                                    )
                                    .route("produk", post().to(handlers::product::create))
                                    .service(
                                        scope("fase")
                                            .route("", post().to(handlers::project::create_fase))
                                            .service(
                                                resource("{fase_id}")
                                                    .route(get().to(handlers::project::fase_detail))
                                                    .route(put().to(handlers::project::update_fase))
                                                    .route(delete().to(handlers::project::delete_fase)),
                                            ),
                                    ),
                            ),
                    )
                    .service(
                        scope("produk").service(
                            resource("{produk_id}")
                                .route(put().to(handlers::product::update))
                                .route(delete().to(handlers::product::delete_produk)),
                        ),
                    )
                    .service(resource("products").route(get().to(handlers::product::list)))
                    .service(resource("farmers").route(get().to(handlers::farmer::list)))
                    .service(resource("updates").route(get().to(handlers::feed::updates)))
                    .service(resource("stats").route(get().to(handlers::stats::overview)))
                    .service(
                        scope("jejak")
                            .service(
                                resource("")
                                    .route(get().to(handlers::feed::jejak))
                                    .route(post().to(handlers::feed::create_update)),
                            )
                            .service(
                                resource("{update_id}")
                                    .route(put().to(handlers::feed::update_jejak))
                                    .route(delete().to(handlers::feed::delete_jejak)),
                            ),
                    )
                    .service(
                        resource("like")
                            .route(post().to(handlers::feed::like))
                            .route(delete().to(handlers::feed::unlike)),
                    )
                    .service(resource("comment").route(post().to(handlers::feed::create_comment)))
                    .route("comment/{jejak_id}", get().to(handlers::feed::comments))
                    .service(resource("chat").route(post().to(handlers::chatbot::chat)))
                    .service(
                        scope("cs-chat")
                            .route("", post().to(handlers::message::create))
                            .route("history", get().to(handlers::message::history))
                            .route("delete", delete().to(handlers::message::delete_history)),
                    )
                    .service(
                        scope("admin")
                            .wrap(RoleGuard::new(pool.clone(), Role::Admin))
                            .service(
                                scope("petani-applications")
                                    .service(
                                        resource("")
                                            .route(get().to(handlers::admin::list_applications))
                                            .route(patch().to(handlers::admin::transition)),
                                    )
                                    .service(
                                        resource("{application_id}")
                                            .route(get().to(handlers::admin::application_detail))
                                            .route(delete().to(handlers::admin::delete_application)),
                                    ),
                            )
                            .service(
                                scope("messages")
                                    .route("", get().to(handlers::message::admin_list))
                                    .route("{message_id}/read", patch().to(handlers::message::mark_read)),
                            )
                            .route("reply", post().to(handlers::message::admin_reply)),
                    ),
            )
    })
    .bind(bind_addr)?
    .run()
    .await
}

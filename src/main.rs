#[macro_use]
extern crate rocket;

mod config;
mod db;
mod error;
mod guards;
mod models;
mod routes;
mod services;
mod utils;

use dotenvy::dotenv;
use log::info;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::{Build, Request, Response, Rocket};
use rocket_okapi::openapi_get_routes;
use rocket_okapi::swagger_ui::{SwaggerUIConfig, make_swagger_ui};

/* ----------------------------- CORS ----------------------------- */

pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        if let Some(origin) = request.headers().get_one("Origin") {
            response.set_header(Header::new("Access-Control-Allow-Origin", origin));
        }

        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS",
        ));

        response.set_header(Header::new(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization",
        ));

        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

/* ----------------------------- OPTIONS ----------------------------- */

#[options("/<_..>")]
fn options_handler() {}

/* ----------------------------- ERRORS ----------------------------- */

#[catch(404)]
fn not_found() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Resource not found (check /api/v1 prefix)"
    })
}

#[catch(401)]
fn unauthorized() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Missing or invalid access token"
    })
}

#[catch(403)]
fn forbidden() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Administrator access required"
    })
}

#[catch(500)]
fn internal_error() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Internal server error"
    })
}

#[catch(503)]
fn service_unavailable() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Service temporarily unavailable, please retry"
    })
}

/* ----------------------------- SWAGGER ----------------------------- */

fn swagger_config() -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: "/api/v1/openapi.json".to_string(),
        ..Default::default()
    }
}

/* ----------------------------- LAUNCH ----------------------------- */

#[launch]
fn rocket() -> Rocket<Build> {
    dotenv().ok();
    env_logger::init();

    info!("🚀 Library subscription API running");
    info!("📚 Swagger UI → http://localhost:8000/api/docs");

    rocket::build()
        .attach(db::init())
        .attach(services::init())
        .attach(CORS)
        .mount("/", routes![options_handler])
        .mount(
            "/api/v1",
            openapi_get_routes![
                // Auth
                routes::auth::me,
                // Pricing
                routes::pricing::get_pricing,
                routes::pricing::quote,
                // Subscription
                routes::subscription::get_current_subscription,
                routes::subscription::create_subscription,
                routes::subscription::verify_subscription_payment,
                // Admin Routes - Users
                routes::admin::get_all_users,
                routes::admin::delete_user,
                routes::admin::update_subscription,
                // Admin Routes - Reminders
                routes::admin::get_reminders,
                routes::admin::send_reminder,
                routes::admin::send_all_reminders,
                routes::admin::drain_outbox,
            ],
        )
        .mount("/api/docs", make_swagger_ui(&swagger_config()))
        .register("/", catchers![not_found, unauthorized, forbidden, internal_error, service_unavailable])
}

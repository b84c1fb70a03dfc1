use log::warn;
use rocket::request::{self, FromRequest, Request, Outcome};
use rocket::http::Status;

// === OpenAPI (compatible with rocket_okapi 0.8.0 / 0.8.1) ===
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use rocket_okapi::r#gen::OpenApiGenerator;

use crate::models::{Identity, Role};
use crate::services::AppServices;

/// Bearer header first, then the `access_token` cookie set by the accounts service.
fn bearer_token(req: &Request<'_>) -> Option<String> {
    if let Some(header) = req.headers().get_one("Authorization") {
        return Some(header.trim_start_matches("Bearer ").trim().to_string());
    }
    req.cookies()
        .get("access_token")
        .map(|cookie| cookie.value().to_string())
}

/// JWT-based authentication guard
pub struct AuthGuard {
    pub account_id: String,
    pub role: Role,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthGuard {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let Some(token) = bearer_token(req) else {
            return Outcome::Error((Status::Unauthorized, ()));
        };

        match crate::services::JwtService::verify_token(&token) {
            Ok(claims) => Outcome::Success(AuthGuard {
                account_id: claims.sub,
                role: claims.role,
            }),
            Err(_) => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

/// Authenticated administrator. The role is checked against the current
/// identity, not just the token claim, so a demoted admin loses access.
pub struct AdminGuard {
    pub identity: Identity,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminGuard {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let auth = match req.guard::<AuthGuard>().await {
            Outcome::Success(auth) => auth,
            Outcome::Error(e) => return Outcome::Error(e),
            Outcome::Forward(f) => return Outcome::Forward(f),
        };

        if auth.role != Role::Admin {
            return Outcome::Error((Status::Forbidden, ()));
        }

        let Some(services) = req.rocket().state::<AppServices>() else {
            return Outcome::Error((Status::ServiceUnavailable, ()));
        };

        match services.sessions.current(&auth.account_id).await {
            Ok(Some(identity)) if identity.role == Role::Admin => {
                Outcome::Success(AdminGuard { identity })
            }
            Ok(_) => Outcome::Error((Status::Forbidden, ())),
            Err(e) => {
                warn!("Admin check for {} failed: {}", auth.account_id, e);
                Outcome::Error((Status::ServiceUnavailable, ()))
            }
        }
    }
}

/// === OpenAPI Integration (Fallback for older versions) ===
/// Keeps OpenAPI generation working even without new traits.
impl<'a> OpenApiFromRequest<'a> for AuthGuard {
    fn from_request_input(
        _gen: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}

impl<'a> OpenApiFromRequest<'a> for AdminGuard {
    fn from_request_input(
        _gen: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}

//! Actor identity extraction.
//!
//! Authentication is owned by the platform gateway; by the time a request
//! reaches this service the caller is trusted to be who the headers say.
//! The extractor only parses identity, authorization stays in the engine.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;

use crate::domain::actor::{Actor, Role};
use crate::error::CommissionError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

fn header_value<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, CommissionError> {
    let value = headers
        .get(name)
        .ok_or_else(|| CommissionError::validation(format!("missing {name} header")))?;
    value
        .to_str()
        .map_err(|_| CommissionError::validation(format!("{name} header is not valid text")))
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = CommissionError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header_value(&parts.headers, ACTOR_ID_HEADER)?.trim();
        if id.is_empty() {
            return Err(CommissionError::validation(format!(
                "{ACTOR_ID_HEADER} header must not be empty"
            )));
        }
        let role: Role = header_value(&parts.headers, ACTOR_ROLE_HEADER)?
            .parse()
            .map_err(CommissionError::Validation)?;
        Ok(Actor::new(id, role))
    }
}

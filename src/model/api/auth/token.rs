use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use log::debug;
use rocket::{
    http::{Cookie, SameSite, Status},
    outcome::try_outcome,
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{api::ApiId, common::user::User, mongodb::Id, store::Stores};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An authentication token representing a specific, fully logged in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    #[serde(rename = "sub")]
    id: ApiId,
}

impl AuthToken {
    /// Create a new [`AuthToken`] for the given user.
    pub fn new(user: &User) -> Self {
        Self { id: user.id.into() }
    }

    /// The user this token represents.
    pub fn id(&self) -> Id {
        *self.id
    }

    /// Sign this token into a JWT.
    pub fn encode(self, config: &Config) -> Result<String> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };
        Ok(jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?)
    }

    /// Wrap a signed token in the session cookie.
    pub fn cookie(jwt: String, config: &Config) -> Cookie<'static> {
        Cookie::build((AUTH_TOKEN_COOKIE, jwt))
            .path("/")
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .build()
    }

    /// Verify and decode a JWT. Expiry is checked.
    pub fn decode(jwt: &str, config: &Config) -> Result<Self> {
        let token = jsonwebtoken::decode(
            jwt,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims>| claims.claims.token)?;
        Ok(token)
    }
}

/// JWT claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    token: AuthToken,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

/// The raw JWT presented with a request, from the session cookie or else an
/// `Authorization: Bearer` header.
fn presented_jwt(req: &Request<'_>) -> Option<String> {
    if let Some(cookie) = req.cookies().get(AUTH_TOKEN_COOKIE) {
        return Some(cookie.value().to_string());
    }
    req.headers()
        .get_one("Authorization")
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(|jwt| jwt.trim().to_string())
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthToken {
    type Error = Error;

    /// Get an [`AuthToken`] from the request and check its user still exists.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let config = try_outcome!(req
            .guard::<&State<Config>>()
            .await
            .map_error(|(status, _)| (status, Error::Internal("config not managed".to_string()))));
        let stores = try_outcome!(req
            .guard::<&State<Stores>>()
            .await
            .map_error(|(status, _)| (status, Error::Internal("stores not managed".to_string()))));

        let Some(jwt) = presented_jwt(req) else {
            return Outcome::Error((Status::Unauthorized, Error::Unauthenticated));
        };

        let token = match Self::decode(&jwt, config) {
            Ok(token) => token,
            Err(e) => {
                debug!("Rejected auth token: {e}");
                return Outcome::Error((Status::Unauthorized, Error::Unauthenticated));
            }
        };

        // Check the user actually exists.
        match stores.users.by_id(token.id()).await {
            Ok(Some(_)) => Outcome::Success(token),
            Ok(None) => Outcome::Error((Status::Unauthorized, Error::Unauthenticated)),
            Err(e) => Outcome::Error((e.status(), e)),
        }
    }
}

use crate::error::{Error, Result};
use crate::model::{api::auth::AuthToken, common::user::User, store::Stores};

/// Return the user an auth token was issued to.
pub async fn user_by_token(token: &AuthToken, stores: &Stores) -> Result<User> {
    stores
        .users
        .by_id(token.id())
        .await?
        .ok_or(Error::Unauthenticated)
}

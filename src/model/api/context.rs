use std::convert::Infallible;

use rocket::{
    request::{FromRequest, Outcome},
    Request,
};

use crate::logging::RequestId;

/// Who is on the other end of a request, as far as we can tell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: Option<RequestId>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequestContext {
    type Error = Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(Self {
            request_id: Some(*req.local_cache(RequestId::next)),
            ip_address: req.client_ip().map(|ip| ip.to_string()),
            user_agent: req.headers().get_one("User-Agent").map(str::to_string),
        })
    }
}

#[cfg(test)]
impl RequestContext {
    pub fn example() -> Self {
        Self {
            request_id: None,
            ip_address: Some("203.0.113.7".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
        }
    }
}

use rocket::{
    http::{CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::collaborators::Collaborators;
use crate::config::Config;
use crate::error::Result;
use crate::model::{
    api::auth::{
        AuthToken, ForgotPasswordRequest, LoginRequest, LoginResponse, MeResponse,
        MessageResponse, RegisterRequest, ResetPasswordRequest, SessionResponse, VerifyMfaRequest,
        AUTH_TOKEN_COOKIE,
    },
    store::Stores,
};
use crate::service::{Accounts, MfaSessions};

use super::common::user_by_token;

pub fn routes() -> Vec<Route> {
    routes![
        register,
        verify_email,
        login,
        verify_mfa,
        forgot_password,
        reset_password,
        me,
        logout
    ]
}

#[post("/auth/register", data = "<request>", format = "json")]
async fn register(
    request: Json<RegisterRequest>,
    config: &State<Config>,
    stores: &State<Stores>,
    collaborators: &State<Collaborators>,
) -> Result<(Status, Json<MessageResponse>)> {
    request.validate()?;
    Accounts::new(config, stores, collaborators.notifier.as_ref())
        .register(&request)
        .await?;
    Ok((
        Status::Created,
        Json(MessageResponse::new(
            "Registration successful, please check your email to verify your account",
        )),
    ))
}

#[get("/auth/verify/<token>")]
async fn verify_email(
    token: &str,
    config: &State<Config>,
    stores: &State<Stores>,
    collaborators: &State<Collaborators>,
) -> Result<Json<MessageResponse>> {
    Accounts::new(config, stores, collaborators.notifier.as_ref())
        .verify_email(token)
        .await?;
    Ok(Json(MessageResponse::new("Email verified successfully")))
}

#[post("/auth/login", data = "<request>", format = "json")]
async fn login(
    request: Json<LoginRequest>,
    config: &State<Config>,
    stores: &State<Stores>,
    collaborators: &State<Collaborators>,
) -> Result<Json<LoginResponse>> {
    request.validate()?;
    let mfa_token = MfaSessions::new(config, stores, collaborators.notifier.as_ref())
        .login(&request.email, &request.password)
        .await?;
    Ok(Json(LoginResponse { mfa_token }))
}

#[post("/auth/verify-mfa", data = "<request>", format = "json")]
async fn verify_mfa(
    request: Json<VerifyMfaRequest>,
    cookies: &CookieJar<'_>,
    config: &State<Config>,
    stores: &State<Stores>,
    collaborators: &State<Collaborators>,
) -> Result<Json<SessionResponse>> {
    request.validate()?;
    let (_, jwt) = MfaSessions::new(config, stores, collaborators.notifier.as_ref())
        .verify(&request.mfa_token, &request.mfa_code)
        .await?;
    cookies.add(AuthToken::cookie(jwt.clone(), config));
    Ok(Json(SessionResponse { token: jwt }))
}

#[post("/auth/forgot-password", data = "<request>", format = "json")]
async fn forgot_password(
    request: Json<ForgotPasswordRequest>,
    config: &State<Config>,
    stores: &State<Stores>,
    collaborators: &State<Collaborators>,
) -> Result<Json<MessageResponse>> {
    request.validate()?;
    Accounts::new(config, stores, collaborators.notifier.as_ref())
        .forgot_password(&request.email)
        .await?;
    Ok(Json(MessageResponse::new(
        "If that email is registered, a reset link is on its way",
    )))
}

#[put("/auth/reset-password/<token>", data = "<request>", format = "json")]
async fn reset_password(
    token: &str,
    request: Json<ResetPasswordRequest>,
    config: &State<Config>,
    stores: &State<Stores>,
    collaborators: &State<Collaborators>,
) -> Result<Json<MessageResponse>> {
    request.validate()?;
    Accounts::new(config, stores, collaborators.notifier.as_ref())
        .reset_password(token, &request)
        .await?;
    Ok(Json(MessageResponse::new("Password reset successfully")))
}

#[get("/auth/me")]
async fn me(token: AuthToken, stores: &State<Stores>) -> Result<Json<MeResponse>> {
    let user = user_by_token(&token, stores).await?;
    let profile_verified = stores
        .profiles
        .by_user(user.id)
        .await?
        .map_or(false, |profile| profile.is_verified);
    Ok(Json(MeResponse {
        id: user.id.into(),
        email: user.email.clone(),
        is_verified: user.is_verified,
        profile_verified,
    }))
}

#[delete("/auth")]
fn logout(cookies: &CookieJar<'_>) -> Status {
    cookies.remove(AUTH_TOKEN_COOKIE);
    Status::Ok
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Header},
        local::asynchronous::Client,
        serde::json::{json, Value},
    };

    use crate::model::{
        common::user::{examples::*, NewUser},
        memory::MemoryBackend,
        otp::CODE_LENGTH,
        store::UserStore,
    };

    use super::*;

    fn sent_code(backend: &MemoryBackend) -> String {
        let message = backend.outbox.last_to(EXAMPLE_EMAIL).unwrap().message;
        message[message.len() - CODE_LENGTH..].to_string()
    }

    async fn post_json(client: &Client, uri: &str, body: Value) -> (Status, Value) {
        let response = client
            .post(uri.to_string())
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch()
            .await;
        let status = response.status();
        (status, response.into_json().await.unwrap_or(Value::Null))
    }

    #[backend_test]
    async fn login_with_mfa(client: Client, backend: MemoryBackend) {
        backend.users.insert(NewUser::example()).await.unwrap();

        let (status, body) = post_json(
            &client,
            "/api/v1/auth/login",
            json!(LoginRequest::example()),
        )
        .await;
        assert_eq!(Status::Ok, status);
        let mfa_token = body["mfaToken"].as_str().unwrap().to_string();
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_none());

        let request = json!({ "mfaToken": mfa_token, "mfaCode": sent_code(&backend) });
        let (status, body) = post_json(&client, "/api/v1/auth/verify-mfa", request.clone()).await;
        assert_eq!(Status::Ok, status);
        assert!(body["token"].is_string());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());

        // The session is used up.
        let (status, body) = post_json(&client, "/api/v1/auth/verify-mfa", request).await;
        assert_eq!(Status::Unauthorized, status);
        assert_eq!(body["error"], "Invalid or expired token");
    }

    #[backend_test]
    async fn wrong_code_and_expired_session_look_alike(client: Client, backend: MemoryBackend) {
        backend.users.insert(NewUser::example()).await.unwrap();
        let (_, body) = post_json(
            &client,
            "/api/v1/auth/login",
            json!(LoginRequest::example()),
        )
        .await;
        let mfa_token = body["mfaToken"].as_str().unwrap().to_string();
        let code = sent_code(&backend);
        let wrong = if code == "000000" { "111111" } else { "000000" };

        let (wrong_status, wrong_body) = post_json(
            &client,
            "/api/v1/auth/verify-mfa",
            json!({ "mfaToken": mfa_token, "mfaCode": wrong }),
        )
        .await;
        let (missing_status, missing_body) = post_json(
            &client,
            "/api/v1/auth/verify-mfa",
            json!({ "mfaToken": "no-such-session", "mfaCode": code }),
        )
        .await;
        assert_eq!(wrong_status, missing_status);
        assert_eq!(wrong_body, missing_body);
    }

    #[backend_test]
    async fn bad_credentials(client: Client, backend: MemoryBackend) {
        backend.users.insert(NewUser::example()).await.unwrap();

        let (wrong_status, wrong_body) = post_json(
            &client,
            "/api/v1/auth/login",
            json!({ "email": EXAMPLE_EMAIL, "password": "nope" }),
        )
        .await;
        let (unknown_status, unknown_body) = post_json(
            &client,
            "/api/v1/auth/login",
            json!({ "email": "nobody@example.com", "password": EXAMPLE_PASSWORD }),
        )
        .await;
        assert_eq!(Status::Unauthorized, wrong_status);
        assert_eq!(wrong_status, unknown_status);
        assert_eq!(wrong_body, unknown_body);
    }

    #[backend_test]
    async fn unknown_fields_are_refused(client: Client, backend: MemoryBackend) {
        backend.users.insert(NewUser::example()).await.unwrap();
        let (status, body) = post_json(
            &client,
            "/api/v1/auth/login",
            json!({ "email": EXAMPLE_EMAIL, "password": EXAMPLE_PASSWORD, "role": "admin" }),
        )
        .await;
        assert!(status == Status::UnprocessableEntity || status == Status::BadRequest);
        assert_eq!(body["error"], "Invalid request body");
        assert!(backend.outbox.sent().is_empty());
    }

    #[backend_test]
    async fn register_verify_and_login(client: Client, backend: MemoryBackend) {
        let (status, _) = post_json(
            &client,
            "/api/v1/auth/register",
            json!({ "email": "lin@example.com", "password": "secret1" }),
        )
        .await;
        assert_eq!(Status::Created, status);

        // Not verified yet.
        let login = json!({ "email": "lin@example.com", "password": "secret1" });
        let (status, _) = post_json(&client, "/api/v1/auth/login", login.clone()).await;
        assert_eq!(Status::Unauthorized, status);

        let link = backend.outbox.last_to("lin@example.com").unwrap().message;
        let token = link.rsplit('/').next().unwrap();
        let response = client
            .get(format!("/api/v1/auth/verify/{token}"))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let (status, _) = post_json(&client, "/api/v1/auth/login", login).await;
        assert_eq!(Status::Ok, status);
    }

    #[backend_test]
    async fn register_validates(client: Client) {
        let (status, body) = post_json(
            &client,
            "/api/v1/auth/register",
            json!({ "email": "not-an-email", "password": "secret1" }),
        )
        .await;
        assert_eq!(Status::BadRequest, status);
        assert!(body["error"].as_str().unwrap().contains("valid email"));

        let (status, _) = post_json(
            &client,
            "/api/v1/auth/register",
            json!({ "email": "lin@example.com", "password": "short" }),
        )
        .await;
        assert_eq!(Status::BadRequest, status);
    }

    #[backend_test]
    async fn duplicate_registration(client: Client, backend: MemoryBackend) {
        backend.users.insert(NewUser::example()).await.unwrap();
        let (status, _) = post_json(
            &client,
            "/api/v1/auth/register",
            json!({ "email": EXAMPLE_EMAIL, "password": "secret1" }),
        )
        .await;
        assert_eq!(Status::Conflict, status);
    }

    #[backend_test]
    async fn verify_email_with_bad_token(client: Client) {
        let response = client
            .get(format!("/api/v1/auth/verify/{}", "ab".repeat(32)))
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test]
    async fn forgot_and_reset_password(client: Client, backend: MemoryBackend) {
        backend.users.insert(NewUser::example()).await.unwrap();

        for email in [EXAMPLE_EMAIL, "nobody@example.com"] {
            let (status, _) = post_json(
                &client,
                "/api/v1/auth/forgot-password",
                json!({ "email": email }),
            )
            .await;
            assert_eq!(Status::Ok, status);
        }
        assert_eq!(backend.outbox.sent().len(), 1);

        let message = backend.outbox.last_to(EXAMPLE_EMAIL).unwrap().message;
        let token = message.rsplit('/').next().unwrap().trim().to_string();
        let reset = |password: &str, confirm: &str| {
            client
                .put(format!("/api/v1/auth/reset-password/{token}"))
                .header(ContentType::JSON)
                .body(json!({ "password": password, "confirmPassword": confirm }).to_string())
        };

        let response = reset("Brand-New-7", "Brand-New-8").dispatch().await;
        assert_eq!(Status::BadRequest, response.status());
        let response = reset("weakpass", "weakpass").dispatch().await;
        assert_eq!(Status::BadRequest, response.status());
        let response = reset("Brand-New-7", "Brand-New-7").dispatch().await;
        assert_eq!(Status::Ok, response.status());

        let (status, _) = post_json(
            &client,
            "/api/v1/auth/login",
            json!({ "email": EXAMPLE_EMAIL, "password": "Brand-New-7" }),
        )
        .await;
        assert_eq!(Status::Ok, status);
    }

    #[backend_test(voter)]
    async fn me_and_logout(client: Client) {
        let response = client.get("/api/v1/auth/me").dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let me: MeResponse = response.into_json().await.unwrap();
        assert_eq!(me.email, EXAMPLE_EMAIL);
        assert!(me.is_verified);
        assert!(me.profile_verified);

        let response = client.delete("/api/v1/auth").dispatch().await;
        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_none());

        let response = client.get("/api/v1/auth/me").dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test]
    async fn bearer_token_is_accepted(client: Client, backend: MemoryBackend) {
        let user = backend.users.insert(NewUser::example()).await.unwrap();
        let jwt = AuthToken::new(&user).encode(&Config::example()).unwrap();

        let response = client
            .get("/api/v1/auth/me")
            .header(Header::new("Authorization", format!("Bearer {jwt}")))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let response = client
            .get("/api/v1/auth/me")
            .header(Header::new("Authorization", "Bearer forged"))
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }
}

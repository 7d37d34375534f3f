mod request;
mod response;
mod token;

pub use request::{
    ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest, VerifyMfaRequest,
};
pub use response::{LoginResponse, MeResponse, MessageResponse, SessionResponse};
pub use token::{AuthToken, AUTH_TOKEN_COOKIE};

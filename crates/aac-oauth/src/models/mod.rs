//! Request value objects.

pub mod authorization_request;
pub mod token_request;

pub use authorization_request::{
    AuthorizationRequest, EXT_AUDIENCE, EXT_AUTH_TIMESTAMP, EXT_MAX_AGE, EXT_NONCE, EXT_PROMPT,
    EXT_RESPONSE_MODE,
};
pub use token_request::TokenRequest;

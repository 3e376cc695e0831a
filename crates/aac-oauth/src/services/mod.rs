//! Request pipeline services.

pub mod authorization_factory;
pub mod id_token;
pub mod key_service;
pub mod token_factory;
pub mod token_hash;

pub use authorization_factory::AuthorizationRequestFactory;
pub use id_token::IdTokenBuilder;
pub use key_service::KeySigningService;
pub use token_factory::TokenRequestFactory;

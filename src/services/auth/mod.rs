pub mod factory;
pub mod identity;
pub mod jwks;
pub mod token_verifier;
pub mod userinfo;

pub use factory::build_token_verifier;
pub use identity::{AuthenticatedUser, Profile, resolve_display_name};
pub use jwks::{JwksCache, KeySetError, KeySetProvider};
pub use token_verifier::{TokenError, TokenVerifier, VerifierSettings};
pub use userinfo::{HttpUserInfoClient, UserInfoClient, UserInfoError};

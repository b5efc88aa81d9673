pub mod oauth_client;
pub mod totp;

pub use oauth_client::{OAuthClient, INTROSPECT_PATH_CANDIDATES};

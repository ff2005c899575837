//! OAuth/PKCE login and token-refresh credential core for talking to Cursor.
//!
//! Tokens are opaque to this crate: we never verify a signature, only read
//! the unverified `exp` claim to estimate local expiry.

pub mod auth_manager;
pub mod checksum;
pub mod credentials;
pub mod error;
mod jwt;
pub mod oauth;
pub mod pkce;

pub use auth_manager::AuthManager;
pub use checksum::generate_checksum;
pub use credentials::CredentialRecord;
pub use credentials::CredentialStore;
pub use credentials::FileCredentialStore;
pub use credentials::InMemoryCredentialStore;
pub use credentials::default_credential_path;
pub use error::AuthError;
pub use error::Result;
pub use jwt::expiry_ms_from_jwt;
pub use oauth::DEFAULT_API_BASE;
pub use oauth::OAuthTokens;
pub use oauth::RefreshedToken;
pub use pkce::PkceLogin;
pub use pkce::start_pkce_login;

//! Authentication: credential verification and the session token lifecycle.
//!
//! - **Password hashing**: Argon2id with configurable cost
//! - **Credential verification**: constant-shape username/password checks
//! - **Token service**: HS256 access tokens carrying a role/permission
//!   snapshot, plus single-use rotating refresh tokens
//! - **Cleanup**: periodic purge of expired refresh tokens
//!
//! # Usage
//!
//! ```rust,ignore
//! use taskgate_core::auth::{CredentialVerifier, TokenService};
//!
//! let user = verifier.verify("alice", "hunter22").await?;
//! let pair = tokens.issue_tokens(&user).await?;
//! let claims = tokens.validate_access_token(&pair.access_token)?;
//! ```

pub mod claims;
pub mod cleanup;
pub mod credentials;
pub mod password;
pub mod tokens;

pub use claims::AccessClaims;
pub use cleanup::RefreshTokenCleanup;
pub use credentials::CredentialVerifier;
pub use password::PasswordHasher;
pub use tokens::{TokenConfig, TokenPair, TokenService};

//! Authentication building blocks: password hashing, token issuing and
//! verification, and the role guard composed into protected handlers.

pub mod guard;
pub mod password;
pub mod tokens;

pub use guard::{authenticate, require_role, Principal};
pub use tokens::{generate_opaque_token, AccessClaims, TokenService};

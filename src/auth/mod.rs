pub mod authenticate;
pub mod identity;
pub mod password;
pub mod principal;
pub mod roles;
pub mod tokens;

pub use authenticate::authenticate;
pub use identity::{Identity, resolve_identity};
pub use principal::Principal;
pub use roles::Role;
pub use tokens::TokenService;

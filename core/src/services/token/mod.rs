//! Security token issuing.

mod issuer;

pub use issuer::{IssuedToken, TOKEN_BYTES};

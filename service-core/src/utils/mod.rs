pub mod signature;

pub use signature::{sign_hmac_sha256, verify_hmac_sha256};

pub mod password;
pub mod store;

pub use password::{derive_credential, is_derived_credential, verify_credential};
pub use store::{AccountStore, UserMap};

pub mod key_identity;
pub mod open_mode;

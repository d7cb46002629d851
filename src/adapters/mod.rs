pub mod cipher;
pub mod keyrings;
pub mod stream;

pub mod encrypted_file;
pub mod memory_stream;

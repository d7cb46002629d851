pub mod keyring_config;

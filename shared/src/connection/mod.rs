pub mod connection;
pub mod connection_config;
pub mod connection_description;
pub mod connection_type;
pub mod error;
mod socket;
pub mod socket_connection;

pub mod change_type;
pub mod distributable;
pub mod error;
pub mod master_state;
pub mod slave_state;
pub mod version;

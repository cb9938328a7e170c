pub mod object;
pub mod object_cm;
pub mod object_instance;
pub mod push;

pub mod local_node;
pub mod node_config;
pub(crate) mod node_inner;

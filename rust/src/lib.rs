pub mod tool_api;
pub mod transport;

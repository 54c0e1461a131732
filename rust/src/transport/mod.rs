pub mod reliability;
pub mod session;

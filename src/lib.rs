pub mod domain;
pub mod ports;
pub mod infrastructure;
pub mod application;

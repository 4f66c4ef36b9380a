mod run_probe;
mod url_parser;
mod config;

pub use run_probe::ProbeRunner;
pub use url_parser::ParsedUrl;
pub use config::{parse_duration, Config};

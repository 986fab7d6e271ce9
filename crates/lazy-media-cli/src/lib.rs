//! LazyMedia CLI host: HTTP probing, page simulation, and an interactive
//! REPL over the `lazy-media` core.

pub mod config;
pub mod http_probe;
pub mod page;
pub mod repl;

pub use config::resolve_config;
pub use http_probe::HttpProbe;
pub use page::{simulate, PageLayout, PageReport};

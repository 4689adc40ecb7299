pub mod app;
pub mod artifacts;
pub mod config;
pub mod frontmatter;
pub mod markdown;
pub mod ports;
pub mod probe;
pub mod recents;

pub mod plan;
pub mod settings;
pub mod timeline;

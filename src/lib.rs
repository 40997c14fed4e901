pub mod config;
pub mod error;
pub mod events;
pub mod fetch;
pub mod render;
pub mod viewport;
pub mod tasks {
    pub mod loader;
    pub mod scheduler;
    pub mod viewer;
}

// Aula - assistant reply pipeline
// Library exports

pub mod config;
pub mod conversation;
pub mod directive;
pub mod draft;
pub mod errors;
pub mod logging;
pub mod render;
pub mod stream;

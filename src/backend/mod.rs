//! Backend module - Generation service trait and the Gemini client

pub mod gemini;
pub mod traits;

pub use gemini::GeminiBackend;
pub use traits::{GeneratedImage, ImageGenerator};

//! Character Studio
//!
//! Session state and generation orchestration for creating consistent
//! character art: upload or describe a character, pick a pose or write edit
//! instructions, add apparel and backgrounds, and let a generative image
//! service draw the result.

pub mod asset;
pub mod backend;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod session;

pub use error::{AppError, Result};

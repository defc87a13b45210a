pub mod config;
pub mod frames;
pub mod metadata;
pub mod phrase;
pub mod transcribe;
pub mod verify;

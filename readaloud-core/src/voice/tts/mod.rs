//! Cloud speech synthesis

pub mod aws_polly;
pub mod client;
pub mod google_tts;
pub mod provider;
pub mod types;

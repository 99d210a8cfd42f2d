#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// #![warn(clippy::cargo)]

pub mod advisor;
pub mod calibration;
pub mod config;
pub mod dataset;
pub mod error;
pub mod extract;
pub mod gemini;
pub mod linfit;
pub mod sample;

pub use error::Error;

pub type Result<T> = ::std::result::Result<T, Error>;

pub mod client;

pub use client::{ApiError, Backend, BackendClient};

mod artifact;
mod client;
pub mod telegram;
mod transport;

pub use artifact::GeneratedImage;
pub use client::{GenerationClient, GENERATE_ENDPOINT, PRICE_ENDPOINT};
pub use transport::{
    ApiResponse, ApiTransport, ClientError, HttpTransport, DEFAULT_API_BASE,
    DEFAULT_REQUEST_TIMEOUT,
};

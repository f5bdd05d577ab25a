//! Backend gateway: the abstract contract, its HTTP implementation, and
//! strict body decoding.

mod client;
pub mod decode;
mod gateway;

pub use client::{GatewayConfig, HttpGateway, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use gateway::{Gateway, MutationAck};

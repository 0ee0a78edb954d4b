pub mod client;
pub mod identity;

pub use client::{ClientError, RewriteClient, SignedHeaders};
pub use identity::DeviceIdentity;

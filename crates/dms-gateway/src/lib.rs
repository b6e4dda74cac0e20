//! HTTP gateway to the replication control plane.

pub mod client;
pub mod session;
pub mod signing;
pub mod wire;

pub use client::{map_error, DmsClient};
pub use session::{
    CredentialSource, Credentials, EnvSource, ProcessEnv, ProviderCache, Session, SessionOptions,
};

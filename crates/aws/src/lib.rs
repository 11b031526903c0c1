//! AWS control-plane access for CloudPilot.
//!
//! A small SigV4 client covering exactly the operations the tool catalog
//! uses, plus STS role assumption for per-account credential scoping.

pub mod client;
pub mod credentials;
pub mod error;
pub mod shapes;
pub mod sigv4;
pub mod sts;
pub mod xml;

pub use client::AwsClient;
pub use credentials::{ambient_credentials, from_env};
pub use sts::StsRoleAssumer;

pub mod config;
pub mod ids;
pub mod resolve;
pub mod types;

pub use config::ContainerConfig;
pub use ids::{CsarId, IdError, QName};
pub use resolve::{ChainResolver, EndpointResolver, ServiceRef, StaticResolver};
pub use types::*;

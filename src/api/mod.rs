pub mod connector;
pub mod stack;
pub mod status;

pub use connector::{Connector, ConnectorSpec};
pub use stack::{AgentSpec, Features, GatewaySpec, Stack, StackStatus};
pub use status::{ResolvedVersion, VersionSource, VersionStatus};

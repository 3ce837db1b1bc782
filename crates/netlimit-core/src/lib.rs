pub mod config;
pub mod error;
pub mod ids;
pub mod types;

pub use config::{Config, ConfigPaths, FIREWALL_RULE_IN, FIREWALL_RULE_OUT, QOS_POLICY_NAME};
pub use error::NetLimitError;
pub use ids::RunId;
pub use types::{BandwidthSpec, PolicyAction, PolicyRunResult, ProcessTarget};

pub mod error;
pub use error::Result;
pub use error::Error;

pub mod config;
pub use config::PlannerOptions;

pub mod package;
pub use package::PackageInfo;
pub use package::PackageRef;
pub use package::PackageSource;

pub mod oracle;
pub use oracle::RepositoryOracle;

pub mod registry;
pub use registry::Registry;

pub mod metadata;
pub mod relationship_resolver;

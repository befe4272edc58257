//! Configuration repository: records, loading, inheritance and alternates.
pub mod alternates;
pub mod loader;
pub mod resolver;
pub mod schema;

pub use alternates::{AlternateContext, AlternateMatch, AlternateResolver};
pub use loader::Loader;
pub use resolver::Resolver;
pub use schema::{
    Machine, MachineInfo, PackageManifest, Profile, RepoConfig, ResolvedConfig, Scripts,
    Settings, SystemPackages,
};

pub mod settings;
pub mod target;

pub use settings::Settings;
pub use target::{
    AuthMechanism, CollectionInfo, CollectionSpec, Credentials, PrincipalInfo, PrincipalSpec,
    RoleGrant, SeedTarget, TargetError,
};

pub mod data;
pub mod error;
pub mod provisioner;
pub mod report;
pub mod resource;
pub mod resources;
pub mod seed;

#[cfg(test)]
mod tests;

pub use data::{lookup, Lookup};
pub use error::{ErrorKind, ProvisionError, ResourceError};
pub use provisioner::{apply, apply_all, create, delete, read, replace_on_change, replaced_fields, update};
pub use report::{Action, ApplyReport, Change};
pub use resource::{Resource, Response};
pub use seed::{seed, KINDS};

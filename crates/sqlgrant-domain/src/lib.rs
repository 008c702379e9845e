pub mod error;
pub mod ids;
pub mod model;
pub mod types;

pub use error::DomainError;
pub use ids::*;
pub use model::*;
pub use types::*;

pub mod organization_repository;
pub mod project_repository;

pub use organization_repository::OrganizationRepository;
pub use project_repository::{ProjectAuthIdentity, ProjectRepository};

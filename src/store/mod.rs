pub mod link_store;
pub mod workspace_store;

pub use link_store::{LinkStore, PgLinkStore};
pub use workspace_store::{PgWorkspaceStore, WorkspaceStore};

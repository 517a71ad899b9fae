//! Question catalog boundary
//!
//! The catalog is a read-only external collaborator: it enumerates domains and
//! hands out an ordered question list for a domain/level/count.

mod memory;
mod types;

pub use memory::{DomainEntry, InMemoryCatalog};
pub use types::{Difficulty, Domain, ExperienceLevel, Question};

use crate::error::CatalogError;

#[async_trait::async_trait]
pub trait QuestionCatalog: Send + Sync {
    /// Enumerate available domains
    async fn list_domains(&self) -> Result<Vec<Domain>, CatalogError>;

    /// Ordered questions for a session; at most `count` are returned
    async fn get_questions(
        &self,
        domain_id: &str,
        level: ExperienceLevel,
        count: usize,
    ) -> Result<Vec<Question>, CatalogError>;
}

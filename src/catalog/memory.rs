use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use super::types::{Domain, ExperienceLevel, Question};
use super::QuestionCatalog;
use crate::error::CatalogError;

/// One domain with its per-level question lists, as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub questions: BTreeMap<ExperienceLevel, Vec<Question>>,
}

impl DomainEntry {
    fn summary(&self) -> Domain {
        Domain {
            id: self.id.clone(),
            name: self.name.clone(),
            keywords: self.keywords.clone(),
            levels: self.questions.keys().copied().collect(),
        }
    }
}

/// Read-only catalog held in memory
///
/// Questions are handed out in catalog order so a given domain/level/count
/// always yields the same session.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    domains: Vec<DomainEntry>,
}

impl InMemoryCatalog {
    pub fn new(domains: Vec<DomainEntry>) -> Self {
        Self { domains }
    }

    /// Load a catalog from a JSON file containing an array of domain entries
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
        let domains: Vec<DomainEntry> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse catalog file: {}", path.display()))?;

        info!("Loaded catalog with {} domains from {}", domains.len(), path.display());

        Ok(Self { domains })
    }

    fn domain(&self, domain_id: &str) -> Result<&DomainEntry, CatalogError> {
        self.domains
            .iter()
            .find(|d| d.id == domain_id)
            .ok_or_else(|| CatalogError::UnknownDomain(domain_id.to_string()))
    }
}

#[async_trait]
impl QuestionCatalog for InMemoryCatalog {
    async fn list_domains(&self) -> Result<Vec<Domain>, CatalogError> {
        Ok(self.domains.iter().map(DomainEntry::summary).collect())
    }

    async fn get_questions(
        &self,
        domain_id: &str,
        level: ExperienceLevel,
        count: usize,
    ) -> Result<Vec<Question>, CatalogError> {
        let domain = self.domain(domain_id)?;

        let pool = domain
            .questions
            .get(&level)
            .ok_or_else(|| CatalogError::UnsupportedLevel {
                domain: domain_id.to_string(),
                level: level.to_string(),
            })?;

        let questions: Vec<Question> = pool.iter().take(count).cloned().collect();
        if questions.is_empty() {
            return Err(CatalogError::NoQuestions {
                domain: domain_id.to_string(),
                level: level.to_string(),
            });
        }

        debug!(
            "Selected {} of {} questions for {} ({})",
            questions.len(),
            pool.len(),
            domain_id,
            level
        );

        Ok(questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Difficulty;

    fn question(id: &str) -> Question {
        Question {
            id: id.to_string(),
            text: format!("Question {}", id),
            category: "general".to_string(),
            difficulty: Difficulty::Medium,
            keywords: vec!["rust".to_string()],
        }
    }

    fn catalog() -> InMemoryCatalog {
        let mut questions = BTreeMap::new();
        questions.insert(
            ExperienceLevel::Mid,
            vec![question("q1"), question("q2"), question("q3")],
        );
        questions.insert(ExperienceLevel::Senior, Vec::new());

        InMemoryCatalog::new(vec![DomainEntry {
            id: "backend".to_string(),
            name: "Backend Engineering".to_string(),
            keywords: vec!["api".to_string()],
            questions,
        }])
    }

    #[tokio::test]
    async fn test_list_domains_reports_levels() {
        let domains = catalog().list_domains().await.unwrap();
        assert_eq!(domains.len(), 1);
        assert_eq!(domains[0].levels, vec![ExperienceLevel::Mid, ExperienceLevel::Senior]);
    }

    #[tokio::test]
    async fn test_get_questions_truncates_in_order() {
        let questions = catalog()
            .get_questions("backend", ExperienceLevel::Mid, 2)
            .await
            .unwrap();
        let ids: Vec<_> = questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q2"]);
    }

    #[tokio::test]
    async fn test_get_questions_errors() {
        let catalog = catalog();
        assert!(matches!(
            catalog.get_questions("frontend", ExperienceLevel::Mid, 1).await,
            Err(CatalogError::UnknownDomain(_))
        ));
        assert!(matches!(
            catalog.get_questions("backend", ExperienceLevel::Junior, 1).await,
            Err(CatalogError::UnsupportedLevel { .. })
        ));
        assert!(matches!(
            catalog.get_questions("backend", ExperienceLevel::Senior, 1).await,
            Err(CatalogError::NoQuestions { .. })
        ));
    }
}

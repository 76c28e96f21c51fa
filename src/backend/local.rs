use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{DocumentGateway, DocumentSnapshot, Resolution, ResponseResolver};
use crate::error::BackendError;
use crate::state::{Document, DocumentStatus, Source};

const INGEST_DELAY: Duration = Duration::from_secs(2);

const FINANCIAL_KEYWORDS: &[&str] = &["financial", "revenue", "q3"];
const SUPPORT_KEYWORDS: &[&str] = &["support", "contact", "customer"];
const PRODUCT_KEYWORDS: &[&str] = &["product", "feature", "specification"];

const FINANCIAL_ANSWER: &str = "Based on the **Q3 Financial Report**, revenue grew 23% \
quarter over quarter to $4.2M. Most of the growth came from enterprise subscriptions, \
while operating costs stayed flat.";

const SUPPORT_ANSWER: &str = "Customer support is available Monday to Friday, 9am to 6pm. \
You can reach the team at support@example.com or through the in-app help center; \
priority customers also have a dedicated phone line.";

const PRODUCT_ANSWER: &str = "The current product release supports document upload, \
semantic search across indexed files, and cited answers. The **Product Specification** \
lists PDF, DOCX and Markdown as supported formats with a 50MB per-file limit.";

const FALLBACK_ANSWER: &str = "I couldn't find anything in the indexed documents that \
answers that. Try asking about quarterly financials, customer support, or product features.";

/// Offline backend: answers from a fixed keyword table and simulates ingestion.
pub struct LocalBackend {
    documents: Mutex<Vec<Document>>,
    ingest_delay: Duration,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::with_ingest_delay(INGEST_DELAY)
    }

    pub fn with_ingest_delay(ingest_delay: Duration) -> Self {
        Self {
            documents: Mutex::new(seed_documents()),
            ingest_delay,
        }
    }

    #[cfg(test)]
    fn with_documents(documents: Vec<Document>, ingest_delay: Duration) -> Self {
        Self {
            documents: Mutex::new(documents),
            ingest_delay,
        }
    }

    /// Match the query against the keyword groups, financial first, then
    /// support, then product.
    pub fn answer(query: &str) -> Resolution {
        let query = query.to_lowercase();
        let matches = |keywords: &[&str]| keywords.iter().any(|k| query.contains(k));

        if matches(FINANCIAL_KEYWORDS) {
            Resolution {
                content: FINANCIAL_ANSWER.to_string(),
                sources: vec![
                    Source::new("Q3 Financial Report.pdf", "Page 4"),
                    Source::new("Board Meeting Notes - October.docx", "Section 2.1"),
                ],
            }
        } else if matches(SUPPORT_KEYWORDS) {
            Resolution {
                content: SUPPORT_ANSWER.to_string(),
                sources: vec![Source::new("Customer Support Handbook.pdf", "Section 1.2")],
            }
        } else if matches(PRODUCT_KEYWORDS) {
            Resolution {
                content: PRODUCT_ANSWER.to_string(),
                sources: vec![
                    Source::new("Product Specification v2.1.pdf", "Page 12"),
                    Source::new("Feature Overview.md", "Supported formats"),
                ],
            }
        } else {
            Resolution {
                content: FALLBACK_ANSWER.to_string(),
                sources: Vec::new(),
            }
        }
    }

    fn snapshot(&self) -> DocumentSnapshot {
        let documents = self
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let indexed_count = documents.iter().filter(|d| d.status.is_indexed()).count();
        DocumentSnapshot {
            documents,
            indexed_count,
        }
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn seed_documents() -> Vec<Document> {
    [
        ("doc-1", "Q3 Financial Report.pdf"),
        ("doc-2", "Customer Support Handbook.pdf"),
        ("doc-3", "Product Specification v2.1.pdf"),
    ]
    .into_iter()
    .map(|(id, name)| Document {
        id: id.to_string(),
        name: name.to_string(),
        status: DocumentStatus::Indexed,
    })
    .collect()
}

#[async_trait]
impl ResponseResolver for LocalBackend {
    async fn resolve(&self, query: &str) -> Result<Resolution, BackendError> {
        Ok(Self::answer(query))
    }
}

#[async_trait]
impl DocumentGateway for LocalBackend {
    async fn refresh(&self) -> Result<DocumentSnapshot, BackendError> {
        Ok(self.snapshot())
    }

    /// Nothing is read from disk; the delay stands in for indexing time.
    async fn ingest(&self, file: &Path) -> Result<(), BackendError> {
        tracing::debug!(file = %file.display(), "Simulating document ingestion");
        tokio::time::sleep(self.ingest_delay).await;

        let mut documents = self
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for doc in documents.iter_mut() {
            doc.status = DocumentStatus::Indexed;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_q3_revenue_question() {
        let reply = LocalBackend::answer("What was the Q3 revenue?");
        assert!(reply.content.contains("23%"));
        assert!(reply.content.contains("$4.2M"));
        assert_eq!(reply.sources.len(), 2);
        assert!(reply.sources[0].title.contains("Financial Report"));
    }

    #[test]
    fn test_financial_wins_over_support() {
        let both = LocalBackend::answer("Does revenue depend on support?");
        let financial = LocalBackend::answer("revenue");
        assert_eq!(both, financial);
    }

    #[test]
    fn test_support_wins_over_product() {
        let reply = LocalBackend::answer("Who do I contact about a product feature?");
        assert_eq!(reply.content, SUPPORT_ANSWER);
        assert_eq!(reply.sources.len(), 1);
    }

    #[test]
    fn test_product_group() {
        let reply = LocalBackend::answer("Which file types does the SPECIFICATION allow?");
        assert_eq!(reply.content, PRODUCT_ANSWER);
        assert_eq!(reply.sources.len(), 2);
    }

    #[test]
    fn test_fallback_has_no_sources() {
        let reply = LocalBackend::answer("What's the weather like?");
        assert_eq!(reply.content, FALLBACK_ANSWER);
        assert!(reply.sources.is_empty());
    }

    #[test]
    fn test_answer_is_deterministic() {
        for query in ["q3 numbers", "customer hours", "feature list", "anything"] {
            assert_eq!(LocalBackend::answer(query), LocalBackend::answer(query));
        }
    }

    #[tokio::test]
    async fn test_seeded_documents_are_indexed() {
        let backend = LocalBackend::new();
        let snapshot = backend.refresh().await.unwrap();
        assert_eq!(snapshot.documents.len(), 3);
        assert_eq!(snapshot.indexed_count, 3);
        assert!(snapshot.documents.iter().all(|d| d.status.is_indexed()));
    }

    #[tokio::test]
    async fn test_ingest_reads_nothing() {
        let backend = LocalBackend::with_ingest_delay(Duration::ZERO);
        backend
            .ingest(Path::new("/definitely/not/here.pdf"))
            .await
            .unwrap();
        assert_eq!(backend.refresh().await.unwrap().indexed_count, 3);
    }

    #[tokio::test]
    async fn test_ingest_marks_pending_documents_indexed() {
        let mut documents = seed_documents();
        documents.push(Document {
            id: "doc-4".to_string(),
            name: "Draft Roadmap.md".to_string(),
            status: DocumentStatus::Pending,
        });
        let backend = LocalBackend::with_documents(documents, Duration::ZERO);

        let before = backend.refresh().await.unwrap();
        assert_eq!(before.indexed_count, 3);
        assert_eq!(before.documents[3].status, DocumentStatus::Pending);

        backend.ingest(Path::new("Draft Roadmap.md")).await.unwrap();

        let after = backend.refresh().await.unwrap();
        assert_eq!(after.indexed_count, 4);
        assert!(after.documents.iter().all(|d| d.status.is_indexed()));
    }
}

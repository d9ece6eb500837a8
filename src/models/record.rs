//! Stored paper rows and their text chunks.
//!
//! A [`Paper`] is keyed by canonical id and exclusively owns its
//! [`PaperChunk`]s; dropping or replacing the paper drops its chunks with it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CanonicalPaper, SourceType};

/// Width of every chunk embedding vector
pub const EMBEDDING_DIMENSIONS: usize = 384;

/// Longest canonical id a stored paper may carry
pub const PAPER_ID_MAX_LEN: usize = 50;

/// Errors raised when building or updating stored records
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RecordError {
    #[error("paper id '{0}' exceeds {PAPER_ID_MAX_LEN} characters")]
    IdTooLong(String),

    #[error("embedding has {actual} dimensions, expected {EMBEDDING_DIMENSIONS}")]
    EmbeddingDimensions { actual: usize },

    #[error("no chunk at index {0}")]
    MissingChunk(usize),
}

/// Where a paper is in the download/extract/embed pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    Downloading,
    Processing,
    Embedding,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "Pending",
            ProcessingStatus::Downloading => "Downloading PDF",
            ProcessingStatus::Processing => "Processing Text",
            ProcessingStatus::Embedding => "Generating Embeddings",
            ProcessingStatus::Completed => "Completed",
            ProcessingStatus::Failed => "Failed",
        }
    }
}

/// Section of the paper a chunk came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    Abstract,
    Introduction,
    Methods,
    Results,
    Discussion,
    Conclusion,
    References,
    #[default]
    Other,
}

/// A stored paper row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
    pub id: String,
    pub title: String,
    pub r#abstract: String,
    pub authors: Vec<String>,
    pub pmid: Option<String>,
    pub source: SourceType,

    pub pdf_file: Option<String>,
    pub pdf_url: Option<String>,
    pub pdf_downloaded: bool,

    pub processed: bool,
    pub processing_status: ProcessingStatus,
    pub processing_error: Option<String>,

    pub publication_year: Option<i32>,
    pub journal: Option<String>,
    pub doi: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    chunks: Vec<PaperChunk>,
}

impl Paper {
    /// Build a pending row from a canonical record
    pub fn from_canonical(paper: &CanonicalPaper) -> Result<Self, RecordError> {
        if paper.id.chars().count() > PAPER_ID_MAX_LEN {
            return Err(RecordError::IdTooLong(paper.id.clone()));
        }

        let now = Utc::now();
        Ok(Self {
            id: paper.id.clone(),
            title: paper.title.clone(),
            r#abstract: paper.r#abstract.clone(),
            authors: paper.authors.clone(),
            pmid: paper.pmid.clone(),
            source: paper.source,
            pdf_file: None,
            pdf_url: paper.pdf_url.clone(),
            pdf_downloaded: false,
            processed: false,
            processing_status: ProcessingStatus::Pending,
            processing_error: None,
            publication_year: paper.publication_year(),
            journal: paper.journal.clone().or_else(|| paper.venue.clone()),
            doi: paper.doi.clone(),
            created_at: now,
            updated_at: now,
            chunks: Vec::new(),
        })
    }

    /// Move to a new pipeline state; `Completed` marks the paper processed
    pub fn set_status(&mut self, status: ProcessingStatus) {
        self.processing_status = status;
        self.processed = status == ProcessingStatus::Completed;
        if status != ProcessingStatus::Failed {
            self.processing_error = None;
        }
        self.touch();
    }

    /// Record a pipeline failure
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.set_status(ProcessingStatus::Failed);
        self.processing_error = Some(error.into());
    }

    /// Record a completed PDF download
    pub fn mark_downloaded(&mut self, pdf_file: impl Into<String>) {
        self.pdf_file = Some(pdf_file.into());
        self.pdf_downloaded = true;
        self.touch();
    }

    /// Append a chunk; its index is its position in the paper
    pub fn add_chunk(
        &mut self,
        content: impl Into<String>,
        section_type: SectionType,
        page_number: Option<u32>,
    ) -> &PaperChunk {
        let chunk = PaperChunk::new(self.chunks.len(), content.into(), section_type, page_number);
        self.chunks.push(chunk);
        self.touch();
        &self.chunks[self.chunks.len() - 1]
    }

    /// Attach an embedding to the chunk at `index`
    pub fn set_chunk_embedding(
        &mut self,
        index: usize,
        embedding: Vec<f32>,
        model: impl Into<String>,
    ) -> Result<(), RecordError> {
        let chunk = self
            .chunks
            .get_mut(index)
            .ok_or(RecordError::MissingChunk(index))?;
        chunk.set_embedding(embedding, model)?;
        self.touch();
        Ok(())
    }

    /// Chunks in index order
    pub fn chunks(&self) -> &[PaperChunk] {
        &self.chunks
    }

    /// Drop every chunk, e.g. before re-processing
    pub fn clear_chunks(&mut self) {
        self.chunks.clear();
        self.touch();
    }

    /// Chunks that still need an embedding
    pub fn pending_embeddings(&self) -> impl Iterator<Item = &PaperChunk> {
        self.chunks.iter().filter(|c| c.embedding.is_none())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// An ordered text fragment of a stored paper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperChunk {
    pub id: Uuid,
    pub content: String,
    pub chunk_index: usize,
    pub page_number: Option<u32>,
    pub section_type: SectionType,
    pub word_count: usize,
    pub char_count: usize,
    pub embedding: Option<Vec<f32>>,
    pub embedding_model: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PaperChunk {
    fn new(
        chunk_index: usize,
        content: String,
        section_type: SectionType,
        page_number: Option<u32>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            word_count: content.split_whitespace().count(),
            char_count: content.chars().count(),
            content,
            chunk_index,
            page_number,
            section_type,
            embedding: None,
            embedding_model: None,
            created_at: Utc::now(),
        }
    }

    fn set_embedding(&mut self, embedding: Vec<f32>, model: impl Into<String>) -> Result<(), RecordError> {
        if embedding.len() != EMBEDDING_DIMENSIONS {
            return Err(RecordError::EmbeddingDimensions {
                actual: embedding.len(),
            });
        }
        self.embedding = Some(embedding);
        self.embedding_model = Some(model.into());
        Ok(())
    }
}

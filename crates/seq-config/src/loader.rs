//! Document files
//!
//! Sequences and reusable templates are stored as YAML (`.yaml`, `.yml`) or
//! JSON (`.json`); the extension picks the format in both directions.

use seq_model::{NodeId, SequenceTree};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::builder::{subtree_to_document, tree_to_document};
use crate::document::EntityDocument;
use crate::error::{DocumentError, DocumentResult};
use crate::registry::Registry;

/// On-disk encoding of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    /// Format implied by a file extension
    pub fn from_path(path: &Path) -> DocumentResult<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("yaml") | Some("yml") => Ok(DocumentFormat::Yaml),
            Some("json") => Ok(DocumentFormat::Json),
            _ => Err(DocumentError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    pub fn parse(self, content: &str) -> DocumentResult<EntityDocument> {
        Ok(match self {
            DocumentFormat::Yaml => serde_yaml::from_str(content)?,
            DocumentFormat::Json => serde_json::from_str(content)?,
        })
    }

    pub fn render(self, doc: &EntityDocument) -> DocumentResult<String> {
        Ok(match self {
            DocumentFormat::Yaml => serde_yaml::to_string(doc)?,
            DocumentFormat::Json => serde_json::to_string_pretty(doc)?,
        })
    }
}

/// Read a document file
pub fn load_document(path: impl AsRef<Path>) -> DocumentResult<EntityDocument> {
    let path = path.as_ref();
    let format = DocumentFormat::from_path(path)?;
    debug!("Loading sequence document: {:?}", path);

    let content = fs::read_to_string(path).map_err(|e| DocumentError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    format.parse(&content)
}

/// Write a document file, replacing any existing one
pub fn save_document(path: impl AsRef<Path>, doc: &EntityDocument) -> DocumentResult<()> {
    let path = path.as_ref();
    let content = DocumentFormat::from_path(path)?.render(doc)?;

    fs::write(path, content).map_err(|e| DocumentError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    debug!("Saved sequence document: {:?}", path);
    Ok(())
}

impl Registry {
    /// Load a sequence (or template) file into a tree
    pub fn load(&self, path: impl AsRef<Path>) -> DocumentResult<SequenceTree> {
        let path = path.as_ref();
        let tree = self.build_tree(&load_document(path)?)?;
        info!(path = %path.display(), nodes = tree.len(), "Loaded sequence");
        Ok(tree)
    }
}

/// Save a whole sequence
pub fn save_tree(path: impl AsRef<Path>, tree: &SequenceTree) -> DocumentResult<()> {
    save_document(path, &tree_to_document(tree)?)
}

/// Save the subtree at `id` as a reusable template
pub fn save_template(path: impl AsRef<Path>, tree: &SequenceTree, id: NodeId) -> DocumentResult<()> {
    save_document(path, &subtree_to_document(tree, id)?)
}

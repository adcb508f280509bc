//! Immutable corpus of resolved tickets: one embedding plus display metadata per record.
//!
//! Loaded once from a snapshot file and never mutated afterwards. Rebuilding the
//! snapshot happens offline; this module only reads it.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

/// Display metadata of a ticket (issue text, description, date, counts, ...),
/// in snapshot field order.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A historical ticket: identifier, embedding and metadata. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketRecord {
    id: String,
    embedding: Vec<f32>,
    metadata: Metadata,
}

impl TicketRecord {
    pub fn new(id: impl Into<String>, embedding: Vec<f32>, metadata: Metadata) -> Self {
        Self {
            id: id.into(),
            embedding,
            metadata,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

/// How a snapshot is laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    /// A single JSON array of record objects.
    JsonArray,
    /// One record object per line (blank lines skipped).
    JsonLines,
}

impl SnapshotFormat {
    /// `.jsonl` / `.ndjson` are JSON Lines; everything else is a JSON array.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("jsonl") | Some("ndjson") => SnapshotFormat::JsonLines,
            _ => SnapshotFormat::JsonArray,
        }
    }
}

/// Record as it appears in the snapshot. Every field other than `id` and the
/// embedding is kept as metadata.
#[derive(Deserialize)]
struct SnapshotRecord {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default, alias = "embeddings")]
    embedding: Option<Vec<f32>>,
    #[serde(flatten)]
    metadata: Metadata,
}

/// The loaded corpus. All embeddings share one dimension.
#[derive(Debug, Default)]
pub struct Corpus {
    records: Vec<TicketRecord>,
    dimension: Option<usize>,
}

impl Corpus {
    /// Load a snapshot file. The format is chosen from the file extension.
    pub fn load(path: &Path) -> Result<Self, CorpusError> {
        if !path.exists() {
            return Err(CorpusError::Missing(path.to_path_buf()));
        }
        let file = std::fs::File::open(path).map_err(|e| CorpusError::Read(path.to_path_buf(), e))?;
        let corpus = Self::from_reader(BufReader::new(file), SnapshotFormat::from_path(path))
            .map_err(|e| e.with_path(path))?;
        info!(
            path = %path.display(),
            records = corpus.len(),
            dimension = ?corpus.dimension,
            "loaded ticket corpus"
        );
        Ok(corpus)
    }

    /// Parse a snapshot from any reader.
    pub fn from_reader<R: Read>(reader: R, format: SnapshotFormat) -> Result<Self, CorpusError> {
        let raw: Vec<SnapshotRecord> = match format {
            SnapshotFormat::JsonArray => serde_json::from_reader(reader)
                .map_err(|source| CorpusError::Parse { line: None, source })?,
            SnapshotFormat::JsonLines => {
                let mut out = Vec::new();
                for (i, line) in BufReader::new(reader).lines().enumerate() {
                    let line = line.map_err(|e| CorpusError::Read(PathBuf::new(), e))?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    let rec = serde_json::from_str(&line).map_err(|source| CorpusError::Parse {
                        line: Some(i + 1),
                        source,
                    })?;
                    out.push(rec);
                }
                out
            }
        };

        let mut records = Vec::with_capacity(raw.len());
        for (position, rec) in raw.into_iter().enumerate() {
            let embedding = rec
                .embedding
                .ok_or(CorpusError::MissingEmbedding { position })?;
            let id = match rec.id {
                Some(serde_json::Value::String(s)) => s,
                Some(serde_json::Value::Null) | None => position.to_string(),
                Some(other) => other.to_string(),
            };
            records.push(TicketRecord::new(id, embedding, rec.metadata));
        }
        Self::from_records(records)
    }

    /// Build a corpus from records already in memory. Same validation as [Corpus::load].
    pub fn from_records(records: Vec<TicketRecord>) -> Result<Self, CorpusError> {
        let mut dimension = None;
        for (position, r) in records.iter().enumerate() {
            let actual = r.embedding.len();
            if actual == 0 {
                return Err(CorpusError::EmptyEmbedding { position });
            }
            // Out-of-range JSON numbers such as 1e39 become inf when read as f32.
            if r.embedding.iter().any(|x| !x.is_finite()) {
                return Err(CorpusError::NonFiniteEmbedding { position });
            }
            match dimension {
                None => dimension = Some(actual),
                Some(expected) if expected != actual => {
                    return Err(CorpusError::DimensionMismatch {
                        position,
                        expected,
                        actual,
                    });
                }
                Some(_) => {}
            }
        }
        if records.is_empty() {
            warn!("ticket corpus is empty; every query will return no matches");
        }
        Ok(Self { records, dimension })
    }

    /// Number of records.
    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in snapshot order.
    pub fn records(&self) -> &[TicketRecord] {
        &self.records
    }

    pub fn get(&self, position: usize) -> Option<&TicketRecord> {
        self.records.get(position)
    }

    /// Embedding dimension shared by every record; `None` when the corpus is empty.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("corpus snapshot not found: {0}")]
    Missing(PathBuf),
    #[error("failed to read corpus snapshot {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("malformed corpus snapshot{}: {source}", .line.map(|l| format!(" at line {l}")).unwrap_or_default())]
    Parse {
        line: Option<usize>,
        source: serde_json::Error,
    },
    #[error("record {position} has no embedding field")]
    MissingEmbedding { position: usize },
    #[error("record {position} has an empty embedding")]
    EmptyEmbedding { position: usize },
    #[error("record {position} has a non-finite embedding component")]
    NonFiniteEmbedding { position: usize },
    #[error("record {position} has embedding dimension {actual}, expected {expected}")]
    DimensionMismatch {
        position: usize,
        expected: usize,
        actual: usize,
    },
}

impl CorpusError {
    fn with_path(self, path: &Path) -> Self {
        match self {
            CorpusError::Read(p, e) if p.as_os_str().is_empty() => CorpusError::Read(path.to_path_buf(), e),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn parse(json: &str) -> Result<Corpus, CorpusError> {
        Corpus::from_reader(json.as_bytes(), SnapshotFormat::JsonArray)
    }

    #[test]
    fn loads_records_in_order_with_metadata() {
        let c = parse(
            r#"[
                {"id": "T-1", "embedding": [1.0, 0.0], "Issue": "VPN timeout", "Date": "2023-04-01"},
                {"embeddings": [0.0, 1.0], "Issue": "Printer jam", "description_length": 42}
            ]"#,
        )
        .unwrap();
        assert_eq!(c.size(), 2);
        assert_eq!(c.dimension(), Some(2));
        assert_eq!(c.records()[0].id(), "T-1");
        assert_eq!(c.records()[1].id(), "1");
        assert_eq!(c.records()[1].embedding(), &[0.0, 1.0]);
        assert_eq!(c.records()[0].metadata()["Date"], "2023-04-01");
        assert!(!c.records()[0].metadata().contains_key("embedding"));
        assert_eq!(c.records()[1].metadata()["description_length"], 42);
        let keys: Vec<_> = c.records()[0].metadata().keys().map(String::as_str).collect();
        assert_eq!(keys, ["Issue", "Date"]);
    }

    #[test]
    fn numeric_id_is_rendered_as_text() {
        let c = parse(r#"[{"id": 17, "embedding": [1.0]}]"#).unwrap();
        assert_eq!(c.get(0).unwrap().id(), "17");
    }

    #[test]
    fn missing_embedding_is_rejected() {
        let err = parse(r#"[{"embedding": [1.0]}, {"Issue": "no vector"}]"#).unwrap_err();
        assert!(matches!(err, CorpusError::MissingEmbedding { position: 1 }));
    }

    #[test]
    fn inconsistent_dimension_is_rejected_at_load() {
        let err = parse(r#"[{"embedding": [1.0, 0.0]}, {"embedding": [1.0, 0.0, 0.0]}]"#).unwrap_err();
        assert!(matches!(
            err,
            CorpusError::DimensionMismatch {
                position: 1,
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn empty_embedding_is_rejected() {
        let err = parse(r#"[{"embedding": []}]"#).unwrap_err();
        assert!(matches!(err, CorpusError::EmptyEmbedding { position: 0 }));
    }

    #[test]
    fn out_of_range_component_is_rejected() {
        let err = parse(r#"[{"embedding": [0.5, 0.5]}, {"embedding": [1e39, 0.0]}]"#).unwrap_err();
        assert!(matches!(err, CorpusError::NonFiniteEmbedding { position: 1 }));
    }

    #[test]
    fn nan_component_is_rejected_in_memory() {
        let records = vec![TicketRecord::new("a", vec![f32::NAN, 1.0], Metadata::new())];
        assert!(matches!(
            Corpus::from_records(records),
            Err(CorpusError::NonFiniteEmbedding { position: 0 })
        ));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = parse(r#"[{"embedding": [1.0, "x"]}]"#).unwrap_err();
        assert!(matches!(err, CorpusError::Parse { line: None, .. }));
    }

    #[test]
    fn json_lines_reports_failing_line() {
        let data = "{\"embedding\": [1.0]}\n\n{\"embedding\": oops}\n";
        let err = Corpus::from_reader(data.as_bytes(), SnapshotFormat::JsonLines).unwrap_err();
        assert!(matches!(err, CorpusError::Parse { line: Some(3), .. }));
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn empty_snapshot_has_no_dimension() {
        let c = parse("[]").unwrap();
        assert!(c.is_empty());
        assert_eq!(c.dimension(), None);
    }

    #[test]
    fn load_missing_file() {
        let err = Corpus::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, CorpusError::Missing(_)));
    }

    #[test]
    fn load_jsonl_file_by_extension() {
        let mut f = tempfile::Builder::new().suffix(".jsonl").tempfile().unwrap();
        writeln!(f, "{{\"id\": \"a\", \"embedding\": [0.5, 0.5]}}").unwrap();
        writeln!(f, "{{\"id\": \"b\", \"embedding\": [0.1, 0.9]}}").unwrap();
        let c = Corpus::load(f.path()).unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(c.records()[1].id(), "b");
    }

    #[test]
    fn from_records_validates_dimension() {
        let records = vec![
            TicketRecord::new("a", vec![1.0, 2.0], Metadata::new()),
            TicketRecord::new("b", vec![1.0], Metadata::new()),
        ];
        assert!(Corpus::from_records(records).is_err());
    }
}

//! All backend logic independent of how matching is driven (CLI or a service).
//!
//! A corpus of resolved tickets is loaded once ([corpus]), a new ticket is embedded
//! ([embedder]) and ranked against it by cosine similarity ([ranker]). Config lives in
//! the app data directory (see [app_data]).

pub mod app_data;
pub mod config;
pub mod corpus;
pub mod embedder;
pub mod matcher;
pub mod ranker;
pub mod report;

pub use app_data::app_data_dir;
pub use config::{load_config, save_config, set_snapshot_path, Config, ConfigError};
pub use corpus::{Corpus, CorpusError, Metadata, SnapshotFormat, TicketRecord};
pub use embedder::{Embedder, EmbeddingError, OllamaEmbedder};
pub use matcher::{ticket_text, MatchError, TicketMatcher};
pub use ranker::{rank, rank_with, Cosine, LinearScan, RankError, RankedMatch, RankedResult, Retriever, Scorer, UNDEFINED_SCORE};

/// Returns a short status string. Used to verify the backend is wired up.
pub fn status() -> &'static str {
    "ticketmatch-core ready"
}

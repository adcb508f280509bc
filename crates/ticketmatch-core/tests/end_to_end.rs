use std::io::Write;
use std::sync::Arc;
use std::thread;

use async_trait::async_trait;
use ticketmatch_core::report::{render_table, DEFAULT_HIDDEN_FIELDS};
use ticketmatch_core::{rank, Corpus, CorpusError, Embedder, EmbeddingError, TicketMatcher};

/// Toy embedder: one axis per topic keyword, so results are predictable.
struct KeywordEmbedder;

const TOPICS: [&str; 4] = ["vpn", "email", "password", "screen"];

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let text = text.to_lowercase();
        Ok(TOPICS
            .iter()
            .map(|t| text.matches(t).count() as f32)
            .collect())
    }
}

const SNAPSHOT: &str = r#"[
  {"id": "T-100", "Issue": "VPN drops", "Description": "VPN disconnects every hour", "Date": "2023-01-05", "description_length": 26, "embeddings": [1.0, 0.0, 0.0, 0.0]},
  {"id": "T-101", "Issue": "Mail stuck", "Description": "Email not syncing on phone", "Date": "2023-02-11", "description_length": 26, "embeddings": [0.0, 1.0, 0.0, 0.0]},
  {"id": "T-102", "Issue": "Reset needed", "Description": "Forgot password", "Date": "2023-03-20", "description_length": 15, "embeddings": [0.0, 0.0, 1.0, 0.1]},
  {"id": "T-103", "Issue": "VPN and mail", "Description": "VPN slow, email fails", "Date": "2023-04-02", "description_length": 21, "embeddings": [0.8, 0.6, 0.0, 0.0]},
  {"id": "T-104", "Issue": "Blank record", "Description": "Imported without text", "Date": "2023-05-09", "description_length": 21, "embeddings": [0.0, 0.0, 0.0, 0.0]}
]"#;

fn snapshot_file() -> tempfile::NamedTempFile {
    let mut f = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    f.write_all(SNAPSHOT.as_bytes()).unwrap();
    f
}

#[tokio::test]
async fn match_new_ticket_against_snapshot() {
    let file = snapshot_file();
    let corpus = Arc::new(Corpus::load(file.path()).unwrap());
    assert_eq!(corpus.size(), 5);
    assert_eq!(corpus.dimension(), Some(4));

    let matcher = TicketMatcher::new(Arc::clone(&corpus), KeywordEmbedder);
    let matches = matcher
        .find_similar("VPN connection timeout", "VPN connection times out frequently during use", 2)
        .await
        .unwrap();
    let ids: Vec<_> = matches.iter().map(|m| m.id).collect();
    assert_eq!(ids, ["T-100", "T-103"]);
    assert!((matches[0].score - 1.0).abs() < 1e-6);

    let hidden: Vec<String> = DEFAULT_HIDDEN_FIELDS.iter().map(|s| s.to_string()).collect();
    let table = render_table(&matches, &hidden);
    assert!(table.contains("2023-01-05"));
    assert!(!table.contains("description_length"));
}

#[tokio::test]
async fn blank_record_never_outranks_a_real_match() {
    let file = snapshot_file();
    let corpus = Arc::new(Corpus::load(file.path()).unwrap());
    let matcher = TicketMatcher::new(corpus, KeywordEmbedder);
    let matches = matcher
        .find_similar("Lost password for multiple accounts", "needs password resets", 10)
        .await
        .unwrap();
    assert_eq!(matches.len(), 5);
    assert_eq!(matches[0].id, "T-102");
    assert_eq!(matches.last().unwrap().id, "T-104");
}

#[test]
fn corrupt_snapshot_fails_before_serving() {
    let mut f = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    f.write_all(br#"[{"embedding": [1.0, 0.0]}, {"embedding": [1.0]}]"#).unwrap();
    let err = Corpus::load(f.path()).unwrap_err();
    assert!(matches!(err, CorpusError::DimensionMismatch { position: 1, .. }));
}

#[test]
fn concurrent_ranking_shares_one_corpus() {
    let file = snapshot_file();
    let corpus = Arc::new(Corpus::load(file.path()).unwrap());
    let query = [0.6_f32, 0.8, 0.0, 0.0];
    let expected: Vec<(String, u32)> = rank(&corpus, &query, 5)
        .unwrap()
        .iter()
        .map(|m| (m.id.to_string(), m.score.to_bits()))
        .collect();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let corpus = Arc::clone(&corpus);
            thread::spawn(move || {
                rank(&corpus, &query, 5)
                    .unwrap()
                    .iter()
                    .map(|m| (m.id.to_string(), m.score.to_bits()))
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), expected);
    }
}

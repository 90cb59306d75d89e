use super::*;
use crate::config::GeminiConfig;

fn test_client() -> GeminiClient {
    GeminiClient::new(&GeminiConfig::default(), "test-key".to_string())
        .expect("Failed to create client")
}

fn hit(position: usize, score: f32) -> SearchHit {
    SearchHit { position, score }
}

#[test]
fn decide_consults_only_rank_one() {
    // Rank 2 clears the threshold but only rank 1 is consulted.
    let hits = vec![hit(3, 0.30), hit(1, 0.90)];
    assert_eq!(decide(&hits, 0.50), None);
}

#[test]
fn decide_threshold_is_inclusive() {
    let threshold = 0.50;
    assert_eq!(decide(&[hit(0, 0.50)], threshold), Some(hit(0, 0.50)));
    assert_eq!(decide(&[hit(0, 0.50 - 1e-4)], threshold), None);
    assert_eq!(decide(&[hit(0, 0.50 + 1e-4)], threshold), Some(hit(0, 0.50 + 1e-4)));
}

#[test]
fn decide_on_empty_hits_is_no_match() {
    assert_eq!(decide(&[], 0.50), None);
}

#[test]
fn engine_rejects_misaligned_index() {
    let index = FlatIndex::build(vec![vec![1.0, 0.0], vec![0.0, 1.0]]).expect("Failed to build");
    let kb = KnowledgeBase::new(vec![KnowledgeEntry {
        short_description: "only one".to_string(),
        fix_text: "fix".to_string(),
    }]);

    let result = RetrievalEngine::new(test_client(), index, kb, &RetrievalConfig::default());
    assert!(matches!(result, Err(KbError::Config(_))));
}

#[test]
fn engine_reports_dimension_and_len() {
    let index = FlatIndex::build(vec![vec![1.0, 0.0, 0.0]]).expect("Failed to build");
    let kb = KnowledgeBase::new(vec![KnowledgeEntry {
        short_description: "VPN won't connect".to_string(),
        fix_text: "Restart VPN client and re-enter credentials.".to_string(),
    }]);

    let engine = RetrievalEngine::new(test_client(), index, kb, &RetrievalConfig::default())
        .expect("Failed to create engine");
    assert_eq!(engine.dimension(), 3);
    assert_eq!(engine.len(), 1);
    assert!(!engine.is_empty());
}

#[test]
fn query_result_serializes_absent_match_as_null() {
    let result = QueryResult {
        normalized_title: "Printer Offline Error".to_string(),
        confidence_score: 0.12,
        matched_entry: None,
        fix_text: FALLBACK_FIX.to_string(),
    };

    let json = serde_json::to_string(&result).expect("Failed to serialize");
    assert!(json.contains("\"matched_entry\":null"));
    assert!(json.contains("IT Help Desk"));
}

use super::*;
use crate::embeddings::HashingEmbedder;
use crate::knowledge_base::KnowledgeBase;
use parking_lot::Mutex;

#[derive(Default)]
struct RecordingSearch {
    calls: Mutex<Vec<(String, usize)>>,
}

impl ExternalSearch for RecordingSearch {
    fn search(&self, query: &str, num_results: usize) -> Vec<String> {
        self.calls.lock().push((query.to_string(), num_results));
        vec!["SAP Note 1999997: https://me.sap.com/notes/1999997".to_string()]
    }
}

fn assistant_with(fallback: Arc<RecordingSearch>) -> SupportAssistant {
    let engine = Arc::new(RetrievalEngine::new(Arc::new(
        HashingEmbedder::new(384).expect("valid dimension"),
    )));
    let kb = KnowledgeBase::from_records([("Title A", "Desc A"), ("Title B", "Desc B")]);
    engine.build_index(kb.passages()).expect("index builds");

    SupportAssistant::new(engine, fallback, &Config::default())
}

#[test]
fn confident_match_stays_internal() {
    let fallback = Arc::new(RecordingSearch::default());
    let assistant = assistant_with(Arc::clone(&fallback));

    let answer = assistant.answer("Title A Desc A").expect("answers");

    let Answer::Internal(hits) = answer else {
        panic!("expected internal answer, got {answer:?}");
    };
    assert_eq!(hits[0].text, "Title A. Desc A");
    assert!(fallback.calls.lock().is_empty());
}

#[test]
fn no_match_routes_to_fallback() {
    let fallback = Arc::new(RecordingSearch::default());
    let assistant = assistant_with(Arc::clone(&fallback));

    let answer = assistant
        .answer("  quantum pineapple  ")
        .expect("answers");

    assert_eq!(
        answer,
        Answer::External(vec![
            "SAP Note 1999997: https://me.sap.com/notes/1999997".to_string()
        ])
    );
    assert_eq!(
        *fallback.calls.lock(),
        vec![("quantum pineapple".to_string(), 3)]
    );
}

#[test]
fn per_call_threshold_changes_routing() {
    let fallback = Arc::new(RecordingSearch::default());
    let assistant = assistant_with(Arc::clone(&fallback));

    let strict = assistant
        .answer_with("Title B", 2, 0.2)
        .expect("answers");
    let loose = assistant
        .answer_with("Title B", 2, 0.5)
        .expect("answers");

    assert!(!strict.is_internal());
    assert!(loose.is_internal());
}

#[test]
fn blank_query_is_invalid() {
    let assistant = assistant_with(Arc::new(RecordingSearch::default()));
    assert!(matches!(
        assistant.answer("   "),
        Err(AssistError::InvalidQuery(_))
    ));
}

#[test]
fn unbuilt_engine_is_reported() {
    let engine = Arc::new(RetrievalEngine::new(Arc::new(
        HashingEmbedder::new(16).expect("valid dimension"),
    )));
    let assistant = SupportAssistant::new(
        engine,
        Arc::new(RecordingSearch::default()),
        &Config::default(),
    );

    assert!(matches!(
        assistant.answer("anything"),
        Err(AssistError::EngineNotReady)
    ));
}

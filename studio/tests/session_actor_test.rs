//! DraftSessionActor integration tests.
//!
//! The generator and the store are scripted mocks, so every test controls
//! exactly which calls succeed. Generator output is opaque by contract:
//! assertions are structural (counts, order, which slots changed), never
//! about exact generated text beyond the sentinel values the mocks return.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ractor::Actor;
use tokio::time::sleep;
use uuid::Uuid;

use studio::actors::session::{
    DraftSessionActor, DraftSessionArguments, DraftSessionMsg, SessionError,
};
use studio::editor::Action;
use studio::generation::{GenerationError, QuestionGenerator};
use studio::store::{StoreError, SurveyRepository};
use survey_types::{
    GenerateRequest, Question, QuestionKind, Section, SurveyRecord, SurveyStatus,
};

// ============================================================================
// Test Doubles
// ============================================================================

/// Generator that pops one scripted outcome per call and records requests.
struct ScriptedGenerator {
    outcomes: Mutex<VecDeque<Result<Vec<Question>, GenerationError>>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedGenerator {
    fn new(outcomes: Vec<Result<Vec<Question>, GenerationError>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl QuestionGenerator for ScriptedGenerator {
    async fn generate(&self, request: GenerateRequest) -> Result<Vec<Question>, GenerationError> {
        self.requests.lock().unwrap().push(request);
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(vec![q("fallback")]))
    }
}

/// In-memory store that records every save and can slow them down to force
/// a mid-flight overlap.
#[derive(Default)]
struct RecordingStore {
    records: Mutex<HashMap<Uuid, SurveyRecord>>,
    save_count: Mutex<usize>,
    save_delay: Option<Duration>,
}

impl RecordingStore {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            save_delay: Some(delay),
            ..Self::default()
        })
    }

    fn records(&self) -> Vec<SurveyRecord> {
        self.records.lock().unwrap().values().cloned().collect()
    }

    fn saves(&self) -> usize {
        *self.save_count.lock().unwrap()
    }

    async fn simulate_latency(&self) {
        if let Some(delay) = self.save_delay {
            sleep(delay).await;
        }
    }
}

#[async_trait]
impl SurveyRepository for RecordingStore {
    async fn create(&self, record: &SurveyRecord) -> Result<(), StoreError> {
        self.simulate_latency().await;
        *self.save_count.lock().unwrap() += 1;
        self.records
            .lock()
            .unwrap()
            .insert(record.id, record.clone());
        Ok(())
    }

    async fn save_draft(
        &self,
        id: Uuid,
        sections: &[Section],
        language: &str,
    ) -> Result<(), StoreError> {
        self.simulate_latency().await;
        *self.save_count.lock().unwrap() += 1;
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.sections = sections.to_vec();
        record.language = language.to_string();
        record.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn publish(&self, id: Uuid, title: &str) -> Result<SurveyRecord, StoreError> {
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.status = SurveyStatus::Published;
        record.is_active = true;
        record.title = title.to_string();
        record.updated_at = chrono::Utc::now();
        Ok(record.clone())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<SurveyRecord>, StoreError> {
        Ok(self.records.lock().unwrap().get(&id).cloned())
    }

    async fn fetch_by_share_token(&self, token: &str) -> Result<Option<SurveyRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .find(|record| record.share_token == token)
            .cloned())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<SurveyRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn titles_for_user(
        &self,
        user_id: &str,
        exclude: Option<Uuid>,
    ) -> Result<Vec<String>, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|record| record.user_id == user_id && Some(record.id) != exclude)
            .map(|record| record.title.clone())
            .collect())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn q(text: &str) -> Question {
    Question::new(text, QuestionKind::ShortAnswer)
}

fn seeded_record(user_id: &str, title: &str) -> SurveyRecord {
    let now = chrono::Utc::now();
    SurveyRecord {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        title: title.to_string(),
        description: String::new(),
        sections: vec![Section::new("Existing", vec![q("kept")])],
        language: "en".to_string(),
        status: SurveyStatus::Draft,
        is_active: false,
        share_token: ulid::Ulid::new().to_string(),
        expires_at: None,
        expired_message: None,
        visible_in_community: false,
        responses_public: false,
        created_at: now,
        updated_at: now,
    }
}

async fn spawn_session(
    generator: Arc<ScriptedGenerator>,
    store: Arc<RecordingStore>,
    debounce: Duration,
) -> ractor::ActorRef<DraftSessionMsg> {
    let args = DraftSessionArguments {
        session_id: ulid::Ulid::new().to_string(),
        user_id: "user-1".to_string(),
        title: "Survey".to_string(),
        description: "about things".to_string(),
        language: "en".to_string(),
        record: None,
        generator,
        store,
        autosave_debounce: debounce,
    };
    let (actor, _handle) = Actor::spawn(None, DraftSessionActor, args)
        .await
        .expect("Failed to spawn session actor");
    actor
}

async fn dispatch(actor: &ractor::ActorRef<DraftSessionMsg>, action: Action) {
    ractor::call!(actor, |reply| DraftSessionMsg::Dispatch {
        action: action.clone(),
        reply
    })
    .expect("dispatch failed");
}

/// Section with `n` questions plus an anchored batch selection over
/// questions 1..=selected.
async fn build_batch_fixture(
    actor: &ractor::ActorRef<DraftSessionMsg>,
    total: usize,
    selected: usize,
) {
    let questions: Vec<Question> = (0..total).map(|i| q(&format!("q{i}"))).collect();
    dispatch(
        actor,
        Action::AddSection {
            name: "Main".to_string(),
            questions,
        },
    )
    .await;
    dispatch(
        actor,
        Action::OpenFeedback {
            section: 0,
            question: 0,
        },
    )
    .await;
    dispatch(actor, Action::BeginBatchSelection).await;
    for question in 1..=selected {
        dispatch(
            actor,
            Action::ToggleSelection {
                section: 0,
                question,
            },
        )
        .await;
    }
}

// ============================================================================
// Generation Orchestration
// ============================================================================

#[tokio::test]
async fn generate_section_adds_on_success() {
    let generator = ScriptedGenerator::new(vec![Ok(vec![q("gen-1"), q("gen-2")])]);
    let store = RecordingStore::new();
    let actor = spawn_session(generator, store, Duration::from_secs(60)).await;

    let view = ractor::call!(actor, |reply| DraftSessionMsg::GenerateSection {
        name: "Habits".to_string(),
        description: "daily habits".to_string(),
        question_count: Some(2),
        reply
    })
    .expect("rpc failed")
    .expect("generation should succeed");

    assert_eq!(view.sections.len(), 1);
    assert_eq!(view.sections[0].name, "Habits");
    assert_eq!(view.sections[0].questions.len(), 2);
    assert!(view.sections[0]
        .questions
        .iter()
        .all(|question| question.section_name == "Habits"));
    assert!(view.can_undo);
}

#[tokio::test]
async fn generation_failure_leaves_draft_unchanged() {
    let generator = ScriptedGenerator::new(vec![Err(GenerationError::Upstream(
        "model overloaded".to_string(),
    ))]);
    let store = RecordingStore::new();
    let actor = spawn_session(generator, store, Duration::from_secs(60)).await;

    let result = ractor::call!(actor, |reply| DraftSessionMsg::GenerateSection {
        name: "Habits".to_string(),
        description: "daily habits".to_string(),
        question_count: None,
        reply
    })
    .expect("rpc failed");

    assert!(matches!(result, Err(SessionError::Generation(_))));
    let view = ractor::call!(actor, |reply| DraftSessionMsg::GetView { reply }).unwrap();
    assert!(view.sections.is_empty());
    assert!(!view.can_undo);
}

#[tokio::test]
async fn generate_more_appends_into_existing_section() {
    let generator = ScriptedGenerator::new(vec![Ok(vec![q("extra")])]);
    let store = RecordingStore::new();
    let actor = spawn_session(generator, store, Duration::from_secs(60)).await;
    dispatch(
        &actor,
        Action::AddSection {
            name: "Main".to_string(),
            questions: vec![q("first")],
        },
    )
    .await;

    let view = ractor::call!(actor, |reply| DraftSessionMsg::GenerateMore {
        section: 0,
        description: "same topic, more depth".to_string(),
        question_count: None,
        reply
    })
    .expect("rpc failed")
    .expect("generation should succeed");
    assert_eq!(view.sections[0].questions.len(), 2);

    let missing = ractor::call!(actor, |reply| DraftSessionMsg::GenerateMore {
        section: 9,
        description: "nowhere to go".to_string(),
        question_count: None,
        reply
    })
    .expect("rpc failed");
    assert!(matches!(missing, Err(SessionError::UnknownSection(9))));
}

#[tokio::test]
async fn refine_one_replaces_in_place_and_keeps_feedback() {
    let mut refined = q("refined wording");
    refined.required = true;
    let generator = ScriptedGenerator::new(vec![Ok(vec![refined])]);
    let store = RecordingStore::new();
    let actor = spawn_session(generator, store, Duration::from_secs(60)).await;
    dispatch(
        &actor,
        Action::AddSection {
            name: "Main".to_string(),
            questions: vec![q("original"), q("neighbor")],
        },
    )
    .await;
    dispatch(
        &actor,
        Action::ApplyFeedback {
            section: 0,
            question: 0,
            feedback: "shorter".to_string(),
        },
    )
    .await;

    let view = ractor::call!(actor, |reply| DraftSessionMsg::RefineOne {
        section: 0,
        question: 0,
        feedback: "shorter".to_string(),
        reply
    })
    .expect("rpc failed")
    .expect("refinement should succeed");

    let target = &view.sections[0].questions[0];
    assert_eq!(target.text, "refined wording");
    assert_eq!(target.feedback.as_deref(), Some("shorter"));
    assert_eq!(view.sections[0].questions[1].text, "neighbor");
}

// ============================================================================
// Batch Refinement
// ============================================================================

#[tokio::test]
async fn batch_refine_skips_failures_and_reports_counts() {
    // Five selected questions; request #3 fails.
    let generator = ScriptedGenerator::new(vec![
        Ok(vec![q("refined-1")]),
        Ok(vec![q("refined-2")]),
        Err(GenerationError::Request("connection reset".to_string())),
        Ok(vec![q("refined-4")]),
        Ok(vec![q("refined-5")]),
    ]);
    let store = RecordingStore::new();
    let actor = spawn_session(generator.clone(), store, Duration::from_secs(60)).await;
    build_batch_fixture(&actor, 6, 5).await;

    let report = ractor::call!(actor, |reply| DraftSessionMsg::RefineBatch {
        feedback: "use plain language".to_string(),
        reply
    })
    .expect("rpc failed")
    .expect("batch should always complete");

    assert_eq!(report.succeeded, 4);
    assert_eq!(report.attempted, 5);
    assert_eq!(report.to_string(), "4 of 5 succeeded");
    // Requests went out one at a time, in selection order.
    assert_eq!(generator.request_count(), 5);

    let view = ractor::call!(actor, |reply| DraftSessionMsg::GetView { reply }).unwrap();
    let texts: Vec<&str> = view.sections[0]
        .questions
        .iter()
        .map(|question| question.text.as_str())
        .collect();
    // Slot 3 failed and kept its original text; the rest were replaced in
    // selection order.
    assert_eq!(
        texts,
        vec!["q0", "refined-1", "refined-2", "q3", "refined-4", "refined-5"]
    );
    // The selection is cleared once the batch completes.
    assert!(view.selected.is_empty());
}

#[tokio::test]
async fn batch_refine_with_empty_selection_is_rejected() {
    let generator = ScriptedGenerator::new(vec![]);
    let store = RecordingStore::new();
    let actor = spawn_session(generator, store, Duration::from_secs(60)).await;
    dispatch(
        &actor,
        Action::AddSection {
            name: "Main".to_string(),
            questions: vec![q("only")],
        },
    )
    .await;

    let result = ractor::call!(actor, |reply| DraftSessionMsg::RefineBatch {
        feedback: "anything".to_string(),
        reply
    })
    .expect("rpc failed");
    assert!(matches!(result, Err(SessionError::EmptySelection)));
}

// ============================================================================
// Autosave
// ============================================================================

#[tokio::test]
async fn autosave_creates_then_updates_with_stable_share_token() {
    let generator = ScriptedGenerator::new(vec![]);
    let store = RecordingStore::new();
    let actor = spawn_session(generator, store.clone(), Duration::from_millis(40)).await;

    dispatch(
        &actor,
        Action::AddSection {
            name: "Main".to_string(),
            questions: vec![q("first")],
        },
    )
    .await;
    sleep(Duration::from_millis(300)).await;

    let records = store.records();
    assert_eq!(records.len(), 1);
    let first = &records[0];
    assert_eq!(first.status, SurveyStatus::Draft);
    assert!(!first.is_active);
    assert!(!first.share_token.is_empty());
    let token = first.share_token.clone();

    let view = ractor::call!(actor, |reply| DraftSessionMsg::GetView { reply }).unwrap();
    assert_eq!(view.draft_id, Some(first.id));

    dispatch(
        &actor,
        Action::AddQuestions {
            section: 0,
            questions: vec![q("second")],
        },
    )
    .await;
    sleep(Duration::from_millis(300)).await;

    let records = store.records();
    assert_eq!(records.len(), 1, "update must not create a second record");
    assert_eq!(records[0].sections[0].questions.len(), 2);
    assert_eq!(records[0].share_token, token);
}

#[tokio::test]
async fn empty_draft_never_autosaves() {
    let generator = ScriptedGenerator::new(vec![]);
    let store = RecordingStore::new();
    let actor = spawn_session(generator, store.clone(), Duration::from_millis(30)).await;

    // A language change marks the document dirty, but with zero sections
    // nothing may be persisted.
    dispatch(
        &actor,
        Action::SetLanguage {
            language: "pt-BR".to_string(),
        },
    )
    .await;
    sleep(Duration::from_millis(200)).await;
    assert!(store.records().is_empty());
}

#[tokio::test]
async fn rapid_edits_debounce_into_one_save() {
    let generator = ScriptedGenerator::new(vec![]);
    let store = RecordingStore::new();
    let actor = spawn_session(generator, store.clone(), Duration::from_millis(120)).await;

    dispatch(
        &actor,
        Action::AddSection {
            name: "Main".to_string(),
            questions: vec![q("one")],
        },
    )
    .await;
    for i in 0..4 {
        sleep(Duration::from_millis(20)).await;
        dispatch(
            &actor,
            Action::AddQuestions {
                section: 0,
                questions: vec![q(&format!("more-{i}"))],
            },
        )
        .await;
    }
    sleep(Duration::from_millis(400)).await;

    // Every edit restarted the window, so only the final state was saved.
    assert_eq!(store.saves(), 1);
    let records = store.records();
    assert_eq!(records[0].sections[0].questions.len(), 5);
}

#[tokio::test]
async fn change_during_inflight_save_queues_a_followup() {
    let generator = ScriptedGenerator::new(vec![]);
    let store = RecordingStore::slow(Duration::from_millis(200));
    let actor = spawn_session(generator, store.clone(), Duration::from_millis(30)).await;

    dispatch(
        &actor,
        Action::AddSection {
            name: "Main".to_string(),
            questions: vec![q("first")],
        },
    )
    .await;
    // Let the debounce fire and the slow create start.
    sleep(Duration::from_millis(80)).await;
    dispatch(
        &actor,
        Action::AddQuestions {
            section: 0,
            questions: vec![q("written mid-flight")],
        },
    )
    .await;

    sleep(Duration::from_millis(800)).await;
    // The mid-flight change was queued, not dropped: the follow-up save
    // carries the newest document.
    assert!(store.saves() >= 2);
    let records = store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].sections[0].questions.len(), 2);
}

// ============================================================================
// Publish
// ============================================================================

#[tokio::test]
async fn publish_dedupes_title_against_existing_surveys() {
    let generator = ScriptedGenerator::new(vec![]);
    let store = RecordingStore::new();
    for title in ["Survey", "Survey (1)", "Survey (3)"] {
        store
            .create(&seeded_record("user-1", title))
            .await
            .expect("seed failed");
    }
    let actor = spawn_session(generator, store.clone(), Duration::from_secs(60)).await;
    dispatch(
        &actor,
        Action::AddSection {
            name: "Main".to_string(),
            questions: vec![q("only")],
        },
    )
    .await;

    let record = ractor::call!(actor, |reply| DraftSessionMsg::Publish {
        title: None,
        reply
    })
    .expect("rpc failed")
    .expect("publish should succeed");

    assert_eq!(record.title, "Survey (4)");
    assert_eq!(record.status, SurveyStatus::Published);
    assert!(record.is_active);
    assert!(!record.share_token.is_empty());
}

#[tokio::test]
async fn publish_is_idempotent() {
    let generator = ScriptedGenerator::new(vec![]);
    let store = RecordingStore::new();
    let actor = spawn_session(generator, store.clone(), Duration::from_secs(60)).await;
    dispatch(
        &actor,
        Action::AddSection {
            name: "Main".to_string(),
            questions: vec![q("only")],
        },
    )
    .await;

    let first = ractor::call!(actor, |reply| DraftSessionMsg::Publish {
        title: None,
        reply
    })
    .unwrap()
    .expect("publish should succeed");
    let second = ractor::call!(actor, |reply| DraftSessionMsg::Publish {
        title: Some("Renamed Mid-Publish".to_string()),
        reply
    })
    .unwrap()
    .expect("second publish should return the record");

    assert_eq!(first.id, second.id);
    assert_eq!(first.share_token, second.share_token);
    // Exactly-once: the second confirm does not rename.
    assert_eq!(second.title, first.title);
    assert_eq!(store.records().len(), 1);
}

#[tokio::test]
async fn publish_of_empty_draft_is_rejected() {
    let generator = ScriptedGenerator::new(vec![]);
    let store = RecordingStore::new();
    let actor = spawn_session(generator, store, Duration::from_secs(60)).await;

    let result = ractor::call!(actor, |reply| DraftSessionMsg::Publish {
        title: None,
        reply
    })
    .expect("rpc failed");
    assert!(matches!(result, Err(SessionError::EmptyDraft)));
}

// ============================================================================
// Seeded Sessions
// ============================================================================

#[tokio::test]
async fn session_seeded_from_record_starts_at_its_history_floor() {
    let generator = ScriptedGenerator::new(vec![]);
    let store = RecordingStore::new();
    let record = seeded_record("user-1", "Reopened");
    store.create(&record).await.expect("seed failed");

    let args = DraftSessionArguments {
        session_id: ulid::Ulid::new().to_string(),
        user_id: "user-1".to_string(),
        title: String::new(),
        description: String::new(),
        language: "en".to_string(),
        record: Some(record.clone()),
        generator,
        store,
        autosave_debounce: Duration::from_secs(60),
    };
    let (actor, _handle) = Actor::spawn(None, DraftSessionActor, args)
        .await
        .expect("Failed to spawn session actor");

    let view = ractor::call!(actor, |reply| DraftSessionMsg::GetView { reply }).unwrap();
    assert_eq!(view.draft_id, Some(record.id));
    assert_eq!(view.title, "Reopened");
    assert_eq!(view.sections.len(), 1);
    // The seed is the floor: nothing to undo yet.
    assert!(!view.can_undo);
}

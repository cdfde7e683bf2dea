//! DraftSessionActor - one actor per open draft.
//!
//! Every mutation of the draft — user actions, generation results, autosave
//! ticks, save completions — is a message processed to completion by this
//! actor, so no two transitions ever interleave. Generation requests are
//! awaited inside the handler: sequential by design, which keeps batch
//! refinement order deterministic and stays friendly to the rate-limited
//! generation endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use serde::Serialize;
use survey_types::{
    Draft, GenerateRequest, Section, SurveyRecord, SurveyStatus,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::editor::{Action, EditorState};
use crate::generation::{GenerationError, QuestionGenerator};
use crate::store::{dedupe_title, StoreError, SurveyRepository};

pub struct DraftSessionActor;

#[derive(Clone)]
pub struct DraftSessionArguments {
    pub session_id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub language: String,
    /// Present when re-opening an existing survey; its sections seed the
    /// editor and become the history floor.
    pub record: Option<SurveyRecord>,
    pub generator: Arc<dyn QuestionGenerator>,
    pub store: Arc<dyn SurveyRepository>,
    pub autosave_debounce: Duration,
}

pub struct DraftSessionState {
    session_id: String,
    user_id: String,
    title: String,
    description: String,
    editor: EditorState,
    status: SurveyStatus,
    share_token: Option<String>,
    generator: Arc<dyn QuestionGenerator>,
    store: Arc<dyn SurveyRepository>,
    autosave_debounce: Duration,
    /// Bumped on every document change; a tick carrying an older epoch is
    /// stale and dropped, which is the whole debounce.
    debounce_epoch: u64,
    is_saving: bool,
    /// A change arrived mid-flight: run one follow-up save when the current
    /// one finishes. Queued, not dropped.
    save_queued: bool,
    /// A publish that arrived while the first persist was still in flight;
    /// completed from `SaveFinished` so the draft never gets two records.
    pending_publish: Option<(Option<String>, RpcReplyPort<Result<SurveyRecord, SessionError>>)>,
}

/// What a save task reports back into the mailbox.
#[derive(Debug)]
pub struct SavedDraft {
    pub id: Uuid,
    /// Set when the save created the record (first persist).
    pub share_token: Option<String>,
    /// Set when the create path had to de-duplicate the title.
    pub title: Option<String>,
}

/// Aggregate result of a batch refinement pass.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub succeeded: usize,
    pub attempted: usize,
}

impl std::fmt::Display for BatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} of {} succeeded", self.succeeded, self.attempted)
    }
}

/// Serializable snapshot of the session for API responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftView {
    pub draft_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub language: String,
    pub status: SurveyStatus,
    pub sections: Vec<Section>,
    pub can_undo: bool,
    pub can_redo: bool,
    pub selected: Vec<(usize, usize)>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no section at index {0}")]
    UnknownSection(usize),
    #[error("no question at section {section}, question {question}")]
    UnknownQuestion { section: usize, question: usize },
    #[error("no questions selected for batch refinement")]
    EmptySelection,
    #[error("draft has no sections to publish")]
    EmptyDraft,
}

#[derive(Debug)]
pub enum DraftSessionMsg {
    /// Apply one reducer action and return the updated view.
    Dispatch {
        action: Action,
        reply: RpcReplyPort<DraftView>,
    },
    GetView {
        reply: RpcReplyPort<DraftView>,
    },
    /// Generate a whole new section from a topic description. The section is
    /// only added on success; a failed call leaves the draft untouched.
    GenerateSection {
        name: String,
        description: String,
        question_count: Option<u32>,
        reply: RpcReplyPort<Result<DraftView, SessionError>>,
    },
    /// Generate additional questions into an existing section.
    GenerateMore {
        section: usize,
        description: String,
        question_count: Option<u32>,
        reply: RpcReplyPort<Result<DraftView, SessionError>>,
    },
    /// Refine a single question against free-text feedback, replacing it in
    /// place. The stored feedback annotation survives.
    RefineOne {
        section: usize,
        question: usize,
        feedback: String,
        reply: RpcReplyPort<Result<DraftView, SessionError>>,
    },
    /// Refine every selected question with the same feedback, one request at
    /// a time in selection order. Unit failures are skipped, never aborting
    /// the rest.
    RefineBatch {
        feedback: String,
        reply: RpcReplyPort<Result<BatchReport, SessionError>>,
    },
    /// Exactly-once transition to published. Calling again returns the
    /// existing record unchanged.
    Publish {
        title: Option<String>,
        reply: RpcReplyPort<Result<SurveyRecord, SessionError>>,
    },
    AutosaveTick {
        epoch: u64,
    },
    SaveFinished {
        outcome: Result<SavedDraft, StoreError>,
    },
}

#[async_trait]
impl Actor for DraftSessionActor {
    type Msg = DraftSessionMsg;
    type State = DraftSessionState;
    type Arguments = DraftSessionArguments;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let (editor, title, description, status, share_token) = match args.record {
            Some(record) => {
                let draft = Draft {
                    sections: record.sections,
                    language: record.language,
                    draft_id: Some(record.id),
                };
                (
                    EditorState::seeded(draft),
                    record.title,
                    record.description,
                    record.status,
                    Some(record.share_token),
                )
            }
            None => (
                EditorState::new(args.language),
                args.title,
                args.description,
                SurveyStatus::Draft,
                None,
            ),
        };

        info!(
            session_id = %args.session_id,
            user_id = %args.user_id,
            seeded = editor.draft.draft_id.is_some(),
            "draft session started"
        );

        Ok(DraftSessionState {
            session_id: args.session_id,
            user_id: args.user_id,
            title,
            description,
            editor,
            status,
            share_token,
            generator: args.generator,
            store: args.store,
            autosave_debounce: args.autosave_debounce,
            debounce_epoch: 0,
            is_saving: false,
            save_queued: false,
            pending_publish: None,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            DraftSessionMsg::Dispatch { action, reply } => {
                let changed = state.editor.apply(action);
                if changed {
                    Self::restart_debounce(&myself, state);
                }
                let _ = reply.send(Self::view(state));
            }
            DraftSessionMsg::GetView { reply } => {
                let _ = reply.send(Self::view(state));
            }
            DraftSessionMsg::GenerateSection {
                name,
                description,
                question_count,
                reply,
            } => {
                let result = Self::generate_section(state, name, description, question_count).await;
                if result.is_ok() {
                    Self::restart_debounce(&myself, state);
                }
                let _ = reply.send(result.map(|()| Self::view(state)));
            }
            DraftSessionMsg::GenerateMore {
                section,
                description,
                question_count,
                reply,
            } => {
                let result =
                    Self::generate_more(state, section, description, question_count).await;
                if result.is_ok() {
                    Self::restart_debounce(&myself, state);
                }
                let _ = reply.send(result.map(|()| Self::view(state)));
            }
            DraftSessionMsg::RefineOne {
                section,
                question,
                feedback,
                reply,
            } => {
                let result = Self::refine_one(state, section, question, &feedback).await;
                if result.is_ok() {
                    Self::restart_debounce(&myself, state);
                }
                let _ = reply.send(result.map(|()| Self::view(state)));
            }
            DraftSessionMsg::RefineBatch { feedback, reply } => {
                let result = Self::refine_batch(state, &feedback).await;
                if matches!(&result, Ok(report) if report.succeeded > 0) {
                    Self::restart_debounce(&myself, state);
                }
                let _ = reply.send(result);
            }
            DraftSessionMsg::Publish { title, reply } => {
                // Publish persists the latest document itself, so any pending
                // autosave tick is stale from here on.
                state.debounce_epoch += 1;
                if state.is_saving && state.editor.draft.draft_id.is_none() {
                    // The first persist is in flight; finishing now would
                    // race it into a second record. Complete from
                    // SaveFinished instead.
                    state.pending_publish = Some((title, reply));
                } else {
                    let result = Self::publish(state, title).await;
                    let _ = reply.send(result);
                }
            }
            DraftSessionMsg::AutosaveTick { epoch } => {
                if epoch != state.debounce_epoch {
                    // A newer change restarted the window; this tick is stale.
                    return Ok(());
                }
                if state.editor.draft.is_empty() {
                    return Ok(());
                }
                if state.is_saving {
                    state.save_queued = true;
                    return Ok(());
                }
                Self::begin_save(&myself, state);
            }
            DraftSessionMsg::SaveFinished { outcome } => {
                state.is_saving = false;
                match outcome {
                    Ok(saved) => {
                        state.editor.draft.draft_id = Some(saved.id);
                        if let Some(token) = saved.share_token {
                            state.share_token = Some(token);
                        }
                        if let Some(title) = saved.title {
                            state.title = title;
                        }
                        debug!(session_id = %state.session_id, survey_id = %saved.id, "autosave completed");
                    }
                    // Autosave is best-effort: log and keep editing.
                    Err(e) => warn!(session_id = %state.session_id, error = %e, "autosave failed"),
                }
                if let Some((title, reply)) = state.pending_publish.take() {
                    // Publish writes the latest document, superseding any
                    // queued follow-up save.
                    state.save_queued = false;
                    let result = Self::publish(state, title).await;
                    let _ = reply.send(result);
                } else if state.save_queued {
                    state.save_queued = false;
                    Self::begin_save(&myself, state);
                }
            }
        }
        Ok(())
    }
}

impl DraftSessionActor {
    fn view(state: &DraftSessionState) -> DraftView {
        DraftView {
            draft_id: state.editor.draft.draft_id,
            title: state.title.clone(),
            description: state.description.clone(),
            language: state.editor.draft.language.clone(),
            status: state.status,
            sections: state.editor.draft.sections.clone(),
            can_undo: state.editor.history.can_undo(),
            can_redo: state.editor.history.can_redo(),
            selected: state.editor.selection.iter().copied().collect(),
        }
    }

    /// Restart the autosave window: bump the epoch and schedule a tick
    /// carrying it. Older ticks become stale on arrival, so the last change
    /// before a quiet window is the one that saves.
    fn restart_debounce(myself: &ActorRef<DraftSessionMsg>, state: &mut DraftSessionState) {
        state.debounce_epoch += 1;
        let epoch = state.debounce_epoch;
        let delay = state.autosave_debounce;
        let tick_ref = myself.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tick_ref.cast(DraftSessionMsg::AutosaveTick { epoch });
        });
    }

    /// Run the persist in a background task so saving never blocks editing.
    /// Completion re-enters the mailbox as `SaveFinished`.
    fn begin_save(myself: &ActorRef<DraftSessionMsg>, state: &mut DraftSessionState) {
        state.is_saving = true;
        let store = state.store.clone();
        let sections = state.editor.draft.sections.clone();
        let language = state.editor.draft.language.clone();
        let existing = state.editor.draft.draft_id;
        let user_id = state.user_id.clone();
        let title = state.title.clone();
        let description = state.description.clone();
        let tick_ref = myself.clone();
        tokio::spawn(async move {
            let outcome = match existing {
                Some(id) => store
                    .save_draft(id, &sections, &language)
                    .await
                    .map(|()| SavedDraft {
                        id,
                        share_token: None,
                        title: None,
                    }),
                None => {
                    Self::create_record(
                        store.as_ref(),
                        &user_id,
                        &title,
                        &description,
                        sections,
                        &language,
                        SurveyStatus::Draft,
                    )
                    .await
                }
            };
            let _ = tick_ref.cast(DraftSessionMsg::SaveFinished { outcome });
        });
    }

    /// First persist of a draft: de-duplicate the title against the user's
    /// other surveys and insert the record with a fresh share token.
    async fn create_record(
        store: &dyn SurveyRepository,
        user_id: &str,
        title: &str,
        description: &str,
        sections: Vec<Section>,
        language: &str,
        status: SurveyStatus,
    ) -> Result<SavedDraft, StoreError> {
        let taken = store.titles_for_user(user_id, None).await?;
        let unique_title = dedupe_title(title, &taken);
        let now = Utc::now();
        let record = SurveyRecord {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            title: unique_title.clone(),
            description: description.to_string(),
            sections,
            language: language.to_string(),
            status,
            is_active: status == SurveyStatus::Published,
            share_token: ulid::Ulid::new().to_string(),
            expires_at: None,
            expired_message: None,
            visible_in_community: false,
            responses_public: false,
            created_at: now,
            updated_at: now,
        };
        store.create(&record).await?;
        Ok(SavedDraft {
            id: record.id,
            share_token: Some(record.share_token),
            title: Some(unique_title),
        })
    }

    async fn generate_section(
        state: &mut DraftSessionState,
        name: String,
        description: String,
        question_count: Option<u32>,
    ) -> Result<(), SessionError> {
        let request = GenerateRequest::for_topic(
            &description,
            &state.editor.draft.language,
            question_count,
        );
        let questions = state.generator.generate(request).await?;
        state.editor.apply(Action::AddSection { name, questions });
        Ok(())
    }

    async fn generate_more(
        state: &mut DraftSessionState,
        section: usize,
        description: String,
        question_count: Option<u32>,
    ) -> Result<(), SessionError> {
        if section >= state.editor.draft.sections.len() {
            return Err(SessionError::UnknownSection(section));
        }
        let request = GenerateRequest::for_topic(
            &description,
            &state.editor.draft.language,
            question_count,
        );
        let questions = state.generator.generate(request).await?;
        state.editor.apply(Action::AddQuestions { section, questions });
        Ok(())
    }

    async fn refine_one(
        state: &mut DraftSessionState,
        section: usize,
        question: usize,
        feedback: &str,
    ) -> Result<(), SessionError> {
        let current = state
            .editor
            .draft
            .question(section, question)
            .cloned()
            .ok_or(SessionError::UnknownQuestion { section, question })?;
        let request =
            GenerateRequest::for_refinement(&current, feedback, &state.editor.draft.language);
        let questions = state.generator.generate(request).await?;
        let replacement = questions
            .into_iter()
            .next()
            .ok_or(GenerationError::Empty)?;
        state.editor.apply(Action::ReplaceQuestion {
            section,
            question,
            replacement,
        });
        Ok(())
    }

    async fn refine_batch(
        state: &mut DraftSessionState,
        feedback: &str,
    ) -> Result<BatchReport, SessionError> {
        // BTreeSet iteration gives sorted index order, so results apply in a
        // reproducible sequence.
        let selection: Vec<(usize, usize)> = state.editor.selection.iter().copied().collect();
        if selection.is_empty() {
            return Err(SessionError::EmptySelection);
        }

        let attempted = selection.len();
        let mut succeeded = 0;
        for (section, question) in selection {
            // Re-resolve against current state each round; replacements keep
            // indices stable, but a stale pair is skipped, not misapplied.
            let Some(current) = state.editor.draft.question(section, question).cloned() else {
                warn!(section, question, "selected question vanished before refinement; skipped");
                continue;
            };
            let request =
                GenerateRequest::for_refinement(&current, feedback, &state.editor.draft.language);
            match state.generator.generate(request).await {
                Ok(questions) => match questions.into_iter().next() {
                    Some(replacement) => {
                        state.editor.apply(Action::ReplaceQuestion {
                            section,
                            question,
                            replacement,
                        });
                        succeeded += 1;
                    }
                    None => {
                        warn!(section, question, "generator returned no questions; skipped");
                    }
                },
                Err(e) => {
                    warn!(section, question, error = %e, "batch refinement unit failed; skipped");
                }
            }
        }

        state.editor.apply(Action::CancelBatchSelection);
        let report = BatchReport {
            succeeded,
            attempted,
        };
        info!(session_id = %state.session_id, %report, "batch refinement completed");
        Ok(report)
    }

    async fn publish(
        state: &mut DraftSessionState,
        title: Option<String>,
    ) -> Result<SurveyRecord, SessionError> {
        if state.editor.draft.is_empty() {
            return Err(SessionError::EmptyDraft);
        }

        // Publish is exactly-once; a second confirm returns the record as-is.
        if state.status == SurveyStatus::Published {
            if let Some(id) = state.editor.draft.draft_id {
                if let Some(record) = state.store.fetch(id).await? {
                    return Ok(record);
                }
            }
        }

        let candidate = title.unwrap_or_else(|| state.title.clone());
        let record = match state.editor.draft.draft_id {
            Some(id) => {
                let taken = state.store.titles_for_user(&state.user_id, Some(id)).await?;
                let unique_title = dedupe_title(&candidate, &taken);
                // Make sure the published record carries the latest document,
                // not just whatever the last autosave got to.
                state
                    .store
                    .save_draft(id, &state.editor.draft.sections, &state.editor.draft.language)
                    .await?;
                state.store.publish(id, &unique_title).await?
            }
            None => {
                let saved = Self::create_record(
                    state.store.as_ref(),
                    &state.user_id,
                    &candidate,
                    &state.description,
                    state.editor.draft.sections.clone(),
                    &state.editor.draft.language,
                    SurveyStatus::Published,
                )
                .await?;
                state.editor.draft.draft_id = Some(saved.id);
                state
                    .store
                    .fetch(saved.id)
                    .await?
                    .ok_or(StoreError::NotFound(saved.id))?
            }
        };

        state.status = SurveyStatus::Published;
        state.title = record.title.clone();
        state.share_token = Some(record.share_token.clone());
        info!(
            session_id = %state.session_id,
            survey_id = %record.id,
            share_token = %record.share_token,
            "draft published"
        );
        Ok(record)
    }
}

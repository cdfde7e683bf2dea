//! Shared service state: the session registry plus the store and generator
//! handles every session is spawned with.

use ractor::{Actor, ActorRef};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::actors::session::{
    DraftSessionActor, DraftSessionArguments, DraftSessionMsg,
};
use crate::generation::QuestionGenerator;
use crate::store::SurveyRepository;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<dyn SurveyRepository>,
    generator: Arc<dyn QuestionGenerator>,
    autosave_debounce: Duration,
    default_language: String,
    sessions: Mutex<HashMap<String, ActorRef<DraftSessionMsg>>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn SurveyRepository>,
        generator: Arc<dyn QuestionGenerator>,
        autosave_debounce: Duration,
        default_language: String,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                store,
                generator,
                autosave_debounce,
                default_language,
                sessions: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn store(&self) -> Arc<dyn SurveyRepository> {
        self.inner.store.clone()
    }

    /// Spawn a new editing session, empty or seeded from an existing survey.
    /// Returns the session id used to address it afterwards.
    pub async fn open_session(
        &self,
        user_id: String,
        title: String,
        description: String,
        language: Option<String>,
        survey_id: Option<Uuid>,
    ) -> Result<(String, ActorRef<DraftSessionMsg>), String> {
        let record = match survey_id {
            Some(id) => Some(
                self.inner
                    .store
                    .fetch(id)
                    .await
                    .map_err(|e| e.to_string())?
                    .ok_or_else(|| format!("survey {id} not found"))?,
            ),
            None => None,
        };

        let session_id = ulid::Ulid::new().to_string();
        let args = DraftSessionArguments {
            session_id: session_id.clone(),
            user_id,
            title,
            description,
            language: language.unwrap_or_else(|| self.inner.default_language.clone()),
            record,
            generator: self.inner.generator.clone(),
            store: self.inner.store.clone(),
            autosave_debounce: self.inner.autosave_debounce,
        };

        let (actor, _handle) = Actor::spawn(
            Some(format!("draft_session:{session_id}")),
            DraftSessionActor,
            args,
        )
        .await
        .map_err(|e| e.to_string())?;

        self.inner
            .sessions
            .lock()
            .await
            .insert(session_id.clone(), actor.clone());
        Ok((session_id, actor))
    }

    pub async fn session(&self, session_id: &str) -> Option<ActorRef<DraftSessionMsg>> {
        self.inner.sessions.lock().await.get(session_id).cloned()
    }

    /// Stop a session actor and forget it.
    pub async fn close_session(&self, session_id: &str) -> bool {
        match self.inner.sessions.lock().await.remove(session_id) {
            Some(actor) => {
                actor.stop(None);
                true
            }
            None => false,
        }
    }
}

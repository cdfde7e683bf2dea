//! Shared types between the studio service and its clients
//!
//! These types are used by:
//! - The studio session actors and survey store (native Rust)
//! - The web frontend, over JSON
//! - The hosted question-generation function (wire contract)
//!
//! Serializable with serde for JSON over HTTP and for the `sections`
//! column of the survey record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Document Model
// ============================================================================

/// Kind-dependent shape of a question.
///
/// Choice kinds own their options list; text kinds cannot carry one, so the
/// "options present iff the kind requires them" rule holds by construction.
/// On the wire this is the external `type` tag with an inline `options`
/// array, e.g. `{"type": "multiple_choice", "options": ["Yes", "No"]}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    ShortAnswer,
    Paragraph,
    MultipleChoice { options: Vec<String> },
    Checkbox { options: Vec<String> },
    Dropdown { options: Vec<String> },
}

/// Kind selector without an options payload, used when the caller picks a
/// new kind and the options are derived from the question's current state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKindTag {
    ShortAnswer,
    Paragraph,
    MultipleChoice,
    Checkbox,
    Dropdown,
}

impl QuestionKind {
    pub fn tag(&self) -> QuestionKindTag {
        match self {
            Self::ShortAnswer => QuestionKindTag::ShortAnswer,
            Self::Paragraph => QuestionKindTag::Paragraph,
            Self::MultipleChoice { .. } => QuestionKindTag::MultipleChoice,
            Self::Checkbox { .. } => QuestionKindTag::Checkbox,
            Self::Dropdown { .. } => QuestionKindTag::Dropdown,
        }
    }

    /// Wire name of this kind, as the generation function spells it.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ShortAnswer => "short_answer",
            Self::Paragraph => "paragraph",
            Self::MultipleChoice { .. } => "multiple_choice",
            Self::Checkbox { .. } => "checkbox",
            Self::Dropdown { .. } => "dropdown",
        }
    }

    pub fn options(&self) -> Option<&[String]> {
        match self {
            Self::ShortAnswer | Self::Paragraph => None,
            Self::MultipleChoice { options }
            | Self::Checkbox { options }
            | Self::Dropdown { options } => Some(options),
        }
    }

    /// Convert to `target`, carrying existing options across choice kinds
    /// and seeding defaults when a choice kind starts from a text kind.
    pub fn recast(&self, target: QuestionKindTag) -> QuestionKind {
        let carried = self
            .options()
            .filter(|options| !options.is_empty())
            .map(<[String]>::to_vec);
        let options = || carried.clone().unwrap_or_else(default_options);
        match target {
            QuestionKindTag::ShortAnswer => Self::ShortAnswer,
            QuestionKindTag::Paragraph => Self::Paragraph,
            QuestionKindTag::MultipleChoice => Self::MultipleChoice { options: options() },
            QuestionKindTag::Checkbox => Self::Checkbox { options: options() },
            QuestionKindTag::Dropdown => Self::Dropdown { options: options() },
        }
    }
}

/// Starter options for a question switched to a choice kind with none.
fn default_options() -> Vec<String> {
    vec!["Option 1".to_string(), "Option 2".to_string()]
}

/// One editable survey question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub text: String,
    #[serde(flatten)]
    pub kind: QuestionKind,
    #[serde(default)]
    pub required: bool,
    /// Name of the owning section, maintained by the editor on add/rename.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub section_name: String,
    /// Free-text refinement annotation; survives refinement passes so the
    /// user can iterate on the same instruction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl Question {
    pub fn new(text: impl Into<String>, kind: QuestionKind) -> Self {
        Self {
            text: text.into(),
            kind,
            required: false,
            section_name: String::new(),
            feedback: None,
        }
    }
}

/// A named, ordered group of questions within a draft.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Section {
    pub name: String,
    pub questions: Vec<Question>,
}

impl Section {
    pub fn new(name: impl Into<String>, questions: Vec<Question>) -> Self {
        Self {
            name: name.into(),
            questions,
        }
    }
}

/// The in-progress survey document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub sections: Vec<Section>,
    /// IETF-ish language code, e.g. "en" or "pt-BR".
    pub language: String,
    /// Absent until the draft is first persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_id: Option<Uuid>,
}

impl Draft {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            sections: Vec::new(),
            language: language.into(),
            draft_id: None,
        }
    }

    /// A draft with zero sections is "empty" and is never autosaved.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn question(&self, section: usize, question: usize) -> Option<&Question> {
        self.sections.get(section)?.questions.get(question)
    }

    pub fn question_mut(&mut self, section: usize, question: usize) -> Option<&mut Question> {
        self.sections.get_mut(section)?.questions.get_mut(question)
    }
}

// ============================================================================
// Survey Record (persistence contract)
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SurveyStatus {
    Draft,
    Published,
}

impl SurveyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            _ => None,
        }
    }
}

/// One row of the surveys table, as exchanged with clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SurveyRecord {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub sections: Vec<Section>,
    pub language: String,
    pub status: SurveyStatus,
    pub is_active: bool,
    /// Opaque public identifier for the response-collection form.
    /// Generated at first persist and stable across edits and publish.
    pub share_token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub expired_message: Option<String>,
    pub visible_in_community: bool,
    pub responses_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Generation Wire Contract
// ============================================================================

/// Request body of the hosted question-generation/refinement function.
/// Exactly one of `description` or `refine_question` is meaningful per call.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_document: Option<bool>,
    pub language: String,
    /// Omitted means "auto": the service picks a sensible count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refine_question: Option<RefineQuestionPayload>,
}

impl GenerateRequest {
    pub fn for_topic(description: &str, language: &str, question_count: Option<u32>) -> Self {
        Self {
            description: Some(description.to_string()),
            has_document: None,
            language: language.to_string(),
            question_count,
            refine_question: None,
        }
    }

    pub fn for_refinement(question: &Question, feedback: &str, language: &str) -> Self {
        Self {
            description: None,
            has_document: None,
            language: language.to_string(),
            question_count: None,
            refine_question: Some(RefineQuestionPayload {
                question: question.text.clone(),
                feedback: feedback.to_string(),
                kind: question.kind.label().to_string(),
                options: question.kind.options().map(<[String]>::to_vec),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RefineQuestionPayload {
    pub question: String,
    pub feedback: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

/// Response body: `questions` on success, `error` (with empty `questions`)
/// on failure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerateResponse {
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Template Clone (external collaborator surface)
// ============================================================================

/// Success result of the platform's atomic template-clone operation.
/// The studio only surfaces this; the clone itself runs server-side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateCloneOutcome {
    pub survey_id: Uuid,
    pub credits_debited: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TemplateCloneError {
    InsufficientCredits,
    CannotCloneOwnTemplate,
    NotFound,
}

impl std::fmt::Display for TemplateCloneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientCredits => write!(f, "insufficient credits"),
            Self::CannotCloneOwnTemplate => write!(f, "cannot clone your own template"),
            Self::NotFound => write!(f, "template not found"),
        }
    }
}

//! Draft editor state and its reducer.
//!
//! All mutation of an open draft goes through [`EditorState::apply`], one
//! action at a time. The session actor guarantees run-to-completion, so no
//! two actions ever interleave.

pub mod history;
mod reducer;

pub use reducer::Action;

use std::collections::BTreeSet;

use survey_types::{Draft, Question};

use crate::editor::history::HistoryRing;

/// Per-question feedback flow: a free-text annotation box on one question,
/// optionally extended to a selection of others for a batch pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FeedbackPanel {
    #[default]
    Idle,
    /// The feedback box is open on exactly one question.
    Open { section: usize, question: usize },
    /// Batch mode: the source question's feedback text will be applied to
    /// every selected question.
    Selecting {
        section: usize,
        question: usize,
        source_feedback: String,
    },
}

impl FeedbackPanel {
    /// The question the panel is anchored to, if any.
    pub fn anchor(&self) -> Option<(usize, usize)> {
        match self {
            Self::Idle => None,
            Self::Open { section, question } | Self::Selecting { section, question, .. } => {
                Some((*section, *question))
            }
        }
    }
}

/// Transient fields of the "add new section" dialog. Reset to defaults on
/// close or successful submission; excluded from history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionDialog {
    pub open: bool,
    pub title: String,
    pub description: String,
    /// `None` means "auto": the generation service picks the count.
    pub question_count: Option<u32>,
    pub is_generating: bool,
}

/// Transient fields of the "generate more with a new topic" dialog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicDialog {
    pub open: bool,
    pub target_section: Option<usize>,
    pub description: String,
    pub question_count: Option<u32>,
    pub is_generating: bool,
}

/// A staged copy of one question being edited; committed back into the
/// section list atomically by `SaveEditedQuestion`.
#[derive(Debug, Clone, PartialEq)]
pub struct EditBuffer {
    pub section: usize,
    pub question: usize,
    pub staged: Question,
}

/// Everything one editing session holds in memory. Only `draft.sections`
/// participates in undo/redo; the rest is transient UI state.
#[derive(Debug, Clone)]
pub struct EditorState {
    pub draft: Draft,
    pub history: HistoryRing,
    /// Questions chosen for a batch feedback pass, iterated in sorted
    /// index order so batch application order is deterministic.
    pub selection: BTreeSet<(usize, usize)>,
    pub feedback: FeedbackPanel,
    pub editing_section: Option<usize>,
    pub edit_buffer: Option<EditBuffer>,
    pub section_dialog: SectionDialog,
    pub topic_dialog: TopicDialog,
}

impl EditorState {
    pub fn new(language: impl Into<String>) -> Self {
        Self::seeded(Draft::new(language))
    }

    /// Start a session over an existing draft (e.g. re-opening a published
    /// survey for editing). The seed becomes the history floor.
    pub fn seeded(draft: Draft) -> Self {
        let history = HistoryRing::new(draft.sections.clone());
        Self {
            draft,
            history,
            selection: BTreeSet::new(),
            feedback: FeedbackPanel::Idle,
            editing_section: None,
            edit_buffer: None,
            section_dialog: SectionDialog::default(),
            topic_dialog: TopicDialog::default(),
        }
    }
}

//! The draft reducer: every mutation of an editing session, one action at a
//! time.
//!
//! `apply` is synchronous, pure of I/O, and total: an action carrying indices
//! that no longer exist (a concurrent deletion shifted them before the client
//! caught up) is a logged no-op, never a panic and never an edit of the wrong
//! element. Indices are always resolved against current state at apply time.
//!
//! Actions that change `sections` push exactly one history snapshot.
//! `Undo`/`Redo` restore snapshots and never push, so navigating history
//! cannot destroy it.

use serde::{Deserialize, Serialize};
use survey_types::{Question, QuestionKindTag};
use tracing::debug;

use crate::editor::{EditBuffer, EditorState, FeedbackPanel, SectionDialog, TopicDialog};

/// One state transition of the draft editor.
///
/// The wire shape (`kind` tag, camelCase fields) is what the web client posts
/// to the session action endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Action {
    // Section operations
    AddSection {
        name: String,
        questions: Vec<Question>,
    },
    RemoveSection {
        name: String,
    },
    BeginRenameSection {
        section: usize,
    },
    RenameSection {
        section: usize,
        new_name: String,
    },
    CancelRenameSection,

    // Question operations
    AddQuestions {
        section: usize,
        questions: Vec<Question>,
    },
    DeleteQuestion {
        section: usize,
        question: usize,
    },
    UpdateQuestionKind {
        section: usize,
        question: usize,
        new_kind: QuestionKindTag,
    },
    BeginEditQuestion {
        section: usize,
        question: usize,
    },
    StageEditedQuestion {
        staged: Question,
    },
    SaveEditedQuestion,
    CancelEditQuestion,
    /// Swap one question for a refined replacement. The stored feedback
    /// annotation is carried over so the user can keep iterating on it.
    ReplaceQuestion {
        section: usize,
        question: usize,
        replacement: Question,
    },

    // Feedback workflow
    OpenFeedback {
        section: usize,
        question: usize,
    },
    CloseFeedback,
    ApplyFeedback {
        section: usize,
        question: usize,
        feedback: String,
    },
    BeginBatchSelection,
    ToggleSelection {
        section: usize,
        question: usize,
    },
    CancelBatchSelection,

    // Transient dialog state
    OpenSectionDialog,
    UpdateSectionDialog {
        title: String,
        description: String,
        question_count: Option<u32>,
    },
    SetSectionDialogGenerating {
        generating: bool,
    },
    CloseSectionDialog,
    OpenTopicDialog {
        target_section: Option<usize>,
    },
    UpdateTopicDialog {
        description: String,
        question_count: Option<u32>,
    },
    SetTopicDialogGenerating {
        generating: bool,
    },
    CloseTopicDialog,

    // Document-level
    SetLanguage {
        language: String,
    },
    Undo,
    Redo,
}

impl EditorState {
    /// Apply one action. Returns `true` when the document (sections or
    /// language) changed, which is the session actor's cue to restart the
    /// autosave debounce.
    pub fn apply(&mut self, action: Action) -> bool {
        match action {
            Action::AddSection { name, questions } => self.add_section(name, questions),
            Action::RemoveSection { name } => self.remove_section(&name),
            Action::BeginRenameSection { section } => {
                if section < self.draft.sections.len() {
                    self.editing_section = Some(section);
                }
                false
            }
            Action::RenameSection { section, new_name } => self.rename_section(section, &new_name),
            Action::CancelRenameSection => {
                self.editing_section = None;
                false
            }
            Action::AddQuestions { section, questions } => self.add_questions(section, questions),
            Action::DeleteQuestion { section, question } => self.delete_question(section, question),
            Action::UpdateQuestionKind {
                section,
                question,
                new_kind,
            } => self.update_question_kind(section, question, new_kind),
            Action::BeginEditQuestion { section, question } => {
                match self.draft.question(section, question) {
                    Some(q) => {
                        self.edit_buffer = Some(EditBuffer {
                            section,
                            question,
                            staged: q.clone(),
                        });
                    }
                    None => debug!(section, question, "begin edit on missing question; ignored"),
                }
                false
            }
            Action::StageEditedQuestion { staged } => {
                if let Some(buffer) = self.edit_buffer.as_mut() {
                    buffer.staged = staged;
                }
                false
            }
            Action::SaveEditedQuestion => self.save_edited_question(),
            Action::CancelEditQuestion => {
                self.edit_buffer = None;
                false
            }
            Action::ReplaceQuestion {
                section,
                question,
                replacement,
            } => self.replace_question(section, question, replacement),
            Action::OpenFeedback { section, question } => {
                match self.draft.question(section, question) {
                    Some(_) => {
                        // Only one panel at a time: opening here closes any
                        // other, batch selection included.
                        self.selection.clear();
                        self.feedback = FeedbackPanel::Open { section, question };
                    }
                    None => debug!(section, question, "open feedback on missing question; ignored"),
                }
                false
            }
            Action::CloseFeedback => {
                self.feedback = FeedbackPanel::Idle;
                self.selection.clear();
                false
            }
            Action::ApplyFeedback {
                section,
                question,
                feedback,
            } => self.apply_feedback(section, question, feedback),
            Action::BeginBatchSelection => {
                if let FeedbackPanel::Open { section, question } = self.feedback {
                    let source_feedback = self
                        .draft
                        .question(section, question)
                        .and_then(|q| q.feedback.clone())
                        .unwrap_or_default();
                    self.feedback = FeedbackPanel::Selecting {
                        section,
                        question,
                        source_feedback,
                    };
                }
                false
            }
            Action::ToggleSelection { section, question } => {
                self.toggle_selection(section, question);
                false
            }
            Action::CancelBatchSelection => {
                if matches!(self.feedback, FeedbackPanel::Selecting { .. }) {
                    self.feedback = FeedbackPanel::Idle;
                    self.selection.clear();
                }
                false
            }
            Action::OpenSectionDialog => {
                self.section_dialog = SectionDialog {
                    open: true,
                    ..SectionDialog::default()
                };
                false
            }
            Action::UpdateSectionDialog {
                title,
                description,
                question_count,
            } => {
                if self.section_dialog.open {
                    self.section_dialog.title = title;
                    self.section_dialog.description = description;
                    self.section_dialog.question_count = question_count;
                }
                false
            }
            Action::SetSectionDialogGenerating { generating } => {
                if self.section_dialog.open {
                    self.section_dialog.is_generating = generating;
                }
                false
            }
            Action::CloseSectionDialog => {
                self.section_dialog = SectionDialog::default();
                false
            }
            Action::OpenTopicDialog { target_section } => {
                self.topic_dialog = TopicDialog {
                    open: true,
                    target_section,
                    ..TopicDialog::default()
                };
                false
            }
            Action::UpdateTopicDialog {
                description,
                question_count,
            } => {
                if self.topic_dialog.open {
                    self.topic_dialog.description = description;
                    self.topic_dialog.question_count = question_count;
                }
                false
            }
            Action::SetTopicDialogGenerating { generating } => {
                if self.topic_dialog.open {
                    self.topic_dialog.is_generating = generating;
                }
                false
            }
            Action::CloseTopicDialog => {
                self.topic_dialog = TopicDialog::default();
                false
            }
            Action::SetLanguage { language } => {
                if self.draft.language == language {
                    return false;
                }
                self.draft.language = language;
                true
            }
            Action::Undo => {
                let restored = self.history.undo().map(<[_]>::to_vec);
                match restored {
                    Some(sections) => {
                        self.draft.sections = sections;
                        self.drop_stale_refs();
                        true
                    }
                    None => false,
                }
            }
            Action::Redo => {
                let restored = self.history.redo().map(<[_]>::to_vec);
                match restored {
                    Some(sections) => {
                        self.draft.sections = sections;
                        self.drop_stale_refs();
                        true
                    }
                    None => false,
                }
            }
        }
    }

    /// Record the current sections as a new history snapshot.
    fn commit(&mut self) {
        self.history.push(self.draft.sections.clone());
    }

    fn add_section(&mut self, name: String, mut questions: Vec<Question>) -> bool {
        if self.draft.sections.iter().any(|s| s.name == name) {
            debug!(name = %name, "add section with duplicate name; ignored");
            return false;
        }
        for question in &mut questions {
            question.section_name = name.clone();
        }
        self.draft
            .sections
            .push(survey_types::Section::new(name, questions));
        self.commit();
        true
    }

    fn remove_section(&mut self, name: &str) -> bool {
        let before = self.draft.sections.len();
        self.draft.sections.retain(|s| s.name != name);
        if self.draft.sections.len() == before {
            debug!(name = %name, "remove missing section; ignored");
            return false;
        }
        self.drop_stale_refs();
        self.commit();
        true
    }

    fn rename_section(&mut self, section: usize, new_name: &str) -> bool {
        self.editing_section = None;
        let trimmed = new_name.trim();
        if trimmed.is_empty() {
            return false;
        }
        let taken = self
            .draft
            .sections
            .iter()
            .enumerate()
            .any(|(i, s)| i != section && s.name == trimmed);
        if taken {
            debug!(name = %trimmed, "rename to existing section name; ignored");
            return false;
        }
        let Some(target) = self.draft.sections.get_mut(section) else {
            debug!(section, "rename on missing section; ignored");
            return false;
        };
        if target.name == trimmed {
            return false;
        }
        target.name = trimmed.to_string();
        for question in &mut target.questions {
            question.section_name = trimmed.to_string();
        }
        self.commit();
        true
    }

    fn add_questions(&mut self, section: usize, mut questions: Vec<Question>) -> bool {
        let Some(target) = self.draft.sections.get_mut(section) else {
            debug!(section, "add questions to missing section; ignored");
            return false;
        };
        if questions.is_empty() {
            return false;
        }
        for question in &mut questions {
            question.section_name = target.name.clone();
        }
        target.questions.append(&mut questions);
        self.commit();
        true
    }

    fn delete_question(&mut self, section: usize, question: usize) -> bool {
        let Some(target) = self.draft.sections.get_mut(section) else {
            debug!(section, question, "delete from missing section; ignored");
            return false;
        };
        if question >= target.questions.len() {
            debug!(section, question, "delete missing question; ignored");
            return false;
        }
        target.questions.remove(question);
        if target.questions.is_empty() {
            // A deletion that empties a section prunes the section too.
            self.draft.sections.remove(section);
        }
        self.drop_stale_refs();
        self.commit();
        true
    }

    fn update_question_kind(
        &mut self,
        section: usize,
        question: usize,
        new_kind: QuestionKindTag,
    ) -> bool {
        let Some(target) = self.draft.question_mut(section, question) else {
            debug!(section, question, "update kind on missing question; ignored");
            return false;
        };
        target.kind = target.kind.recast(new_kind);
        self.commit();
        true
    }

    fn save_edited_question(&mut self) -> bool {
        let Some(buffer) = self.edit_buffer.take() else {
            return false;
        };
        let Some(owner) = self.draft.sections.get_mut(buffer.section) else {
            debug!(section = buffer.section, "save edit into missing section; ignored");
            return false;
        };
        let name = owner.name.clone();
        let Some(slot) = owner.questions.get_mut(buffer.question) else {
            debug!(
                section = buffer.section,
                question = buffer.question,
                "save edit into missing question; ignored"
            );
            return false;
        };
        let mut staged = buffer.staged;
        staged.section_name = name;
        *slot = staged;
        self.commit();
        true
    }

    fn replace_question(&mut self, section: usize, question: usize, replacement: Question) -> bool {
        let Some(owner) = self.draft.sections.get_mut(section) else {
            debug!(section, question, "replace in missing section; ignored");
            return false;
        };
        let name = owner.name.clone();
        let Some(slot) = owner.questions.get_mut(question) else {
            debug!(section, question, "replace missing question; ignored");
            return false;
        };
        let mut replacement = replacement;
        replacement.section_name = name;
        replacement.feedback = slot.feedback.clone();
        *slot = replacement;
        self.commit();
        true
    }

    fn apply_feedback(&mut self, section: usize, question: usize, feedback: String) -> bool {
        let Some(target) = self.draft.question_mut(section, question) else {
            debug!(section, question, "apply feedback to missing question; ignored");
            return false;
        };
        let trimmed = feedback.trim();
        target.feedback = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        self.commit();
        true
    }

    fn toggle_selection(&mut self, section: usize, question: usize) {
        let FeedbackPanel::Selecting {
            section: anchor_section,
            question: anchor_question,
            ..
        } = self.feedback
        else {
            return;
        };
        // The source question is always part of the batch; it cannot be
        // toggled out.
        if (section, question) == (anchor_section, anchor_question) {
            return;
        }
        if self.draft.question(section, question).is_none() {
            debug!(section, question, "toggle selection of missing question; ignored");
            return;
        }
        if !self.selection.remove(&(section, question)) {
            self.selection.insert((section, question));
        }
    }

    /// After a structural change, drop any transient reference to an element
    /// that no longer exists.
    fn drop_stale_refs(&mut self) {
        let draft = &self.draft;
        self.selection
            .retain(|&(section, question)| draft.question(section, question).is_some());
        if let Some((section, question)) = self.feedback.anchor() {
            if draft.question(section, question).is_none() {
                self.feedback = FeedbackPanel::Idle;
                self.selection.clear();
            }
        }
        if let Some(buffer) = &self.edit_buffer {
            if draft.question(buffer.section, buffer.question).is_none() {
                self.edit_buffer = None;
            }
        }
        if let Some(section) = self.editing_section {
            if section >= draft.sections.len() {
                self.editing_section = None;
            }
        }
    }
}

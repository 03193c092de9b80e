//! Transcript model and chat rendering.
//!
//! A [`PromptScript`] is what a template renders: an ordered list of turns
//! with generation slots interleaved. Executing the script against a backend
//! produces a [`Transcript`], in which every slot has been replaced by the
//! text the backend generated for it.

use super::slot::SlotSpec;

/// Conversation role of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    Generated,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Generated => "generated",
        }
    }
}

/// One entry of a transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Turn {
    /// A role-tagged message, wrapped in chat markers when rendered.
    Message { role: Role, content: String },
    /// Scaffold text placed outside any role block, rendered verbatim.
    Text(String),
    /// Backend output for the named slot, rendered verbatim.
    Generated { slot: String, text: String },
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Turn::Message {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Turn::Message {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Turn::Message {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Turn::Text(content.into())
    }

    /// Role of the turn; scaffold text has none.
    pub fn role(&self) -> Option<Role> {
        match self {
            Turn::Message { role, .. } => Some(*role),
            Turn::Text(_) => None,
            Turn::Generated { .. } => Some(Role::Generated),
        }
    }
}

/// Role markers used to flatten a transcript into prompt text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTemplate {
    pub begin: String,
    pub end: String,
}

/// ChatML end-of-turn marker, also the token the post-processor removes.
pub const CHATML_END_OF_TURN: &str = "<|im_end|>";

impl ChatTemplate {
    /// `<|im_start|>{role}\n ... <|im_end|>\n`
    pub fn chatml() -> Self {
        Self {
            begin: "<|im_start|>{role}\n".to_string(),
            end: format!("{}\n", CHATML_END_OF_TURN),
        }
    }

    /// No markers at all.
    #[cfg(test)]
    pub fn plain() -> Self {
        Self {
            begin: String::new(),
            end: String::new(),
        }
    }

    fn render_message(&self, role: Role, content: &str, out: &mut String) {
        out.push_str(&self.begin.replace("{role}", role.as_str()));
        out.push_str(content);
        out.push_str(&self.end);
    }
}

impl Default for ChatTemplate {
    fn default() -> Self {
        Self::chatml()
    }
}

/// Ordered, append-only list of turns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Text generated for the named slot, if it has been filled.
    #[cfg(test)]
    pub fn generated(&self, slot_name: &str) -> Option<&str> {
        self.turns.iter().find_map(|turn| match turn {
            Turn::Generated { slot, text } if slot == slot_name => Some(text.as_str()),
            _ => None,
        })
    }

    /// Flatten the transcript into the text a backend sees.
    pub fn render(&self, chat: &ChatTemplate) -> String {
        let mut out = String::new();
        for turn in &self.turns {
            match turn {
                Turn::Message { role, content } => chat.render_message(*role, content, &mut out),
                Turn::Text(text) | Turn::Generated { text, .. } => out.push_str(text),
            }
        }
        out
    }
}

/// A step of a rendered template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Turn(Turn),
    Slot(SlotSpec),
}

/// Builder for a template's steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptScript {
    steps: Vec<Step>,
}

impl PromptScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn system(self, content: impl Into<String>) -> Self {
        self.turn(Turn::system(content))
    }

    pub fn user(self, content: impl Into<String>) -> Self {
        self.turn(Turn::user(content))
    }

    pub fn assistant(self, content: impl Into<String>) -> Self {
        self.turn(Turn::assistant(content))
    }

    pub fn text(self, content: impl Into<String>) -> Self {
        self.turn(Turn::text(content))
    }

    pub fn turn(mut self, turn: Turn) -> Self {
        self.steps.push(Step::Turn(turn));
        self
    }

    pub fn gen(mut self, slot: SlotSpec) -> Self {
        self.steps.push(Step::Slot(slot));
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    #[cfg(test)]
    pub fn slots(&self) -> impl Iterator<Item = &SlotSpec> {
        self.steps.iter().filter_map(|step| match step {
            Step::Slot(slot) => Some(slot),
            Step::Turn(_) => None,
        })
    }
}

//! Generation slot constraints.

/// When the backend should stop producing text for a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopCondition {
    None,
    String(String),
    AnyOf(Vec<String>),
}

impl StopCondition {
    pub fn newline() -> Self {
        StopCondition::String("\n".to_string())
    }

    /// Stop strings in the shape the runtime expects.
    pub fn to_stop_list(&self) -> Vec<String> {
        match self {
            StopCondition::None => Vec::new(),
            StopCondition::String(s) => vec![s.clone()],
            StopCondition::AnyOf(list) => list.clone(),
        }
    }
}

/// A request for the backend to produce one span of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSpec {
    /// Slot name, used in logs and for looking up generated spans.
    pub name: String,
    pub max_tokens: u32,
    pub stop: StopCondition,
    /// Surface grammar the generated span must match in full.
    pub surface_regex: Option<String>,
}

impl SlotSpec {
    pub fn new(name: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            name: name.into(),
            max_tokens: max_tokens.max(1),
            stop: StopCondition::None,
            surface_regex: None,
        }
    }

    pub fn stop(mut self, stop: StopCondition) -> Self {
        self.stop = stop;
        self
    }

    pub fn regex(mut self, pattern: impl Into<String>) -> Self {
        self.surface_regex = Some(pattern.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_list_shapes() {
        assert!(StopCondition::None.to_stop_list().is_empty());
        assert_eq!(StopCondition::newline().to_stop_list(), vec!["\n"]);
        assert_eq!(
            StopCondition::AnyOf(vec!["```".into(), "\n\n".into()]).to_stop_list(),
            vec!["```", "\n\n"]
        );
    }

    #[test]
    fn test_zero_max_tokens_is_clamped() {
        let slot = SlotSpec::new("s", 0);
        assert_eq!(slot.max_tokens, 1);
    }
}

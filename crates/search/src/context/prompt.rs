//! System prompt composition for the generation call

use super::assembler::{AssembledContext, SourceRef};
use serde::{Deserialize, Serialize};

/// The base prompt alone when there is no context, otherwise the context
/// appended after a blank line.
pub fn compose_system_prompt(base: &str, context_text: &str) -> String {
    if context_text.is_empty() {
        base.to_string()
    } else {
        format!("{}\n\n{}", base, context_text)
    }
}

/// What the generation collaborator needs from retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagContext {
    pub system_prompt: String,
    pub sources: Vec<SourceRef>,
}

impl RagContext {
    pub fn new(base_prompt: &str, assembled: AssembledContext) -> Self {
        Self {
            system_prompt: compose_system_prompt(base_prompt, &assembled.context_text),
            sources: assembled.sources,
        }
    }

    /// Whether any retrieved context made it into the prompt
    pub fn is_augmented(&self) -> bool {
        !self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_without_context_keeps_base() {
        assert_eq!(compose_system_prompt("Be helpful.", ""), "Be helpful.");
    }

    #[test]
    fn test_with_context_appends_after_blank_line() {
        assert_eq!(
            compose_system_prompt("Be helpful.", "Here is context"),
            "Be helpful.\n\nHere is context"
        );
    }

    #[test]
    fn test_rag_context_from_empty_assembly() {
        let rag = RagContext::new("Base", AssembledContext::default());
        assert_eq!(rag.system_prompt, "Base");
        assert!(!rag.is_augmented());
    }
}

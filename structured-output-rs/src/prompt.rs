//! Few-shot prompt assembly

/// Default instruction: a math solver that answers with a `problem`/`answer` object
pub const MATH_SOLVER_PREAMBLE: &str = r#"You are a math solver AI. Only respond with JSON in the following format:
{
  "problem": "<original problem>",
  "answer": "<final boxed answer>"
}
"#;

/// A fixed instruction block placed before every user prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FewShotPrompt {
    preamble: String,
}

impl Default for FewShotPrompt {
    fn default() -> Self {
        Self::new(MATH_SOLVER_PREAMBLE)
    }
}

impl FewShotPrompt {
    pub fn new(preamble: impl Into<String>) -> Self {
        Self {
            preamble: preamble.into(),
        }
    }

    pub fn preamble(&self) -> &str {
        &self.preamble
    }

    /// Preamble, a newline, then the trimmed user prompt
    pub fn render(&self, user_prompt: &str) -> String {
        format!("{}\n{}", self.preamble, user_prompt.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_trims_user_prompt() {
        let prompt = FewShotPrompt::new("Answer in JSON.");
        assert_eq!(prompt.render("  What is 2+2?\n"), "Answer in JSON.\nWhat is 2+2?");
    }

    #[test]
    fn test_default_mentions_schema_keys() {
        let rendered = FewShotPrompt::default().render("What is (3^2 + 4^2)?");
        assert!(rendered.contains("\"problem\""));
        assert!(rendered.contains("\"answer\""));
        assert!(rendered.ends_with("}\n\nWhat is (3^2 + 4^2)?"));
    }
}

//! Prompt rendering for generation requests.

use anyhow::Result;
use minijinja::{Environment, context};

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");
const IMPLEMENTATION_TEMPLATE: &str = include_str!("prompts/implementation.md");
const TEST_TEMPLATE: &str = include_str!("prompts/test.md");

/// Target language fixed by the system instruction.
pub const LANGUAGE: &str = "TypeScript";

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("system", SYSTEM_TEMPLATE)
            .expect("system template should be valid");
        env.add_template("implementation", IMPLEMENTATION_TEMPLATE)
            .expect("implementation template should be valid");
        env.add_template("test", TEST_TEMPLATE)
            .expect("test template should be valid");
        Self { env }
    }

    /// System-role instruction fixing the output language and the
    /// code-only, fenced-block-only constraint.
    pub fn render_system(&self) -> Result<String> {
        let template = self.env.get_template("system")?;
        let rendered = template.render(context! { language => LANGUAGE })?;
        Ok(rendered.trim().to_string())
    }

    /// User-role prompt for the implementation, with the failure transcript
    /// appended on retries.
    pub fn render_implementation(
        &self,
        function_name: &str,
        task: &str,
        failure: Option<&str>,
    ) -> Result<String> {
        let template = self.env.get_template("implementation")?;
        let rendered = template.render(context! {
            language => LANGUAGE,
            function_name => function_name,
            task => task.trim(),
            failure => failure.map(str::trim).filter(|s| !s.is_empty()),
        })?;
        Ok(rendered.trim().to_string())
    }

    /// User-role prompt for the test, referencing (not duplicating) the
    /// implementation by its on-disk module path.
    pub fn render_test(
        &self,
        function_name: &str,
        module: &str,
        implementation: &str,
    ) -> Result<String> {
        let template = self.env.get_template("test")?;
        let rendered = template.render(context! {
            language => LANGUAGE,
            function_name => function_name,
            module => module,
            implementation => implementation.trim(),
        })?;
        Ok(rendered.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_fixes_language_and_fencing() {
        let engine = PromptEngine::new();
        let system = engine.render_system().expect("render");
        assert!(system.contains("TypeScript"));
        assert!(system.contains("```"));
    }

    #[test]
    fn implementation_prompt_omits_failure_section_on_first_attempt() {
        let engine = PromptEngine::new();
        let prompt = engine
            .render_implementation("add", "add two numbers", None)
            .expect("render");
        assert!(prompt.contains("'add'"));
        assert!(prompt.contains("add two numbers"));
        assert!(!prompt.contains("previous attempt"));
    }

    #[test]
    fn implementation_prompt_appends_failure_transcript_on_retry() {
        let engine = PromptEngine::new();
        let prompt = engine
            .render_implementation("add", "add two numbers", Some("Expected: 5\nReceived: 4"))
            .expect("render");
        assert!(prompt.contains("previous attempt"));
        assert!(prompt.contains("Received: 4"));
    }

    #[test]
    fn test_prompt_references_module_and_embeds_implementation() {
        let engine = PromptEngine::new();
        let prompt = engine
            .render_test("add", "add", "export default function add() {}")
            .expect("render");
        assert!(prompt.contains("'./add'"));
        assert!(prompt.contains("jest.mock"));
        assert!(prompt.contains("export default function add"));
    }
}

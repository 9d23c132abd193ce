//! Interactive operator prompts.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};

use crate::core::decision::ContinuePolicy;
use crate::core::types::TestOutcome;

/// Asks the operator on each failing iteration whether to keep iterating.
#[derive(Debug, Clone, Copy, Default)]
pub struct InteractivePrompt;

impl ContinuePolicy for InteractivePrompt {
    fn should_continue(&mut self, iter: u32, outcome: &TestOutcome) -> Result<bool> {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        writeln!(stdout, "\n*** Iteration {iter} failed:")?;
        writeln!(stdout, "{}", outcome.output.trim_end())?;
        write!(stdout, "Do you want to keep iterating? (yes/no) ")?;
        stdout.flush().context("flush stdout")?;

        let mut answer = String::new();
        stdin
            .lock()
            .read_line(&mut answer)
            .context("read operator answer")?;
        Ok(parse_answer(&answer))
    }
}

/// Anything other than an explicit no continues, matching the prompt's
/// yes-leaning default.
fn parse_answer(answer: &str) -> bool {
    let normalized = answer.trim().to_ascii_lowercase();
    !(normalized == "no" || normalized == "n")
}

/// Read a line with a default fallback for empty input.
pub fn prompt_with_default(label: &str, default: &str) -> Result<String> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{label} (default: {default}): ")?;
    stdout.flush().context("flush stdout")?;

    let mut answer = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("read operator input")?;
    let trimmed = answer.trim();
    if trimmed.is_empty() {
        return Ok(default.to_string());
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_and_n_stop_the_loop() {
        assert!(!parse_answer("no\n"));
        assert!(!parse_answer(" N \n"));
    }

    #[test]
    fn yes_and_anything_else_continue() {
        assert!(parse_answer("yes\n"));
        assert!(parse_answer("y\n"));
        assert!(parse_answer("\n"));
    }
}

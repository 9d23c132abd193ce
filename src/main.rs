//! Iterative code-generation loop runner.
//!
//! Provisions a TypeScript/jest workspace, drives a chat-completion service
//! to produce an implementation and a matching test, and repairs the
//! implementation against the test's failure transcript until it passes or
//! the continuation policy stops the loop.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use tsforge::core::decision::{AlwaysContinue, FixedRetries};
use tsforge::core::types::Verdict;
use tsforge::exit_codes;
use tsforge::io::chat::OpenAiChat;
use tsforge::io::config::{SessionConfig, load_config};
use tsforge::io::git::Git;
use tsforge::io::npm::Npm;
use tsforge::io::operator::{InteractivePrompt, prompt_with_default};
use tsforge::io::scaffold::{NpmScaffolder, Scaffolder};
use tsforge::logging;
use tsforge::session::{Session, SessionRequest, render_history};

const DEFAULT_FUNCTION_NAME: &str = "encodeVideoFFmpeg";
const DEFAULT_TASK: &str = "encode a video as an input arg with ffmpeg to x264 animation tune \
     option and slow preset with aac audio and using two pass mode without b frames and key \
     frames every 10 seconds. output to a file encode.mp4, keep output simple without all the \
     license and extra stuff, just the output frames activity input/output details and warnings.";

#[derive(Parser)]
#[command(
    name = "tsforge",
    version,
    about = "Generate, test, and repair a TypeScript function with a code-generation service"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyKind {
    /// Ask the operator on each failing iteration.
    Interactive,
    /// Retry a fixed number of failing iterations, then stop.
    Fixed,
    /// Keep iterating until the configured iteration cap.
    Always,
}

#[derive(Subcommand)]
enum Command {
    /// Provision the project workspace (manifest, jest, tsconfig, git)
    /// without running the generation loop.
    Scaffold {
        /// Project directory (created if missing).
        project: PathBuf,
        #[arg(long, default_value = DEFAULT_FUNCTION_NAME)]
        function_name: String,
    },
    /// Run a full generate → test → repair session.
    Run {
        /// Project directory (created if missing).
        project: PathBuf,
        /// Name of the function to generate (prompted when omitted).
        #[arg(long)]
        function_name: Option<String>,
        /// Description of what the function should do (prompted when omitted).
        #[arg(long)]
        task: Option<String>,
        /// Continuation policy for failing iterations.
        #[arg(long, value_enum, default_value_t = PolicyKind::Interactive)]
        policy: PolicyKind,
        /// Failing iterations to retry under `--policy fixed`.
        #[arg(long, default_value_t = 3)]
        retries: u32,
        /// Config file path (default: <project>/.tsforge/config.toml).
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Scaffold {
            project,
            function_name,
        } => cmd_scaffold(&project, &function_name),
        Command::Run {
            project,
            function_name,
            task,
            policy,
            retries,
            config,
        } => cmd_run(&project, function_name, task, policy, retries, config),
    }
}

fn cmd_scaffold(project: &Path, function_name: &str) -> Result<i32> {
    let cfg = load_session_config(project, None)?;
    let npm = command_npm(project, &cfg);
    let git = Git::new(project);
    let scaffolder = NpmScaffolder::new(&npm, &git);
    let paths = scaffolder.scaffold(function_name)?;
    println!("scaffolded {}", paths.root.display());
    Ok(exit_codes::OK)
}

fn cmd_run(
    project: &Path,
    function_name: Option<String>,
    task: Option<String>,
    policy: PolicyKind,
    retries: u32,
    config: Option<PathBuf>,
) -> Result<i32> {
    let cfg = load_session_config(project, config.as_deref())?;

    let function_name = match function_name {
        Some(name) => name,
        None => prompt_with_default("Enter the function name", DEFAULT_FUNCTION_NAME)?,
    };
    let task = match task {
        Some(task) => task,
        None => prompt_with_default(
            "Enter a detailed description of what the function should do",
            DEFAULT_TASK,
        )?,
    };
    let request = SessionRequest {
        function_name,
        task,
    };

    let npm = command_npm(project, &cfg);
    let harness = Npm::new(
        project,
        Duration::from_secs(cfg.test_timeout_secs),
        cfg.output_limit_bytes,
    );
    let git = Git::new(project);
    let scaffolder = NpmScaffolder::new(&npm, &git);
    let service = OpenAiChat::from_env(&cfg.api_base)?;

    let session = Session::new(project, &cfg, &service, &scaffolder, &npm, &harness);
    let outcome = match policy {
        PolicyKind::Interactive => session.run(&request, &mut InteractivePrompt)?,
        PolicyKind::Fixed => session.run(&request, &mut FixedRetries::new(retries))?,
        PolicyKind::Always => session.run(&request, &mut AlwaysContinue)?,
    };

    match outcome.verdict() {
        Verdict::Pass => {
            println!("PASS after {} iteration(s)", outcome.iterations);
            Ok(exit_codes::OK)
        }
        Verdict::Fail => {
            // Full history for manual inspection.
            print!("{}", render_history(&outcome));
            println!("FAIL after {} iteration(s)", outcome.iterations);
            Ok(exit_codes::TESTS_FAILED)
        }
    }
}

fn load_session_config(project: &Path, explicit: Option<&Path>) -> Result<SessionConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => project.join(".tsforge").join("config.toml"),
    };
    load_config(&path)
}

fn command_npm(project: &Path, cfg: &SessionConfig) -> Npm {
    Npm::new(
        project,
        Duration::from_secs(cfg.command_timeout_secs),
        cfg.output_limit_bytes,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_scaffold_with_default_function_name() {
        let cli = Cli::parse_from(["tsforge", "scaffold", "demo"]);
        match cli.command {
            Command::Scaffold { function_name, .. } => {
                assert_eq!(function_name, DEFAULT_FUNCTION_NAME);
            }
            Command::Run { .. } => panic!("expected scaffold"),
        }
    }

    #[test]
    fn parse_run_with_policy_and_task() {
        let cli = Cli::parse_from([
            "tsforge",
            "run",
            "demo",
            "--function-name",
            "add",
            "--task",
            "add two numbers",
            "--policy",
            "fixed",
            "--retries",
            "5",
        ]);
        match cli.command {
            Command::Run {
                function_name,
                task,
                policy,
                retries,
                ..
            } => {
                assert_eq!(function_name.as_deref(), Some("add"));
                assert_eq!(task.as_deref(), Some("add two numbers"));
                assert_eq!(policy, PolicyKind::Fixed);
                assert_eq!(retries, 5);
            }
            Command::Scaffold { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn parse_run_defaults_to_interactive_policy() {
        let cli = Cli::parse_from(["tsforge", "run", "demo"]);
        match cli.command {
            Command::Run { policy, .. } => assert_eq!(policy, PolicyKind::Interactive),
            Command::Scaffold { .. } => panic!("expected run"),
        }
    }
}

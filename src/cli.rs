//! Command-line surface of the `talent-match` binary
//!
//! Every subcommand reads a JSON request and produces one JSON value, which
//! the binary prints to stdout.

use crate::config::Settings;
use crate::core::{CompatibilityEvaluator, RankingEngine, VectorScorer};
use crate::generation::{
    generate_for_session, plan_situational, Aggregator, AnswerAnalyzer, CancellationToken,
    GenerationController, MatchExplainer, NextQuestion, QuestionTask,
};
use crate::models::{
    EmbedRequest, EmbedResponse, EvaluateRequest, ExplainRequest, QuestionRequest, RankRequest,
    RankSubject, ScoreRequest,
};
use crate::services::{
    Embedder, ExplanationCache, InMemorySessionStore, OpenAiClient, OpenAiEmbedder, SessionStore,
    TextGenerator,
};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};
use validator::Validate;

#[derive(Debug, Parser)]
#[command(name = "talent-match", version, about = "Job seeker and job posting matching engine")]
pub struct Cli {
    /// Configuration file; defaults to config/default and config/local
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Score one pair of embeddings
    Score {
        /// JSON request file, or - for stdin
        input: PathBuf,
    },
    /// Evaluate structured compatibility of a candidate with a requirement
    Evaluate { input: PathBuf },
    /// Rank a candidate pool
    Rank { input: PathBuf },
    /// Explain a talent/job match with the LLM
    Explain {
        input: PathBuf,
        /// Skip the explanation cache
        #[arg(long)]
        no_cache: bool,
    },
    /// Generate interview questions
    Questions { input: PathBuf },
    /// Run a situational interview on the terminal
    Interview,
    /// Embed texts
    Embed { input: PathBuf },
}

/// Run one subcommand
///
/// # Returns
/// The JSON value the binary prints
pub async fn dispatch(command: Command, settings: &Settings) -> anyhow::Result<Value> {
    match command {
        Command::Score { input } => {
            let request: ScoreRequest = read_request(&input).await?;
            let score = VectorScorer::new(settings.matching.alpha, settings.matching.beta)
                .score_pair(&request.vector_a, &request.vector_b, request.alpha, request.beta)
                .context("Failed to score vectors")?;
            Ok(serde_json::to_value(score)?)
        }
        Command::Evaluate { input } => {
            let request: EvaluateRequest = read_request(&input).await?;
            let evaluator = CompatibilityEvaluator::new(settings.compatibility.rules.clone());
            let result = evaluator.evaluate(
                &request.candidate,
                &request.requirement,
                request.weights.as_ref(),
            );
            Ok(serde_json::to_value(result)?)
        }
        Command::Rank { input } => {
            let request: RankRequest = read_request(&input).await?;
            let engine = RankingEngine::new(
                VectorScorer::new(settings.matching.alpha, settings.matching.beta),
                CompatibilityEvaluator::new(settings.compatibility.rules.clone()),
            );
            let mode = request.mode.unwrap_or(settings.matching.mode);
            let top_n = request.top_n.or(Some(settings.matching.default_top_n));

            let outcome = match &request.subject {
                RankSubject::SeekersForPosting { posting, seekers } => {
                    engine.rank(posting, seekers, mode, top_n, request.weights.as_ref())
                }
                RankSubject::PostingsForSeeker { seeker, postings } => {
                    engine.rank_postings(seeker, postings, mode, top_n, request.weights.as_ref())
                }
            }
            .context("Failed to rank candidates")?;
            Ok(serde_json::to_value(outcome)?)
        }
        Command::Explain { input, no_cache } => {
            let request: ExplainRequest = read_request(&input).await?;
            let generator = text_generator(settings)?;

            let mut explainer = MatchExplainer::new(
                GenerationController::from_settings(generator.clone(), &settings.generation),
                Aggregator::new(generator, call_timeout(settings)),
            );
            if !no_cache {
                match ExplanationCache::from_settings(&settings.cache).await {
                    Ok(cache) => explainer = explainer.with_cache(Arc::new(cache)),
                    Err(e) => warn!("Explanation cache unavailable ({}), continuing without it", e),
                }
            }

            let cancel = cancel_on_ctrl_c();
            let explanation = explainer
                .explain(&request, Some(&cancel))
                .await
                .context("Failed to explain match")?;
            Ok(serde_json::to_value(explanation)?)
        }
        Command::Questions { input } => {
            let request: QuestionRequest = read_request(&input).await?;
            let generator = text_generator(settings)?;
            let controller = GenerationController::from_settings(generator, &settings.generation);

            let task = QuestionTask::new(request.kind, request.context)
                .with_previous_questions(request.previous_questions)
                .with_history(request.qa_history);
            let cancel = cancel_on_ctrl_c();
            let outcome = controller.run(&task, Some(&cancel)).await;
            Ok(serde_json::to_value(outcome)?)
        }
        Command::Interview => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            run_interview(settings, stdin, tokio::io::stdout()).await
        }
        Command::Embed { input } => {
            let request: EmbedRequest = read_request(&input).await?;
            let embedder = OpenAiEmbedder::new(&settings.embedding)
                .context("Failed to build embedding client")?;
            let embeddings = embedder
                .embed_batch(&request.texts)
                .await
                .context("Failed to embed texts")?;
            Ok(serde_json::to_value(EmbedResponse {
                model: settings.embedding.model.clone(),
                dimension: embedder.dimension(),
                embeddings,
            })?)
        }
    }
}

/// Read and validate a JSON request from a file, or stdin for `-`
pub async fn read_request<T: DeserializeOwned + Validate>(path: &Path) -> anyhow::Result<T> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("Failed to read request from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read request file {}", path.display()))?
    };

    parse_request(&raw)
}

/// Decode and validate a JSON request body
pub fn parse_request<T: DeserializeOwned + Validate>(raw: &str) -> anyhow::Result<T> {
    let request: T = serde_json::from_str(raw).context("Invalid request JSON")?;
    request.validate().context("Request failed validation")?;
    Ok(request)
}

fn text_generator(settings: &Settings) -> anyhow::Result<Arc<dyn TextGenerator>> {
    if settings.llm.api_key.is_empty() {
        bail!("No LLM API key configured; set OPENAI_API_KEY or TALENT__LLM__API_KEY");
    }
    let client = OpenAiClient::new(&settings.llm).context("Failed to build LLM client")?;
    Ok(Arc::new(client))
}

fn call_timeout(settings: &Settings) -> Duration {
    Duration::from_secs(settings.generation.call_timeout_secs)
}

/// Token that is cancelled on the first Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let handle = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing current step");
            handle.cancel();
        }
    });
    token
}

/// Six-question situational interview, one answer per input line
///
/// # Arguments
/// * `settings` - LLM, generation and session settings
/// * `input` - Source of answers
/// * `output` - Where questions are written
///
/// # Returns
/// The final persona, strongest trait per dimension
pub async fn run_interview<R, W>(
    settings: &Settings,
    input: R,
    mut output: W,
) -> anyhow::Result<Value>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let generator = text_generator(settings)?;
    let controller = GenerationController::from_settings(generator.clone(), &settings.generation);
    let analyzer = AnswerAnalyzer::new(generator, call_timeout(settings));
    let store = InMemorySessionStore::from_settings(&settings.session);

    let session_id = uuid::Uuid::new_v4().to_string();
    let session = store.get_or_create(&session_id).await;
    let cancel = cancel_on_ctrl_c();
    info!("Started interview session {}", session_id);

    let mut lines = input.lines();

    loop {
        let (plan, progress, context) = {
            let guard = session.lock().await;
            (plan_situational(&guard), guard.progress(), guard.context_summary())
        };

        let question = match plan {
            NextQuestion::Finished => break,
            NextQuestion::Fixed { question, .. } => {
                session.lock().await.record_questions([question.clone()]);
                question
            }
            NextQuestion::Generate { kind, .. } => {
                let outcome =
                    generate_for_session(&controller, &session, kind, &context, Some(&cancel))
                        .await;
                if cancel.is_cancelled() {
                    bail!("Interview cancelled");
                }
                outcome
                    .final_artifact
                    .questions
                    .into_iter()
                    .next()
                    .map(|q| q.question)
                    .context("Question generation returned no question")?
            }
        };

        output
            .write_all(format!("[{}] {}\n> ", progress, question).as_bytes())
            .await?;
        output.flush().await?;

        let Some(answer) = lines.next_line().await.context("Failed to read answer")? else {
            bail!("Input closed before the interview finished");
        };

        let (analysis, _) = analyzer
            .submit_answer(&session, &question, answer.trim())
            .await
            .context("Failed to analyze answer")?;
        info!("Analysis: {}", analysis.reasoning);
    }

    let report = session.lock().await.persona.final_persona();
    store.remove(&session_id).await;
    Ok(serde_json::to_value(report)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::parse_from([
            "talent-match",
            "--config",
            "custom.toml",
            "explain",
            "-",
            "--no-cache",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert!(matches!(cli.command, Command::Explain { no_cache: true, .. }));

        let cli = Cli::parse_from(["talent-match", "interview"]);
        assert!(matches!(cli.command, Command::Interview));
    }

    #[test]
    fn test_parse_request_reports_stage() {
        let err = parse_request::<ScoreRequest>("{not json").unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid request JSON"));

        let empty = r#"{"vector_a": [], "vector_b": [1.0]}"#;
        let err = parse_request::<ScoreRequest>(empty).unwrap_err();
        assert!(format!("{:#}", err).contains("Request failed validation"));
    }

    #[tokio::test]
    async fn test_generation_needs_api_key() {
        let path = std::env::temp_dir().join(format!("questions-{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, r#"{"kind": "company_technical", "context": "결제 플랫폼"}"#)
            .await
            .unwrap();

        let err = dispatch(Command::Questions { input: path.clone() }, &Settings::default())
            .await
            .unwrap_err();
        tokio::fs::remove_file(&path).await.unwrap();

        assert!(err.to_string().contains("No LLM API key configured"));
    }
}

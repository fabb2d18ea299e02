// Generation pipeline tests with a scripted text generator

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use talent_match::generation::prompts::EVALUATOR_SYSTEM;
use talent_match::generation::{
    generate_for_session, Aggregator, CancellationToken, ExplainError, ExplanationField,
    GenerationController, MatchExplainer, QuestionKind, QuestionTask, Termination,
};
use talent_match::models::ExplainRequest;
use talent_match::services::{
    ExplanationCache, GenerationRequest, InMemorySessionStore, LlmError, SessionStore,
    TextGenerator,
};

/// Replies by prompt type and always approves semantically
///
/// Question generation returns two questions per call, so a three-question
/// task never passes the count check.
#[derive(Default)]
struct ScriptedLlm {
    question_calls: AtomicU32,
    field_calls: AtomicU32,
    aggregate_calls: AtomicU32,
    /// Culture field calls that fail before it starts answering
    culture_failures: AtomicU32,
}

impl ScriptedLlm {
    fn field_reply(prompt: &str) -> Value {
        let field = prompt
            .lines()
            .next()
            .and_then(|line| line.strip_prefix("Field: "))
            .unwrap_or("roles");
        json!({
            "field": field,
            "matching_reason":
                format!("Both summaries describe the same {} background in detail", field),
            "risk_or_gap": "Scope of ownership is unclear",
            "suggested_questions": [
                format!("How did you own {} decisions in your last team?", field),
                format!("Which {} result are you most proud of?", field)
            ]
        })
    }

    fn summary_reply() -> Value {
        json!({
            "matching_evidence": "Experience and goals line up with the role",
            "check_points": "Confirm depth of ownership",
            "suggested_questions": ["q1", "q2", "q3", "q4", "q5", "q6"]
        })
    }
}

#[async_trait]
impl TextGenerator for ScriptedLlm {
    async fn generate(&self, request: &GenerationRequest) -> Result<Value, LlmError> {
        if request.system == EVALUATOR_SYSTEM {
            return Ok(json!({"is_valid": true, "issues": [], "reasoning": "ok"}));
        }
        if request.system.contains("executive-level") {
            self.aggregate_calls.fetch_add(1, Ordering::SeqCst);
            return Ok(Self::summary_reply());
        }
        if request.system.contains("one field") {
            self.field_calls.fetch_add(1, Ordering::SeqCst);
            let failing = request.prompt.starts_with("Field: culture")
                && self
                    .culture_failures
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
            if failing {
                return Err(LlmError::EmptyContent);
            }
            return Ok(Self::field_reply(&request.prompt));
        }

        let n = self.question_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(json!({
            "questions": [
                {
                    "question": format!("{}번째 시도: 분산 시스템을 설계할 때 가장 중요하게 본 기준은 무엇인가요?", n),
                    "why": "설계 판단 기준 확인"
                },
                {
                    "question": format!("{}번째 시도: 장애 대응 과정에서 가장 어려웠던 점은 무엇이었나요?", n),
                    "why": "문제 해결 방식 확인"
                }
            ]
        }))
    }
}

fn create_request() -> ExplainRequest {
    let summaries = |side: &str| {
        ExplanationField::ALL
            .iter()
            .map(|f| (*f, format!("{} {} summary", side, f)))
            .collect::<BTreeMap<_, _>>()
    };
    ExplainRequest {
        talent_id: "talent-1".to_string(),
        job_id: "job-1".to_string(),
        talent_summaries: summaries("talent"),
        job_summaries: summaries("job"),
        similarity_scores: ExplanationField::ALL.iter().map(|f| (*f, 0.8)).collect(),
    }
}

fn create_explainer(llm: Arc<ScriptedLlm>) -> MatchExplainer {
    let generator: Arc<dyn TextGenerator> = llm;
    MatchExplainer::new(
        GenerationController::new(generator.clone()),
        Aggregator::new(generator, Duration::from_secs(5)),
    )
}

#[tokio::test]
async fn test_question_generation_exhausts_attempts() {
    let llm = Arc::new(ScriptedLlm::default());
    let controller = GenerationController::new(llm.clone());
    let task = QuestionTask::new(QuestionKind::CompanyTechnical, "결제 플랫폼 백엔드 팀");

    let outcome = controller.run(&task, None).await;

    assert_eq!(outcome.attempts, 5);
    assert!(!outcome.is_valid);
    assert_eq!(outcome.termination, Termination::Exhausted);
    assert!(!outcome.validation_errors.is_empty());
    assert_eq!(outcome.final_artifact.questions.len(), 2);
    assert!(outcome.final_artifact.questions[0].question.starts_with("5번째"));
    assert_eq!(llm.question_calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_session_records_last_questions() {
    let llm = Arc::new(ScriptedLlm::default());
    let controller = GenerationController::new(llm.clone());
    let store = InMemorySessionStore::new(10, Duration::from_secs(60));
    let session = store.get_or_create("s-1").await;

    // Three questions expected, two returned every time
    let outcome = generate_for_session(
        &controller,
        &session,
        QuestionKind::CompanySituational,
        "물류 스타트업",
        None,
    )
    .await;

    assert!(!outcome.is_valid);
    assert_eq!(outcome.attempts, 3);
    let guard = session.lock().await;
    assert_eq!(guard.asked_questions.len(), outcome.final_artifact.questions.len());
}

#[tokio::test]
async fn test_cancelled_generation_is_not_recorded() {
    let llm = Arc::new(ScriptedLlm::default());
    let controller = GenerationController::new(llm.clone());
    let store = InMemorySessionStore::new(10, Duration::from_secs(60));
    let session = store.get_or_create("s-2").await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = generate_for_session(
        &controller,
        &session,
        QuestionKind::CompanyTechnical,
        "결제 플랫폼",
        Some(&cancel),
    )
    .await;

    assert_eq!(outcome.termination, Termination::Cancelled);
    assert_eq!(outcome.attempts, 0);
    assert_eq!(llm.question_calls.load(Ordering::SeqCst), 0);
    assert!(session.lock().await.asked_questions.is_empty());
}

#[tokio::test]
async fn test_explain_pipeline_and_cache() {
    let llm = Arc::new(ScriptedLlm::default());
    let cache = Arc::new(ExplanationCache::in_memory(100, 60));
    let explainer = create_explainer(llm.clone()).with_cache(cache.clone());
    let request = create_request();

    let first = explainer.explain(&request, None).await.unwrap();

    assert_eq!(first.field_results.len(), 6);
    assert!(first.metadata.degraded_fields.is_empty());
    assert!(!first.metadata.cached);
    assert_eq!(first.job_fit.suggested_questions.len(), 5);
    assert_eq!(llm.field_calls.load(Ordering::SeqCst), 6);
    assert_eq!(llm.aggregate_calls.load(Ordering::SeqCst), 3);

    let second = explainer.explain(&request, None).await.unwrap();

    assert!(second.metadata.cached);
    assert_eq!(second.field_results, first.field_results);
    assert_eq!(llm.field_calls.load(Ordering::SeqCst), 6);
    assert_eq!(llm.aggregate_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_explain_changed_inputs_miss_cache() {
    let llm = Arc::new(ScriptedLlm::default());
    let cache = Arc::new(ExplanationCache::in_memory(100, 60));
    let explainer = create_explainer(llm.clone()).with_cache(cache);
    let mut request = create_request();

    explainer.explain(&request, None).await.unwrap();
    request.similarity_scores.insert(ExplanationField::Skills, 0.2);
    let refreshed = explainer.explain(&request, None).await.unwrap();

    assert!(!refreshed.metadata.cached);
    assert_eq!(llm.field_calls.load(Ordering::SeqCst), 12);
}

#[tokio::test]
async fn test_explain_cancelled() {
    let llm = Arc::new(ScriptedLlm::default());
    let explainer = create_explainer(llm.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = explainer
        .explain(&create_request(), Some(&cancel))
        .await
        .unwrap_err();

    assert!(matches!(err, ExplainError::Cancelled));
    assert_eq!(llm.aggregate_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_degraded_explanation_not_cached() {
    let llm = Arc::new(ScriptedLlm {
        culture_failures: AtomicU32::new(5),
        ..Default::default()
    });
    let cache = Arc::new(ExplanationCache::in_memory(100, 60));
    let explainer = create_explainer(llm.clone()).with_cache(cache);
    let request = create_request();

    let degraded = explainer.explain(&request, None).await.unwrap();
    assert_eq!(degraded.metadata.degraded_fields, vec![ExplanationField::Culture]);
    assert_eq!(llm.field_calls.load(Ordering::SeqCst), 10);

    let regenerated = explainer.explain(&request, None).await.unwrap();
    assert!(!regenerated.metadata.cached);
    assert!(regenerated.metadata.degraded_fields.is_empty());
    assert_eq!(llm.field_calls.load(Ordering::SeqCst), 16);

    let cached = explainer.explain(&request, None).await.unwrap();
    assert!(cached.metadata.cached);
    assert_eq!(llm.field_calls.load(Ordering::SeqCst), 16);
}

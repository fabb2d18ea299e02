use crate::generation::cancel::CancellationToken;
use crate::generation::controller::{
    AttemptRecord, GenerationController, GenerationOutcome, GenerationTask, Termination,
};
use crate::generation::prompts::{bullet_list, retry_context, verdict_schema, EVALUATOR_SYSTEM};
use crate::generation::validation::{Artifact, HeuristicRule, Script};
use crate::services::llm::GenerationRequest;
use crate::services::session::{
    Dimension, InterviewPhase, InterviewSession, QaPair, SessionHandle, EXPLORATION_QUESTIONS,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Minimum length of the rationale attached to a talent technical question
const MIN_WHY_CHARS: usize = 10;

/// Number of recent answers quoted in prompts
const HISTORY_WINDOW: usize = 3;

/// One interview question with the reason it is asked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewQuestion {
    pub question: String,
    #[serde(default)]
    pub why: String,
}

impl InterviewQuestion {
    pub fn new(question: impl Into<String>, why: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            why: why.into(),
        }
    }
}

/// Generated follow-up questions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSet {
    pub questions: Vec<InterviewQuestion>,
}

impl Artifact for QuestionSet {
    fn items(&self) -> Vec<&str> {
        self.questions.iter().map(|q| q.question.as_str()).collect()
    }
}

/// Which interview the questions are for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionKind {
    /// Follow-ups probing a company's technical needs
    CompanyTechnical,
    /// Follow-ups probing a company's team situations
    CompanySituational,
    /// One question on a candidate skill; `question_number` is 1..=3
    TalentTechnical { skill: String, question_number: u8 },
    /// One deep-dive question on a candidate's strongest trait
    TalentSituational { target_trait: String, dimension: Dimension },
}

impl QuestionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CompanyTechnical => "company_technical",
            Self::CompanySituational => "company_situational",
            Self::TalentTechnical { .. } => "talent_technical",
            Self::TalentSituational { .. } => "talent_situational",
        }
    }

    fn expected_count(&self) -> usize {
        match self {
            Self::CompanyTechnical | Self::CompanySituational => 3,
            Self::TalentTechnical { .. } | Self::TalentSituational { .. } => 1,
        }
    }

    fn min_chars(&self) -> usize {
        match self {
            Self::CompanyTechnical => 15,
            Self::CompanySituational => 10,
            Self::TalentTechnical { .. } | Self::TalentSituational { .. } => 20,
        }
    }

    fn attempt_limit(&self) -> u32 {
        match self {
            Self::CompanyTechnical | Self::TalentSituational { .. } => 5,
            Self::CompanySituational | Self::TalentTechnical { .. } => 3,
        }
    }

    fn stage_intent(question_number: u8) -> &'static str {
        match question_number {
            1 => "an opening question on background, motivation and a representative experience",
            2 => "a deeper question on concrete methods and the reasoning behind decisions",
            _ => "an extending question on lessons learned, transfer and alternative approaches",
        }
    }
}

/// Maximum characters of any generated question
pub const MAX_QUESTION_CHARS: usize = 130;

/// Generation task for interview follow-up questions
#[derive(Debug, Clone)]
pub struct QuestionTask {
    kind: QuestionKind,
    /// Free-text summary of the profile or company the questions are about
    context: String,
    previous_questions: Vec<String>,
    qa_history: Vec<QaPair>,
}

impl QuestionTask {
    pub fn new(kind: QuestionKind, context: impl Into<String>) -> Self {
        Self {
            kind,
            context: context.into(),
            previous_questions: Vec::new(),
            qa_history: Vec::new(),
        }
    }

    pub fn with_previous_questions(mut self, questions: Vec<String>) -> Self {
        self.previous_questions = questions;
        self
    }

    pub fn with_history(mut self, qa_history: Vec<QaPair>) -> Self {
        self.qa_history = qa_history;
        self
    }

    pub fn kind(&self) -> &QuestionKind {
        &self.kind
    }

    fn recent_answers(&self) -> String {
        let start = self.qa_history.len().saturating_sub(HISTORY_WINDOW);
        let lines: Vec<String> = self.qa_history[start..]
            .iter()
            .map(|qa| format!("Q: {}\nA: {}", qa.question, qa.answer))
            .collect();
        if lines.is_empty() {
            "(none)".to_string()
        } else {
            lines.join("\n")
        }
    }

    fn schema(&self) -> Value {
        let count = self.kind.expected_count();
        json!({
            "type": "object",
            "properties": {
                "questions": {
                    "type": "array",
                    "minItems": count,
                    "maxItems": count,
                    "items": {
                        "type": "object",
                        "properties": {
                            "question": { "type": "string" },
                            "why": { "type": "string" }
                        },
                        "required": ["question", "why"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["questions"],
            "additionalProperties": false
        })
    }

    fn instructions(&self) -> String {
        let count = self.kind.expected_count();
        let min = self.kind.min_chars();
        let common = format!(
            "Write {count} open interview question(s) in Korean only, each between {min} and \
             {MAX_QUESTION_CHARS} characters. Ask only about facts present in the context, do not \
             invent experience, and never repeat an earlier question. Explain each question's \
             purpose in `why`."
        );

        let focus = match &self.kind {
            QuestionKind::CompanyTechnical => {
                "You are a hiring manager. Draw out concrete technical needs of the role from \
                 the company's answers and information."
                    .to_string()
            }
            QuestionKind::CompanySituational => {
                "You are a hiring manager. Draw out how the team works, collaborates and handles \
                 pressure, based on the company's answers."
                    .to_string()
            }
            QuestionKind::TalentTechnical { skill, question_number } => format!(
                "You are a practitioner interviewer assessing the skill [{skill}]. This is \
                 question {question_number}/3: {}.",
                QuestionKind::stage_intent(*question_number)
            ),
            QuestionKind::TalentSituational { target_trait, dimension } => format!(
                "You are a recruiter. Ask about a real past situation that reveals the candidate's \
                 [{target_trait}] tendency in the {} dimension and the reasoning behind their \
                 actions.",
                dimension.label()
            ),
        };

        format!("{focus}\n{common}")
    }
}

impl GenerationTask for QuestionTask {
    type Output = QuestionSet;

    fn name(&self) -> &str {
        self.kind.name()
    }

    fn generation_request(&self, history: &[AttemptRecord<QuestionSet>]) -> GenerationRequest {
        let prompt = format!(
            "[Context]\n{}\n\n[Recent answers]\n{}\n\n[Already asked]\n{}{}",
            self.context,
            self.recent_answers(),
            bullet_list(&self.previous_questions),
            retry_context(history)
        );

        GenerationRequest::new(self.instructions(), prompt)
            .with_schema(self.schema())
            .with_temperature(0.5)
    }

    fn heuristic_rules(&self) -> Vec<HeuristicRule> {
        let mut rules = vec![
            HeuristicRule::ExactCount(self.kind.expected_count()),
            HeuristicRule::LengthBounds {
                min: self.kind.min_chars(),
                max: MAX_QUESTION_CHARS,
            },
            HeuristicRule::DominantScript(Script::Hangul),
            HeuristicRule::DistinctFromPrevious,
        ];
        if self.kind.expected_count() > 1 {
            rules.push(HeuristicRule::UniqueItems);
        }
        rules
    }

    fn extra_checks(&self, artifact: &QuestionSet) -> Vec<String> {
        if !matches!(self.kind, QuestionKind::TalentTechnical { .. }) {
            return Vec::new();
        }

        artifact
            .questions
            .iter()
            .enumerate()
            .filter(|(_, q)| q.why.trim().chars().count() < MIN_WHY_CHARS)
            .map(|(idx, _)| {
                format!(
                    "Why explanation of question {} is too short (minimum {} characters)",
                    idx + 1,
                    MIN_WHY_CHARS
                )
            })
            .collect()
    }

    fn previous_items(&self) -> Vec<String> {
        self.previous_questions.clone()
    }

    fn semantic_request(&self, artifact: &QuestionSet) -> GenerationRequest {
        let criteria = match &self.kind {
            QuestionKind::CompanyTechnical | QuestionKind::CompanySituational => format!(
                "1. There are exactly {} questions.\n\
                 2. Each question builds on the company's answers to draw out more specific \
                 information.\n\
                 3. Questions are written in Korean and relevant to the company's domain.\n\
                 4. No duplicated or vague questions.",
                self.kind.expected_count()
            ),
            QuestionKind::TalentTechnical { skill, question_number } => format!(
                "1. The question targets the skill [{skill}].\n\
                 2. It fits the stage intent: {}.\n\
                 3. It does not repeat earlier questions and follows naturally from earlier \
                 answers.\n\
                 4. It is specific enough for the candidate to describe real experience.\n\
                 5. `why` clearly explains the purpose.",
                QuestionKind::stage_intent(*question_number)
            ),
            QuestionKind::TalentSituational { target_trait, dimension } => format!(
                "1. The question probes the [{target_trait}] tendency in the {} dimension.\n\
                 2. It asks about a real past experience, not a hypothetical.\n\
                 3. It is open-ended and not specific to one job family.\n\
                 4. It does not repeat earlier questions.",
                dimension.label()
            ),
        };

        let rendered = artifact
            .questions
            .iter()
            .enumerate()
            .map(|(idx, q)| format!("{}. {}\n   why: {}", idx + 1, q.question, q.why))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "[Criteria]\n{criteria}\n\n[Context]\n{}\n\n[Recent answers]\n{}\n\n\
             [Questions]\n{rendered}",
            self.context,
            self.recent_answers()
        );

        GenerationRequest::new(EVALUATOR_SYSTEM, prompt)
            .with_schema(verdict_schema())
            .with_temperature(0.0)
    }

    fn fallback_artifact(&self) -> QuestionSet {
        let questions = match &self.kind {
            QuestionKind::CompanyTechnical => vec![
                InterviewQuestion::new(
                    "이 포지션에서 가장 먼저 해결해야 할 기술적 과제는 무엇인가요?",
                    "직무의 핵심 기술 과제를 파악",
                ),
                InterviewQuestion::new(
                    "현재 팀이 사용하는 기술 스택과 앞으로의 변화 계획을 알려주세요.",
                    "기술 환경과 방향성을 파악",
                ),
                InterviewQuestion::new(
                    "입사 후 6개월 안에 기대하는 구체적인 성과는 무엇인가요?",
                    "성과 기대치를 구체화",
                ),
            ],
            QuestionKind::CompanySituational => vec![
                InterviewQuestion::new("팀 내 의견 충돌은 보통 어떻게 해결하나요?", "갈등 해결 방식 파악"),
                InterviewQuestion::new("업무 우선순위는 누가 어떻게 정하나요?", "의사결정 구조 파악"),
                InterviewQuestion::new("일정 압박이 클 때 팀은 어떻게 대응하나요?", "압박 상황 대응 파악"),
            ],
            QuestionKind::TalentTechnical { skill, .. } => vec![InterviewQuestion::new(
                format!("{skill}을(를) 활용해 문제를 해결한 경험을 구체적으로 말씀해 주세요."),
                "기술 활용 경험과 문제 해결 과정을 확인",
            )],
            QuestionKind::TalentSituational { dimension, .. } => vec![InterviewQuestion::new(
                dimension.validation_question(),
                "성향을 실제 경험으로 확인",
            )],
        };

        QuestionSet { questions }
    }

    fn max_attempts(&self) -> Option<u32> {
        Some(self.kind.attempt_limit())
    }
}

/// Generate questions for a live interview and record them in the session
///
/// The session lock is held for the whole generation so concurrent requests
/// on one session cannot ask the same question twice.
pub async fn generate_for_session(
    controller: &GenerationController,
    session: &SessionHandle,
    kind: QuestionKind,
    context: &str,
    cancel: Option<&CancellationToken>,
) -> GenerationOutcome<QuestionSet> {
    let mut session = session.lock().await;

    let task = QuestionTask::new(kind, context)
        .with_previous_questions(session.asked_questions.clone())
        .with_history(session.qa_history.clone());
    let outcome = controller.run(&task, cancel).await;

    if outcome.termination != Termination::Cancelled {
        session.record_questions(
            outcome
                .final_artifact
                .questions
                .iter()
                .map(|q| q.question.clone()),
        );
    }

    outcome
}

/// What the situational interview asks next
#[derive(Debug, Clone, PartialEq)]
pub enum NextQuestion {
    /// A scripted question that needs no generation
    Fixed { phase: InterviewPhase, question: String },
    /// A question to generate with the given task kind
    Generate { phase: InterviewPhase, kind: QuestionKind },
    Finished,
}

/// Plan the next situational question from the answers collected so far
pub fn plan_situational(session: &InterviewSession) -> NextQuestion {
    let answered = session.qa_history.len();

    match session.phase() {
        InterviewPhase::Exploration => NextQuestion::Fixed {
            phase: InterviewPhase::Exploration,
            question: EXPLORATION_QUESTIONS[answered].to_string(),
        },
        InterviewPhase::DeepDive => {
            let dominant = session.persona.dominant_trait();
            NextQuestion::Generate {
                phase: InterviewPhase::DeepDive,
                kind: QuestionKind::TalentSituational {
                    target_trait: dominant.name,
                    dimension: dominant.dimension,
                },
            }
        }
        InterviewPhase::Validation => NextQuestion::Fixed {
            phase: InterviewPhase::Validation,
            question: session
                .persona
                .least_clear_dimension()
                .validation_question()
                .to_string(),
        },
        InterviewPhase::Finished => NextQuestion::Finished,
    }
}

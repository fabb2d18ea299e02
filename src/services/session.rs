use crate::config::SessionSettings;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Trait reported for a dimension with no evidence yet
pub const UNKNOWN_TRAIT: &str = "알 수 없음";

/// Trait assumed before any answer was scored
const DEFAULT_TRAIT: &str = "협력형";

/// Personality dimension probed by situational questions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    WorkStyle,
    ProblemSolving,
    Learning,
    StressResponse,
    Communication,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::WorkStyle,
        Dimension::ProblemSolving,
        Dimension::Learning,
        Dimension::StressResponse,
        Dimension::Communication,
    ];

    /// Korean label used in prompts
    pub fn label(&self) -> &'static str {
        match self {
            Self::WorkStyle => "업무 스타일",
            Self::ProblemSolving => "문제 해결 방식",
            Self::Learning => "학습 성향",
            Self::StressResponse => "스트레스 대응",
            Self::Communication => "커뮤니케이션",
        }
    }

    /// Trait names scored within this dimension, with their signal phrases
    pub fn traits(&self) -> [(&'static str, &'static str); 3] {
        match self {
            Self::WorkStyle => [
                ("주도형", "내가 제안, 리드, 결정"),
                ("협력형", "함께, 논의, 의견 수렴"),
                ("독립형", "혼자, 스스로, 자율적"),
            ],
            Self::ProblemSolving => [
                ("분석형", "원인 분석, 데이터, 체계적"),
                ("직관형", "직감, 경험상, 빠르게"),
                ("실행형", "일단 시도, 테스트, 실험"),
            ],
            Self::Learning => [
                ("체계형", "문서, 강의, 순서대로"),
                ("실험형", "직접 만들어보며, 프로젝트"),
                ("관찰형", "코드 분석, 다른 사람"),
            ],
            Self::StressResponse => [
                ("도전형", "기회, 성장, 재미"),
                ("안정형", "계획, 준비, 체크리스트"),
                ("휴식형", "힘들었다, 도움 요청"),
            ],
            Self::Communication => [
                ("논리형", "근거, 데이터, 객관적"),
                ("공감형", "이해, 감정, 입장"),
                ("간결형", "명확하게, 핵심만"),
            ],
        }
    }

    /// Fixed question asked to confirm an unclear dimension
    pub fn validation_question(&self) -> &'static str {
        match self {
            Self::WorkStyle => "우선순위가 다른 업무가 동시에 발생했을 때, 팀원들과 어떤 식으로 대응하는지 알려주세요.",
            Self::ProblemSolving => "처음 접하는 문제를 맞닥뜨릴 때, 문제 해결을 위해 어떤 방식으로 접근하시나요? 구체적인 사례를 중심으로 말씀해주세요.",
            Self::Learning => "새로운 업무 방식이나 도구를 팀에 처음 도입해본 적이 있나요? 본인이 어떻게 조직에 기여했는지를 중심으로 설명해주세요.",
            Self::StressResponse => "중요한 업무 직전에 예상치 못한 어려움이 발생한 적이 있나요? 어떻게 대응했는지 행동을 중심으로 설명해주세요.",
            Self::Communication => "동료가 내 의견에 강하게 반대할 때 어떤 식으로 행동하시나요? 구체적인 행동과 결과 중심으로 말씀해주세요.",
        }
    }
}

/// The strongest trait seen so far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DominantTrait {
    pub dimension: Dimension,
    pub name: String,
    pub score: f64,
}

/// Accumulated trait scores per dimension
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonaScores {
    scores: BTreeMap<Dimension, BTreeMap<String, f64>>,
}

impl PersonaScores {
    /// Add detected trait scores; repeated traits are summed
    pub fn merge(&mut self, dimension: Dimension, detected: &BTreeMap<String, f64>) {
        let current = self.scores.entry(dimension).or_default();
        for (name, score) in detected {
            *current.entry(name.clone()).or_insert(0.0) += score;
        }
    }

    pub fn dimension(&self, dimension: Dimension) -> Option<&BTreeMap<String, f64>> {
        self.scores.get(&dimension)
    }

    /// Highest scoring trait across all dimensions
    ///
    /// Falls back to a neutral collaborative trait before any evidence.
    pub fn dominant_trait(&self) -> DominantTrait {
        let mut best: Option<DominantTrait> = None;

        for (dimension, traits) in &self.scores {
            for (name, score) in traits {
                if best.as_ref().map_or(true, |b| *score > b.score) {
                    best = Some(DominantTrait {
                        dimension: *dimension,
                        name: name.clone(),
                        score: *score,
                    });
                }
            }
        }

        best.unwrap_or_else(|| DominantTrait {
            dimension: Dimension::WorkStyle,
            name: DEFAULT_TRAIT.to_string(),
            score: 0.5,
        })
    }

    /// Dimension whose strongest trait is weakest
    pub fn least_clear_dimension(&self) -> Dimension {
        let strength = |dimension: &Dimension| {
            self.scores
                .get(dimension)
                .and_then(|traits| traits.values().copied().reduce(f64::max))
                .unwrap_or(0.0)
        };

        Dimension::ALL
            .iter()
            .copied()
            .fold((Dimension::WorkStyle, f64::INFINITY), |(min_dim, min_score), dim| {
                let score = strength(&dim);
                if score < min_score {
                    (dim, score)
                } else {
                    (min_dim, min_score)
                }
            })
            .0
    }

    /// Strongest trait of every dimension
    pub fn final_persona(&self) -> BTreeMap<Dimension, String> {
        Dimension::ALL
            .iter()
            .map(|dimension| {
                let name = self
                    .scores
                    .get(dimension)
                    .and_then(|traits| {
                        traits
                            .iter()
                            .fold(None::<(&String, f64)>, |best, (name, score)| match best {
                                Some((_, best_score)) if best_score >= *score => best,
                                _ => Some((name, *score)),
                            })
                    })
                    .map(|(name, _)| name.clone())
                    .unwrap_or_else(|| UNKNOWN_TRAIT.to_string());
                (*dimension, name)
            })
            .collect()
    }
}

/// Scripted opening questions of the situational interview
pub const EXPLORATION_QUESTIONS: [&str; 3] = [
    "팀 프로젝트에서 의견 충돌이 있었을 때, 어떤 방식으로 해결하시나요? 구체적인 상황과 행동을 함께 답해주세요.",
    "예상치 못한 업무 변경이나 마감기한이 단축되었을 때, 어떻게 대응하시나요? 구체적 사례를 들어 설명해주세요.",
    "완전히 새로운 분야나 업무를 맡게 되어, 짧은 시간 안에 배워서 적용한 경험을 들려주세요. 구체적으로 어떤 방식으로 학습하고 성과를 냈나요?",
];

/// Generated deep-dive questions after exploration
const DEEP_DIVE_QUESTIONS: usize = 2;

/// Total questions of a situational interview
pub const INTERVIEW_LENGTH: usize = EXPLORATION_QUESTIONS.len() + DEEP_DIVE_QUESTIONS + 1;

/// Stage of a situational interview, derived from the answers collected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewPhase {
    Exploration,
    DeepDive,
    Validation,
    Finished,
}

/// One question and the answer given to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

/// State of one interview, owned by a single writer at a time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewSession {
    pub session_id: String,
    pub asked_questions: Vec<String>,
    pub qa_history: Vec<QaPair>,
    pub persona: PersonaScores,
    pub created_at: DateTime<Utc>,
}

impl InterviewSession {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            asked_questions: Vec::new(),
            qa_history: Vec::new(),
            persona: PersonaScores::default(),
            created_at: Utc::now(),
        }
    }

    /// Remember questions so later generations do not repeat them
    pub fn record_questions<I: IntoIterator<Item = String>>(&mut self, questions: I) {
        self.asked_questions.extend(questions);
    }

    pub fn record_answer(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.qa_history.push(QaPair {
            question: question.into(),
            answer: answer.into(),
        });
    }

    pub fn phase(&self) -> InterviewPhase {
        let answered = self.qa_history.len();
        if answered < EXPLORATION_QUESTIONS.len() {
            InterviewPhase::Exploration
        } else if answered < EXPLORATION_QUESTIONS.len() + DEEP_DIVE_QUESTIONS {
            InterviewPhase::DeepDive
        } else if answered < INTERVIEW_LENGTH {
            InterviewPhase::Validation
        } else {
            InterviewPhase::Finished
        }
    }

    /// Persona scores and answers so far, used as generation context
    pub fn context_summary(&self) -> String {
        let mut lines = vec!["Persona so far:".to_string()];
        for dimension in Dimension::ALL {
            let traits = match self.persona.dimension(dimension) {
                Some(traits) if !traits.is_empty() => traits
                    .iter()
                    .map(|(name, score)| format!("{} {:.2}", name, score))
                    .collect::<Vec<_>>()
                    .join(", "),
                _ => "no evidence".to_string(),
            };
            lines.push(format!("- {}: {}", dimension.label(), traits));
        }

        if !self.qa_history.is_empty() {
            lines.push("Answers so far:".to_string());
            for (i, pair) in self.qa_history.iter().enumerate() {
                lines.push(format!("{}. {}", i + 1, pair.answer));
            }
        }
        lines.join("\n")
    }

    /// Progress label such as "4/6"
    pub fn progress(&self) -> String {
        format!(
            "{}/{}",
            (self.qa_history.len() + 1).min(INTERVIEW_LENGTH),
            INTERVIEW_LENGTH
        )
    }
}

/// Shared handle to one session; hold the lock across a question generation
pub type SessionHandle = Arc<Mutex<InterviewSession>>;

/// Registry of live interview sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_or_create(&self, session_id: &str) -> SessionHandle;

    async fn get(&self, session_id: &str) -> Option<SessionHandle>;

    async fn remove(&self, session_id: &str);
}

/// In-process session store with idle expiry
pub struct InMemorySessionStore {
    sessions: moka::future::Cache<String, SessionHandle>,
}

impl InMemorySessionStore {
    pub fn new(max_sessions: u64, ttl: Duration) -> Self {
        let sessions = moka::future::CacheBuilder::new(max_sessions)
            .time_to_idle(ttl)
            .build();
        Self { sessions }
    }

    pub fn from_settings(settings: &SessionSettings) -> Self {
        Self::new(settings.max_sessions, Duration::from_secs(settings.ttl_secs))
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, session_id: &str) -> SessionHandle {
        self.sessions
            .get_with(session_id.to_string(), async {
                tracing::debug!("Creating interview session {}", session_id);
                Arc::new(Mutex::new(InterviewSession::new(session_id)))
            })
            .await
    }

    async fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.get(session_id).await
    }

    async fn remove(&self, session_id: &str) {
        self.sessions.invalidate(session_id).await;
        tracing::debug!("Removed interview session {}", session_id);
    }
}

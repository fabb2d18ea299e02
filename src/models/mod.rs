// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    CandidateAttributes, CompatibilityLevel, CompatibilityResult, EmploymentType,
    FieldCompatibility, LanguageLevels, MatchMetadata, MatchingResult, MatchingScore,
    PostingCandidate, RankCandidate, RankingMode, RequirementAttributes, SalaryRange,
    SeekerCandidate, SkipReason, SkippedCandidate, Vector,
};
pub use requests::{
    EmbedRequest, EvaluateRequest, ExplainRequest, QuestionRequest, RankRequest, RankSubject,
    ScoreRequest,
};
pub use responses::EmbedResponse;

// Command dispatch tests against a mock chat completion server

use mockito::Matcher;
use serde_json::{json, Value};
use std::path::PathBuf;
use talent_match::cli::{dispatch, read_request, run_interview, Command};
use talent_match::config::Settings;
use talent_match::models::ScoreRequest;

fn completion_body(content: Value) -> String {
    json!({
        "choices": [{ "message": { "role": "assistant", "content": content.to_string() } }],
        "usage": { "prompt_tokens": 10, "completion_tokens": 5 }
    })
    .to_string()
}

fn settings_for(url: &str) -> Settings {
    let mut settings = Settings::default();
    settings.llm.base_url = url.to_string();
    settings.llm.api_key = "test-key".to_string();
    settings.llm.max_retries = 1;
    settings
}

/// Request file removed on drop
struct RequestFile(PathBuf);

impl RequestFile {
    fn new(body: Value) -> Self {
        let name = format!("talent-match-{}.json", uuid::Uuid::new_v4());
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, body.to_string()).unwrap();
        Self(path)
    }

    fn path(&self) -> PathBuf {
        self.0.clone()
    }
}

impl Drop for RequestFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

#[tokio::test]
async fn test_read_request_validates_file() {
    let valid = RequestFile::new(json!({"vector_a": [1.0, 0.0], "vector_b": [0.0, 1.0]}));
    let request: ScoreRequest = read_request(&valid.path()).await.unwrap();
    assert_eq!(request.vector_b, vec![0.0, 1.0]);
    assert!(request.alpha.is_none());

    let invalid = RequestFile::new(json!({"vector_a": [1.0], "vector_b": [1.0], "alpha": -1.0}));
    let err = read_request::<ScoreRequest>(&invalid.path()).await.unwrap_err();
    assert!(format!("{:#}", err).contains("Request failed validation"));

    let missing = std::env::temp_dir().join("talent-match-missing.json");
    let err = read_request::<ScoreRequest>(&missing).await.unwrap_err();
    assert!(err.to_string().contains("Failed to read request file"));
}

#[tokio::test]
async fn test_dispatch_score() {
    let file = RequestFile::new(json!({"vector_a": [1.0, 0.0], "vector_b": [1.0, 0.0]}));

    let output = dispatch(Command::Score { input: file.path() }, &Settings::default())
        .await
        .unwrap();

    let score = output["score"].as_f64().unwrap();
    assert!((score - 0.7).abs() < 1e-9);
    assert_eq!(output["cosine_similarity"], json!(1.0));
}

#[tokio::test]
async fn test_dispatch_rank_seekers() {
    let file = RequestFile::new(json!({
        "direction": "seekers_for_posting",
        "posting": {"id": "job-1", "vector": [1.0, 0.0], "attributes": {}},
        "seekers": [
            {"id": "far", "vector": [0.0, 1.0], "attributes": {}},
            {"id": "close", "vector": [1.0, 0.1], "attributes": {}},
            {"id": "no-vector", "attributes": {}}
        ]
    }));

    let output = dispatch(Command::Rank { input: file.path() }, &Settings::default())
        .await
        .unwrap();

    assert_eq!(output["total_candidates"], json!(3));
    assert_eq!(output["results"][0]["candidate_id"], json!("close"));
    assert_eq!(output["results"][0]["rank"], json!(1));
    assert_eq!(output["skipped"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_dispatch_questions_with_mock_llm() {
    let mut server = mockito::Server::new_async().await;
    let generation = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex("open interview question".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion_body(json!({
            "questions": [
                {"question": "결제 승인 지연이 생겼을 때 어떤 지표부터 확인하시나요?", "why": "장애 대응"},
                {"question": "정산 배치가 실패하면 재처리는 어떤 방식으로 설계되어 있나요?", "why": "복구 설계"},
                {"question": "트래픽이 몰리는 시간대에 가장 먼저 병목이 되는 구간은 어디인가요?", "why": "확장성"}
            ]
        })))
        .expect(1)
        .create_async()
        .await;
    let verdict = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex("strict reviewer".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion_body(json!({"is_valid": true, "issues": [], "reasoning": "ok"})))
        .expect(1)
        .create_async()
        .await;

    let file = RequestFile::new(json!({
        "kind": "company_technical",
        "context": "결제 플랫폼 백엔드 팀, 초당 수천 건의 승인 요청 처리"
    }));
    let output = dispatch(Command::Questions { input: file.path() }, &settings_for(&server.url()))
        .await
        .unwrap();

    generation.assert_async().await;
    verdict.assert_async().await;
    assert_eq!(output["is_valid"], json!(true));
    assert_eq!(output["attempts"], json!(1));
    assert_eq!(output["final_artifact"]["questions"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_interview_feeds_session_context_to_generation() {
    let mut server = mockito::Server::new_async().await;
    let analysis = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex("culture-fit tendencies".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion_body(json!({
            "reasoning": "Takes the lead in conflicts",
            "traits": [{"dimension": "work_style", "trait": "주도형", "score": 0.8}]
        })))
        .expect(6)
        .create_async()
        .await;
    // Only answered when the prompt carries the session's persona and answers
    let generation = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("You are a recruiter".to_string()),
            Matcher::Regex("Persona so far".to_string()),
            Matcher::Regex("주도형 [0-9]".to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion_body(json!({
            "questions": [{
                "question": "팀의 방향을 직접 제안하고 이끌었던 경험과 그때 그렇게 판단한 이유를 말씀해 주세요.",
                "why": "주도형 성향 확인"
            }]
        })))
        .expect_at_least(2)
        .create_async()
        .await;
    let verdict = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex("strict reviewer".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion_body(json!({"is_valid": true, "issues": [], "reasoning": "ok"})))
        .expect_at_least(1)
        .create_async()
        .await;

    let answers = "먼저 의견을 정리해 제안합니다\n\
                   우선순위를 다시 세웁니다\n\
                   작은 과제로 바로 실습합니다\n\
                   회의를 열어 방향을 정했습니다\n\
                   역할을 나눠 일정을 맞췄습니다\n\
                   기준을 먼저 합의합니다\n";
    let mut transcript = Vec::new();

    let persona = run_interview(&settings_for(&server.url()), answers.as_bytes(), &mut transcript)
        .await
        .unwrap();

    analysis.assert_async().await;
    generation.assert_async().await;
    verdict.assert_async().await;
    assert_eq!(persona["work_style"], json!("주도형"));

    let transcript = String::from_utf8(transcript).unwrap();
    assert!(transcript.contains("[1/6]"));
    assert!(transcript.contains("[6/6]"));
    assert!(transcript.contains("팀의 방향을 직접 제안하고"));
}

#[tokio::test]
async fn test_interview_stops_when_input_closes() {
    let mut server = mockito::Server::new_async().await;
    let _analysis = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex("culture-fit tendencies".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion_body(json!({"reasoning": "short", "traits": []})))
        .create_async()
        .await;

    let mut transcript = Vec::new();
    let answers = "한 줄만 답합니다\n";
    let err = run_interview(&settings_for(&server.url()), answers.as_bytes(), &mut transcript)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Input closed"));
}

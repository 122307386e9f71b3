//! End-to-end dialogue over a wiremock Gemini endpoint.

use std::time::Duration;

use kisan_saathi::config::{Config, GeoProviderKind};
use kisan_saathi::dialogue::DialoguePhase;
use kisan_saathi::geolocation::LocationState;
use kisan_saathi::models::TurnKind;
use kisan_saathi::prompt::{ENABLE_LOCATION_REPLY, LOCATION_UNSUPPORTED_REPLY};
use kisan_saathi::{Intent, Language, TurnStatus, build_coordinator};
use wiremock::matchers::{body_string_contains, method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> Config {
    let mut cfg = Config::default();
    cfg.gemini.api_key = "test-key".to_string();
    cfg.gemini.model = "gemini-test".to_string();
    cfg.gemini.base_url = format!("{}/v1beta", server.uri());
    cfg.gemini.request_timeout_secs = 5;
    cfg
}

fn answer(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "candidates": [{ "content": { "parts": [{ "text": text }] } }]
    }))
}

#[tokio::test]
async fn price_query_asks_for_location_then_uses_it() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(query_param("key", "test-key"))
        .and(body_string_contains("User Coordinates: 17.385,78.4867"))
        .respond_with(answer("1. Tomato: ₹18/kg at Bowenpally"))
        .expect(1)
        .mount(&server)
        .await;

    let mut cfg = config_for(&server);
    cfg.geolocation.latitude = Some(17.385);
    cfg.geolocation.longitude = Some(78.4867);
    let mut dialogue = build_coordinator(&cfg).expect("coordinator should build");

    let first = dialogue.submit("Tomato prices").await.unwrap();
    assert_eq!(first.intent, Intent::Price);
    assert!(!first.remote_call);
    let turns = dialogue.transcript().turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].text, "Tomato prices");
    assert_eq!(turns[1].text, ENABLE_LOCATION_REPLY);

    let snap = dialogue
        .geolocation()
        .wait_settled(Duration::from_secs(1))
        .await;
    assert_eq!(snap.state(), LocationState::Granted);

    let second = dialogue.submit("Tomato prices").await.unwrap();
    assert!(second.remote_call);
    let last = dialogue.transcript().last().unwrap();
    assert_eq!(last.text, "1. Tomato: ₹18/kg at Bowenpally");
    assert!(last.is_price && last.used_location);
}

#[tokio::test]
async fn general_question_in_selected_language() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("What pesticide for tomato blight?"))
        .and(body_string_contains("in Hindi"))
        .respond_with(answer("कॉपर ऑक्सीक्लोराइड का छिड़काव करें"))
        .expect(1)
        .mount(&server)
        .await;

    let mut cfg = config_for(&server);
    cfg.dialogue.default_language = "hi".to_string();
    let mut dialogue = build_coordinator(&cfg).unwrap();
    assert_eq!(dialogue.language(), Language::Hindi);

    let outcome = dialogue
        .submit("What pesticide for tomato blight?")
        .await
        .unwrap();
    assert_eq!(outcome.intent, Intent::General);
    assert_eq!(
        dialogue.transcript().last().unwrap().text,
        "कॉपर ऑक्सीक्लोराइड का छिड़काव करें"
    );
}

#[tokio::test]
async fn server_error_is_shown_and_session_continues() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(answer("Sow after the first monsoon rains."))
        .mount(&server)
        .await;

    let mut dialogue = build_coordinator(&config_for(&server)).unwrap();

    let failed = dialogue.submit("When to sow paddy?").await.unwrap();
    assert_eq!(failed.status, TurnStatus::Errored);
    let last = dialogue.transcript().last().unwrap();
    assert_eq!(last.kind, TurnKind::Error);
    assert!(last.text.starts_with("Error: "));
    assert_eq!(dialogue.phase(), DialoguePhase::Idle);

    let ok = dialogue.submit("When to sow paddy?").await.unwrap();
    assert_eq!(ok.status, TurnStatus::Resolved);
    assert_eq!(
        dialogue.transcript().last().unwrap().text,
        "Sow after the first monsoon rains."
    );
}

#[tokio::test]
async fn unsupported_platform_keeps_prompting_for_location() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(answer("should not be called"))
        .expect(0)
        .mount(&server)
        .await;

    let mut cfg = config_for(&server);
    cfg.geolocation.provider = GeoProviderKind::None;
    let mut dialogue = build_coordinator(&cfg).unwrap();

    let first = dialogue.submit("onion price").await.unwrap();
    assert!(!first.remote_call);
    assert_eq!(
        dialogue.geolocation().current_state(),
        LocationState::Unsupported
    );

    dialogue.submit("where am i").await.unwrap();
    assert_eq!(
        dialogue.transcript().last().unwrap().text,
        LOCATION_UNSUPPORTED_REPLY
    );

    // Every later price turn asks again and stays local.
    let second = dialogue.submit("onion price").await.unwrap();
    assert_eq!(second.intent, Intent::Price);
    assert!(!second.remote_call);
    assert!(!second.location_requested);
    assert_eq!(
        dialogue.transcript().last().unwrap().text,
        ENABLE_LOCATION_REPLY
    );
    assert_eq!(
        dialogue.geolocation().current_state(),
        LocationState::Unsupported
    );
}

#[tokio::test]
async fn custom_intent_table_from_file() {
    let server = MockServer::start().await;
    let dir = std::env::temp_dir().join(format!("kisan-intents-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let table = dir.join("intents.yaml");
    std::fs::write(
        &table,
        r#"
- intent: location
  patterns:
    - { script: latin, pattern: "my farm" }
"#,
    )
    .unwrap();

    let mut cfg = config_for(&server);
    cfg.dialogue.intents_path = Some(table.display().to_string());
    let mut dialogue = build_coordinator(&cfg).unwrap();

    let outcome = dialogue.submit("Where is my farm?").await.unwrap();
    assert_eq!(outcome.intent, Intent::Location);

    let mut cfg_missing = cfg.clone();
    cfg_missing.dialogue.intents_path = Some(dir.join("missing.yaml").display().to_string());
    assert!(build_coordinator(&cfg_missing).is_err());

    std::fs::remove_dir_all(&dir).ok();
}

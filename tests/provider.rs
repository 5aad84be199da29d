//! Agent provider integration tests
//!
//! Exercises the turn protocol end to end against scripted engines,
//! models, and computers; no real browser or network is involved.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use serde_json::json;

use aria_agent::agent::{
    AgentProvider, BrowserAutomationProvider, ComputerAction, ComputerAutomationProvider,
    UrlBlocklist,
};
use aria_agent::{ConversationItem, Error, Role};

mod common;

use common::{FakeConnector, FakeEngine, ScriptedModel, computer_call, step_recorder};

fn browser_provider(engine: FakeEngine) -> BrowserAutomationProvider {
    BrowserAutomationProvider::new(Box::new(engine), UrlBlocklist::default())
}

fn computer_provider(
    model: ScriptedModel,
    connector: FakeConnector,
    blocklist: UrlBlocklist,
) -> ComputerAutomationProvider {
    ComputerAutomationProvider::new(
        Box::new(model),
        Box::new(connector),
        Arc::new(|_| true),
        blocklist,
    )
}

#[tokio::test]
async fn rejects_empty_and_malformed_input() {
    let mut provider = browser_provider(FakeEngine::new("done"));
    let (_, on_step) = step_recorder();

    let err = provider.run_full_turn(&[], None, &on_step).await.unwrap_err();
    assert!(matches!(err, Error::InvalidTurnInput(_)));

    let items = vec![
        ConversationItem::user("hi"),
        ConversationItem::assistant("hello"),
    ];
    let err = provider
        .run_full_turn(&items, None, &on_step)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidTurnInput(_)));
}

#[tokio::test]
async fn computer_variant_rejects_malformed_input_too() {
    let model = ScriptedModel::new(vec![]);
    let connector = FakeConnector::new();
    let connects = Arc::clone(&connector.connects);
    let mut provider = computer_provider(model, connector, UrlBlocklist::default());
    let (_, on_step) = step_recorder();

    let items = vec![ConversationItem::user("")];
    let err = provider
        .run_full_turn(&items, None, &on_step)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidTurnInput(_)));
    // Validation happens before any expensive resource acquisition.
    assert_eq!(connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn browser_turn_returns_an_assistant_summary() {
    let engine = FakeEngine::new("Opened the article and read the headline.");
    let tasks = Arc::clone(&engine.tasks);
    let mut provider = browser_provider(engine);
    let (lines, on_step) = step_recorder();

    let items = vec![ConversationItem::user("read the news")];
    let new_items = provider
        .run_full_turn(&items, None, &on_step)
        .await
        .unwrap();

    assert_eq!(new_items.len(), 1);
    assert_eq!(new_items[0].role, Role::Assistant);
    assert_eq!(
        new_items[0].text(),
        Some("Opened the article and read the headline.")
    );
    assert_eq!(tasks.lock().unwrap().as_slice(), ["read the news"]);
    // Steps arrive in order, then the summary through the same channel.
    assert_eq!(
        lines.lock().unwrap().as_slice(),
        [
            "Step one",
            "Step two",
            "Opened the article and read the headline."
        ]
    );
}

#[tokio::test]
async fn start_url_is_navigated_exactly_once() {
    let engine = FakeEngine::new("done");
    let visits = Arc::clone(&engine.session_visits);
    let mut provider = browser_provider(engine);
    let (_, on_step) = step_recorder();

    let items = vec![ConversationItem::user("first task")];
    provider
        .run_full_turn(&items, Some("https://example.com"), &on_step)
        .await
        .unwrap();

    let items = vec![
        ConversationItem::user("first task"),
        ConversationItem::assistant("done"),
        ConversationItem::user("second task"),
    ];
    provider
        .run_full_turn(&items, Some("https://example.com"), &on_step)
        .await
        .unwrap();

    assert_eq!(visits.lock().unwrap().as_slice(), ["https://example.com"]);
}

#[tokio::test]
async fn blocked_start_url_fails_the_turn() {
    let engine = FakeEngine::new("unreachable");
    let mut provider = BrowserAutomationProvider::new(
        Box::new(engine),
        UrlBlocklist::new(vec!["blocked.example".to_string()]),
    );
    let (_, on_step) = step_recorder();

    let items = vec![ConversationItem::user("go")];
    let err = provider
        .run_full_turn(&items, Some("https://blocked.example/login"), &on_step)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::BlockedUrl(_)));
}

#[tokio::test]
async fn engine_failure_degrades_to_a_summary() {
    let engine = FakeEngine::failing(Error::Engine("planner crashed".to_string()));
    let mut provider = browser_provider(engine);
    let (_, on_step) = step_recorder();

    let items = vec![ConversationItem::user("do the thing")];
    let new_items = provider
        .run_full_turn(&items, None, &on_step)
        .await
        .unwrap();

    assert_eq!(new_items.len(), 1);
    assert_eq!(new_items[0].role, Role::Assistant);
    assert!(new_items[0].text().unwrap().contains("did not complete"));
}

#[tokio::test]
async fn safety_rejection_is_never_degraded() {
    let engine = FakeEngine::failing(Error::SafetyCheckRejected("payment form".to_string()));
    let mut provider = browser_provider(engine);
    let (_, on_step) = step_recorder();

    let items = vec![ConversationItem::user("buy it")];
    let err = provider
        .run_full_turn(&items, None, &on_step)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SafetyCheckRejected(_)));
}

#[tokio::test]
async fn close_is_idempotent_and_ends_the_provider() {
    let engine = FakeEngine::new("done");
    let closes = Arc::clone(&engine.session_closes);
    let mut provider = browser_provider(engine);
    let (_, on_step) = step_recorder();

    let items = vec![ConversationItem::user("task")];
    provider.run_full_turn(&items, None, &on_step).await.unwrap();

    provider.close().await;
    provider.close().await;
    assert_eq!(closes.load(Ordering::SeqCst), 1);

    let err = provider
        .run_full_turn(&items, None, &on_step)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Agent(_)));
}

#[tokio::test]
async fn computer_turn_executes_actions_until_assistant_reply() {
    let model = ScriptedModel::new(vec![
        vec![computer_call(
            "c1",
            json!({"type": "click", "x": 10, "y": 20}),
            &[],
        )],
        vec![ConversationItem::assistant("Clicked the button.")],
    ]);
    let connector = FakeConnector::new();
    let actions = Arc::clone(&connector.actions);
    let mut provider = computer_provider(model, connector, UrlBlocklist::default());
    let (lines, on_step) = step_recorder();

    let items = vec![ConversationItem::user("press the button")];
    let new_items = provider
        .run_full_turn(&items, None, &on_step)
        .await
        .unwrap();

    assert_eq!(
        actions.lock().unwrap().as_slice(),
        [ComputerAction::Click {
            x: 10,
            y: 20,
            button: None
        }]
    );
    // call, output, assistant reply
    assert_eq!(new_items.len(), 3);
    assert_eq!(new_items[0].role, Role::ComputerCall);
    assert_eq!(new_items[1].role, Role::ComputerCallOutput);
    assert_eq!(new_items[2].role, Role::Assistant);

    let output = new_items[1].content.as_value().unwrap();
    assert_eq!(output["call_id"], "c1");
    assert!(
        output["output"]["image_url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,")
    );
    assert_eq!(output["output"]["current_url"], "about:blank");

    let lines = lines.lock().unwrap();
    assert_eq!(lines.as_slice(), ["click(10, 20)", "Clicked the button."]);
}

#[tokio::test]
async fn mid_turn_announcements_precede_their_actions() {
    let model = ScriptedModel::new(vec![
        vec![
            ConversationItem::assistant("About to scroll down."),
            computer_call(
                "c1",
                json!({"type": "scroll", "x": 0, "y": 0, "scroll_y": 300}),
                &[],
            ),
        ],
        vec![ConversationItem::assistant("Scrolled to the article list.")],
    ]);
    let mut provider = computer_provider(model, FakeConnector::new(), UrlBlocklist::default());
    let (lines, on_step) = step_recorder();

    let items = vec![ConversationItem::user("scroll down")];
    provider.run_full_turn(&items, None, &on_step).await.unwrap();

    // The announcement is heard before the action it explains.
    assert_eq!(
        lines.lock().unwrap().as_slice(),
        [
            "About to scroll down.",
            "scroll(0, 0, by 0,300)",
            "Scrolled to the article list."
        ]
    );
}

#[tokio::test]
async fn computer_connects_lazily_and_once() {
    let model = ScriptedModel::new(vec![
        vec![ConversationItem::assistant("ok")],
        vec![ConversationItem::assistant("ok again")],
    ]);
    let connector = FakeConnector::new();
    let connects = Arc::clone(&connector.connects);
    let mut provider = computer_provider(model, connector, UrlBlocklist::default());
    let (_, on_step) = step_recorder();

    assert_eq!(connects.load(Ordering::SeqCst), 0);

    let items = vec![ConversationItem::user("one")];
    provider.run_full_turn(&items, None, &on_step).await.unwrap();
    let items = vec![
        ConversationItem::user("one"),
        ConversationItem::assistant("ok"),
        ConversationItem::user("two"),
    ];
    provider.run_full_turn(&items, None, &on_step).await.unwrap();

    assert_eq!(connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejected_safety_check_fails_the_turn() {
    let model = ScriptedModel::new(vec![vec![computer_call(
        "c1",
        json!({"type": "click", "x": 1, "y": 2}),
        &["This site handles payments"],
    )]]);
    let provider = ComputerAutomationProvider::new(
        Box::new(model),
        Box::new(FakeConnector::new()),
        Arc::new(|_| false),
        UrlBlocklist::default(),
    );
    let mut provider = provider;
    let (_, on_step) = step_recorder();

    let items = vec![ConversationItem::user("pay")];
    let err = provider
        .run_full_turn(&items, None, &on_step)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SafetyCheckRejected(ref m) if m.contains("payments")));
}

#[tokio::test]
async fn navigation_into_the_blocklist_fails_the_turn() {
    let model = ScriptedModel::new(vec![vec![computer_call(
        "c1",
        json!({"type": "goto", "url": "https://blocked.example/"}),
        &[],
    )]]);
    let mut provider = computer_provider(
        model,
        FakeConnector::new(),
        UrlBlocklist::new(vec!["blocked.example".to_string()]),
    );
    let (_, on_step) = step_recorder();

    let items = vec![ConversationItem::user("go somewhere bad")];
    let err = provider
        .run_full_turn(&items, None, &on_step)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::BlockedUrl(_)));
}

#[tokio::test]
async fn unknown_action_is_a_checked_error() {
    let model = ScriptedModel::new(vec![vec![computer_call(
        "c1",
        json!({"type": "levitate", "x": 1}),
        &[],
    )]]);
    let mut provider = computer_provider(model, FakeConnector::new(), UrlBlocklist::default());
    let (_, on_step) = step_recorder();

    let items = vec![ConversationItem::user("try it")];
    let err = provider
        .run_full_turn(&items, None, &on_step)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("levitate"));
}

#[tokio::test]
async fn exhausted_model_degrades_to_a_summary() {
    let model = ScriptedModel::new(vec![]);
    let mut provider = computer_provider(model, FakeConnector::new(), UrlBlocklist::default());
    let (_, on_step) = step_recorder();

    let items = vec![ConversationItem::user("anything")];
    let new_items = provider
        .run_full_turn(&items, None, &on_step)
        .await
        .unwrap();
    assert_eq!(new_items.last().unwrap().role, Role::Assistant);
}

#[tokio::test]
async fn function_call_actions_are_executed_and_acknowledged() {
    let model = ScriptedModel::new(vec![
        vec![ConversationItem::structured(
            Role::FunctionCall,
            json!({"name": "back", "call_id": "f1", "arguments": "{}"}),
        )],
        vec![ConversationItem::assistant("Went back.")],
    ]);
    let connector = FakeConnector::new();
    let actions = Arc::clone(&connector.actions);
    let mut provider = computer_provider(model, connector, UrlBlocklist::default());
    let (_, on_step) = step_recorder();

    let items = vec![ConversationItem::user("go back")];
    let new_items = provider
        .run_full_turn(&items, None, &on_step)
        .await
        .unwrap();

    assert_eq!(actions.lock().unwrap().as_slice(), [ComputerAction::Back]);
    let output = new_items
        .iter()
        .find(|item| item.role == Role::FunctionCallOutput)
        .unwrap();
    let payload = output.content.as_value().unwrap();
    assert_eq!(payload["call_id"], "f1");
    assert_eq!(payload["output"], "success");
}

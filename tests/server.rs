mod support;

use std::sync::Arc;
use std::time::Duration;

use exsync::server::{start, AppState};
use exsync::webhook::{sign, SIGNATURE_HEADER};
use serde_json::json;

use support::{at, Harness};

fn note_added(comment_id: &str, content: &str, initiator: &str) -> String {
    json!({
        "event_name": "note:added",
        "user_id": "42",
        "event_data": {
            "id": comment_id,
            "content": content,
            "posted_uid": "42",
            "item_id": "t1",
            "is_deleted": false
        },
        "initiator": { "id": initiator, "email": "owner@example.com" },
        "version": "9"
    })
    .to_string()
}

async fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn webhook_binds_task_in_background() {
    let Harness {
        syncer,
        store,
        tasks,
        dir: _dir,
        ..
    } = Harness::new(at(2024, 3, 20, 12));
    let comment_id = tasks.seed("t1", "existio: +Daily Walk");
    let state = AppState::new(Arc::new(syncer), "s3cret");
    let handle = start(state, "127.0.0.1:0").await.unwrap();
    let base = format!("http://127.0.0.1:{}", handle.port);

    let body = note_added(&comment_id, "existio: +Daily Walk", "42");
    let signature = sign("s3cret", body.as_bytes()).unwrap();
    let response = reqwest::Client::new()
        .post(format!("{base}/todoist/"))
        .header(SIGNATURE_HEADER, signature)
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "ok");
    assert!(wait_for(|| store.get("t1").as_deref() == Some("daily_walk")).await);
    assert!(wait_for(|| tasks.was_deleted(&comment_id)).await);
}

#[tokio::test]
async fn webhook_rejects_bad_requests() {
    let Harness {
        syncer,
        store,
        dir: _dir,
        ..
    } = Harness::new(at(2024, 3, 20, 12));
    let state = AppState::new(Arc::new(syncer), "s3cret");
    let handle = start(state, "127.0.0.1:0").await.unwrap();
    let url = format!("http://127.0.0.1:{}/todoist", handle.port);
    let client = reqwest::Client::new();

    let unsigned = client
        .post(&url)
        .body(note_added("c1", "existio: +walk", "42"))
        .send()
        .await
        .unwrap();
    assert_eq!(unsigned.status(), 401);
    let error: serde_json::Value = unsigned.json().await.unwrap();
    assert_eq!(error["code"], 2);

    let body = json!({
        "event_name": "item:added",
        "event_data": {},
        "initiator": { "id": "42" },
        "version": "9"
    })
    .to_string();
    let signature = sign("s3cret", body.as_bytes()).unwrap();
    let unknown = client
        .post(&url)
        .header(SIGNATURE_HEADER, signature)
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), 406);

    let body = note_added("c1", "existio: +walk", "99");
    let signature = sign("s3cret", body.as_bytes()).unwrap();
    let foreign = client
        .post(&url)
        .header(SIGNATURE_HEADER, signature)
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(foreign.status(), 200);
    assert_eq!(foreign.text().await.unwrap(), "ignored");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(store.all().is_empty());
}

#[tokio::test]
async fn liveness_endpoints_respond() {
    let Harness {
        syncer, dir: _dir, ..
    } = Harness::new(at(2024, 3, 20, 12));
    let handle = start(AppState::new(Arc::new(syncer), ""), "127.0.0.1:0")
        .await
        .unwrap();
    let base = format!("http://127.0.0.1:{}", handle.port);

    let index = reqwest::get(format!("{base}/")).await.unwrap();
    assert_eq!(index.status(), 200);

    let health: serde_json::Value = reqwest::get(format!("{base}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
}

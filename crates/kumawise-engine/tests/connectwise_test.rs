use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use kumawise_core::{NewTicket, TicketSummary};
use kumawise_engine::config::ConnectWiseConfig;
use kumawise_engine::{ConnectWiseClient, RepositoryError, TicketRepository};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// What the mock PSA saw
#[derive(Debug, Clone)]
struct Seen {
    method: &'static str,
    path: String,
    query: HashMap<String, String>,
    authorization: Option<String>,
    client_id: Option<String>,
    body: Value,
}

#[derive(Default)]
struct MockPsa {
    seen: Mutex<Vec<Seen>>,
    open_tickets: Mutex<Value>,
    fail_with: Mutex<Option<u16>>,
    fail_notes: Mutex<bool>,
}

impl MockPsa {
    fn record(&self, method: &'static str, path: String, query: HashMap<String, String>, headers: &HeaderMap, body: Value) {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(String::from);
        self.seen.lock().unwrap().push(Seen {
            method,
            path,
            query,
            authorization: header("authorization"),
            client_id: header("clientid"),
            body,
        });
    }

    fn failure(&self) -> Option<(StatusCode, Json<Value>)> {
        let fail_with = *self.fail_with.lock().unwrap();
        fail_with.map(|code| {
            (
                StatusCode::from_u16(code).unwrap(),
                Json(json!({"code": "Error", "message": "mock failure"})),
            )
        })
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

type Reply = (StatusCode, Json<Value>);

async fn find(State(psa): State<Arc<MockPsa>>, Query(query): Query<HashMap<String, String>>, headers: HeaderMap) -> Reply {
    psa.record("GET", "/service/tickets".into(), query, &headers, Value::Null);
    if let Some(failure) = psa.failure() {
        return failure;
    }
    (StatusCode::OK, Json(psa.open_tickets.lock().unwrap().clone()))
}

async fn create(State(psa): State<Arc<MockPsa>>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    psa.record("POST", "/service/tickets".into(), HashMap::new(), &headers, body);
    if let Some(failure) = psa.failure() {
        return failure;
    }
    (StatusCode::CREATED, Json(json!({"id": 101, "closedFlag": false})))
}

async fn close(State(psa): State<Arc<MockPsa>>, Path(id): Path<u64>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    psa.record("PATCH", format!("/service/tickets/{}", id), HashMap::new(), &headers, body);
    if let Some(failure) = psa.failure() {
        return failure;
    }
    (StatusCode::OK, Json(json!({"id": id, "closedFlag": true})))
}

async fn note(State(psa): State<Arc<MockPsa>>, Path(id): Path<u64>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    psa.record("POST", format!("/service/tickets/{}/notes", id), HashMap::new(), &headers, body);
    if *psa.fail_notes.lock().unwrap() {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({})));
    }
    (StatusCode::CREATED, Json(json!({"id": 1})))
}

async fn start_mock() -> (Arc<MockPsa>, ConnectWiseClient) {
    let psa = Arc::new(MockPsa::default());
    *psa.open_tickets.lock().unwrap() = json!([]);

    let app = Router::new()
        .route("/service/tickets", get(find).post(create))
        .route("/service/tickets/{id}", patch(close))
        .route("/service/tickets/{id}/notes", post(note))
        .with_state(psa.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = ConnectWiseConfig {
        base_url: format!("http://{}", addr),
        company: Some("acme".into()),
        public_key: Some("pub".into()),
        private_key: Some("priv".into()),
        client_id: Some("client-123".into()),
        service_board: "Help Desk".into(),
        status_new: "New".into(),
        status_closed: "Closed".into(),
        timeout_seconds: 5,
    };
    let client = ConnectWiseClient::new(&config).unwrap();
    (psa, client)
}

fn new_ticket(company_id: Option<&str>) -> NewTicket {
    NewTicket {
        summary: TicketSummary::new("Uptime Kuma Alert:", "DB #CW10"),
        description: "Monitor: DB #CW10\nError: timeout".into(),
        monitor_name: "DB #CW10".into(),
        company_id: company_id.map(String::from),
    }
}

#[tokio::test]
async fn test_find_open_ticket_query_and_auth() {
    let (psa, client) = start_mock().await;
    *psa.open_tickets.lock().unwrap() = json!([{"id": 55, "closedFlag": false, "summary": "Uptime Kuma Alert: DB"}]);

    let ticket = client.find_open_ticket("Uptime Kuma Alert: DB").await.unwrap();

    assert_eq!(ticket.map(|t| t.id), Some(55));
    let seen = psa.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(
        seen[0].query.get("conditions").map(String::as_str),
        Some("closedFlag=false AND summary contains 'Uptime Kuma Alert: DB'")
    );
    assert_eq!(seen[0].query.get("pageSize").map(String::as_str), Some("1"));
    assert_eq!(seen[0].authorization.as_deref(), Some("Basic YWNtZStwdWI6cHJpdg=="));
    assert_eq!(seen[0].client_id.as_deref(), Some("client-123"));
}

#[tokio::test]
async fn test_find_returns_none_on_empty_page() {
    let (_psa, client) = start_mock().await;

    let ticket = client.find_open_ticket("Uptime Kuma Alert: DB").await.unwrap();

    assert!(ticket.is_none());
}

#[tokio::test]
async fn test_create_ticket_payload() {
    let (psa, client) = start_mock().await;

    let ticket = client.create_ticket(&new_ticket(Some("10"))).await.unwrap();

    assert_eq!(ticket.id, 101);
    let body = &psa.seen()[0].body;
    assert_eq!(body["summary"], "Uptime Kuma Alert: DB #CW10");
    assert_eq!(body["recordType"], "ServiceTicket");
    assert_eq!(body["board"]["name"], "Help Desk");
    assert_eq!(body["status"]["name"], "New");
    assert_eq!(body["initialDescription"], "Monitor: DB #CW10\nError: timeout");
    assert_eq!(body["company"]["identifier"], "10");
}

#[tokio::test]
async fn test_create_without_company_omits_it() {
    let (psa, client) = start_mock().await;

    client.create_ticket(&new_ticket(None)).await.unwrap();

    assert!(psa.seen()[0].body.get("company").is_none());
}

#[tokio::test]
async fn test_close_patches_status_and_adds_note() {
    let (psa, client) = start_mock().await;

    client.close_ticket(55, "Monitor DB is back UP.").await.unwrap();

    let seen = psa.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].method, "PATCH");
    assert_eq!(seen[0].path, "/service/tickets/55");
    assert_eq!(
        seen[0].body,
        json!([{"op": "replace", "path": "/status/name", "value": "Closed"}])
    );
    assert_eq!(seen[1].path, "/service/tickets/55/notes");
    assert_eq!(seen[1].body["text"], "Monitor DB is back UP.");
    assert_eq!(seen[1].body["resolutionFlag"], true);
    assert_eq!(seen[1].body["detailDescriptionFlag"], true);
    assert_eq!(seen[1].body["internalAnalysisFlag"], false);
}

#[tokio::test]
async fn test_failed_note_still_counts_as_closed() {
    let (psa, client) = start_mock().await;
    *psa.fail_notes.lock().unwrap() = true;

    assert!(client.close_ticket(55, "back up").await.is_ok());
}

#[tokio::test]
async fn test_server_error_is_retryable() {
    let (psa, client) = start_mock().await;
    *psa.fail_with.lock().unwrap() = Some(503);

    let err = client.find_open_ticket("Uptime Kuma Alert: DB").await.unwrap_err();

    assert!(matches!(err, RepositoryError::Api { status: 503, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_client_error_is_permanent() {
    let (psa, client) = start_mock().await;
    *psa.fail_with.lock().unwrap() = Some(400);

    let err = client.create_ticket(&new_ticket(Some("bogus"))).await.unwrap_err();

    assert!(matches!(err, RepositoryError::Api { status: 400, .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_unreachable_backend_is_retryable() {
    // nothing listens on the discard port
    let config = ConnectWiseConfig {
        base_url: "http://127.0.0.1:9".into(),
        company: None,
        public_key: None,
        private_key: None,
        client_id: None,
        service_board: "Service Board".into(),
        status_new: "New".into(),
        status_closed: "Closed".into(),
        timeout_seconds: 2,
    };
    let client = ConnectWiseClient::new(&config).unwrap();

    let err = client.close_ticket(1, "x").await.unwrap_err();

    assert!(err.is_retryable());
}

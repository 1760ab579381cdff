use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use httpmock::prelude::*;
use relay_commands::{AuthorAssociation, Run};
use relay_runtime::{
    build_webhook_router, builtin_command_registry, AzurePipelinesClient, CachedCredential,
    CommandCatalogConfig, CommentDispatchRuntime, CommentEvent, DispatchConfig, DispatchOutcome,
    GithubApiClient, RepoRef, RetryPolicy, ServiceContext, TokenScheme, WebhookServerConfig,
};
use serde_json::json;
use sha2::Sha256;
use tokio::net::TcpListener;

const HANDLE: &str = "@typescript-bot";
const PROJECT: &str = "cf7ac146-d525-443c-b23c-0d58337efebc";

fn runtime(github: &MockServer, azure: &MockServer) -> CommentDispatchRuntime {
    let repo = RepoRef::new("owner", "repo");
    let retry = RetryPolicy::new(2, 1);
    let source = GithubApiClient::new(
        github.base_url(),
        repo.clone(),
        Arc::new(CachedCredential::from_static("gh-token", TokenScheme::Bearer).expect("token")),
        5_000,
        retry,
    )
    .expect("github client");
    let builds = AzurePipelinesClient::new(
        azure.url("/typescript"),
        Arc::new(CachedCredential::from_static("pat", TokenScheme::BasicPat).expect("pat")),
        5_000,
        retry,
    )
    .expect("azure client");
    let registry =
        builtin_command_registry(&CommandCatalogConfig::default()).expect("command registry");
    CommentDispatchRuntime::new(
        ServiceContext {
            source: Arc::new(source),
            builds: Arc::new(builds),
            repo,
        },
        registry,
        DispatchConfig {
            bot_handle: HANDLE.to_string(),
            poll_max_iterations: 2,
            poll_interval: Duration::from_millis(1),
        },
    )
}

fn comment_event(body: &str, is_pull_request: bool) -> CommentEvent {
    CommentEvent {
        delivery_id: "delivery-1".to_string(),
        body: body.to_string(),
        author_login: "octocat".to_string(),
        author_association: AuthorAssociation::Member,
        issue_number: 42,
        is_pull_request,
        comment_id: Some(7),
    }
}

#[tokio::test]
async fn integration_test_this_queues_build_and_rereads_status_comment() {
    let github = MockServer::start();
    let azure = MockServer::start();
    let reaction = github.mock(|when, then| {
        when.method(POST)
            .path("/repos/owner/repo/issues/comments/7/reactions")
            .header("authorization", "Bearer gh-token");
        then.status(201).json_body(json!({ "id": 1, "content": "+1" }));
    });
    let status_post = github.mock(|when, then| {
        when.method(POST).path("/repos/owner/repo/issues/42/comments");
        then.status(201)
            .json_body(json!({ "id": 555, "body": "board", "html_url": "https://x/555" }));
    });
    let status_get = github.mock(|when, then| {
        when.method(GET).path("/repos/owner/repo/issues/comments/555");
        then.status(200)
            .json_body(json!({ "id": 555, "body": "edited by hand; no placeholders left" }));
    });
    let status_patch = github.mock(|when, then| {
        when.method(PATCH).path("/repos/owner/repo/issues/comments/555");
        then.status(200).json_body(json!({ "id": 555, "body": "" }));
    });
    let queue = azure.mock(|when, then| {
        when.method(POST)
            .path(format!("/typescript/{PROJECT}/_apis/build/builds"))
            .query_param("api-version", "7.1");
        then.status(200).json_body(json!({
            "id": 77,
            "_links": { "web": { "href": "https://dev.azure.example/build/77" } }
        }));
    });

    let report = runtime(&github, &azure)
        .handle_comment(&comment_event("LGTM\n@typescript-bot test this", true))
        .await
        .expect("dispatch");

    assert_eq!(report.outcome, DispatchOutcome::Completed);
    assert_eq!(report.status_comment_id, Some(555));
    assert_eq!(report.reconciliation_iterations, 0);
    assert!(matches!(
        &report.runs[0],
        Run::Resolved { url, .. } if url == "https://dev.azure.example/build/77"
    ));
    reaction.assert_calls(1);
    status_post.assert_calls(1);
    queue.assert_calls(1);
    status_get.assert_calls(1);
    status_patch.assert_calls(0);
}

#[tokio::test]
async fn integration_create_release_on_existing_branch_never_dispatches() {
    let github = MockServer::start();
    let azure = MockServer::start();
    github.mock(|when, then| {
        when.method(POST)
            .path("/repos/owner/repo/issues/comments/7/reactions");
        then.status(201).json_body(json!({ "id": 1 }));
    });
    github.mock(|when, then| {
        when.method(POST).path("/repos/owner/repo/issues/42/comments");
        then.status(201).json_body(json!({ "id": 556, "body": "board" }));
    });
    github.mock(|when, then| {
        when.method(GET).path("/repos/owner/repo/issues/comments/556");
        then.status(200).json_body(json!({ "id": 556, "body": "board" }));
    });
    let branch = github.mock(|when, then| {
        when.method(GET).path("/repos/owner/repo/git/ref/heads/release-5.5");
        then.status(200)
            .json_body(json!({ "ref": "refs/heads/release-5.5", "object": { "sha": "abc" } }));
    });
    let dispatch = github.mock(|when, then| {
        when.method(POST)
            .path("/repos/owner/repo/actions/workflows/new-release-branch.yaml/dispatches");
        then.status(204);
    });
    let runs = github.mock(|when, then| {
        when.method(GET).path("/repos/owner/repo/actions/runs");
        then.status(200).json_body(json!({ "workflow_runs": [] }));
    });

    let report = runtime(&github, &azure)
        .handle_comment(&comment_event("@typescript-bot create release-5.5", false))
        .await
        .expect("dispatch");

    assert!(matches!(
        &report.runs[0],
        Run::Errored { message, .. } if message.contains("'release-5.5' already seems to exist on owner/repo")
    ));
    branch.assert_calls(1);
    dispatch.assert_calls(0);
    runs.assert_calls(0);
}

fn sign(secret: &str, payload: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac");
    mac.update(payload);
    let digest = mac.finalize().into_bytes();
    format!(
        "sha256={}",
        digest
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect::<String>()
    )
}

#[tokio::test]
async fn integration_signed_webhook_delivery_reaches_build_host() {
    let github = MockServer::start();
    let azure = MockServer::start();
    github.mock(|when, then| {
        when.method(POST)
            .path("/repos/owner/repo/issues/comments/7/reactions");
        then.status(201).json_body(json!({ "id": 1 }));
    });
    let status_post = github.mock(|when, then| {
        when.method(POST).path("/repos/owner/repo/issues/42/comments");
        then.status(201).json_body(json!({ "id": 557, "body": "board" }));
    });
    github.mock(|when, then| {
        when.method(GET).path("/repos/owner/repo/issues/comments/557");
        then.status(200).json_body(json!({ "id": 557, "body": "board" }));
    });
    let queue = azure.mock(|when, then| {
        when.method(POST)
            .path(format!("/typescript/{PROJECT}/_apis/build/builds"));
        then.status(200).json_body(json!({
            "_links": { "web": { "href": "https://dev.azure.example/build/78" } }
        }));
    });

    let app = build_webhook_router(
        WebhookServerConfig {
            bind: "127.0.0.1:0".to_string(),
            webhook_secret: "hook-secret".to_string(),
            repo: RepoRef::new("owner", "repo"),
            bot_login: Some("typescript-bot".to_string()),
        },
        Arc::new(runtime(&github, &azure)),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    tokio::time::sleep(Duration::from_millis(25)).await;

    let payload = json!({
        "action": "created",
        "comment": {
            "id": 7,
            "body": "@typescript-bot pack this",
            "user": { "login": "octocat" },
            "author_association": "COLLABORATOR"
        },
        "issue": { "number": 42, "pull_request": {} },
        "repository": { "full_name": "owner/repo" }
    })
    .to_string();
    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/github/webhook"))
        .header("x-github-event", "issue_comment")
        .header("x-github-delivery", "delivery-2")
        .header("x-hub-signature-256", sign("hook-secret", payload.as_bytes()))
        .body(payload)
        .send()
        .await
        .expect("deliver");
    assert_eq!(response.status().as_u16(), 202);

    for _ in 0..200 {
        if queue.calls() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    queue.assert_calls(1);
    status_post.assert_calls(1);
    server.abort();
}

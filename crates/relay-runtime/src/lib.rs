//! Runtime for the relay comment-command bot.
//!
//! Wires the pure command parsing from `relay-commands` to the outside world:
//! GitHub and Azure Pipelines REST clients, credential caching, the built-in
//! command catalog, the dispatch orchestrator with its reconciliation loop,
//! and the signed webhook entry point.

pub mod azure_pipelines_client;
pub mod builtin_commands;
pub mod command_handler;
pub mod credentials;
pub mod dispatch_orchestrator;
pub mod external_services;
pub mod github_api_client;
pub mod reconciliation;
pub mod status_comment;
pub mod transport_helpers;
pub mod webhook_server;


pub use azure_pipelines_client::AzurePipelinesClient;
pub use builtin_commands::{builtin_command_registry, CommandCatalogConfig};
pub use command_handler::{
    ensure_no_reserved_parameters, CommandHandler, HandlerRegistry, RequestInfo,
    SharedCommandHandler,
};
pub use credentials::{
    CachedCredential, ClientCredentialsTokenSource, IssuedToken, StaticTokenSource, TokenScheme,
    TokenSource,
};
pub use dispatch_orchestrator::{
    CommentDispatchRuntime, CommentEvent, DispatchConfig, DispatchOutcome, DispatchPhase,
    DispatchReport,
};
pub use external_services::{
    BuildHost, IssueComment, PipelineRunRequest, PullRequestSnapshot, QueueBuildRequest, RepoRef,
    ServiceContext, SourceHost, WorkflowDispatchRequest, WorkflowRunSummary,
};
pub use github_api_client::GithubApiClient;
pub use reconciliation::ReconciliationSettings;
pub use transport_helpers::RetryPolicy;
pub use webhook_server::{build_webhook_router, run_webhook_server, WebhookServerConfig};

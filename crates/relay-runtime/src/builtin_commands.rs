//! The built-in command catalog.
//!
//! Handlers are data-driven: each one is a small struct describing which
//! external job to trigger and where its parameters come from, so new
//! commands are mostly a matter of configuration.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use relay_commands::{
    decode_manifest_version, next_release_version, RegistryError, Run, DEFAULT_ALLOWED_ROLES,
};
use serde_json::{Map, Value};

use crate::command_handler::{
    CommandHandler, HandlerRegistry, RequestInfo, SharedCommandHandler,
};
use crate::external_services::{
    PipelineRunRequest, PullRequestSnapshot, QueueBuildRequest, RepoRef, ServiceContext,
    WorkflowDispatchRequest,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullRequestField {
    HeadOwner,
    HeadRef,
    HeadSha,
    BaseRef,
    BaseCloneUrl,
}

impl PullRequestField {
    fn read(self, pull_request: &PullRequestSnapshot) -> Option<String> {
        match self {
            Self::HeadOwner => pull_request
                .head
                .repo
                .as_ref()
                .map(|repo| repo.owner.login.clone()),
            Self::HeadRef => Some(pull_request.head.ref_name.clone()),
            Self::HeadSha => Some(pull_request.head.sha.clone()),
            Self::BaseRef => Some(pull_request.base.ref_name.clone()),
            Self::BaseCloneUrl => pull_request
                .base
                .repo
                .as_ref()
                .map(|repo| repo.clone_url.clone()),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::HeadOwner => "head repository owner",
            Self::HeadRef => "head ref",
            Self::HeadSha => "head sha",
            Self::BaseRef => "base ref",
            Self::BaseCloneUrl => "base repository clone url",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Where one outbound parameter's value comes from.
pub enum ParameterSource {
    Fixed(Value),
    /// A capture group of the command match; omitted when absent and no default.
    Capture {
        group: usize,
        default: Option<String>,
    },
    /// `"true"` when the capture group participated in the match, else omitted.
    CaptureFlag { group: usize },
    PullRequest(PullRequestField),
    BranchHeadSha { repo: RepoRef, branch: String },
    IssueNumber,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub source: ParameterSource,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, source: ParameterSource) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }
}

enum ParameterResolution {
    Ready(Map<String, Value>),
    Unavailable(String),
}

fn needs_pull_request(parameters: &[ParameterSpec]) -> bool {
    parameters
        .iter()
        .any(|spec| matches!(spec.source, ParameterSource::PullRequest(_)))
}

async fn resolve_parameters(
    parameters: &[ParameterSpec],
    services: &ServiceContext,
    request: &RequestInfo,
) -> Result<ParameterResolution> {
    let mut resolved = Map::new();
    for spec in parameters {
        let value = match &spec.source {
            ParameterSource::Fixed(value) => Some(value.clone()),
            ParameterSource::Capture { group, default } => request
                .captures
                .group(*group)
                .map(ToOwned::to_owned)
                .or_else(|| default.clone())
                .map(Value::String),
            ParameterSource::CaptureFlag { group } => request
                .captures
                .group(*group)
                .map(|_| Value::String("true".to_string())),
            ParameterSource::PullRequest(field) => {
                let Some(pull_request) = request.pull_request.as_deref() else {
                    return Ok(ParameterResolution::Unavailable(
                        "this command needs pull request details, but none were available"
                            .to_string(),
                    ));
                };
                let Some(value) = field.read(pull_request) else {
                    return Ok(ParameterResolution::Unavailable(format!(
                        "the pull request has no {}; its source repository may have been deleted",
                        field.label()
                    )));
                };
                Some(Value::String(value))
            }
            ParameterSource::BranchHeadSha { repo, branch } => Some(Value::String(
                services.source.branch_head_sha(repo, branch).await?,
            )),
            ParameterSource::IssueNumber => Some(Value::from(request.issue_number)),
        };
        if let Some(value) = value {
            resolved.insert(spec.name.clone(), value);
        }
    }
    Ok(ParameterResolution::Ready(resolved))
}

/// Workflow inputs are strings; reserved parameters are merged in first.
fn workflow_inputs(
    request: &RequestInfo,
    custom: Map<String, Value>,
) -> Result<BTreeMap<String, String>> {
    let merged = request.request_parameters(custom)?;
    Ok(merged
        .into_iter()
        .map(|(name, value)| {
            let text = match value {
                Value::String(text) => text,
                other => other.to_string(),
            };
            (name, text)
        })
        .collect())
}

fn parameter_names(parameters: &[ParameterSpec]) -> Vec<String> {
    parameters.iter().map(|spec| spec.name.clone()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    /// `refs/pull/{n}/merge`
    PullRequestMerge,
    /// `refs/pull/{n}/head`
    PullRequestHead,
    Branch(String),
}

impl SourceRef {
    fn resolve(&self, issue_number: u64) -> String {
        match self {
            Self::PullRequestMerge => format!("refs/pull/{issue_number}/merge"),
            Self::PullRequestHead => format!("refs/pull/{issue_number}/head"),
            Self::Branch(branch) => branch.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    pub organization: Option<String>,
    pub project: String,
    pub definition_id: u64,
    pub queue_id: Option<u64>,
    pub source: SourceRef,
}

impl BuildTarget {
    fn queue_request(&self, issue_number: u64, parameters: Map<String, Value>) -> QueueBuildRequest {
        QueueBuildRequest {
            organization: self.organization.clone(),
            project: self.project.clone(),
            definition_id: self.definition_id,
            queue_id: self.queue_id,
            source_branch: self.source.resolve(issue_number),
            source_version: String::new(),
            parameters,
        }
    }
}

/// Queues a classic build definition.
pub struct QueueBuildCommand {
    pub description: String,
    pub target: BuildTarget,
    pub parameters: Vec<ParameterSpec>,
}

#[async_trait]
impl CommandHandler for QueueBuildCommand {
    fn describe(&self) -> &str {
        &self.description
    }

    fn requires_pull_request(&self) -> bool {
        needs_pull_request(&self.parameters)
    }

    fn custom_parameter_names(&self) -> Vec<String> {
        parameter_names(&self.parameters)
    }

    async fn handle(&self, services: &ServiceContext, request: RequestInfo) -> Result<Run> {
        let custom = match resolve_parameters(&self.parameters, services, &request).await? {
            ParameterResolution::Ready(custom) => custom,
            ParameterResolution::Unavailable(message) => return Ok(request.errored(message)),
        };
        let parameters = request.request_parameters(custom)?;
        let build = self.target.queue_request(request.issue_number, parameters);
        let url = services.builds.queue_build(&build).await?;
        tracing::info!(
            parent: &request.span,
            definition_id = self.target.definition_id,
            url = %url,
            "queued build"
        );
        Ok(request.resolved(url))
    }
}

/// Runs a YAML pipeline with a repository resource pinned to the PR.
pub struct PipelineRunCommand {
    pub description: String,
    pub organization: Option<String>,
    pub project: String,
    pub pipeline_id: u64,
    pub repository_alias: String,
    pub repository_ref: SourceRef,
    pub parameters: Vec<ParameterSpec>,
}

#[async_trait]
impl CommandHandler for PipelineRunCommand {
    fn describe(&self) -> &str {
        &self.description
    }

    fn requires_pull_request(&self) -> bool {
        needs_pull_request(&self.parameters)
    }

    fn custom_parameter_names(&self) -> Vec<String> {
        parameter_names(&self.parameters)
    }

    async fn handle(&self, services: &ServiceContext, request: RequestInfo) -> Result<Run> {
        let custom = match resolve_parameters(&self.parameters, services, &request).await? {
            ParameterResolution::Ready(custom) => custom,
            ParameterResolution::Unavailable(message) => return Ok(request.errored(message)),
        };
        let template_parameters = request.request_parameters(custom)?;
        let mut repository_overrides = BTreeMap::new();
        repository_overrides.insert(
            self.repository_alias.clone(),
            self.repository_ref.resolve(request.issue_number),
        );
        let run = PipelineRunRequest {
            organization: self.organization.clone(),
            project: self.project.clone(),
            pipeline_id: self.pipeline_id,
            repository_overrides,
            template_parameters,
        };
        let url = services.builds.run_pipeline(&run).await?;
        tracing::info!(
            parent: &request.span,
            pipeline_id = self.pipeline_id,
            url = %url,
            "started pipeline run"
        );
        Ok(request.resolved(url))
    }
}

/// Queues the cherry-pick build once the target branch is known to exist.
///
/// Capture group 1 is the target branch, group 2 requests an LKG build.
pub struct CherryPickCommand {
    pub target: BuildTarget,
}

#[async_trait]
impl CommandHandler for CherryPickCommand {
    fn describe(&self) -> &str {
        "cherry-pick task"
    }

    fn custom_parameter_names(&self) -> Vec<String> {
        vec!["target_branch".to_string(), "PRODUCE_LKG".to_string()]
    }

    async fn handle(&self, services: &ServiceContext, request: RequestInfo) -> Result<Run> {
        let Some(target_branch) = request.captures.group(1).map(ToOwned::to_owned) else {
            return Ok(request.errored("no target branch was given to cherry-pick into"));
        };
        if !services.source.branch_exists(&target_branch).await? {
            return Ok(request.errored(format!(
                "I couldn't find the branch '{target_branch}' on {}. You may need to make it and try again.",
                services.repo.as_slug()
            )));
        }
        let mut custom = Map::new();
        custom.insert("target_branch".to_string(), Value::String(target_branch));
        if request.captures.group(2).is_some() {
            custom.insert("PRODUCE_LKG".to_string(), Value::String("true".to_string()));
        }
        let parameters = request.request_parameters(custom)?;
        let build = self.target.queue_request(request.issue_number, parameters);
        let url = services.builds.queue_build(&build).await?;
        Ok(request.resolved(url))
    }
}

fn release_branch(request: &RequestInfo) -> Option<(String, String)> {
    let version = request.captures.group(1)?.trim_end_matches('.').to_string();
    if version.is_empty() {
        return None;
    }
    Some((format!("release-{version}"), version))
}

async fn dispatch(
    services: &ServiceContext,
    request: &RequestInfo,
    workflow: &str,
    workflow_ref: &str,
    custom: Map<String, Value>,
) -> Result<Run> {
    let inputs = workflow_inputs(request, custom)?;
    services
        .source
        .dispatch_workflow(&WorkflowDispatchRequest {
            workflow: workflow.to_string(),
            git_ref: workflow_ref.to_string(),
            inputs,
        })
        .await?;
    tracing::info!(parent: &request.span, workflow, "dispatched workflow");
    Ok(request.pending())
}

fn string_map<const N: usize>(entries: [(&str, String); N]) -> Map<String, Value> {
    entries
        .into_iter()
        .map(|(name, value)| (name.to_string(), Value::String(value)))
        .collect()
}

/// Dispatches the new-release-branch workflow for `release-X.Y`, refusing when
/// the branch already exists.
pub struct CreateReleaseBranchCommand {
    pub workflow: String,
    pub workflow_ref: String,
}

#[async_trait]
impl CommandHandler for CreateReleaseBranchCommand {
    fn describe(&self) -> &str {
        "create release branch"
    }

    fn custom_parameter_names(&self) -> Vec<String> {
        ["package_version", "core_major_minor", "core_tag", "branch_name"]
            .map(ToOwned::to_owned)
            .to_vec()
    }

    async fn handle(&self, services: &ServiceContext, request: RequestInfo) -> Result<Run> {
        let Some((branch, version)) = release_branch(&request) else {
            return Ok(request.errored("no release version was given"));
        };
        if services.source.branch_exists(&branch).await? {
            return Ok(request.errored(format!(
                "the branch '{branch}' already seems to exist on {}. You should prepare it for the release by hand.",
                services.repo.as_slug()
            )));
        }
        let custom = string_map([
            ("package_version", format!("{version}.0-beta")),
            ("core_major_minor", version),
            ("core_tag", "beta".to_string()),
            ("branch_name", branch),
        ]);
        dispatch(services, &request, &self.workflow, &self.workflow_ref, custom).await
    }
}

/// Advances the version on an existing release branch.
pub struct BumpReleaseCommand {
    pub workflow: String,
    pub workflow_ref: String,
    pub manifest_path: String,
}

#[async_trait]
impl CommandHandler for BumpReleaseCommand {
    fn describe(&self) -> &str {
        "bump release version"
    }

    fn custom_parameter_names(&self) -> Vec<String> {
        ["package_version", "core_major_minor", "branch_name"]
            .map(ToOwned::to_owned)
            .to_vec()
    }

    async fn handle(&self, services: &ServiceContext, request: RequestInfo) -> Result<Run> {
        let Some((branch, _)) = release_branch(&request) else {
            return Ok(request.errored("no release version was given"));
        };
        if !services.source.branch_exists(&branch).await? {
            return Ok(request.errored(format!(
                "the branch '{branch}' does not seem to exist on {}.",
                services.repo.as_slug()
            )));
        }
        let Some(content) = services
            .source
            .get_file_content(&self.manifest_path, &branch)
            .await?
        else {
            return Ok(request.errored(format!(
                "the branch '{branch}' does not seem to have a `{}` I can look up its current version in.",
                self.manifest_path
            )));
        };
        let current = match decode_manifest_version(&content) {
            Ok(current) => current,
            Err(error) => {
                return Ok(request.errored(format!(
                    "the branch '{branch}' had a `{}`, but {error}",
                    self.manifest_path
                )))
            }
        };
        let next = match next_release_version(&current) {
            Ok(next) => next,
            Err(error) => return Ok(request.errored(error.to_string())),
        };
        tracing::info!(
            parent: &request.span,
            branch = %branch,
            current = %current,
            next = %next.next,
            "computed next release version"
        );
        let custom = string_map([
            ("package_version", next.next),
            ("core_major_minor", next.major_minor),
            ("branch_name", branch),
        ]);
        dispatch(services, &request, &self.workflow, &self.workflow_ref, custom).await
    }
}

/// Dispatches the branch-sync workflow for `release-X.Y`.
pub struct SyncReleaseCommand {
    pub workflow: String,
    pub workflow_ref: String,
}

#[async_trait]
impl CommandHandler for SyncReleaseCommand {
    fn describe(&self) -> &str {
        "sync release branch"
    }

    fn custom_parameter_names(&self) -> Vec<String> {
        vec!["branch_name".to_string()]
    }

    async fn handle(&self, services: &ServiceContext, request: RequestInfo) -> Result<Run> {
        let Some((branch, _)) = release_branch(&request) else {
            return Ok(request.errored("no release version was given"));
        };
        let custom = string_map([("branch_name", branch)]);
        dispatch(services, &request, &self.workflow, &self.workflow_ref, custom).await
    }
}

/// Fire-and-forget workflow dispatch with configured inputs.
pub struct WorkflowDispatchCommand {
    pub description: String,
    pub workflow: String,
    pub workflow_ref: String,
    pub inputs: Vec<ParameterSpec>,
}

#[async_trait]
impl CommandHandler for WorkflowDispatchCommand {
    fn describe(&self) -> &str {
        &self.description
    }

    fn requires_pull_request(&self) -> bool {
        needs_pull_request(&self.inputs)
    }

    fn custom_parameter_names(&self) -> Vec<String> {
        parameter_names(&self.inputs)
    }

    async fn handle(&self, services: &ServiceContext, request: RequestInfo) -> Result<Run> {
        let custom = match resolve_parameters(&self.inputs, services, &request).await? {
            ParameterResolution::Ready(custom) => custom,
            ParameterResolution::Unavailable(message) => return Ok(request.errored(message)),
        };
        dispatch(services, &request, &self.workflow, &self.workflow_ref, custom).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Identifiers of the external jobs behind the built-in commands.
pub struct CommandCatalogConfig {
    pub build_project: String,
    pub default_queue_id: Option<u64>,
    pub test_definition_id: u64,
    pub dt_slow_definition_id: u64,
    pub dt_definition_id: u64,
    pub pack_definition_id: u64,
    pub perf_definition_id: u64,
    pub perf_faster_definition_id: u64,
    pub perf_queue_id: u64,
    pub default_perf_preset: String,
    pub user_test_slow_definition_id: u64,
    pub user_test_definition_id: u64,
    pub cherry_pick_definition_id: u64,
    pub definitely_typed_repo: RepoRef,
    pub definitely_typed_branch: String,
    pub inline_pipeline_organization: Option<String>,
    pub inline_pipeline_project: String,
    pub inline_pipeline_id: u64,
    pub inline_repository_alias: String,
    pub new_release_branch_workflow: String,
    pub set_version_workflow: String,
    pub sync_branch_workflow: String,
    pub repros_workflow: String,
    pub workflow_ref: String,
    pub version_manifest_path: String,
}

impl Default for CommandCatalogConfig {
    fn default() -> Self {
        Self {
            build_project: "cf7ac146-d525-443c-b23c-0d58337efebc".to_string(),
            default_queue_id: Some(11),
            test_definition_id: 11,
            dt_slow_definition_id: 18,
            dt_definition_id: 23,
            pack_definition_id: 19,
            perf_definition_id: 22,
            perf_faster_definition_id: 45,
            perf_queue_id: 22,
            default_perf_preset: "regular".to_string(),
            user_test_slow_definition_id: 24,
            user_test_definition_id: 33,
            cherry_pick_definition_id: 30,
            definitely_typed_repo: RepoRef::new("DefinitelyTyped", "DefinitelyTyped"),
            definitely_typed_branch: "master".to_string(),
            inline_pipeline_organization: None,
            inline_pipeline_project: "NodeRepos".to_string(),
            inline_pipeline_id: 14672,
            inline_repository_alias: "TypeScript".to_string(),
            new_release_branch_workflow: "new-release-branch.yaml".to_string(),
            set_version_workflow: "set-version.yaml".to_string(),
            sync_branch_workflow: "sync-branch.yaml".to_string(),
            repros_workflow: "twoslash-repros.yaml".to_string(),
            workflow_ref: "main".to_string(),
            version_manifest_path: "package.json".to_string(),
        }
    }
}

impl CommandCatalogConfig {
    fn pr_build(&self, definition_id: u64) -> BuildTarget {
        self.pr_build_on_queue(definition_id, self.default_queue_id)
    }

    fn pr_build_on_queue(&self, definition_id: u64, queue_id: Option<u64>) -> BuildTarget {
        BuildTarget {
            organization: None,
            project: self.build_project.clone(),
            definition_id,
            queue_id,
            source: SourceRef::PullRequestMerge,
        }
    }
}

fn queue(
    description: &str,
    target: BuildTarget,
    parameters: Vec<ParameterSpec>,
) -> SharedCommandHandler {
    Arc::new(QueueBuildCommand {
        description: description.to_string(),
        target,
        parameters,
    })
}

fn user_test_parameters() -> Vec<ParameterSpec> {
    vec![
        ParameterSpec::new(
            "target_fork",
            ParameterSource::PullRequest(PullRequestField::HeadOwner),
        ),
        ParameterSpec::new(
            "target_branch",
            ParameterSource::PullRequest(PullRequestField::HeadRef),
        ),
    ]
}

/// Builds the default command table in match-priority order.
pub fn builtin_command_registry(
    config: &CommandCatalogConfig,
) -> Result<HandlerRegistry, RegistryError> {
    let mut registry = HandlerRegistry::new();
    registry
        .register(
            "test this",
            queue(
                "extended test suite",
                config.pr_build(config.test_definition_id),
                Vec::new(),
            ),
        )?
        .register(
            "run dt slower",
            queue(
                "Definitely Typed test suite",
                config.pr_build(config.dt_slow_definition_id),
                Vec::new(),
            ),
        )?
        .register(
            "run dt",
            queue(
                "parallelized Definitely Typed test suite",
                config.pr_build(config.dt_definition_id),
                vec![ParameterSpec::new(
                    "DT_SHA",
                    ParameterSource::BranchHeadSha {
                        repo: config.definitely_typed_repo.clone(),
                        branch: config.definitely_typed_branch.clone(),
                    },
                )],
            ),
        )?
        .register(
            "pack this",
            queue(
                "tarball bundle task",
                config.pr_build(config.pack_definition_id),
                Vec::new(),
            ),
        )?
        .register(
            "perf test(?: this)? faster",
            queue(
                "abridged perf test suite",
                config.pr_build_on_queue(config.perf_faster_definition_id, Some(config.perf_queue_id)),
                Vec::new(),
            ),
        )?
        .register(
            "perf test(?: this)?(?: (\\S+))?",
            queue(
                "perf test suite",
                config.pr_build_on_queue(config.perf_definition_id, Some(config.perf_queue_id)),
                vec![ParameterSpec::new(
                    "perf_preset",
                    ParameterSource::Capture {
                        group: 1,
                        default: Some(config.default_perf_preset.clone()),
                    },
                )],
            ),
        )?
        .register(
            "user test this slower",
            queue(
                "community code test suite",
                config.pr_build(config.user_test_slow_definition_id),
                user_test_parameters(),
            ),
        )?
        .register(
            "user test this inline",
            Arc::new(PipelineRunCommand {
                description: "inline community code test suite".to_string(),
                organization: config.inline_pipeline_organization.clone(),
                project: config.inline_pipeline_project.clone(),
                pipeline_id: config.inline_pipeline_id,
                repository_alias: config.inline_repository_alias.clone(),
                repository_ref: SourceRef::PullRequestMerge,
                parameters: vec![
                    ParameterSpec::new("post_result", ParameterSource::Fixed(Value::Bool(true))),
                    ParameterSpec::new(
                        "old_ts_repo_url",
                        ParameterSource::PullRequest(PullRequestField::BaseCloneUrl),
                    ),
                    ParameterSpec::new(
                        "old_head_ref",
                        ParameterSource::PullRequest(PullRequestField::BaseRef),
                    ),
                ],
            }),
        )?
        .register(
            "user test this",
            queue(
                "parallelized community code test suite",
                config.pr_build(config.user_test_definition_id),
                user_test_parameters(),
            ),
        )?
        .register(
            "cherry-?pick (?:this )?(?:in)?to (\\S+)( and LKG)?",
            Arc::new(CherryPickCommand {
                target: BuildTarget {
                    source: SourceRef::PullRequestHead,
                    ..config.pr_build(config.cherry_pick_definition_id)
                },
            }),
        )?
        .register_with(
            "create release-([\\d.]+)",
            Arc::new(CreateReleaseBranchCommand {
                workflow: config.new_release_branch_workflow.clone(),
                workflow_ref: config.workflow_ref.clone(),
            }),
            &DEFAULT_ALLOWED_ROLES,
            false,
        )?
        .register_with(
            "bump release-([\\d.]+)",
            Arc::new(BumpReleaseCommand {
                workflow: config.set_version_workflow.clone(),
                workflow_ref: config.workflow_ref.clone(),
                manifest_path: config.version_manifest_path.clone(),
            }),
            &DEFAULT_ALLOWED_ROLES,
            false,
        )?
        .register_with(
            "sync release-([\\d.]+)",
            Arc::new(SyncReleaseCommand {
                workflow: config.sync_branch_workflow.clone(),
                workflow_ref: config.workflow_ref.clone(),
            }),
            &DEFAULT_ALLOWED_ROLES,
            false,
        )?
        .register_with(
            "run repros",
            Arc::new(WorkflowDispatchCommand {
                description: "code sample repros".to_string(),
                workflow: config.repros_workflow.clone(),
                workflow_ref: config.workflow_ref.clone(),
                inputs: vec![ParameterSpec::new("number", ParameterSource::IssueNumber)],
            }),
            &DEFAULT_ALLOWED_ROLES,
            false,
        )?
        .register_alias(
            "test it",
            &["test this", "run dt", "user test this", "perf test this faster"],
        )?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use relay_commands::{AuthorAssociation, CommandMatch};

    use super::{builtin_command_registry, release_branch, CommandCatalogConfig, SourceRef};
    use crate::command_handler::{ensure_no_reserved_parameters, RequestInfo};

    fn describe_matches(line: &str, role: AuthorAssociation, is_pr: bool) -> Vec<String> {
        let registry = builtin_command_registry(&CommandCatalogConfig::default()).expect("catalog");
        relay_commands::parse_comment_commands(
            &format!("@relay-bot {line}"),
            "@relay-bot",
            role,
            is_pr,
            &registry,
        )
        .into_iter()
        .map(|matched| matched.definition.handler().describe().to_string())
        .collect()
    }

    #[test]
    fn regression_builtin_handlers_never_claim_reserved_parameter_names() {
        let registry = builtin_command_registry(&CommandCatalogConfig::default()).expect("catalog");
        assert_eq!(registry.len(), 14);
        ensure_no_reserved_parameters(&registry).expect("no reserved names");
    }

    #[test]
    fn functional_overlapping_commands_resolve_by_registration_order() {
        let member = AuthorAssociation::Member;
        assert_eq!(
            describe_matches("run dt slower", member, true),
            vec!["Definitely Typed test suite"]
        );
        assert_eq!(
            describe_matches("run dt", member, true),
            vec!["parallelized Definitely Typed test suite"]
        );
        assert_eq!(
            describe_matches("perf test this faster", member, true),
            vec!["abridged perf test suite"]
        );
        assert_eq!(
            describe_matches("perf test this", member, true),
            vec!["perf test suite"]
        );
        assert_eq!(
            describe_matches("user test this inline", member, true),
            vec!["inline community code test suite"]
        );
        assert_eq!(
            describe_matches("user test this slower", member, true),
            vec!["community code test suite"]
        );
        assert_eq!(
            describe_matches("user test this", member, true),
            vec!["parallelized community code test suite"]
        );
    }

    #[test]
    fn functional_legacy_alias_expands_to_four_commands() {
        assert_eq!(
            describe_matches("test it", AuthorAssociation::Owner, true),
            vec![
                "extended test suite",
                "parallelized Definitely Typed test suite",
                "parallelized community code test suite",
                "abridged perf test suite",
            ]
        );
    }

    #[test]
    fn integration_release_commands_apply_outside_pull_requests() {
        assert_eq!(
            describe_matches("create release-5.9", AuthorAssociation::Owner, false),
            vec!["create release branch"]
        );
        assert_eq!(
            describe_matches("run repros", AuthorAssociation::Collaborator, false),
            vec!["code sample repros"]
        );
        assert!(describe_matches("test this", AuthorAssociation::Owner, false).is_empty());
    }

    #[test]
    fn unit_release_branch_and_source_refs() {
        let request = RequestInfo {
            distinct_id: "id".to_string(),
            captures: CommandMatch::new("bump release-5.4", &[Some("5.4")]),
            command_line: "bump release-5.4".to_string(),
            issue_number: 12,
            pull_request: None,
            requesting_user: "octocat".to_string(),
            status_comment_id: 1,
            span: tracing::Span::none(),
        };
        assert_eq!(
            release_branch(&request),
            Some(("release-5.4".to_string(), "5.4".to_string()))
        );
        assert_eq!(SourceRef::PullRequestMerge.resolve(12), "refs/pull/12/merge");
        assert_eq!(SourceRef::PullRequestHead.resolve(12), "refs/pull/12/head");
        assert_eq!(SourceRef::Branch("main".to_string()).resolve(12), "main");
    }
}

use std::path::PathBuf;

use clap::Parser;

use crate::error::ReportError;
use crate::model::work_item::{FieldPatch, Operation, SearchFilter, WorkItemId};
use crate::reporter::{ReportRequest, RunSummary, Selection, WorkItemReporter};
use crate::tracker::Tracker;

/// Update a field on Azure DevOps work items, either one item by id or every
/// item whose metadata field contains a repository/branch path.
#[derive(Parser, Debug)]
#[command(name = "work-report")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Personal Access Token (PAT) from dev.azure.com
    #[arg(long)]
    pub token: String,

    /// Organization/project path at dev.azure.com. Format: "<organization>/<project>"
    #[arg(long = "project", visible_alias = "project-path", alias = "project_path")]
    pub project_path: String,

    /// Target work item id. Cannot be used with --git-path and --filter-by
    #[arg(long = "task-id", alias = "task_id")]
    pub task_id: Option<WorkItemId>,

    /// Current repository and branch name. Format: "<repository>/<branch>"
    #[arg(long = "git-path", alias = "git_path")]
    pub git_path: Option<String>,

    /// Work item field searched for --git-path
    #[arg(long = "filter-by", alias = "filter_by")]
    pub filter_by: Option<String>,

    /// Maximum number of matching work items that may be updated
    #[arg(long = "task-limit", alias = "task_limit")]
    pub task_limit: Option<usize>,

    /// Name of the work item field to write to
    #[arg(long = "field-name", visible_alias = "field", alias = "field_name")]
    pub field_name: String,

    /// Value for the field. May contain unicode and html markup
    #[arg(long = "field-value", visible_aliases = ["value", "val"], alias = "field_value")]
    pub field_value: String,

    /// "add" appends to the existing field value
    #[arg(long = "operation", visible_alias = "op", value_enum, default_value = "replace")]
    pub operation: Operation,

    /// Settings file. Defaults to work-report/config.toml in the user config directory
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Resolve targets and print payloads without updating anything
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

const USAGE_HINT: &str =
    "Please either specify a single task via --task-id or search criterion via --git-path and --filter-by.";

impl Cli {
    pub fn selection(&self) -> Result<Selection, ReportError> {
        match (self.task_id, &self.git_path, &self.filter_by) {
            (Some(id), None, None) => {
                if self.task_limit.is_some() {
                    return Err(ReportError::Usage(
                        "--task-limit cannot be used with --task-id".into(),
                    ));
                }
                Ok(Selection::Single(id))
            }
            (None, Some(git_path), Some(field)) => {
                Ok(Selection::Search(SearchFilter::new(field.clone(), git_path.clone())))
            }
            _ => Err(ReportError::Usage(USAGE_HINT.into())),
        }
    }

    pub fn report_request(&self) -> Result<ReportRequest, ReportError> {
        Ok(ReportRequest {
            selection: self.selection()?,
            patch: FieldPatch::new(self.field_name.clone(), self.operation, self.field_value.clone()),
        })
    }
}

/// Validate the selection, then run the update against `tracker`.
pub async fn execute(
    cli: &Cli,
    tracker: Box<dyn Tracker>,
    default_task_limit: usize,
) -> Result<RunSummary, ReportError> {
    let request = cli.report_request()?;
    let task_limit = cli.task_limit.unwrap_or(default_task_limit);
    let reporter = WorkItemReporter::new(tracker, task_limit).dry_run(cli.dry_run);
    reporter.run(&request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::tests::{patched_ids, MockTracker};

    fn parse(extra: &[&str]) -> Cli {
        let mut args = vec![
            "work-report",
            "--token",
            "pat",
            "--project",
            "contoso/backend",
            "--field",
            "CustomField",
            "--value",
            "Done",
        ];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn single_id_selection() {
        let cli = parse(&["--task-id", "4242"]);
        assert_eq!(cli.selection().unwrap(), Selection::Single(4242));
        assert_eq!(cli.operation, Operation::Replace);
    }

    #[test]
    fn search_selection_with_underscore_aliases() {
        let cli = parse(&[
            "--git_path",
            "backend/feature-x",
            "--filter_by",
            "Custom.GitPath",
            "--op",
            "add",
        ]);
        assert_eq!(
            cli.selection().unwrap(),
            Selection::Search(SearchFilter::new("Custom.GitPath", "backend/feature-x"))
        );
        assert_eq!(cli.operation, Operation::Add);
    }

    #[test]
    fn id_and_filter_together_is_usage_error() {
        let cli = parse(&["--task-id", "1", "--git-path", "backend/feature-x", "--filter-by", "F"]);
        assert!(matches!(cli.selection(), Err(ReportError::Usage(_))));
    }

    #[test]
    fn id_and_fragment_only_is_usage_error() {
        let cli = parse(&["--task-id", "1", "--git-path", "backend/feature-x"]);
        assert!(matches!(cli.selection(), Err(ReportError::Usage(_))));
    }

    #[test]
    fn neither_selection_is_usage_error() {
        let cli = parse(&[]);
        assert!(matches!(cli.selection(), Err(ReportError::Usage(_))));
    }

    #[test]
    fn half_a_filter_is_usage_error() {
        let cli = parse(&["--filter-by", "Custom.GitPath"]);
        assert!(matches!(cli.selection(), Err(ReportError::Usage(_))));
    }

    #[test]
    fn task_limit_with_id_is_usage_error() {
        let cli = parse(&["--task-id", "1", "--task-limit", "3"]);
        let err = cli.selection().unwrap_err();
        assert!(err.to_string().contains("--task-limit"));
    }

    #[test]
    fn missing_required_argument_fails_to_parse() {
        let result = Cli::try_parse_from(["work-report", "--token", "pat"]);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_operation_fails_to_parse() {
        let result = Cli::try_parse_from([
            "work-report", "--token", "t", "--project", "a/b", "--field", "F", "--value", "v",
            "--op", "delete",
        ]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn usage_error_makes_no_requests() {
        let cli = parse(&["--task-id", "1", "--git-path", "backend/feature-x", "--filter-by", "F"]);
        let tracker = MockTracker::new().with_query_result(&[1]);
        let calls = tracker.calls.clone();

        let result = execute(&cli, Box::new(tracker), 1).await;
        assert!(matches!(result, Err(ReportError::Usage(_))));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn task_limit_flag_overrides_default() {
        let cli = parse(&[
            "--git-path",
            "backend/feature-x",
            "--filter-by",
            "Custom.GitPath",
            "--task-limit",
            "3",
        ]);
        let tracker = MockTracker::new().with_query_result(&[1, 2, 3]);
        let calls = tracker.calls.clone();

        let summary = execute(&cli, Box::new(tracker), 1).await.unwrap();
        assert!(summary.is_success());
        assert_eq!(patched_ids(&calls.lock().unwrap()), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn default_limit_applies_without_flag() {
        let cli = parse(&["--git-path", "backend/feature-x", "--filter-by", "Custom.GitPath"]);
        let tracker = MockTracker::new().with_query_result(&[1, 2]);
        let calls = tracker.calls.clone();

        let result = execute(&cli, Box::new(tracker), 1).await;
        assert!(matches!(result, Err(ReportError::TooManyMatches { found: 2, limit: 1 })));
        assert!(patched_ids(&calls.lock().unwrap()).is_empty());
    }
}

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{FragmentProblem, ReportError};
use crate::model::work_item::{FieldPatch, Operation, PatchDocument, SearchFilter, WorkItemId};
use crate::tracker::Tracker;

/// Shorter fragments match too many unrelated work items.
pub const MIN_FRAGMENT_LENGTH: usize = 10;

/// Which work items a run targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Single(WorkItemId),
    Search(SearchFilter),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRequest {
    pub selection: Selection,
    pub patch: FieldPatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    Applied(u16),
    DryRun,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: Vec<WorkItemId>,
    pub failed: Vec<WorkItemId>,
}

impl RunSummary {
    /// True when at least one item was handled and none failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.succeeded.is_empty()
    }
}

pub struct WorkItemReporter {
    tracker: Box<dyn Tracker>,
    task_limit: usize,
    dry_run: bool,
}

impl WorkItemReporter {
    pub fn new(tracker: Box<dyn Tracker>, task_limit: usize) -> Self {
        Self {
            tracker,
            task_limit,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    pub async fn run(&self, request: &ReportRequest) -> Result<RunSummary, ReportError> {
        match &request.selection {
            Selection::Single(id) => self.report(*id, &request.patch).await,
            Selection::Search(filter) => self.report_batch(filter, &request.patch).await,
        }
    }

    pub fn resolve_by_id(&self, id: WorkItemId) -> Vec<WorkItemId> {
        vec![id]
    }

    pub async fn resolve_by_filter(&self, filter: &SearchFilter) -> Result<Vec<WorkItemId>, ReportError> {
        validate_fragment(&filter.fragment).map_err(|reason| ReportError::InvalidFragment {
            fragment: filter.fragment.clone(),
            reason,
        })?;

        let wiql = filter.to_wiql();
        let ids = self
            .tracker
            .query(&wiql)
            .await
            .map_err(|source| ReportError::Query {
                query: wiql.clone(),
                source,
            })?;

        if ids.len() > self.task_limit {
            return Err(ReportError::TooManyMatches {
                found: ids.len(),
                limit: self.task_limit,
            });
        }
        if ids.is_empty() {
            warn!(
                "No work items have been found (field: \"{}\", required value: \"{}\")",
                filter.field, filter.fragment
            );
        } else {
            info!("Matched work items: {ids:?}");
        }
        Ok(ids)
    }

    /// Current value of `field_name`, or an empty string if the item does not
    /// have the field yet.
    pub async fn read_field(&self, id: WorkItemId, field_name: &str) -> Result<String, ReportError> {
        let fields = self
            .tracker
            .get_fields(id)
            .await
            .map_err(|source| ReportError::Read { id, source })?;

        Ok(match fields.get(field_name) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        })
    }

    pub async fn apply_patch(&self, id: WorkItemId, patch: &FieldPatch) -> Result<PatchOutcome, ReportError> {
        let existing = match patch.operation {
            Operation::Add => Some(self.read_field(id, &patch.field_name).await?),
            Operation::Replace => None,
        };
        let document = patch.to_document(existing.as_deref());
        let payload = render(&document);

        if self.dry_run {
            println!(
                "Dry run ({}), task #{id} would receive: {payload}",
                patch.operation.as_str()
            );
            return Ok(PatchOutcome::DryRun);
        }

        debug!("Updating task #{id} via {}", self.tracker.name());
        match self.tracker.patch(id, &document).await {
            Ok(status) => {
                println!("Response HTTP status code for task #{id}: {status}");
                Ok(PatchOutcome::Applied(status))
            }
            Err(source) => Err(ReportError::Patch { id, payload, source }),
        }
    }

    /// Update a single work item. Any failure aborts the run.
    pub async fn report(&self, id: WorkItemId, patch: &FieldPatch) -> Result<RunSummary, ReportError> {
        let mut summary = RunSummary::default();
        for id in self.resolve_by_id(id) {
            self.apply_patch(id, patch).await?;
            summary.succeeded.push(id);
        }
        Ok(summary)
    }

    /// Update every work item matching `filter`. A rejected update is recorded
    /// and the loop moves on; timeouts and read failures abort the run.
    pub async fn report_batch(&self, filter: &SearchFilter, patch: &FieldPatch) -> Result<RunSummary, ReportError> {
        let ids = self.resolve_by_filter(filter).await?;
        let mut summary = RunSummary::default();

        for id in ids {
            match self.apply_patch(id, patch).await {
                Ok(_) => summary.succeeded.push(id),
                Err(err) if err.is_recoverable_in_batch() => {
                    warn!("{err}");
                    summary.failed.push(id);
                }
                Err(err) => return Err(err),
            }
        }

        if !summary.failed.is_empty() {
            warn!("{} of {} updates failed", summary.failed.len(), summary.failed.len() + summary.succeeded.len());
        }
        Ok(summary)
    }
}

pub fn validate_fragment(fragment: &str) -> Result<(), FragmentProblem> {
    if !fragment.contains('/') {
        return Err(FragmentProblem::MissingSeparator);
    }
    if fragment.chars().any(char::is_whitespace) {
        return Err(FragmentProblem::ContainsWhitespace);
    }
    let len = fragment.chars().count();
    if len < MIN_FRAGMENT_LENGTH {
        return Err(FragmentProblem::TooShort {
            len,
            min: MIN_FRAGMENT_LENGTH,
        });
    }
    Ok(())
}

fn render(document: &PatchDocument) -> String {
    serde_json::to_string(document).unwrap_or_else(|_| format!("{document:?}"))
}

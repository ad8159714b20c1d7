//! Job and task records in the store
//!
//! Jobs are created as `scheduled` by an external scheduler; the engine
//! finds them, walks them through `busy` into `success` or `failed`, and on
//! failure leaves a durable error record for operator visibility. Status
//! transitions are monotonic; nothing here ever moves a job backwards.

use crate::error::Result;
use chrono::Utc;
use pubgraph_core::triple::escape_literal;
use pubgraph_core::vocab::{adms, cogs, dct, job_status, mu, oslc, operation, task, xsd};
use pubgraph_store::sparql::render_uri;
use pubgraph_store::{RequestOptions, SparqlGateway};
use std::sync::Arc;
use uuid::Uuid;

/// The two reconciliation flavors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    InitialSync,
    Healing,
}

impl JobKind {
    pub fn operation_uri(self) -> &'static str {
        match self {
            JobKind::InitialSync => operation::INITIAL_SYNC,
            JobKind::Healing => operation::HEALING,
        }
    }
}

/// Job and task statuses, monotonic `scheduled -> busy -> {success, failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Scheduled,
    Busy,
    Success,
    Failed,
    Canceled,
}

impl JobStatus {
    pub fn uri(self) -> &'static str {
        match self {
            JobStatus::Scheduled => job_status::SCHEDULED,
            JobStatus::Busy => job_status::BUSY,
            JobStatus::Success => job_status::SUCCESS,
            JobStatus::Failed => job_status::FAILED,
            JobStatus::Canceled => job_status::CANCELED,
        }
    }
}

/// A scheduled job found in the store, with its scheduled task if present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    pub job: String,
    pub task: Option<String>,
}

/// Store-backed job/task persistence
#[derive(Debug, Clone)]
pub struct JobStore {
    gateway: Arc<dyn SparqlGateway>,
    jobs_graph: String,
}

impl JobStore {
    pub fn new(gateway: Arc<dyn SparqlGateway>, jobs_graph: impl Into<String>) -> Self {
        Self {
            gateway,
            jobs_graph: jobs_graph.into(),
        }
    }

    /// The next scheduled job of `kind`, if any.
    pub async fn find_scheduled(
        &self,
        kind: JobKind,
        opts: &RequestOptions,
    ) -> Result<Option<ScheduledJob>> {
        let query = format!(
            "SELECT ?job ?task WHERE {{\n\
             GRAPH {g} {{\n\
             ?job a {job_class} ;\n\
             {op} {kind} ;\n\
             {status} {scheduled} .\n\
             OPTIONAL {{ ?task {part_of} ?job ; {status} {scheduled} . }}\n\
             }}\n\
             }}",
            g = render_uri(&self.jobs_graph),
            job_class = render_uri(cogs::JOB),
            op = render_uri(task::OPERATION),
            kind = render_uri(kind.operation_uri()),
            status = render_uri(adms::STATUS),
            scheduled = render_uri(job_status::SCHEDULED),
            part_of = render_uri(dct::IS_PART_OF),
        );
        let rows = self.gateway.select(&query, opts).await?;
        Ok(rows.first().and_then(|row| {
            let job = row.get("job")?.as_uri()?.to_string();
            let task = row
                .get("task")
                .and_then(|t| t.as_uri())
                .map(str::to_string);
            Some(ScheduledJob { job, task })
        }))
    }

    /// Is any initial-sync or healing job scheduled or busy right now?
    pub async fn blocking_job_exists(&self, opts: &RequestOptions) -> Result<bool> {
        let query = format!(
            "ASK {{\n\
             GRAPH {g} {{\n\
             ?job a {job_class} ;\n\
             {op} ?operation ;\n\
             {status} ?status .\n\
             VALUES ?operation {{ {init} {heal} }}\n\
             VALUES ?status {{ {scheduled} {busy} }}\n\
             }}\n\
             }}",
            g = render_uri(&self.jobs_graph),
            job_class = render_uri(cogs::JOB),
            op = render_uri(task::OPERATION),
            status = render_uri(adms::STATUS),
            init = render_uri(operation::INITIAL_SYNC),
            heal = render_uri(operation::HEALING),
            scheduled = render_uri(job_status::SCHEDULED),
            busy = render_uri(job_status::BUSY),
        );
        Ok(self.gateway.ask(&query, opts).await?)
    }

    /// Has an initial-sync job ever reached success?
    pub async fn initial_sync_succeeded(&self, opts: &RequestOptions) -> Result<bool> {
        let query = format!(
            "ASK {{\n\
             GRAPH {g} {{\n\
             ?job {op} {init} ;\n\
             {status} {success} .\n\
             }}\n\
             }}",
            g = render_uri(&self.jobs_graph),
            op = render_uri(task::OPERATION),
            init = render_uri(operation::INITIAL_SYNC),
            status = render_uri(adms::STATUS),
            success = render_uri(job_status::SUCCESS),
        );
        Ok(self.gateway.ask(&query, opts).await?)
    }

    /// Move a job or task to `status`, refreshing its modification time.
    pub async fn set_status(
        &self,
        resource: &str,
        status: JobStatus,
        opts: &RequestOptions,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let update = format!(
            "DELETE {{ GRAPH {g} {{ {r} {status_p} ?status ; {modified} ?modified . }} }}\n\
             INSERT {{ GRAPH {g} {{ {r} {status_p} {new} ; {modified} \"{now}\"^^{dt} . }} }}\n\
             WHERE {{\n\
             GRAPH {g} {{ {r} {status_p} ?status . OPTIONAL {{ {r} {modified} ?modified . }} }}\n\
             }}",
            g = render_uri(&self.jobs_graph),
            r = render_uri(resource),
            status_p = render_uri(adms::STATUS),
            modified = render_uri(dct::MODIFIED),
            new = render_uri(status.uri()),
            now = now,
            dt = render_uri(xsd::DATE_TIME),
        );
        self.gateway.update(&update, opts).await?;
        tracing::debug!(resource = %resource, status = ?status, "status transition");
        Ok(())
    }

    /// Persist a durable error record and link it from the job.
    pub async fn record_error(
        &self,
        job: &str,
        message: &str,
        opts: &RequestOptions,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let error_uri = format!("http://redpencil.data.gift/id/jobs/error/{}", id);
        let update = format!(
            "INSERT DATA {{ GRAPH {g} {{\n\
             {e} a {error_class} ;\n\
             {uuid_p} \"{id}\" ;\n\
             {message_p} \"{message}\" .\n\
             {job} {error_p} {e} .\n\
             }} }}",
            g = render_uri(&self.jobs_graph),
            e = render_uri(&error_uri),
            error_class = render_uri(oslc::ERROR),
            uuid_p = render_uri(mu::UUID),
            id = id,
            message_p = render_uri(oslc::MESSAGE),
            message = escape_literal(message),
            job = render_uri(job),
            error_p = render_uri(task::ERROR),
        );
        self.gateway.update(&update, opts).await?;
        Ok(error_uri)
    }

    /// Link a result container and its dump files from a task.
    pub async fn attach_results(
        &self,
        task_uri: &str,
        container: &crate::result::ResultContainer,
        opts: &RequestOptions,
    ) -> Result<()> {
        let mut statements = vec![
            format!(
                "{} a {} ;\n{} \"{}\" .",
                render_uri(&container.uri),
                render_uri(task::DATA_CONTAINER),
                render_uri(mu::UUID),
                escape_literal(&container.id),
            ),
            format!(
                "{} {} {} .",
                render_uri(task_uri),
                render_uri(task::RESULTS_CONTAINER),
                render_uri(&container.uri),
            ),
        ];
        for file_uri in [&container.inserts_file_uri, &container.removals_file_uri] {
            statements.push(format!(
                "{} {} {} .",
                render_uri(&container.uri),
                render_uri(nie_data_source()),
                render_uri(file_uri),
            ));
        }
        let update = format!(
            "INSERT DATA {{ GRAPH {} {{\n{}\n}} }}",
            render_uri(&self.jobs_graph),
            statements.join("\n")
        );
        self.gateway.update(&update, opts).await?;
        Ok(())
    }
}

fn nie_data_source() -> &'static str {
    pubgraph_core::vocab::nie::DATA_SOURCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use pubgraph_core::triple::Term;
    use pubgraph_store::testing::StubGateway;

    const JOBS: &str = "http://ex.org/graphs/jobs";

    #[tokio::test]
    async fn test_find_scheduled_returns_job_and_task() {
        let gateway = Arc::new(StubGateway::new());
        let row: pubgraph_store::Binding = [
            ("job".to_string(), Term::uri("http://ex.org/jobs/1")),
            ("task".to_string(), Term::uri("http://ex.org/tasks/1")),
        ]
        .into_iter()
        .collect();
        gateway.on_select(&["healingOperation", "JobStatus/scheduled"], vec![row]);

        let store = JobStore::new(gateway, JOBS);
        let found = store
            .find_scheduled(JobKind::Healing, &RequestOptions::default())
            .await
            .unwrap();
        assert_eq!(
            found,
            Some(ScheduledJob {
                job: "http://ex.org/jobs/1".to_string(),
                task: Some("http://ex.org/tasks/1".to_string()),
            })
        );

        // No scheduled initial sync
        let none = store
            .find_scheduled(JobKind::InitialSync, &RequestOptions::default())
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_set_status_rewrites_status_and_modified() {
        let gateway = Arc::new(StubGateway::new());
        let store = JobStore::new(gateway.clone(), JOBS);
        store
            .set_status(
                "http://ex.org/jobs/1",
                JobStatus::Busy,
                &RequestOptions::default(),
            )
            .await
            .unwrap();

        let updates = gateway.updates();
        assert_eq!(updates.len(), 1);
        assert!(updates[0].contains("JobStatus/busy"));
        assert!(updates[0].contains("DELETE {"));
        assert!(updates[0].contains("dc/terms/modified"));
    }

    #[tokio::test]
    async fn test_record_error_writes_uuid_and_message() {
        let gateway = Arc::new(StubGateway::new());
        let store = JobStore::new(gateway.clone(), JOBS);
        let error_uri = store
            .record_error(
                "http://ex.org/jobs/1",
                "boom \"quoted\"",
                &RequestOptions::default(),
            )
            .await
            .unwrap();

        let updates = gateway.updates();
        assert_eq!(updates.len(), 1);
        assert!(updates[0].contains(&format!("<{}>", error_uri)));
        assert!(updates[0].contains("open-services.net/ns/core#Error"));
        assert!(updates[0].contains("boom \\\"quoted\\\""));
    }
}

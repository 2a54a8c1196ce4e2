//! `studio` -- side-by-side text generation and video jobs from the shell.
//!
//! # Environment variables
//!
//! | Variable                 | Default                       |
//! |--------------------------|-------------------------------|
//! | `GENERATION_API_URL`     | `http://localhost:8000`       |
//! | `STUDIO_DATABASE_URL`    | `sqlite://studio.db?mode=rwc` |
//! | `JOB_POLL_INTERVAL_SECS` | `5`                           |
//! | `STREAM_MODELS`          | `default-model`               |
//! | `EVENT_CHANNEL_CAPACITY` | `256`                         |

mod cli;

use std::collections::HashSet;

use anyhow::Context;
use clap::Parser;
use studio_core::job::{GenerationJob, JobStatus, GENERIC_FAILURE_MESSAGE};
use studio_core::types::DbId;
use studio_core::validation::JobSpec;
use studio_engine::{Studio, StudioConfig, StudioEvent};
use studio_remote::messages::GenerationParams;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studio=info,studio_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let command = Cli::parse().command;

    let config = StudioConfig::from_env();
    let studio = Studio::connect(config)
        .await
        .context("failed to start studio")?;

    let result = match command {
        Command::Compare {
            project_id,
            input,
            prompt,
            save_as,
        } => compare(&studio, project_id, &input, &prompt, save_as.as_deref()).await,
        Command::Video {
            project_id,
            prompt,
            model_id,
            group_count,
        } => video(&studio, project_id, prompt, model_id, group_count).await,
        Command::Versions { project_id } => versions(&studio, project_id).await,
    };

    studio.shutdown().await;
    result
}

async fn compare(
    studio: &Studio,
    project_id: DbId,
    input: &str,
    prompt: &str,
    save_as: Option<&str>,
) -> anyhow::Result<()> {
    let session = studio.project(project_id);
    let mut events = studio.events().subscribe();

    let mut pending: HashSet<DbId> = session
        .streams()
        .generate_all(input, prompt, &GenerationParams::default())
        .into_iter()
        .collect();

    while !pending.is_empty() {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, cancelling streams");
                session.streams().cancel_all();
                break;
            }
        };
        match event {
            Ok(StudioEvent::ColumnFinished { column_id, .. })
            | Ok(StudioEvent::ColumnFailed { column_id, .. })
            | Ok(StudioEvent::ColumnCancelled { column_id, .. }) => {
                pending.remove(&column_id);
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event receiver lagged");
                pending.retain(|id| {
                    session
                        .streams()
                        .column(*id)
                        .map(|c| c.is_generating)
                        .unwrap_or(false)
                });
            }
            Err(RecvError::Closed) => break,
        }
    }

    for column in session.streams().snapshot() {
        let marker = if column.is_selected { "*" } else { " " };
        println!("{marker} [{}] {}", column.id, column.model_id);
        match &column.error {
            Some(error) => println!("    error: {error}"),
            None => println!("    {}", column.content),
        }
    }

    if let Some(name) = save_as {
        let snapshot = studio
            .save_selected_column(project_id, prompt, name, None)
            .await?;
        println!("saved version {} ({})", snapshot.id, snapshot.name);
    }
    Ok(())
}

async fn video(
    studio: &Studio,
    project_id: DbId,
    prompt: String,
    model_id: String,
    group_count: u32,
) -> anyhow::Result<()> {
    let session = studio.project(project_id);
    let mut events = studio.events().subscribe();

    let spec = JobSpec::text_to_video(prompt, model_id).with_group_count(group_count);
    let job = session.jobs().submit(spec).await?;
    println!("job {} submitted ({} task(s))", job.id, job.submitted_artifact_ids.len());

    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = tokio::signal::ctrl_c() => {
                session.jobs().stop(job.id);
                println!("stopped waiting; the job keeps running remotely");
                return Ok(());
            }
        };
        match event {
            Ok(StudioEvent::JobProgress { job_id, result_count, .. }) if job_id == job.id => {
                println!("  {result_count} result(s) so far");
            }
            Ok(StudioEvent::JobSucceeded { job_id, result_urls, .. }) if job_id == job.id => {
                for url in result_urls {
                    println!("  {url}");
                }
                return Ok(());
            }
            Ok(StudioEvent::JobFailed { job_id, error, .. }) if job_id == job.id => {
                let job = session.jobs().job(job_id)?;
                for url in &job.result_urls {
                    println!("  {url}");
                }
                anyhow::bail!("job {job_id} failed: {error}");
            }
            Ok(StudioEvent::PollingStopped { job_id, error, .. }) if job_id == job.id => {
                anyhow::bail!("lost contact with the generation service: {error}");
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event receiver lagged");
                let current = session.jobs().job(job.id)?;
                if let Some(outcome) = job_outcome(&current) {
                    for url in &current.result_urls {
                        println!("  {url}");
                    }
                    return outcome;
                }
            }
            Err(RecvError::Closed) => return Ok(()),
        }
    }
}

/// Exit result for a job that reached a terminal status; `None` while it runs.
fn job_outcome(job: &GenerationJob) -> Option<anyhow::Result<()>> {
    match job.status {
        JobStatus::Succeeded => Some(Ok(())),
        JobStatus::Failed => Some(Err(anyhow::anyhow!(
            "job {} failed: {}",
            job.id,
            job.error_message.as_deref().unwrap_or(GENERIC_FAILURE_MESSAGE),
        ))),
        JobStatus::Pending | JobStatus::Processing => None,
    }
}

async fn versions(studio: &Studio, project_id: DbId) -> anyhow::Result<()> {
    let snapshots = studio.versions().list_for_project(project_id).await?;
    if snapshots.is_empty() {
        println!("no versions for project {project_id}");
    }
    for snapshot in snapshots {
        println!(
            "{:>4}  {}  {:<10} {}",
            snapshot.id,
            snapshot.created_at.format("%Y-%m-%d %H:%M:%S"),
            snapshot.payload.kind(),
            snapshot.name,
        );
        if let Some(description) = snapshot.description {
            println!("      {description}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_with(status: JobStatus, error_message: Option<&str>) -> GenerationJob {
        let mut job = GenerationJob::submitted(
            3,
            1,
            JobSpec::text_to_video("waves", "m"),
            vec!["t1".into()],
            chrono::Utc::now(),
        );
        job.status = status;
        job.error_message = error_message.map(str::to_string);
        job
    }

    #[test]
    fn running_job_has_no_outcome() {
        assert!(job_outcome(&job_with(JobStatus::Pending, None)).is_none());
        assert!(job_outcome(&job_with(JobStatus::Processing, None)).is_none());
    }

    #[test]
    fn succeeded_job_exits_cleanly() {
        assert!(matches!(job_outcome(&job_with(JobStatus::Succeeded, None)), Some(Ok(()))));
    }

    #[test]
    fn failed_job_is_an_error() {
        let err = job_outcome(&job_with(JobStatus::Failed, Some("content policy")))
            .unwrap()
            .unwrap_err();
        assert_eq!(err.to_string(), "job 3 failed: content policy");

        let err = job_outcome(&job_with(JobStatus::Failed, None)).unwrap().unwrap_err();
        assert!(err.to_string().ends_with(GENERIC_FAILURE_MESSAGE));
    }
}

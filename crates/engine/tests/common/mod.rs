#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use studio_core::job::JobStatus;
use studio_remote::messages::{JobSubmission, SubmitAck, TaskStatusReport, TextStreamRequest};
use studio_remote::{ChunkStream, JobTransport, RemoteApiError, TextStreamTransport};

/// How a fake model answers.
#[derive(Clone)]
pub enum Script {
    Chunks(Vec<&'static str>),
    FailAfter(Vec<&'static str>, &'static str),
    Hang,
}

#[derive(Default)]
pub struct FakeModels {
    scripts: Mutex<HashMap<String, Script>>,
}

impl FakeModels {
    pub fn new(scripts: &[(&str, Script)]) -> Arc<Self> {
        let map = scripts
            .iter()
            .map(|(model, script)| (model.to_string(), script.clone()))
            .collect();
        Arc::new(Self {
            scripts: Mutex::new(map),
        })
    }
}

#[async_trait]
impl TextStreamTransport for FakeModels {
    async fn open_stream(&self, request: TextStreamRequest) -> Result<ChunkStream, RemoteApiError> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&request.model_id)
            .cloned()
            .unwrap_or(Script::Chunks(vec![]));
        let stream = match script {
            Script::Chunks(chunks) => {
                stream::iter(chunks.into_iter().map(|c| Ok(c.to_string()))).boxed()
            }
            Script::FailAfter(chunks, reason) => stream::iter(
                chunks
                    .into_iter()
                    .map(|c| Ok(c.to_string()))
                    .chain(std::iter::once(Err(RemoteApiError::Stream(reason.to_string())))),
            )
            .boxed(),
            Script::Hang => stream::pending().boxed(),
        };
        Ok(stream)
    }
}

/// Every submission gets one task that reports `replies` in order, then
/// repeats the last one.
pub struct FakeJobs {
    replies: Vec<TaskStatusReport>,
    submissions: Mutex<usize>,
    polls: Mutex<HashMap<String, usize>>,
}

impl FakeJobs {
    pub fn new(replies: Vec<(JobStatus, Vec<&str>)>) -> Arc<Self> {
        Arc::new(Self {
            replies: replies
                .into_iter()
                .map(|(status, urls)| TaskStatusReport {
                    status,
                    result_urls: urls.into_iter().map(str::to_string).collect(),
                    error_message: None,
                })
                .collect(),
            submissions: Mutex::new(0),
            polls: Mutex::new(HashMap::new()),
        })
    }

    pub fn submissions(&self) -> usize {
        *self.submissions.lock().unwrap()
    }
}

#[async_trait]
impl JobTransport for FakeJobs {
    async fn submit(&self, _submission: &JobSubmission) -> Result<SubmitAck, RemoteApiError> {
        let n = {
            let mut count = self.submissions.lock().unwrap();
            *count += 1;
            *count
        };
        Ok(SubmitAck {
            task_ids: vec![format!("remote-{n}")],
            status: JobStatus::Pending,
        })
    }

    async fn status(&self, task_id: &str) -> Result<TaskStatusReport, RemoteApiError> {
        let mut polls = self.polls.lock().unwrap();
        let n = polls.entry(task_id.to_string()).or_insert(0);
        let index = (*n).min(self.replies.len().saturating_sub(1));
        *n += 1;
        self.replies
            .get(index)
            .cloned()
            .ok_or_else(|| RemoteApiError::Stream("no replies scripted".into()))
    }
}

use async_trait::async_trait;
use parking_lot::Mutex;
use pdfdesk_protocol::{
    FilterState, Record, RecordId, RecordService, ServiceError, UploadFile,
};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Remote operation selector for scripting failures and latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    List,
    Update,
    Delete,
    Upload,
    Ask,
}

/// A request received by [`MockRecordService`], in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    List(FilterState),
    Update(Record),
    Delete(RecordId),
    Upload(String),
    Ask { record_id: RecordId, question: String },
}

type ScriptedAnswer = (Duration, Result<Value, ServiceError>);

#[derive(Default)]
struct MockState {
    records: Vec<Record>,
    calls: Vec<RemoteCall>,
    applied: Vec<Record>,
    failures: HashMap<Endpoint, VecDeque<ServiceError>>,
    latency: HashMap<Endpoint, Duration>,
    answers: HashMap<String, ScriptedAnswer>,
}

/// In-memory record service with server-side filtering and last-write-wins updates.
#[derive(Default)]
pub struct MockRecordService {
    state: Mutex<MockState>,
}

impl MockRecordService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<Record>) -> Self {
        let service = Self::default();
        service.state.lock().records = records;
        service
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state.lock().calls.clone()
    }

    /// Successfully applied update payloads, in completion order.
    pub fn updates(&self) -> Vec<Record> {
        self.state.lock().applied.clone()
    }

    /// Filters requested by list calls.
    pub fn lists(&self) -> Vec<FilterState> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                RemoteCall::List(filter) => Some(*filter),
                _ => None,
            })
            .collect()
    }

    /// Server-side copy of a record.
    pub fn record(&self, id: &RecordId) -> Option<Record> {
        self.state
            .lock()
            .records
            .iter()
            .find(|record| record.id == *id)
            .cloned()
    }

    /// What a list call with `filter` would return right now.
    pub fn server_view(&self, filter: FilterState) -> Vec<Record> {
        self.state
            .lock()
            .records
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect()
    }

    /// Fail the next call to `endpoint` with `error`. Queued failures are used in order.
    pub fn fail_next(&self, endpoint: Endpoint, error: ServiceError) {
        self.state
            .lock()
            .failures
            .entry(endpoint)
            .or_default()
            .push_back(error);
    }

    /// Delay every call to `endpoint`.
    pub fn set_latency(&self, endpoint: Endpoint, latency: Duration) {
        self.state.lock().latency.insert(endpoint, latency);
    }

    /// Script the reply to a question, delivered after `delay`.
    pub fn answer_with(
        &self,
        question: impl Into<String>,
        delay: Duration,
        result: Result<Value, ServiceError>,
    ) {
        self.state
            .lock()
            .answers
            .insert(question.into(), (delay, result));
    }

    /// Log the call and take its scripted failure and latency.
    fn begin(&self, endpoint: Endpoint, call: RemoteCall) -> (Option<ServiceError>, Duration) {
        let mut state = self.state.lock();
        state.calls.push(call);
        let failure = state
            .failures
            .get_mut(&endpoint)
            .and_then(|queue| queue.pop_front());
        let latency = state.latency.get(&endpoint).copied().unwrap_or_default();
        (failure, latency)
    }
}

async fn pause(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

#[async_trait]
impl RecordService for MockRecordService {
    async fn list(&self, filter: FilterState) -> Result<Vec<Record>, ServiceError> {
        let (failure, latency) = self.begin(Endpoint::List, RemoteCall::List(filter));
        pause(latency).await;
        if let Some(error) = failure {
            return Err(error);
        }
        Ok(self.server_view(filter))
    }

    async fn update(&self, record: &Record) -> Result<(), ServiceError> {
        let (failure, latency) = self.begin(Endpoint::Update, RemoteCall::Update(record.clone()));
        pause(latency).await;
        if let Some(error) = failure {
            return Err(error);
        }
        let mut state = self.state.lock();
        match state.records.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => state.records.push(record.clone()),
        }
        state.applied.push(record.clone());
        Ok(())
    }

    async fn delete(&self, id: &RecordId) -> Result<(), ServiceError> {
        let (failure, latency) = self.begin(Endpoint::Delete, RemoteCall::Delete(id.clone()));
        pause(latency).await;
        if let Some(error) = failure {
            return Err(error);
        }
        let mut state = self.state.lock();
        let before = state.records.len();
        state.records.retain(|record| record.id != *id);
        if state.records.len() == before {
            return Err(ServiceError::Status {
                status: 404,
                body: format!("no record {id}"),
            });
        }
        Ok(())
    }

    async fn upload(&self, file: UploadFile) -> Result<Record, ServiceError> {
        let (failure, latency) =
            self.begin(Endpoint::Upload, RemoteCall::Upload(file.file_name.clone()));
        pause(latency).await;
        if let Some(error) = failure {
            return Err(error);
        }
        let mut state = self.state.lock();
        let next_id = state
            .records
            .iter()
            .filter_map(|record| match record.id {
                RecordId::Int(id) => Some(id),
                RecordId::Text(_) => None,
            })
            .max()
            .unwrap_or(0)
            + 1;
        let record = Record::new(
            next_id,
            file.file_name.clone(),
            format!("/files/{}", file.file_name),
            false,
        );
        state.records.push(record.clone());
        Ok(record)
    }

    async fn ask(&self, id: &RecordId, question: &str) -> Result<Value, ServiceError> {
        let (failure, latency) = self.begin(
            Endpoint::Ask,
            RemoteCall::Ask {
                record_id: id.clone(),
                question: question.to_string(),
            },
        );
        let scripted = self.state.lock().answers.get(question).cloned();
        pause(latency).await;
        if let Some(error) = failure {
            return Err(error);
        }
        match scripted {
            Some((delay, result)) => {
                pause(delay).await;
                result
            }
            None => Ok(json!(format!("answer to {question}"))),
        }
    }
}

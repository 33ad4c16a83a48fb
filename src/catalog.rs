//! Lazy record streams over the service catalog.
//!
//! [`Catalog`] combines a [`Metadata`] provider with a [`PageClient`] and
//! exposes the three listings the drill-down walks through: services,
//! zero-argument operations of a service, and the results of running one
//! operation. Every listing is a stream that does work only when polled, so
//! a consumer that stops early never pays for what it did not look at.

mod aws_cli;
mod client;
mod metadata;
mod models;

use std::collections::VecDeque;
use std::sync::Arc;

use color_eyre::eyre::{Result, eyre};
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use tracing::{debug, info, warn};

pub use aws_cli::AwsCli;
pub use client::{Page, PageClient, PageRequest};
pub use metadata::Metadata;
pub use models::ModelDirectory;

use crate::record::Record;

/// A forward-only stream of records. An `Err` item ends the stream.
pub type RecordStream = BoxStream<'static, Result<Record>>;

pub const SERVICE_FIELD: &str = "Service";
pub const DESCRIPTION_FIELD: &str = "Description";
pub const OPERATION_FIELD: &str = "Operation";

#[derive(Clone)]
pub struct Catalog {
    metadata: Arc<dyn Metadata>,
    client: Arc<dyn PageClient>,
}

impl Catalog {
    pub fn new(metadata: Arc<dyn Metadata>, client: Arc<dyn PageClient>) -> Self {
        Self { metadata, client }
    }

    /// Every service with its description.
    ///
    /// Service names are enumerated up front so an unavailable metadata
    /// source is reported here. Descriptions are loaded as records are pulled;
    /// a service whose description cannot be loaded is skipped.
    ///
    /// # Errors
    /// Returns an error if the services cannot be enumerated at all.
    pub async fn list_services(&self) -> Result<RecordStream> {
        let services: VecDeque<String> = self.metadata.services().await?.into();
        let metadata = Arc::clone(&self.metadata);

        Ok(stream::unfold(services, move |mut services| {
            let metadata = Arc::clone(&metadata);
            async move {
                while let Some(service) = services.pop_front() {
                    match metadata.description(&service).await {
                        Ok(description) => {
                            let record = Record::new()
                                .with(SERVICE_FIELD, service)
                                .with(DESCRIPTION_FIELD, description);
                            return Some((Ok(record), services));
                        }
                        Err(err) => warn!(%service, %err, "Skipping service with unreadable metadata"),
                    }
                }
                None
            }
        })
        .boxed())
    }

    /// Operations of `service` that can run without any input.
    ///
    /// Each candidate's required parameters are looked up right before it
    /// would be yielded; operations with required parameters, or whose
    /// metadata cannot be read, are skipped.
    pub fn list_operations(&self, service: &str) -> RecordStream {
        let state = OperationsState {
            metadata: Arc::clone(&self.metadata),
            service: service.to_string(),
            candidates: None,
        };

        stream::unfold(Some(state), |state| async move {
            let mut state = state?;

            if state.candidates.is_none() {
                match state.metadata.operations(&state.service).await {
                    Ok(operations) => state.candidates = Some(operations.into()),
                    Err(err) => return Some((Err(err), None)),
                }
            }

            while let Some(operation) = state.candidates.as_mut().and_then(VecDeque::pop_front) {
                match state.metadata.required_params(&state.service, &operation).await {
                    Ok(required) if required.is_empty() => {
                        let record = Record::new().with(OPERATION_FIELD, operation);
                        return Some((Ok(record), Some(state)));
                    }
                    Ok(required) => {
                        debug!(service = %state.service, %operation, ?required, "Operation needs input");
                    }
                    Err(err) => {
                        warn!(service = %state.service, %operation, %err, "Skipping operation with unreadable metadata");
                    }
                }
            }
            None
        })
        .boxed()
    }

    /// Results of running `operation` against `service` with no parameters.
    ///
    /// Pages are fetched one at a time, only once every element of the
    /// previous page has been pulled.
    pub fn list_items(&self, service: &str, operation: &str) -> RecordStream {
        info!(service, operation, "Listing items");
        let state = ItemsState {
            metadata: Arc::clone(&self.metadata),
            client: Arc::clone(&self.client),
            service: service.to_string(),
            operation: operation.to_string(),
            result_keys: Vec::new(),
            buffered: VecDeque::new(),
            cursor: PageCursor::Start,
        };

        stream::unfold(Some(state), |state| async move {
            let mut state = state?;
            match state.next_record().await {
                Ok(Some(record)) => Some((Ok(record), Some(state))),
                Ok(None) => None,
                Err(err) => {
                    warn!(service = %state.service, operation = %state.operation, %err, "Listing failed");
                    Some((Err(err), None))
                }
            }
        })
        .boxed()
    }
}

struct OperationsState {
    metadata: Arc<dyn Metadata>,
    service: String,
    candidates: Option<VecDeque<String>>,
}

enum PageCursor {
    Start,
    Next(String),
    Repeated(String),
    Done,
}

struct ItemsState {
    metadata: Arc<dyn Metadata>,
    client: Arc<dyn PageClient>,
    service: String,
    operation: String,
    result_keys: Vec<String>,
    buffered: VecDeque<Record>,
    cursor: PageCursor,
}

impl ItemsState {
    async fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            if let Some(record) = self.buffered.pop_front() {
                return Ok(Some(record));
            }

            let starting_token = match &self.cursor {
                PageCursor::Done => return Ok(None),
                PageCursor::Repeated(token) => {
                    return Err(eyre!(
                        "{} {} returned continuation token '{token}' twice",
                        self.service,
                        self.operation
                    ));
                }
                PageCursor::Start => {
                    self.result_keys = self
                        .metadata
                        .result_keys(&self.service, &self.operation)
                        .await?;
                    None
                }
                PageCursor::Next(token) => Some(token.clone()),
            };

            let request = PageRequest {
                service: self.service.clone(),
                operation: self.operation.clone(),
                starting_token,
            };
            let page = self.client.fetch_page(&request).await?;

            self.buffered = self
                .result_keys
                .iter()
                .flat_map(|key| extract_records(&page.body, key))
                .collect();
            debug!(
                service = %self.service,
                operation = %self.operation,
                count = self.buffered.len(),
                more = page.next_token.is_some(),
                "Fetched page"
            );

            self.cursor = match page.next_token {
                Some(next) if request.starting_token.as_deref() == Some(next.as_str()) => {
                    PageCursor::Repeated(next)
                }
                Some(next) => PageCursor::Next(next),
                None => PageCursor::Done,
            };
        }
    }
}

/// Records stored under a dotted result key, e.g. `DistributionList.Items`.
fn extract_records(body: &Value, key: &str) -> Vec<Record> {
    let name = key.rsplit('.').next().unwrap_or(key);
    let mut value = body;
    for segment in key.split('.') {
        match value.get(segment) {
            Some(inner) => value = inner,
            None => return Vec::new(),
        }
    }

    match value {
        Value::Array(items) => items.iter().map(|item| Record::from_json(item, name)).collect(),
        Value::Null => Vec::new(),
        other => vec![Record::from_json(other, name)],
    }
}

//! The Service → Operation → Item drill-down.
//!
//! [`Cascade`] runs one picker per stage. Each confirmed record parameterises
//! the next stage's catalog listing; cancelling at any stage ends the whole
//! run with nothing kept.

use async_trait::async_trait;
use color_eyre::eyre::{Result, eyre};
use tracing::{debug, info};

use crate::catalog::{Catalog, OPERATION_FIELD, RecordStream, SERVICE_FIELD};
use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Service,
    Operation,
    Item,
}

impl Stage {
    pub const fn title(self) -> &'static str {
        match self {
            Self::Service => "Services",
            Self::Operation => "Operations",
            Self::Item => "Items",
        }
    }

    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Service => Some(Self::Operation),
            Self::Operation => Some(Self::Item),
            Self::Item => None,
        }
    }

    /// Field of a confirmed record that parameterises the next stage.
    pub const fn key_field(self) -> Option<&'static str> {
        match self {
            Self::Service => Some(SERVICE_FIELD),
            Self::Operation => Some(OPERATION_FIELD),
            Self::Item => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done(Record),
    Aborted,
}

/// Lets the operator choose one record from a stream.
#[async_trait]
pub trait Picker {
    /// Returns the confirmed record, or `None` if the operator cancelled.
    ///
    /// `breadcrumbs` holds the key values confirmed at earlier stages.
    async fn pick(
        &mut self,
        stage: Stage,
        breadcrumbs: &[String],
        records: RecordStream,
    ) -> Result<Option<Record>>;
}

/// Listing that follows a sequence of confirmed stages.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Listing {
    Operations { service: String },
    Items { service: String, operation: String },
}

impl Listing {
    fn after(confirmed: &[(Stage, Record)]) -> Result<Self> {
        match confirmed {
            [(Stage::Service, service)] => Ok(Self::Operations {
                service: key_value(Stage::Service, service)?,
            }),
            [(Stage::Service, service), (Stage::Operation, operation)] => Ok(Self::Items {
                service: key_value(Stage::Service, service)?,
                operation: key_value(Stage::Operation, operation)?,
            }),
            _ => Err(eyre!(
                "no listing follows {} confirmed stages",
                confirmed.len()
            )),
        }
    }

    fn open(self, catalog: &Catalog) -> RecordStream {
        match self {
            Self::Operations { service } => catalog.list_operations(&service),
            Self::Items { service, operation } => catalog.list_items(&service, &operation),
        }
    }
}

fn key_value(stage: Stage, record: &Record) -> Result<String> {
    let field = stage
        .key_field()
        .ok_or_else(|| eyre!("{} records do not lead anywhere", stage.title()))?;
    record
        .get(field)
        .map(str::to_string)
        .ok_or_else(|| eyre!("confirmed {} record {record} has no {field} field", stage.title()))
}

pub struct Cascade {
    catalog: Catalog,
    services: RecordStream,
}

impl Cascade {
    /// Open the service listing.
    ///
    /// # Errors
    /// Returns an error if the metadata source is unavailable.
    pub async fn start(catalog: Catalog) -> Result<Self> {
        let services = catalog.list_services().await?;
        Ok(Self { catalog, services })
    }

    /// Drive `picker` through the stages until the operator confirms an item
    /// or cancels.
    pub async fn run<P>(self, picker: &mut P) -> Result<Outcome>
    where
        P: Picker + ?Sized,
    {
        let Self { catalog, services } = self;
        let mut confirmed: Vec<(Stage, Record)> = Vec::with_capacity(3);
        let mut stage = Stage::Service;
        let mut records = services;

        loop {
            let breadcrumbs: Vec<String> = confirmed
                .iter()
                .map(|(stage, record)| key_value(*stage, record))
                .collect::<Result<_>>()?;

            let Some(record) = picker.pick(stage, &breadcrumbs, records).await? else {
                info!(stage = stage.title(), "Cancelled");
                return Ok(Outcome::Aborted);
            };
            debug!(stage = stage.title(), %record, "Confirmed");

            let Some(next) = stage.next() else {
                return Ok(Outcome::Done(record));
            };
            confirmed.push((stage, record));
            records = Listing::after(&confirmed)?.open(&catalog);
            stage = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use crossterm::event::KeyCode;
    use futures::StreamExt;
    use serde_json::json;

    use super::*;
    use crate::Theme;
    use crate::catalog::Page;
    use crate::catalog::testing::{FakeClient, FakeMetadata};
    use crate::config::KeyResolver;
    use crate::picker::TablePicker;
    use crate::picker::testing::TestSurface;

    enum Choice {
        Confirm(usize),
        Cancel,
    }

    /// Drains each stream, then answers with the next scripted choice.
    #[derive(Default)]
    struct ScriptedPicker {
        script: VecDeque<Choice>,
        stages: Vec<(Stage, Vec<String>)>,
        errors: Vec<String>,
    }

    impl ScriptedPicker {
        fn new(script: impl IntoIterator<Item = Choice>) -> Self {
            Self {
                script: script.into_iter().collect(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl Picker for ScriptedPicker {
        async fn pick(
            &mut self,
            stage: Stage,
            breadcrumbs: &[String],
            records: RecordStream,
        ) -> Result<Option<Record>> {
            self.stages.push((stage, breadcrumbs.to_vec()));
            let choice = self.script.pop_front().expect("script exhausted");
            let Choice::Confirm(index) = choice else {
                return Ok(None);
            };

            let mut rows = Vec::new();
            let mut records = records;
            while let Some(item) = records.next().await {
                match item {
                    Ok(record) => rows.push(record),
                    Err(err) => {
                        self.errors.push(err.to_string());
                        break;
                    }
                }
            }
            Ok(rows.get(index).cloned())
        }
    }

    fn demo_metadata() -> FakeMetadata {
        FakeMetadata::default()
            .service("demo", Some("Demo Service"))
            .operation("demo", "ListThings", Some(&[]), &["Things"])
            .operation("demo", "DescribeThing", Some(&["ThingId"]), &["Thing"])
    }

    fn page(things: &[&str], next: Option<&str>) -> Result<Page, String> {
        let things: Vec<_> = things.iter().map(|name| json!({"Name": name})).collect();
        Ok(Page {
            body: json!({ "Things": things }),
            next_token: next.map(str::to_string),
        })
    }

    fn table_picker(width: u16, height: u16, keys: &[KeyCode]) -> TablePicker<TestSurface> {
        TablePicker::new(
            TestSurface::with_keys(width, height, keys),
            Theme::default(),
            Arc::new(KeyResolver::default()),
            1,
        )
    }

    async fn cascade(client: Arc<FakeClient>) -> Cascade {
        let catalog = Catalog::new(Arc::new(demo_metadata()), client);
        Cascade::start(catalog).await.unwrap()
    }

    #[tokio::test]
    async fn test_confirming_every_stage_returns_item() {
        let client = Arc::new(FakeClient::with_pages(vec![page(&["a", "b"], None)]));
        let mut picker = ScriptedPicker::new([
            Choice::Confirm(0),
            Choice::Confirm(0),
            Choice::Confirm(1),
        ]);

        let outcome = cascade(client.clone()).await.run(&mut picker).await.unwrap();

        let Outcome::Done(record) = outcome else {
            panic!("expected a selection, got {outcome:?}");
        };
        assert_eq!(record.to_string(), "{Name: b}");
        assert_eq!(
            picker.stages,
            vec![
                (Stage::Service, vec![]),
                (Stage::Operation, vec!["demo".to_string()]),
                (Stage::Item, vec!["demo".to_string(), "ListThings".to_string()]),
            ]
        );
        assert_eq!(client.requests().len(), 1);
        assert_eq!(client.requests()[0].operation, "ListThings");
    }

    #[tokio::test]
    async fn test_cancel_at_service_aborts() {
        let client = Arc::new(FakeClient::default());
        let mut picker = ScriptedPicker::new([Choice::Cancel]);

        let outcome = cascade(client.clone()).await.run(&mut picker).await.unwrap();

        assert_eq!(outcome, Outcome::Aborted);
        assert_eq!(picker.stages.len(), 1);
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_at_operation_never_fetches_items() {
        let client = Arc::new(FakeClient::with_pages(vec![page(&["a"], None)]));
        let mut picker = ScriptedPicker::new([Choice::Confirm(0), Choice::Cancel]);

        let outcome = cascade(client.clone()).await.run(&mut picker).await.unwrap();

        assert_eq!(outcome, Outcome::Aborted);
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_item_survives_failure_later_in_listing() {
        let client = Arc::new(FakeClient::with_pages(vec![
            page(&["a", "b"], Some("1")),
            Err("throttled".to_string()),
        ]));
        let mut picker = ScriptedPicker::new([
            Choice::Confirm(0),
            Choice::Confirm(0),
            Choice::Confirm(1),
        ]);

        let outcome = cascade(client).await.run(&mut picker).await.unwrap();

        assert_eq!(outcome, Outcome::Done(Record::new().with("Name", "b")));
        assert_eq!(picker.errors.len(), 1);
        assert!(picker.errors[0].contains("throttled"));
    }

    #[tokio::test]
    async fn test_table_picker_drills_down_to_item() {
        let client = Arc::new(FakeClient::with_pages(vec![page(&["a", "b"], None)]));
        let mut picker = table_picker(
            80,
            12,
            &[KeyCode::Enter, KeyCode::Enter, KeyCode::Down, KeyCode::Enter],
        );

        let outcome = cascade(client.clone()).await.run(&mut picker).await.unwrap();

        let Outcome::Done(record) = outcome else {
            panic!("expected a selection, got {outcome:?}");
        };
        assert_eq!(record.to_string(), "{Name: b}");
        assert_eq!(client.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_at_item_stops_paging() {
        let names: Vec<String> = (0..20).map(|i| format!("item-{i}")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let client = Arc::new(FakeClient::with_pages(vec![
            page(&names, Some("1")),
            page(&["late"], None),
        ]));
        // 8 lines leave 4 visible rows; with a look-ahead of 1 the first page
        // alone covers everything the table asks for.
        let mut picker = table_picker(
            80,
            8,
            &[KeyCode::Enter, KeyCode::Enter, KeyCode::Down, KeyCode::Esc],
        );

        let outcome = cascade(client.clone()).await.run(&mut picker).await.unwrap();

        assert_eq!(outcome, Outcome::Aborted);
        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].starting_token, None);
    }

    #[tokio::test]
    async fn test_start_fails_when_metadata_unavailable() {
        let metadata = FakeMetadata {
            unavailable: true,
            ..FakeMetadata::default()
        };
        let catalog = Catalog::new(Arc::new(metadata), Arc::new(FakeClient::default()));
        assert!(Cascade::start(catalog).await.is_err());
    }

    #[test]
    fn test_listing_depends_only_on_key_fields() {
        let service = Record::new()
            .with("Service", "demo")
            .with("Description", "first");
        let operation = Record::new().with("Operation", "ListThings");
        let listing = Listing::after(&[(Stage::Service, service), (Stage::Operation, operation)]);

        let other_service = Record::new()
            .with("Description", "something else")
            .with("Service", "demo");
        let other_operation = Record::new()
            .with("Operation", "ListThings")
            .with("Extra", "ignored");
        let other = Listing::after(&[
            (Stage::Service, other_service),
            (Stage::Operation, other_operation),
        ]);

        assert_eq!(listing.unwrap(), other.unwrap());
    }

    #[test]
    fn test_listing_requires_key_field() {
        let service = Record::new().with("Name", "demo");
        let err = Listing::after(&[(Stage::Service, service)]).unwrap_err();
        assert!(err.to_string().contains("Service"));
    }
}

//! Interactive table picker over a lazy record stream.
//!
//! [`TablePicker`] drives a [`LazyTable`] from a single loop that selects
//! between the next terminal event and the next record, preferring records
//! whenever the table asks for more. Dropping the stream on return stops any
//! fetch still in flight.

use std::sync::Arc;

use async_trait::async_trait;
use color_eyre::eyre::{Result, eyre};
use futures::StreamExt;
use ratatui::Frame;
use tracing::{debug, warn};

use crate::Theme;
use crate::cascade::{Picker, Stage};
use crate::catalog::RecordStream;
use crate::config::KeyResolver;
use crate::record::Record;
use crate::tui::Event;
use crate::ui::{Component, Handled, LazyTable, PickerEvent};

/// Where the picker gets its input and draws its frames.
#[async_trait]
pub trait Surface: Send {
    /// Next terminal event, or `None` once the event source is gone.
    async fn next_event(&mut self) -> Option<Event>;

    fn draw(&mut self, render: &mut dyn FnMut(&mut Frame)) -> Result<()>;
}

pub struct TablePicker<S> {
    surface: S,
    theme: Theme,
    resolver: Arc<KeyResolver>,
    lookahead: usize,
}

impl<S: Surface> TablePicker<S> {
    pub const fn new(surface: S, theme: Theme, resolver: Arc<KeyResolver>, lookahead: usize) -> Self {
        Self {
            surface,
            theme,
            resolver,
            lookahead,
        }
    }

    /// Give back the surface, e.g. to restore the terminal.
    pub fn into_surface(self) -> S {
        self.surface
    }

    fn draw(&mut self, table: &mut LazyTable) -> Result<()> {
        let theme = self.theme;
        self.surface
            .draw(&mut |frame| {
                let area = frame.area();
                table.render(frame, area, &theme);
            })
    }
}

fn title(stage: Stage, breadcrumbs: &[String]) -> String {
    if breadcrumbs.is_empty() {
        stage.title().to_string()
    } else {
        format!("{} · {}", stage.title(), breadcrumbs.join(" › "))
    }
}

#[async_trait]
impl<S: Surface> Picker for TablePicker<S> {
    async fn pick(
        &mut self,
        stage: Stage,
        breadcrumbs: &[String],
        mut records: RecordStream,
    ) -> Result<Option<Record>> {
        let mut table = LazyTable::new(
            title(stage, breadcrumbs),
            self.lookahead,
            Arc::clone(&self.resolver),
        );
        // The first frame sizes the viewport, which sets the pull target.
        self.draw(&mut table)?;

        loop {
            tokio::select! {
                biased;

                item = records.next(), if table.wants_more() => match item {
                    Some(Ok(record)) => table.push(record),
                    Some(Err(err)) => {
                        warn!(stage = stage.title(), %err, "Listing ended with an error");
                        table.fail(err.to_string());
                    }
                    None => {
                        debug!(stage = stage.title(), rows = table.rows().len(), "Listing exhausted");
                        table.finish();
                    }
                },

                event = self.surface.next_event() => match event {
                    Some(Event::Key(key)) => {
                        if let Handled::Event(event) = table.handle_key(key)? {
                            return Ok(match event {
                                PickerEvent::Confirmed(record) => Some(record),
                                PickerEvent::Cancelled => None,
                            });
                        }
                        self.draw(&mut table)?;
                    }
                    Some(Event::Tick) => table.on_tick(),
                    Some(Event::Init | Event::Render | Event::Resize(_, _)) => self.draw(&mut table)?,
                    Some(Event::Error(message)) => return Err(eyre!("terminal event error: {message}")),
                    Some(Event::Quit) | None => return Ok(None),
                },
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use crossterm::event::KeyCode;
    use futures::stream;

    use super::testing::{TestSurface, key};
    use super::*;

    fn table_picker(surface: TestSurface, lookahead: usize) -> TablePicker<TestSurface> {
        TablePicker::new(
            surface,
            Theme::default(),
            Arc::new(KeyResolver::default()),
            lookahead,
        )
    }

    /// Sets its flag when dropped.
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    fn named(name: impl Into<String>) -> Record {
        Record::new().with("Name", name)
    }

    fn records(names: &[&str]) -> RecordStream {
        let items: Vec<Result<Record>> = names.iter().map(|name| Ok(named(*name))).collect();
        stream::iter(items).boxed()
    }

    #[tokio::test]
    async fn test_confirms_highlighted_record() {
        let surface = TestSurface::with_keys(80, 10, &[KeyCode::Down, KeyCode::Enter]);
        let mut picker = table_picker(surface, 5);

        let picked = picker
            .pick(Stage::Item, &[], records(&["a", "b", "c"]))
            .await
            .unwrap();
        assert_eq!(picked, Some(named("b")));
    }

    #[tokio::test]
    async fn test_cancel_returns_nothing() {
        let surface = TestSurface::with_keys(80, 10, &[KeyCode::Down, KeyCode::Esc]);
        let mut picker = table_picker(surface, 5);

        let picked = picker
            .pick(Stage::Service, &[], records(&["a", "b"]))
            .await
            .unwrap();
        assert_eq!(picked, None);
    }

    #[tokio::test]
    async fn test_pulls_only_visible_rows_plus_lookahead() {
        static PULLED: AtomicUsize = AtomicUsize::new(0);
        let endless = stream::iter(0_u64..)
            .inspect(|_| {
                PULLED.fetch_add(1, Ordering::SeqCst);
            })
            .map(|i| Ok(named(i.to_string())))
            .boxed();

        // 10 lines: 9 for the table, 6 of them data rows.
        let surface = TestSurface::with_keys(80, 10, &[KeyCode::Esc]);
        let mut picker = table_picker(surface, 3);

        let picked = picker.pick(Stage::Item, &[], endless).await.unwrap();
        assert_eq!(picked, None);
        assert_eq!(PULLED.load(Ordering::SeqCst), 9);
    }

    #[tokio::test]
    async fn test_navigation_does_not_wait_for_pending_pull() {
        let (surface, tx) = TestSurface::new(80, 10);
        tx.send(key(KeyCode::Down)).unwrap();
        tx.send(key(KeyCode::Esc)).unwrap();
        let mut picker = table_picker(surface, 3);

        let picked = picker
            .pick(Stage::Item, &[], stream::pending::<Result<Record>>().boxed())
            .await
            .unwrap();
        assert_eq!(picked, None);
    }

    #[tokio::test]
    async fn test_stream_error_keeps_rows_selectable() {
        let items: Vec<Result<Record>> = vec![
            Ok(named("a")),
            Ok(named("b")),
            Err(eyre!("throttled")),
            Ok(named("never")),
        ];
        let surface = TestSurface::with_keys(80, 10, &[KeyCode::Down, KeyCode::Down, KeyCode::Enter]);
        let mut picker = table_picker(surface, 5);

        let picked = picker
            .pick(Stage::Item, &[], stream::iter(items).boxed())
            .await
            .unwrap();
        assert_eq!(picked, Some(named("b")));
    }

    #[tokio::test]
    async fn test_closed_event_source_cancels() {
        let (surface, tx) = TestSurface::new(80, 10);
        drop(tx);
        let mut picker = table_picker(surface, 3);

        let picked = picker
            .pick(Stage::Service, &[], records(&["a"]))
            .await
            .unwrap();
        assert_eq!(picked, None);
    }

    #[tokio::test]
    async fn test_quit_cancels_and_error_propagates() {
        let (surface, tx) = TestSurface::new(80, 10);
        tx.send(Event::Quit).unwrap();
        let mut picker = table_picker(surface, 3);
        let picked = picker.pick(Stage::Service, &[], records(&["a"])).await.unwrap();
        assert_eq!(picked, None);

        let (surface, tx) = TestSurface::new(80, 10);
        tx.send(Event::Error("tty gone".to_string())).unwrap();
        let mut picker = table_picker(surface, 3);
        let err = picker
            .pick(Stage::Service, &[], records(&["a"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("tty gone"));
    }

    #[tokio::test]
    async fn test_title_shows_breadcrumbs() {
        let (surface, tx) = TestSurface::new(80, 10);
        let mut picker = table_picker(surface, 3);
        tx.send(Event::Render).unwrap();
        tx.send(key(KeyCode::Esc)).unwrap();

        let breadcrumbs = vec!["demo".to_string(), "ListThings".to_string()];
        picker
            .pick(Stage::Item, &breadcrumbs, records(&["a"]))
            .await
            .unwrap();

        let text: String = picker
            .surface
            .terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(text.contains("Items · demo › ListThings"));
    }

    #[tokio::test]
    async fn test_cancel_drops_stream_with_pull_in_flight() {
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(Arc::clone(&dropped));
        let first: Result<Record> = Ok(named("a"));
        let stalled = stream::iter([first])
            .chain(stream::pending())
            .map(move |item| {
                let _owner = &flag;
                item
            })
            .boxed();

        let surface = TestSurface::with_keys(80, 10, &[KeyCode::Esc]);
        let mut picker = table_picker(surface, 3);

        let picked = picker.pick(Stage::Item, &[], stalled).await.unwrap();
        assert_eq!(picked, None);
        assert!(dropped.load(Ordering::SeqCst));
    }
}

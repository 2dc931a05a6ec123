#![forbid(unsafe_code)]

//! Structured log output of the layout engine.
//!
//! Lifecycle conditions that are handled silently (dangling attachments,
//! corrupt records, snap zone changes) must still leave a structured trace.
//!
//! Run:
//!   cargo test -p panelgrid-layout --test tracing_events

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use panelgrid_core::geometry::CellRect;
use panelgrid_layout::{
    Attachment, AttachmentEnforcer, Edge, GridLimits, LayoutStorage, LayoutStore, MemoryStorage,
    PanelPlacement, PanelRegistration, PanelRegistry, PersistenceAdapter, WorkspaceId,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;

#[derive(Debug, Clone)]
struct CapturedSpan {
    name: String,
    fields: HashMap<String, String>,
}

#[derive(Debug, Clone)]
struct CapturedEvent {
    level: tracing::Level,
    message: Option<String>,
    fields: HashMap<String, String>,
    span: Option<String>,
}

#[derive(Default)]
struct Capture {
    spans: Arc<Mutex<Vec<CapturedSpan>>>,
    events: Arc<Mutex<Vec<CapturedEvent>>>,
    span_index: Arc<Mutex<HashMap<u64, usize>>>,
}

struct FieldVisitor(Vec<(String, String)>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
}

impl<S> tracing_subscriber::Layer<S> for Capture
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor(Vec::new());
        attrs.record(&mut visitor);
        let mut spans = self.spans.lock().unwrap();
        self.span_index
            .lock()
            .unwrap()
            .insert(id.into_u64(), spans.len());
        spans.push(CapturedSpan {
            name: attrs.metadata().name().to_string(),
            fields: visitor.0.into_iter().collect(),
        });
    }

    fn on_record(
        &self,
        id: &tracing::span::Id,
        values: &tracing::span::Record<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor(Vec::new());
        values.record(&mut visitor);
        if let Some(&idx) = self.span_index.lock().unwrap().get(&id.into_u64())
            && let Some(span) = self.spans.lock().unwrap().get_mut(idx)
        {
            span.fields.extend(visitor.0);
        }
    }

    fn on_event(&self, event: &tracing::Event<'_>, ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = FieldVisitor(Vec::new());
        event.record(&mut visitor);
        let fields: HashMap<String, String> = visitor.0.into_iter().collect();
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message: fields.get("message").cloned(),
            fields,
            span: ctx.event_span(event).map(|span| span.name().to_string()),
        });
    }
}

fn with_capture<F: FnOnce()>(f: F) -> (Vec<CapturedSpan>, Vec<CapturedEvent>) {
    let capture = Capture::default();
    let spans = Arc::clone(&capture.spans);
    let events = Arc::clone(&capture.events);
    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::filter::LevelFilter::TRACE)
        .with(capture);
    tracing::subscriber::with_default(subscriber, f);
    let spans = spans.lock().unwrap().clone();
    let events = events.lock().unwrap().clone();
    (spans, events)
}

fn find<'a>(events: &'a [CapturedEvent], message: &str) -> Option<&'a CapturedEvent> {
    events
        .iter()
        .find(|e| e.message.as_deref() == Some(message))
}

fn p(id: &str, x: u16, y: u16, w: u16, h: u16) -> PanelPlacement {
    PanelPlacement::new(id, x, y, w, h)
}

#[test]
fn dangling_attachment_prune_is_logged() {
    let workspace = WorkspaceId::new("logs");
    let (_, events) = with_capture(|| {
        let store = LayoutStore::new(GridLimits::default());
        let _enforcer = AttachmentEnforcer::install(&store);
        store.set(&workspace, vec![p("a", 0, 0, 6, 6), p("b", 0, 6, 6, 4)]);
        store
            .attach(&workspace, Attachment::new("b", "a", Edge::Bottom))
            .unwrap();
        // Replacing the placements without "a" leaves the attachment dangling.
        store.set(&workspace, vec![p("b", 0, 6, 6, 4)]);
        assert!(store.attachments(&workspace).is_empty());
    });

    let pruned = find(&events, "pruned dangling attachment").expect("prune event");
    assert_eq!(pruned.level, tracing::Level::INFO);
    assert_eq!(pruned.fields.get("child").map(String::as_str), Some("b"));
    assert_eq!(pruned.fields.get("parent").map(String::as_str), Some("a"));
    assert_eq!(
        pruned.fields.get("reason").map(String::as_str),
        Some("panel removed")
    );
}

#[test]
fn corrupt_record_warns_with_workspace() {
    let workspace = WorkspaceId::new("broken");
    let (_, events) = with_capture(|| {
        let storage = MemoryStorage::new();
        storage.save(&workspace, "not json at all").unwrap();
        let adapter = PersistenceAdapter::new(storage);
        let store = LayoutStore::new(GridLimits::default());
        let registry = PanelRegistry::new([PanelRegistration::new(
            "a",
            "A",
            CellRect::new(0, 0, 4, 4),
        )]);
        adapter.restore(&store, &workspace, &registry);
    });

    let warning = find(&events, "corrupt layout record; falling back to defaults")
        .expect("corrupt record warning");
    assert_eq!(warning.level, tracing::Level::WARN);
    assert_eq!(
        warning.fields.get("workspace").map(String::as_str),
        Some("broken")
    );
    assert!(warning.fields.contains_key("error"));
}

#[test]
fn commits_run_inside_a_versioned_span() {
    let workspace = WorkspaceId::new("spans");
    let (spans, events) = with_capture(|| {
        let store = LayoutStore::new(GridLimits::default());
        store.set(&workspace, vec![p("a", 0, 3, 6, 6)]);
    });

    let commit = spans
        .iter()
        .find(|s| s.name == "panelgrid.commit")
        .expect("commit span");
    assert_eq!(commit.fields.get("version").map(String::as_str), Some("1"));
    assert_eq!(commit.fields.get("workspace").map(String::as_str), Some("spans"));

    let committed = find(&events, "layout committed").expect("commit event");
    assert_eq!(committed.level, tracing::Level::DEBUG);
    assert_eq!(committed.span.as_deref(), Some("panelgrid.commit"));
}

#[test]
fn unchanged_commit_is_silent() {
    let workspace = WorkspaceId::new("quiet");
    let store = LayoutStore::new(GridLimits::default());
    store.set(&workspace, vec![p("a", 0, 0, 6, 6)]);
    let (_, events) = with_capture(|| {
        store.set(&workspace, vec![p("a", 0, 0, 6, 6)]);
    });
    assert!(find(&events, "layout committed").is_none());
}

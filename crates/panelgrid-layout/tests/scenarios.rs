//! End-to-end layout scenarios through the public API.
//!
//! Each test wires a store with the attachment enforcer installed, the way
//! a host does, and checks the committed placements after the cascade of
//! store notifications has settled.

use std::cell::Cell;
use std::rc::Rc;

use panelgrid_core::event::{ContainerSize, PointerPosition};
use panelgrid_core::geometry::CellRect;
use panelgrid_layout::grid::compact_groups;
use panelgrid_layout::persist::encode_record;
use panelgrid_layout::{
    AttachError, Attachment, AttachmentEnforcer, DragHandle, Edge, EngineConfig, GridLimits,
    LayoutError, LayoutRecord, LayoutStorage, LayoutStore, LoadOutcome, MemoryStorage,
    PanelEngine, PanelId, PanelPlacement, PanelRegistration, PanelRegistry, PersistenceAdapter,
    PlacementPatch, SnapTarget, Subscription, WorkspaceId, enforce,
};

fn p(id: &str, x: u16, y: u16, w: u16, h: u16) -> PanelPlacement {
    PanelPlacement::new(id, x, y, w, h)
}

fn ws() -> WorkspaceId {
    WorkspaceId::new("session-1")
}

fn placement(store: &LayoutStore, id: &str) -> PanelPlacement {
    store
        .layout(&ws())
        .and_then(|l| l.placement(&PanelId::new(id)).cloned())
        .unwrap_or_else(|| panic!("panel {id} missing"))
}

fn enforced_store(placements: Vec<PanelPlacement>) -> (LayoutStore, Subscription) {
    let store = LayoutStore::new(GridLimits::default());
    let guard = AttachmentEnforcer::install(&store);
    store.set(&ws(), placements);
    (store, guard)
}

#[test]
fn drag_near_bottom_edge_snaps_and_attaches() {
    let mut engine = PanelEngine::new(
        EngineConfig::default(),
        MemoryStorage::new(),
        ContainerSize::new(1350, 900),
    )
    .unwrap();
    engine.switch_workspace(
        ws(),
        PanelRegistry::new([
            PanelRegistration::new("a", "A", CellRect::new(0, 0, 6, 6)),
            PanelRegistration::new("b", "B", CellRect::new(6, 0, 6, 4))
                .with_snap_target(SnapTarget::new("a", [Edge::Bottom]).with_distance(20)),
        ]),
    );

    engine.pointer_down("b", 7, PointerPosition::new(900, 40), DragHandle::Move);
    engine.pointer_move(7, PointerPosition::new(820, 200));
    engine.pointer_move(7, PointerPosition::new(800, 290));
    engine.on_frame();
    assert!(engine.snap_zone().is_some());
    engine.pointer_up(7, PointerPosition::new(800, 290));

    let layout = engine.layout().unwrap();
    assert_eq!(layout.placement(&PanelId::new("b")), Some(&p("b", 0, 6, 6, 4)));
    assert_eq!(
        layout.attachments.to_vec(),
        vec![Attachment::new("b", "a", Edge::Bottom)]
    );

    // The committed layout was autosaved with its attachment.
    let saved = engine.persistence().load(&ws()).unwrap().unwrap();
    assert_eq!(saved.record.attachments, layout.attachments.to_vec());
}

#[test]
fn moving_parent_cascades_through_chain() {
    let (store, _guard) = enforced_store(vec![
        p("c", 0, 0, 12, 3),
        p("a", 0, 3, 6, 6),
        p("b", 0, 9, 6, 4),
        p("d", 0, 13, 6, 3),
    ]);
    store
        .attach(&ws(), Attachment::new("b", "a", Edge::Bottom))
        .unwrap();
    store
        .attach(&ws(), Attachment::new("d", "b", Edge::Bottom))
        .unwrap();

    store
        .patch(&ws(), &PanelId::new("a"), PlacementPatch::moved_to(2, 3))
        .unwrap();

    assert_eq!(placement(&store, "c"), p("c", 0, 0, 12, 3));
    assert_eq!(placement(&store, "a"), p("a", 2, 3, 6, 6));
    assert_eq!(placement(&store, "b"), p("b", 2, 9, 6, 4));
    assert_eq!(placement(&store, "d"), p("d", 2, 13, 6, 3));
}

#[test]
fn detach_leaves_child_in_place() {
    let (store, _guard) = enforced_store(vec![p("a", 0, 0, 6, 6), p("b", 6, 0, 3, 6)]);
    store
        .attach(&ws(), Attachment::new("b", "a", Edge::Right))
        .unwrap();
    let attached = placement(&store, "b");

    let removed = store.detach(&ws(), &PanelId::new("b")).unwrap();
    assert_eq!(removed, Some(Attachment::new("b", "a", Edge::Right)));
    assert_eq!(placement(&store, "b"), attached);

    // Growing a no longer stretches b.
    store
        .patch(&ws(), &PanelId::new("a"), PlacementPatch::resized_to(6, 8))
        .unwrap();
    assert_eq!(placement(&store, "a"), p("a", 0, 0, 6, 8));
    assert_eq!(placement(&store, "b"), p("b", 6, 0, 3, 6));
}

#[test]
fn restore_fills_in_unsaved_panels() {
    let storage = MemoryStorage::new();
    let record = LayoutRecord::new(vec![p("a", 0, 0, 12, 4)], Vec::new());
    storage
        .save(&ws(), &encode_record(&record).unwrap())
        .unwrap();
    let adapter = PersistenceAdapter::new(storage);
    let store = LayoutStore::new(GridLimits::default());
    let registry = PanelRegistry::new([
        PanelRegistration::new("a", "A", CellRect::new(0, 0, 6, 6)),
        PanelRegistration::new("b", "B", CellRect::new(6, 0, 6, 4)),
        PanelRegistration::new("c", "C", CellRect::new(0, 6, 4, 3)),
    ]);

    let outcome = adapter.restore(&store, &ws(), &registry);

    assert_eq!(outcome, LoadOutcome::Restored { from_version: 1 });
    assert_eq!(placement(&store, "a"), p("a", 0, 0, 12, 4));
    assert_eq!(placement(&store, "b"), p("b", 6, 4, 6, 4));
    assert_eq!(placement(&store, "c"), p("c", 0, 4, 4, 3));
}

#[test]
fn corrupt_record_falls_back_to_defaults() {
    let storage = MemoryStorage::new();
    storage.save(&ws(), "{\"panels\": 7").unwrap();
    let adapter = PersistenceAdapter::new(storage);
    let store = LayoutStore::new(GridLimits::default());
    let registry = PanelRegistry::new([PanelRegistration::new(
        "a",
        "A",
        CellRect::new(0, 0, 6, 6),
    )]);

    let outcome = adapter.restore(&store, &ws(), &registry);

    assert!(matches!(outcome, LoadOutcome::Corrupt { .. }));
    assert_eq!(store.get(&ws()), vec![p("a", 0, 0, 6, 6)]);
}

#[test]
fn cyclic_attachment_is_rejected() {
    let (store, _guard) = enforced_store(vec![p("a", 0, 0, 6, 6), p("b", 0, 6, 6, 4)]);
    store
        .attach(&ws(), Attachment::new("b", "a", Edge::Bottom))
        .unwrap();
    let version = store.version(&ws());

    let err = store
        .attach(&ws(), Attachment::new("a", "b", Edge::Bottom))
        .unwrap_err();

    assert_eq!(
        err,
        LayoutError::Attach(AttachError::Cycle {
            child: PanelId::new("a"),
            parent: PanelId::new("b"),
        })
    );
    assert_eq!(store.version(&ws()), version);
    assert_eq!(
        store.attachments(&ws()),
        vec![Attachment::new("b", "a", Edge::Bottom)]
    );
}

#[test]
fn second_child_on_same_parent_is_rejected() {
    let (store, _guard) = enforced_store(vec![
        p("a", 0, 0, 6, 6),
        p("b", 0, 6, 6, 4),
        p("c", 6, 0, 6, 4),
    ]);
    store
        .attach(&ws(), Attachment::new("b", "a", Edge::Bottom))
        .unwrap();
    let err = store
        .attach(&ws(), Attachment::new("c", "a", Edge::Right))
        .unwrap_err();
    assert!(matches!(
        err,
        LayoutError::Attach(AttachError::ParentOccupied { .. })
    ));
}

#[test]
fn notifications_settle_on_a_fixed_point() {
    let (store, _guard) = enforced_store(vec![
        p("a", 0, 0, 4, 4),
        p("b", 0, 4, 4, 3),
        p("c", 4, 0, 4, 5),
        p("d", 8, 0, 4, 3),
    ]);
    store
        .attach(&ws(), Attachment::new("b", "a", Edge::Bottom))
        .unwrap();
    store
        .attach(&ws(), Attachment::new("d", "c", Edge::Right))
        .unwrap();

    let notified = Rc::new(Cell::new(0_usize));
    let counter = Rc::clone(&notified);
    let _count = store.subscribe(move |_| counter.set(counter.get() + 1));

    store
        .patch(&ws(), &PanelId::new("a"), PlacementPatch::resized_to(4, 7))
        .unwrap();
    assert!(notified.get() <= 3, "cascade ran {} times", notified.get());

    let layout = store.layout(&ws()).unwrap();
    let mut graph = layout.attachments.clone();
    let again = enforce(&layout.placements, &mut graph, 12);
    assert!(!again.changed(&layout.placements));
    let recompacted = compact_groups(&layout.placements, store.limits(), |pl| {
        layout.attachments.root_of(&pl.id)
    });
    assert_eq!(recompacted, layout.placements);
    assert_eq!(placement(&store, "b"), p("b", 0, 7, 4, 3));
}

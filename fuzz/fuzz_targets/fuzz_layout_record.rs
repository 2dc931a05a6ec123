#![no_main]

use libfuzzer_sys::fuzz_target;
use panelgrid_core::geometry::CellRect;
use panelgrid_layout::grid::overlapping_pairs;
use panelgrid_layout::persist::{decode_record, merge_with_defaults};
use panelgrid_layout::{
    ChangeCause, GridLimits, LayoutStore, PanelRegistration, PanelRegistry, WorkspaceId,
};

fuzz_target!(|data: &[u8]| {
    let Ok(payload) = std::str::from_utf8(data) else {
        return;
    };
    // Decoding untrusted input must fail cleanly, never panic.
    let Ok(migration) = decode_record(payload) else {
        return;
    };

    let registry = PanelRegistry::new([
        PanelRegistration::new("a", "A", CellRect::new(0, 0, 6, 6)),
        PanelRegistration::new("b", "B", CellRect::new(6, 0, 6, 4)),
        PanelRegistration::new("c", "C", CellRect::new(0, 6, 12, 3)),
    ]);
    let limits = GridLimits::default();
    let layout = merge_with_defaults(&migration.record, &registry, limits);

    assert_eq!(layout.placements.len(), registry.len(), "every registered panel is placed");
    for placement in &layout.placements {
        assert!(limits.is_valid(placement), "invalid placement {placement:?}");
    }

    let store = LayoutStore::new(limits);
    let workspace = WorkspaceId::new("fuzz");
    store.replace(&workspace, layout, ChangeCause::Restore);
    assert!(overlapping_pairs(&store.get(&workspace)).is_empty());
});

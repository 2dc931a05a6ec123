#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use panelgrid_layout::grid::overlapping_pairs;
use panelgrid_layout::{
    Attachment, AttachmentEnforcer, Edge, GridLimits, LayoutStore, PanelId, PanelPlacement,
    PlacementPatch, WorkspaceId, enforce,
};

#[derive(Debug, Arbitrary)]
enum Op {
    Move { panel: u8, x: u8, y: u8 },
    Resize { panel: u8, w: u8, h: u8 },
    Attach { child: u8, parent: u8, edge: u8 },
    Detach { panel: u8 },
    Remove { panel: u8 },
}

#[derive(Debug, Arbitrary)]
struct Input {
    panels: Vec<(u8, u8, u8, u8)>,
    ops: Vec<Op>,
}

fn id(n: u8) -> PanelId {
    PanelId::new(format!("p{}", n % 8))
}

fuzz_target!(|input: Input| {
    let limits = GridLimits::default();
    let store = LayoutStore::new(limits);
    let _enforcer = AttachmentEnforcer::install(&store);
    let workspace = WorkspaceId::new("fuzz");

    let placements: Vec<PanelPlacement> = input
        .panels
        .iter()
        .take(8)
        .enumerate()
        .map(|(i, &(x, y, w, h))| {
            PanelPlacement::new(
                format!("p{i}"),
                u16::from(x % 16),
                u16::from(y % 40),
                u16::from(w % 16),
                u16::from(h % 12),
            )
        })
        .collect();
    store.set(&workspace, placements);

    for op in input.ops.iter().take(64) {
        let _ = match *op {
            Op::Move { panel, x, y } => store
                .patch(
                    &workspace,
                    &id(panel),
                    PlacementPatch::moved_to(u16::from(x % 16), u16::from(y % 40)),
                )
                .map(|_| ()),
            Op::Resize { panel, w, h } => store
                .patch(
                    &workspace,
                    &id(panel),
                    PlacementPatch::resized_to(u16::from(w % 16), u16::from(h % 12)),
                )
                .map(|_| ()),
            Op::Attach {
                child,
                parent,
                edge,
            } => {
                let edge = Edge::ALL[usize::from(edge) % Edge::ALL.len()];
                store
                    .attach(&workspace, Attachment::new(id(child), id(parent), edge))
                    .map(|_| ())
            }
            Op::Detach { panel } => store.detach(&workspace, &id(panel)).map(|_| ()),
            Op::Remove { panel } => store.remove_panel(&workspace, &id(panel)).map(|_| ()),
        };

        let layout = store.layout(&workspace).expect("workspace was set");
        assert!(
            overlapping_pairs(&layout.placements).is_empty(),
            "overlap after {op:?}"
        );
        for placement in &layout.placements {
            assert!(limits.is_valid(placement), "invalid placement {placement:?}");
        }
        let mut graph = layout.attachments.clone();
        let again = enforce(&layout.placements, &mut graph, limits.columns);
        assert!(!again.changed(&layout.placements), "enforcer not settled after {op:?}");
    }
});

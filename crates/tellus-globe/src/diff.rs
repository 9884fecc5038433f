//! Structural diff between two snapshots, as changed bounding boxes.

use std::sync::Arc;

use tellus_geo::GeoBounds;
use tellus_mesh::{TriId, TriStore};

use crate::snapshot::GlobeSnapshot;

const VERT_EPS_M: f64 = 1e-6;

/// Bounding boxes of every region where the two snapshots disagree,
/// coalesced so consumers get a compact redraw list.
#[must_use]
pub fn snapshot_diff(old: &GlobeSnapshot, new: &GlobeSnapshot) -> Vec<GeoBounds> {
    let mut changed = Vec::new();
    let [old_n, old_s] = old.roots();
    let [new_n, new_s] = new.roots();
    diff_rec(old, old_n, new, new_n, &mut changed);
    diff_rec(old, old_s, new, new_s, &mut changed);
    coalesce_bounds(changed)
}

fn diff_rec(
    old: &GlobeSnapshot,
    old_id: TriId,
    new: &GlobeSnapshot,
    new_id: TriId,
    out: &mut Vec<GeoBounds>,
) {
    // Petrified subtrees shared by both snapshots are identical by
    // construction; pointer identity proves it without walking them.
    if let (Some(a), Some(b)) = (old.shared(old_id), new.shared(new_id)) {
        if Arc::ptr_eq(a, b) {
            return;
        }
    }
    let o = old.tri(old_id);
    let n = new.tri(new_id);
    match (o.children, n.children) {
        (None, None) => {
            let moved = [(o.a, n.a), (o.b, n.b), (o.c, n.c)].into_iter().any(
                |(ov, nv)| (old.vert(ov).model - new.vert(nv).model).length() > VERT_EPS_M,
            );
            if moved {
                out.push(o.bounds.union(&n.bounds));
            }
        }
        (Some((ol, or)), Some((nl, nr))) => {
            diff_rec(old, ol, new, nl, out);
            diff_rec(old, or, new, nr, out);
        }
        // Split or merged here: the whole footprint changed.
        _ => out.push(o.bounds.union(&n.bounds)),
    }
}

/// Merge intersecting boxes until none overlap.
#[must_use]
pub fn coalesce_bounds(mut boxes: Vec<GeoBounds>) -> Vec<GeoBounds> {
    loop {
        let mut merged_any = false;
        let mut out: Vec<GeoBounds> = Vec::with_capacity(boxes.len());
        'next: for b in boxes {
            for existing in &mut out {
                if existing.intersects(&b) {
                    *existing = existing.union(&b);
                    merged_any = true;
                    continue 'next;
                }
            }
            out.push(b);
        }
        boxes = out;
        if !merged_any {
            return boxes;
        }
    }
}

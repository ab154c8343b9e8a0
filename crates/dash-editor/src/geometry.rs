//! Overlap classification and grid displacement.

use dash_core::id::WidgetId;
use dash_core::model::Position;
use std::collections::HashMap;

/// How a candidate box relates to an existing widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Boxes do not overlap.
    None,
    /// Overlapping; the candidate belongs above the widget.
    Up,
    /// Overlapping; the candidate's top is past the widget's vertical
    /// midpoint, so it belongs below.
    Down,
}

/// Half-extent overlap test between `candidate` and `widget`.
///
/// Boxes overlap when their center deltas are strictly within the summed
/// half-extents on both axes; touching edges do not overlap.
pub fn classify(candidate: &Position, widget: &Position) -> Placement {
    let w = 0.5 * (candidate.width + widget.width);
    let h = 0.5 * (candidate.height + widget.height);
    let (cx, cy) = candidate.center();
    let (wx, wy) = widget.center();
    let dx = cx - wx;
    let dy = cy - wy;

    if dx.abs() < w && dy.abs() < h {
        if candidate.top > widget.top + 0.5 * widget.height {
            Placement::Down
        } else {
            Placement::Up
        }
    } else {
        Placement::None
    }
}

pub fn overlaps(a: &Position, b: &Position) -> bool {
    classify(a, b) != Placement::None
}

/// Where a dropped box lands: moved below every widget it lands on the
/// lower half of.
pub fn drop_target(candidate: Position, others: &[(WidgetId, Position)]) -> Position {
    let mut placed = candidate;
    let mut sorted: Vec<&Position> = others.iter().map(|(_, p)| p).collect();
    sorted.sort_by(|a, b| a.top.total_cmp(&b.top));

    // Each step strictly increases `placed.top`; bounded by widget count.
    for _ in 0..=sorted.len() {
        let Some(below_of) = sorted
            .iter()
            .find(|p| classify(&placed, p) == Placement::Down)
        else {
            break;
        };
        placed.top = below_of.bottom();
    }
    placed
}

/// Result of settling a committed box among its neighbours.
#[derive(Debug, Clone, PartialEq)]
pub struct Settled {
    pub position: Position,
    /// Neighbours that had to move, with their new positions.
    pub displaced: Vec<(WidgetId, Position)>,
}

/// Place `candidate` among `others` without overlap.
///
/// The candidate first drops below widgets it lands on the lower half of;
/// widgets it then still overlaps are pushed below it, cascading to their
/// own neighbours.
pub fn settle(candidate: Position, others: &[(WidgetId, Position)]) -> Settled {
    let position = drop_target(candidate, others);

    let mut current: HashMap<WidgetId, Position> = others.iter().copied().collect();
    let mut order: Vec<WidgetId> = others.iter().map(|(id, _)| *id).collect();
    order.sort_by(|a, b| current[a].top.total_cmp(&current[b].top).then(a.cmp(b)));

    // (widget doing the pushing, its box); `None` is the candidate itself
    let mut pushers: Vec<(Option<WidgetId>, Position)> = vec![(None, position)];
    let mut moved: Vec<WidgetId> = Vec::new();
    // Every push moves a widget strictly down; cap the work regardless.
    let mut budget = (others.len() + 1) * (others.len() + 1);

    while let Some((pusher_id, pusher)) = pushers.pop() {
        for id in &order {
            if budget == 0 {
                break;
            }
            if pusher_id == Some(*id) {
                continue;
            }
            let pos = current[id];
            if overlaps(&pos, &pusher) {
                budget -= 1;
                let pushed = Position {
                    top: pusher.bottom(),
                    ..pos
                };
                current.insert(*id, pushed);
                if !moved.contains(id) {
                    moved.push(*id);
                }
                pushers.push((Some(*id), pushed));
            }
        }
    }

    let displaced = moved.into_iter().map(|id| (id, current[&id])).collect();
    Settled {
        position,
        displaced,
    }
}

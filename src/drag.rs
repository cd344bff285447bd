//! Gesture to reorder translation for the setlist.
//!
//! A drag is tracked as `Idle -> Pending -> Dragging -> Idle`. Hover updates
//! while dragging are advisory; the setlist is mutated at most once, when the
//! pointer is released over a different row.

use std::time::{Duration, Instant};

use log::{debug, error, trace};

use crate::config::DragConfig;
use crate::setlist::{ReorderError, Setlist};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Mouse,
    Touch,
}

/// Pointer position in logical pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerPoint {
    pub x: f32,
    pub y: f32,
}

impl PointerPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn distance_to(&self, other: PointerPoint) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Activation thresholds separating a drag from a tap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragThresholds {
    pub touch_activation_delay: Duration,
    pub touch_tolerance_px: f32,
    pub pointer_activation_distance_px: f32,
}

impl From<&DragConfig> for DragThresholds {
    fn from(config: &DragConfig) -> Self {
        Self {
            touch_activation_delay: Duration::from_millis(config.touch_activation_delay_ms),
            touch_tolerance_px: config.touch_tolerance_px,
            pointer_activation_distance_px: config.pointer_activation_distance_px,
        }
    }
}

impl Default for DragThresholds {
    fn default() -> Self {
        Self::from(&DragConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragPhase {
    Idle,
    /// Grab affordance pressed; not yet a drag.
    Pending {
        start_index: usize,
        kind: PointerKind,
        origin: PointerPoint,
        pressed_at: Instant,
    },
    Dragging {
        start_index: usize,
        hover_index: usize,
    },
}

/// What a finished gesture did to the setlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragOutcome {
    /// Released before the drag activated.
    Tap { index: usize },
    NoChange,
    Committed { from: usize, to: usize },
    /// The move was refused by the setlist; the order is unchanged.
    Rejected(ReorderError),
}

#[derive(Debug, Clone)]
pub struct DragReorderController {
    thresholds: DragThresholds,
    phase: DragPhase,
}

impl DragReorderController {
    pub fn new(thresholds: DragThresholds) -> Self {
        Self {
            thresholds,
            phase: DragPhase::Idle,
        }
    }

    pub fn phase(&self) -> DragPhase {
        self.phase
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.phase, DragPhase::Dragging { .. })
    }

    pub fn dragging_index(&self) -> Option<usize> {
        match self.phase {
            DragPhase::Dragging { start_index, .. } => Some(start_index),
            _ => None,
        }
    }

    pub fn hover_index(&self) -> Option<usize> {
        match self.phase {
            DragPhase::Dragging { hover_index, .. } => Some(hover_index),
            _ => None,
        }
    }

    /// Press on the grab affordance of row `index`.
    pub fn pointer_down(
        &mut self,
        index: usize,
        kind: PointerKind,
        point: PointerPoint,
        now: Instant,
        list_len: usize,
    ) {
        if index >= list_len {
            debug!(
                "DragReorder: ignoring press on row {} of {}-row setlist",
                index, list_len
            );
            self.phase = DragPhase::Idle;
            return;
        }
        if kind == PointerKind::Mouse && self.thresholds.pointer_activation_distance_px <= 0.0 {
            trace!("DragReorder: drag start at row {}", index);
            self.phase = DragPhase::Dragging {
                start_index: index,
                hover_index: index,
            };
            return;
        }
        self.phase = DragPhase::Pending {
            start_index: index,
            kind,
            origin: point,
            pressed_at: now,
        };
    }

    /// Pointer moved, optionally over row `over_index`. Returns true when this
    /// move activated the drag.
    pub fn pointer_move(
        &mut self,
        over_index: Option<usize>,
        point: PointerPoint,
        now: Instant,
        list_len: usize,
    ) -> bool {
        match self.phase {
            DragPhase::Idle => false,
            DragPhase::Dragging {
                start_index,
                hover_index,
            } => {
                if let Some(over) = over_index.filter(|over| *over < list_len) {
                    if over != hover_index {
                        trace!("DragReorder: hover {} -> {}", hover_index, over);
                        self.phase = DragPhase::Dragging {
                            start_index,
                            hover_index: over,
                        };
                    }
                }
                false
            }
            DragPhase::Pending {
                start_index,
                kind: PointerKind::Mouse,
                origin,
                ..
            } => {
                if origin.distance_to(point) < self.thresholds.pointer_activation_distance_px {
                    return false;
                }
                self.activate(start_index, over_index, list_len);
                true
            }
            DragPhase::Pending {
                start_index,
                kind: PointerKind::Touch,
                origin,
                pressed_at,
            } => {
                if origin.distance_to(point) > self.thresholds.touch_tolerance_px {
                    debug!(
                        "DragReorder: touch on row {} moved before activation, treating as scroll",
                        start_index
                    );
                    self.phase = DragPhase::Idle;
                    return false;
                }
                if now.duration_since(pressed_at) >= self.thresholds.touch_activation_delay {
                    self.activate(start_index, over_index, list_len);
                    return true;
                }
                false
            }
        }
    }

    /// Activates a touch drag held still past the activation delay.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.phase {
            DragPhase::Pending {
                start_index,
                kind: PointerKind::Touch,
                pressed_at,
                ..
            } if now.duration_since(pressed_at) >= self.thresholds.touch_activation_delay => {
                self.activate(start_index, None, usize::MAX);
                true
            }
            _ => false,
        }
    }

    /// Earliest instant at which `tick` can activate a pending touch.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.phase {
            DragPhase::Pending {
                kind: PointerKind::Touch,
                pressed_at,
                ..
            } => Some(pressed_at + self.thresholds.touch_activation_delay),
            _ => None,
        }
    }

    /// Pointer released. Commits at most one move into `setlist`.
    pub fn pointer_up(&mut self, setlist: &mut Setlist) -> DragOutcome {
        let phase = std::mem::replace(&mut self.phase, DragPhase::Idle);
        match phase {
            DragPhase::Idle => DragOutcome::NoChange,
            DragPhase::Pending { start_index, .. } => DragOutcome::Tap { index: start_index },
            DragPhase::Dragging {
                start_index,
                hover_index,
            } => {
                if start_index == hover_index {
                    debug!("DragReorder: dropped row {} onto itself", start_index);
                    return DragOutcome::NoChange;
                }
                match setlist.move_entry(start_index, hover_index) {
                    Ok(true) => {
                        debug!(
                            "DragReorder: moved row {} -> {}",
                            start_index, hover_index
                        );
                        DragOutcome::Committed {
                            from: start_index,
                            to: hover_index,
                        }
                    }
                    Ok(false) => DragOutcome::NoChange,
                    Err(err) => {
                        error!(
                            "DragReorder: ReorderInvariantViolation, prior order kept: {}",
                            err
                        );
                        DragOutcome::Rejected(err)
                    }
                }
            }
        }
    }

    pub fn cancel(&mut self) {
        if self.phase != DragPhase::Idle {
            debug!("DragReorder: gesture cancelled");
        }
        self.phase = DragPhase::Idle;
    }

    /// Row order to render while dragging: the dragged row shown at the hover
    /// position. Identity order when no drag is active.
    pub fn preview_order(&self, list_len: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..list_len).collect();
        if let DragPhase::Dragging {
            start_index,
            hover_index,
        } = self.phase
        {
            if start_index < list_len && hover_index < list_len {
                let moved = order.remove(start_index);
                order.insert(hover_index, moved);
            }
        }
        order
    }

    fn activate(&mut self, start_index: usize, over_index: Option<usize>, list_len: usize) {
        let hover_index = over_index
            .filter(|over| *over < list_len)
            .unwrap_or(start_index);
        trace!("DragReorder: drag start at row {}", start_index);
        self.phase = DragPhase::Dragging {
            start_index,
            hover_index,
        };
    }
}

impl Default for DragReorderController {
    fn default() -> Self {
        Self::new(DragThresholds::default())
    }
}

#[cfg(test)]
mod tests {
    use super::{DragOutcome, DragPhase, DragReorderController, DragThresholds, PointerKind, PointerPoint};
    use crate::setlist::{ReorderError, Setlist};
    use crate::song::{FileVariant, Song};
    use std::time::{Duration, Instant};

    fn setlist(ids: &[&str]) -> Setlist {
        Setlist::from_songs(ids.iter().map(|id| Song {
            id: id.to_string(),
            title: id.to_string(),
            title_alt1: String::new(),
            title_alt2: String::new(),
            file_variants: vec![FileVariant {
                variant_key: "C".to_string(),
                file_location: format!("/scores/{id}.pdf"),
            }],
            reference_links: Vec::new(),
        }))
    }

    fn order(setlist: &Setlist) -> Vec<String> {
        setlist
            .entries()
            .iter()
            .map(|entry| entry.song().id.clone())
            .collect()
    }

    fn origin() -> PointerPoint {
        PointerPoint::new(10.0, 10.0)
    }

    #[test]
    fn test_mouse_drag_commits_once_on_release() {
        let mut list = setlist(&["a", "b", "c", "d"]);
        let mut drag = DragReorderController::default();
        let now = Instant::now();

        drag.pointer_down(0, PointerKind::Mouse, origin(), now, list.len());
        assert!(drag.is_dragging());
        drag.pointer_move(Some(1), PointerPoint::new(10.0, 40.0), now, list.len());
        drag.pointer_move(Some(2), PointerPoint::new(10.0, 70.0), now, list.len());
        assert_eq!(order(&list), vec!["a", "b", "c", "d"]);
        assert_eq!(drag.preview_order(list.len()), vec![1, 2, 0, 3]);

        assert_eq!(
            drag.pointer_up(&mut list),
            DragOutcome::Committed { from: 0, to: 2 }
        );
        assert_eq!(order(&list), vec!["b", "c", "a", "d"]);
        assert_eq!(drag.phase(), DragPhase::Idle);
    }

    #[test]
    fn test_drop_on_start_row_is_no_change() {
        let mut list = setlist(&["a", "b", "c"]);
        let mut drag = DragReorderController::default();
        let now = Instant::now();
        drag.pointer_down(1, PointerKind::Mouse, origin(), now, list.len());
        drag.pointer_move(Some(2), origin(), now, list.len());
        drag.pointer_move(Some(1), origin(), now, list.len());
        assert_eq!(drag.pointer_up(&mut list), DragOutcome::NoChange);
        assert_eq!(order(&list), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_cancel_leaves_list_untouched() {
        let mut list = setlist(&["a", "b", "c"]);
        let mut drag = DragReorderController::default();
        let now = Instant::now();
        drag.pointer_down(0, PointerKind::Mouse, origin(), now, list.len());
        drag.pointer_move(Some(2), origin(), now, list.len());
        drag.cancel();
        assert_eq!(drag.pointer_up(&mut list), DragOutcome::NoChange);
        assert_eq!(order(&list), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_touch_requires_hold_before_dragging() {
        let mut list = setlist(&["a", "b", "c"]);
        let mut drag = DragReorderController::default();
        let pressed = Instant::now();
        drag.pointer_down(2, PointerKind::Touch, origin(), pressed, list.len());
        assert!(!drag.is_dragging());
        assert_eq!(drag.next_deadline(), Some(pressed + Duration::from_millis(250)));

        assert!(!drag.tick(pressed + Duration::from_millis(100)));
        assert!(drag.tick(pressed + Duration::from_millis(250)));
        drag.pointer_move(Some(0), PointerPoint::new(10.0, -50.0), pressed, list.len());
        assert_eq!(
            drag.pointer_up(&mut list),
            DragOutcome::Committed { from: 2, to: 0 }
        );
        assert_eq!(order(&list), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_quick_touch_release_is_a_tap() {
        let mut list = setlist(&["a", "b"]);
        let mut drag = DragReorderController::default();
        let pressed = Instant::now();
        drag.pointer_down(1, PointerKind::Touch, origin(), pressed, list.len());
        assert_eq!(drag.pointer_up(&mut list), DragOutcome::Tap { index: 1 });
        assert_eq!(order(&list), vec!["a", "b"]);
    }

    #[test]
    fn test_touch_moving_past_tolerance_before_activation_is_scroll() {
        let list = setlist(&["a", "b"]);
        let mut drag = DragReorderController::default();
        let pressed = Instant::now();
        drag.pointer_down(0, PointerKind::Touch, origin(), pressed, list.len());
        let activated = drag.pointer_move(
            Some(1),
            PointerPoint::new(10.0, 30.0),
            pressed + Duration::from_millis(50),
            list.len(),
        );
        assert!(!activated);
        assert_eq!(drag.phase(), DragPhase::Idle);
        assert!(!drag.tick(pressed + Duration::from_secs(1)));
    }

    #[test]
    fn test_mouse_activation_distance_is_respected() {
        let mut list = setlist(&["a", "b", "c"]);
        let mut drag = DragReorderController::new(DragThresholds {
            pointer_activation_distance_px: 8.0,
            ..DragThresholds::default()
        });
        let now = Instant::now();
        drag.pointer_down(0, PointerKind::Mouse, origin(), now, list.len());
        assert!(!drag.pointer_move(Some(0), PointerPoint::new(12.0, 12.0), now, list.len()));
        assert!(drag.pointer_move(Some(1), PointerPoint::new(10.0, 30.0), now, list.len()));
        assert_eq!(drag.hover_index(), Some(1));
        assert_eq!(
            drag.pointer_up(&mut list),
            DragOutcome::Committed { from: 0, to: 1 }
        );
    }

    #[test]
    fn test_hover_outside_list_is_ignored() {
        let list = setlist(&["a", "b"]);
        let mut drag = DragReorderController::default();
        let now = Instant::now();
        drag.pointer_down(0, PointerKind::Mouse, origin(), now, list.len());
        drag.pointer_move(Some(5), origin(), now, list.len());
        drag.pointer_move(None, origin(), now, list.len());
        assert_eq!(drag.hover_index(), Some(0));
    }

    #[test]
    fn test_stale_drag_after_shrink_is_rejected_without_mutation() {
        let mut list = setlist(&["a", "b", "c"]);
        let mut drag = DragReorderController::default();
        let now = Instant::now();
        drag.pointer_down(0, PointerKind::Mouse, origin(), now, list.len());
        drag.pointer_move(Some(2), origin(), now, list.len());
        list.remove(2).expect("row exists");

        assert_eq!(
            drag.pointer_up(&mut list),
            DragOutcome::Rejected(ReorderError::MoveOutOfRange {
                from: 0,
                to: 2,
                len: 2
            })
        );
        assert_eq!(order(&list), vec!["a", "b"]);
    }

    #[test]
    fn test_press_outside_list_stays_idle() {
        let mut drag = DragReorderController::default();
        drag.pointer_down(3, PointerKind::Mouse, origin(), Instant::now(), 3);
        assert_eq!(drag.phase(), DragPhase::Idle);
    }
}

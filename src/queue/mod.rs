//! Ordered work queues used by the planners.

use std::cmp::Ordering;

use binary_heap_plus::BinaryHeap;
use compare::Compare;
use ordered_float::OrderedFloat;

use crate::Weld;

/// Pops the weld with the smallest `x_start` first; ties go to the smaller
/// id. The comparison is inverted because the backing heap is a max-heap.
#[derive(Debug, Clone, Copy)]
pub struct AscendingX;
impl Compare<Weld> for AscendingX {
    fn compare(&self, l: &Weld, r: &Weld) -> Ordering {
        OrderedFloat(r.x_start)
            .cmp(&OrderedFloat(l.x_start))
            .then_with(|| r.id.id().cmp(&l.id.id()))
    }
}

/// Pops the weld with the smallest `y` first; ties go to the smaller id.
#[derive(Debug, Clone, Copy)]
pub struct AscendingY;
impl Compare<Weld> for AscendingY {
    fn compare(&self, l: &Weld, r: &Weld) -> Ordering {
        OrderedFloat(r.y)
            .cmp(&OrderedFloat(l.y))
            .then_with(|| r.id.id().cmp(&l.id.id()))
    }
}

/// A queue of pending welds popped in the order its comparator defines.
pub struct WeldQueue<C: Compare<Weld>> {
    heap: BinaryHeap<Weld, C>,
}

impl WeldQueue<AscendingX> {
    /// A queue that yields welds left to right along the travel axis.
    pub fn by_x_start(welds: Vec<Weld>) -> Self {
        Self {
            heap: BinaryHeap::from_vec_cmp(welds, AscendingX),
        }
    }
}

impl WeldQueue<AscendingY> {
    /// A queue that yields welds bottom to top across the gantry.
    pub fn by_y(welds: Vec<Weld>) -> Self {
        Self {
            heap: BinaryHeap::from_vec_cmp(welds, AscendingY),
        }
    }
}

impl<C: Compare<Weld>> WeldQueue<C> {
    pub fn push(&mut self, weld: Weld) {
        self.heap.push(weld)
    }

    pub fn pop(&mut self) -> Option<Weld> {
        self.heap.pop()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::Side;

    use super::*;

    fn weld(id: usize, x_start: f64, y: f64) -> Weld {
        Weld::new(id, x_start, x_start + 100.0, y, Side::XPlus)
    }

    #[test]
    fn pops_in_ascending_x_order_with_id_tiebreak() {
        let mut q = WeldQueue::by_x_start(vec![
            weld(3, 1200.0, 0.0),
            weld(1, 300.0, 0.0),
            weld(2, 300.0, 0.0),
            weld(4, 700.0, 0.0),
        ]);
        let order: Vec<usize> = std::iter::from_fn(|| q.pop()).map(|w| w.id.id()).collect();
        assert_eq!(order, vec![1, 2, 4, 3]);
    }

    #[test]
    fn pops_in_ascending_y_order() {
        let mut q = WeldQueue::by_y(vec![weld(1, 0.0, 1700.0), weld(2, 0.0, 300.0)]);
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop().map(|w| w.id.id()), Some(2));
        assert_eq!(q.pop().map(|w| w.id.id()), Some(1));
        assert!(q.is_empty());
    }
}

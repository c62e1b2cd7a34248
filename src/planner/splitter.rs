//! Zone work-splitter: when a shared band's work sits lopsidedly with one of
//! its two owners while their overall workloads diverge, one weld inside the
//! band is cut in two so both owners work the band in parallel.

use std::cmp::Reverse;

use log::debug;
use ordered_float::OrderedFloat;

use crate::{SharedZone, Weld, WeldId, ZoneId};

/// Relative load difference below which a zone is left alone.
pub const IMBALANCE_TOLERANCE: f64 = 0.20;
/// A weld must be at least this long to be considered for cutting, so both
/// fragments can satisfy [`MIN_FRAGMENT`].
pub const MIN_SPLIT_LENGTH: f64 = 200.0;
/// No fragment may come out shorter than this.
pub const MIN_FRAGMENT: f64 = 100.0;

/// Audit record of one cut, kept for conservation checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitRecord {
    pub zone: ZoneId,
    pub parent: WeldId,
    pub kept: WeldId,
    pub moved: WeldId,
}

/// Relative gap between two workloads, in `[0, 1]`.
pub fn imbalance(a: f64, b: f64) -> f64 {
    let hi = a.max(b);
    let lo = a.min(b);
    if hi <= 0.0 {
        0.0
    } else {
        (hi - lo) / hi
    }
}

fn band_length(welds: &[Weld], zone: &SharedZone) -> f64 {
    welds
        .iter()
        .filter(|w| zone.contains_y(w.y))
        .map(Weld::length)
        .sum()
}

fn out_of_band_length(welds: &[Weld], zone: &SharedZone) -> f64 {
    welds
        .iter()
        .filter(|w| !zone.contains_y(w.y))
        .map(Weld::length)
        .sum()
}

/// Rebalances each zone's in-band work between its two highest-priority
/// owners. `assignments` is indexed by robot id; fragments get fresh ids
/// drawn from `next_id` and carry their parent for audit.
pub fn balance(
    assignments: &mut [Vec<Weld>],
    zones: &[SharedZone],
    next_id: &mut usize,
) -> Vec<SplitRecord> {
    let mut records = vec![];

    for zone in zones {
        let (a, b) = match (zone.priority.first(), zone.priority.get(1)) {
            (Some(a), Some(b)) => (*a, *b),
            _ => continue,
        };
        if a.0 >= assignments.len() || b.0 >= assignments.len() {
            continue;
        }

        let band_a = band_length(&assignments[a.0], zone);
        let band_b = band_length(&assignments[b.0], zone);
        if band_a <= 0.0 && band_b <= 0.0 {
            // nobody works this band: not a true contention
            continue;
        }

        let out_a = out_of_band_length(&assignments[a.0], zone);
        let out_b = out_of_band_length(&assignments[b.0], zone);
        if imbalance(out_a, out_b) <= IMBALANCE_TOLERANCE {
            continue;
        }

        let (donor, receiver) = if band_a >= band_b { (a, b) } else { (b, a) };
        let transfer = 0.5 * (band_a - band_b).abs();
        if transfer < MIN_FRAGMENT {
            continue;
        }

        // longest splittable weld inside the band, smaller id on ties
        let candidate = assignments[donor.0]
            .iter()
            .enumerate()
            .filter(|(_, w)| zone.contains_y(w.y) && w.length() >= MIN_SPLIT_LENGTH)
            .max_by_key(|(_, w)| (OrderedFloat(w.length()), Reverse(w.id.id())))
            .map(|(i, _)| i);
        let Some(slot) = candidate else { continue };

        let parent = assignments[donor.0].remove(slot);
        let keep_len = parent.length() - transfer.min(parent.length());
        let split_x = (parent.x_start + keep_len)
            .clamp(parent.x_start + MIN_FRAGMENT, parent.x_end - MIN_FRAGMENT);

        let mut kept = Weld::new(*next_id, parent.x_start, split_x, parent.y, parent.side);
        kept.parent = Some(parent.id);
        *next_id += 1;
        let mut moved = Weld::new(*next_id, split_x, parent.x_end, parent.y, parent.side);
        moved.parent = Some(parent.id);
        *next_id += 1;

        debug!(
            "zone {}: weld {} cut at {:.1}, {:.1} mm handed from robot {} to robot {}",
            zone.name,
            parent.id,
            split_x,
            moved.length(),
            donor,
            receiver
        );

        records.push(SplitRecord {
            zone: zone.id,
            parent: parent.id,
            kept: kept.id,
            moved: moved.id,
        });
        assignments[donor.0].push(kept);
        assignments[receiver.0].push(moved);
    }

    records
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::{RobotId, Side, Span};

    use super::*;

    fn zone_s1() -> SharedZone {
        SharedZone::new(
            ZoneId(0),
            "s1",
            Span::new(900.0, 1100.0),
            vec![RobotId(0), RobotId(2)],
        )
    }

    fn total(welds: &[Weld]) -> f64 {
        welds.iter().map(Weld::length).sum()
    }

    #[test]
    fn rebalances_a_hogged_band_by_cutting_its_longest_weld() {
        // robot 0 carries 3500 outside the band; robot 2 carries 1000
        // outside plus the whole 2000 of band work.
        let mut assignments = vec![
            vec![Weld::new(1, 0.0, 3500.0, 500.0, Side::XPlus)],
            vec![],
            vec![
                Weld::new(2, 0.0, 1000.0, 1500.0, Side::XPlus),
                Weld::new(3, 1000.0, 3000.0, 1000.0, Side::XPlus),
            ],
        ];
        let mut next_id = 4;
        let records = balance(&mut assignments, &[zone_s1()], &mut next_id);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].parent, WeldId(3));
        assert_eq!(total(&assignments[0]), 4500.0);
        assert_eq!(total(&assignments[2]), 2000.0);

        // the cut lands mid-weld and conserves length
        let kept = assignments[2].iter().find(|w| w.id == records[0].kept).unwrap();
        let moved = assignments[0].iter().find(|w| w.id == records[0].moved).unwrap();
        assert_eq!(kept.x_end, 2000.0);
        assert_eq!(moved.x_start, 2000.0);
        assert_eq!(kept.length() + moved.length(), 2000.0);
        assert!(kept.length() >= MIN_FRAGMENT && moved.length() >= MIN_FRAGMENT);
        assert_eq!(kept.parent, Some(WeldId(3)));
        assert_eq!(next_id, 6);
    }

    #[test]
    fn balanced_loads_are_left_alone() {
        let mut assignments = vec![
            vec![Weld::new(1, 0.0, 2000.0, 500.0, Side::XPlus)],
            vec![],
            vec![
                Weld::new(2, 0.0, 1900.0, 1500.0, Side::XPlus),
                Weld::new(3, 0.0, 2000.0, 1000.0, Side::XPlus),
            ],
        ];
        let mut next_id = 4;
        assert!(balance(&mut assignments, &[zone_s1()], &mut next_id).is_empty());
        assert_eq!(assignments[2].len(), 2);
    }

    #[test]
    fn empty_band_is_not_a_contention() {
        let mut assignments = vec![
            vec![Weld::new(1, 0.0, 3500.0, 500.0, Side::XPlus)],
            vec![],
            vec![Weld::new(2, 0.0, 500.0, 1500.0, Side::XPlus)],
        ];
        let mut next_id = 3;
        assert!(balance(&mut assignments, &[zone_s1()], &mut next_id).is_empty());
    }

    #[test]
    fn short_welds_are_never_cut() {
        // imbalance triggers but the only band weld is under the minimum
        let mut assignments = vec![
            vec![Weld::new(1, 0.0, 3500.0, 500.0, Side::XPlus)],
            vec![],
            vec![Weld::new(2, 0.0, 190.0, 1000.0, Side::XPlus)],
        ];
        let mut next_id = 3;
        assert!(balance(&mut assignments, &[zone_s1()], &mut next_id).is_empty());
        assert_eq!(assignments[2].len(), 1);
    }
}

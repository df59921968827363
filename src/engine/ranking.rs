//! Table presentation order.
//!
//! Standings are ranked by points, then goal difference, then goals
//! scored (all descending) and finally team name ascending. The engine
//! never sorts what it writes; this is applied on the read path.

use std::cmp::Ordering;

use crate::types::{Standing, TableRow};

/// Compare two rows for table order. `Ordering::Less` means `a` ranks higher.
pub fn compare_rows(a: &Standing, a_name: &str, b: &Standing, b_name: &str) -> Ordering {
    b.points
        .cmp(&a.points)
        .then_with(|| b.gd.cmp(&a.gd))
        .then_with(|| b.gf.cmp(&a.gf))
        .then_with(|| a_name.cmp(b_name))
}

/// Sort `(standing, team name)` pairs into table order and number them from 1.
pub fn rank(rows: Vec<(Standing, String)>) -> Vec<TableRow> {
    let mut rows = rows;
    rows.sort_by(|(a, an), (b, bn)| compare_rows(a, an, b, bn));
    rows.into_iter()
        .enumerate()
        .map(|(i, (standing, team_name))| TableRow {
            position: i + 1,
            team_name,
            standing,
        })
        .collect()
}

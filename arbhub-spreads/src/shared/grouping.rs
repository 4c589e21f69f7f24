//! Per-token grouping and ranking of filtered spreads.
//!
//! Spreads sharing a base token collapse into one [`GroupedToken`]: the widest
//! spread is the headline row, the rest are secondary rows shown on expansion.
//! Both sorts are stable, so ties keep their input order.

use crate::shared::{expansion::ExpansionState, types::Spread};
use indexmap::IndexMap;
use std::cmp::Ordering;

/// All spreads for one base token, widest first
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedToken {
    /// Base symbol (e.g., "BTC")
    pub token: String,
    /// Spread with the highest `spread` value
    pub best: Spread,
    /// Remaining spreads, `spread` descending
    pub others: Vec<Spread>,
}

impl GroupedToken {
    pub fn has_others(&self) -> bool {
        !self.others.is_empty()
    }

    /// Number of spreads in the group
    pub fn len(&self) -> usize {
        1 + self.others.len()
    }

    /// Best followed by others
    pub fn iter(&self) -> impl Iterator<Item = &Spread> {
        std::iter::once(&self.best).chain(self.others.iter())
    }
}

/// Group `spreads` by base token and rank groups by their best spread
pub fn group_spreads<'a, I>(spreads: I) -> Vec<GroupedToken>
where
    I: IntoIterator<Item = &'a Spread>,
{
    // Insertion order gives the first-seen tie-break between groups
    let mut partitions: IndexMap<&'a str, Vec<&'a Spread>> = IndexMap::new();
    for spread in spreads {
        partitions.entry(spread.base_token()).or_default().push(spread);
    }

    let mut groups: Vec<GroupedToken> = partitions
        .into_iter()
        .filter_map(|(token, mut items)| {
            items.sort_by(|a, b| descending(a.spread, b.spread));
            let mut ranked = items.into_iter().cloned();
            let best = ranked.next()?;
            Some(GroupedToken {
                token: token.to_string(),
                best,
                others: ranked.collect(),
            })
        })
        .collect();

    groups.sort_by(|a, b| descending(a.best.spread, b.best.spread));
    groups
}

/// Larger first, with `-0.0` ranked as `0.0`
fn descending(a: f64, b: f64) -> Ordering {
    // Adding 0.0 maps -0.0 to 0.0 and leaves every other value unchanged
    (b + 0.0).total_cmp(&(a + 0.0))
}

/// One line of the rendered spread table
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisplayRow<'a> {
    /// Headline row of a group
    Best {
        group: &'a GroupedToken,
        /// Only groups with secondary rows offer an expand toggle
        expandable: bool,
        expanded: bool,
    },
    /// Secondary row shown under an expanded group
    Sub { token: &'a str, spread: &'a Spread },
}

impl<'a> DisplayRow<'a> {
    pub fn spread(&self) -> &'a Spread {
        match *self {
            DisplayRow::Best { group, .. } => &group.best,
            DisplayRow::Sub { spread, .. } => spread,
        }
    }

    pub fn token(&self) -> &'a str {
        match *self {
            DisplayRow::Best { group, .. } => &group.token,
            DisplayRow::Sub { token, .. } => token,
        }
    }
}

/// Flatten groups into table rows according to the expansion state
pub fn visible_rows<'a>(groups: &'a [GroupedToken], expansion: &ExpansionState) -> Vec<DisplayRow<'a>> {
    let mut rows = Vec::with_capacity(groups.len());
    for group in groups {
        let expandable = group.has_others();
        let expanded = expandable && expansion.is_expanded(&group.token);
        rows.push(DisplayRow::Best {
            group,
            expandable,
            expanded,
        });
        if expanded {
            let token = group.token.as_str();
            rows.extend(group.others.iter().map(move |spread| DisplayRow::Sub { token, spread }));
        }
    }
    rows
}

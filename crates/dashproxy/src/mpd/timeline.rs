//! `SegmentTimeline` reconstruction.
//!
//! A timeline is a list of `S` elements, each describing `r + 1` consecutive segments of
//! duration `d`, optionally anchored at an explicit start `t`. Reconstruction rewrites the
//! timeline in place so every segment has its own `S` element carrying an explicit `t`,
//! and returns the resulting per-segment entries.

use super::document::{Attributes, Document, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineEntry {
    /// Absolute start, in timescale units.
    pub start: u64,
    pub duration: u64,
}

pub fn reconstruct(mpd: &mut Document, timeline: NodeId) -> Vec<TimelineEntry> {
    expand_repeats(mpd, timeline);
    resolve_start_times(mpd, timeline)
}

/// Replace every `S@r` with `r` sibling `S` elements of the same duration.
fn expand_repeats(mpd: &mut Document, timeline: NodeId) {
    let children = mpd.children(timeline).to_vec();
    let mut expanded = Vec::with_capacity(children.len());

    for child in children {
        expanded.push(child);
        if mpd.element(child).local_name() != "S" {
            continue;
        }

        let attributes = mpd.attributes(child);
        let duration = attributes.get_uint("d", 0);
        let repeat = attributes.get_int("r", 0);
        if !attributes.contains("r") {
            continue;
        }
        mpd.attributes_mut(child).remove("r");

        if repeat < 0 {
            tracing::warn!(
                "Open-ended repeat r={repeat} is not supported, treating it as a single segment"
            );
            continue;
        }

        let name = mpd.element(child).name().to_string();
        for _ in 0..repeat {
            let attributes: Attributes = [("d", duration)].into_iter().collect();
            expanded.push(mpd.create_element(name.clone(), attributes));
        }
        tracing::debug!("Expanded S@d={duration} into {} entries", repeat + 1);
    }

    mpd.set_children(timeline, expanded);
}

fn resolve_start_times(mpd: &mut Document, timeline: NodeId) -> Vec<TimelineEntry> {
    let mut next_time = 0u64;
    let mut entries = Vec::new();

    for segment in mpd.find_all(timeline, "S") {
        let attributes = mpd.attributes_mut(segment);
        let duration = attributes.get_uint("d", 0);
        let start = match attributes.get("t").and_then(|t| t.trim().parse::<u64>().ok()) {
            Some(t) => t,
            None => {
                attributes.set("t", next_time);
                next_time
            }
        };

        next_time = start.saturating_add(duration);
        entries.push(TimelineEntry { start, duration });
    }

    entries
}

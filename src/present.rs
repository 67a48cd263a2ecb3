// src/present.rs
//! Human-readable and JSON renderings of the final event list.

use std::cmp::Ordering;
use std::fmt::Write as _;

use crate::ingest::types::NormalizedEvent;

const WEEK: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];
const UNKNOWN_DAY: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum GroupMode {
    #[default]
    #[value(name = "day")]
    ByDay,
    #[value(name = "distance")]
    ByDistance,
    #[value(name = "flat")]
    Flat,
}

pub fn render_text(events: &[NormalizedEvent], mode: GroupMode) -> String {
    let mut out = String::new();
    if events.is_empty() {
        out.push_str("No events found.\n");
        return out;
    }

    match mode {
        GroupMode::ByDay => {
            for (day, mut group) in group_by_day(events) {
                // Stable, unknown distances last.
                group.sort_by(|a, b| by_distance(a, b));
                header(&mut out, &day.to_uppercase());
                for ev in group {
                    write_event(&mut out, ev);
                }
            }
        }
        GroupMode::ByDistance => {
            header(&mut out, "EVENTS BY DISTANCE");
            for ev in events {
                write_event(&mut out, ev);
            }
        }
        GroupMode::Flat => {
            for ev in events {
                write_event(&mut out, ev);
            }
        }
    }
    out
}

pub fn render_json(events: &[NormalizedEvent]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(events)
}

/// Buckets in week order. Labels outside the week keep first-seen order
/// after Sunday; events without a day go last under "Unknown".
fn group_by_day(events: &[NormalizedEvent]) -> Vec<(String, Vec<&NormalizedEvent>)> {
    let mut groups: Vec<(String, Vec<&NormalizedEvent>)> = Vec::new();
    for ev in events {
        let day = ev.day_of_week.as_deref().unwrap_or(UNKNOWN_DAY);
        match groups.iter_mut().find(|(d, _)| d == day) {
            Some((_, g)) => g.push(ev),
            None => groups.push((day.to_string(), vec![ev])),
        }
    }
    groups.sort_by_key(|(d, _)| day_rank(d));
    groups
}

fn day_rank(day: &str) -> usize {
    match WEEK.iter().position(|d| *d == day) {
        Some(i) => i,
        None if day == UNKNOWN_DAY => WEEK.len() + 1,
        None => WEEK.len(),
    }
}

fn by_distance(a: &NormalizedEvent, b: &NormalizedEvent) -> Ordering {
    match (a.distance.miles(), b.distance.miles()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn header(out: &mut String, title: &str) {
    let rule = "=".repeat(60);
    let _ = write!(out, "\n{rule}\n  {title}\n{rule}\n");
}

fn write_event(out: &mut String, ev: &NormalizedEvent) {
    let _ = writeln!(out, "\n  {}", ev.venue_name);
    if let Some(name) = ev.event_name.as_deref().filter(|n| *n != ev.venue_name) {
        let _ = writeln!(out, "    Event: {name}");
    }
    if let Some(day) = &ev.day_of_week {
        let _ = writeln!(out, "    Day: {day}");
    }
    if let Some(time) = &ev.time {
        let _ = writeln!(out, "    Time: {time}");
    }
    if let Some(addr) = &ev.address {
        let _ = writeln!(out, "    Address: {addr}");
    }
    if !ev.city.is_empty() && !ev.state.is_empty() {
        let _ = writeln!(out, "    Location: {}, {}", ev.city, ev.state);
    }
    if let Some(phone) = &ev.phone {
        let _ = writeln!(out, "    Phone: {phone}");
    }
    if let Some(miles) = ev.distance.miles() {
        let _ = writeln!(out, "    Distance: {miles:.1} mi");
    }
    if let Some(url) = &ev.url {
        let _ = writeln!(out, "    URL: {url}");
    }
    let _ = writeln!(out, "    Source: {}", ev.source);
}

//! iCalendar emission: one `VEVENT` per [`CalendarEvent`], wrapped in a
//! `VCALENDAR`. `PRODID` identifies this toolkit; `DTSTART`/`DTEND` are
//! emitted in UTC with the `Z` suffix, and long lines are folded at 75
//! octets per RFC 5545 §3.1.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::edb::entity::CalendarEvent;

use super::{fold_line, ExportResult};

const PRODID: &str = "-//EDB-Exporter//Exchange EDB Extraction Toolkit//EN";
const LINE_FOLD_LIMIT: usize = 75;

/// Renders a single [`CalendarEvent`] as a complete `VCALENDAR` document.
pub fn render_ics(event: &CalendarEvent, now: DateTime<Utc>) -> ExportResult<Vec<u8>> {
    let mut out = String::new();
    writeln!(out, "BEGIN:VCALENDAR")?;
    writeln!(out, "VERSION:2.0")?;
    writeln!(out, "PRODID:{PRODID}")?;
    writeln!(out, "BEGIN:VEVENT")?;
    fold_prop(&mut out, "UID", &uid_or_default(event))?;
    fold_prop(&mut out, "DTSTAMP", &format_utc(now))?;
    if let Some(start) = event.start {
        if event.all_day {
            fold_prop(&mut out, "DTSTART;VALUE=DATE", &format_date(start))?;
        } else {
            fold_prop(&mut out, "DTSTART", &format_utc(start))?;
        }
    }
    if let Some(end) = event.end {
        if event.all_day {
            fold_prop(&mut out, "DTEND;VALUE=DATE", &format_date(end))?;
        } else {
            fold_prop(&mut out, "DTEND", &format_utc(end))?;
        }
    }
    fold_prop(&mut out, "SUMMARY", &escape_text(&event.subject))?;
    if !event.body.is_empty() {
        fold_prop(&mut out, "DESCRIPTION", &escape_text(&event.body))?;
    }
    if !event.location.is_empty() {
        fold_prop(&mut out, "LOCATION", &escape_text(&event.location))?;
    }
    if !event.organizer_email.is_empty() {
        fold_prop(
            &mut out,
            "ORGANIZER",
            &format!("MAILTO:{}", event.organizer_email),
        )?;
    }
    for attendee in &event.attendees {
        if attendee.email.is_empty() {
            continue;
        }
        let partstat = partstat_for(&attendee.status);
        fold_prop(
            &mut out,
            &format!("ATTENDEE;CN={};PARTSTAT={partstat}", escape_text(&attendee.name)),
            &format!("MAILTO:{}", attendee.email),
        )?;
    }
    writeln!(out, "END:VEVENT")?;
    writeln!(out, "END:VCALENDAR")?;
    Ok(out.into_bytes())
}

fn uid_or_default(event: &CalendarEvent) -> String {
    if event.uid.is_empty() {
        format!("{:08x}@edb-exporter", event.subject.len())
    } else {
        event.uid.clone()
    }
}

fn fold_prop(out: &mut String, name: &str, value: &str) -> ExportResult<()> {
    let line = format!("{name}:{value}");
    writeln!(out, "{}", fold_line(&line, LINE_FOLD_LIMIT))?;
    Ok(())
}

fn format_utc(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

fn format_date(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%d").to_string()
}

fn escape_text(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace(';', "\\;")
        .replace('\n', "\\n")
}

fn partstat_for(status: &str) -> &'static str {
    match status.to_ascii_lowercase().as_str() {
        "accepted" | "accept" => "ACCEPTED",
        "declined" | "decline" => "DECLINED",
        "tentative" => "TENTATIVE",
        _ => "NEEDS-ACTION",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edb::entity::Attendee;
    use chrono::TimeZone;

    fn sample() -> CalendarEvent {
        CalendarEvent {
            subject: "Planning".to_string(),
            organizer_name: "Alice".to_string(),
            organizer_email: "alice@x.test".to_string(),
            attendees: vec![Attendee {
                name: "Bob".to_string(),
                email: "bob@y.test".to_string(),
                status: "accepted".to_string(),
            }],
            location: "Room 1".to_string(),
            start: Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()),
            end: Some(Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap()),
            all_day: false,
            body: "Quarterly planning".to_string(),
            uid: "event-1@x.test".to_string(),
        }
    }

    #[test]
    fn test_render_ics_contains_core_properties() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let rendered = String::from_utf8(render_ics(&sample(), now).unwrap()).unwrap();
        assert!(rendered.contains("BEGIN:VCALENDAR"));
        assert!(rendered.contains("SUMMARY:Planning"));
        assert!(rendered.contains("DTSTART:20240301T100000Z"));
        assert!(rendered.contains("ORGANIZER:MAILTO:alice@x.test"));
        assert!(rendered.contains("PARTSTAT=ACCEPTED"));
    }

    #[test]
    fn test_all_day_uses_date_value() {
        let mut event = sample();
        event.all_day = true;
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let rendered = String::from_utf8(render_ics(&event, now).unwrap()).unwrap();
        assert!(rendered.contains("DTSTART;VALUE=DATE:20240301"));
    }

    #[test]
    fn test_escape_text_handles_commas_and_semicolons() {
        assert_eq!(escape_text("a,b;c"), "a\\,b\\;c");
    }
}

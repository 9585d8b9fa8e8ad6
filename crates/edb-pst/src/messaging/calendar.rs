//! Calendar events, synthesized onto the same message object model as
//! [`crate::messaging::message`]: a [`CalendarEvent`] becomes a PC tagged
//! `IPM.Appointment`/`IPM.Schedule.Meeting.*`, with start/end/location/
//! all-day carried as named properties under `PSETID_APPOINTMENT` — these
//! fields have no fixed MAPI tag, so they go through the Name-to-ID Map
//! like Outlook itself does.

use crate::edb::entity::CalendarEvent;
use crate::eml::tags;
use crate::ltp::prop_context::PropertyContext;
use crate::ltp::prop_type::PropertyType;
use crate::messaging::{split_tag, MessagingResult};
use crate::util::codec::encode_utf16le;
use crate::util::filetime::to_filetime;

use super::named_prop::{
    NamedPropertyMap, PID_LID_APPOINTMENT_ALL_DAY_EVENT, PID_LID_APPOINTMENT_END_WHOLE,
    PID_LID_APPOINTMENT_START_WHOLE, PID_LID_LOCATION, PSETID_APPOINTMENT,
};

pub fn build_calendar_properties(
    event: &CalendarEvent,
    named_props: &mut NamedPropertyMap,
) -> MessagingResult<PropertyContext> {
    let mut pc = PropertyContext::new();

    let (id, ty) = split_tag(tags::PR_SUBJECT_W);
    pc.set_property(id, ty, &encode_utf16le(&event.subject))?;

    let (id, ty) = split_tag(tags::PR_SENDER_NAME_W);
    pc.set_property(id, ty, &encode_utf16le(&event.organizer_name))?;

    let (id, ty) = split_tag(tags::PR_SENDER_EMAIL_ADDRESS_W);
    pc.set_property(id, ty, &encode_utf16le(&event.organizer_email))?;

    let (id, ty) = split_tag(tags::PR_MESSAGE_CLASS_W);
    pc.set_property(id, ty, &encode_utf16le("IPM.Appointment"))?;

    let (id, ty) = split_tag(tags::PR_BODY_W);
    pc.set_property(id, ty, &encode_utf16le(&event.body))?;

    let location_id = named_props.resolve(PSETID_APPOINTMENT, PID_LID_LOCATION)?;
    pc.set_property(location_id, PropertyType::Unicode, &encode_utf16le(&event.location))?;

    if let Some(start) = event.start {
        let start_id = named_props.resolve(PSETID_APPOINTMENT, PID_LID_APPOINTMENT_START_WHOLE)?;
        pc.set_property(start_id, PropertyType::Time, &to_filetime(start).to_le_bytes())?;
    }
    if let Some(end) = event.end {
        let end_id = named_props.resolve(PSETID_APPOINTMENT, PID_LID_APPOINTMENT_END_WHOLE)?;
        pc.set_property(end_id, PropertyType::Time, &to_filetime(end).to_le_bytes())?;
    }

    let all_day_id = named_props.resolve(PSETID_APPOINTMENT, PID_LID_APPOINTMENT_ALL_DAY_EVENT)?;
    pc.set_property(
        all_day_id,
        PropertyType::Boolean,
        &(event.all_day as u16).to_le_bytes(),
    )?;

    Ok(pc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_build_calendar_properties_resolves_named_props() {
        let event = CalendarEvent {
            subject: "Standup".to_string(),
            organizer_name: "Alice".to_string(),
            organizer_email: "alice@x.test".to_string(),
            attendees: vec![],
            location: "Room 1".to_string(),
            start: Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()),
            end: Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()),
            all_day: false,
            body: String::new(),
            uid: "evt-1".to_string(),
        };
        let mut named_props = NamedPropertyMap::new();
        let pc = build_calendar_properties(&event, &mut named_props).unwrap();

        let (id, _) = split_tag(tags::PR_MESSAGE_CLASS_W);
        let (_, bytes) = pc.get_property(id).unwrap();
        assert_eq!(crate::util::codec::decode_utf16le(&bytes), "IPM.Appointment");

        let location_id = named_props.resolve(PSETID_APPOINTMENT, PID_LID_LOCATION).unwrap();
        let (_, bytes) = pc.get_property(location_id).unwrap();
        assert_eq!(crate::util::codec::decode_utf16le(&bytes), "Room 1");
    }
}

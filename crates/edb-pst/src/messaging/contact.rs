//! Contacts, synthesized onto the message object model as a PC tagged
//! `IPM.Contact`. [`Contact`] only carries a flat list of email addresses;
//! the first becomes `PR_SENDER_EMAIL_ADDRESS_W` so the Contents Table's
//! shared `sender_name`/`sender_email` columns stay populated the same way
//! an email message's do.

use crate::edb::entity::Contact;
use crate::eml::tags;
use crate::ltp::prop_context::PropertyContext;
use crate::messaging::{split_tag, MessagingResult};
use crate::util::codec::encode_utf16le;

pub fn build_contact_properties(contact: &Contact) -> MessagingResult<PropertyContext> {
    let mut pc = PropertyContext::new();

    let (id, ty) = split_tag(tags::PR_DISPLAY_NAME_W);
    pc.set_property(id, ty, &encode_utf16le(&contact.display_name))?;

    let (id, ty) = split_tag(tags::PR_SUBJECT_W);
    pc.set_property(id, ty, &encode_utf16le(&contact.display_name))?;

    let (id, ty) = split_tag(tags::PR_SENDER_NAME_W);
    pc.set_property(id, ty, &encode_utf16le(&contact.display_name))?;

    if let Some(email) = contact.emails.first() {
        let (id, ty) = split_tag(tags::PR_SENDER_EMAIL_ADDRESS_W);
        pc.set_property(id, ty, &encode_utf16le(email))?;
    }

    let (id, ty) = split_tag(tags::PR_MESSAGE_CLASS_W);
    pc.set_property(id, ty, &encode_utf16le("IPM.Contact"))?;

    // company/title have no fixed MAPI tag; fold them into the body so they
    // survive the round trip into Outlook's contact form, which falls back
    // to the Notes field for unmapped data.
    let mut body = String::new();
    if !contact.company.is_empty() {
        body.push_str(&format!("Company: {}\n", contact.company));
    }
    if !contact.title.is_empty() {
        body.push_str(&format!("Title: {}\n", contact.title));
    }
    if !body.is_empty() {
        let (id, ty) = split_tag(tags::PR_BODY_W);
        pc.set_property(id, ty, &encode_utf16le(&body))?;
    }

    Ok(pc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edb::entity::Phone;

    #[test]
    fn test_build_contact_properties() {
        let contact = Contact {
            display_name: "Jane Doe".to_string(),
            emails: vec!["jane@x.test".to_string()],
            phones: vec![Phone {
                kind: "cell".to_string(),
                value: "555-0100".to_string(),
            }],
            company: "Contoso".to_string(),
            title: "Engineer".to_string(),
            addresses: vec![],
        };
        let pc = build_contact_properties(&contact).unwrap();

        let (id, _) = split_tag(tags::PR_MESSAGE_CLASS_W);
        let (_, bytes) = pc.get_property(id).unwrap();
        assert_eq!(crate::util::codec::decode_utf16le(&bytes), "IPM.Contact");

        let (id, _) = split_tag(tags::PR_SENDER_EMAIL_ADDRESS_W);
        let (_, bytes) = pc.get_property(id).unwrap();
        assert_eq!(crate::util::codec::decode_utf16le(&bytes), "jane@x.test");
    }
}

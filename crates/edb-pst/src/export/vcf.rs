//! vCard 3.0 emission: one `VCARD` per [`Contact`] — `FN`, `N`,
//! `EMAIL;TYPE=INTERNET`, `TEL;TYPE=...`, `ORG`, `TITLE`, `ADR;TYPE=...`,
//! UTF-8 throughout.

use std::fmt::Write as _;

use crate::edb::entity::Contact;

use super::ExportResult;

/// Renders `contact` as a complete `VCARD` document.
pub fn render_vcf(contact: &Contact) -> ExportResult<Vec<u8>> {
    let mut out = String::new();
    writeln!(out, "BEGIN:VCARD")?;
    writeln!(out, "VERSION:3.0")?;
    writeln!(out, "FN:{}", escape_text(&contact.display_name))?;
    writeln!(out, "N:{};;;;", escape_text(&family_name(&contact.display_name)))?;

    for email in &contact.emails {
        writeln!(out, "EMAIL;TYPE=INTERNET:{}", escape_text(email))?;
    }
    for phone in &contact.phones {
        let kind = if phone.kind.is_empty() {
            "VOICE".to_string()
        } else {
            phone.kind.to_ascii_uppercase()
        };
        writeln!(out, "TEL;TYPE={kind}:{}", escape_text(&phone.value))?;
    }
    if !contact.company.is_empty() {
        writeln!(out, "ORG:{}", escape_text(&contact.company))?;
    }
    if !contact.title.is_empty() {
        writeln!(out, "TITLE:{}", escape_text(&contact.title))?;
    }
    for address in &contact.addresses {
        writeln!(out, "ADR;TYPE=WORK:;;{};;;;", escape_text(address))?;
    }

    writeln!(out, "END:VCARD")?;
    Ok(out.into_bytes())
}

/// vCard 3.0's `N` property puts the family (last) name first; absent a
/// structured name field on [`Contact`], the last whitespace-separated
/// token of the display name is used as a best-effort family name.
fn family_name(display_name: &str) -> String {
    display_name
        .split_whitespace()
        .last()
        .unwrap_or(display_name)
        .to_string()
}

fn escape_text(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace(';', "\\;")
        .replace('\n', "\\n")
}

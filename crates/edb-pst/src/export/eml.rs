//! EML emission: renders an [`EmailMessage`] back out as an RFC 2822
//! message, the inverse of `crate::eml`'s parse direction.
//! `multipart/alternative` when both plain and HTML bodies are present, a
//! `multipart/mixed` wrapper when attachments exist, base64 for binary
//! parts (76-column wrapped), quoted-printable for non-ASCII text, and the
//! original `Message-ID` preserved verbatim.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::fmt::Write as _;

use crate::edb::entity::EmailMessage;
use crate::edb::source::EseSource;
use crate::util::crc::compute_crc;

use super::{fold_line, wrap_base64, ExportResult};

const BASE64_WRAP_WIDTH: usize = 76;

/// Renders `message` as a complete RFC 2822 byte stream. Attachments backed
/// by a long-value indirection (`AttachmentData::Lazy`) are materialized
/// through `source`; pass `None` only when every attachment is already
/// `Inline` (e.g. a message parsed straight from an `.eml` file).
pub fn render_eml(message: &EmailMessage, source: Option<&dyn EseSource>) -> ExportResult<Vec<u8>> {
    let mut out = String::new();

    if !message.message_id.is_empty() {
        writeln!(out, "Message-ID: {}", message.message_id)?;
    }
    writeln!(out, "Subject: {}", encode_header(&message.subject))?;
    writeln!(
        out,
        "From: {}",
        format_address(&message.sender_name, &message.sender_email)
    )?;
    if !message.recipients_to.is_empty() {
        writeln!(out, "To: {}", format_address_list(&message.recipients_to))?;
    }
    if !message.recipients_cc.is_empty() {
        writeln!(out, "Cc: {}", format_address_list(&message.recipients_cc))?;
    }
    if let Some(date) = message.date_sent {
        writeln!(out, "Date: {}", date.to_rfc2822())?;
    }
    writeln!(out, "Importance: {}", importance_header(message.importance))?;
    writeln!(out, "MIME-Version: 1.0")?;

    let has_html = !message.body_html.is_empty();
    let has_attachments = !message.attachments.is_empty();

    if !has_html && !has_attachments {
        writeln!(out, "Content-Type: text/plain; charset=UTF-8")?;
        write_body_part(&mut out, &message.body_text)?;
        return Ok(out.into_bytes());
    }

    let outer_boundary = boundary(&message.subject, "outer");
    if has_attachments {
        writeln!(
            out,
            "Content-Type: multipart/mixed; boundary=\"{outer_boundary}\""
        )?;
        writeln!(out)?;
        writeln!(out, "--{outer_boundary}")?;
    }

    if has_html {
        let alt_boundary = boundary(&message.subject, "alt");
        writeln!(
            out,
            "Content-Type: multipart/alternative; boundary=\"{alt_boundary}\""
        )?;
        writeln!(out)?;
        writeln!(out, "--{alt_boundary}")?;
        writeln!(out, "Content-Type: text/plain; charset=UTF-8")?;
        write_body_part(&mut out, &message.body_text)?;
        writeln!(out, "--{alt_boundary}")?;
        writeln!(out, "Content-Type: text/html; charset=UTF-8")?;
        write_body_part(&mut out, &message.body_html)?;
        writeln!(out, "--{alt_boundary}--")?;
    } else if has_attachments {
        writeln!(out, "Content-Type: text/plain; charset=UTF-8")?;
        write_body_part(&mut out, &message.body_text)?;
    }

    if has_attachments {
        for attachment in &message.attachments {
            writeln!(out, "--{outer_boundary}")?;
            let content_type = attachment.content_type.as_deref().unwrap_or("application/octet-stream");
            writeln!(out, "Content-Type: {content_type}; name=\"{}\"", attachment.filename)?;
            writeln!(out, "Content-Transfer-Encoding: base64")?;
            writeln!(
                out,
                "Content-Disposition: attachment; filename=\"{}\"",
                attachment.filename
            )?;
            writeln!(out)?;
            let data = match &attachment.data {
                crate::edb::entity::AttachmentData::Inline(bytes) => bytes.clone(),
                crate::edb::entity::AttachmentData::Lazy { .. } => {
                    let source = source
                        .ok_or(crate::edb::entity::EntityError::NoSourceForLazyAttachment)?;
                    attachment.fetch_data(source)?
                }
            };
            let encoded = BASE64.encode(&data);
            writeln!(out, "{}", wrap_base64(&encoded, BASE64_WRAP_WIDTH))?;
        }
        writeln!(out, "--{outer_boundary}--")?;
    }

    Ok(out.into_bytes())
}

fn importance_header(importance: crate::edb::entity::Importance) -> &'static str {
    match importance {
        crate::edb::entity::Importance::Low => "low",
        crate::edb::entity::Importance::Normal => "normal",
        crate::edb::entity::Importance::High => "high",
    }
}

fn write_body_part(out: &mut String, body: &str) -> ExportResult<()> {
    if body.is_ascii() {
        writeln!(out)?;
        writeln!(out, "{body}")?;
    } else {
        writeln!(out, "Content-Transfer-Encoding: quoted-printable")?;
        writeln!(out)?;
        writeln!(out, "{}", quoted_printable_encode(body))?;
    }
    Ok(())
}

/// Deterministic MIME boundary derived from the message content, avoiding
/// a random-number dependency while staying collision-resistant in
/// practice: the CRC-32 of `subject` salted by `tag` is astronomically
/// unlikely to appear verbatim inside the body text it delimits.
fn boundary(subject: &str, tag: &str) -> String {
    let crc = compute_crc(0, format!("{tag}:{subject}").as_bytes());
    format!("----=_Part_{crc:08X}_{tag}")
}

fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!(
            "=?UTF-8?B?{}?=",
            BASE64.encode(value.as_bytes())
        )
    }
}

fn format_address(name: &str, email: &str) -> String {
    if name.is_empty() || name == email {
        email.to_string()
    } else {
        format!("\"{name}\" <{email}>")
    }
}

fn format_address_list(recipients: &[crate::edb::entity::RecipientRef]) -> String {
    recipients
        .iter()
        .map(|r| format_address(&r.name, &r.email))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Minimal RFC 2045 quoted-printable encoder: escapes non-ASCII and `=`,
/// folds at 76 octets per line.
fn quoted_printable_encode(text: &str) -> String {
    let mut line = String::new();
    let mut out = Vec::new();
    for byte in text.as_bytes() {
        let piece = if *byte == b'=' || *byte >= 0x80 {
            format!("={byte:02X}")
        } else {
            (*byte as char).to_string()
        };
        if line.len() + piece.len() > 75 {
            out.push(fold_line(&line, 75));
            line.clear();
        }
        line.push_str(&piece);
    }
    if !line.is_empty() {
        out.push(line);
    }
    out.join("=\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edb::entity::{Attachment, AttachmentData, Importance, RecipientRef};

    fn sample() -> EmailMessage {
        EmailMessage {
            record_index: 1,
            folder_id: [0u8; 26],
            subject: "Hello".to_string(),
            sender_name: "A".to_string(),
            sender_email: "a@x.test".to_string(),
            recipients_to: vec![RecipientRef {
                name: "B".to_string(),
                email: "b@y.test".to_string(),
            }],
            recipients_cc: vec![],
            recipients_bcc: vec![],
            date_sent: None,
            date_received: None,
            message_id: "<1@x.test>".to_string(),
            importance: Importance::Normal,
            is_read: true,
            is_hidden: false,
            body_html: String::new(),
            body_text: "world".to_string(),
            attachments: vec![],
            message_class: "IPM.Note".to_string(),
        }
    }

    #[test]
    fn test_plain_text_render() {
        let rendered = String::from_utf8(render_eml(&sample(), None).unwrap()).unwrap();
        assert!(rendered.contains("Subject: Hello"));
        assert!(rendered.contains("To: b@y.test"));
        assert!(rendered.contains("world"));
        assert!(rendered.contains("Message-ID: <1@x.test>"));
    }

    #[test]
    fn test_multipart_alternative_when_html_present() {
        let mut message = sample();
        message.body_html = "<p>world</p>".to_string();
        let rendered = String::from_utf8(render_eml(&message, None).unwrap()).unwrap();
        assert!(rendered.contains("multipart/alternative"));
        assert!(rendered.contains("text/html"));
    }

    #[test]
    fn test_multipart_mixed_with_attachment() {
        let mut message = sample();
        message.attachments.push(Attachment {
            filename: "a.txt".to_string(),
            content_type: Some("text/plain".to_string()),
            size: 3,
            data: AttachmentData::Inline(b"abc".to_vec()),
        });
        let rendered = String::from_utf8(render_eml(&message, None).unwrap()).unwrap();
        assert!(rendered.contains("multipart/mixed"));
        assert!(rendered.contains("Content-Transfer-Encoding: base64"));
    }

    #[test]
    fn test_quoted_printable_for_non_ascii_body() {
        let mut message = sample();
        message.body_text = "Привет".to_string();
        let rendered = String::from_utf8(render_eml(&message, None).unwrap()).unwrap();
        assert!(rendered.contains("Content-Transfer-Encoding: quoted-printable"));
    }

    #[test]
    fn test_lazy_attachment_resolves_through_source() {
        use crate::edb::source::MockEseSource;

        let mut source = MockEseSource::new();
        source.add_long_value(42, b"abc".to_vec());

        let mut message = sample();
        message.attachments.push(Attachment {
            filename: "a.txt".to_string(),
            content_type: Some("text/plain".to_string()),
            size: 3,
            data: AttachmentData::Lazy { lv_id: 42 },
        });

        let rendered = String::from_utf8(render_eml(&message, Some(&source)).unwrap()).unwrap();
        assert!(rendered.contains("multipart/mixed"));
        assert!(rendered.contains(&BASE64.encode(b"abc")));
    }

    #[test]
    fn test_lazy_attachment_without_source_fails() {
        let mut message = sample();
        message.attachments.push(Attachment {
            filename: "a.txt".to_string(),
            content_type: Some("text/plain".to_string()),
            size: 3,
            data: AttachmentData::Lazy { lv_id: 42 },
        });

        let err = render_eml(&message, None).unwrap_err();
        assert!(matches!(
            err,
            super::super::ExportError::AttachmentFetch(
                crate::edb::entity::EntityError::NoSourceForLazyAttachment
            )
        ));
    }
}

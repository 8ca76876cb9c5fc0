//! `multipart/mixed` framing for the Google API batch endpoint.
//!
//! Each request part carries `Content-ID: <item{index}>`; the service answers
//! with `<response-item{index}>` so results can be matched back even when the
//! parts come back reordered.

use crate::infrastructure::error::InfraError;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequestPart {
    pub method: &'static str,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResponsePart {
    pub index: usize,
    pub status: u16,
    pub body: String,
}

impl BatchResponsePart {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub fn encode_batch(boundary: &str, parts: &[BatchRequestPart]) -> String {
    let mut payload = String::new();
    for (index, part) in parts.iter().enumerate() {
        let _ = write!(
            payload,
            "--{boundary}\r\n\
             Content-Type: application/http\r\n\
             Content-ID: <item{index}>\r\n\
             \r\n\
             {} {}\r\n\
             \r\n",
            part.method, part.path
        );
    }
    let _ = write!(payload, "--{boundary}--\r\n");
    payload
}

pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    let (mime, params) = content_type.split_once(';')?;
    if !mime.trim().eq_ignore_ascii_case("multipart/mixed") {
        return None;
    }
    params.split(';').find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("boundary")
            .then(|| value.trim().trim_matches('"').to_string())
            .filter(|value| !value.is_empty())
    })
}

pub fn decode_batch(content_type: &str, body: &str) -> Result<Vec<BatchResponsePart>, InfraError> {
    let boundary = boundary_from_content_type(content_type).ok_or_else(|| {
        InfraError::Connection(format!(
            "batch response is not multipart/mixed: content-type={content_type}"
        ))
    })?;

    let normalized = body.replace("\r\n", "\n");
    let delimiter = format!("--{boundary}");
    let mut parts = Vec::new();

    // The first segment is the preamble before the opening delimiter.
    for (position, segment) in normalized.split(delimiter.as_str()).skip(1).enumerate() {
        if segment.starts_with("--") {
            break;
        }
        let segment = segment.trim_start_matches('\n');
        let (part_headers, message) = segment.split_once("\n\n").ok_or_else(|| {
            InfraError::Connection(format!("malformed batch part #{position}"))
        })?;

        let index = part_headers
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.trim()
                    .eq_ignore_ascii_case("content-id")
                    .then(|| parse_content_id(value))
                    .flatten()
            })
            .unwrap_or(position);

        let (status_and_headers, response_body) =
            message.split_once("\n\n").unwrap_or((message, ""));
        let status_line = status_and_headers.lines().next().unwrap_or_default();
        let status = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse::<u16>().ok())
            .ok_or_else(|| {
                InfraError::Connection(format!(
                    "malformed status line in batch part #{position}: {status_line}"
                ))
            })?;

        parts.push(BatchResponsePart {
            index,
            status,
            body: response_body.trim().to_string(),
        });
    }

    Ok(parts)
}

fn parse_content_id(value: &str) -> Option<usize> {
    value
        .trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim_start_matches("response-")
        .trim_start_matches("item")
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_batch_frames_each_request() {
        let payload = encode_batch(
            "batch_x",
            &[
                BatchRequestPart {
                    method: "DELETE",
                    path: "/calendar/v3/calendars/cal/events/a".to_string(),
                },
                BatchRequestPart {
                    method: "DELETE",
                    path: "/calendar/v3/calendars/cal/events/b".to_string(),
                },
            ],
        );

        assert_eq!(
            payload,
            "--batch_x\r\nContent-Type: application/http\r\nContent-ID: <item0>\r\n\r\n\
             DELETE /calendar/v3/calendars/cal/events/a\r\n\r\n\
             --batch_x\r\nContent-Type: application/http\r\nContent-ID: <item1>\r\n\r\n\
             DELETE /calendar/v3/calendars/cal/events/b\r\n\r\n\
             --batch_x--\r\n"
        );
    }

    #[test]
    fn boundary_is_read_from_content_type() {
        assert_eq!(
            boundary_from_content_type("multipart/mixed; boundary=batch_abc"),
            Some("batch_abc".to_string())
        );
        assert_eq!(
            boundary_from_content_type("Multipart/Mixed; charset=UTF-8; boundary=\"q\""),
            Some("q".to_string())
        );
        assert_eq!(boundary_from_content_type("application/json"), None);
    }

    #[test]
    fn decode_batch_matches_parts_by_content_id() {
        let body = "--batch_r\r\n\
            Content-Type: application/http\r\n\
            Content-ID: <response-item1>\r\n\
            \r\n\
            HTTP/1.1 404 Not Found\r\n\
            Content-Type: application/json; charset=UTF-8\r\n\
            \r\n\
            {\"error\": {\"code\": 404, \"message\": \"Not Found\"}}\r\n\
            --batch_r\r\n\
            Content-Type: application/http\r\n\
            Content-ID: <response-item0>\r\n\
            \r\n\
            HTTP/1.1 204 No Content\r\n\
            \r\n\
            \r\n\
            --batch_r--\r\n";

        let parts =
            decode_batch("multipart/mixed; boundary=batch_r", body).expect("decode batch");

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].index, 1);
        assert_eq!(parts[0].status, 404);
        assert!(!parts[0].is_success());
        assert!(parts[0].body.contains("Not Found"));
        assert_eq!(parts[1].index, 0);
        assert_eq!(parts[1].status, 204);
        assert!(parts[1].is_success());
        assert_eq!(parts[1].body, "");
    }

    #[test]
    fn decode_batch_rejects_non_multipart_response() {
        assert!(matches!(
            decode_batch("application/json", "{}"),
            Err(InfraError::Connection(_))
        ));
    }
}

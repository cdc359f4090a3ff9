//! HTTP response wrappers.

use std::collections::HashMap;

/// A fully read GET response.
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    pub status: u16,
    /// URL after following redirects.
    pub final_url: String,
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl FetchedPage {
    /// Check if the response is successful.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Get the Content-Type header.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(|s| s.as_str())
    }

    /// Get the Content-Length header.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get("content-length")
            .and_then(|s| s.trim().parse().ok())
    }

    /// Whether the declared content type is textual (HTML, XML, plain text).
    pub fn is_text(&self) -> bool {
        self.content_type()
            .map(|ct| ct.to_lowercase().contains("text"))
            .unwrap_or(false)
    }

    /// Get the filename from Content-Disposition header.
    pub fn content_disposition_filename(&self) -> Option<String> {
        self.headers
            .get("content-disposition")
            .and_then(|h| parse_content_disposition_filename(h))
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// HEAD response (no body, just headers).
#[derive(Debug, Clone, Default)]
pub struct HeadInfo {
    pub status: u16,
    /// URL after following redirects.
    pub final_url: String,
    pub headers: HashMap<String, String>,
}

impl HeadInfo {
    /// Get the Content-Type header.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(|s| s.as_str())
    }

    /// Get the Content-Length header.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get("content-length")
            .and_then(|s| s.trim().parse().ok())
    }
}

/// Whether a content type or URL signals a PDF document.
///
/// The URL check ignores any query string or fragment.
pub fn signals_pdf(content_type: Option<&str>, url: &str) -> bool {
    let type_says_pdf = content_type
        .map(|ct| ct.to_lowercase().contains("pdf"))
        .unwrap_or(false);
    type_says_pdf || url_path_is_pdf(url)
}

/// Whether a URL (minus query and fragment) ends in `.pdf`.
pub fn url_path_is_pdf(url: &str) -> bool {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].to_lowercase().ends_with(".pdf")
}

/// Parse filename from Content-Disposition header value.
/// Parses both `filename="name.pdf"` and `filename*=UTF-8''name.pdf` formats.
pub fn parse_content_disposition_filename(header: &str) -> Option<String> {
    // Try filename*= first (RFC 5987 encoded)
    if let Some(start) = header.find("filename*=") {
        let rest = &header[start + 10..];
        if let Some(quote_start) = rest.find("''") {
            let encoded = rest[quote_start + 2..].split([';', ' ']).next()?;
            if let Ok(decoded) = urlencoding::decode(encoded) {
                let filename = decoded.trim().to_string();
                if !filename.is_empty() {
                    return Some(filename);
                }
            }
        }
    }

    if let Some(start) = header.find("filename=") {
        let rest = &header[start + 9..];
        let filename = if let Some(quoted) = rest.strip_prefix('"') {
            quoted.split('"').next()
        } else {
            rest.split([';', ' ']).next()
        };

        if let Some(name) = filename {
            let name = name.trim().to_string();
            if !name.is_empty() {
                return Some(name);
            }
        }
    }

    None
}

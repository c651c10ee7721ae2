//! HTML certificate renderer.
//!
//! Produces a self-contained HTML page with all CSS inlined.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use examguard_core::result::CertificateRequest;
use examguard_core::traits::CertificateRenderer;

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// `March 5, 2026`.
pub fn format_certificate_date(at: &DateTime<Utc>) -> String {
    at.format("%B %-d, %Y").to_string()
}

/// Generate the certificate page.
pub fn generate_certificate_html(request: &CertificateRequest) -> String {
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>Certificate of Completion: {}</title>\n",
        html_escape(&request.exam_title)
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    html.push_str("<main class=\"certificate\">\n");
    html.push_str("<h1>Certificate of Completion</h1>\n");
    html.push_str("<p class=\"lead\">This certifies that</p>\n");
    html.push_str(&format!(
        "<p class=\"name\">{}</p>\n",
        html_escape(&request.student_name)
    ));
    html.push_str("<p class=\"lead\">has successfully completed</p>\n");
    html.push_str(&format!(
        "<p class=\"exam\">{}</p>\n",
        html_escape(&request.exam_title)
    ));
    html.push_str(&format!(
        "<p class=\"score\">with a score of <strong>{}%</strong></p>\n",
        request.percentage
    ));
    html.push_str(&format!(
        "<p class=\"meta\">{} &middot; Exam code {}</p>\n",
        format_certificate_date(&request.completed_at),
        html_escape(&request.exam_code)
    ));
    html.push_str("</main>\n");

    html.push_str("</body>\n</html>");
    html
}

/// Write a certificate to a file.
pub fn write_certificate(request: &CertificateRequest, path: &Path) -> Result<()> {
    let html = generate_certificate_html(request);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, html)
        .with_context(|| format!("failed to write certificate to {}", path.display()))?;
    Ok(())
}

fn slug(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

/// Writes each certificate into a fixed directory.
#[derive(Debug, Clone)]
pub struct HtmlCertificateRenderer {
    output_dir: PathBuf,
}

impl HtmlCertificateRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Where the certificate for `request` is written.
    pub fn certificate_path(&self, request: &CertificateRequest) -> PathBuf {
        let name = format!(
            "certificate-{}-{}-{}.html",
            slug(&request.exam_code),
            slug(&request.student_name),
            request.completed_at.format("%Y%m%d%H%M%S")
        );
        self.output_dir.join(name)
    }
}

impl CertificateRenderer for HtmlCertificateRenderer {
    fn render(&self, request: &CertificateRequest) -> Result<()> {
        let path = self.certificate_path(request);
        write_certificate(request, &path)?;
        tracing::info!(path = %path.display(), "certificate written");
        Ok(())
    }
}

const CSS: &str = r#"
:root { --bg: #fdfbf5; --fg: #1a1a1a; --accent: #1e3a8a; --border: #c9a227; }
body { font-family: Georgia, 'Times New Roman', serif; margin: 0; padding: 3rem; background: var(--bg); color: var(--fg); }
.certificate { max-width: 720px; margin: 0 auto; padding: 3rem; border: 6px double var(--border); text-align: center; }
h1 { color: var(--accent); font-size: 2.2rem; letter-spacing: 0.05em; }
.lead { font-style: italic; color: #4b5563; }
.name { font-size: 2rem; font-weight: bold; margin: 0.5rem 0 1.5rem; }
.exam { font-size: 1.4rem; color: var(--accent); }
.score { font-size: 1.1rem; }
.meta { margin-top: 2.5rem; color: #6b7280; font-size: 0.9rem; }
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn request() -> CertificateRequest {
        CertificateRequest {
            student_name: "Ada <Lovelace>".into(),
            exam_title: "Web Development Certification Exam".into(),
            percentage: 80,
            completed_at: Utc.with_ymd_and_hms(2026, 3, 5, 14, 0, 0).unwrap(),
            exam_code: "SAMPLE-2024".into(),
        }
    }

    #[test]
    fn date_has_no_leading_zero() {
        assert_eq!(format_certificate_date(&request().completed_at), "March 5, 2026");
    }

    #[test]
    fn certificate_contains_required_elements() {
        let html = generate_certificate_html(&request());
        assert!(html.contains("<html"));
        assert!(html.contains("</html>"));
        assert!(html.contains("Ada &lt;Lovelace&gt;"));
        assert!(html.contains("Web Development Certification Exam"));
        assert!(html.contains("<strong>80%</strong>"));
        assert!(html.contains("March 5, 2026"));
        assert!(!html.contains("<Lovelace>"));
    }

    #[test]
    fn renderer_writes_into_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = HtmlCertificateRenderer::new(dir.path().join("certs"));
        let request = request();
        renderer.render(&request).unwrap();

        let path = renderer.certificate_path(&request);
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "certificate-sample-2024-ada-lovelace-20260305140000.html"
        );
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Certificate of Completion"));
    }
}

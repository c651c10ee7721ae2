//! examguard-report: certificates and result summaries.

pub mod certificate;
pub mod summary;

pub use certificate::{
    format_certificate_date, generate_certificate_html, write_certificate, HtmlCertificateRenderer,
};
pub use summary::{render_score_summary, ResultExport, ResultStats};

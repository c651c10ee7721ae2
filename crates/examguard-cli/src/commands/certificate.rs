//! The `examguard certificate` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use examguard_core::result::certificate_eligible;
use examguard_core::traits::CertificateRenderer;
use examguard_providers::{create_lookup, load_config_from, JsonlResultStore};
use examguard_report::HtmlCertificateRenderer;

pub async fn execute(
    result_id: String,
    output: PathBuf,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let store = JsonlResultStore::new(&config.results_path);
    let prefix = result_id.trim().to_ascii_lowercase();
    if prefix.is_empty() {
        anyhow::bail!("result id must not be empty");
    }

    let mut matches: Vec<_> = store
        .load_all()?
        .into_iter()
        .filter(|r| r.id.to_string().starts_with(&prefix))
        .collect();
    let result = match matches.len() {
        0 => anyhow::bail!("no result with id '{result_id}'"),
        1 => matches.remove(0),
        n => anyhow::bail!("'{result_id}' matches {n} results, use a longer prefix"),
    };

    let exam = create_lookup(&config)?
        .lookup(&result.exam_code)
        .await?
        .with_context(|| format!("exam {} is no longer available", result.exam_code))?;
    if !certificate_eligible(result.passed, &exam.settings, result.reason) {
        anyhow::bail!(
            "result {} is not eligible for a certificate ({}%, {})",
            result.id,
            result.percentage,
            result.reason
        );
    }

    let renderer = HtmlCertificateRenderer::new(&output);
    let request = result.certificate_request();
    renderer.render(&request)?;
    println!("Certificate: {}", renderer.certificate_path(&request).display());
    Ok(())
}

use super::load_config;
use crate::output::{print_json, print_table};
use anyhow::Context;
use sitectl_core::audit::Auditor;
use std::path::Path;

pub fn run(root: &Path, save: bool, json: bool) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let auditor = Auditor::new(config.site_url(), config.wordpress.timeout())?;
    let report = auditor.run(&config.audit);

    let saved = if save {
        Some(report.save(root).context("failed to save audit report")?)
    } else {
        None
    };

    if json {
        print_json(&report)?;
        return Ok(());
    }

    let rows = report
        .pages
        .iter()
        .map(|p| {
            let missing: Vec<&str> = p
                .checks
                .iter()
                .filter(|c| !c.compliant)
                .map(|c| c.group.as_str())
                .collect();
            let detail = match &p.error {
                Some(e) => e.clone(),
                None => missing.join(", "),
            };
            vec![
                p.path.clone(),
                if p.compliant { "pass" } else { "fail" }.to_string(),
                detail,
            ]
        })
        .collect();
    print_table(&["PAGE", "RESULT", "MISSING"], rows);

    println!(
        "\n{}/{} pages compliant ({:.0}%)",
        report.summary.passed, report.summary.total, report.summary.compliance_percentage
    );
    if !report.recommendations.is_empty() {
        println!("\nRecommendations:");
        for r in &report.recommendations {
            println!("  - {r}");
        }
    }
    if let Some(path) = saved {
        println!("\nReport saved to {}", path.display());
    }
    Ok(())
}

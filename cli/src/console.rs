//! Terminal output

use api_models::{DeployResult, ServiceSchema};
use colored::Colorize;

pub fn step(message: &str) {
    println!("{}", message.bold().white());
}

pub fn success(message: &str) {
    println!("{}", format!("✓ {}", message).green());
}

pub fn warning(message: &str) {
    eprintln!("{}", format!("! {}", message).yellow());
}

pub fn error(message: &str) {
    eprintln!("{}", format!("✗ {}", message).red().bold());
}

/// Per-service outcome of a deploy, succeeded first
pub fn deploy_report(result: &DeployResult) -> Vec<String> {
    let succeeded = result
        .succeeded
        .iter()
        .map(|name| format!("{} {}", "✓".green(), name));
    let failed = result
        .failed
        .iter()
        .map(|name| format!("{} {}", "✗".red(), name));
    succeeded.chain(failed).collect()
}

const STATUS_HEADERS: [&str; 3] = ["Name", "Git Hash", "Created At"];

/// Rows of the status table, header first, columns padded to a common width
pub fn status_table(services: &[ServiceSchema]) -> Vec<String> {
    let rows: Vec<[String; 3]> = services
        .iter()
        .map(|s| {
            [
                s.name.clone(),
                s.deployment.git_hash.clone(),
                s.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]
        })
        .collect();

    let mut widths = STATUS_HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let header = format!(
        "{:<w0$}  {:<w1$}  {:<w2$}",
        STATUS_HEADERS[0],
        STATUS_HEADERS[1],
        STATUS_HEADERS[2],
        w0 = widths[0],
        w1 = widths[1],
        w2 = widths[2],
    );
    let mut lines = vec![header.bold().to_string()];
    for [name, git_hash, created_at] in rows {
        lines.push(format!(
            "{}  {}  {}",
            format!("{:<w$}", name, w = widths[0]).cyan(),
            format!("{:<w$}", git_hash, w = widths[1]).magenta(),
            format!("{:<w$}", created_at, w = widths[2]).yellow(),
        ));
    }
    lines
}

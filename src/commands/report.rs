use crate::validation::{Finding, ValidationReport};
use colored::*;
use std::path::{Path, PathBuf};

/// Print a validation report, one block per document
pub fn print_report(document: &Path, declarations: &[PathBuf], report: Option<&ValidationReport>) {
    let Some(report) = report else {
        println!("  {} {}", "✓".green(), document.display());
        for path in declarations {
            println!("  {} {}", "✓".green(), path.display());
        }
        println!();
        println!("{}", "✓ Document is valid".green().bold());
        return;
    };

    print_findings(document, &report.errors, &report.warnings);
    for (path, findings) in declarations.iter().zip(&report.api_declarations) {
        print_findings(path, &findings.errors, &findings.warnings);
    }
    println!();

    if report.is_valid() {
        println!(
            "{}",
            format!("✓ Document is valid ({} warnings)", report.warning_count())
                .green()
                .bold()
        );
    } else {
        println!(
            "{}",
            format!(
                "✗ Validation failed: {} errors, {} warnings",
                report.error_count(),
                report.warning_count()
            )
            .red()
            .bold()
        );
    }
}

fn print_findings(path: &Path, errors: &[Finding], warnings: &[Finding]) {
    let status = if errors.is_empty() { "✓".green() } else { "✗".red() };
    println!("  {} {}", status, path.display().to_string().bold());

    for finding in errors {
        println!("    {} {}", "error".red().bold(), finding.format().red());
    }
    for finding in warnings {
        println!("    {} {}", "warning".yellow().bold(), finding.format().yellow());
    }
}

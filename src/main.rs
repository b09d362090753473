//! xmlscan - XML static analysis from the command line

use std::process::ExitCode;

use clap::Parser;

use xmlscan::{Analyzer, FileAnalysis};

#[derive(Parser)]
#[command(name = "xmlscan")]
#[command(version, about = "XML static analysis", long_about = None)]
#[command(after_help = "EXAMPLES:
    xmlscan pom.xml              Analyze one file
    xmlscan a.xml b.xml --json   Analyze several files, JSON output")]
struct Cli {
    /// XML files to analyze
    #[arg(value_name = "FILES", required = true)]
    files: Vec<String>,

    /// Declared encoding to assume when the file does not say
    #[arg(long, value_name = "ENCODING")]
    encoding: Option<String>,

    /// Emit results as JSON
    #[arg(long)]
    json: bool,

    /// Suppress per-file metrics output
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let analyzer = Analyzer::with_builtin_checks();

    let mut failed = false;
    let mut reports = Vec::new();

    for path in &cli.files {
        match analyzer.analyze_file(path, cli.encoding.as_deref()) {
            Ok(analysis) => {
                failed |= !analysis.issues.is_empty() || !analysis.errors.is_empty();
                reports.push((path.clone(), analysis));
            }
            Err(e) => {
                eprintln!("error: {path}: {e}");
                failed = true;
            }
        }
    }

    if cli.json {
        print_json(&reports);
    } else {
        for (path, analysis) in &reports {
            print_text(path, analysis, cli.quiet);
        }
    }

    if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

fn print_text(path: &str, analysis: &FileAnalysis, quiet: bool) {
    for error in &analysis.errors {
        match &error.position {
            Some(pos) => eprintln!("{path}:{}:{}: analysis error: {}", pos.line, pos.column, error.message),
            None => eprintln!("{path}: analysis error: {}", error.message),
        }
    }

    for issue in &analysis.issues {
        match &issue.range {
            Some(range) => println!(
                "{path}:{}:{} [{}] {}",
                range.start.line, range.start.column, issue.rule_key, issue.message
            ),
            None => println!("{path} [{}] {}", issue.rule_key, issue.message),
        }
    }

    for failure in &analysis.check_failures {
        eprintln!("{path}: check {} failed: {}", failure.rule_key, failure.cause);
    }

    if !quiet {
        let m = &analysis.metrics;
        println!(
            "{path}: {} code lines, {} comment lines, {} blank lines, {} issues",
            m.code_lines,
            m.comment_lines,
            m.blank_lines,
            analysis.issues.len()
        );
    }
}

fn print_json(reports: &[(String, FileAnalysis)]) {
    let files: Vec<_> = reports
        .iter()
        .map(|(path, analysis)| {
            serde_json::json!({
                "path": path,
                "metrics": {
                    "codeLines": analysis.metrics.code_lines,
                    "commentLines": analysis.metrics.comment_lines,
                    "blankLines": analysis.metrics.blank_lines,
                },
                "issues": analysis.issues.iter().map(|issue| {
                    serde_json::json!({
                        "ruleKey": issue.rule_key,
                        "message": issue.message,
                        "range": issue.range.map(|r| serde_json::json!({
                            "startLine": r.start.line,
                            "startColumn": r.start.column,
                            "endLine": r.end.line,
                            "endColumn": r.end.column,
                        })),
                    })
                }).collect::<Vec<_>>(),
                "errors": analysis.errors.iter().map(|e| e.message.clone()).collect::<Vec<_>>(),
            })
        })
        .collect();

    let doc = serde_json::json!({ "files": files });
    println!("{}", serde_json::to_string_pretty(&doc).unwrap_or_default());
}

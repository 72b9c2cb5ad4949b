use std::collections::BTreeMap;
use std::fmt::Write;
use std::fs;
use std::path::Path;

use anyhow::Context;
use rustc_hash::FxHashSet;
use serde_json::Value;

use rawnav_core::{Notice, NoticeSeverity};

use crate::RunReport;

const NOTICE_ROW_LIMIT: usize = 50;

const STYLE: &str = r#"
        body { font-family: Helvetica, Arial, sans-serif; margin: 2em; color: #222; }
        h1 { font-size: 1.6em; }
        table { border-collapse: collapse; margin-bottom: 1.5em; }
        th, td { border: 1px solid #ccc; padding: 4px 8px; text-align: left; }
        th { background: #f2f2f2; }
        .error { color: #b00020; font-weight: bold; }
        .warning { color: #c77700; font-weight: bold; }
        .info { color: #1f5fa8; }
        .summary-cell { display: inline-block; vertical-align: top; margin-right: 3em; }
        .description td { background: #fafafa; }
"#;

pub fn write_html_report<P: AsRef<Path>>(path: P, report: &RunReport) -> anyhow::Result<()> {
    let html = render_html(report);
    fs::write(&path, html)
        .with_context(|| format!("write html report to {}", path.as_ref().display()))?;
    Ok(())
}

fn render_html(report: &RunReport) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n    <meta charset=\"utf-8\" />\n    <title>Rawnav stop matching report</title>\n    <style>");
    out.push_str(STYLE);
    out.push_str("    </style>\n</head>\n<body>\n    <h1>Rawnav stop matching report</h1>\n    <p>Generated at ");
    push_escaped(&mut out, &report.generated_at);
    if let Some(version) = report.version.as_deref() {
        out.push_str(" by rawnav-matcher ");
        push_escaped(&mut out, version);
    }
    out.push_str("</p>\n    <div>\n");
    render_inputs(&mut out, report);
    render_key_values(&mut out, "Settings", &to_entries(&report.settings));
    render_key_values(&mut out, "Counts", &to_entries(&report.counts));
    out.push_str("    </div>\n");

    out.push_str("    <h2>Notices</h2>\n");
    if report.notices.is_empty() {
        out.push_str("    <p>No notices.</p>\n");
    } else {
        out.push_str("    <table>\n        <thead>\n            <tr><th>Code</th><th>Severity</th><th>Total</th></tr>\n        </thead>\n        <tbody>\n");
        render_notice_groups(&mut out, &report.notices);
        out.push_str("        </tbody>\n    </table>\n");
    }
    out.push_str("</body>\n</html>\n");
    out
}

fn render_inputs(out: &mut String, report: &RunReport) {
    let mut entries = vec![
        ("trace".to_string(), report.inputs.trace.display().to_string()),
        (
            "reference".to_string(),
            report.inputs.reference.display().to_string(),
        ),
    ];
    if let Some(path) = report.inputs.segment_boundaries.as_ref() {
        entries.push(("segment boundaries".to_string(), path.display().to_string()));
    }
    render_key_values(out, "Inputs", &entries);
}

fn render_key_values(out: &mut String, title: &str, entries: &[(String, String)]) {
    out.push_str("        <div class=\"summary-cell\">\n            <h4>");
    push_escaped(out, title);
    out.push_str("</h4>\n            <ul>\n");
    for (key, value) in entries {
        out.push_str("                <li>");
        push_escaped(out, &format!("{key}: {value}"));
        out.push_str("</li>\n");
    }
    out.push_str("            </ul>\n        </div>\n");
}

/// Flattens a serializable struct into display rows.
fn to_entries<T: serde::Serialize>(value: &T) -> Vec<(String, String)> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map
            .into_iter()
            .map(|(key, value)| (key.replace('_', " "), display_value(&value)))
            .collect(),
        _ => Vec::new(),
    }
}

fn severity_label(severity: NoticeSeverity) -> &'static str {
    match severity {
        NoticeSeverity::Error => "ERROR",
        NoticeSeverity::Warning => "WARNING",
        NoticeSeverity::Info => "INFO",
    }
}

fn severity_class(severity: NoticeSeverity) -> &'static str {
    match severity {
        NoticeSeverity::Error => "error",
        NoticeSeverity::Warning => "warning",
        NoticeSeverity::Info => "info",
    }
}

fn render_notice_groups(out: &mut String, notices: &[Notice]) {
    let mut grouped: BTreeMap<(NoticeSeverity, &str), Vec<&Notice>> = BTreeMap::new();
    for notice in notices {
        grouped
            .entry((notice.severity, notice.code.as_str()))
            .or_default()
            .push(notice);
    }
    for ((severity, code), group) in grouped {
        render_notice_group(out, severity, code, &group);
    }
}

fn render_notice_group(out: &mut String, severity: NoticeSeverity, code: &str, notices: &[&Notice]) {
    let fields = notice_fields(notices);
    let description = notices
        .first()
        .map(|notice| notice.message.as_str())
        .unwrap_or("");

    out.push_str("            <tr class=\"notice\">\n                <td>");
    push_escaped(out, code);
    out.push_str("</td>\n                <td class=\"");
    out.push_str(severity_class(severity));
    out.push_str("\">");
    out.push_str(severity_label(severity));
    out.push_str("</td>\n                <td>");
    write!(out, "{}", notices.len()).ok();
    out.push_str("</td>\n            </tr>\n            <tr class=\"description\">\n                <td colspan=\"3\">\n                    <p>");
    push_escaped(out, description);
    out.push_str("</p>\n");
    if notices.len() > NOTICE_ROW_LIMIT {
        writeln!(
            out,
            "                    <p>Only the first {} of {} affected records are displayed below.</p>",
            NOTICE_ROW_LIMIT,
            notices.len()
        )
        .ok();
    }
    if !fields.is_empty() {
        out.push_str("                    <table>\n                        <thead>\n                            <tr>");
        for field in &fields {
            out.push_str("<th>");
            push_escaped(out, field);
            out.push_str("</th>");
        }
        out.push_str("</tr>\n                        </thead>\n                        <tbody>\n");
        for notice in notices.iter().take(NOTICE_ROW_LIMIT) {
            out.push_str("                            <tr>");
            for field in &fields {
                out.push_str("<td>");
                match notice.context.get(field) {
                    Some(value) => push_escaped(out, &display_value(value)),
                    None => out.push_str("N/A"),
                }
                out.push_str("</td>");
            }
            out.push_str("</tr>\n");
        }
        out.push_str("                        </tbody>\n                    </table>\n");
    }
    out.push_str("                </td>\n            </tr>\n");
}

/// Column order of the first notice, then any extra keys the others carry.
fn notice_fields(notices: &[&Notice]) -> Vec<String> {
    let mut seen = FxHashSet::default();
    let mut fields = Vec::new();
    for notice in notices {
        let keys = if notice.field_order.is_empty() {
            notice.context.keys().cloned().collect()
        } else {
            notice.field_order.clone()
        };
        for key in keys {
            if seen.insert(key.clone()) {
                fields.push(key);
            }
        }
    }
    fields
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "N/A".to_string(),
        other => other.to_string(),
    }
}

fn push_escaped(out: &mut String, value: &str) {
    out.push_str(&escape_html(value));
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

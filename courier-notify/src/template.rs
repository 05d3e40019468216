//! Placeholder substitution for notification templates.
//!
//! Templates carry a fixed set of `{{token}}` placeholders. Rendering is
//! literal substring replacement: tokens are disjoint so order does not
//! matter, unmatched tokens stay in the output verbatim, and a missing value
//! always substitutes the empty string — never `"null"`. Rendering cannot
//! fail.

use chrono::NaiveDate;
use courier_core::{Recipient, Task};

/// Render a template against a task and one resolved recipient.
///
/// Recipient-dependent tokens (organization logo, company fallback) may vary
/// the output per recipient.
pub fn render(template: &str, task: &Task, recipient: &Recipient) -> String {
    if template.is_empty() {
        return String::new();
    }

    let organization = recipient.organization.as_ref();
    let logo = organization
        .and_then(|org| org.logo.as_deref())
        .map(|logo| format!("cid:{}", logo))
        .unwrap_or_default();
    let company = task
        .company
        .clone()
        .or_else(|| organization.map(|org| org.name.clone()))
        .unwrap_or_default();

    let replacements: [(&str, String); 14] = [
        ("{{task_id}}", task.id.to_string()),
        ("{{task_name}}", task.name.clone()),
        (
            "{{task_description}}",
            task.description.clone().unwrap_or_default(),
        ),
        (
            "{{notification_date}}",
            format_date(Some(task.notification_date)),
        ),
        ("{{start_date}}", format_date(task.start_date)),
        ("{{end_date}}", format_date(task.end_date)),
        (
            "{{notification_time}}",
            task.notification_time.clone().unwrap_or_default(),
        ),
        ("{{document_name}}", metadata_field(task, "name")),
        ("{{document_id}}", metadata_field(task, "id")),
        ("{{request_name}}", task.name.clone()),
        ("{{request_id}}", metadata_field(task, "id")),
        ("{{organization_logo}}", logo),
        ("{{company}}", company),
        (
            "{{front_document_url}}",
            task.url.clone().unwrap_or_default(),
        ),
    ];

    let mut rendered = template.to_string();
    for (token, value) in replacements {
        if rendered.contains(token) {
            rendered = rendered.replace(token, &value);
        }
    }

    rendered
}

/// Day/month/year formatting; absent dates render empty.
fn format_date(date: Option<NaiveDate>) -> String {
    match date {
        Some(date) => date.format("%d/%m/%Y").to_string(),
        None => String::new(),
    }
}

/// String-coerce a field of the task's opaque metadata payload.
fn metadata_field(task: &Task, key: &str) -> String {
    match task.metadata.get(key) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

use anyhow::Result;
use serde_json::Value;
use sqlgrant_domain::ResourceModel;
use sqlgrant_resource::{Action, Change};

use crate::cli::OutputFormat;

/// Render a list of changes as human-readable text.
pub fn render_changes(changes: &[Change]) -> String {
    if changes.is_empty() {
        return "No changes.\n".to_string();
    }
    let mut out = String::new();
    for change in changes {
        let id = change.id.as_deref().unwrap_or("?");
        let line = match change.action {
            Action::Created => format!("+ {} {}", change.kind, id),
            Action::Updated => format!("~ {} {}", change.kind, id),
            Action::Replaced => format!(
                "-/+ {} {} (replaced: {})",
                change.kind,
                id,
                change.replaced_fields.join(", ")
            ),
        };
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// One resource, as `kind id` followed by its attributes, or as JSON.
pub fn render_state(model: &ResourceModel, format: OutputFormat) -> Result<String> {
    let value = serde_json::to_value(model)?;
    if let OutputFormat::Json = format {
        return Ok(format!("{}\n", serde_json::to_string_pretty(&value)?));
    }

    let mut out = format!("{} {}\n", model.kind(), model.id().unwrap_or("?"));
    if let Value::Object(fields) = value {
        for (key, field) in fields {
            if key == "kind" || key == "id" {
                continue;
            }
            out.push_str(&format!("  {key}: {}\n", plain(&field)));
        }
    }
    Ok(out)
}

fn plain(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlgrant_domain::ServerRoleData;

    #[test]
    fn changes_render_one_line_each() {
        let changes = vec![
            Change { kind: "schema", action: Action::Created, id: Some("5/7".into()), replaced_fields: vec![] },
            Change {
                kind: "server_role",
                action: Action::Replaced,
                id: Some("271".into()),
                replaced_fields: vec!["owner_id".into()],
            },
        ];

        assert_eq!(
            render_changes(&changes),
            "+ schema 5/7\n-/+ server_role 271 (replaced: owner_id)\n"
        );
        assert_eq!(render_changes(&[]), "No changes.\n");
    }

    #[test]
    fn text_state_lists_attributes() {
        let model = ResourceModel::ServerRole(ServerRoleData {
            id: Some("270".into()),
            name: "ops".into(),
            owner_id: None,
        });

        let text = render_state(&model, OutputFormat::Text).unwrap();

        assert_eq!(text, "server_role 270\n  name: ops\n  owner_id: -\n");
    }
}

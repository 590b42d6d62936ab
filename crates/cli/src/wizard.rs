//! Interactive prompts for building a course's mapping table.

use anyhow::Result;
use coursework::{CourseMember, MappingColumns, MappingTable};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{MultiSelect, Password, Select};
use tracing::warn;

/// Students shown before the operator picks fields.
pub const PREVIEW_LIMIT: usize = 5;

/// Renders up to `limit` students with every public field.
pub fn preview(members: &[CourseMember], limit: usize) -> String {
    let mut out = String::new();
    for member in members.iter().filter(|m| !m.is_test_student()).take(limit) {
        out.push_str(&format!("- {}\n", member.field("name")));
        for field in CourseMember::PUBLIC_FIELDS {
            out.push_str(&format!("    {field:<15} {}\n", member.field(field)));
        }
    }
    out
}

/// Asks which profile field holds the VCS identity and which extra fields to
/// keep, then builds the table.
///
/// Returns `None` for a course without students; nothing should be written.
pub fn mapping_table(
    members: &[CourseMember],
    columns: &MappingColumns,
) -> Result<Option<MappingTable>> {
    if members.iter().all(CourseMember::is_test_student) {
        warn!("course has no students; no mapping table written");
        return Ok(None);
    }

    println!("Students in this course (first {PREVIEW_LIMIT}):\n");
    print!("{}", preview(members, PREVIEW_LIMIT));
    println!();

    let theme = ColorfulTheme::default();
    let fields = CourseMember::PUBLIC_FIELDS;
    let default = fields
        .iter()
        .position(|f| *f == CourseMember::LOGIN_FIELD)
        .unwrap_or(0);
    let vcs_index = Select::with_theme(&theme)
        .with_prompt("Which field is the student's version-control account?")
        .items(&fields[..])
        .default(default)
        .interact()?;
    let vcs_field = fields[vcs_index];

    let extras: Vec<&str> = fields.iter().copied().filter(|f| *f != vcs_field).collect();
    let chosen = MultiSelect::with_theme(&theme)
        .with_prompt("Extra fields to keep in the table (space to toggle)")
        .items(&extras[..])
        .interact()?;
    let extra_fields: Vec<String> = chosen.into_iter().map(|i| extras[i].to_string()).collect();

    Ok(Some(MappingTable::from_members(
        members,
        vcs_field,
        &extra_fields,
        columns,
    )))
}

/// Prompts for a Canvas access token without echoing it.
pub fn access_token() -> Result<String> {
    Ok(Password::with_theme(&ColorfulTheme::default())
        .with_prompt("Canvas access token")
        .interact()?)
}

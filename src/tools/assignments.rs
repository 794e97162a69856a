use super::format::{format_date, listing, scalar, strip_html, text_or, truncate};
use super::{Args, ToolContext};
use crate::client::Query;
use crate::error::Result;
use serde_json::Value;

/// Submission state line for an assignment carrying `include[]=submission`.
fn submission_status(assignment: &Value, points: &str, detailed: bool) -> String {
    let submission = match assignment.get("submission") {
        Some(s) if s.is_object() => s,
        _ => return "Not submitted".to_string(),
    };
    let submitted_at = submission.get("submitted_at").and_then(Value::as_str);

    if submission.get("score").is_some_and(|s| !s.is_null()) {
        format!("Graded: {}/{}", scalar(submission, "score", "0"), points)
    } else if submitted_at.is_some() {
        if detailed {
            format!("Submitted on {}", format_date(submitted_at))
        } else {
            "Submitted".to_string()
        }
    } else {
        "Not submitted".to_string()
    }
}

pub(super) async fn list_assignments(ctx: &ToolContext, args: &Args<'_>) -> Result<String> {
    let (course_id, display) = ctx.course(args).await?;

    let assignments = ctx
        .api
        .list(
            &format!("/courses/{}/assignments", course_id),
            &Query::new()
                .with("include[]", "submission")
                .with("order_by", "due_at"),
        )
        .await?;
    if assignments.is_empty() {
        return Ok(format!("No assignments found in {}.", display));
    }

    let entries: Vec<String> = assignments
        .iter()
        .map(|a| {
            let points = scalar(a, "points_possible", "0");
            format!(
                "• {}\n  ID: {} | Due: {} | Points: {}\n  Status: {}",
                text_or(a, "name", "Unnamed"),
                scalar(a, "id", "?"),
                format_date(a.get("due_at").and_then(Value::as_str)),
                points,
                submission_status(a, &points, false)
            )
        })
        .collect();
    Ok(listing(&format!("Assignments in {}", display), &entries))
}

pub(super) async fn get_assignment_details(ctx: &ToolContext, args: &Args<'_>) -> Result<String> {
    let assignment_id = args.id("assignment_id")?;
    let (course_id, display) = ctx.course(args).await?;

    let a = ctx
        .api
        .get(
            &format!("/courses/{}/assignments/{}", course_id, assignment_id),
            &Query::new().with("include[]", "submission"),
        )
        .await?;

    let points = scalar(&a, "points_possible", "0");
    let submission_types = a
        .get("submission_types")
        .and_then(Value::as_array)
        .map(|types| {
            types
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "none".to_string());

    let mut out = format!("Assignment: {}\n", text_or(&a, "name", "Unnamed"));
    out.push_str(&format!("Course: {}\n", display));
    out.push_str(&format!("ID: {}\n", assignment_id));
    out.push_str(&format!(
        "Due: {}\n",
        format_date(a.get("due_at").and_then(Value::as_str))
    ));
    out.push_str(&format!("Points: {}\n", points));
    out.push_str(&format!("Submission Types: {}\n", submission_types));
    out.push_str(&format!(
        "Your Status: {}\n",
        submission_status(&a, &points, true)
    ));
    if super::format::flag(&a, "locked_for_user") {
        out.push_str("Note: This assignment is currently locked.\n");
    }

    let description = strip_html(text_or(&a, "description", ""));
    if !description.is_empty() {
        out.push_str(&format!("\nDescription:\n{}", truncate(&description, 500)));
    }
    Ok(out)
}

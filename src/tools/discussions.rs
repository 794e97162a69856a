use super::format::{flag, format_date, listing, scalar, strip_html, text, text_or, truncate};
use super::{Args, ToolContext};
use crate::client::Query;
use crate::error::Result;
use serde_json::{json, Value};
use tracing::info;

fn date(record: &Value, key: &str) -> String {
    format_date(text(record, key))
}

/// Topic title for headings; a failed lookup only degrades the heading.
async fn topic_title(ctx: &ToolContext, course_id: u64, topic_id: u64) -> String {
    ctx.api
        .get(
            &format!("/courses/{}/discussion_topics/{}", course_id, topic_id),
            &Query::new(),
        )
        .await
        .ok()
        .and_then(|topic| text(&topic, "title").map(str::to_string))
        .unwrap_or_else(|| "Unknown Topic".to_string())
}

pub(super) async fn list_topics(ctx: &ToolContext, args: &Args<'_>) -> Result<String> {
    let include_announcements = args.flag("include_announcements", false)?;
    let (course_id, display) = ctx.course(args).await?;

    let query = if include_announcements {
        Query::new().with("include[]", "announcement")
    } else {
        Query::new()
    };
    let topics = ctx
        .api
        .list(&format!("/courses/{}/discussion_topics", course_id), &query)
        .await?;
    if topics.is_empty() {
        return Ok(format!("No discussion topics found for {}.", display));
    }

    let entries: Vec<String> = topics
        .iter()
        .map(|t| {
            let kind = if flag(t, "is_announcement") {
                "Announcement"
            } else {
                "Discussion"
            };
            format!(
                "• {}\n  ID: {} | Type: {} | Posted: {}",
                text_or(t, "title", "Untitled topic"),
                scalar(t, "id", "?"),
                kind,
                date(t, "posted_at")
            )
        })
        .collect();
    Ok(listing(&format!("Discussion Topics for {}", display), &entries))
}

pub(super) async fn topic_details(ctx: &ToolContext, args: &Args<'_>) -> Result<String> {
    let topic_id = args.id("topic_id")?;
    let (course_id, display) = ctx.course(args).await?;

    let topic = ctx
        .api
        .get(
            &format!("/courses/{}/discussion_topics/{}", course_id, topic_id),
            &Query::new(),
        )
        .await?;

    let kind = if flag(&topic, "is_announcement") {
        "Announcement"
    } else {
        "Discussion"
    };
    let author = topic
        .get("author")
        .and_then(|a| text(a, "display_name"))
        .unwrap_or("Unknown author");

    let mut out = format!("{}: {}\n", kind, text_or(&topic, "title", "Untitled"));
    out.push_str(&format!("Course: {}\n", display));
    out.push_str(&format!("ID: {}\n", topic_id));
    out.push_str(&format!("Author: {}\n", author));
    out.push_str(&format!("Posted: {}\n", date(&topic, "posted_at")));
    out.push_str(&format!(
        "Entries: {}",
        scalar(&topic, "discussion_entries_count", "0")
    ));
    let unread = topic.get("unread_count").and_then(Value::as_u64).unwrap_or(0);
    if unread > 0 {
        out.push_str(&format!(" ({} unread)", unread));
    }
    out.push('\n');
    if flag(&topic, "locked") {
        out.push_str("Status: Locked\n");
    }
    if flag(&topic, "require_initial_post") {
        out.push_str("Note: You must post before seeing other replies\n");
    }

    let message = strip_html(text_or(&topic, "message", ""));
    if !message.is_empty() {
        out.push_str(&format!("\nContent:\n{}", message));
    }
    Ok(out)
}

pub(super) async fn list_entries(ctx: &ToolContext, args: &Args<'_>) -> Result<String> {
    let topic_id = args.id("topic_id")?;
    let full = args.flag("include_full_content", false)?;
    let (course_id, display) = ctx.course(args).await?;

    let entries = ctx
        .api
        .list(
            &format!(
                "/courses/{}/discussion_topics/{}/entries",
                course_id, topic_id
            ),
            &Query::new(),
        )
        .await?;
    if entries.is_empty() {
        return Ok("No posts found in this discussion.".to_string());
    }
    let title = topic_title(ctx, course_id, topic_id).await;

    let rendered: Vec<String> = entries
        .iter()
        .map(|entry| {
            let message = strip_html(text_or(entry, "message", ""));
            let message = if message.is_empty() {
                "[No content]".to_string()
            } else if full {
                message
            } else {
                truncate(&message, 200)
            };
            let replies = entry
                .get("recent_replies")
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            let replies = match (replies, flag(entry, "has_more_replies")) {
                (0, _) => "No replies".to_string(),
                (n, true) => format!("{}+ more replies", n),
                (n, false) => format!("{} replies", n),
            };
            format!(
                "• {} ({})\n  ID: {} | {}\n  {}",
                text_or(entry, "user_name", "Unknown user"),
                date(entry, "created_at"),
                scalar(entry, "id", "?"),
                replies,
                message
            )
        })
        .collect();

    let mut out = listing(&format!("Posts in '{}' ({})", title, display), &rendered);
    if !full {
        out.push_str("\n\nTip: Use include_full_content=true for complete posts");
    }
    Ok(out)
}

pub(super) async fn list_announcements(ctx: &ToolContext, args: &Args<'_>) -> Result<String> {
    let (course_id, display) = ctx.course(args).await?;

    let announcements = ctx
        .api
        .list(
            &format!("/courses/{}/discussion_topics", course_id),
            &Query::new().with("only_announcements", true),
        )
        .await?;
    if announcements.is_empty() {
        return Ok(format!("No announcements found for {}.", display));
    }

    let entries: Vec<String> = announcements
        .iter()
        .map(|a| {
            let preview = strip_html(text_or(a, "message", ""));
            let preview = if preview.is_empty() {
                "[No content]".to_string()
            } else {
                truncate(&preview, 100)
            };
            format!(
                "• {}\n  ID: {} | Posted: {}\n  {}",
                text_or(a, "title", "Untitled"),
                scalar(a, "id", "?"),
                date(a, "posted_at"),
                preview
            )
        })
        .collect();
    Ok(listing(&format!("Announcements for {}", display), &entries))
}

pub(super) async fn post_entry(ctx: &ToolContext, args: &Args<'_>) -> Result<String> {
    let topic_id = args.id("topic_id")?;
    let message = args.string("message")?;
    let (course_id, display) = ctx.course(args).await?;

    let posted = ctx
        .api
        .post(
            &format!(
                "/courses/{}/discussion_topics/{}/entries",
                course_id, topic_id
            ),
            Some(&json!({ "message": message })),
        )
        .await?;
    info!(course_id, topic_id, "Posted discussion entry");
    let title = topic_title(ctx, course_id, topic_id).await;

    Ok(format!(
        "Posted successfully!\n\nDiscussion: {}\nCourse: {}\nPost ID: {}\nPosted: {}\n\nYour post:\n{}",
        title,
        display,
        scalar(&posted, "id", "?"),
        date(&posted, "created_at"),
        truncate(message, 200)
    ))
}

pub(super) async fn reply_to_entry(ctx: &ToolContext, args: &Args<'_>) -> Result<String> {
    let topic_id = args.id("topic_id")?;
    let entry_id = args.id("entry_id")?;
    let message = args.string("message")?;
    let (course_id, display) = ctx.course(args).await?;

    let reply = ctx
        .api
        .post(
            &format!(
                "/courses/{}/discussion_topics/{}/entries/{}/replies",
                course_id, topic_id, entry_id
            ),
            Some(&json!({ "message": message })),
        )
        .await?;
    info!(course_id, topic_id, entry_id, "Posted discussion reply");

    Ok(format!(
        "Reply posted successfully!\n\nCourse: {}\nTopic ID: {}\nOriginal Post ID: {}\nYour Reply ID: {}\n\nYour reply:\n{}",
        display,
        topic_id,
        entry_id,
        scalar(&reply, "id", "?"),
        truncate(message, 200)
    ))
}

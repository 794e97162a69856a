use super::format::{flag, format_date, listing, scalar, strip_html, text, text_or};
use super::{Args, ToolContext};
use crate::client::Query;
use crate::error::{LecternError, Result};
use serde_json::Value;

pub(super) async fn list_pages(ctx: &ToolContext, args: &Args<'_>) -> Result<String> {
    let search_term = args.opt_string("search_term")?;
    let (course_id, display) = ctx.course(args).await?;

    let pages = ctx
        .api
        .list(
            &format!("/courses/{}/pages", course_id),
            &Query::new()
                .with("sort", "title")
                .with("order", "asc")
                .with_opt("search_term", search_term),
        )
        .await?;
    if pages.is_empty() {
        return Ok(format!("No pages found in {}.", display));
    }

    let entries: Vec<String> = pages
        .iter()
        .map(|page| {
            let front = if flag(page, "front_page") {
                " (Front Page)"
            } else {
                ""
            };
            format!(
                "• {}{}\n  URL: {} | Updated: {}",
                text_or(page, "title", "Untitled"),
                front,
                text_or(page, "url", ""),
                format_date(text(page, "updated_at"))
            )
        })
        .collect();
    Ok(listing(&format!("Pages in {}", display), &entries))
}

fn render_page(kind: &str, page: &Value, display: &str) -> String {
    let title = text_or(page, "title", "Untitled");
    let body = strip_html(text_or(page, "body", ""));
    if body.is_empty() {
        return format!("{} '{}' has no content.", kind, title);
    }
    format!(
        "{}: {}\nCourse: {}\nUpdated: {}\n\n{}",
        kind,
        title,
        display,
        format_date(text(page, "updated_at")),
        body
    )
}

pub(super) async fn page_content(ctx: &ToolContext, args: &Args<'_>) -> Result<String> {
    let page_url = args.string("page_url")?;
    if page_url.contains('/') || page_url.contains('?') {
        return Err(LecternError::InvalidInput(format!(
            "get_page_content: '{}' is not a page URL slug",
            page_url
        )));
    }
    let (course_id, display) = ctx.course(args).await?;

    let page = ctx
        .api
        .get(
            &format!("/courses/{}/pages/{}", course_id, page_url),
            &Query::new(),
        )
        .await?;
    Ok(render_page("Page", &page, &display))
}

pub(super) async fn front_page(ctx: &ToolContext, args: &Args<'_>) -> Result<String> {
    let (course_id, display) = ctx.course(args).await?;
    let page = ctx
        .api
        .get(&format!("/courses/{}/front_page", course_id), &Query::new())
        .await?;
    Ok(render_page("Front Page", &page, &display))
}

pub(super) async fn list_modules(ctx: &ToolContext, args: &Args<'_>) -> Result<String> {
    let (course_id, display) = ctx.course(args).await?;

    let modules = ctx
        .api
        .list(&format!("/courses/{}/modules", course_id), &Query::new())
        .await?;
    if modules.is_empty() {
        return Ok(format!("No modules found in {}.", display));
    }

    let entries: Vec<String> = modules
        .iter()
        .map(|m| {
            format!(
                "• {}\n  ID: {} | Items: {} | State: {}",
                text_or(m, "name", "Unnamed"),
                scalar(m, "id", "?"),
                scalar(m, "items_count", "0"),
                text_or(m, "state", "unknown")
            )
        })
        .collect();
    Ok(listing(&format!("Modules in {}", display), &entries))
}

pub(super) async fn list_module_items(ctx: &ToolContext, args: &Args<'_>) -> Result<String> {
    let module_id = args.id("module_id")?;
    let (course_id, display) = ctx.course(args).await?;

    let items = ctx
        .api
        .list(
            &format!("/courses/{}/modules/{}/items", course_id, module_id),
            &Query::new().with("include[]", "content_details"),
        )
        .await?;
    if items.is_empty() {
        return Ok("No items in this module.".to_string());
    }

    let module_name = ctx
        .api
        .get(
            &format!("/courses/{}/modules/{}", course_id, module_id),
            &Query::new(),
        )
        .await
        .ok()
        .and_then(|m| text(&m, "name").map(str::to_string))
        .unwrap_or_else(|| "Unknown Module".to_string());

    let entries: Vec<String> = items
        .iter()
        .map(|item| {
            let mut line = format!(
                "• {}\n  Type: {}",
                text_or(item, "title", "Untitled"),
                text_or(item, "type", "Unknown")
            );
            if let Some(url) = text(item, "html_url").filter(|u| !u.is_empty()) {
                line.push_str(&format!(" | URL: {}", url));
            }
            line
        })
        .collect();
    Ok(listing(
        &format!("Items in '{}' ({})", module_name, display),
        &entries,
    ))
}

pub(super) async fn list_groups(ctx: &ToolContext, args: &Args<'_>) -> Result<String> {
    let (course_id, display) = ctx.course(args).await?;

    let groups = ctx
        .api
        .list(&format!("/courses/{}/groups", course_id), &Query::new())
        .await?;
    if groups.is_empty() {
        return Ok(format!("No groups found in {}.", display));
    }

    let entries: Vec<String> = groups
        .iter()
        .map(|g| {
            format!(
                "• {}\n  ID: {} | Members: {}",
                text_or(g, "name", "Unnamed"),
                scalar(g, "id", "?"),
                scalar(g, "members_count", "0")
            )
        })
        .collect();
    Ok(listing(&format!("Groups in {}", display), &entries))
}

#[cfg(test)]
mod tests {
    use crate::client::mock::MockApi;
    use crate::client::Method;
    use crate::error::LecternError;
    use crate::tools::tests::context;
    use serde_json::json;

    #[tokio::test]
    async fn test_list_pages_passes_search_term() {
        let (api, ctx) = context(MockApi::new().on_list(
            "/courses/101/pages",
            vec![json!({"title": "Syllabus", "url": "syllabus", "front_page": true})],
        ));

        let text = ctx
            .call(
                "list_pages",
                &json!({"course_identifier": "CS_101", "search_term": "syl"}),
            )
            .await
            .unwrap();
        assert!(text.contains("• Syllabus (Front Page)\n  URL: syllabus | Updated: N/A"));
        let call = api.calls().into_iter().last().unwrap();
        assert!(call.query.contains("search_term"));
    }

    #[tokio::test]
    async fn test_page_content_strips_markup() {
        let (_, ctx) = context(
            MockApi::new()
                .on(
                    Method::GET,
                    "/courses/101/pages/syllabus",
                    json!({"title": "Syllabus", "body": "<h1>Grading</h1><p>50% labs</p>"}),
                )
                .on(
                    Method::GET,
                    "/courses/101/front_page",
                    json!({"title": "Home", "body": ""}),
                ),
        );

        let text = ctx
            .call(
                "get_page_content",
                &json!({"course_identifier": "CS_101", "page_url": "syllabus"}),
            )
            .await
            .unwrap();
        assert!(text.starts_with("Page: Syllabus\nCourse: CS_101\n"));
        assert!(text.ends_with("Grading50% labs"));

        let text = ctx
            .call("get_front_page", &json!({"course_identifier": "CS_101"}))
            .await
            .unwrap();
        assert_eq!(text, "Front Page 'Home' has no content.");
    }

    #[tokio::test]
    async fn test_page_url_must_be_a_slug() {
        let (api, ctx) = context(MockApi::new());
        let err = ctx
            .call(
                "get_page_content",
                &json!({"course_identifier": "CS_101", "page_url": "../../users/self"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LecternError::InvalidInput(_)));
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test]
    async fn test_module_items_with_module_name() {
        let (_, ctx) = context(
            MockApi::new()
                .on_list(
                    "/courses/101/modules/9/items",
                    vec![
                        json!({"title": "Intro video", "type": "ExternalUrl", "html_url": "https://x/1"}),
                        json!({"title": "Reading", "type": "Page"}),
                    ],
                )
                .on(
                    Method::GET,
                    "/courses/101/modules/9",
                    json!({"name": "Week 1"}),
                ),
        );

        let text = ctx
            .call(
                "list_module_items",
                &json!({"course_identifier": "CS_101", "module_id": 9}),
            )
            .await
            .unwrap();
        assert!(text.starts_with("Items in 'Week 1' (CS_101):"));
        assert!(text.contains("Type: ExternalUrl | URL: https://x/1"));
        assert!(text.ends_with("• Reading\n  Type: Page"));
    }

    #[tokio::test]
    async fn test_groups_and_modules() {
        let (_, ctx) = context(
            MockApi::new()
                .on_list(
                    "/courses/101/groups",
                    vec![json!({"id": 4, "name": "Team A", "members_count": 3})],
                )
                .on_list("/courses/101/modules", vec![]),
        );

        let text = ctx
            .call("list_groups", &json!({"course_identifier": "CS_101"}))
            .await
            .unwrap();
        assert!(text.contains("• Team A\n  ID: 4 | Members: 3"));

        let text = ctx
            .call("list_modules", &json!({"course_identifier": "CS_101"}))
            .await
            .unwrap();
        assert_eq!(text, "No modules found in CS_101.");
    }
}

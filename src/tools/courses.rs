use super::ToolContext;
use crate::error::Result;

pub(super) async fn list_courses(ctx: &ToolContext) -> Result<String> {
    let courses = ctx.resolver.refresh().await?;
    if courses.is_empty() {
        return Ok("No enrolled courses found.".to_string());
    }

    let entries: Vec<String> = courses
        .iter()
        .map(|course| {
            let code = course.course_code.as_deref().unwrap_or("(no code)");
            let name = course.name.as_deref().unwrap_or("Unnamed");
            format!("• {}: {}\n  ID: {}", code, name, course.id)
        })
        .collect();
    Ok(super::format::listing("Your courses", &entries))
}

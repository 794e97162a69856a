//! Courses command - list enrolled courses.

use crate::cli::Output;
use crate::config::Settings;
use crate::resolver::Course;
use crate::tools::ToolContext;
use anyhow::Result;

pub async fn run_courses(settings: &Settings) -> Result<()> {
    let context = ToolContext::from_settings(settings)?;
    let courses = context.resolver.refresh().await?;

    if courses.is_empty() {
        Output::info("No enrolled courses found.");
        return Ok(());
    }

    Output::header(&format!("Courses ({})", courses.len()));
    for course in &courses {
        let (label, name) = columns(course);
        Output::course(&label, name, course.id);
    }
    Ok(())
}

/// Label and name columns; courses without a code show their name as the label.
fn columns(course: &Course) -> (String, &str) {
    let name = match (&course.course_code, &course.name) {
        (Some(_), Some(name)) => name.as_str(),
        _ => "",
    };
    (course.label(), name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns() {
        let course = Course {
            id: 101,
            course_code: Some("CS_101".to_string()),
            name: Some("Intro to CS".to_string()),
        };
        assert_eq!(columns(&course), ("CS_101".to_string(), "Intro to CS"));

        let course = Course { id: 303, course_code: None, name: Some("Seminar".to_string()) };
        assert_eq!(columns(&course), ("Seminar".to_string(), ""));

        let course = Course { id: 404, course_code: None, name: None };
        assert_eq!(columns(&course), ("404".to_string(), ""));
    }
}

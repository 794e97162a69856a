//! MCP tool catalog.

use super::protocol::Tool;
use serde_json::{json, Map, Value};

fn course() -> (&'static str, Value) {
    (
        "course_identifier",
        json!({
            "type": ["string", "integer"],
            "description": "Course code (e.g. CS_101_Fall2026) or numeric Canvas course ID"
        }),
    )
}

fn id(name: &'static str, description: &str) -> (&'static str, Value) {
    (
        name,
        json!({"type": ["integer", "string"], "description": description}),
    )
}

fn string(name: &'static str, description: &str) -> (&'static str, Value) {
    (name, json!({"type": "string", "description": description}))
}

fn boolean(name: &'static str, description: &str, default: bool) -> (&'static str, Value) {
    (
        name,
        json!({"type": "boolean", "description": description, "default": default}),
    )
}

fn sort_and_order() -> [(&'static str, Value); 2] {
    [
        (
            "sort",
            json!({
                "type": "string",
                "enum": ["name", "size", "created_at", "updated_at", "content_type"],
                "default": "name"
            }),
        ),
        (
            "order",
            json!({"type": "string", "enum": ["asc", "desc"], "default": "asc"}),
        ),
    ]
}

fn tool(
    name: &str,
    description: &str,
    properties: impl IntoIterator<Item = (&'static str, Value)>,
    required: &[&str],
) -> Tool {
    let properties: Map<String, Value> = properties
        .into_iter()
        .map(|(key, schema)| (key.to_string(), schema))
        .collect();
    Tool {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: json!({
            "type": "object",
            "properties": properties,
            "required": required,
        }),
    }
}

/// Every tool the server advertises, in catalog order.
pub fn get_tools() -> Vec<Tool> {
    const COURSE: &[&str] = &["course_identifier"];

    vec![
        tool(
            "list_courses",
            "List the courses you are enrolled in, with their course codes and IDs.",
            Vec::<(&'static str, Value)>::new(),
            &[],
        ),
        tool(
            "list_assignments",
            "List assignments in a course with due dates, points and your submission status.",
            [course()],
            COURSE,
        ),
        tool(
            "get_assignment_details",
            "Get details about a specific assignment, including its description and your status.",
            [course(), id("assignment_id", "The assignment ID")],
            &["course_identifier", "assignment_id"],
        ),
        tool(
            "list_discussion_topics",
            "List discussion topics for a course.",
            [
                course(),
                boolean(
                    "include_announcements",
                    "Include announcements in the list",
                    false,
                ),
            ],
            COURSE,
        ),
        tool(
            "get_discussion_topic_details",
            "Get details about a specific discussion topic.",
            [course(), id("topic_id", "The discussion topic ID")],
            &["course_identifier", "topic_id"],
        ),
        tool(
            "list_discussion_entries",
            "List posts in a discussion topic.",
            [
                course(),
                id("topic_id", "The discussion topic ID"),
                boolean(
                    "include_full_content",
                    "Show full post content instead of a preview",
                    false,
                ),
            ],
            &["course_identifier", "topic_id"],
        ),
        tool(
            "list_announcements",
            "List announcements for a course.",
            [course()],
            COURSE,
        ),
        tool(
            "post_discussion_entry",
            "Post a new entry to a discussion topic.",
            [
                course(),
                id("topic_id", "The discussion topic ID"),
                string("message", "Your post content"),
            ],
            &["course_identifier", "topic_id", "message"],
        ),
        tool(
            "reply_to_discussion_entry",
            "Reply to a discussion post.",
            [
                course(),
                id("topic_id", "The discussion topic ID"),
                id("entry_id", "The post ID to reply to"),
                string("message", "Your reply content"),
            ],
            &["course_identifier", "topic_id", "entry_id", "message"],
        ),
        tool(
            "list_pages",
            "List pages in a course.",
            [course(), string("search_term", "Optional filter on page titles")],
            COURSE,
        ),
        tool(
            "get_page_content",
            "Get the content of a specific page.",
            [course(), string("page_url", "The page URL slug (from list_pages)")],
            &["course_identifier", "page_url"],
        ),
        tool(
            "get_front_page",
            "Get the course front page content.",
            [course()],
            COURSE,
        ),
        tool(
            "list_modules",
            "List modules in a course.",
            [course()],
            COURSE,
        ),
        tool(
            "list_module_items",
            "List items in a specific module.",
            [course(), id("module_id", "The module ID (from list_modules)")],
            &["course_identifier", "module_id"],
        ),
        tool(
            "list_groups",
            "List groups in a course.",
            [course()],
            COURSE,
        ),
        tool(
            "list_course_files",
            "List files in a course.",
            [
                course(),
                string("search_term", "Optional filter on file names"),
                string(
                    "content_types",
                    "Optional comma-separated MIME types, e.g. application/pdf,image/png",
                ),
            ]
            .into_iter()
            .chain(sort_and_order()),
            COURSE,
        ),
        tool(
            "list_course_folders",
            "List folders in a course to understand file organization.",
            [course()],
            COURSE,
        ),
        tool(
            "list_folder_files",
            "List files in a specific folder.",
            [id("folder_id", "The folder ID")]
                .into_iter()
                .chain(sort_and_order()),
            &["folder_id"],
        ),
        tool(
            "get_file_download_url",
            "Get the time-limited download URL for a file.",
            [id("file_id", "The file ID")],
            &["file_id"],
        ),
        tool(
            "download_file",
            "Download a file to the local machine. Downloads run one at a time; \
             avoid calling this in rapid succession.",
            [
                id("file_id", "The file ID"),
                string(
                    "destination_folder",
                    "Local folder to save into (defaults to the configured download folder)",
                ),
            ],
            &["file_id"],
        ),
        tool(
            "list_quizzes",
            "List quizzes in a course. Quizzes marked [API start OK] can be started here.",
            [course()],
            COURSE,
        ),
        tool(
            "get_quiz_details",
            "Get timing, attempt and question settings for a quiz.",
            [course(), id("quiz_id", "The quiz ID")],
            &["course_identifier", "quiz_id"],
        ),
        tool(
            "get_my_quiz_submissions",
            "Get your attempts at a quiz with scores. Shows the validation token of an attempt in progress.",
            [course(), id("quiz_id", "The quiz ID")],
            &["course_identifier", "quiz_id"],
        ),
        tool(
            "start_quiz",
            "Start a quiz attempt. Only allowed when the quiz has no time limit or unlimited \
             attempts. Returns the submission ID, attempt number and validation token needed \
             for answering. There is no finish tool: the quiz is submitted in Canvas or when time expires.",
            [course(), id("quiz_id", "The quiz ID")],
            &["course_identifier", "quiz_id"],
        ),
        tool(
            "get_quiz_questions",
            "Get the questions of an active quiz attempt with their answer options.",
            [id("quiz_submission_id", "The submission ID from start_quiz")],
            &["quiz_submission_id"],
        ),
        tool(
            "answer_quiz_question",
            "Submit an answer to one question of an active attempt.",
            [
                id("quiz_submission_id", "The submission ID from start_quiz"),
                (
                    "attempt",
                    json!({"type": "integer", "description": "Attempt number from start_quiz"}),
                ),
                string("validation_token", "Validation token from start_quiz"),
                id("question_id", "The question ID"),
                (
                    "answer",
                    json!({
                        "description": "Answer shaped by question type: an answer ID (multiple choice, \
                            true/false), text (essay, short answer), a number (numerical), a list of \
                            answer IDs (multiple answers), a list of {answer_id, match_id} (matching), \
                            or an object keyed by blank ID (multiple blanks, dropdowns)"
                    }),
                ),
            ],
            &[
                "quiz_submission_id",
                "attempt",
                "validation_token",
                "question_id",
                "answer",
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::TOOL_NAMES;

    #[test]
    fn test_catalog_matches_dispatch() {
        let names: Vec<String> = get_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, TOOL_NAMES.iter().map(|n| n.to_string()).collect::<Vec<_>>());
    }

    #[test]
    fn test_required_fields_are_declared() {
        for tool in get_tools() {
            let properties = tool.input_schema["properties"].as_object().unwrap();
            for required in tool.input_schema["required"].as_array().unwrap() {
                let key = required.as_str().unwrap();
                assert!(
                    properties.contains_key(key),
                    "{} requires undeclared '{}'",
                    tool.name,
                    key
                );
            }
        }
    }
}

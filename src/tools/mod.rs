//! Canvas tools exposed to agents.
//!
//! Each tool validates its arguments, resolves the course identifier,
//! calls Canvas through [`LmsApi`] and renders a plain-text answer.

mod args;
mod assignments;
mod courses;
mod discussions;
mod files;
pub mod format;
mod pages;
mod quizzes;

pub use args::Args;

use crate::client::{LmsApi, LmsClient};
use crate::config::Settings;
use crate::error::{LecternError, Result};
use crate::quiz::QuizSessionManager;
use crate::resolver::CourseResolver;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Names of every tool [`ToolContext::call`] dispatches.
pub const TOOL_NAMES: &[&str] = &[
    "list_courses",
    "list_assignments",
    "get_assignment_details",
    "list_discussion_topics",
    "get_discussion_topic_details",
    "list_discussion_entries",
    "list_announcements",
    "post_discussion_entry",
    "reply_to_discussion_entry",
    "list_pages",
    "get_page_content",
    "get_front_page",
    "list_modules",
    "list_module_items",
    "list_groups",
    "list_course_files",
    "list_course_folders",
    "list_folder_files",
    "get_file_download_url",
    "download_file",
    "list_quizzes",
    "get_quiz_details",
    "get_my_quiz_submissions",
    "start_quiz",
    "get_quiz_questions",
    "answer_quiz_question",
];

/// Shared state for tool execution.
pub struct ToolContext {
    pub api: Arc<dyn LmsApi>,
    pub resolver: CourseResolver,
    pub quizzes: QuizSessionManager,
    /// Held for the whole of a file download; one at a time.
    downloads: Mutex<()>,
    download_dir: PathBuf,
}

impl ToolContext {
    pub fn new(api: Arc<dyn LmsApi>, download_dir: PathBuf) -> Self {
        Self {
            resolver: CourseResolver::new(Arc::clone(&api)),
            quizzes: QuizSessionManager::new(Arc::clone(&api)),
            api,
            downloads: Mutex::new(()),
            download_dir,
        }
    }

    /// Build the production context: one client, one resolver, one quiz manager.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = LmsClient::from_settings(settings)?;
        Ok(Self::new(Arc::new(client), settings.download_dir()))
    }

    /// Run the named tool with JSON arguments.
    #[instrument(skip(self, arguments))]
    pub async fn call(&self, name: &str, arguments: &Value) -> Result<String> {
        let args = Args::new(name, arguments)?;
        debug!("Dispatching tool");
        match name {
            "list_courses" => courses::list_courses(self).await,

            "list_assignments" => assignments::list_assignments(self, &args).await,
            "get_assignment_details" => assignments::get_assignment_details(self, &args).await,

            "list_discussion_topics" => discussions::list_topics(self, &args).await,
            "get_discussion_topic_details" => discussions::topic_details(self, &args).await,
            "list_discussion_entries" => discussions::list_entries(self, &args).await,
            "list_announcements" => discussions::list_announcements(self, &args).await,
            "post_discussion_entry" => discussions::post_entry(self, &args).await,
            "reply_to_discussion_entry" => discussions::reply_to_entry(self, &args).await,

            "list_pages" => pages::list_pages(self, &args).await,
            "get_page_content" => pages::page_content(self, &args).await,
            "get_front_page" => pages::front_page(self, &args).await,
            "list_modules" => pages::list_modules(self, &args).await,
            "list_module_items" => pages::list_module_items(self, &args).await,
            "list_groups" => pages::list_groups(self, &args).await,

            "list_course_files" => files::list_course_files(self, &args).await,
            "list_course_folders" => files::list_course_folders(self, &args).await,
            "list_folder_files" => files::list_folder_files(self, &args).await,
            "get_file_download_url" => files::download_url(self, &args).await,
            "download_file" => files::download_file(self, &args).await,

            "list_quizzes" => quizzes::list_quizzes(self, &args).await,
            "get_quiz_details" => quizzes::quiz_details(self, &args).await,
            "get_my_quiz_submissions" => quizzes::my_submissions(self, &args).await,
            "start_quiz" => quizzes::start_quiz(self, &args).await,
            "get_quiz_questions" => quizzes::quiz_questions(self, &args).await,
            "answer_quiz_question" => quizzes::answer_question(self, &args).await,

            other => Err(LecternError::InvalidInput(format!("unknown tool '{}'", other))),
        }
    }

    /// Resolve `course_identifier` and pick the label used in headings.
    async fn course(&self, args: &Args<'_>) -> Result<(u64, String)> {
        let identifier = args.course()?;
        let id = self.resolver.resolve(&identifier).await?;
        Ok((id, self.resolver.display(id, &identifier)))
    }
}

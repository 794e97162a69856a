use super::format::{format_date, format_number, listing, strip_html_inline, truncate};
use super::{Args, ToolContext};
use crate::client::Query;
use crate::error::{LecternError, Result};
use crate::quiz::{eligibility, AnswerValue, QuizDetails, QuizQuestion};
use std::collections::BTreeMap;

fn time_limit(quiz: &QuizDetails, unit: &str, none: &str) -> String {
    match quiz.time_limit {
        Some(minutes) => format!("{} {}", minutes, unit),
        None => none.to_string(),
    }
}

fn points(value: Option<f64>) -> String {
    format_number(value.unwrap_or(0.0))
}

pub(super) async fn list_quizzes(ctx: &ToolContext, args: &Args<'_>) -> Result<String> {
    let (course_id, display) = ctx.course(args).await?;

    let records = ctx
        .api
        .list(&format!("/courses/{}/quizzes", course_id), &Query::new())
        .await?;
    if records.is_empty() {
        return Ok("No quizzes found in this course.".to_string());
    }
    let quizzes = records
        .into_iter()
        .map(serde_json::from_value::<QuizDetails>)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| LecternError::InvalidResponse(format!("malformed quiz listing: {}", e)))?;

    let entries: Vec<String> = quizzes
        .iter()
        .map(|quiz| {
            let startable = if eligibility(quiz).is_eligible() {
                " [API start OK]"
            } else {
                ""
            };
            format!(
                "• {}{}\n  ID: {} | Due: {}\n  Questions: {} | Points: {}\n  Time: {} | Attempts: {}",
                quiz.display_title(),
                startable,
                quiz.id,
                format_date(quiz.due_at.as_deref()),
                quiz.question_count.unwrap_or(0),
                points(quiz.points_possible),
                time_limit(quiz, "min", "No limit"),
                quiz.attempt_limit()
            )
        })
        .collect();
    Ok(listing(&format!("Quizzes in {}", display), &entries))
}

pub(super) async fn quiz_details(ctx: &ToolContext, args: &Args<'_>) -> Result<String> {
    let quiz_id = args.id("quiz_id")?;
    let (course_id, display) = ctx.course(args).await?;
    let quiz = ctx.quizzes.details(course_id, quiz_id).await?;

    let mut out = format!("Quiz: {}\n", quiz.display_title());
    out.push_str(&format!("Course: {}\n", display));
    out.push_str(&format!("ID: {}\n", quiz.id));
    out.push_str("\nTiming:\n");
    out.push_str(&format!("  Due: {}\n", format_date(quiz.due_at.as_deref())));
    out.push_str(&format!(
        "  Available: {} - {}\n",
        format_date(quiz.unlock_at.as_deref()),
        format_date(quiz.lock_at.as_deref())
    ));
    out.push_str(&format!(
        "  Time Limit: {}\n",
        time_limit(&quiz, "minutes", "No time limit")
    ));
    out.push_str("\nAttempts:\n");
    out.push_str(&format!("  Allowed: {}\n", quiz.attempt_limit()));
    out.push_str(&format!(
        "  Scoring: {}\n",
        quiz.scoring_policy.as_deref().unwrap_or("keep_highest")
    ));
    out.push_str("\nQuestions:\n");
    out.push_str(&format!("  Count: {}\n", quiz.question_count.unwrap_or(0)));
    out.push_str(&format!("  Points: {}\n", points(quiz.points_possible)));
    out.push_str(&format!("  Shuffle Answers: {}\n", quiz.shuffle_answers));
    out.push_str(&format!("  One at a Time: {}\n", quiz.one_question_at_a_time));
    out.push_str(&format!("  Can Go Back: {}\n", !quiz.cant_go_back));
    if quiz.access_code.as_deref().is_some_and(|c| !c.is_empty()) {
        out.push_str("\nAccess Code Required: Yes\n");
    }
    if let Some(filter) = quiz.ip_filter.as_deref().filter(|f| !f.is_empty()) {
        out.push_str(&format!("IP Restriction: {}\n", filter));
    }
    out.push_str(&format!(
        "\nAPI Start Allowed: {}\n",
        if eligibility(&quiz).is_eligible() {
            "Yes"
        } else {
            "No (timed + limited attempts)"
        }
    ));

    let description = strip_html_inline(quiz.description.as_deref().unwrap_or(""));
    if !description.is_empty() {
        out.push_str(&format!("\nDescription:\n{}", truncate(&description, 500)));
    }
    Ok(out)
}

pub(super) async fn my_submissions(ctx: &ToolContext, args: &Args<'_>) -> Result<String> {
    let quiz_id = args.id("quiz_id")?;
    let (course_id, display) = ctx.course(args).await?;
    let submissions = ctx.quizzes.submissions(course_id, quiz_id).await?;
    if submissions.is_empty() {
        return Ok("No quiz attempts found.".to_string());
    }

    let rendered: Vec<String> = submissions
        .iter()
        .map(|sub| {
            let time_spent = match sub.time_spent {
                Some(secs) if secs > 0 => format!("{}m {}s", secs / 60, secs % 60),
                _ => "N/A".to_string(),
            };
            let mut info = format!("Attempt {}:\n", sub.attempt.unwrap_or(1));
            info.push_str(&format!("  Submission ID: {}\n", sub.id));
            info.push_str(&format!(
                "  Status: {}\n",
                sub.workflow_state.as_deref().unwrap_or("unknown")
            ));
            info.push_str(&format!("  Started: {}\n", format_date(sub.started_at.as_deref())));
            info.push_str(&format!("  Finished: {}\n", format_date(sub.finished_at.as_deref())));
            info.push_str(&format!("  Time Spent: {}\n", time_spent));
            if let Some(score) = sub.score {
                info.push_str(&format!("  Score: {}\n", format_number(score)));
            }
            if let Some(kept) = sub.kept_score {
                info.push_str(&format!("  Kept Score: {}\n", format_number(kept)));
            }
            if let Some(token) = &sub.validation_token {
                info.push_str(&format!("  Validation Token: {}\n", token));
            }
            info
        })
        .collect();
    Ok(format!(
        "Your Quiz Submissions ({}):\n\n{}",
        display,
        rendered.join("\n")
    ))
}

pub(super) async fn start_quiz(ctx: &ToolContext, args: &Args<'_>) -> Result<String> {
    let quiz_id = args.id("quiz_id")?;
    let (course_id, _) = ctx.course(args).await?;

    let quiz = ctx.quizzes.details(course_id, quiz_id).await?;
    let attempt = ctx.quizzes.start(course_id, &quiz).await?;

    let mut out = format!("Quiz Started: {}\n\n", quiz.display_title());
    out.push_str("IMPORTANT - Save these values for answering questions:\n");
    out.push_str(&format!("  Submission ID: {}\n", attempt.submission_id));
    out.push_str(&format!("  Attempt: {}\n", attempt.attempt_number));
    out.push_str(&format!("  Validation Token: {}\n", attempt.validation_token));
    out.push_str("\nTiming:\n");
    out.push_str(&format!(
        "  Started: {}\n",
        format_date(attempt.started_at.as_deref())
    ));
    if let Some(end_at) = attempt.end_at.as_deref() {
        out.push_str(&format!("  Must Complete By: {}\n", format_date(Some(end_at))));
    }
    out.push_str(&format!(
        "\nNext: Use get_quiz_questions({}) to see the questions.",
        attempt.submission_id
    ));
    Ok(out)
}

fn render_question(q: &QuizQuestion) -> String {
    let mut info = format!(
        "Question {}: {}\n",
        q.id,
        q.question_name.as_deref().unwrap_or("")
    );
    info.push_str(&format!("  Type: {}\n", q.question_type));
    info.push_str(&format!("  Points: {}\n", points(q.points_possible)));
    if q.flagged {
        info.push_str("  [FLAGGED]\n");
    }
    info.push_str(&format!(
        "  Text: {}\n",
        strip_html_inline(q.question_text.as_deref().unwrap_or(""))
    ));

    let option_id = |id: Option<u64>| id.map_or_else(|| "?".to_string(), |id| id.to_string());
    match q.question_type.as_str() {
        "multiple_choice_question" | "true_false_question" | "multiple_answers_question"
            if !q.answers.is_empty() =>
        {
            info.push_str("  Options:\n");
            for answer in &q.answers {
                let label = answer.text.as_deref().or(answer.html.as_deref()).unwrap_or("");
                info.push_str(&format!(
                    "    [{}] {}\n",
                    option_id(answer.id),
                    strip_html_inline(label)
                ));
            }
        }
        "matching_question" => {
            info.push_str("  Left side (answer_id):\n");
            for answer in &q.answers {
                let label = answer.text.as_deref().or(answer.left.as_deref()).unwrap_or("");
                info.push_str(&format!(
                    "    [{}] {}\n",
                    option_id(answer.id),
                    strip_html_inline(label)
                ));
            }
            if !q.matches.is_empty() {
                info.push_str("  Right side (match_id):\n");
                for m in &q.matches {
                    info.push_str(&format!(
                        "    [{}] {}\n",
                        option_id(m.match_id),
                        strip_html_inline(m.text.as_deref().unwrap_or(""))
                    ));
                }
            }
        }
        "fill_in_multiple_blanks_question" => {
            let mut blanks: Vec<&str> = Vec::new();
            for blank in q.answers.iter().filter_map(|a| a.blank_id.as_deref()) {
                if !blanks.contains(&blank) {
                    blanks.push(blank);
                }
            }
            info.push_str(&format!("  Blanks to fill: {}\n", blanks.join(", ")));
        }
        "multiple_dropdowns_question" => {
            let mut dropdowns: BTreeMap<&str, Vec<String>> = BTreeMap::new();
            for answer in &q.answers {
                dropdowns
                    .entry(answer.blank_id.as_deref().unwrap_or("default"))
                    .or_default()
                    .push(format!(
                        "[{}] {}",
                        option_id(answer.id),
                        strip_html_inline(answer.text.as_deref().unwrap_or(""))
                    ));
            }
            info.push_str("  Dropdowns:\n");
            for (blank, options) in dropdowns {
                info.push_str(&format!("    {}:\n", blank));
                for option in options {
                    info.push_str(&format!("      {}\n", option));
                }
            }
        }
        _ => {}
    }
    info
}

pub(super) async fn quiz_questions(ctx: &ToolContext, args: &Args<'_>) -> Result<String> {
    let submission_id = args.id("quiz_submission_id")?;
    let questions = ctx.quizzes.questions(submission_id).await?;
    if questions.is_empty() {
        return Ok("No questions found for this submission.".to_string());
    }

    let header = format!(
        "Quiz Questions (Submission {}):\nTotal: {} questions\n{}\n\n",
        submission_id,
        questions.len(),
        "=".repeat(50)
    );
    let body: Vec<String> = questions.iter().map(render_question).collect();
    Ok(header + &body.join("\n"))
}

pub(super) async fn answer_question(ctx: &ToolContext, args: &Args<'_>) -> Result<String> {
    let submission_id = args.id("quiz_submission_id")?;
    let attempt = args.count("attempt")?;
    let token = args.string("validation_token")?;
    let question_id = args.id("question_id")?;
    let answer = AnswerValue::from_json(args.raw("answer")?)?;

    let ack = ctx
        .quizzes
        .answer(submission_id, attempt, token, question_id, &answer)
        .await?;

    if ack.recorded {
        Ok(format!(
            "Answer submitted for question {}.\nYour answer has been recorded.\nNote: Quiz will auto-submit when time expires or you submit in Canvas.",
            question_id
        ))
    } else {
        Ok(format!("Answer submitted for question {}.", question_id))
    }
}

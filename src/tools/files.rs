use super::format::{format_date, format_file_size, listing, scalar, text, text_or};
use super::{Args, ToolContext};
use crate::client::Query;
use crate::config::Settings;
use crate::error::{LecternError, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

const SORT_KEYS: &[&str] = &["name", "size", "created_at", "updated_at", "content_type"];
const ORDERS: &[&str] = &["asc", "desc"];

fn display_name(file: &Value) -> &str {
    text(file, "display_name")
        .or_else(|| text(file, "filename"))
        .unwrap_or("Unknown")
}

fn size(file: &Value) -> String {
    format_file_size(file.get("size").and_then(Value::as_u64).unwrap_or(0))
}

fn render_file(file: &Value, with_folder: bool) -> String {
    let mut line = format!(
        "• {}\n  ID: {} | Size: {} | Type: {}\n  Updated: {}",
        display_name(file),
        scalar(file, "id", "?"),
        size(file),
        text_or(file, "content-type", "unknown"),
        format_date(text(file, "updated_at"))
    );
    if with_folder {
        line.push_str(&format!(" | Folder ID: {}", scalar(file, "folder_id", "root")));
    }
    line
}

pub(super) async fn list_course_files(ctx: &ToolContext, args: &Args<'_>) -> Result<String> {
    let search_term = args.opt_string("search_term")?;
    let content_types = args.opt_string("content_types")?;
    let sort = args.choice("sort", SORT_KEYS)?;
    let order = args.choice("order", ORDERS)?;
    let (course_id, display) = ctx.course(args).await?;

    let mut query = Query::new()
        .with("sort", sort)
        .with("order", order)
        .with_opt("search_term", search_term);
    for content_type in content_types
        .into_iter()
        .flat_map(|types| types.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        query = query.with("content_types[]", content_type);
    }

    let files = ctx
        .api
        .list(&format!("/courses/{}/files", course_id), &query)
        .await?;
    if files.is_empty() {
        return Ok("No files found in this course.".to_string());
    }

    let entries: Vec<String> = files.iter().map(|f| render_file(f, true)).collect();
    Ok(listing(
        &format!("Files in {} ({} files)", display, files.len()),
        &entries,
    ))
}

pub(super) async fn list_course_folders(ctx: &ToolContext, args: &Args<'_>) -> Result<String> {
    let (course_id, display) = ctx.course(args).await?;

    let mut folders = ctx
        .api
        .list(&format!("/courses/{}/folders", course_id), &Query::new())
        .await?;
    if folders.is_empty() {
        return Ok("No folders found in this course.".to_string());
    }
    folders.sort_by(|a, b| text_or(a, "full_name", "").cmp(text_or(b, "full_name", "")));

    let entries: Vec<String> = folders
        .iter()
        .map(|folder| {
            let name = text_or(folder, "name", "Unknown");
            format!(
                "• {}\n  ID: {} | Files: {} | Subfolders: {}",
                text_or(folder, "full_name", name),
                scalar(folder, "id", "?"),
                scalar(folder, "files_count", "0"),
                scalar(folder, "folders_count", "0")
            )
        })
        .collect();
    Ok(listing(
        &format!("Folders in {} ({} folders)", display, folders.len()),
        &entries,
    ))
}

pub(super) async fn list_folder_files(ctx: &ToolContext, args: &Args<'_>) -> Result<String> {
    let folder_id = args.id("folder_id")?;
    let sort = args.choice("sort", SORT_KEYS)?;
    let order = args.choice("order", ORDERS)?;

    let files = ctx
        .api
        .list(
            &format!("/folders/{}/files", folder_id),
            &Query::new().with("sort", sort).with("order", order),
        )
        .await?;
    if files.is_empty() {
        return Ok("No files found in this folder.".to_string());
    }

    let folder_name = ctx
        .api
        .get(&format!("/folders/{}", folder_id), &Query::new())
        .await
        .ok()
        .and_then(|f| text(&f, "full_name").map(str::to_string))
        .unwrap_or_else(|| format!("Folder {}", folder_id));

    let entries: Vec<String> = files.iter().map(|f| render_file(f, false)).collect();
    Ok(listing(
        &format!("Files in {} ({} files)", folder_name, files.len()),
        &entries,
    ))
}

async fn file_metadata(ctx: &ToolContext, file_id: u64) -> Result<(Value, String)> {
    let file = ctx
        .api
        .get(&format!("/files/{}", file_id), &Query::new())
        .await?;
    let url = text(&file, "url")
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            LecternError::NotFound(format!(
                "no download URL available for file '{}'",
                display_name(&file)
            ))
        })?;
    Ok((file, url))
}

pub(super) async fn download_url(ctx: &ToolContext, args: &Args<'_>) -> Result<String> {
    let file_id = args.id("file_id")?;
    let (file, url) = file_metadata(ctx, file_id).await?;

    Ok(format!(
        "File: {}\nSize: {}\nType: {}\nDownload URL: {}\n\nNote: This URL is time-limited. Use it promptly.",
        display_name(&file),
        size(&file),
        text_or(&file, "content-type", "unknown"),
        url
    ))
}

pub(super) async fn download_file(ctx: &ToolContext, args: &Args<'_>) -> Result<String> {
    let file_id = args.id("file_id")?;
    let destination = match args.opt_string("destination_folder")? {
        Some(folder) => Settings::expand_path(folder),
        None => ctx.download_dir.clone(),
    };

    let _slot = match ctx.downloads.try_lock() {
        Ok(guard) => guard,
        Err(_) => {
            info!(file_id, "Waiting for the previous download to finish");
            ctx.downloads.lock().await
        }
    };

    let (file, url) = file_metadata(ctx, file_id).await?;
    let name = local_file_name(&file, file_id);
    let bytes = ctx.api.fetch_file(&url).await?;

    tokio::fs::create_dir_all(&destination).await?;
    let path = unique_path(&destination, &name);
    tokio::fs::write(&path, &bytes).await?;
    info!(file_id, path = %path.display(), bytes = bytes.len(), "Downloaded file");

    Ok(format!(
        "✓ Downloaded successfully!\nFile: {}\nSize: {}\nSaved to: {}",
        name,
        format_file_size(bytes.len() as u64),
        path.display()
    ))
}

/// Final path component of the Canvas name, so a crafted name cannot escape
/// the destination folder.
fn local_file_name(file: &Value, file_id: u64) -> String {
    text(file, "display_name")
        .or_else(|| text(file, "filename"))
        .and_then(|raw| Path::new(raw).file_name())
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("file_{}", file_id))
}

/// `dir/name`, or `dir/stem_N.ext` for the first free `N`.
fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let as_path = Path::new(name);
    let stem = as_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    let extension = as_path.extension().and_then(|e| e.to_str());

    let mut counter = 1u32;
    loop {
        let numbered = match extension {
            Some(ext) => format!("{}_{}.{}", stem, counter, ext),
            None => format!("{}_{}", stem, counter),
        };
        let candidate = dir.join(numbered);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockApi;
    use crate::client::Method;
    use crate::tools::tests::context;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;

    const URL: &str = "https://files.example/notes.pdf?verifier=abc";

    fn file_api() -> MockApi {
        MockApi::new()
            .on(
                Method::GET,
                "/files/42",
                json!({"id": 42, "display_name": "notes.pdf", "size": 2048,
                       "content-type": "application/pdf", "url": URL}),
            )
            .on_file(URL, b"%PDF-1.7")
    }

    #[tokio::test]
    async fn test_download_dedupes_names() {
        let dir = tempdir().unwrap();
        let (_, ctx) = context(file_api());
        let args = json!({"file_id": 42, "destination_folder": dir.path().to_str().unwrap()});

        let first = ctx.call("download_file", &args).await.unwrap();
        let second = ctx.call("download_file", &args).await.unwrap();

        assert!(first.contains("Size: 8 B"));
        assert!(first.ends_with(&dir.path().join("notes.pdf").display().to_string()));
        assert!(second.ends_with(&dir.path().join("notes_1.pdf").display().to_string()));
        assert_eq!(
            std::fs::read(dir.path().join("notes_1.pdf")).unwrap(),
            b"%PDF-1.7"
        );
    }

    #[tokio::test]
    async fn test_downloads_run_one_at_a_time() {
        let dir = tempdir().unwrap();
        let (_, ctx) = context(file_api().with_latency(Duration::from_millis(25)));
        let ctx = Arc::new(ctx);
        let args = json!({"file_id": 42, "destination_folder": dir.path().to_str().unwrap()});

        let started = tokio::time::Instant::now();
        let tasks = (0..3).map(|_| {
            let ctx = Arc::clone(&ctx);
            let args = args.clone();
            tokio::spawn(async move { ctx.call("download_file", &args).await })
        });
        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }

        // Two calls of 25ms per download, never overlapping.
        assert!(started.elapsed() >= Duration::from_millis(150));
        for name in ["notes.pdf", "notes_1.pdf", "notes_2.pdf"] {
            assert!(dir.path().join(name).exists(), "{} missing", name);
        }
    }

    #[tokio::test]
    async fn test_download_url_and_missing_url() {
        let (_, ctx) = context(file_api().on(Method::GET, "/files/7", json!({"display_name": "x"})));

        let text = ctx.call("get_file_download_url", &json!({"file_id": "42"})).await.unwrap();
        assert!(text.contains("File: notes.pdf\nSize: 2.0 KB\nType: application/pdf\n"));
        assert!(text.contains(URL));

        let err = ctx.call("get_file_download_url", &json!({"file_id": 7})).await.unwrap_err();
        assert!(matches!(err, LecternError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_course_files_query() {
        let (api, ctx) = context(MockApi::new().on_list(
            "/courses/101/files",
            vec![json!({"id": 1, "display_name": "a.png", "size": 10, "folder_id": 3})],
        ));

        let text = ctx
            .call(
                "list_course_files",
                &json!({"course_identifier": "CS_101", "content_types": "image/png, application/pdf", "order": "desc"}),
            )
            .await
            .unwrap();
        assert!(text.starts_with("Files in CS_101 (1 files):"));
        assert!(text.contains("| Folder ID: 3"));

        let call = api.calls().into_iter().last().unwrap();
        let types: Vec<&str> = call
            .query
            .pairs()
            .iter()
            .filter(|(k, _)| k == "content_types[]")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(types, vec!["image/png", "application/pdf"]);
    }

    #[tokio::test]
    async fn test_bad_sort_is_rejected() {
        let (api, ctx) = context(MockApi::new());
        let err = ctx
            .call("list_folder_files", &json!({"folder_id": 3, "sort": "random"}))
            .await
            .unwrap_err();
        assert!(matches!(err, LecternError::InvalidInput(_)));
        assert_eq!(api.call_count(), 0);
    }

    #[test]
    fn test_local_file_name_is_confined() {
        assert_eq!(
            local_file_name(&json!({"display_name": "../../.bashrc"}), 1),
            ".bashrc"
        );
        assert_eq!(local_file_name(&json!({"display_name": ".."}), 9), "file_9");
        assert_eq!(local_file_name(&json!({}), 5), "file_5");
    }

    #[test]
    fn test_unique_path_without_extension() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("README"), b"x").unwrap();
        assert_eq!(unique_path(dir.path(), "README"), dir.path().join("README_1"));
    }
}

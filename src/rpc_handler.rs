//! JSON command handler for the linkshelf presentation layer.
//!
//! The UI never touches the collection directly: it sends intents by method
//! name and renders whatever `bookmark.list` / `bookmark.search` return.

use serde_json::{json, Value};

use crate::managers::bookmark_manager::BookmarkManager;
use crate::services::metadata_fetcher::MetadataFetcher;
use crate::services::remote_store::RemoteStore;
use crate::types::bookmark::{BookmarkDraft, BookmarkEntry};
use crate::types::session::SessionContext;

fn entry_json(entry: &BookmarkEntry) -> Value {
    let b = &entry.bookmark;
    json!({
        "id": b.id,
        "title": b.title,
        "url": b.url,
        "description": b.description,
        "image": b.image,
        "tags": b.tags,
        "is_pinned": b.is_pinned,
        "created_at": b.created_at.to_rfc3339(),
        "pending": entry.is_pending(),
    })
}

fn view_json<S: RemoteStore + 'static>(manager: &BookmarkManager<S>) -> Value {
    Value::Array(manager.view().into_iter().map(entry_json).collect())
}

fn str_param<'a>(params: &'a Value, name: &str) -> Option<&'a str> {
    params.get(name).and_then(|v| v.as_str())
}

/// Dispatch a method call to the bookmark manager.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub async fn handle_method<S, F>(
    manager: &mut BookmarkManager<S>,
    fetcher: &F,
    method: &str,
    params: &Value,
) -> Result<Value, String>
where
    S: RemoteStore + 'static,
    F: MetadataFetcher + ?Sized,
{
    match method {
        "ping" => Ok(json!({"pong": true})),

        // ─── Session ───
        "session.sign_in" => {
            let owner_id = str_param(params, "owner_id").ok_or("missing owner_id")?;
            let token = str_param(params, "access_token").ok_or("missing access_token")?;
            let mut session = SessionContext::new(owner_id, token);
            if let Some(email) = str_param(params, "email") {
                session = session.with_email(email);
            }
            if let Some(name) = str_param(params, "full_name") {
                session = session.with_full_name(name);
            }
            let rows = manager.activate(session).await.map_err(|e| e.to_string())?;
            Ok(json!({"ok": true, "count": rows.len()}))
        }
        "session.whoami" => match manager.session() {
            Some(session) => Ok(json!({
                "owner_id": session.owner_id,
                "display_name": session.display_name(),
                "active": manager.is_active(),
            })),
            None => Err("not authenticated".to_string()),
        },
        "session.sign_out" => {
            manager.sign_out();
            Ok(json!({"ok": true}))
        }

        // ─── Bookmarks ───
        "bookmark.add" => {
            let url = str_param(params, "url").ok_or("missing url")?;
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("invalid url: must start with http:// or https://".to_string());
            }
            let mut draft = BookmarkDraft::new(str_param(params, "title").unwrap_or_default(), url);
            if let Some(tags) = str_param(params, "tags") {
                draft = draft.with_tags(tags);
            }
            let bookmark = manager
                .add_with_metadata(draft, fetcher)
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({"id": bookmark.id, "title": bookmark.title, "url": bookmark.url, "pending": true}))
        }
        "bookmark.delete" => {
            let id = str_param(params, "id").ok_or("missing id")?;
            manager.delete_optimistic(id).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "bookmark.toggle_pin" => {
            let id = str_param(params, "id").ok_or("missing id")?;
            let pinned = manager.toggle_pin(id).map_err(|e| e.to_string())?;
            Ok(json!({"id": id, "is_pinned": pinned}))
        }
        "bookmark.search" => {
            let query = str_param(params, "query").ok_or("missing query")?;
            manager.set_search_term(query);
            Ok(view_json(manager))
        }
        "bookmark.list" => Ok(view_json(manager)),
        "bookmark.reload" => {
            manager.load_all().await.map_err(|e| e.to_string())?;
            Ok(view_json(manager))
        }

        _ => Err(format!("unknown method: {}", method)),
    }
}

//! Flattening a collection or folder into execution order

use crate::errors::RunError;
use crate::models::{Collection, CollectionItem, Request};

/// Requests under `folder_path`, depth-first in declared order.
///
/// The empty path selects the whole collection.
pub fn collect_requests(
    collection: &Collection,
    folder_path: &[String],
) -> Result<Vec<Request>, RunError> {
    let location = std::iter::once(collection.name.as_str())
        .chain(folder_path.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" / ");

    let items = collection
        .folder_items(folder_path)
        .ok_or_else(|| RunError::FolderNotFound(location.clone()))?;

    let mut requests = Vec::new();
    flatten_into(items, &mut requests);

    if requests.is_empty() {
        return Err(RunError::NoRequests(location));
    }
    Ok(requests)
}

fn flatten_into(items: &[CollectionItem], out: &mut Vec<Request>) {
    for item in items {
        match item {
            CollectionItem::Request(request) => out.push(request.clone()),
            CollectionItem::Folder(folder) => flatten_into(&folder.items, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Folder, HttpMethod};

    fn req(name: &str) -> CollectionItem {
        CollectionItem::Request(Request::new(name, HttpMethod::GET, format!("/{}", name)))
    }

    fn tree() -> Collection {
        Collection::new("api")
            .with_item(req("first"))
            .with_item(CollectionItem::Folder(Folder::new(
                "users",
                vec![
                    req("list"),
                    CollectionItem::Folder(Folder::new("admin", vec![req("ban"), req("unban")])),
                    req("create"),
                ],
            )))
            .with_item(CollectionItem::Folder(Folder::new("empty", vec![])))
            .with_item(req("last"))
    }

    fn names(requests: &[Request]) -> Vec<&str> {
        requests.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_whole_collection_is_depth_first() {
        let requests = collect_requests(&tree(), &[]).unwrap();
        assert_eq!(
            names(&requests),
            ["first", "list", "ban", "unban", "create", "last"]
        );
    }

    #[test]
    fn test_folder_subtree() {
        let requests = collect_requests(&tree(), &["users".to_string()]).unwrap();
        assert_eq!(names(&requests), ["list", "ban", "unban", "create"]);
    }

    #[test]
    fn test_empty_folder_is_no_requests() {
        let err = collect_requests(&tree(), &["empty".to_string()]).unwrap_err();
        assert_eq!(err, RunError::NoRequests("api / empty".into()));
        let err = collect_requests(&Collection::new("blank"), &[]).unwrap_err();
        assert!(matches!(err, RunError::NoRequests(_)));
    }

    #[test]
    fn test_unknown_folder() {
        let err = collect_requests(&tree(), &["users".into(), "ghost".into()]).unwrap_err();
        assert_eq!(err, RunError::FolderNotFound("api / users / ghost".into()));
    }
}

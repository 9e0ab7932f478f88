//! Concurrent gather-and-merge of name-keyed maps.

use std::future::Future;

use futures::future::try_join_all;
use indexmap::IndexMap;

/// Awaits every future concurrently and merges the maps in input order.
///
/// Keys keep the order in which they first appear; a later map overwrites the
/// value of a key seen earlier. The first error wins.
///
/// # Example
/// ```
/// use indexmap::IndexMap;
/// use devicevisor::merge_gathered;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let maps = [
///         IndexMap::from([("k".to_string(), 1), ("a".to_string(), 0)]),
///         IndexMap::from([("k".to_string(), 2)]),
///     ];
///     let merged = merge_gathered(maps.map(|m| futures::future::ready(Ok::<_, ()>(m))))
///         .await
///         .unwrap();
///     assert_eq!(merged.keys().collect::<Vec<_>>(), vec!["k", "a"]);
///     assert_eq!(merged["k"], 2);
/// }
/// ```
pub async fn merge_gathered<V, E, F>(futures: impl IntoIterator<Item = F>) -> Result<IndexMap<String, V>, E>
where
    F: Future<Output = Result<IndexMap<String, V>, E>>,
{
    let mut merged = IndexMap::new();
    for map in try_join_all(futures).await? {
        merged.extend(map);
    }
    Ok(merged)
}

use crate::infrastructure::error::InfraError;
use futures::stream::{self, Stream};
use std::future::Future;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Lazily walks a continuation-token listing. Each poll fetches one page; the
/// stream ends after the page that carries no `next_page_token`. Dropping the
/// stream early stops fetching, and calling `pages` again restarts from the
/// first page.
pub fn pages<T, F, Fut>(fetch: F) -> impl Stream<Item = Result<Vec<T>, InfraError>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, InfraError>>,
{
    stream::try_unfold((Cursor::Start, fetch), |(cursor, mut fetch)| async move {
        let page_token = match cursor {
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
            Cursor::Done => return Ok(None),
        };

        let page = fetch(page_token).await?;
        let next = match page.next_page_token.filter(|token| !token.is_empty()) {
            Some(token) => Cursor::Next(token),
            None => Cursor::Done,
        };
        Ok::<_, InfraError>(Some((page.items, (next, fetch))))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{StreamExt, TryStreamExt};
    use std::sync::Mutex;

    fn three_pages(token: Option<String>) -> Result<Page<u32>, InfraError> {
        match token.as_deref() {
            None => Ok(Page {
                items: vec![1, 2],
                next_page_token: Some("p2".to_string()),
            }),
            Some("p2") => Ok(Page {
                items: vec![3],
                next_page_token: Some("p3".to_string()),
            }),
            Some("p3") => Ok(Page {
                items: vec![4],
                next_page_token: None,
            }),
            Some(other) => Err(InfraError::Connection(format!("unknown token {other}"))),
        }
    }

    #[tokio::test]
    async fn pages_follow_tokens_until_exhausted() {
        let requested = Mutex::new(Vec::new());
        let collected: Vec<Vec<u32>> = pages(|token| {
            requested.lock().expect("tokens mutex poisoned").push(token.clone());
            async move { three_pages(token) }
        })
        .try_collect()
        .await
        .expect("collect pages");

        assert_eq!(collected, vec![vec![1, 2], vec![3], vec![4]]);
        assert_eq!(
            *requested.lock().expect("tokens mutex poisoned"),
            vec![None, Some("p2".to_string()), Some("p3".to_string())]
        );
    }

    #[tokio::test]
    async fn pages_stop_fetching_when_consumer_stops() {
        let calls = Mutex::new(0usize);
        let first = pages(|token| {
            *calls.lock().expect("calls mutex poisoned") += 1;
            async move { three_pages(token) }
        })
        .boxed_local()
        .next()
        .await;

        assert_eq!(first.expect("one page").expect("page ok"), vec![1, 2]);
        assert_eq!(*calls.lock().expect("calls mutex poisoned"), 1);
    }

    #[tokio::test]
    async fn pages_surface_fetch_errors() {
        let result: Result<Vec<Vec<u32>>, InfraError> = pages(|_token| async {
            Err::<Page<u32>, _>(InfraError::Connection("offline".to_string()))
        })
        .try_collect()
        .await;
        assert!(matches!(result, Err(InfraError::Connection(_))));
    }
}

use std::collections::VecDeque;

use async_trait::async_trait;

use crate::errors::DriverError;

/// Page-oriented producer of driver results.
///
/// Each call to `next_page` is one upstream fetch; `Ok(None)` signals that
/// no pages remain. Empty pages are allowed. `cancel` is called when the
/// consumer gives up before the publisher finished.
#[async_trait]
pub trait PagedPublisher<T: Send + 'static>: Send {
    async fn next_page(&mut self) -> Result<Option<Vec<T>>, DriverError>;

    fn cancel(&mut self) {}
}

pub type BoxPublisher<T> = Box<dyn PagedPublisher<T>>;

/// Publisher over pages already held in memory.
pub struct StaticPublisher<T> {
    pages: VecDeque<Vec<T>>,
}

impl<T> StaticPublisher<T> {
    pub fn new(pages: Vec<Vec<T>>) -> Self {
        Self {
            pages: pages.into(),
        }
    }

    /// A single page holding one element.
    pub fn single(item: T) -> Self {
        Self::new(vec![vec![item]])
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl<T: Send + 'static> PagedPublisher<T> for StaticPublisher<T> {
    async fn next_page(&mut self) -> Result<Option<Vec<T>>, DriverError> {
        Ok(self.pages.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_publisher_pages_in_order() {
        let mut publisher = StaticPublisher::new(vec![vec![1, 2], vec![], vec![3]]);
        assert_eq!(publisher.next_page().await.unwrap(), Some(vec![1, 2]));
        assert_eq!(publisher.next_page().await.unwrap(), Some(vec![]));
        assert_eq!(publisher.next_page().await.unwrap(), Some(vec![3]));
        assert_eq!(publisher.next_page().await.unwrap(), None);
    }
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

/// 候选链接队列
///
/// 发现工作器生产、提取工作器消费的FIFO队列。
/// 同一链接在一次任务运行内至多入队一次（插入时去重）。
/// 生产端全部结束后通过 `notify_producers_finished` 发出哨兵，
/// 此后 `get_link` 对排空的队列立即返回 None，不再阻塞。
pub struct LinkQueue {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    pending: VecDeque<String>,
    seen: HashSet<String>,
    finished: bool,
    waiters: VecDeque<oneshot::Sender<Option<String>>>,
}

impl LinkQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// 入队一个链接，重复链接为no-op
    ///
    /// 返回是否真正入队。有消费者在等待时直接交付，保持FIFO。
    pub fn add_link(&self, url: impl Into<String>) -> bool {
        let url = url.into();
        let mut inner = self.inner.lock();
        if !inner.seen.insert(url.clone()) {
            return false;
        }
        let mut url = url;
        while let Some(waiter) = inner.waiters.pop_front() {
            match waiter.send(Some(url)) {
                Ok(()) => return true,
                // 等待方已放弃接收，取回链接再试下一个
                Err(returned) => match returned {
                    Some(recovered) => url = recovered,
                    None => return true,
                },
            }
        }
        inner.pending.push_back(url);
        true
    }

    /// 批量入队，返回真正入队的数量
    pub fn add_links<I>(&self, urls: I) -> usize
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        urls.into_iter()
            .map(Into::into)
            .filter(|url: &String| self.add_link(url.clone()))
            .count()
    }

    /// 取出下一个链接
    ///
    /// 队列非空时立即返回；队列为空且生产未结束时挂起，
    /// 直到新链接到达或生产结束。生产结束且排空后恒返回 None。
    pub async fn get_link(&self) -> Option<String> {
        let receiver = {
            let mut inner = self.inner.lock();
            if let Some(url) = inner.pending.pop_front() {
                return Some(url);
            }
            if inner.finished {
                return None;
            }
            let (tx, rx) = oneshot::channel();
            inner.waiters.push_back(tx);
            rx
        };
        // 发送端在队列销毁时被丢弃，等价于生产结束
        receiver.await.unwrap_or(None)
    }

    /// 宣告生产端全部结束，幂等
    ///
    /// 唤醒所有挂起的消费者并交付哨兵
    pub fn notify_producers_finished(&self) {
        let waiters = {
            let mut inner = self.inner.lock();
            inner.finished = true;
            std::mem::take(&mut inner.waiters)
        };
        debug!(woken = waiters.len(), "Link producers finished");
        for waiter in waiters {
            let _ = waiter.send(None);
        }
    }

    /// 本次运行见过的链接总数（含已消费）
    pub fn seen_count(&self) -> usize {
        self.inner.lock().seen.len()
    }

    /// 当前待消费的链接数
    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }
}

impl Default for LinkQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_duplicate_links_enqueued_once() {
        let queue = LinkQueue::new();
        assert!(queue.add_link("https://example.com/a"));
        assert!(!queue.add_link("https://example.com/a"));
        assert!(queue.add_link("https://example.com/b"));

        assert_eq!(queue.seen_count(), 2);
        assert_eq!(queue.get_link().await.as_deref(), Some("https://example.com/a"));
        assert_eq!(queue.get_link().await.as_deref(), Some("https://example.com/b"));
    }

    #[tokio::test]
    async fn test_sentinel_after_producers_finish() {
        let queue = LinkQueue::new();
        queue.add_link("https://example.com/a");
        queue.notify_producers_finished();

        assert_eq!(queue.get_link().await.as_deref(), Some("https://example.com/a"));
        assert_eq!(queue.get_link().await, None);
        // 哨兵对后续每次调用都立即生效
        assert_eq!(queue.get_link().await, None);
    }

    #[tokio::test]
    async fn test_blocked_consumer_woken_by_new_link() {
        let queue = Arc::new(LinkQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.get_link().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.add_link("https://example.com/late");

        assert_eq!(
            consumer.await.unwrap().as_deref(),
            Some("https://example.com/late")
        );
    }

    #[tokio::test]
    async fn test_blocked_consumers_woken_by_finish() {
        let queue = Arc::new(LinkQueue::new());
        let mut consumers = Vec::new();
        for _ in 0..3 {
            let queue = Arc::clone(&queue);
            consumers.push(tokio::spawn(async move { queue.get_link().await }));
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.notify_producers_finished();

        for consumer in consumers {
            assert_eq!(consumer.await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn test_add_links_counts_unique_only() {
        let queue = LinkQueue::new();
        let added = queue.add_links(vec![
            "https://example.com/a",
            "https://example.com/b",
            "https://example.com/a",
        ]);
        assert_eq!(added, 2);
    }
}

//! 查询缓存：按键缓存网关结果，合并并发请求，变更成功后失效重取
//!
//! 缓存只在主循环里以 `&mut` 访问。网关调用在 tokio 任务里执行，
//! 结果通过 `CacheEvent` 通道送回，由主循环调用 [`QueryCache::handle`] 落地。

pub mod keys;
pub mod mutation;

pub use keys::{fetcher_for, Fetcher, QueryData, QueryKey};
pub use mutation::{
    Mutation, MutationData, MutationId, MutationKind, MutationSettled, MutationStatus,
    SUCCESS_FLASH,
};

use crate::gateway::GatewayError;
use std::collections::HashMap;
use std::future::Future;
use std::time::Instant;
use tokio::sync::mpsc;

#[derive(Debug)]
pub enum CacheEvent {
    Query(QueryResolved),
    Mutation(MutationSettled),
}

#[derive(Debug)]
pub struct QueryResolved {
    pub key: QueryKey,
    pub fetch_id: u64,
    pub result: Result<QueryData, GatewayError>,
}

/// 订阅凭证，交还给 [`QueryCache::unsubscribe`] 时消耗
#[derive(Debug, PartialEq, Eq)]
pub struct Subscription {
    id: u64,
    key: QueryKey,
}

impl Subscription {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

/// `query` 的读视图
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryState<'a> {
    pub data: Option<&'a QueryData>,
    pub is_loading: bool,
    pub error: Option<&'a GatewayError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryStatus {
    Loading,
    Success,
    Error,
}

struct Entry {
    status: EntryStatus,
    data: Option<QueryData>,
    error: Option<GatewayError>,
    subscribers: usize,
    in_flight: Option<u64>,
    refetch_queued: bool,
    fetcher: Fetcher,
    updated_at: Option<Instant>,
}

impl Entry {
    fn new(fetcher: Fetcher) -> Self {
        Self {
            status: EntryStatus::Loading,
            data: None,
            error: None,
            subscribers: 0,
            in_flight: None,
            refetch_queued: false,
            fetcher,
            updated_at: None,
        }
    }

    fn needs_fetch(&self) -> bool {
        self.in_flight.is_none() && self.status != EntryStatus::Success
    }
}

pub struct QueryCache {
    entries: HashMap<QueryKey, Entry>,
    events: mpsc::Sender<CacheEvent>,
    next_id: u64,
}

impl QueryCache {
    pub fn new(events: mpsc::Sender<CacheEvent>) -> Self {
        Self {
            entries: HashMap::new(),
            events,
            next_id: 0,
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// 订阅一个键；缓存命中直接返回，否则发起（或共享进行中的）请求
    pub fn subscribe(&mut self, key: QueryKey, fetcher: Fetcher) -> Subscription {
        let id = self.next_id();
        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new(fetcher.clone()));
        entry.subscribers += 1;
        entry.fetcher = fetcher;

        if entry.needs_fetch() {
            self.start_fetch(&key);
        }
        Subscription { id, key }
    }

    /// 取消订阅不会中止进行中的请求
    pub fn unsubscribe(&mut self, subscription: Subscription) {
        let Subscription { id, key } = subscription;
        log::trace!("取消订阅 #{} {}", id, key);
        let Some(entry) = self.entries.get_mut(&key) else {
            return;
        };
        entry.subscribers = entry.subscribers.saturating_sub(1);
        if entry.subscribers == 0 && entry.in_flight.is_none() && entry.status == EntryStatus::Error
        {
            log::debug!("回收失败的缓存项 {}", key);
            self.entries.remove(&key);
        }
    }

    pub fn state(&self, key: &QueryKey) -> QueryState<'_> {
        match self.entries.get(key) {
            Some(entry) => QueryState {
                data: entry.data.as_ref(),
                is_loading: entry.status == EntryStatus::Loading,
                error: entry.error.as_ref(),
            },
            None => QueryState {
                data: None,
                is_loading: false,
                error: None,
            },
        }
    }

    pub fn updated_at(&self, key: &QueryKey) -> Option<Instant> {
        self.entries.get(key).and_then(|e| e.updated_at)
    }

    #[cfg(test)]
    pub fn subscribers(&self, key: &QueryKey) -> usize {
        self.entries.get(key).map(|e| e.subscribers).unwrap_or(0)
    }

    #[cfg(test)]
    pub fn is_cached(&self, key: &QueryKey) -> bool {
        self.entries.contains_key(key)
    }

    /// 使一个键失效。进行中的请求结束后只会再重取一次；不保留旧数据
    pub fn invalidate(&mut self, key: &QueryKey) {
        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };
        entry.data = None;
        entry.error = None;
        entry.status = EntryStatus::Loading;

        if entry.in_flight.is_some() {
            log::debug!("{} 请求进行中，排队重取", key);
            entry.refetch_queued = true;
            return;
        }
        if entry.subscribers == 0 {
            self.entries.remove(key);
            return;
        }
        self.start_fetch(key);
    }

    /// 清空所有缓存项（API 地址变化后）。进行中的请求结果到达时会被丢弃，
    /// 之前发出的 `Subscription` 随之作废，不应再交还
    pub fn clear(&mut self) {
        log::debug!("清空查询缓存 ({} 项)", self.entries.len());
        self.entries.clear();
    }

    /// 主循环收到的事件；变更结果交还给调用方分发
    pub fn handle(&mut self, event: CacheEvent) -> Option<MutationSettled> {
        match event {
            CacheEvent::Query(resolved) => {
                self.resolve(resolved);
                None
            }
            CacheEvent::Mutation(settled) => Some(settled),
        }
    }

    /// 返回结果是否被采用
    pub fn resolve(&mut self, resolved: QueryResolved) -> bool {
        let QueryResolved {
            key,
            fetch_id,
            result,
        } = resolved;
        let Some(entry) = self.entries.get_mut(&key) else {
            log::debug!("{} 已被回收，丢弃结果", key);
            return false;
        };
        if entry.in_flight != Some(fetch_id) {
            log::debug!("{} 的过期结果 #{} 被丢弃", key, fetch_id);
            return false;
        }
        entry.in_flight = None;

        if entry.refetch_queued {
            entry.refetch_queued = false;
            if entry.subscribers > 0 {
                self.start_fetch(&key);
            } else {
                self.entries.remove(&key);
            }
            return false;
        }

        match result {
            Ok(data) => {
                entry.status = EntryStatus::Success;
                entry.data = Some(data);
                entry.error = None;
                entry.updated_at = Some(Instant::now());
            }
            Err(e) => {
                log::warn!("{} 获取失败: {}", key, e);
                entry.status = EntryStatus::Error;
                entry.data = None;
                entry.error = Some(e);
                if entry.subscribers == 0 {
                    self.entries.remove(&key);
                }
            }
        }
        true
    }

    /// 发起一次性变更，结果以 `CacheEvent::Mutation` 送回
    pub fn mutate<Fut>(&mut self, kind: MutationKind, fut: Fut) -> MutationId
    where
        Fut: Future<Output = Result<MutationData, GatewayError>> + Send + 'static,
    {
        let id = self.next_id();
        let tx = self.events.clone();
        log::debug!("变更 #{} 开始: {:?}", id, kind);
        tokio::spawn(async move {
            let result = fut.await;
            let _ = tx
                .send(CacheEvent::Mutation(MutationSettled { id, kind, result }))
                .await;
        });
        id
    }

    fn start_fetch(&mut self, key: &QueryKey) {
        let fetch_id = self.next_id();
        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };
        entry.in_flight = Some(fetch_id);
        entry.status = EntryStatus::Loading;
        entry.data = None;
        entry.error = None;

        let fut = (entry.fetcher)();
        let tx = self.events.clone();
        let key = key.clone();
        log::debug!("{} 发起请求 #{}", key, fetch_id);
        tokio::spawn(async move {
            let result = fut.await;
            let _ = tx
                .send(CacheEvent::Query(QueryResolved {
                    key,
                    fetch_id,
                    result,
                }))
                .await;
        });
    }
}

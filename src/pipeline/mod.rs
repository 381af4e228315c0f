// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use dashmap::DashSet;
use parking_lot::Mutex;

use crate::domain::models::listing::SkippedLink;
use crate::pipeline::captcha::CaptchaCoordinator;
use crate::pipeline::link_queue::LinkQueue;

pub mod captcha;
pub mod discovery;
pub mod expander;
pub mod extraction;
pub mod link_queue;
pub mod orchestrator;

/// 管道共享上下文
///
/// 跨工作器的全部可变协调状态都集中在这里，按任务实例化，
/// 以依赖注入方式传给每个工作器，避免模块级全局变量导致的
/// 多任务串扰。
pub struct PipelineContext {
    /// 验证码互斥门
    pub captcha: Arc<CaptchaCoordinator>,
    /// 候选链接队列
    pub links: Arc<LinkQueue>,
    /// 地理坐标去重集合，键为 "lat,lon" 复合串
    pub seen_coords: DashSet<String>,
    /// 因坐标重复被跳过的链接，进入校验侧文件
    pub skipped: Mutex<Vec<SkippedLink>>,
    /// 已消费的搜索单元数，驱动发现阶段进度心跳
    pub units_done: AtomicUsize,
    /// 已消费的链接数，驱动提取阶段进度心跳
    pub links_done: AtomicUsize,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self {
            captcha: Arc::new(CaptchaCoordinator::new()),
            links: Arc::new(LinkQueue::new()),
            seen_coords: DashSet::new(),
            skipped: Mutex::new(Vec::new()),
            units_done: AtomicUsize::new(0),
            links_done: AtomicUsize::new(0),
        }
    }

    /// 原子登记一个坐标键，首次插入获胜
    pub fn register_coordinate(&self, key: String) -> bool {
        self.seen_coords.insert(key)
    }

    /// 记录一条被跳过的链接
    pub fn record_skipped(&self, link: SkippedLink) {
        self.skipped.lock().push(link);
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

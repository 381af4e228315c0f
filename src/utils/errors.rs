// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

/// 仓库层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("未找到数据")]
    NotFound,

    #[error("数据已存在")]
    AlreadyExists,

    #[error("无效参数: {0}")]
    InvalidParameter(String),

    #[error("内部错误: {0}")]
    InternalError(String),
}

/// 浏览器层错误类型
#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("浏览器启动失败: {0}")]
    Launch(String),

    #[error("页面操作失败: {0}")]
    Page(String),

    #[error("等待超时: {0}")]
    Timeout(String),

    #[error("脚本执行失败: {0}")]
    Evaluate(String),
}

/// 验证码处理错误类型
#[derive(Error, Debug)]
pub enum CaptchaError {
    /// 本工作器驱动的求解流程失败
    #[error("验证码求解失败: {0}")]
    SolveFailed(String),

    /// 其他工作器持有租约且求解失败，等待方收到的失败信号
    #[error("共享验证码挑战未能解决")]
    SharedChallengeFailed,

    #[error("验证码求解超时")]
    Timeout,
}

/// 结果落盘错误类型
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("无效输入: {0}")]
    InvalidInput(String),
}

/// 管道层错误类型
///
/// 只有使管道完全无事可做的错误才会到达这一层，
/// 单个搜索单元或链接的失败在工作器内部消化。
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("没有可处理的搜索位置")]
    NoLocations,

    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),

    #[error("仓库错误: {0}")]
    Repository(#[from] RepositoryError),

    #[error("结果落盘错误: {0}")]
    Sink(#[from] SinkError),

    #[error("内部错误: {0}")]
    Internal(String),
}

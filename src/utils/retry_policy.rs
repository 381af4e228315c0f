// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// 重试策略配置
///
/// 导航、搜索、地理编码等调用点共用同一抽象，
/// 各自以不同参数实例化。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大重试次数（不含首次尝试）
    pub max_retries: u32,
    /// 初始退避时间
    pub initial_backoff: Duration,
    /// 最大退避时间
    pub max_backoff: Duration,
    /// 退避乘数
    pub backoff_multiplier: f64,
    /// 抖动因子 (0.0-1.0)
    pub jitter_factor: f64,
    /// 是否启用指数退避
    pub exponential_backoff: bool,
    /// 是否启用抖动
    pub enable_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            exponential_backoff: true,
            enable_jitter: true,
        }
    }
}

impl RetryPolicy {
    /// 搜索单元级别的重试策略
    ///
    /// 对应一次地图搜索的完整导航，指数退避加抖动
    pub fn search() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.3,
            exponential_backoff: true,
            enable_jitter: true,
        }
    }

    /// 详情页导航的重试策略，最多三次重试（四次尝试）
    pub fn navigation() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 1.5,
            jitter_factor: 0.3,
            exponential_backoff: true,
            enable_jitter: true,
        }
    }

    /// 地理编码的固定延迟重试策略
    pub fn geocode() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(500),
            backoff_multiplier: 1.0,
            jitter_factor: 0.0,
            exponential_backoff: false,
            enable_jitter: false,
        }
    }

    /// 计算下次重试的退避时间
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        if !self.exponential_backoff {
            return self.initial_backoff;
        }

        let backoff_secs =
            self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32 - 1);

        let capped_backoff = backoff_secs.min(self.max_backoff.as_secs_f64());

        let final_backoff = if self.enable_jitter {
            let jitter_range = capped_backoff * self.jitter_factor;
            let jitter = rand::random_range(-jitter_range..jitter_range);
            (capped_backoff + jitter).max(0.0)
        } else {
            capped_backoff
        };

        Duration::from_secs_f64(final_backoff)
    }

    /// 是否应该重试
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }

    /// 根据错误类型判断是否应该重试
    pub fn should_retry_with_error(&self, attempt: u32, error: &anyhow::Error) -> bool {
        self.should_retry(attempt) && is_retryable_error(error)
    }
}

/// 按策略执行异步操作，失败则退避后重试
///
/// 所有尝试都失败时返回最后一次的错误。
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, op_name: &str, mut f: F) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                if !policy.should_retry(attempt) {
                    return Err(e);
                }
                let backoff = policy.calculate_backoff(attempt);
                warn!(
                    "{} attempt {}/{} failed: {}. Retrying in {:?}",
                    op_name,
                    attempt,
                    policy.max_retries + 1,
                    e,
                    backoff
                );
                sleep(backoff).await;
            }
        }
    }
}

/// 同 `retry`，但只对瞬态类别的错误重试
///
/// 不可重试的错误（如选择器失效、求解彻底失败）立即返回。
pub async fn retry_on_transient<T, F, Fut>(
    policy: &RetryPolicy,
    op_name: &str,
    mut f: F,
) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                if !policy.should_retry_with_error(attempt, &e) {
                    return Err(e);
                }
                let backoff = policy.calculate_backoff(attempt);
                warn!(
                    "{} attempt {}/{} failed: {}. Retrying in {:?}",
                    op_name,
                    attempt,
                    policy.max_retries + 1,
                    e,
                    backoff
                );
                sleep(backoff).await;
            }
        }
    }
}

/// 判断错误是否可重试
pub fn is_retryable_error(error: &anyhow::Error) -> bool {
    let error_string = error.to_string().to_lowercase();

    // 网络和页面加载相关错误可重试
    let retryable_patterns = [
        "timeout",
        "timed out",
        "connection reset",
        "connection refused",
        "dns error",
        "navigation failed",
        "net::err",
        "network is unreachable",
        "broken pipe",
        "rate limit",
        "challenge resolved elsewhere",
        // 求解耗尽只终结本次搜索尝试，单元级重试接手
        "captcha solve failed",
    ];

    retryable_patterns.iter().any(|&p| error_string.contains(p))
}

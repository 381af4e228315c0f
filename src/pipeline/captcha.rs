// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::utils::errors::CaptchaError;

/// 等待放行信号的上限，超过视为持有者挂死
const GREEN_LIGHT_TIMEOUT: Duration = Duration::from_secs(180);

/// 验证码互斥门
///
/// 同一时刻只允许一个工作器驱动共享挑战的求解流程。
/// 一个"挑战回合"内 `claim_handling` 恰好对第一个调用者返回 true，
/// 其余调用者在 `wait_for_green_light` 上挂起，直到持有者调用
/// `resolve_handling` 统一放行或宣告失败。无论结果如何，
/// 回合结束后内部状态都会复位，租约不会被永久持有。
pub struct CaptchaCoordinator {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    lease_held: bool,
    waiters: Vec<oneshot::Sender<bool>>,
}

impl CaptchaCoordinator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// 尝试获取求解租约
    ///
    /// 返回 true 表示本调用者赢得租约，必须在求解结束后调用
    /// `resolve_handling`；返回 false 表示已有持有者，
    /// 调用者应转入 `wait_for_green_light`。
    pub fn claim_handling(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.lease_held {
            return false;
        }
        inner.lease_held = true;
        debug!("Captcha lease claimed");
        true
    }

    /// 等待放行信号
    ///
    /// 无人持有租约时立即返回；否则挂起直到持有者放行。
    /// 持有者求解失败时等待方收到 `SharedChallengeFailed`，
    /// 由调用方决定是否重试整次导航。
    pub async fn wait_for_green_light(&self) -> Result<(), CaptchaError> {
        let receiver = {
            let mut inner = self.inner.lock();
            if !inner.lease_held {
                return Ok(());
            }
            let (tx, rx) = oneshot::channel();
            inner.waiters.push(tx);
            rx
        };

        match tokio::time::timeout(GREEN_LIGHT_TIMEOUT, receiver).await {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => Err(CaptchaError::SharedChallengeFailed),
            // 发送端被丢弃等价于回合异常终止
            Ok(Err(_)) => Err(CaptchaError::SharedChallengeFailed),
            Err(_) => Err(CaptchaError::Timeout),
        }
    }

    /// 结束当前挑战回合
    ///
    /// 唤醒所有等待方并复位租约。success 为 false 时
    /// 等待方全部收到失败信号。
    pub fn resolve_handling(&self, success: bool) {
        let waiters = {
            let mut inner = self.inner.lock();
            if !inner.lease_held {
                warn!("resolve_handling called without an active lease");
            }
            inner.lease_held = false;
            std::mem::take(&mut inner.waiters)
        };
        debug!(success, waiters = waiters.len(), "Captcha lease resolved");
        for waiter in waiters {
            // 等待方可能已经超时退出，发送失败无需处理
            let _ = waiter.send(success);
        }
    }
}

impl Default for CaptchaCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_green_light_immediate_when_idle() {
        let gate = CaptchaCoordinator::new();
        gate.wait_for_green_light().await.unwrap();
    }

    #[tokio::test]
    async fn test_claim_is_exclusive_until_resolved() {
        let gate = CaptchaCoordinator::new();
        assert!(gate.claim_handling());
        assert!(!gate.claim_handling());
        assert!(!gate.claim_handling());

        gate.resolve_handling(true);
        assert!(gate.claim_handling());
    }

    #[tokio::test]
    async fn test_exactly_one_winner_among_concurrent_claimers() {
        let gate = Arc::new(CaptchaCoordinator::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let gate = Arc::clone(&gate);
            handles.push(tokio::spawn(async move { gate.claim_handling() }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_success_releases_all_waiters() {
        let gate = Arc::new(CaptchaCoordinator::new());
        assert!(gate.claim_handling());

        let mut handles = Vec::new();
        for _ in 0..3 {
            let gate = Arc::clone(&gate);
            handles.push(tokio::spawn(async move { gate.wait_for_green_light().await }));
        }
        // 让等待方真正挂起后再放行
        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.resolve_handling(true);

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn test_failure_propagates_and_resets() {
        let gate = Arc::new(CaptchaCoordinator::new());
        assert!(gate.claim_handling());

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.wait_for_green_light().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.resolve_handling(false);

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(CaptchaError::SharedChallengeFailed)));

        // 回合复位，下一回合可以正常开始
        assert!(gate.claim_handling());
        gate.resolve_handling(true);
        gate.wait_for_green_light().await.unwrap();
    }
}

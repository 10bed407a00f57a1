/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

pub(crate) struct RetryBackoff {
    refresh_interval: Duration,
    initial_retry: Duration,
    max_retry: Duration,
    retrying: Option<Duration>,
}

impl RetryBackoff {
    pub(crate) fn new(
        refresh_interval: Duration,
        initial_retry: Duration,
        max_retry: Duration,
    ) -> Self {
        RetryBackoff {
            refresh_interval,
            initial_retry,
            max_retry,
            retrying: None,
        }
    }

    /// Wait time before the next cycle after a successful one.
    pub(crate) fn succeeded(&mut self) -> Duration {
        self.retrying = None;
        self.refresh_interval
    }

    /// Wait time before the next cycle after a failed one.
    pub(crate) fn failed(&mut self) -> Duration {
        let wait = match self.retrying {
            None => self.initial_retry,
            Some(last) => last.saturating_mul(2).min(self.max_retry),
        };
        self.retrying = Some(wait);
        wait
    }
}

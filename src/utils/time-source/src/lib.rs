// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Abstracts the system time source
#[async_trait::async_trait]
pub trait SystemTimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[dill::component]
#[dill::interface(dyn SystemTimeSource)]
pub struct SystemTimeSourceDefault;

#[async_trait::async_trait]
impl SystemTimeSource for SystemTimeSourceDefault {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        // Negative durations are treated as "no wait"
        let std_duration = duration.to_std().unwrap_or_default();

        tokio::time::sleep(std_duration).await;
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Deterministic clock for tests.
///
/// Unlike a real clock, `sleep` never blocks: it advances the stub time by
/// the requested duration and records the call, so retry loops can be
/// asserted on without waiting.
#[derive(Debug, Clone)]
pub struct SystemTimeSourceStub {
    state: Arc<Mutex<SystemTimeSourceStubState>>,
}

#[derive(Debug)]
struct SystemTimeSourceStubState {
    t: DateTime<Utc>,
    sleeps: Vec<Duration>,
}

impl SystemTimeSourceStub {
    pub fn new() -> Self {
        Self::new_set(Utc::now())
    }

    pub fn new_set(t: DateTime<Utc>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SystemTimeSourceStubState {
                t,
                sleeps: Vec::new(),
            })),
        }
    }

    pub fn set(&self, t: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap();
        assert!(
            state.t <= t,
            "The previous time [{}] is more than new time [{t}]",
            state.t
        );
        state.t = t;
    }

    pub fn advance(&self, time_quantum: Duration) {
        let mut state = self.state.lock().unwrap();
        state.t += time_quantum;
    }

    /// Durations of all `sleep` calls made so far
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state.lock().unwrap().sleeps.clone()
    }
}

#[async_trait::async_trait]
impl SystemTimeSource for SystemTimeSourceStub {
    fn now(&self) -> DateTime<Utc> {
        self.state.lock().unwrap().t
    }

    async fn sleep(&self, duration: Duration) {
        let mut state = self.state.lock().unwrap();
        state.t += duration;
        state.sleeps.push(duration);
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

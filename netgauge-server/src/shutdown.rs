// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Shutdown hooks
//!
//! Hooks run in registration order; a failing hook is logged and does not
//! stop the ones after it.

use futures::future::BoxFuture;
use std::sync::Mutex;
use tracing::{error, info};

type Hook = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

pub struct ShutdownHooks {
    hooks: Mutex<Vec<(String, Hook)>>,
}

impl ShutdownHooks {
    pub fn new() -> Self {
        Self {
            hooks: Mutex::new(Vec::new()),
        }
    }

    pub fn register<F, Fut>(&self, name: impl Into<String>, hook: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let mut hooks = self.hooks.lock().expect("shutdown hooks lock poisoned");
        let boxed: Hook = Box::new(move || -> BoxFuture<'static, anyhow::Result<()>> {
            Box::pin(hook())
        });
        hooks.push((name.into(), boxed));
    }

    /// Run every registered hook once, in registration order.
    pub async fn run_all(&self) {
        let hooks = {
            let mut guard = self.hooks.lock().expect("shutdown hooks lock poisoned");
            std::mem::take(&mut *guard)
        };
        for (name, hook) in hooks {
            match hook().await {
                Ok(()) => info!(hook = %name, "shutdown hook completed"),
                Err(e) => error!(hook = %name, "shutdown hook failed: {}", e),
            }
        }
    }
}

impl Default for ShutdownHooks {
    fn default() -> Self {
        Self::new()
    }
}

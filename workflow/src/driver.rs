// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! External polling loop.
//!
//! Handlers never sleep. The [`Driver`] runs `on_event` once, then re-invokes
//! `is_complete` every `poll_interval` until the activation completes or
//! `max_wait` is exhausted.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::constants::{DEFAULT_POLL_INTERVAL, MAX_VALIDATION_WAIT};
use crate::errors::WorkflowError;
use crate::models::{Activation, LifecycleEvent};

/// A resource driven by lifecycle events with properties `P`.
#[async_trait]
pub trait ResourceHandler<P: Send + Sync>: Send + Sync {
    /// Starts the requested change and returns the physical resource id.
    async fn on_event(&self, event: &LifecycleEvent<P>) -> Result<Activation, WorkflowError>;

    /// Reports whether the change started by `on_event` has finished.
    ///
    /// Resources that settle within `on_event` complete immediately.
    async fn is_complete(&self, event: &LifecycleEvent<P>) -> Result<Activation, WorkflowError> {
        Ok(Activation::complete(
            event.physical_resource_id.clone().unwrap_or_default(),
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Driver {
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

impl Default for Driver {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: MAX_VALIDATION_WAIT,
        }
    }
}

impl Driver {
    pub fn new(poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            poll_interval,
            max_wait,
        }
    }

    /// Drives `event` to completion.
    ///
    /// Fails with [`WorkflowError::ValidationTimeout`] carrying the last
    /// pending reason once `max_wait` has elapsed.
    #[tracing::instrument(skip_all, fields(request_type = ?event.request_type))]
    pub async fn apply<P, H>(
        &self,
        handler: &H,
        mut event: LifecycleEvent<P>,
    ) -> Result<Activation, WorkflowError>
    where
        P: Send + Sync,
        H: ResourceHandler<P> + ?Sized,
    {
        let started = Instant::now();

        if let Activation::Complete {
            physical_resource_id,
            ..
        } = handler.on_event(&event).await?
        {
            event.physical_resource_id = Some(physical_resource_id);
        }

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let reason = match handler.is_complete(&event).await? {
                complete @ Activation::Complete { .. } => {
                    tracing::info!("[workflow] complete after {attempt} polls");
                    return Ok(complete);
                }
                Activation::Pending { reason } => reason,
            };

            let waited = started.elapsed();
            if waited >= self.max_wait {
                tracing::error!("[workflow] giving up after {waited:?}: {reason}");
                return Err(WorkflowError::ValidationTimeout {
                    certificate_id: event.physical_resource_id.unwrap_or_default(),
                    waited,
                    reason: reason.to_string(),
                });
            }

            tracing::debug!("[workflow] poll {attempt} pending: {reason}");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

//! In-app message trigger evaluation.
//!
//! Each (action, trigger) pair keeps a fired marker in the cache under
//! `"{action name}{trigger tag}"`. `FirstLaunch` stores the day it last
//! fired, the other stateful triggers store their own tag as a sentinel.

use std::sync::Arc;

use super::cache::CacheManager;
use super::clock::Clock;
use crate::types::{InAppAction, MessageLayout, TriggerType};

/// Renders in-app messages selected by the trigger evaluator.
pub trait InAppMessageHandler: Send + Sync {
    fn show_banner(&self, action: &InAppAction);
}

/// Handler that only logs the message it was asked to show.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMessageHandler;

impl InAppMessageHandler for LoggingMessageHandler {
    fn show_banner(&self, action: &InAppAction) {
        tracing::info!("Showing banner for in-app action {}", action.name);
    }
}

/// A trigger that fired during an evaluation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredTrigger {
    pub action: String,
    pub trigger: TriggerType,
}

pub fn marker_key(action: &str, trigger: TriggerType) -> String {
    format!("{}{}", action, trigger.as_str())
}

pub struct TriggerEvaluator {
    cache: Arc<CacheManager>,
    clock: Arc<dyn Clock>,
    handler: Arc<dyn InAppMessageHandler>,
}

impl TriggerEvaluator {
    pub fn new(
        cache: Arc<CacheManager>,
        clock: Arc<dyn Clock>,
        handler: Arc<dyn InAppMessageHandler>,
    ) -> Self {
        Self {
            cache,
            clock,
            handler,
        }
    }

    /// Evaluates every trigger of every cached in-app action once.
    pub fn process_cached(&self) -> Vec<FiredTrigger> {
        self.evaluate(&self.cache.in_app_actions())
    }

    /// Evaluates `actions` in order, showing each fired message and updating
    /// the markers.
    pub fn evaluate(&self, actions: &[InAppAction]) -> Vec<FiredTrigger> {
        let mut fired = Vec::new();

        for action in actions {
            for trigger in &action.triggers {
                if self.should_fire(&action.name, trigger.trigger_type) {
                    self.display(action);
                    fired.push(FiredTrigger {
                        action: action.name.clone(),
                        trigger: trigger.trigger_type,
                    });
                }
            }
        }

        if !fired.is_empty() {
            tracing::debug!("Fired {} in-app trigger(s)", fired.len());
        }
        fired
    }

    fn should_fire(&self, name: &str, trigger: TriggerType) -> bool {
        let key = marker_key(name, trigger);

        match trigger {
            TriggerType::EveryLaunch => true,
            TriggerType::FirstLaunch => {
                let previous: i64 = self.cache.read_string(&key).trim().parse().unwrap_or(0);
                let today = self.clock.today();
                if today > previous {
                    self.write_marker(&today.to_string(), &key);
                    true
                } else {
                    false
                }
            }
            TriggerType::EveryAlternateLaunch => {
                if self.cache.read_string(&key).is_empty() {
                    self.write_marker(trigger.as_str(), &key);
                    true
                } else {
                    if let Err(e) = self.cache.clear_string(&key) {
                        tracing::warn!("Failed to clear trigger marker {}: {}", key, e);
                    }
                    false
                }
            }
            TriggerType::OnceAndOnlyOnce => {
                if self.cache.read_string(&key).is_empty() {
                    self.write_marker(trigger.as_str(), &key);
                    true
                } else {
                    false
                }
            }
            TriggerType::Unknown => false,
        }
    }

    fn write_marker(&self, value: &str, key: &str) {
        if let Err(e) = self.cache.add_string(value, key) {
            tracing::warn!("Failed to store trigger marker {}: {}", key, e);
        }
    }

    fn display(&self, action: &InAppAction) {
        match action.layout {
            MessageLayout::Banner => self.handler.show_banner(action),
            MessageLayout::Unknown => {
                tracing::debug!("No renderer for layout of in-app action {}", action.name);
            }
        }
    }
}

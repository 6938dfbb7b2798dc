//! Built-in custom actions
//!
//! Every session runs these regardless of manifest, tuned from config.

use std::sync::Arc;

use tally_config::Config;
use tally_transform::{
    Action, ComplexConfig, ComplexPropertyAction, OptOutAction, PiiAction, PiiHasher,
    RestrictionAction, RestrictionLimits, ThrottleAction, ThrottleConfig,
};

/// Throttling, opt-out, PII hashing, restrictions and complex serialization
///
/// Returned in registration order; the chain orders them by priority.
pub fn builtin_actions(config: &Config) -> Vec<Arc<dyn Action>> {
    let hasher = Arc::new(match config.pii.hash_key.as_deref() {
        Some(key) => PiiHasher::new(key),
        None => PiiHasher::default(),
    });

    let throttle = config
        .throttle
        .passthrough_events
        .iter()
        .fold(ThrottleConfig::new(), |acc, name| acc.with_passthrough(name));

    let limits = RestrictionLimits::default()
        .with_max_name_length(config.restrictions.max_name_length)
        .with_max_value_length(config.restrictions.max_value_length);

    let complex = ComplexConfig {
        max_length: config.restrictions.max_complex_length,
        max_list_length: config.restrictions.max_list_length,
    };

    vec![
        Arc::new(ThrottleAction::new(throttle)),
        Arc::new(OptOutAction::new()),
        Arc::new(PiiAction::new(Arc::clone(&hasher))),
        Arc::new(RestrictionAction::new(limits)),
        Arc::new(ComplexPropertyAction::new(complex, hasher)),
    ]
}

//! Dispatcher factory - builds any variant behind the common contract

use std::fmt::Debug;
use std::hash::Hash;

use contracts::{Dispatch, DispatchError, DispatcherConfig, Variant};
use tracing::instrument;
use validator::Validate;

use crate::locking::LockingDispatcher;
use crate::prebuilt::PrebuiltDispatcher;
use crate::split_lock::SplitLockDispatcher;

/// Boxed dispatcher of any variant
pub type BoxedDispatcher<K, V> = Box<dyn Dispatch<K, V>>;

/// Create a stopped dispatcher of the requested variant
///
/// # Errors
/// Returns [`DispatchError::ConfigValidation`] if `config` is invalid.
#[instrument(name = "dispatcher_create", skip(config), fields(capacity = config.capacity))]
pub fn create_dispatcher<K, V>(
    variant: Variant,
    config: DispatcherConfig,
) -> Result<BoxedDispatcher<K, V>, DispatchError>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
    V: Send + 'static,
{
    validate_config(&config)?;

    let dispatcher: BoxedDispatcher<K, V> = match variant {
        Variant::Locking => Box::new(LockingDispatcher::new(config)),
        Variant::Prebuilt => Box::new(PrebuiltDispatcher::new(config)),
        Variant::SplitLock => Box::new(SplitLockDispatcher::new(config)),
    };
    Ok(dispatcher)
}

/// Check a dispatcher config, reporting the first failing field
pub fn validate_config(config: &DispatcherConfig) -> Result<(), DispatchError> {
    config.validate().map_err(|errors| {
        let (field, message) = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "invalid value".to_string());
                (field.to_string(), message)
            })
            .unwrap_or_else(|| ("dispatcher".to_string(), errors.to_string()));
        DispatchError::config_validation(field, message)
    })
}

//! Operation handlers keyed by (service, version, operation).
//!
//! The disabled flag is tracked per key, independently of registration, so
//! an operation can be switched off in configuration before its handler is
//! installed. Like the codec registry, the table is an immutable snapshot
//! swapped atomically on every change; a toggle is visible to the next
//! lookup.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use arc_swap::ArcSwap;
use sos_common::{compare_versions, Fault, Operation, OperationKey};
use sos_protocol::{Request, Response};
use tracing::{debug, info};

/// Business logic behind one operation key.
pub trait OperationHandler: Send + Sync {
    fn handle(&self, request: Request) -> Result<Response, Fault>;
}

impl<F> OperationHandler for F
where
    F: Fn(Request) -> Result<Response, Fault> + Send + Sync,
{
    fn handle(&self, request: Request) -> Result<Response, Fault> {
        self(request)
    }
}

/// Outcome of resolving a key.
pub enum Resolution {
    Unknown,
    Disabled,
    Enabled(Arc<dyn OperationHandler>),
}

#[derive(Clone, Default)]
struct TableSnapshot {
    handlers: HashMap<OperationKey, Arc<dyn OperationHandler>>,
    disabled: HashSet<OperationKey>,
}

/// One row of [`OperationTable::entries`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct OperationEntry {
    pub service: String,
    pub version: String,
    pub operation: String,
    pub registered: bool,
    pub enabled: bool,
}

pub struct OperationTable {
    inner: ArcSwap<TableSnapshot>,
}

impl Default for OperationTable {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationTable {
    pub fn new() -> Self {
        Self {
            inner: ArcSwap::from_pointee(TableSnapshot::default()),
        }
    }

    pub fn register(&self, key: OperationKey, handler: Arc<dyn OperationHandler>) {
        let mut replaced = false;
        self.inner.rcu(|current| {
            let mut next = TableSnapshot::clone(current);
            replaced = next.handlers.insert(key.clone(), Arc::clone(&handler)).is_some();
            next
        });
        if replaced {
            debug!(key = %key, "Replaced operation handler");
        }
    }

    pub fn unregister(&self, key: &OperationKey) -> bool {
        let mut removed = false;
        self.inner.rcu(|current| {
            let mut next = TableSnapshot::clone(current);
            removed = next.handlers.remove(key).is_some();
            next
        });
        removed
    }

    pub fn set_enabled(&self, key: &OperationKey, enabled: bool) {
        self.inner.rcu(|current| {
            let mut next = TableSnapshot::clone(current);
            if enabled {
                next.disabled.remove(key);
            } else {
                next.disabled.insert(key.clone());
            }
            next
        });
        info!(key = %key, enabled = enabled, "Operation toggled");
    }

    /// Replace the whole disabled set, e.g. after a configuration reload.
    pub fn replace_disabled(&self, keys: impl IntoIterator<Item = OperationKey>) {
        let disabled: HashSet<OperationKey> = keys.into_iter().collect();
        self.inner.rcu(|current| {
            let mut next = TableSnapshot::clone(current);
            next.disabled = disabled.clone();
            next
        });
    }

    pub fn is_enabled(&self, key: &OperationKey) -> bool {
        let snapshot = self.inner.load();
        snapshot.handlers.contains_key(key) && !snapshot.disabled.contains(key)
    }

    pub fn resolve(&self, key: &OperationKey) -> Resolution {
        let snapshot = self.inner.load();
        match snapshot.handlers.get(key) {
            None => Resolution::Unknown,
            Some(_) if snapshot.disabled.contains(key) => Resolution::Disabled,
            Some(handler) => Resolution::Enabled(Arc::clone(handler)),
        }
    }

    /// Whether any handler is registered for the service.
    pub fn supports_service(&self, service: &str) -> bool {
        self.inner.load().handlers.keys().any(|k| k.service == service)
    }

    /// Whether any handler is registered for the service at this version.
    pub fn knows_version(&self, service: &str, version: &str) -> bool {
        self.inner
            .load()
            .handlers
            .keys()
            .any(|k| k.service == service && k.version == version)
    }

    /// Versions of a service with an enabled GetCapabilities handler,
    /// highest first.
    pub fn supported_versions(&self, service: &str) -> Vec<String> {
        let snapshot = self.inner.load();
        let mut versions: Vec<String> = snapshot
            .handlers
            .keys()
            .filter(|k| {
                k.service == service
                    && k.operation == Operation::GetCapabilities.as_str()
                    && !snapshot.disabled.contains(*k)
            })
            .map(|k| k.version.clone())
            .collect();
        versions.sort_by(|a, b| compare_versions(b, a));
        versions.dedup();
        versions
    }

    /// Registered and disabled keys, sorted.
    pub fn entries(&self) -> Vec<OperationEntry> {
        let snapshot = self.inner.load();
        let keys: BTreeSet<&OperationKey> = snapshot
            .handlers
            .keys()
            .chain(snapshot.disabled.iter())
            .collect();
        keys.into_iter()
            .map(|key| OperationEntry {
                service: key.service.clone(),
                version: key.version.clone(),
                operation: key.operation.clone(),
                registered: snapshot.handlers.contains_key(key),
                enabled: !snapshot.disabled.contains(key),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sos_common::{versions, CodedException, SOS};
    use sos_protocol::responses::DeleteSensorResponse;

    fn ok_handler(request: Request) -> Result<Response, Fault> {
        Ok(Response::new(
            request.service.unwrap_or_default(),
            request.version.unwrap_or_default(),
            DeleteSensorResponse {
                deleted_procedure: "p".to_string(),
            },
        ))
    }

    #[test]
    fn test_resolution_states() {
        let table = OperationTable::new();
        let key = OperationKey::sos(versions::V2_0_0, Operation::DeleteSensor);
        assert!(matches!(table.resolve(&key), Resolution::Unknown));

        table.register(key.clone(), Arc::new(ok_handler));
        assert!(matches!(table.resolve(&key), Resolution::Enabled(_)));

        table.set_enabled(&key, false);
        assert!(matches!(table.resolve(&key), Resolution::Disabled));
        assert!(!table.is_enabled(&key));

        table.set_enabled(&key, true);
        assert!(matches!(table.resolve(&key), Resolution::Enabled(_)));
    }

    #[test]
    fn test_disabled_before_registration() {
        let table = OperationTable::new();
        let key = OperationKey::sos(versions::V2_0_0, Operation::InsertSensor);
        table.set_enabled(&key, false);
        table.register(key.clone(), Arc::new(ok_handler));
        assert!(matches!(table.resolve(&key), Resolution::Disabled));

        let entries = table.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].registered);
        assert!(!entries[0].enabled);
    }

    #[test]
    fn test_last_registration_wins() {
        let table = OperationTable::new();
        let key = OperationKey::sos(versions::V2_0_0, Operation::DeleteSensor);
        table.register(key.clone(), Arc::new(ok_handler));
        table.register(
            key.clone(),
            Arc::new(|_request: Request| -> Result<Response, Fault> {
                Err(CodedException::no_applicable_code("second").into())
            }),
        );

        match table.resolve(&key) {
            Resolution::Enabled(handler) => {
                let fault = handler.handle(Request::new(sos_protocol::requests::DeleteSensorRequest {
                    procedure: "p".to_string(),
                }));
                assert_eq!(fault.unwrap_err().first().text(), "second");
            }
            _ => panic!("handler should be enabled"),
        }
    }

    #[test]
    fn test_supported_versions_sorted_and_enabled_only() {
        let table = OperationTable::new();
        for version in ["1.0.0", "2.0.0", "10.0.0"] {
            table.register(
                OperationKey::new(SOS, version, "GetCapabilities"),
                Arc::new(ok_handler),
            );
        }
        table.set_enabled(&OperationKey::new(SOS, "10.0.0", "GetCapabilities"), false);

        assert_eq!(table.supported_versions(SOS), vec!["2.0.0", "1.0.0"]);
        assert!(table.knows_version(SOS, "10.0.0"));
        assert!(!table.knows_version(SOS, "9.9.9"));
        assert!(table.supports_service(SOS));
        assert!(!table.supports_service("WMS"));
    }

    #[test]
    fn test_replace_disabled() {
        let table = OperationTable::new();
        let a = OperationKey::sos(versions::V2_0_0, Operation::InsertSensor);
        let b = OperationKey::sos(versions::V2_0_0, Operation::DeleteSensor);
        table.register(a.clone(), Arc::new(ok_handler));
        table.register(b.clone(), Arc::new(ok_handler));
        table.set_enabled(&a, false);

        table.replace_disabled([b.clone()]);
        assert!(table.is_enabled(&a));
        assert!(!table.is_enabled(&b));
    }
}

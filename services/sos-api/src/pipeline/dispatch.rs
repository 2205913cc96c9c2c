//! Dispatch stage: typed request to handler to typed response.

use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use sos_common::{CodedException, Fault, FaultHint, FaultPhrases, Operation, OperationKey};
use sos_protocol::requests::{GetCapabilitiesRequest, RequestBody};
use sos_protocol::responses::BatchResponse;
use sos_protocol::{Request, Response};
use tracing::{debug, instrument};

use crate::operation_table::{OperationHandler, OperationTable, Resolution};

/// Resolves operation keys and invokes handlers.
pub struct Dispatcher {
    table: Arc<OperationTable>,
    phrases: ArcSwap<FaultPhrases>,
}

impl Dispatcher {
    pub fn new(table: Arc<OperationTable>, phrases: FaultPhrases) -> Self {
        Self {
            table,
            phrases: ArcSwap::from_pointee(phrases),
        }
    }

    pub fn table(&self) -> &Arc<OperationTable> {
        &self.table
    }

    pub fn set_phrases(&self, phrases: FaultPhrases) {
        self.phrases.store(Arc::new(phrases));
    }

    #[instrument(skip(self, request), fields(operation = %request.operation()))]
    pub fn dispatch(&self, mut request: Request) -> Result<Response, Fault> {
        let operation = request.operation();
        let service = request
            .service
            .clone()
            .ok_or_else(|| CodedException::missing_parameter("service"))?;

        let version = match &request.body {
            RequestBody::GetCapabilities(caps) => {
                let version = self.negotiate_version(&service, request.version.as_deref(), caps)?;
                request.version = Some(version.clone());
                version
            }
            _ => request
                .version
                .clone()
                .ok_or_else(|| CodedException::missing_parameter("version"))?,
        };

        let key = OperationKey::new(service, version, operation.as_str());
        match self.table.resolve(&key) {
            Resolution::Unknown => Err(self.unknown_key(&key)),
            Resolution::Disabled => {
                let phrases = self.phrases.load();
                Err(CodedException::operation_not_supported(
                    operation.as_str(),
                    phrases.operation_not_supported(operation.as_str()),
                )
                .with_hint(FaultHint::OperationDisabled)
                .into())
            }
            Resolution::Enabled(handler) => {
                debug!(key = %key, "Invoking handler");
                handler.handle(request)
            }
        }
    }

    /// Version for a GetCapabilities request.
    ///
    /// An explicit version must be known for the service. Otherwise the
    /// first supported AcceptVersions entry wins, then the highest supported
    /// version.
    fn negotiate_version(
        &self,
        service: &str,
        explicit: Option<&str>,
        request: &GetCapabilitiesRequest,
    ) -> Result<String, Fault> {
        if !self.table.supports_service(service) {
            return Err(unknown_service(service));
        }

        if let Some(version) = explicit {
            if self.table.knows_version(service, version) {
                return Ok(version.to_string());
            }
            return Err(CodedException::version_negotiation_failed(
                "version",
                format!("The version '{}' is not supported by this service", version),
            )
            .into());
        }

        let supported = self.table.supported_versions(service);
        if !request.accept_versions.is_empty() {
            return request
                .accept_versions
                .iter()
                .find(|v| supported.contains(v))
                .cloned()
                .ok_or_else(|| {
                    CodedException::version_negotiation_failed(
                        "AcceptVersions",
                        format!(
                            "None of the accepted versions {:?} is supported; supported versions are {:?}",
                            request.accept_versions, supported
                        ),
                    )
                    .into()
                });
        }

        supported.into_iter().next().ok_or_else(|| {
            CodedException::version_negotiation_failed(
                "AcceptVersions",
                format!("No version of service '{}' is available", service),
            )
            .into()
        })
    }

    fn unknown_key(&self, key: &OperationKey) -> Fault {
        if !self.table.supports_service(&key.service) {
            unknown_service(&key.service)
        } else if !self.table.knows_version(&key.service, &key.version) {
            CodedException::invalid_parameter(
                "version",
                format!(
                    "The version '{}' is not supported for service '{}'",
                    key.version, key.service
                ),
            )
            .into()
        } else {
            CodedException::invalid_parameter(
                "request",
                format!(
                    "The operation '{}' is not supported for {} {}",
                    key.operation, key.service, key.version
                ),
            )
            .into()
        }
    }
}

fn unknown_service(service: &str) -> Fault {
    CodedException::invalid_parameter(
        "service",
        format!("The service '{}' is not supported", service),
    )
    .into()
}

/// Handler for the Batch operation: members run one at a time, in input
/// order, through the same dispatcher.
pub struct BatchExecutor {
    dispatcher: Weak<Dispatcher>,
}

impl BatchExecutor {
    pub fn new(dispatcher: Weak<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

impl OperationHandler for BatchExecutor {
    fn handle(&self, request: Request) -> Result<Response, Fault> {
        let dispatcher = self.dispatcher.upgrade().ok_or_else(|| {
            CodedException::no_applicable_code("The dispatcher is no longer available")
        })?;

        let service = request.service.clone().unwrap_or_default();
        let version = request.version.clone().unwrap_or_default();
        let batch = match request.body {
            RequestBody::Batch(batch) => batch,
            other => {
                return Err(CodedException::invalid_parameter(
                    "request",
                    format!("Expected a Batch request, got {}", other.operation()),
                )
                .into())
            }
        };

        let mut results = Vec::with_capacity(batch.requests.len());
        for mut member in batch.requests {
            if member.service.is_none() {
                member.service = Some(service.clone());
            }
            if member.version.is_none() && member.operation() != Operation::GetCapabilities {
                member.version = Some(version.clone());
            }
            if member.context == Default::default() {
                member.context = request.context.clone();
            }

            let result = dispatcher.dispatch(member);
            let failed = result.is_err();
            results.push(result);
            if failed && batch.stop_at_failure {
                debug!(completed = results.len(), "Batch stopped at failure");
                break;
            }
        }

        Ok(Response::new(service, version, BatchResponse { results }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sos_common::{versions, ExceptionCode, SOS};
    use sos_protocol::requests::{BatchRequest, DeleteSensorRequest};
    use sos_protocol::responses::{CapabilitiesResponse, DeleteSensorResponse, ResponseBody};

    fn capabilities(request: Request) -> Result<Response, Fault> {
        Ok(Response::new(
            SOS,
            request.version.unwrap_or_default(),
            CapabilitiesResponse::default(),
        ))
    }

    fn delete(request: Request) -> Result<Response, Fault> {
        match request.body {
            RequestBody::DeleteSensor(r) if r.procedure == "known" => Ok(Response::new(
                SOS,
                versions::V2_0_0,
                DeleteSensorResponse {
                    deleted_procedure: r.procedure,
                },
            )),
            _ => Err(CodedException::invalid_parameter("procedure", "unknown").into()),
        }
    }

    fn dispatcher() -> Arc<Dispatcher> {
        let table = Arc::new(OperationTable::new());
        table.register(OperationKey::sos(versions::V2_0_0, Operation::GetCapabilities), Arc::new(capabilities));
        table.register(OperationKey::sos(versions::V1_0_0, Operation::GetCapabilities), Arc::new(capabilities));
        table.register(OperationKey::sos(versions::V2_0_0, Operation::DeleteSensor), Arc::new(delete));
        let dispatcher = Arc::new(Dispatcher::new(table, FaultPhrases::default()));
        dispatcher.table().register(
            OperationKey::sos(versions::V2_0_0, Operation::Batch),
            Arc::new(BatchExecutor::new(Arc::downgrade(&dispatcher))),
        );
        dispatcher
    }

    fn get_capabilities(accept_versions: &[&str]) -> Request {
        Request::new(GetCapabilitiesRequest {
            accept_versions: accept_versions.iter().map(|v| v.to_string()).collect(),
            ..Default::default()
        })
        .with_service(SOS)
    }

    fn delete_request(procedure: &str) -> Request {
        Request::new(DeleteSensorRequest {
            procedure: procedure.to_string(),
        })
    }

    #[test]
    fn test_missing_service_then_version() {
        let d = dispatcher();
        let fault = d.dispatch(delete_request("known")).unwrap_err();
        assert_eq!(fault.first().code, ExceptionCode::MissingParameterValue);
        assert_eq!(fault.first().locator.as_deref(), Some("service"));

        let fault = d.dispatch(delete_request("known").with_service(SOS)).unwrap_err();
        assert_eq!(fault.first().locator.as_deref(), Some("version"));
    }

    #[test]
    fn test_accept_versions_negotiation() {
        let d = dispatcher();
        let response = d.dispatch(get_capabilities(&["9.9.9", "2.0.0"])).unwrap();
        assert_eq!(response.version, "2.0.0");

        let response = d.dispatch(get_capabilities(&["1.0.0", "2.0.0"])).unwrap();
        assert_eq!(response.version, "1.0.0");

        let fault = d.dispatch(get_capabilities(&["9.9.9"])).unwrap_err();
        assert_eq!(fault.first().code, ExceptionCode::VersionNegotiationFailed);
        assert_eq!(fault.first().locator.as_deref(), Some("AcceptVersions"));
    }

    #[test]
    fn test_capabilities_defaults_to_highest_version() {
        let d = dispatcher();
        let response = d.dispatch(get_capabilities(&[])).unwrap();
        assert_eq!(response.version, "2.0.0");
    }

    #[test]
    fn test_capabilities_explicit_unknown_version() {
        let d = dispatcher();
        let fault = d
            .dispatch(get_capabilities(&[]).with_version("9.9.9"))
            .unwrap_err();
        assert_eq!(fault.first().code, ExceptionCode::VersionNegotiationFailed);
    }

    #[test]
    fn test_unknown_key_classification() {
        let d = dispatcher();

        let fault = d
            .dispatch(delete_request("known").with_service("WMS").with_version("2.0.0"))
            .unwrap_err();
        assert_eq!(fault.first().locator.as_deref(), Some("service"));

        let fault = d
            .dispatch(delete_request("known").with_service(SOS).with_version("9.9.9"))
            .unwrap_err();
        assert_eq!(fault.first().code, ExceptionCode::InvalidParameterValue);
        assert_eq!(fault.first().locator.as_deref(), Some("version"));

        let fault = d
            .dispatch(delete_request("known").with_service(SOS).with_version("1.0.0"))
            .unwrap_err();
        assert_eq!(fault.first().locator.as_deref(), Some("request"));
    }

    #[test]
    fn test_toggle_is_visible_to_next_dispatch() {
        let d = dispatcher();
        let request = delete_request("known").with_service(SOS).with_version("2.0.0");
        let key = OperationKey::sos(versions::V2_0_0, Operation::DeleteSensor);

        for _ in 0..3 {
            assert!(d.dispatch(request.clone()).is_ok());
        }

        d.table().set_enabled(&key, false);
        let fault = d.dispatch(request.clone()).unwrap_err();
        assert_eq!(fault.first().code, ExceptionCode::OperationNotSupported);
        assert_eq!(fault.first().locator.as_deref(), Some("DeleteSensor"));
        assert_eq!(fault.first().hint, Some(FaultHint::OperationDisabled));
        assert_eq!(
            fault.first().message.as_deref(),
            Some("The requested operation 'DeleteSensor' is not supported by this service")
        );

        d.table().set_enabled(&key, true);
        assert!(d.dispatch(request).is_ok());
    }

    fn batch(stop_at_failure: bool) -> Request {
        Request::new(BatchRequest {
            requests: vec![delete_request("known"), delete_request("unknown"), delete_request("known")],
            stop_at_failure,
        })
        .with_service(SOS)
        .with_version("2.0.0")
    }

    fn batch_results(response: Response) -> BatchResponse {
        match response.body {
            ResponseBody::Batch(batch) => batch,
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[test]
    fn test_batch_stop_at_failure() {
        let d = dispatcher();
        let results = batch_results(d.dispatch(batch(true)).unwrap());
        assert_eq!(results.results.len(), 2);
        assert!(results.results[0].is_ok());
        assert!(results.results[1].is_err());
    }

    #[test]
    fn test_batch_runs_every_member() {
        let d = dispatcher();
        let results = batch_results(d.dispatch(batch(false)).unwrap());
        assert_eq!(results.results.len(), 3);
        assert!(results.results[0].is_ok());
        assert!(results.results[1].is_err());
        assert!(results.results[2].is_ok());
        assert_eq!(results.failures(), 1);
    }

    #[test]
    fn test_disabled_batch() {
        let d = dispatcher();
        d.table()
            .set_enabled(&OperationKey::sos(versions::V2_0_0, Operation::Batch), false);
        let fault = d.dispatch(batch(false)).unwrap_err();
        assert_eq!(fault.first().code, ExceptionCode::OperationNotSupported);
    }
}

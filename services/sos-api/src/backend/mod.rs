//! Reference operation handlers over the in-memory store.

pub mod store;

use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use chrono::SecondsFormat;
use sos_common::{versions, CodedException, Fault, Operation, OperationKey, SOS};
use sos_protocol::requests::{
    DescribeSensorRequest, GetCapabilitiesRequest, GetObservationRequest, GetResultRequest,
    InsertSensorRequest, OptionsRequest,
};
use sos_protocol::responses::{
    CapabilitiesResponse, DeleteSensorResponse, DescribeSensorResponse, FeatureCollection,
    GetResultResponse, InsertObservationResponse, InsertSensorResponse, ObservationsResponse,
    Offering, OperationMetadata, OptionsResponse, ResponseBody, ServiceIdentification,
    TimePeriod, UpdateSensorDescriptionResponse,
};
use sos_protocol::{Request, RequestBody, Response};
use tracing::{debug, info};

pub use store::{InMemoryStore, ObservationQuery, SensorRecord, StoreError};

use crate::operation_table::{OperationHandler, OperationTable};
use crate::pipeline::{BatchExecutor, Dispatcher};

/// Operations served for SOS 1.0.0.
const V1_OPERATIONS: [Operation; 3] = [
    Operation::GetCapabilities,
    Operation::DescribeSensor,
    Operation::GetObservation,
];

/// Service metadata shown in capabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceInfo {
    pub title: String,
    pub abstract_text: Option<String>,
    pub base_url: String,
}

/// Handler for every operation except Batch.
pub struct SosBackend {
    store: Arc<InMemoryStore>,
    table: Weak<OperationTable>,
    info: ArcSwap<ServiceInfo>,
}

impl SosBackend {
    pub fn new(store: Arc<InMemoryStore>, table: Weak<OperationTable>, info: ServiceInfo) -> Self {
        Self {
            store,
            table,
            info: ArcSwap::from_pointee(info),
        }
    }

    pub fn set_info(&self, info: ServiceInfo) {
        self.info.store(Arc::new(info));
    }

    fn capabilities(&self, version: &str, request: &GetCapabilitiesRequest) -> Result<CapabilitiesResponse, Fault> {
        let info = self.info.load();
        let table = self.table.upgrade();
        let mut caps = CapabilitiesResponse::default();

        if request.wants_section("ServiceIdentification") {
            caps.service_identification = Some(ServiceIdentification {
                title: info.title.clone(),
                abstract_text: info.abstract_text.clone(),
                service_type: "OGC:SOS".to_string(),
                service_type_versions: table
                    .as_ref()
                    .map(|t| t.supported_versions(SOS))
                    .unwrap_or_default(),
            });
        }

        if request.wants_section("OperationsMetadata") {
            let href = format!("{}/service", info.base_url.trim_end_matches('/'));
            // Options is only reachable through the REST binding
            let operations = Operation::ALL
                .iter()
                .filter(|op| **op != Operation::Options)
                .filter(|op| {
                    table
                        .as_ref()
                        .map_or(false, |t| t.is_enabled(&OperationKey::sos(version, **op)))
                })
                .map(|op| OperationMetadata {
                    name: op.as_str().to_string(),
                    href: href.clone(),
                })
                .collect();
            caps.operations_metadata = Some(operations);
        }

        if request.wants_section("Contents") {
            let mut offerings = Vec::new();
            for sensor in self.store.sensors()? {
                let phenomenon_time = self
                    .store
                    .time_span(&sensor.procedure)?
                    .map(|(begin, end)| TimePeriod { begin, end });
                offerings.push(Offering {
                    identifier: sensor.offering,
                    procedure: sensor.procedure,
                    observable_properties: sensor.observable_properties,
                    phenomenon_time,
                });
            }
            caps.contents = Some(offerings);
        }

        Ok(caps)
    }

    fn describe_sensor(&self, request: &DescribeSensorRequest) -> Result<DescribeSensorResponse, Fault> {
        let sensor = self.store.sensor(&request.procedure)?;
        Ok(DescribeSensorResponse {
            procedure: sensor.procedure,
            procedure_description_format: request
                .procedure_description_format
                .clone()
                .unwrap_or(sensor.format),
            description: sensor.description,
        })
    }

    fn get_observation(&self, request: GetObservationRequest) -> Result<ObservationsResponse, Fault> {
        let query = ObservationQuery {
            offerings: request.offerings,
            procedures: request.procedures,
            observed_properties: request.observed_properties,
            features: request.features_of_interest,
            temporal_filter: request.temporal_filter,
        };
        let observations = self.store.observations(&query)?;
        debug!(count = observations.len(), "Observations selected");
        Ok(ObservationsResponse { observations })
    }

    fn get_observation_by_id(&self, ids: &[String]) -> Result<ObservationsResponse, Fault> {
        let observations = self.store.observations_by_id(ids)?;
        if let Some(missing) = ids
            .iter()
            .find(|id| !observations.iter().any(|o| o.identifier.as_deref() == Some(id.as_str())))
        {
            return Err(CodedException::invalid_parameter(
                "observation",
                format!("The observation '{}' does not exist", missing),
            )
            .into());
        }
        Ok(ObservationsResponse { observations })
    }

    fn insert_sensor(&self, request: InsertSensorRequest) -> Result<InsertSensorResponse, Fault> {
        let procedure = request
            .procedure
            .unwrap_or_else(|| format!("urn:sos:procedure:{}", uuid::Uuid::new_v4()));
        let offering = format!("{}-offering", procedure);
        self.store.insert_sensor(SensorRecord {
            procedure: procedure.clone(),
            offering: offering.clone(),
            format: request.procedure_description_format,
            description: request.procedure_description,
            observable_properties: request.observable_properties,
        })?;
        info!(procedure = %procedure, "Sensor inserted");
        Ok(InsertSensorResponse {
            assigned_procedure: procedure,
            assigned_offering: offering,
        })
    }

    fn get_result(&self, request: &GetResultRequest) -> Result<GetResultResponse, Fault> {
        let procedures: Vec<String> = self
            .store
            .sensors()?
            .into_iter()
            .filter(|s| s.offering == request.offering)
            .map(|s| s.procedure)
            .collect();
        if procedures.is_empty() {
            return Err(CodedException::invalid_parameter(
                "offering",
                format!("The offering '{}' does not exist", request.offering),
            )
            .into());
        }

        let query = ObservationQuery {
            procedures,
            observed_properties: vec![request.observed_property.clone()],
            features: request.features_of_interest.clone(),
            temporal_filter: request.temporal_filter.clone(),
            ..Default::default()
        };
        let result_values = self
            .store
            .observations(&query)?
            .iter()
            .map(|o| {
                format!(
                    "{},{}",
                    o.phenomenon_time.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                    o.result
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        Ok(GetResultResponse { result_values })
    }
}

impl OperationHandler for SosBackend {
    fn handle(&self, request: Request) -> Result<Response, Fault> {
        let service = request.service.unwrap_or_else(|| SOS.to_string());
        let version = request.version.unwrap_or_default();

        let body: ResponseBody = match request.body {
            RequestBody::GetCapabilities(r) => self.capabilities(&version, &r)?.into(),
            RequestBody::DescribeSensor(r) => self.describe_sensor(&r)?.into(),
            RequestBody::GetObservation(r) => ResponseBody::GetObservation(self.get_observation(r)?),
            RequestBody::GetObservationById(r) => {
                ResponseBody::GetObservationById(self.get_observation_by_id(&r.observation_ids)?)
            }
            RequestBody::InsertObservation(r) => InsertObservationResponse {
                observation_ids: self.store.insert_observations(r.observations)?,
            }
            .into(),
            RequestBody::InsertSensor(r) => self.insert_sensor(r)?.into(),
            RequestBody::UpdateSensorDescription(r) => {
                self.store.update_description(
                    &r.procedure,
                    &r.procedure_description_format,
                    &r.description,
                )?;
                UpdateSensorDescriptionResponse {
                    updated_procedure: r.procedure,
                }
                .into()
            }
            RequestBody::DeleteSensor(r) => {
                let removed = self.store.delete_sensor(&r.procedure)?;
                info!(procedure = %r.procedure, observations = removed, "Sensor deleted");
                DeleteSensorResponse {
                    deleted_procedure: r.procedure,
                }
                .into()
            }
            RequestBody::GetResult(r) => self.get_result(&r)?.into(),
            RequestBody::GetFeatureOfInterest(r) => FeatureCollection {
                features: self.store.features(
                    &r.feature_ids,
                    &r.procedures,
                    &r.observed_properties,
                )?,
            }
            .into(),
            RequestBody::Options(r) => options(r).into(),
            RequestBody::Batch(_) => {
                return Err(CodedException::no_applicable_code(
                    "Batch requests are executed by the batch handler",
                )
                .into())
            }
        };

        Ok(Response {
            service,
            version,
            extensions: request.extensions,
            links: Vec::new(),
            body,
        })
    }
}

fn options(request: OptionsRequest) -> OptionsResponse {
    let mut methods = request.methods;
    if !methods.iter().any(|m| m == "OPTIONS") {
        methods.push("OPTIONS".to_string());
    }
    OptionsResponse {
        resource: request.resource,
        methods,
    }
}

/// Register the backend for SOS 2.0.0 (every operation) and 1.0.0 (core
/// operations), plus the batch handler.
pub fn register(table: &Arc<OperationTable>, dispatcher: &Arc<Dispatcher>, backend: Arc<SosBackend>) {
    for op in Operation::ALL {
        let key = OperationKey::sos(versions::V2_0_0, op);
        if op == Operation::Batch {
            table.register(key, Arc::new(BatchExecutor::new(Arc::downgrade(dispatcher))));
        } else {
            table.register(key, backend.clone());
        }
    }
    for op in V1_OPERATIONS {
        table.register(OperationKey::sos(versions::V1_0_0, op), backend.clone());
    }
}

//! In-memory sensor and observation store.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use sos_common::{CodedException, Fault};
use sos_protocol::{Feature, Observation, TemporalFilter};
use thiserror::Error;

/// Store errors, mapped onto exception reports by [`From<StoreError>`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("The procedure '{0}' is already registered")]
    DuplicateSensor(String),

    #[error("The procedure '{0}' is not registered")]
    UnknownSensor(String),

    #[error("Store lock poisoned")]
    Poisoned,
}

impl From<StoreError> for Fault {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::DuplicateSensor(_) | StoreError::UnknownSensor(_) => {
                CodedException::invalid_parameter("procedure", err.to_string()).into()
            }
            StoreError::Poisoned => CodedException::no_applicable_code(err.to_string()).into(),
        }
    }
}

/// A registered sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorRecord {
    pub procedure: String,
    pub offering: String,
    pub format: String,
    pub description: String,
    pub observable_properties: Vec<String>,
}

/// Observation selection; empty lists match everything.
#[derive(Debug, Clone, Default)]
pub struct ObservationQuery {
    pub offerings: Vec<String>,
    pub procedures: Vec<String>,
    pub observed_properties: Vec<String>,
    pub features: Vec<String>,
    pub temporal_filter: Option<TemporalFilter>,
}

fn matches(filter: &[String], value: &str) -> bool {
    filter.is_empty() || filter.iter().any(|f| f == value)
}

#[derive(Debug, Default)]
struct Inner {
    sensors: BTreeMap<String, SensorRecord>,
    observations: Vec<Observation>,
    features: BTreeMap<String, Feature>,
    next_id: u64,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }

    pub fn sensors(&self) -> Result<Vec<SensorRecord>, StoreError> {
        Ok(self.read()?.sensors.values().cloned().collect())
    }

    pub fn sensor(&self, procedure: &str) -> Result<SensorRecord, StoreError> {
        self.read()?
            .sensors
            .get(procedure)
            .cloned()
            .ok_or_else(|| StoreError::UnknownSensor(procedure.to_string()))
    }

    pub fn insert_sensor(&self, record: SensorRecord) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if inner.sensors.contains_key(&record.procedure) {
            return Err(StoreError::DuplicateSensor(record.procedure));
        }
        inner.sensors.insert(record.procedure.clone(), record);
        Ok(())
    }

    pub fn update_description(
        &self,
        procedure: &str,
        format: &str,
        description: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        let record = inner
            .sensors
            .get_mut(procedure)
            .ok_or_else(|| StoreError::UnknownSensor(procedure.to_string()))?;
        record.format = format.to_string();
        record.description = description.to_string();
        Ok(())
    }

    /// Remove a sensor and its observations. Returns the number of
    /// observations removed.
    pub fn delete_sensor(&self, procedure: &str) -> Result<usize, StoreError> {
        let mut inner = self.write()?;
        if inner.sensors.remove(procedure).is_none() {
            return Err(StoreError::UnknownSensor(procedure.to_string()));
        }
        let before = inner.observations.len();
        inner.observations.retain(|o| o.procedure != procedure);
        Ok(before - inner.observations.len())
    }

    /// Insert observations, all or nothing. Every procedure must be
    /// registered. Returns the assigned identifiers in input order.
    pub fn insert_observations(&self, observations: Vec<Observation>) -> Result<Vec<String>, StoreError> {
        let mut inner = self.write()?;
        if let Some(unknown) = observations
            .iter()
            .find(|o| !inner.sensors.contains_key(&o.procedure))
        {
            return Err(StoreError::UnknownSensor(unknown.procedure.clone()));
        }

        let mut ids = Vec::with_capacity(observations.len());
        for mut observation in observations {
            inner.next_id += 1;
            let id = format!("o_{}", inner.next_id);
            observation.identifier = Some(id.clone());

            let feature = observation.feature_of_interest.clone();
            inner
                .features
                .entry(feature.clone())
                .or_insert_with(|| Feature::new(feature));

            if let Some(sensor) = inner.sensors.get_mut(&observation.procedure) {
                if !sensor.observable_properties.contains(&observation.observed_property) {
                    sensor
                        .observable_properties
                        .push(observation.observed_property.clone());
                }
            }

            inner.observations.push(observation);
            ids.push(id);
        }
        Ok(ids)
    }

    pub fn observations(&self, query: &ObservationQuery) -> Result<Vec<Observation>, StoreError> {
        let inner = self.read()?;
        let offered: Vec<String> = inner
            .sensors
            .values()
            .filter(|s| query.offerings.contains(&s.offering))
            .map(|s| s.procedure.clone())
            .collect();

        Ok(inner
            .observations
            .iter()
            .filter(|o| query.offerings.is_empty() || offered.contains(&o.procedure))
            .filter(|o| matches(&query.procedures, &o.procedure))
            .filter(|o| matches(&query.observed_properties, &o.observed_property))
            .filter(|o| matches(&query.features, &o.feature_of_interest))
            .filter(|o| {
                query
                    .temporal_filter
                    .as_ref()
                    .map_or(true, |f| f.contains(&o.phenomenon_time))
            })
            .cloned()
            .collect())
    }

    pub fn observations_by_id(&self, ids: &[String]) -> Result<Vec<Observation>, StoreError> {
        let inner = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| {
                inner
                    .observations
                    .iter()
                    .find(|o| o.identifier.as_deref() == Some(id.as_str()))
                    .cloned()
            })
            .collect())
    }

    /// Features by identifier, or those observed by the given procedures
    /// and properties.
    pub fn features(
        &self,
        ids: &[String],
        procedures: &[String],
        observed_properties: &[String],
    ) -> Result<Vec<Feature>, StoreError> {
        let inner = self.read()?;
        Ok(inner
            .features
            .values()
            .filter(|f| matches(ids, &f.identifier))
            .filter(|f| {
                (procedures.is_empty() && observed_properties.is_empty())
                    || inner.observations.iter().any(|o| {
                        o.feature_of_interest == f.identifier
                            && matches(procedures, &o.procedure)
                            && matches(observed_properties, &o.observed_property)
                    })
            })
            .cloned()
            .collect())
    }

    /// First and last phenomenon time of a procedure's observations.
    pub fn time_span(&self, procedure: &str) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, StoreError> {
        let inner = self.read()?;
        let times = inner
            .observations
            .iter()
            .filter(|o| o.procedure == procedure)
            .map(|o| o.phenomenon_time);
        Ok(times.fold(None, |span, t| match span {
            None => Some((t, t)),
            Some((begin, end)) => Some((begin.min(t), end.max(t))),
        }))
    }
}

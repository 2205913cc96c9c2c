//! Operation names known to the service.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// SOS operations. Names are matched case-sensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Operation {
    GetCapabilities,
    DescribeSensor,
    GetObservation,
    GetObservationById,
    InsertObservation,
    InsertSensor,
    UpdateSensorDescription,
    DeleteSensor,
    GetResult,
    GetFeatureOfInterest,
    Batch,
    /// Allowed methods of a REST resource.
    Options,
}

/// Raised when a request names an operation outside [`Operation::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown operation '{0}'")]
pub struct UnknownOperation(pub String);

impl Operation {
    pub const ALL: [Operation; 12] = [
        Operation::GetCapabilities,
        Operation::DescribeSensor,
        Operation::GetObservation,
        Operation::GetObservationById,
        Operation::InsertObservation,
        Operation::InsertSensor,
        Operation::UpdateSensorDescription,
        Operation::DeleteSensor,
        Operation::GetResult,
        Operation::GetFeatureOfInterest,
        Operation::Batch,
        Operation::Options,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::GetCapabilities => "GetCapabilities",
            Operation::DescribeSensor => "DescribeSensor",
            Operation::GetObservation => "GetObservation",
            Operation::GetObservationById => "GetObservationById",
            Operation::InsertObservation => "InsertObservation",
            Operation::InsertSensor => "InsertSensor",
            Operation::UpdateSensorDescription => "UpdateSensorDescription",
            Operation::DeleteSensor => "DeleteSensor",
            Operation::GetResult => "GetResult",
            Operation::GetFeatureOfInterest => "GetFeatureOfInterest",
            Operation::Batch => "Batch",
            Operation::Options => "Options",
        }
    }

    /// Operations that modify server state.
    pub fn is_transactional(&self) -> bool {
        matches!(
            self,
            Operation::InsertObservation
                | Operation::InsertSensor
                | Operation::UpdateSensorDescription
                | Operation::DeleteSensor
        )
    }
}

impl FromStr for Operation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| UnknownOperation(s.to_string()))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_names() {
        for op in Operation::ALL {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
        }
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        let err = "getobservation".parse::<Operation>().unwrap_err();
        assert_eq!(err, UnknownOperation("getobservation".to_string()));
        assert!("Frobnicate".parse::<Operation>().is_err());
    }

    #[test]
    fn test_transactional_operations() {
        assert!(Operation::InsertSensor.is_transactional());
        assert!(Operation::DeleteSensor.is_transactional());
        assert!(!Operation::GetObservation.is_transactional());
        assert!(!Operation::Batch.is_transactional());
        assert!(!Operation::Options.is_transactional());
    }
}

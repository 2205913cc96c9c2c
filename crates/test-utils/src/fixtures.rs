//! Common test fixtures for sensor-sos tests.
//!
//! This module provides request documents and identifiers for the usual
//! scenarios: a single sensor measuring air temperature at one station.

/// Identifiers used across fixtures.
pub mod ids {
    pub const PROCEDURE: &str = "urn:ogc:object:sensor:test:thermometer-1";
    pub const OFFERING: &str = "urn:ogc:object:sensor:test:thermometer-1-offering";
    pub const OBSERVED_PROPERTY: &str = "http://example.org/property/air_temperature";
    pub const FEATURE: &str = "urn:ogc:object:feature:station-1";
}

/// Common time values for testing.
pub mod time {
    /// A fixed reference time for tests (2024-01-15T12:00:00Z)
    pub const REFERENCE_TIME: &str = "2024-01-15T12:00:00Z";

    /// Period covering the reference time.
    pub const PERIOD: &str = "om:phenomenonTime,2024-01-15T00:00:00Z/2024-01-16T00:00:00Z";

    /// Period that excludes the reference time.
    pub const EMPTY_PERIOD: &str = "om:phenomenonTime,2020-01-01T00:00:00Z/2020-01-02T00:00:00Z";
}

/// KVP parameter sets.
pub mod kvp {
    pub const GET_CAPABILITIES: &[(&str, &str)] = &[("service", "SOS"), ("request", "GetCapabilities")];

    pub const GET_OBSERVATION: &[(&str, &str)] = &[
        ("service", "SOS"),
        ("version", "2.0.0"),
        ("request", "GetObservation"),
        ("responseFormat", "http://www.opengis.net/om/2.0"),
    ];

    pub const DESCRIBE_SENSOR: &[(&str, &str)] = &[
        ("service", "SOS"),
        ("version", "2.0.0"),
        ("request", "DescribeSensor"),
        ("procedure", super::ids::PROCEDURE),
        ("procedureDescriptionFormat", "http://www.opengis.net/sensorml/2.0"),
    ];

    /// Converts parameters to a query string (values are not encoded).
    pub fn to_query_string(params: &[(&str, &str)]) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// SensorML descriptions.
pub mod sensorml {
    pub const PHYSICAL_SYSTEM: &str = r#"<sml:PhysicalSystem gml:id="thermometer-1" xmlns:sml="http://www.opengis.net/sensorml/2.0" xmlns:gml="http://www.opengis.net/gml/3.2"><gml:identifier codeSpace="uniqueID">urn:ogc:object:sensor:test:thermometer-1</gml:identifier></sml:PhysicalSystem>"#;
}

/// POX request documents.
pub mod pox {
    pub const GET_CAPABILITIES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sos:GetCapabilities service="SOS"
    xmlns:sos="http://www.opengis.net/sos/2.0"
    xmlns:ows="http://www.opengis.net/ows/1.1">
  <ows:AcceptVersions>
    <ows:Version>9.9.9</ows:Version>
    <ows:Version>2.0.0</ows:Version>
  </ows:AcceptVersions>
</sos:GetCapabilities>"#;

    pub const INSERT_SENSOR: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<swes:InsertSensor service="SOS" version="2.0.0"
    xmlns:swes="http://www.opengis.net/swes/2.0"
    xmlns:sml="http://www.opengis.net/sensorml/2.0"
    xmlns:gml="http://www.opengis.net/gml/3.2">
  <swes:procedureDescriptionFormat>http://www.opengis.net/sensorml/2.0</swes:procedureDescriptionFormat>
  <swes:procedureDescription>
    <sml:PhysicalSystem gml:id="thermometer-1">
      <gml:identifier codeSpace="uniqueID">urn:ogc:object:sensor:test:thermometer-1</gml:identifier>
    </sml:PhysicalSystem>
  </swes:procedureDescription>
  <swes:observableProperty>http://example.org/property/air_temperature</swes:observableProperty>
</swes:InsertSensor>"#;

    pub const INSERT_OBSERVATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sos:InsertObservation service="SOS" version="2.0.0"
    xmlns:sos="http://www.opengis.net/sos/2.0"
    xmlns:om="http://www.opengis.net/om/2.0"
    xmlns:gml="http://www.opengis.net/gml/3.2"
    xmlns:xlink="http://www.w3.org/1999/xlink">
  <sos:offering>urn:ogc:object:sensor:test:thermometer-1-offering</sos:offering>
  <sos:observation>
    <om:OM_Observation gml:id="obs-1">
      <om:phenomenonTime>
        <gml:TimeInstant gml:id="t1">
          <gml:timePosition>2024-01-15T12:00:00Z</gml:timePosition>
        </gml:TimeInstant>
      </om:phenomenonTime>
      <om:procedure xlink:href="urn:ogc:object:sensor:test:thermometer-1"/>
      <om:observedProperty xlink:href="http://example.org/property/air_temperature"/>
      <om:featureOfInterest xlink:href="urn:ogc:object:feature:station-1"/>
      <om:result uom="Cel">21.5</om:result>
    </om:OM_Observation>
  </sos:observation>
</sos:InsertObservation>"#;

    pub const GET_OBSERVATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sos:GetObservation service="SOS" version="2.0.0"
    xmlns:sos="http://www.opengis.net/sos/2.0">
  <sos:procedure>urn:ogc:object:sensor:test:thermometer-1</sos:procedure>
</sos:GetObservation>"#;

    /// Root element in a namespace no decoder is registered for.
    pub const UNKNOWN_NAMESPACE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<x:GetObservation service="SOS" version="2.0.0" xmlns:x="http://example.org/not-sos"/>"#;

    pub const MALFORMED: &str = "<sos:GetObservation xmlns:sos=\"http://www.opengis.net/sos/2.0\">";
}

/// SOAP envelopes.
pub mod soap {
    pub const GET_CAPABILITIES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope"
              xmlns:wsa="http://www.w3.org/2005/08/addressing">
  <env:Header>
    <wsa:To>http://localhost:8080/service</wsa:To>
    <wsa:MessageID>urn:uuid:5f2a0c1e-0000-4000-8000-000000000001</wsa:MessageID>
  </env:Header>
  <env:Body>
    <sos:GetCapabilities service="SOS" xmlns:sos="http://www.opengis.net/sos/2.0"/>
  </env:Body>
</env:Envelope>"#;

    pub const DESCRIBE_UNKNOWN_VERSION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope">
  <env:Body>
    <swes:DescribeSensor service="SOS" version="9.9.9" xmlns:swes="http://www.opengis.net/swes/2.0">
      <swes:procedure>urn:ogc:object:sensor:test:thermometer-1</swes:procedure>
    </swes:DescribeSensor>
  </env:Body>
</env:Envelope>"#;

    /// The same request in a SOAP 1.1 envelope.
    pub const DESCRIBE_UNKNOWN_VERSION_11: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <swes:DescribeSensor service="SOS" version="9.9.9" xmlns:swes="http://www.opengis.net/swes/2.0">
      <swes:procedure>urn:ogc:object:sensor:test:thermometer-1</swes:procedure>
    </swes:DescribeSensor>
  </soap:Body>
</soap:Envelope>"#;
}

/// JSON request documents.
pub mod json {
    pub const DELETE_SENSOR: &str = r#"{
  "service": "SOS",
  "version": "2.0.0",
  "request": "DeleteSensor",
  "procedure": "urn:ogc:object:sensor:test:thermometer-1"
}"#;

    /// Three members; the second fails with an unknown procedure.
    pub fn batch(stop_at_failure: bool) -> String {
        format!(
            r#"{{
  "service": "SOS",
  "version": "2.0.0",
  "request": "Batch",
  "stopAtFailure": {},
  "requests": [
    {{"request": "GetCapabilities", "sections": ["ServiceIdentification"]}},
    {{"request": "DescribeSensor", "procedure": "urn:unknown"}},
    {{"request": "GetFeatureOfInterest"}}
  ]
}}"#,
            stop_at_failure
        )
    }
}

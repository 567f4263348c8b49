use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::Environment;

pub const TEST_RECEPTION_URL: &str =
    "https://celcer.sri.gob.ec/comprobantes-electronicos-ws/RecepcionComprobantesOffline?wsdl";
pub const TEST_AUTHORIZATION_URL: &str =
    "https://celcer.sri.gob.ec/comprobantes-electronicos-ws/AutorizacionComprobantesOffline?wsdl";
pub const PRODUCTION_RECEPTION_URL: &str =
    "https://cel.sri.gob.ec/comprobantes-electronicos-ws/RecepcionComprobantesOffline?wsdl";
pub const PRODUCTION_AUTHORIZATION_URL: &str =
    "https://cel.sri.gob.ec/comprobantes-electronicos-ws/AutorizacionComprobantesOffline?wsdl";

/// Default network timeout for SRI calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Reception and authorization URLs of one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointPair {
    pub reception: String,
    pub authorization: String,
}

impl EndpointPair {
    pub fn new(reception: impl Into<String>, authorization: impl Into<String>) -> Self {
        Self {
            reception: reception.into(),
            authorization: authorization.into(),
        }
    }
}

/// Endpoint table keyed by environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SriEndpoints {
    pub test: EndpointPair,
    pub production: EndpointPair,
}

impl Default for SriEndpoints {
    fn default() -> Self {
        Self {
            test: EndpointPair::new(TEST_RECEPTION_URL, TEST_AUTHORIZATION_URL),
            production: EndpointPair::new(PRODUCTION_RECEPTION_URL, PRODUCTION_AUTHORIZATION_URL),
        }
    }
}

impl SriEndpoints {
    pub fn for_environment(&self, environment: Environment) -> &EndpointPair {
        match environment {
            Environment::Test => &self.test,
            Environment::Production => &self.production,
        }
    }
}

/// What the gateway does when a call fails at the transport or parse level.
///
/// Business rejections are never affected by this policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportFailurePolicy {
    /// Return the error to the caller.
    #[default]
    PropagateError,
    /// Pretend the call succeeded and flag the result as simulated.
    /// Only honoured in the test environment.
    SynthesizeSuccess,
}

/// Immutable gateway configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub environment: Environment,
    pub endpoints: SriEndpoints,
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    pub on_transport_failure: TransportFailurePolicy,
}

impl GatewayConfig {
    /// Official endpoints, 30 s timeout, errors propagated.
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            endpoints: SriEndpoints::default(),
            timeout: DEFAULT_TIMEOUT,
            on_transport_failure: TransportFailurePolicy::PropagateError,
        }
    }

    pub fn with_endpoints(mut self, endpoints: SriEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_transport_failure_policy(mut self, policy: TransportFailurePolicy) -> Self {
        self.on_transport_failure = policy;
        self
    }

    /// The policy actually applied: production always propagates.
    pub fn effective_policy(&self) -> TransportFailurePolicy {
        match self.environment {
            Environment::Production => TransportFailurePolicy::PropagateError,
            Environment::Test => self.on_transport_failure,
        }
    }

    pub fn endpoints(&self) -> &EndpointPair {
        self.endpoints.for_environment(self.environment)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

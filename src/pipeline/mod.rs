//! End-to-end submission of one invoice: access key, XML, signature,
//! reception and bounded authorization polling.
//!
//! Each call to [`InvoicePipeline::process`] is independent. The pipeline
//! holds no per-invoice state, so concurrent submissions for different
//! documents may share one pipeline.

mod state;

pub use state::SubmissionState;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::{
    AccessKey, AccessKeyGenerator, Environment, InvoiceDocument, RejectionStage, SriError,
    attach_access_key, verify_access_key,
};
use crate::gateway::{AuthorizationResult, AuthorizationState, SoapTransport, SriGateway};
use crate::signing::{CertificateProvider, XadesSigner};
use crate::xml::to_factura_xml;

/// How long and how often to ask for the authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Total authorization queries, at least one is always made.
    pub max_attempts: u32,
    /// Wait between reception and the first query.
    #[serde(with = "duration_millis")]
    pub initial_delay: Duration,
    /// Wait between consecutive queries.
    #[serde(with = "duration_millis")]
    pub retry_delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(3),
            retry_delay: Duration::from_secs(3),
        }
    }
}

impl PollPolicy {
    /// No waiting at all. Useful against fakes.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            retry_delay: Duration::ZERO,
        }
    }
}

/// Signed document ready for transmission.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub access_key: AccessKey,
    pub signed_xml: String,
}

/// Result of a submission that was not rejected.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub access_key: AccessKey,
    /// Signed XML for archival.
    pub signed_xml: String,
    /// `Authorized`, or `InProcess` when the poll budget ran out.
    pub state: SubmissionState,
    pub authorization: Option<AuthorizationResult>,
    /// Some SRI answer along the way was synthesized.
    pub simulated: bool,
}

impl SubmissionOutcome {
    pub fn is_authorized(&self) -> bool {
        self.state == SubmissionState::Authorized
    }

    pub fn is_pending(&self) -> bool {
        self.state == SubmissionState::InProcess
    }
}

/// Key generator, signer and gateway wired together.
pub struct InvoicePipeline<P, T> {
    generator: AccessKeyGenerator,
    signer: XadesSigner<P>,
    gateway: SriGateway<T>,
    poll: PollPolicy,
}

impl<P, T> std::fmt::Debug for InvoicePipeline<P, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvoicePipeline")
            .field("poll", &self.poll)
            .finish_non_exhaustive()
    }
}

impl<P: CertificateProvider, T: SoapTransport> InvoicePipeline<P, T> {
    pub fn new(signer: XadesSigner<P>, gateway: SriGateway<T>) -> Self {
        Self {
            generator: AccessKeyGenerator::new(),
            signer,
            gateway,
            poll: PollPolicy::default(),
        }
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn gateway(&self) -> &SriGateway<T> {
        &self.gateway
    }

    /// Attach an access key (unless the document already carries one),
    /// serialize and sign.
    ///
    /// The document must target the gateway's environment, and a key it
    /// already carries must describe it.
    pub fn prepare(&self, doc: &mut InvoiceDocument) -> Result<PreparedDocument, SriError> {
        self.check_environment(doc.tax_info.environment)?;
        verify_access_key(doc)?;
        let access_key = match doc.tax_info.access_key.clone() {
            Some(key) => key,
            None => attach_access_key(doc, &self.generator)?,
        };
        info!(
            access_key = %access_key,
            number = %doc.document_number(),
            "access key attached"
        );

        let xml = to_factura_xml(doc)?;
        let signed_xml = self.signer.sign(&xml)?;
        debug!(access_key = %access_key, bytes = signed_xml.len(), "document signed");

        Ok(PreparedDocument {
            access_key,
            signed_xml,
        })
    }

    /// Run the whole lifecycle for one document.
    ///
    /// A document still `EN PROCESO` after the poll budget is returned as
    /// `Ok` with [`SubmissionState::InProcess`]. Rejections at either stage
    /// are [`SriError::Rejected`] with the SRI messages.
    pub async fn process(&self, mut doc: InvoiceDocument) -> Result<SubmissionOutcome, SriError> {
        let mut state = SubmissionState::initial();
        let prepared = self.prepare(&mut doc)?;
        state = state.transition(SubmissionState::Signed)?;

        state = state.transition(SubmissionState::Submitted)?;
        let reception = self.gateway.send_receipt(&prepared.signed_xml).await?;
        if !reception.is_received() {
            state = state.transition(SubmissionState::RejectedAtReception)?;
            warn!(access_key = %prepared.access_key, %state, "document returned by SRI reception");
            return Err(SriError::Rejected {
                stage: RejectionStage::Reception,
                messages: reception.messages,
            });
        }
        state = state.transition(SubmissionState::Received)?;

        let (state, authorization) = self
            .poll_authorization(&prepared.access_key, state)
            .await?;

        let simulated = reception.simulated || authorization.simulated;
        Ok(SubmissionOutcome {
            access_key: prepared.access_key,
            signed_xml: prepared.signed_xml,
            state,
            authorization: Some(authorization),
            simulated,
        })
    }

    /// Ask for the authorization of an already received document until it
    /// is decided or the poll budget is spent.
    pub async fn authorize(&self, access_key: &AccessKey) -> Result<AuthorizationResult, SriError> {
        self.check_environment(access_key.components()?.environment)?;
        let (_, result) = self
            .poll_authorization(access_key, SubmissionState::Received)
            .await?;
        Ok(result)
    }

    fn check_environment(&self, environment: Environment) -> Result<(), SriError> {
        let gateway = self.gateway.config().environment;
        if environment == gateway {
            return Ok(());
        }
        Err(SriError::Validation(format!(
            "document targets the {environment} environment but the gateway is configured for {gateway}"
        )))
    }

    async fn poll_authorization(
        &self,
        access_key: &AccessKey,
        mut state: SubmissionState,
    ) -> Result<(SubmissionState, AuthorizationResult), SriError> {
        let attempts = self.poll.max_attempts.max(1);
        tokio::time::sleep(self.poll.initial_delay).await;

        let mut attempt = 1;
        loop {
            state = state.transition(SubmissionState::AuthorizationRequested)?;
            debug!(access_key = %access_key, attempt, attempts, "requesting authorization");
            let result = self.gateway.authorize(access_key.as_str()).await?;

            match result.status {
                AuthorizationState::Authorized => {
                    state = state.transition(SubmissionState::Authorized)?;
                    info!(
                        access_key = %access_key,
                        simulated = result.simulated,
                        "invoice authorized"
                    );
                    return Ok((state, result));
                }
                AuthorizationState::Rejected => {
                    state = state.transition(SubmissionState::RejectedAtAuthorization)?;
                    warn!(access_key = %access_key, %state, "invoice not authorized");
                    return Err(SriError::Rejected {
                        stage: RejectionStage::Authorization,
                        messages: result.messages,
                    });
                }
                AuthorizationState::InProcess => {
                    state = state.transition(SubmissionState::InProcess)?;
                    if attempt >= attempts {
                        info!(access_key = %access_key, attempts, "authorization still pending");
                        return Ok((state, result));
                    }
                }
            }

            attempt += 1;
            tokio::time::sleep(self.poll.retry_delay).await;
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_poll_policy() {
        let p = PollPolicy::default();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.initial_delay, Duration::from_secs(3));
    }

    #[test]
    fn poll_policy_serializes_millis() {
        let json = serde_json::to_value(PollPolicy::default()).unwrap();
        assert_eq!(json["retry_delay"], 3000);
    }
}

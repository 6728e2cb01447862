//! Query → completer → extraction → validation → outcome.
//!
//! Each request runs through the stages of [`PipelineStage`] exactly once.
//! The completer call is the only await point and runs under a hard
//! deadline; nothing is shared between requests except the read-only
//! provider, clock and settings.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::dates::{normalize_date, Clock};
use super::extract::{parse_extraction, ExtractError};
use super::prompt::build_request;
use super::validate::{cross_check_city, missing_fields, provided, resolve_cabin};
use super::{BookingPayload, ExtractionResult, ParseOutcome, PartialBooking, Segment};
use crate::config::{BookingConfig, Config};
use crate::providers::{LlmProvider, ProviderError, StopReason};

/// Pipeline failures. Unresolvable dates are not failures; they surface as
/// an incomplete outcome instead.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Request had no query text.
    #[error("Missing 'query'")]
    MissingQuery,
    /// Completer output held no usable JSON object.
    #[error("Invalid JSON in model output")]
    MalformedModelOutput(#[source] ExtractError),
    /// Completer call failed.
    #[error("completer call failed: {0}")]
    Completer(#[from] ProviderError),
    /// Completer did not answer before the deadline.
    #[error("completer did not respond within {}s", .0.as_secs())]
    CompleterTimeout(Duration),
}

/// Processing stages, used for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Query accepted.
    Received,
    /// Waiting on the completer.
    Extracting,
    /// Model output decoded.
    Extracted,
    /// Cross-checking fields and normalising dates.
    Validating,
    /// Required fields missing; clarification returned.
    Incomplete,
    /// Payload built.
    Complete,
    /// Request failed.
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Extracting => "extracting",
            Self::Extracted => "extracted",
            Self::Validating => "validating",
            Self::Incomplete => "incomplete",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tunables for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Completer deadline.
    pub timeout: Duration,
    /// Sampling temperature passed to the completer.
    pub temperature: Option<f32>,
    /// Token cap passed to the completer.
    pub max_tokens: Option<u32>,
    /// Cabin normalisation.
    pub booking: BookingConfig,
}

impl PipelineSettings {
    /// Settings from the loaded config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: config.model.timeout(),
            temperature: config.model.temperature,
            max_tokens: config.model.max_tokens,
            booking: config.booking.clone(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Stateless booking-query processor.
#[derive(Clone)]
pub struct BookingPipeline {
    provider: Arc<dyn LlmProvider>,
    clock: Arc<dyn Clock>,
    settings: PipelineSettings,
}

impl BookingPipeline {
    /// Create a pipeline over a completer and a clock.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        clock: Arc<dyn Clock>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            provider,
            clock,
            settings,
        }
    }

    /// Model spec of the underlying completer.
    pub fn model_id(&self) -> &str {
        self.provider.model_id()
    }

    /// Process one query.
    ///
    /// # Errors
    ///
    /// [`PipelineError::MissingQuery`] for blank input,
    /// [`PipelineError::MalformedModelOutput`] when the reply has no usable
    /// JSON, and completer transport or deadline failures.
    pub async fn parse(&self, query: &str) -> Result<ParseOutcome, PipelineError> {
        let result = self.run(query).await;
        if let Err(e) = &result {
            warn!(stage = %PipelineStage::Failed, error = %e, "booking query failed");
        }
        result
    }

    async fn run(&self, query: &str) -> Result<ParseOutcome, PipelineError> {
        if query.trim().is_empty() {
            return Err(PipelineError::MissingQuery);
        }
        debug!(stage = %PipelineStage::Received, query_len = query.len());

        debug!(stage = %PipelineStage::Extracting, model = %self.provider.model_id());
        let request = build_request(query, self.settings.temperature, self.settings.max_tokens);
        let response = tokio::time::timeout(self.settings.timeout, self.provider.complete(request))
            .await
            .map_err(|_| PipelineError::CompleterTimeout(self.settings.timeout))??;
        if response.stop_reason == StopReason::MaxTokens {
            warn!(model = %response.model, "completer hit the token limit, output may be cut");
        }

        let extraction =
            parse_extraction(&response.text).map_err(PipelineError::MalformedModelOutput)?;
        debug!(stage = %PipelineStage::Extracted);

        debug!(stage = %PipelineStage::Validating);
        let today = self.clock.today();
        let outcome = assemble(extraction, query, today, &self.settings.booking);
        match &outcome {
            ParseOutcome::Complete { payload } => info!(
                stage = %PipelineStage::Complete,
                segments = payload.segments.len(),
                "booking query resolved"
            ),
            ParseOutcome::Incomplete { missing_fields, .. } => info!(
                stage = %PipelineStage::Incomplete,
                missing = ?missing_fields,
                "booking query needs clarification"
            ),
        }
        Ok(outcome)
    }
}

/// Turn an extraction into an outcome. Pure; `today` anchors relative dates.
///
/// The departure date is resolved against `today`, the return date against
/// the resolved departure date.
pub fn assemble(
    extraction: ExtractionResult,
    query: &str,
    today: NaiveDate,
    booking: &BookingConfig,
) -> ParseOutcome {
    let from = provided(cross_check_city(extraction.from, query, "from"));
    let to = provided(cross_check_city(extraction.to, query, "to"));
    let depdate_raw = provided(extraction.depdate);

    let depdate = depdate_raw
        .as_deref()
        .and_then(|phrase| normalize_date(phrase, today));
    let retdate = match (provided(extraction.retdate), depdate) {
        (Some(phrase), Some(departure)) => normalize_date(&phrase, departure),
        _ => None,
    };

    let missing = missing_fields(from.as_deref(), to.as_deref(), depdate_raw.as_deref(), depdate);
    let (depfrom, arrto, depdate) = match (from, to, depdate) {
        (Some(depfrom), Some(arrto), Some(depdate)) if missing.is_empty() => {
            (depfrom, arrto, depdate)
        }
        (from, to, _) => {
            return ParseOutcome::incomplete(
                missing,
                PartialBooking {
                    from,
                    to,
                    depdate: depdate_raw,
                },
            )
        }
    };

    let outbound = Segment {
        depfrom,
        arrto,
        depdate,
    };
    let inbound = retdate.map(|date| outbound.reversed(date));
    let mut segments = vec![outbound];
    segments.extend(inbound);

    ParseOutcome::Complete {
        payload: BookingPayload {
            adults: extraction.adults,
            children: extraction.children,
            infants: extraction.infants,
            cabin: resolve_cabin(&extraction.cabin, booking),
            stops: false,
            airline_include: provided(extraction.airline_include).unwrap_or_default(),
            ages: Vec::new(),
            segments,
        },
    }
}

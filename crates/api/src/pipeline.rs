//! The ingestion pipeline.
//!
//! One [`Pipeline`] is built at startup and shared by every request. It owns
//! the rate limiter and the broadcaster, so there is no ambient global state
//! on the hot path apart from metrics.
//!
//! Per request: rate gate, then for each NDJSON line authorize, derive
//! identity, enrich, score and build a record. Everything accepted is written
//! in one store transaction, then a summary is offered to live viewers.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use beacon_core::host::{host_of, path_of};
use beacon_core::limits::{
    truncate, MAX_ERROR_MESSAGE_LEN, MAX_LABEL_LEN, MAX_PATH_LEN, MAX_PROPS_BYTES, MAX_STACK_LEN,
    MAX_URL_LEN,
};
use beacon_core::scoring::{accept_language_signal, classify};
use beacon_core::{
    BotSignal, Enricher, Enrichment, Error, ErrorRecord, Event, EventType, FeatureGate, Features,
    IdentityGenerator, IncomingLine, PerformanceSample, RecordBatch, RecordContext, RecordKind,
    Result, SkipReason, ScoreInput,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlite_store::{RecordStore, SiteRegistry};
use telemetry::metrics;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::authorize::{AdmittedSite, SiteAuthorizer};
use crate::broadcast::Broadcaster;
use crate::extractors::RequestHeaders;
use crate::middleware::rate_limit::{RateLimitConfig, RateLimiter, SharedRateLimiter};

/// Default live-stream buffer per subscriber.
pub const DEFAULT_STREAM_BUFFER: usize = 64;

/// One ingestion request, owned so it can outlive the HTTP connection.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub body: Bytes,
    pub client_ip: String,
    pub headers: RequestHeaders,
    pub received_at: DateTime<Utc>,
}

/// What happened to the lines of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestCounts {
    /// Non-blank lines seen
    pub lines: usize,
    pub events: usize,
    pub performance: usize,
    pub errors: usize,
    /// Skipped lines by reason
    pub skipped: BTreeMap<&'static str, usize>,
}

impl IngestCounts {
    pub fn accepted(&self) -> usize {
        self.events + self.performance + self.errors
    }

    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped.get(reason.as_str()).copied().unwrap_or(0)
    }

    fn skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason.as_str()).or_default() += 1;
    }

    fn accept(&mut self, kind: RecordKind) {
        match kind {
            RecordKind::Event => self.events += 1,
            RecordKind::Performance => self.performance += 1,
            RecordKind::Error => self.errors += 1,
        }
    }
}

/// Values shared by every line of one request.
struct RequestContext<'a> {
    request: &'a IngestRequest,
    session_id: String,
    enrichment: Enrichment,
    extra_signals: Vec<BotSignal>,
    bootstrap: bool,
}

/// Ingestion pipeline shared by all handlers.
pub struct Pipeline {
    store: Arc<dyn RecordStore>,
    authorizer: SiteAuthorizer,
    identity: IdentityGenerator,
    enricher: Enricher,
    features: Arc<dyn FeatureGate>,
    rate_limiter: SharedRateLimiter,
    broadcaster: Arc<Broadcaster>,
}

impl Pipeline {
    /// Pipeline with default limits, flags and enrichment.
    pub fn new(store: Arc<dyn RecordStore>, registry: Arc<dyn SiteRegistry>) -> Self {
        Self {
            store,
            authorizer: SiteAuthorizer::new(registry),
            identity: IdentityGenerator::new(Uuid::new_v4().simple().to_string(), 30),
            enricher: Enricher::default(),
            features: Arc::new(Features::default()),
            rate_limiter: Arc::new(RateLimiter::new(RateLimitConfig::default())),
            broadcaster: Arc::new(Broadcaster::new(DEFAULT_STREAM_BUFFER)),
        }
    }

    pub fn with_identity(mut self, identity: IdentityGenerator) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_enricher(mut self, enricher: Enricher) -> Self {
        self.enricher = enricher;
        self
    }

    pub fn with_features(mut self, features: Arc<dyn FeatureGate>) -> Self {
        self.features = features;
        self
    }

    pub fn with_rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limiter = Arc::new(RateLimiter::new(config));
        self
    }

    pub fn with_stream_buffer(mut self, buffer: usize) -> Self {
        self.broadcaster = Arc::new(Broadcaster::new(buffer));
        self
    }

    pub fn rate_limiter(&self) -> &SharedRateLimiter {
        &self.rate_limiter
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// Rate gate for one client key.
    pub fn admit(&self, client_key: &str) -> Result<()> {
        if self.rate_limiter.allow(client_key) {
            return Ok(());
        }
        metrics().rate_limited_requests.inc();
        let retry_after = self.rate_limiter.retry_after(client_key);
        debug!(retry_after, "Client rate limited");
        Err(Error::rate_limit(
            format!(
                "Rate limit exceeded: {} requests per {}s",
                self.rate_limiter.config().requests,
                self.rate_limiter.config().window.as_secs()
            ),
            Some(retry_after),
        ))
    }

    /// Parse, persist and publish one request.
    ///
    /// Line-level problems are counted and skipped. Store failures fail the
    /// whole request with nothing committed.
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestCounts> {
        let start = Instant::now();
        let (batch, counts) = self.parse_batch(&request).await?;

        if !batch.is_empty() {
            self.store.insert_batch(&batch).await?;

            let delivered = self.broadcaster.publish(&batch.summary());
            debug!(delivered, "Published batch summary");
        }

        metrics().events_accepted.inc_by(counts.events as u64);
        metrics().performance_accepted.inc_by(counts.performance as u64);
        metrics().errors_accepted.inc_by(counts.errors as u64);
        metrics().ingest_latency_ms.observe_duration(start.elapsed());

        info!(
            lines = counts.lines,
            events = counts.events,
            performance = counts.performance,
            errors = counts.errors,
            skipped = counts.skipped_total(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Batch processed"
        );

        Ok(counts)
    }

    /// Decode every line of the body into records. Nothing is written.
    pub async fn parse_batch(&self, request: &IngestRequest) -> Result<(RecordBatch, IngestCounts)> {
        let user_agent = request.headers.user_agent.as_str();
        let ctx = RequestContext {
            request,
            session_id: self
                .identity
                .session_id_at(&request.client_ip, user_agent, request.received_at),
            enrichment: self.enricher.enrich(&request.client_ip, user_agent),
            extra_signals: accept_language_signal(request.headers.accept_language.as_deref())
                .into_iter()
                .collect(),
            bootstrap: self.authorizer.bootstrap_mode().await?,
        };

        let mut batch = RecordBatch::new();
        let mut counts = IngestCounts::default();

        for raw in request.body.split(|b| *b == b'\n') {
            if raw.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            counts.lines += 1;

            match self.process_line(raw, &ctx, &mut batch).await? {
                Ok(kind) => counts.accept(kind),
                Err(reason) => {
                    debug!(reason = %reason, "Skipped line");
                    counts.skip(reason);
                }
            }
        }

        metrics().lines_received.inc_by(counts.lines as u64);
        metrics().lines_skipped.inc_by(counts.skipped_total() as u64);
        for (reason, n) in &counts.skipped {
            metrics().lines_skipped_by_reason.inc_by(*reason, *n as u64);
        }

        Ok((batch, counts))
    }

    async fn process_line(
        &self,
        raw: &[u8],
        ctx: &RequestContext<'_>,
        batch: &mut RecordBatch,
    ) -> Result<std::result::Result<RecordKind, SkipReason>> {
        let line = match IncomingLine::parse(raw) {
            Ok(line) => line,
            Err(reason) => return Ok(Err(reason)),
        };

        let kind = line.kind();
        if !self.features.accepts(kind) {
            return Ok(Err(SkipReason::FeatureDisabled));
        }

        let admitted = match self
            .authorizer
            .authorize(
                line.site_id.as_deref(),
                ctx.request.headers.origin_host.as_deref(),
                ctx.bootstrap,
            )
            .await?
        {
            Ok(site) => site,
            Err(reason) => return Ok(Err(reason)),
        };

        let context = self.record_context(&line, &admitted, ctx);
        match kind {
            RecordKind::Event => batch.events.push(build_event(line, context, ctx)),
            RecordKind::Performance => match build_performance(line, context) {
                Ok(sample) => batch.performance.push(sample),
                Err(reason) => return Ok(Err(reason)),
            },
            RecordKind::Error => batch.errors.push(build_error(line, context)),
        }

        Ok(Ok(kind))
    }

    fn record_context(
        &self,
        line: &IncomingLine,
        admitted: &AdmittedSite,
        ctx: &RequestContext<'_>,
    ) -> RecordContext {
        let request = ctx.request;
        let url = truncate(line.url.clone().unwrap_or_default(), MAX_URL_LEN);
        let path = match line.path.as_deref() {
            Some(path) if !path.is_empty() => path.to_string(),
            _ => path_of(&url),
        };

        let domain = match admitted {
            AdmittedSite::Bootstrap(domain) if domain == "unknown" => {
                host_of(&url).unwrap_or_else(|| domain.clone())
            }
            other => other.domain().to_string(),
        };

        RecordContext {
            timestamp: request.received_at,
            session_id: ctx.session_id.clone(),
            visitor_hash: self.identity.visitor_hash(
                line.visitor_hash.as_deref(),
                &request.client_ip,
                &request.headers.user_agent,
            ),
            domain,
            url,
            path: truncate(path, MAX_PATH_LEN),
        }
    }
}

fn build_event(line: IncomingLine, context: RecordContext, ctx: &RequestContext<'_>) -> Event {
    let verdict = classify(
        ScoreInput {
            user_agent: &ctx.request.headers.user_agent,
            client: line.signals.as_ref(),
            datacenter_ip: ctx.enrichment.datacenter_ip,
            extra: &ctx.extra_signals,
        },
        &context.path,
    );
    if verdict.is_bot() {
        metrics().bots_detected.inc();
    }

    let event_type = EventType::from_client(line.event_type.as_deref());
    let name = match event_type {
        EventType::Custom => line
            .name
            .clone()
            .or_else(|| line.event_type.clone())
            .map(|n| truncate(n, MAX_LABEL_LEN)),
        _ => None,
    };

    let props = line
        .props
        .as_ref()
        .and_then(|p| serde_json::to_string(p).ok())
        .filter(|p| p.len() <= MAX_PROPS_BYTES);

    Event {
        id: Uuid::new_v4(),
        event_type,
        geo: ctx.enrichment.geo.clone(),
        client: ctx.enrichment.client.clone(),
        is_bot: verdict.is_bot(),
        bot_score: verdict.score,
        bot_category: verdict.category,
        bot_signals: verdict.signals,
        behavior: line.behavior.map(Into::into).unwrap_or_default(),
        click_x: finite(line.click_x),
        click_y: finite(line.click_y),
        scroll_depth: finite(line.scroll_depth).map(|d| d.clamp(0.0, 100.0)),
        duration: finite(line.duration)
            .filter(|d| *d >= 0.0)
            .map(|d| d.round() as i64),
        referrer: line.referrer.clone().map(|r| truncate(r, MAX_URL_LEN)),
        utm: label_utm(&line),
        name,
        props,
        context,
    }
}

fn build_performance(
    line: IncomingLine,
    context: RecordContext,
) -> std::result::Result<PerformanceSample, SkipReason> {
    let sample = PerformanceSample {
        id: Uuid::new_v4(),
        context,
        lcp: line.lcp,
        cls: line.cls,
        fcp: line.fcp,
        ttfb: line.ttfb,
        inp: line.inp,
        page_load_time: line.page_load_time,
        connection_type: line.connection_type.map(|c| truncate(c, MAX_LABEL_LEN)),
    };
    sample.validate().map_err(|_| SkipReason::InvalidMetrics)?;
    Ok(sample)
}

fn build_error(line: IncomingLine, context: RecordContext) -> ErrorRecord {
    ErrorRecord {
        id: Uuid::new_v4(),
        context,
        error_type: truncate(
            line.error_type.filter(|t| !t.is_empty()).unwrap_or_else(|| "Error".into()),
            MAX_LABEL_LEN,
        ),
        message: truncate(line.message.unwrap_or_default(), MAX_ERROR_MESSAGE_LEN),
        stack: line.stack.map(|s| truncate(s, MAX_STACK_LEN)),
        script_url: line.script_url.map(|u| truncate(u, MAX_URL_LEN)),
        line: line.line,
        col: line.col,
        error_hash: line.error_hash.map(|h| truncate(h, MAX_LABEL_LEN)),
    }
}

fn label_utm(line: &IncomingLine) -> beacon_core::Utm {
    let mut utm = line.utm();
    for field in [
        &mut utm.source,
        &mut utm.medium,
        &mut utm.campaign,
        &mut utm.term,
        &mut utm.content,
    ] {
        *field = field.take().map(|v| truncate(v, MAX_LABEL_LEN));
    }
    utm
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Start the rate limiter sweep. Runs every `period` until aborted.
pub fn start_rate_limiter_cleanup(limiter: SharedRateLimiter, period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let evicted = limiter.cleanup_stale();
            if evicted > 0 {
                debug!(evicted, remaining = limiter.len(), "Swept rate limiter");
            }
        }
    })
}

//! Transactional batch writes.

use std::time::Instant;

use async_trait::async_trait;
use beacon_core::{ErrorRecord, Event, PerformanceSample, RecordBatch, Result};
use sqlx::{Sqlite, Transaction};
use telemetry::metrics;
use tracing::{debug, error};

use crate::client::{store_error, SqliteStore};

/// Durable sink for one request's records.
///
/// `insert_batch` commits every record in the batch or none of them.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert_batch(&self, batch: &RecordBatch) -> Result<()>;
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn insert_batch(&self, batch: &RecordBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let start = Instant::now();
        let result = self.write_batch(batch).await;
        metrics().store_latency_ms.observe_duration(start.elapsed());

        match &result {
            Ok(()) => {
                metrics().store_batches.inc();
                debug!(
                    events = batch.events.len(),
                    performance = batch.performance.len(),
                    errors = batch.errors.len(),
                    "Committed batch"
                );
            }
            Err(e) => {
                metrics().store_insert_errors.inc();
                error!(error = %e, records = batch.len(), "Batch insert failed, rolled back");
            }
        }

        result
    }
}

impl SqliteStore {
    async fn write_batch(&self, batch: &RecordBatch) -> Result<()> {
        let mut tx = self.pool().begin().await.map_err(store_error)?;

        // Any early return drops `tx`, which rolls back.
        for event in &batch.events {
            insert_event(&mut tx, event).await?;
        }
        for sample in &batch.performance {
            insert_performance(&mut tx, sample).await?;
        }
        for record in &batch.errors {
            insert_error(&mut tx, record).await?;
        }

        tx.commit().await.map_err(store_error)
    }
}

async fn insert_event(tx: &mut Transaction<'_, Sqlite>, event: &Event) -> Result<()> {
    let ctx = &event.context;
    sqlx::query(
        r#"INSERT INTO events (
            id, timestamp, event_type, session_id, visitor_hash, domain, url, path,
            country, region, city, latitude, longitude,
            browser, browser_version, os, device,
            is_bot, bot_score, bot_category, bot_signals,
            mouse_moved, scrolled, keyboard_used,
            click_x, click_y, scroll_depth, duration, referrer,
            utm_source, utm_medium, utm_campaign, utm_term, utm_content,
            name, props
        ) VALUES (
            ?, ?, ?, ?, ?, ?, ?, ?,
            ?, ?, ?, ?, ?,
            ?, ?, ?, ?,
            ?, ?, ?, ?,
            ?, ?, ?,
            ?, ?, ?, ?, ?,
            ?, ?, ?, ?, ?,
            ?, ?
        )"#,
    )
    .bind(event.id.to_string())
    .bind(ctx.timestamp.timestamp_millis())
    .bind(event.event_type.as_str())
    .bind(&ctx.session_id)
    .bind(&ctx.visitor_hash)
    .bind(&ctx.domain)
    .bind(&ctx.url)
    .bind(&ctx.path)
    .bind(&event.geo.country)
    .bind(&event.geo.region)
    .bind(&event.geo.city)
    .bind(event.geo.latitude)
    .bind(event.geo.longitude)
    .bind(&event.client.browser)
    .bind(&event.client.browser_version)
    .bind(&event.client.os)
    .bind(&event.client.device)
    .bind(event.is_bot)
    .bind(i64::from(event.bot_score))
    .bind(event.bot_category.as_str())
    .bind(event.bot_signals_json())
    .bind(event.behavior.mouse_moved)
    .bind(event.behavior.scrolled)
    .bind(event.behavior.keyboard_used)
    .bind(event.click_x)
    .bind(event.click_y)
    .bind(event.scroll_depth)
    .bind(event.duration)
    .bind(&event.referrer)
    .bind(&event.utm.source)
    .bind(&event.utm.medium)
    .bind(&event.utm.campaign)
    .bind(&event.utm.term)
    .bind(&event.utm.content)
    .bind(&event.name)
    .bind(&event.props)
    .execute(&mut **tx)
    .await
    .map_err(store_error)?;
    Ok(())
}

async fn insert_performance(tx: &mut Transaction<'_, Sqlite>, sample: &PerformanceSample) -> Result<()> {
    let ctx = &sample.context;
    sqlx::query(
        r#"INSERT INTO performance (
            id, timestamp, session_id, visitor_hash, domain, url, path,
            lcp, cls, fcp, ttfb, inp, page_load_time, connection_type
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(sample.id.to_string())
    .bind(ctx.timestamp.timestamp_millis())
    .bind(&ctx.session_id)
    .bind(&ctx.visitor_hash)
    .bind(&ctx.domain)
    .bind(&ctx.url)
    .bind(&ctx.path)
    .bind(sample.lcp)
    .bind(sample.cls)
    .bind(sample.fcp)
    .bind(sample.ttfb)
    .bind(sample.inp)
    .bind(sample.page_load_time)
    .bind(&sample.connection_type)
    .execute(&mut **tx)
    .await
    .map_err(store_error)?;
    Ok(())
}

async fn insert_error(tx: &mut Transaction<'_, Sqlite>, record: &ErrorRecord) -> Result<()> {
    let ctx = &record.context;
    sqlx::query(
        r#"INSERT INTO errors (
            id, timestamp, session_id, visitor_hash, domain, url, path,
            error_type, message, stack, script_url, line, col, error_hash
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(record.id.to_string())
    .bind(ctx.timestamp.timestamp_millis())
    .bind(&ctx.session_id)
    .bind(&ctx.visitor_hash)
    .bind(&ctx.domain)
    .bind(&ctx.url)
    .bind(&ctx.path)
    .bind(&record.error_type)
    .bind(&record.message)
    .bind(&record.stack)
    .bind(&record.script_url)
    .bind(record.line)
    .bind(record.col)
    .bind(&record.error_hash)
    .execute(&mut **tx)
    .await
    .map_err(store_error)?;
    Ok(())
}

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use ghostline_context::{extract, normalize_for_match, CursorContext};
use ghostline_protocol::{InlineCompletion, PredictionKind, PredictionStatus};
use ghostline_providers::{FimProvider, FimRequest, ProviderError};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::BoundedCache;
use crate::classify::{classify, CompletionOptions};
use crate::config::EngineConfig;
use crate::matchup::{matchup, Matchup};
use crate::postprocess::{postprocess, strip_code_fence};
use crate::prediction::Prediction;

/// Per-document prediction state: the bounded cache plus the timestamps
/// driving debounce supersession and multi-line chaining.
struct DocumentPredictions {
    cache: BoundedCache<u64, Arc<Prediction>>,
    last_keystroke: Option<Instant>,
    last_accept: Option<Instant>,
}

impl DocumentPredictions {
    fn new(capacity: usize) -> Self {
        Self {
            cache: BoundedCache::new(capacity, |_id, prediction: &mut Arc<Prediction>| {
                prediction.dispose();
            }),
            last_keystroke: None,
            last_accept: None,
        }
    }

    fn pending_count(&self) -> usize {
        self.cache
            .iter()
            .filter(|(_, p)| p.status() == PredictionStatus::Pending)
            .count()
    }

    /// Oldest pending prediction id, if any. Iteration is most-recent
    /// first, so the last pending entry is the oldest.
    fn oldest_pending(&self) -> Option<u64> {
        self.cache
            .iter()
            .filter(|(_, p)| p.status() == PredictionStatus::Pending)
            .map(|(id, _)| *id)
            .last()
    }
}

/// The prediction lifecycle orchestrator.
///
/// Owns a per-document map of cached predictions; side effects are
/// confined to that map and to issuing/cancelling provider requests. The
/// engine only returns candidate insertions for the editor to apply — it
/// never mutates the buffer. All steady-state failures degrade to "no
/// completion this time"; nothing here surfaces an error to the user.
pub struct CompletionEngine {
    config: EngineConfig,
    provider: Arc<dyn FimProvider>,
    documents: Mutex<HashMap<String, DocumentPredictions>>,
    next_id: AtomicU64,
}

impl CompletionEngine {
    pub fn new(config: EngineConfig, provider: Arc<dyn FimProvider>) -> Self {
        Self {
            config,
            provider,
            documents: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Produce a completion for the cursor at `offset` in `text`, or none.
    ///
    /// Checks the document's cache first; on a miss, debounces, classifies,
    /// and issues a fresh provider request. Awaits the result inline while
    /// leaving the prediction cached for future keystrokes.
    pub async fn provide_completion(
        &self,
        document: &str,
        text: &str,
        offset: usize,
    ) -> Option<InlineCompletion> {
        if !self.config.enabled {
            return None;
        }
        let ctx = extract(text, offset);
        let keystroke = Instant::now();

        if let Some(hit) = self.scan_cache(document, &ctx, keystroke).await {
            return self.resolve_hit(document, hit, &ctx).await;
        }

        // Quiet period. A newer keystroke overwrites the stamp; the stale
        // wait then resolves to "typing happened" and exits cleanly.
        tokio::time::sleep(self.config.debounce()).await;
        {
            let documents = self.documents.lock().await;
            let doc = documents.get(document)?;
            if doc.last_keystroke != Some(keystroke) {
                debug!(document, "debounce superseded by newer keystroke");
                return None;
            }
        }

        let options = {
            let documents = self.documents.lock().await;
            let doc = documents.get(document)?;
            let accepted_recently = doc
                .last_accept
                .is_some_and(|at| at.elapsed() < self.config.accept_chain_window());
            classify(&ctx, accepted_recently, self.config.context_window_lines)
        };
        if !options.should_generate {
            debug!(document, "classifier declined to predict");
            return None;
        }

        let prediction = self.issue_request(document, &ctx, options).await;
        let status = prediction.await_terminal().await;
        match status {
            PredictionStatus::Finished => {
                let snapshot = prediction.snapshot();
                info!(
                    document,
                    id = prediction.id,
                    latency_ms = prediction.latency().map(|l| l.as_millis() as u64),
                    "prediction finished"
                );
                let fresh = Matchup {
                    start_line: 0,
                    start_character: ctx.cursor_character(),
                    start_index: 0,
                };
                self.completion_from(&fresh, &prediction, &snapshot.inserted_text, &ctx)
            }
            _ => {
                debug!(document, id = prediction.id, "prediction failed, evicting");
                self.evict(document, prediction.id).await;
                None
            }
        }
    }

    /// Notify the engine that previously shown completions are gone.
    ///
    /// Acceptance is detected by comparing the buffer's new prefix against
    /// stored prefix + inserted text under match normalization. An accepted
    /// prediction is evicted and arms multi-line chaining; dismissed ones
    /// simply age out of the cache. Returns the accepted prediction id, if
    /// any.
    pub async fn free_completion(
        &self,
        document: &str,
        text: &str,
        offset: usize,
    ) -> Option<u64> {
        let ctx = extract(text, offset);
        let current = normalize_for_match(&ctx.prefix);

        let mut documents = self.documents.lock().await;
        let doc = documents.get_mut(document)?;
        let accepted = doc.cache.iter().find_map(|(id, prediction)| {
            let snapshot = prediction.snapshot();
            if snapshot.status != PredictionStatus::Finished
                || snapshot.inserted_text.is_empty()
            {
                return None;
            }
            let full = format!("{}{}", prediction.prefix, snapshot.inserted_text);
            if normalize_for_match(&full) == current {
                return Some(*id);
            }
            // Postprocessing may have shown less than the stored insertion
            // (forced single line, bracket truncation); compare against
            // what was actually on screen as well.
            (snapshot.shown_prefix.as_deref() == Some(current.as_str())).then_some(*id)
        });

        if let Some(id) = accepted {
            info!(document, id, "completion accepted");
            doc.last_accept = Some(Instant::now());
            doc.cache.delete(&id);
        }
        accepted
    }

    /// Drop all state for a closed document, cancelling any in-flight
    /// requests through the cache disposal hook.
    pub async fn document_closed(&self, document: &str) {
        let mut documents = self.documents.lock().await;
        if let Some(mut doc) = documents.remove(document) {
            debug!(document, entries = doc.cache.len(), "document closed");
            doc.cache.clear();
        }
    }

    /// Scan the document's cache for a prediction the current prefix is
    /// still consistent with. Also records the keystroke timestamp.
    async fn scan_cache(
        &self,
        document: &str,
        ctx: &CursorContext,
        keystroke: Instant,
    ) -> Option<(Arc<Prediction>, Matchup)> {
        let mut documents = self.documents.lock().await;
        let doc = documents
            .entry(document.to_string())
            .or_insert_with(|| DocumentPredictions::new(self.config.cache_capacity));
        doc.last_keystroke = Some(keystroke);

        let hit = doc.cache.iter().find_map(|(id, prediction)| {
            let snapshot = prediction.snapshot();
            matchup(&ctx.prefix, &prediction.prefix, &snapshot.inserted_text)
                .map(|m| (*id, prediction.clone(), m))
        });

        hit.map(|(id, prediction, m)| {
            // Promote the hit so it is the last to age out.
            let _ = doc.cache.get(&id);
            (prediction, m)
        })
    }

    async fn resolve_hit(
        &self,
        document: &str,
        (prediction, m): (Arc<Prediction>, Matchup),
        ctx: &CursorContext,
    ) -> Option<InlineCompletion> {
        match prediction.status() {
            PredictionStatus::Finished => {
                debug!(document, id = prediction.id, "cache hit (finished)");
                let snapshot = prediction.snapshot();
                self.completion_from(&m, &prediction, &snapshot.inserted_text, ctx)
            }
            PredictionStatus::Pending => {
                debug!(document, id = prediction.id, "cache hit (pending), awaiting");
                match prediction.await_terminal().await {
                    PredictionStatus::Finished => {
                        let snapshot = prediction.snapshot();
                        // The prefix has not changed while awaiting (a newer
                        // keystroke runs its own provide_completion call), so
                        // the matchup still holds — but recompute to pick up
                        // the now-present inserted text.
                        let m = matchup(&ctx.prefix, &prediction.prefix, &snapshot.inserted_text)?;
                        self.completion_from(&m, &prediction, &snapshot.inserted_text, ctx)
                    }
                    _ => {
                        self.evict(document, prediction.id).await;
                        None
                    }
                }
            }
            PredictionStatus::Error => {
                // Stale failures are not retried automatically; the next
                // keystroke starts fresh.
                debug!(document, id = prediction.id, "cache hit on errored prediction");
                None
            }
        }
    }

    /// Create a pending prediction, cache it (enforcing the max-pending
    /// bound first) and dispatch the provider request on a separate task so
    /// it runs to completion even if this caller goes away.
    async fn issue_request(
        &self,
        document: &str,
        ctx: &CursorContext,
        options: CompletionOptions,
    ) -> Arc<Prediction> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let prediction = Arc::new(Prediction::new(
            id,
            ctx.prefix.clone(),
            ctx.suffix.clone(),
            options.model_prefix.clone(),
            options.model_suffix.clone(),
            options.kind,
            self.config.request_timeout(),
        ));

        {
            let mut documents = self.documents.lock().await;
            let doc = documents
                .entry(document.to_string())
                .or_insert_with(|| DocumentPredictions::new(self.config.cache_capacity));
            while doc.pending_count() >= self.config.max_pending_requests {
                match doc.oldest_pending() {
                    Some(oldest) => {
                        debug!(document, id = oldest, "evicting oldest pending prediction");
                        doc.cache.delete(&oldest);
                    }
                    None => break,
                }
            }
            doc.cache.set(id, prediction.clone());
        }

        let provider = self.provider.clone();
        let request = FimRequest {
            prefix: options.model_prefix,
            suffix: options.model_suffix,
            stop: options.stop,
        };
        let cancel = prediction.cancel_token();
        let task_prediction = prediction.clone();
        let kind = options.kind;
        let newline_budget = self.config.newline_budget;
        let timeout = self.config.request_timeout();
        debug!(
            document,
            id,
            provider = provider.name(),
            kind = ?kind,
            "dispatching prediction request"
        );
        tokio::spawn(async move {
            let outcome = tokio::time::timeout(timeout, async {
                tokio::select! {
                    result = provider.complete(&request, &cancel) => result,
                    _ = cancel.cancelled() => Err(ProviderError::Cancelled),
                }
            })
            .await;
            match outcome {
                Ok(Ok(raw)) => {
                    let (text, newlines) = prepare_raw(&raw, kind, newline_budget);
                    task_prediction.finish(text, newlines);
                }
                Ok(Err(error)) => {
                    if error.is_cancelled() {
                        debug!(id = task_prediction.id, "prediction request cancelled");
                    } else {
                        warn!(id = task_prediction.id, error = %error, "prediction request failed");
                    }
                    task_prediction.fail();
                }
                Err(_) => {
                    warn!(id = task_prediction.id, "prediction request timed out");
                    task_prediction.fail();
                }
            }
        });

        prediction
    }

    fn completion_from(
        &self,
        m: &Matchup,
        prediction: &Prediction,
        inserted_text: &str,
        ctx: &CursorContext,
    ) -> Option<InlineCompletion> {
        let (text, replace) = postprocess(m, prediction.kind, inserted_text, ctx);
        if text.is_empty() {
            return None;
        }
        prediction.note_shown(normalize_for_match(&format!("{}{}", ctx.prefix, text)));
        Some(InlineCompletion {
            id: prediction.id,
            text,
            replace,
        })
    }

    async fn evict(&self, document: &str, id: u64) {
        let mut documents = self.documents.lock().await;
        if let Some(doc) = documents.get_mut(document) {
            doc.cache.delete(&id);
        }
    }
}

/// Massage a raw provider response into storable inserted text: trim,
/// unwrap formatting fences, enforce the newline budget, and prepend the
/// line break for next-line completions.
fn prepare_raw(raw: &str, kind: PredictionKind, newline_budget: usize) -> (String, usize) {
    let mut text = strip_code_fence(raw.trim_end()).to_string();

    let mut newlines = 0usize;
    for (at, c) in text.char_indices() {
        if c == '\n' {
            newlines += 1;
            if newlines > newline_budget {
                text.truncate(at);
                break;
            }
        }
    }

    if kind == PredictionKind::MultiLineStartOnNextLine {
        text.insert(0, '\n');
    }
    (text, newlines.min(newline_budget))
}

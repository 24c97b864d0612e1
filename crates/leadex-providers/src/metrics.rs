use std::{
	sync::{
		OnceLock,
		atomic::{AtomicI64, Ordering},
	},
	time::{Duration, Instant},
};

use serde::Serialize;
use tracing::{debug, warn};

static GLOBAL: OnceLock<AiMetrics> = OnceLock::new();

/// Process-wide metrics for calls to the external model services.
pub fn global() -> &'static AiMetrics {
	GLOBAL.get_or_init(AiMetrics::new)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
	Llm,
	Reranker,
	Vision,
	Embedding,
}
impl ServiceKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Llm => "llm",
			Self::Reranker => "reranker",
			Self::Vision => "vision",
			Self::Embedding => "embedding",
		}
	}
}

#[derive(Debug, Default)]
struct Counters {
	calls_total: AtomicI64,
	errors_total: AtomicI64,
	latency_total_ms: AtomicI64,
	last_latency_ms: AtomicI64,
	tokens_used_total: AtomicI64,
}
impl Counters {
	fn record(&self, latency_ms: i64, success: bool, tokens_used: i64) {
		self.calls_total.fetch_add(1, Ordering::Relaxed);
		self.latency_total_ms.fetch_add(latency_ms, Ordering::Relaxed);
		self.last_latency_ms.store(latency_ms, Ordering::Relaxed);

		if tokens_used > 0 {
			self.tokens_used_total.fetch_add(tokens_used, Ordering::Relaxed);
		}
		if !success {
			self.errors_total.fetch_add(1, Ordering::Relaxed);
		}
	}

	fn reset(&self) {
		self.calls_total.store(0, Ordering::Relaxed);
		self.errors_total.store(0, Ordering::Relaxed);
		self.latency_total_ms.store(0, Ordering::Relaxed);
		self.last_latency_ms.store(0, Ordering::Relaxed);
		self.tokens_used_total.store(0, Ordering::Relaxed);
	}

	fn stats(&self) -> ServiceStats {
		let calls = self.calls_total.load(Ordering::Relaxed);
		let errors = self.errors_total.load(Ordering::Relaxed);
		let latency_total = self.latency_total_ms.load(Ordering::Relaxed);
		let (error_rate, avg_latency_ms) = if calls > 0 {
			(errors as f64 / calls as f64, latency_total as f64 / calls as f64)
		} else {
			(0.0, 0.0)
		};

		ServiceStats {
			calls_total: calls,
			errors_total: errors,
			error_rate,
			avg_latency_ms,
			last_latency_ms: self.last_latency_ms.load(Ordering::Relaxed),
			tokens_used_total: self.tokens_used_total.load(Ordering::Relaxed),
		}
	}
}

#[derive(Debug, Default)]
pub struct AiMetrics {
	llm: Counters,
	reranker: Counters,
	vision: Counters,
	embedding: Counters,
}
impl AiMetrics {
	fn new() -> Self {
		Self::default()
	}

	fn counters(&self, kind: ServiceKind) -> &Counters {
		match kind {
			ServiceKind::Llm => &self.llm,
			ServiceKind::Reranker => &self.reranker,
			ServiceKind::Vision => &self.vision,
			ServiceKind::Embedding => &self.embedding,
		}
	}

	pub fn record(&self, kind: ServiceKind, latency: Duration, success: bool, tokens_used: i64) {
		let latency_ms = latency.as_millis() as i64;

		self.counters(kind).record(latency_ms, success, tokens_used);

		if success {
			debug!(service = kind.as_str(), latency_ms, "AI service call completed.");
		} else {
			warn!(service = kind.as_str(), latency_ms, "AI service call failed.");
		}
	}

	pub fn start(&self, kind: ServiceKind) -> CallTimer<'_> {
		CallTimer { metrics: self, kind, started: Instant::now() }
	}

	pub fn snapshot(&self) -> Snapshot {
		Snapshot {
			llm: self.llm.stats(),
			reranker: self.reranker.stats(),
			vision: self.vision.stats(),
			embedding: self.embedding.stats(),
		}
	}

	/// Zeroes every counter. Test-only in spirit; the singleton lives for
	/// the process.
	pub fn reset(&self) {
		self.llm.reset();
		self.reranker.reset();
		self.vision.reset();
		self.embedding.reset();
	}
}

pub struct CallTimer<'a> {
	metrics: &'a AiMetrics,
	kind: ServiceKind,
	started: Instant,
}
impl CallTimer<'_> {
	pub fn stop(self, success: bool, tokens_used: i64) {
		self.metrics.record(self.kind, self.started.elapsed(), success, tokens_used);
	}
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct Snapshot {
	pub llm: ServiceStats,
	pub reranker: ServiceStats,
	pub vision: ServiceStats,
	pub embedding: ServiceStats,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct ServiceStats {
	pub calls_total: i64,
	pub errors_total: i64,
	pub error_rate: f64,
	pub avg_latency_ms: f64,
	pub last_latency_ms: i64,
	pub tokens_used_total: i64,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn records_calls_and_errors() {
		let metrics = AiMetrics::new();

		metrics.record(ServiceKind::Reranker, Duration::from_millis(100), true, 0);
		metrics.record(ServiceKind::Reranker, Duration::from_millis(300), false, 0);

		let stats = metrics.snapshot().reranker;

		assert_eq!(stats.calls_total, 2);
		assert_eq!(stats.errors_total, 1);
		assert!((stats.error_rate - 0.5).abs() < f64::EPSILON);
		assert!((stats.avg_latency_ms - 200.0).abs() < f64::EPSILON);
		assert_eq!(stats.last_latency_ms, 300);
	}

	#[test]
	fn tracks_llm_tokens() {
		let metrics = AiMetrics::new();

		metrics.record(ServiceKind::Llm, Duration::from_millis(10), true, 120);
		metrics.record(ServiceKind::Llm, Duration::from_millis(10), true, 80);

		assert_eq!(metrics.snapshot().llm.tokens_used_total, 200);
	}

	#[test]
	fn reset_zeroes_everything() {
		let metrics = AiMetrics::new();

		metrics.record(ServiceKind::Embedding, Duration::from_millis(42), false, 0);
		metrics.reset();

		let stats = metrics.snapshot().embedding;

		assert_eq!(stats.calls_total, 0);
		assert_eq!(stats.errors_total, 0);
		assert_eq!(stats.last_latency_ms, 0);
		assert!(stats.error_rate.abs() < f64::EPSILON);
	}

	#[test]
	fn timer_records_on_stop() {
		let metrics = AiMetrics::new();
		let timer = metrics.start(ServiceKind::Vision);

		timer.stop(true, 0);

		assert_eq!(metrics.snapshot().vision.calls_total, 1);
	}

	#[test]
	fn global_is_a_singleton() {
		let first = global() as *const AiMetrics;
		let second = global() as *const AiMetrics;

		assert_eq!(first, second);
	}
}

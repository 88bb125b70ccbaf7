//! End-to-end tagger scenarios against a gated mock source.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use tokio::time::{sleep, timeout};
use xeno_primitives::{LineRange, Snapshot, SnapshotLineRange, Span, TextBuffer};
use xeno_worker::{CancelSignal, WorkerRuntime};

use crate::{
	AsyncTaggerSource, ComputeError, SourceNotifier, Subscription, TagSpan, Tagger, TaggerCfg, TaggerContext,
};

mod lifecycle;

const WORD: &str = "cat";
pub(crate) const FOLD: &str = "fold";
const GATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Tags every occurrence of `"cat"`.
///
/// Computation can be held behind a gate so tests decide when a chunk
/// finishes; every call is counted per snapshot version.
pub(crate) struct MockSource {
	gate_closed: Mutex<bool>,
	gate: Condvar,
	calls: AtomicUsize,
	calls_by_version: Mutex<FxHashMap<u64, usize>>,
	computed: Mutex<Vec<(u64, LineRange)>>,
	fail_once: Mutex<Option<usize>>,
	panic_once: Mutex<Option<usize>>,
	fold: AtomicBool,
	prompt: AtomicBool,
	no_data: AtomicBool,
	delay: Mutex<Option<Duration>>,
	visible: Mutex<Option<SnapshotLineRange>>,
	notifier: Mutex<Option<SourceNotifier>>,
	unsubscribed: Arc<AtomicBool>,
}

impl MockSource {
	pub(crate) fn new() -> Arc<Self> {
		Arc::new(Self {
			gate_closed: Mutex::new(false),
			gate: Condvar::new(),
			calls: AtomicUsize::new(0),
			calls_by_version: Mutex::new(FxHashMap::default()),
			computed: Mutex::new(Vec::new()),
			fail_once: Mutex::new(None),
			panic_once: Mutex::new(None),
			fold: AtomicBool::new(false),
			prompt: AtomicBool::new(false),
			no_data: AtomicBool::new(false),
			delay: Mutex::new(None),
			visible: Mutex::new(None),
			notifier: Mutex::new(None),
			unsubscribed: Arc::new(AtomicBool::new(false)),
		})
	}

	/// Holds every computation until the returned guard is opened or dropped.
	pub(crate) fn close_gate(self: &Arc<Self>) -> GateGuard {
		*self.gate_closed.lock() = true;
		GateGuard(Arc::clone(self))
	}

	fn open_gate(&self) {
		*self.gate_closed.lock() = false;
		self.gate.notify_all();
	}

	fn wait_gate(&self) {
		let deadline = Instant::now() + GATE_TIMEOUT;
		let mut closed = self.gate_closed.lock();
		while *closed {
			if self.gate.wait_until(&mut closed, deadline).timed_out() {
				break;
			}
		}
	}

	pub(crate) fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub(crate) fn calls_for(&self, version: u64) -> usize {
		self.calls_by_version.lock().get(&version).copied().unwrap_or(0)
	}

	/// Line ranges handed to the source, in call order.
	pub(crate) fn computed(&self) -> Vec<LineRange> {
		self.computed.lock().iter().map(|(_, range)| *range).collect()
	}

	/// Fails the first chunk containing `line`, once.
	pub(crate) fn fail_once_on(&self, line: usize) {
		*self.fail_once.lock() = Some(line);
	}

	/// Panics in the first chunk containing `line`, once.
	pub(crate) fn panic_once_on(&self, line: usize) {
		*self.panic_once.lock() = Some(line);
	}

	/// Also reports one `"fold"` tag over the whole document from every chunk.
	pub(crate) fn set_fold(&self, enabled: bool) {
		self.fold.store(enabled, Ordering::SeqCst);
	}

	pub(crate) fn set_prompt(&self, enabled: bool) {
		self.prompt.store(enabled, Ordering::SeqCst);
	}

	pub(crate) fn set_no_data(&self, no_data: bool) {
		self.no_data.store(no_data, Ordering::SeqCst);
	}

	pub(crate) fn set_delay(&self, delay: Option<Duration>) {
		*self.delay.lock() = delay;
	}

	pub(crate) fn set_visible(&self, visible: Option<SnapshotLineRange>) {
		*self.visible.lock() = visible;
	}

	/// The notifier handed to `subscribe`.
	pub(crate) fn notifier(&self) -> SourceNotifier {
		self.notifier.lock().clone().expect("tagger subscribed")
	}

	pub(crate) fn is_unsubscribed(&self) -> bool {
		self.unsubscribed.load(Ordering::SeqCst)
	}
}

impl AsyncTaggerSource for MockSource {
	type Data = Snapshot;
	type Tag = &'static str;

	fn delay(&self) -> Option<Duration> {
		*self.delay.lock()
	}

	fn prompt(&self, span: &Span) -> Option<Vec<TagSpan<&'static str>>> {
		self.prompt.load(Ordering::SeqCst).then(|| word_tags(&SnapshotLineRange::for_span(span)))
	}

	fn data_for_snapshot(&self, snapshot: &Snapshot) -> Option<Snapshot> {
		(!self.no_data.load(Ordering::SeqCst)).then(|| snapshot.clone())
	}

	fn tags_in_background(
		&self,
		data: &Snapshot,
		lines: &SnapshotLineRange,
		_cancel: &CancelSignal,
	) -> Result<Vec<TagSpan<&'static str>>, ComputeError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		*self.calls_by_version.lock().entry(data.version()).or_default() += 1;
		self.computed.lock().push((data.version(), lines.range()));

		self.wait_gate();

		if take_hit(&self.panic_once, lines) {
			panic!("mock source panic");
		}
		if take_hit(&self.fail_once, lines) {
			return Err(ComputeError::failed("mock chunk failure"));
		}

		let mut tags = word_tags(lines);
		if self.fold.load(Ordering::SeqCst) {
			tags.push(TagSpan::new(Span::whole(data.clone()), FOLD));
		}
		Ok(tags)
	}

	fn visible_range(&self) -> Option<SnapshotLineRange> {
		self.visible.lock().clone()
	}

	fn subscribe(&self, notifier: SourceNotifier) -> Subscription {
		*self.notifier.lock() = Some(notifier);
		let unsubscribed = Arc::clone(&self.unsubscribed);
		Subscription::new(move || unsubscribed.store(true, Ordering::SeqCst))
	}
}

/// Clears `slot` and returns true when its line falls in `lines`.
fn take_hit(slot: &Mutex<Option<usize>>, lines: &SnapshotLineRange) -> bool {
	let mut slot = slot.lock();
	let hit = slot.is_some_and(|line| lines.range().contains_line(line));
	if hit {
		*slot = None;
	}
	hit
}

/// Opens the mock gate on drop so a failing test never strands a worker.
pub(crate) struct GateGuard(Arc<MockSource>);

impl GateGuard {
	pub(crate) fn open(self) {}
}

impl Drop for GateGuard {
	fn drop(&mut self) {
		self.0.open_gate();
	}
}

/// Every `"cat"` on `lines`.
pub(crate) fn word_tags(lines: &SnapshotLineRange) -> Vec<TagSpan<&'static str>> {
	let snapshot = lines.snapshot();
	let mut tags = Vec::new();
	for line in lines.start_line()..=lines.last_line() {
		let start = snapshot.line_start(line);
		let text = snapshot.text().line(line).to_string();
		for (byte, _) in text.match_indices(WORD) {
			let offset = text[..byte].chars().count();
			let span = Span::new(snapshot.clone(), start + offset, start + offset + WORD.len());
			tags.push(TagSpan::new(span, WORD));
		}
	}
	tags
}

/// Every `"cat"` touching `span`.
pub(crate) fn expected_tags(span: &Span) -> Vec<TagSpan<&'static str>> {
	let mut tags = word_tags(&SnapshotLineRange::for_span(span));
	tags.retain(|t| span.intersects(&t.span));
	tags
}

/// `lines` lines alternating `cat`/`dog`; every fourth line has a cat.
pub(crate) fn animal_doc(lines: usize) -> TextBuffer {
	let text: Vec<String> = (0..lines)
		.map(|i| if i % 4 == 0 { format!("cat {i}") } else { format!("dog {i}") })
		.collect();
	TextBuffer::new(&text.join("\n"))
}

/// Span covering `first..=last` lines, line breaks excluded.
pub(crate) fn line_span(snapshot: &Snapshot, first: usize, last: usize) -> Span {
	Span::new(snapshot.clone(), snapshot.line_start(first), snapshot.line_end(last))
}

pub(crate) fn lr(start: usize, last: usize) -> LineRange {
	LineRange::from_bounds(start, last)
}

/// Tag start offsets in ascending order.
pub(crate) fn starts(tags: &[TagSpan<&'static str>]) -> Vec<usize> {
	let mut out: Vec<_> = tags.iter().map(|t| t.span.start()).collect();
	out.sort_unstable();
	out
}

pub(crate) fn tagger_with(source: &Arc<MockSource>, cfg: TaggerCfg) -> Tagger<MockSource> {
	let ctx = TaggerContext::new(WorkerRuntime::current(), cfg);
	Tagger::new(&ctx, Arc::clone(source))
}

pub(crate) fn tagger(source: &Arc<MockSource>) -> Tagger<MockSource> {
	tagger_with(source, TaggerCfg::default())
}

/// Collects the spans of every change notification.
pub(crate) fn record_changes(tagger: &mut Tagger<MockSource>) -> Rc<RefCell<Vec<Span>>> {
	let changes = Rc::new(RefCell::new(Vec::new()));
	let sink = Rc::clone(&changes);
	tagger.on_tags_changed(move |span| sink.borrow_mut().push(span.clone()));
	changes
}

/// Pumps until no job is pending.
pub(crate) async fn settle(tagger: &mut Tagger<MockSource>) {
	timeout(GATE_TIMEOUT, async {
		loop {
			tagger.pump();
			if !tagger.has_pending_job() {
				break;
			}
			sleep(Duration::from_millis(1)).await;
		}
	})
	.await
	.expect("tagger should settle");
}

/// Polls `cond` until it holds.
pub(crate) async fn wait_for(mut cond: impl FnMut() -> bool) {
	timeout(GATE_TIMEOUT, async {
		while !cond() {
			sleep(Duration::from_millis(1)).await;
		}
	})
	.await
	.expect("condition should hold");
}

pub(crate) fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_test_writer()
		.with_max_level(tracing::Level::TRACE)
		.try_init();
}

use pretty_assertions::assert_eq;
use xeno_primitives::{SnapshotLineRange, Span};

use super::*;

#[tokio::test]
async fn cold_request_fills_in_three_chunks() {
	init_tracing();
	let source = MockSource::new();
	let mut tagger = tagger(&source);
	let changes = record_changes(&mut tagger);

	let snap = animal_doc(1200).snapshot();
	assert_eq!(snap.line_count(), 1200);
	let whole = Span::whole(snap.clone());

	assert!(tagger.get_tags(&whole).is_empty());
	assert!(tagger.has_pending_job());
	assert_eq!(tagger.pending_snapshot_version(), Some(0));
	settle(&mut tagger).await;

	assert_eq!(source.computed(), vec![lr(0, 499), lr(500, 999), lr(1000, 1199)]);
	let notified: Vec<_> = changes.borrow().iter().map(|s| SnapshotLineRange::for_span(s).range()).collect();
	assert_eq!(notified, vec![lr(0, 499), lr(500, 999), lr(1000, 1199)]);

	let tags = tagger.get_tags(&whole);
	assert!(!tagger.has_pending_job(), "a covered request starts no job");
	assert_eq!(tags.len(), 300);
	assert_eq!(starts(&tags), starts(&expected_tags(&whole)));
	assert_eq!(tagger.stats().jobs_started, 1);
	assert_eq!(source.calls(), 3);
}

#[tokio::test]
async fn sub_span_answers_are_subsets() {
	let source = MockSource::new();
	let mut tagger = tagger(&source);
	let snap = animal_doc(200).snapshot();
	let outer = line_span(&snap, 20, 180);
	let inner = line_span(&snap, 100, 120);

	tagger.get_tags(&outer);
	settle(&mut tagger).await;

	let all = tagger.get_tags(&outer);
	let some = tagger.get_tags(&inner);
	let mut filtered: Vec<_> = all.into_iter().filter(|t| inner.intersects(&t.span)).collect();
	filtered.sort_by_key(|t| t.span.start());
	assert_eq!(starts(&some), filtered.iter().map(|t| t.span.start()).collect::<Vec<_>>());
	assert_eq!(some.len(), 6);
	assert!(!tagger.has_pending_job());
}

#[tokio::test]
async fn settled_results_are_stable() {
	let source = MockSource::new();
	let mut tagger = tagger(&source);
	let snap = animal_doc(64).snapshot();
	let span = line_span(&snap, 3, 40);

	tagger.get_tags(&span);
	settle(&mut tagger).await;

	let first = tagger.get_tags(&span);
	let second = tagger.get_tags(&span);
	assert_eq!(first, second);
	assert_eq!(starts(&first), starts(&expected_tags(&span)));
	assert_eq!(tagger.stats().jobs_started, 1);
}

#[tokio::test]
async fn snapshot_race_discards_old_progress() {
	let source = MockSource::new();
	let mut tagger = tagger(&source);
	let mut buffer = animal_doc(200);
	let v0 = buffer.snapshot();

	let gate = source.close_gate();
	tagger.get_tags(&line_span(&v0, 0, 100));
	wait_for(|| source.calls_for(0) == 1).await;

	let v1 = buffer.insert(0, "cat ");
	let span = line_span(&v1, 0, 100);
	tagger.get_tags(&span);
	assert_eq!(tagger.pending_snapshot_version(), Some(1));
	assert_eq!(tagger.stats().jobs_superseded, 1);

	gate.open();
	settle(&mut tagger).await;
	wait_for(|| {
		tagger.pump();
		tagger.stats().stale_messages >= 2
	})
	.await;

	let bg = tagger.cache().background().expect("v1 results cached");
	assert_eq!(bg.snapshot(), &v1);
	assert!(bg.tags().iter().all(|t| t.span.snapshot() == &v1));
	assert!(tagger.cache().tracking().is_none());
	assert_eq!(source.calls_for(0), 1);

	let tags = tagger.get_tags(&span);
	assert_eq!(starts(&tags), starts(&expected_tags(&span)));
	assert_eq!(tags.first().map(|t| t.span.range()), Some(0..3));
}

#[tokio::test]
async fn source_change_clears_cache_and_notifies_requested_span() {
	let source = MockSource::new();
	let mut tagger = tagger(&source);
	let snap = animal_doc(100).snapshot();
	let span = line_span(&snap, 10, 50);

	tagger.get_tags(&span);
	settle(&mut tagger).await;
	let calls = source.calls();
	let changes = record_changes(&mut tagger);

	source.notifier().changed();
	assert_eq!(tagger.pump(), 1);

	assert_eq!(changes.borrow().len(), 1);
	assert!(changes.borrow()[0].contains_span(&span));
	assert!(tagger.cache().is_empty());
	assert!(!tagger.has_pending_job());

	assert!(tagger.get_tags(&span).is_empty());
	assert!(tagger.has_pending_job());
	settle(&mut tagger).await;
	assert!(source.calls() > calls);
	assert_eq!(starts(&tagger.get_tags(&span)), starts(&expected_tags(&span)));
}

#[tokio::test]
async fn requested_span_memory_grows_and_follows_edits() {
	let source = MockSource::new();
	let mut tagger = tagger(&source);
	let mut buffer = animal_doc(40);
	let v0 = buffer.snapshot();

	tagger.get_tags(&line_span(&v0, 2, 3));
	tagger.get_tags(&line_span(&v0, 10, 12));
	let memory = tagger.requested_span().cloned().expect("memory recorded");
	assert_eq!(memory.range(), v0.line_start(2)..v0.line_end(12));

	let v1 = buffer.insert(0, "xx");
	tagger.get_tags(&line_span(&v1, 30, 30));
	let memory = tagger.requested_span().cloned().expect("memory recorded");
	assert_eq!(memory.snapshot(), &v1);
	assert_eq!(memory.range(), v1.line_start(2)..v1.line_end(30));
}

#[tokio::test]
async fn prompt_answers_without_background_work() {
	let source = MockSource::new();
	source.set_prompt(true);
	let mut tagger = tagger(&source);
	let snap = animal_doc(20).snapshot();
	let span = line_span(&snap, 0, 8);

	let tags = tagger.get_tags(&span);
	assert_eq!(starts(&tags), starts(&expected_tags(&span)));
	assert!(!tagger.has_pending_job());
	assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn missing_data_starts_no_job() {
	let source = MockSource::new();
	source.set_no_data(true);
	let mut tagger = tagger(&source);
	let snap = animal_doc(20).snapshot();

	assert!(tagger.get_tags(&Span::whole(snap)).is_empty());
	assert!(!tagger.has_pending_job());
	assert_eq!(tagger.stats().jobs_started, 0);
}

#[tokio::test]
async fn multi_span_request_filters_to_each_span() {
	let source = MockSource::new();
	let mut tagger = tagger(&source);
	let snap = animal_doc(40).snapshot();
	let spans = [line_span(&snap, 0, 1), line_span(&snap, 20, 21)];

	tagger.get_tags_in(&spans);
	settle(&mut tagger).await;
	assert_eq!(source.computed(), vec![lr(0, 21)]);

	let tags = tagger.get_tags_in(&spans);
	assert_eq!(starts(&tags), vec![snap.line_start(0), snap.line_start(20)]);
}

#[tokio::test]
async fn ranges_queued_after_the_worker_finished_are_reissued() {
	let source = MockSource::new();
	let mut tagger = tagger(&source);
	let snap = animal_doc(100).snapshot();

	tagger.get_tags(&line_span(&snap, 0, 9));
	wait_for(|| tagger.job_finished()).await;

	// The completion is still unread, so this lands on the finished job's queue.
	tagger.get_tags(&line_span(&snap, 50, 59));
	assert_eq!(tagger.stats().jobs_started, 1);

	tagger.pump();
	assert!(tagger.has_pending_job());
	assert_eq!(tagger.stats().jobs_started, 2);

	settle(&mut tagger).await;
	assert_eq!(source.computed(), vec![lr(0, 9), lr(50, 59)]);
	let bottom = line_span(&snap, 50, 59);
	assert_eq!(starts(&tagger.get_tags(&bottom)), starts(&expected_tags(&bottom)));
	assert!(!tagger.has_pending_job());
}

#[tokio::test]
async fn region_spanning_chunks_is_reported_once() {
	let source = MockSource::new();
	source.set_fold(true);
	let cfg = TaggerCfg {
		chunk_lines: 2,
		..TaggerCfg::default()
	};
	let mut tagger = tagger_with(&source, cfg);
	let changes = record_changes(&mut tagger);
	let snap = animal_doc(8).snapshot();
	let whole = Span::whole(snap.clone());

	tagger.get_tags(&whole);
	settle(&mut tagger).await;
	assert_eq!(source.computed(), vec![lr(0, 1), lr(2, 3), lr(4, 5), lr(6, 7)]);

	let tags = tagger.get_tags(&whole);
	assert_eq!(tags.iter().filter(|t| t.tag == FOLD).count(), 1);
	assert_eq!(tags.len(), 3);

	// Only the chunks holding a cat add something new; the fold is seen once.
	let notified = changes.borrow();
	assert_eq!(notified.len(), 2);
	assert!(notified[0].contains_span(&whole), "the first report reaches as far as the fold");
	assert_eq!(notified[1].range(), SnapshotLineRange::new(snap, lr(4, 5)).extent().range());
}

#[tokio::test]
async fn requests_on_the_running_snapshot_join_the_job() {
	let source = MockSource::new();
	let mut tagger = tagger(&source);
	let snap = animal_doc(100).snapshot();

	let gate = source.close_gate();
	tagger.get_tags(&line_span(&snap, 0, 9));
	wait_for(|| source.calls() == 1).await;
	tagger.get_tags(&line_span(&snap, 50, 59));
	assert_eq!(tagger.stats().jobs_started, 1);

	gate.open();
	settle(&mut tagger).await;
	assert_eq!(source.computed(), vec![lr(0, 9), lr(50, 59)]);
	assert_eq!(tagger.stats().jobs_started, 1);
}

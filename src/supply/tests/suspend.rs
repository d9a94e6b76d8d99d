#[tokio::test]
async fn fresh_demand_suspends_at_the_batch_budget() {
	// Small batches and a budget of two, so the first turn is cut short
	let options =
		EngineOptions::default().with_rebalance_batch_size(1024).with_rebalance_batches_count(2);
	let test = new_test(options, false);
	let part = test.partitions.create(7);
	test.affinity.assign(7, vec![test.demander]);
	for i in 0..100 {
		part.put(entry(7, i, 128));
	}
	// The first turn emits exactly two batches and suspends
	test.supplier.handle_demand(test.demander, test.demand(vec![7])).await;
	let mut batches = test.drain();
	assert_eq!(batches.len(), 2);
	assert!(batches.iter().all(|b| b.last.is_empty()));
	// The context holds the mid-stream position and the partition lease
	assert_eq!(test.supplier.context_count(), 1);
	assert_eq!(part.reserved(), 1);
	// Each follow-up demand is given a single batch before yielding
	let mut turns = 0;
	while !batches.iter().any(|b| b.last.contains(&7)) {
		test.supplier.handle_demand(test.demander, test.demand(vec![7])).await;
		let turn = test.drain();
		assert_eq!(turn.len(), 1);
		batches.extend(turn);
		turns += 1;
		assert!(turns < 100, "the partition never completed");
	}
	// The stream completed and every resource was given back
	assert_eq!(test.supplier.context_count(), 0);
	assert_eq!(part.reserved(), 0);
	// Every entry was supplied exactly once, in key order
	let keys = streamed_keys(&batches);
	let expected: Vec<Vec<u8>> = (0..100).map(|i| entry(7, i, 0).key).collect();
	assert_eq!(keys, expected);
}

#[tokio::test]
async fn reservations_match_stored_contexts() {
	// Suspend two independent demander slots mid-stream
	let options =
		EngineOptions::default().with_rebalance_batch_size(1024).with_rebalance_batches_count(1);
	let test = new_test(options, false);
	let one = test.partitions.create(1);
	let two = test.partitions.create(2);
	test.affinity.assign(1, vec![test.demander]);
	test.affinity.assign(2, vec![test.demander]);
	for i in 0..50 {
		one.put(entry(1, i, 128));
		two.put(entry(2, i, 128));
	}
	let mut first = test.demand(vec![1]);
	first.worker_slot = 0;
	let mut second = test.demand(vec![2]);
	second.worker_slot = 1;
	test.supplier.handle_demand(test.demander, first).await;
	test.supplier.handle_demand(test.demander, second).await;
	test.drain();
	// The live reservations equal the stored contexts
	assert_eq!(test.supplier.context_count(), 2);
	assert_eq!(one.reserved() + two.reserved(), 2);
}

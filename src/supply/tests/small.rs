#[tokio::test]
async fn small_fresh_demand() {
	// One partition with three small entries fits in a single batch
	let options =
		EngineOptions::default().with_rebalance_batch_size(1024).with_rebalance_batches_count(10);
	let test = new_test(options, false);
	let part = test.partitions.create(7);
	test.affinity.assign(7, vec![test.demander]);
	for i in 0..3 {
		part.put(entry(7, i, 50));
	}
	// Issue a fresh demand for the partition
	test.supplier.handle_demand(test.demander, test.demand(vec![7])).await;
	// A single batch carries every entry and the terminal marker
	let batches = test.drain();
	assert_eq!(batches.len(), 1);
	assert_eq!(batches[0].entries.len(), 3);
	assert_eq!(batches[0].last, vec![7]);
	assert!(batches[0].missed.is_empty());
	// No context is stored and the lease has been given back
	assert_eq!(test.supplier.context_count(), 0);
	assert_eq!(part.reserved(), 0);
}

#[tokio::test]
async fn uncommitted_entries_are_elided() {
	let test = new_test(EngineOptions::default(), false);
	let part = test.partitions.create(4);
	test.affinity.assign(4, vec![test.demander]);
	// Two committed entries surround one which was never committed
	part.put(entry(4, 0, 16));
	let mut fresh = entry(4, 1, 16);
	fresh.uncommitted = true;
	part.put(fresh);
	part.put(entry(4, 2, 16));
	// The uncommitted entry is not shipped
	test.supplier.handle_demand(test.demander, test.demand(vec![4])).await;
	let batches = test.drain();
	let keys = streamed_keys(&batches);
	assert_eq!(keys.len(), 2);
	assert!(!keys.contains(&entry(4, 1, 0).key));
}

#[tokio::test]
async fn absent_partitions_are_missed() {
	// Demand two partitions of which only one is present locally
	let test = new_test(EngineOptions::default(), false);
	let part = test.partitions.create(7);
	test.affinity.assign(7, vec![test.demander]);
	test.affinity.assign(8, vec![test.demander]);
	part.put(entry(7, 0, 16));
	test.supplier.handle_demand(test.demander, test.demand(vec![7, 8])).await;
	// The present partition completes and the absent one is missed
	let batches = test.drain();
	assert_eq!(batches.len(), 1);
	assert_eq!(batches[0].last, vec![7]);
	assert_eq!(batches[0].missed, vec![8]);
}

#[tokio::test]
async fn loading_partitions_are_missed() {
	// A partition which is still being loaded is not a valid source
	let test = new_test(EngineOptions::default(), false);
	let part = test.partitions.create(6);
	test.affinity.assign(6, vec![test.demander]);
	part.put(entry(6, 0, 16));
	assert!(part.set_state(PartitionState::Loading));
	test.supplier.handle_demand(test.demander, test.demand(vec![6])).await;
	let batches = test.drain();
	assert_eq!(batches.len(), 1);
	assert_eq!(batches[0].missed, vec![6]);
	assert!(batches[0].last.is_empty());
	assert!(batches[0].entries.is_empty());
	assert_eq!(part.reserved(), 0);
}

#[tokio::test]
async fn empty_fresh_demand_is_ignored() {
	// A fresh demand with no partitions produces no reply at all
	let test = new_test(EngineOptions::default(), false);
	test.supplier.handle_demand(test.demander, test.demand(Vec::new())).await;
	assert!(test.drain().is_empty());
	assert_eq!(test.supplier.context_count(), 0);
}

#[tokio::test]
async fn preload_predicate_filters_entries() {
	let node = Uuid::parse_str("7e0f0a77-befe-4b0e-94ce-e1e6a716f492").unwrap();
	let demander = Uuid::parse_str("ffcced91-da3b-4b1e-95ee-2dcd2a45f9a3").unwrap();
	let affinity = Arc::new(MemAffinity::new(TopologyVersion::from(1)));
	let partitions = Arc::new(MemPartitionStore::new());
	let overflow = Arc::new(MemOverflowStore::new(false));
	let bus = Arc::new(MemBus::new());
	let deployments = Arc::new(MemDeployments::new());
	let inbox = bus.register(demander);
	// Only even-versioned entries may be preloaded
	let supplier =
		Supplier::new(node, affinity.clone(), partitions.clone(), overflow, bus, deployments)
			.with_preload_predicate(Arc::new(|_, entry: &EntryInfo| entry.version % 2 == 0));
	let part = partitions.create(3);
	affinity.assign(3, vec![demander]);
	for i in 0..10 {
		part.put(entry(3, i, 16));
	}
	supplier
		.handle_demand(
			demander,
			DemandMessage {
				worker_slot: 0,
				update_seq: 1,
				topology: affinity.current_version(),
				partitions: vec![3],
				reply_topic: "rebalance/supply".to_string(),
				timeout: 5_000,
			},
		)
		.await;
	// Only the entries accepted by the predicate were shipped
	let mut batches = Vec::new();
	while let Ok((_, msg)) = inbox.try_recv() {
		batches.push(msg);
	}
	let versions: Vec<u64> =
		batches.iter().flat_map(|b| b.entries.iter().map(|e| e.entry.version)).collect();
	assert_eq!(versions, vec![2, 4, 6, 8, 10]);
}

#[tokio::test]
async fn deployment_info_attaches_once() {
	let test = new_test(EngineOptions::default(), true);
	let part = test.partitions.create(4);
	test.affinity.assign(4, vec![test.demander]);
	for i in 0..2 {
		part.put(entry(4, i, 16));
	}
	// Register one known loader; the other stays unresolvable
	let known = Uuid::parse_str("6d1210a0-9224-4813-8090-ded787d51894").unwrap();
	let unknown = Uuid::parse_str("b80ff454-c3e7-46a9-a0b0-7b40e9a62626").unwrap();
	test.deployments.register(DeploymentInfo {
		loader: known,
		node: test.supplier.id(),
		user_version: "1".to_string(),
	});
	// The first overflow entry carries the unresolvable loader
	test.overflow.put(4, overflow_entry(4, 0, 16, Some(unknown)));
	test.overflow.put(4, overflow_entry(4, 1, 16, Some(known)));
	test.overflow.put(4, overflow_entry(4, 2, 16, Some(known)));
	test.overflow.put(4, overflow_entry(4, 3, 16, None));
	test.supplier.handle_demand(test.demander, test.demand(vec![4])).await;
	let batches = test.drain();
	assert_eq!(batches.len(), 1);
	// The unresolvable entry was skipped, everything else was shipped
	let keys = streamed_keys(&batches);
	assert_eq!(keys.len(), 5);
	assert!(!keys.contains(&overflow_entry(4, 0, 0, None).key));
	// The known deployment was attached exactly once
	let deployment = batches[0].deployment.as_ref().unwrap();
	assert_eq!(deployment.loader, known);
	assert_eq!(batches[0].last, vec![4]);
}

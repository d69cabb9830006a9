use ezchain_core::config::GenesisConfig;
use ezchain_core::genesis::build_genesis;
use ezchain_core::value::{AccountValueCollection, ValueSelectionStrategy, ValueState};
use ezchain_core::{MultiTransactions, SubmitTxInfo, Transaction};
use ezchain_crypto::keys::SigningKey;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn key(seed: u64) -> SigningKey {
    let mut rng = StdRng::seed_from_u64(seed);
    SigningKey::generate(&mut rng)
}

#[test]
fn genesis_distributes_the_full_denomination_schedule() {
    let genesis_key = key(0);
    let alice = key(1).address();
    let bob = key(2).address();
    let config = GenesisConfig {
        denomination_config: vec![(100, 2), (10, 5)],
        miner: "genesis_miner".to_string(),
    };

    let (output, shares) = build_genesis(&genesis_key, &[alice.clone(), bob.clone()], &config, 0).unwrap();
    assert!(output.submit_tx_info.verify(Some(&output.multi_transactions)).is_ok());
    assert_eq!(output.block.header.merkle_root, output.leaf);

    for account in [&alice, &bob] {
        let share = &shares[account];
        let total: u64 = share.values.iter().map(|v| v.value_num).sum();
        assert_eq!(total, config.total_per_account());
        assert_eq!(share.proof_units.len(), share.values.len());
        assert_eq!(share.block_index_list.len(), 1);
    }
}

/// Scenario A end to end: genesis distributes to Alice, Alice picks values
/// covering a transfer amount, builds and signs a `Transaction`, bundles it
/// into a `MultiTransactions`, and the result verifies as a self-contained
/// unit, independent of any pool or consensus machinery.
#[test]
fn alice_sends_to_bob_after_genesis() {
    let genesis_key = key(0);
    let alice_key = key(1);
    let alice = alice_key.address();
    let bob = key(2).address();
    let config = GenesisConfig {
        denomination_config: vec![(100, 1), (10, 3)],
        miner: "genesis_miner".to_string(),
    };

    let (_output, shares) = build_genesis(&genesis_key, &[alice.clone(), bob.clone()], &config, 0).unwrap();
    let alice_share = &shares[&alice];

    let mut collection = AccountValueCollection::new();
    for value in &alice_share.values {
        collection.insert(value.clone()).unwrap();
    }
    assert_eq!(collection.total(ValueState::Unspent), 130);

    let picked = collection.pick_values(75, ValueSelectionStrategy::default()).unwrap();
    let picked_total: u64 = picked.iter().map(|v| v.value_num).sum();
    assert_eq!(picked_total, 75);
    assert_eq!(collection.total(ValueState::Selected), 75);
    assert_eq!(collection.total(ValueState::Unspent), 55);

    let mut tx = Transaction::new(alice.clone(), bob.clone(), 0, picked, 1);
    tx.sign(&alice_key);
    assert!(tx.verify().is_ok());

    let mut multi_tx = MultiTransactions::new(alice.clone(), vec![tx]).unwrap();
    multi_tx.sign(&alice_key);
    assert!(multi_tx.verify().is_ok());

    let submit = SubmitTxInfo::create(&multi_tx, &alice_key, "2024-01-01T00:00:00+00:00".to_string()).unwrap();
    assert!(submit.verify(Some(&multi_tx)).is_ok());
}

#[test]
fn pick_values_fails_closed_on_insufficient_balance() {
    let genesis_key = key(0);
    let alice = key(1).address();
    let config = GenesisConfig {
        denomination_config: vec![(10, 2)],
        miner: "genesis_miner".to_string(),
    };
    let (_output, shares) = build_genesis(&genesis_key, &[alice.clone()], &config, 0).unwrap();
    let mut collection = AccountValueCollection::new();
    for value in &shares[&alice].values {
        collection.insert(value.clone()).unwrap();
    }

    assert!(collection.pick_values(21, ValueSelectionStrategy::default()).is_err());
    // A failed pick must leave the collection untouched.
    assert_eq!(collection.total(ValueState::Unspent), 20);
}

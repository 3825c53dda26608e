//! Invariant checks over arbitrary call sequences.
//!
//! After every call the ledger must satisfy its conservation invariants, and
//! a rejected call must leave the snapshot byte-for-byte unchanged.

use proptest::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use storage_ledger::{Call, CallContext, LedgerConfig, PaymentPolicy, StorageLedger};

const IDENTITIES: [&str; 5] = ["owner", "p1", "p2", "u1", "u2"];
const FILE_IDS: [&str; 3] = ["f1", "f2", "f3"];

fn identity() -> impl Strategy<Value = String> {
    prop::sample::select(IDENTITIES.to_vec()).prop_map(String::from)
}

fn file_id() -> impl Strategy<Value = String> {
    prop::sample::select(FILE_IDS.to_vec()).prop_map(String::from)
}

fn arb_call() -> impl Strategy<Value = Call> {
    prop_oneof![
        (0u64..5_000, 0u64..20).prop_map(|(available_space, price_per_block)| {
            Call::RegisterStorageProvider {
                available_space,
                price_per_block,
            }
        }),
        (file_id(), 0u64..3_000, identity()).prop_map(|(file_id, size, provider)| {
            Call::StoreFile {
                file_id,
                size,
                provider,
                encrypted_location: "loc".into(),
            }
        }),
        file_id().prop_map(|file_id| Call::RetrieveFile { file_id }),
        file_id().prop_map(|file_id| Call::DeleteFile { file_id }),
        file_id().prop_map(|file_id| Call::ProcessPayment { file_id }),
        (0u64..2_000, identity()).prop_map(|(amount, recipient)| Call::Mint { amount, recipient }),
        (0u64..1_500, identity(), identity()).prop_map(|(amount, from, to)| Call::Transfer {
            amount,
            from,
            to,
        }),
        identity().prop_map(|account| Call::GetBalance { account }),
        Just(Call::GetTotalSupply),
        Just(Call::SetTokenUri {
            uri: "https://example.com/v2".into()
        }),
    ]
}

fn arb_step() -> impl Strategy<Value = (String, i64, Call)> {
    (identity(), -3i64..20, arb_call())
}

fn config(policy: PaymentPolicy) -> LedgerConfig {
    LedgerConfig::new("owner")
        .with_payment_policy(policy)
        .with_payment_interval(5)
}

fn run(ledger: &mut StorageLedger, steps: Vec<(String, i64, Call)>) -> Result<(), TestCaseError> {
    let mut height: u64 = 0;
    for (caller, delta, call) in steps {
        height = height.saturating_add_signed(delta);
        let ctx = CallContext::new(caller, height);
        let before = ledger.snapshot();
        let read_only = call.is_read_only();
        let result = ledger.execute(&ctx, call);
        if result.is_err() || read_only {
            prop_assert_eq!(&ledger.snapshot(), &before);
        }
        prop_assert!(ledger.check_invariants().is_ok(), "{:?}", ledger.check_invariants());
    }
    Ok(())
}

proptest! {
    #[test]
    fn stamp_only_sequences_preserve_invariants(steps in prop::collection::vec(arb_step(), 1..60)) {
        let mut ledger = StorageLedger::new(config(PaymentPolicy::StampOnly)).unwrap();
        run(&mut ledger, steps)?;
    }

    #[test]
    fn settling_sequences_preserve_invariants(steps in prop::collection::vec(arb_step(), 1..60)) {
        let mut ledger = StorageLedger::new(config(PaymentPolicy::Settle)).unwrap();
        run(&mut ledger, steps)?;
    }

    #[test]
    fn store_then_delete_restores_capacity(
        (capacity, size) in (1u64..1_000_000).prop_flat_map(|cap| (Just(cap), 1..=cap))
    ) {
        let mut ledger = StorageLedger::new(config(PaymentPolicy::StampOnly)).unwrap();
        let p = CallContext::new("p1", 1);
        let u = CallContext::new("u1", 1);
        ledger.register_storage_provider(&p, capacity, 1).unwrap();
        let before = ledger.get_storage_provider_info(&"p1".to_string()).unwrap();
        ledger.store_file(&u, &"f1".to_string(), size, &"p1".to_string(), "loc").unwrap();
        prop_assert_eq!(
            ledger.get_storage_provider_info(&"p1".to_string()).unwrap().available_space,
            capacity - size
        );
        ledger.delete_file(&u, &"f1".to_string()).unwrap();
        prop_assert_eq!(ledger.get_storage_provider_info(&"p1".to_string()).unwrap(), before);
    }

    #[test]
    fn reads_are_idempotent(amount in 1u64..1_000_000) {
        let mut ledger = StorageLedger::new(config(PaymentPolicy::StampOnly)).unwrap();
        ledger.mint(&CallContext::new("owner", 1), amount, &"u1".to_string()).unwrap();
        ledger.register_storage_provider(&CallContext::new("p1", 1), amount, 3).unwrap();
        let before = ledger.snapshot();
        for _ in 0..3 {
            prop_assert_eq!(ledger.get_balance(&"u1".to_string()), amount);
            prop_assert_eq!(ledger.get_storage_provider_info(&"p1".to_string()).unwrap().available_space, amount);
            prop_assert!(ledger.get_file_info(&"f1".to_string()).is_err());
        }
        prop_assert_eq!(ledger.snapshot(), before);
    }
}

#[test]
fn seeded_random_walk_keeps_supply_equal_to_balances() {
    let mut rng = StdRng::seed_from_u64(0x5107_a6e);
    let mut ledger = StorageLedger::new(config(PaymentPolicy::Settle)).unwrap();
    let mut height = 0u64;
    let mut applied = 0usize;
    for _ in 0..5_000 {
        height += rng.gen_range(0..3);
        let caller = IDENTITIES[rng.gen_range(0..IDENTITIES.len())];
        let other = IDENTITIES[rng.gen_range(0..IDENTITIES.len())].to_string();
        let file_id = FILE_IDS[rng.gen_range(0..FILE_IDS.len())].to_string();
        let call = match rng.gen_range(0..6) {
            0 => Call::RegisterStorageProvider {
                available_space: rng.gen_range(0..10_000),
                price_per_block: rng.gen_range(0..5),
            },
            1 => Call::StoreFile {
                file_id,
                size: rng.gen_range(1..2_000),
                provider: other,
                encrypted_location: "loc".into(),
            },
            2 => Call::DeleteFile { file_id },
            3 => Call::ProcessPayment { file_id },
            4 => Call::Mint {
                amount: rng.gen_range(1..1_000),
                recipient: other,
            },
            _ => Call::Transfer {
                amount: rng.gen_range(1..500),
                from: caller.to_string(),
                to: other,
            },
        };
        let before = ledger.state_root();
        match ledger.execute(&CallContext::new(caller, height), call) {
            Ok(_) => applied += 1,
            Err(_) => assert_eq!(ledger.state_root(), before),
        }
        ledger.check_invariants().unwrap();
    }
    assert_eq!(ledger.events().len(), applied);
    let sum: u64 = ledger.token().balances().values().sum();
    assert_eq!(sum, ledger.get_total_supply());
}

//! # Aggregation Benchmarks
//!
//! | Group | Measures |
//! |-------|----------|
//! | `op-05-bls` | single verify, signature aggregation, aggregate verify |
//! | `op-05-ecdsa` | address recovery, result + auth verification |
//! | `op-05-aggregator` | full quorum through `process_new_signature` + certificate |

use alloy_primitives::Address;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use op_05_aggregation::domain::bls::{aggregate_signatures, verify_aggregate, verify_bls};
use op_05_aggregation::domain::ecdsa::recover_address;
use op_05_aggregation::test_utils::{BlsTestOperator, EcdsaTestOperator, REFERENCE_TIMESTAMP};
use op_05_aggregation::{
    AggregationScheme, AggregatorParams, Bls, Ecdsa, SigningContext, TaskResultAggregator,
};
use shared_types::TaskId;
use std::time::Duration;

const OUTPUT: &[u8] = b"42";

fn context() -> SigningContext {
    SigningContext::new(
        TaskId::new("0xbench"),
        Address::repeat_byte(0x01),
        0,
        REFERENCE_TIMESTAMP,
        b"what is 6 * 7",
    )
}

fn params(threshold_bips: u16) -> AggregatorParams {
    let ctx = context();
    AggregatorParams {
        task_id: ctx.task_id,
        avs_address: ctx.avs_address,
        operator_set_id: ctx.operator_set_id,
        reference_timestamp: REFERENCE_TIMESTAMP,
        threshold_bips,
        payload: b"what is 6 * 7".to_vec(),
        deadline_unix_seconds: None,
    }
}

fn bench_bls(c: &mut Criterion) {
    let mut group = c.benchmark_group("op-05-bls");
    group.measurement_time(Duration::from_secs(10));

    let digest = context().response_digest(OUTPUT);
    let single = BlsTestOperator::new(1, 1);
    let signature = single.sign(&digest);

    group.bench_function("verify_single", |b| {
        b.iter(|| black_box(verify_bls(digest.as_slice(), &signature, &single.operator.public_key)))
    });

    for size in [10usize, 50, 200] {
        let operators: Vec<_> = (0..size).map(|_| BlsTestOperator::random(1)).collect();
        let signatures: Vec<_> = operators.iter().map(|op| op.sign(&digest)).collect();
        let keys: Vec<_> = operators.iter().map(|op| op.operator.public_key.clone()).collect();
        let aggregate = aggregate_signatures(&signatures).unwrap();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("aggregate", size), &signatures, |b, sigs| {
            b.iter(|| black_box(aggregate_signatures(sigs).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("verify_aggregate", size), &keys, |b, keys| {
            b.iter(|| black_box(verify_aggregate(digest.as_slice(), &aggregate, keys)))
        });
    }

    group.finish();
}

fn bench_ecdsa(c: &mut Criterion) {
    let mut group = c.benchmark_group("op-05-ecdsa");

    let ctx = context();
    let digest = ctx.response_digest(OUTPUT);
    let operator = EcdsaTestOperator::random(1);
    let result = operator.result(&ctx, OUTPUT);

    group.bench_function("recover_address", |b| {
        b.iter(|| black_box(recover_address(&digest, &result.signature.result).unwrap()))
    });
    group.bench_function("verify_result_and_auth", |b| {
        b.iter(|| {
            black_box(Ecdsa::verify_proof(&ctx, &operator.operator, &digest, &result.signature).is_ok())
        })
    });

    group.finish();
}

fn bench_aggregator(c: &mut Criterion) {
    let mut group = c.benchmark_group("op-05-aggregator");
    group.sample_size(20);

    for size in [10usize, 50, 100] {
        let operators: Vec<_> = (0..size).map(|_| BlsTestOperator::random(100)).collect();
        let ctx = context();
        let results: Vec<_> = operators.iter().map(|op| op.result(&ctx, OUTPUT)).collect();
        let roster: Vec<_> = operators.iter().map(|op| op.operator.clone()).collect();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("bls_quorum", size), &results, |b, results| {
            b.iter(|| {
                let aggregator =
                    TaskResultAggregator::<Bls>::new(params(10_000), roster.clone()).unwrap();
                for result in results {
                    aggregator.process_new_signature(result).unwrap();
                }
                black_box(aggregator.generate_final_certificate().unwrap())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_bls, bench_ecdsa, bench_aggregator);
criterion_main!(benches);

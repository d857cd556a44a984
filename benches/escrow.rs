use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use escrowd::actions::permitted_actions;
use escrowd::{Amount, Command, DeliverableInput, EscrowService, LedgerFilter, Role};

fn create(project: String) -> Command {
    Command::Create {
        project_id: project.into(),
        amount: Amount::from_minor(5000),
        client_id: "c1".into(),
        developer_id: "d1".into(),
    }
}

fn deliverables() -> Vec<DeliverableInput> {
    vec![DeliverableInput {
        name: "report.pdf".into(),
        url: "https://files.example/report.pdf".into(),
    }]
}

/// Drive `n` payments through the whole happy path.
fn run_lifecycles(n: u64) {
    let mut service = EscrowService::in_memory();
    for i in 0..n {
        let id = service.apply(create(format!("p{i}"))).unwrap().id;
        service.apply(Command::Fund { id }).unwrap();
        service
            .apply(Command::MarkDelivered {
                id,
                deliverables: deliverables(),
            })
            .unwrap();
        service.apply(Command::ClientVerify { id }).unwrap();
        service.apply(Command::AdminVerify { id }).unwrap();
        service.apply(Command::Release { id }).unwrap();
    }
}

fn bench_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("lifecycle");
    for n in [100u64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(n));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| run_lifecycles(black_box(n)))
        });
    }
    group.finish();
}

fn bench_rejection(c: &mut Criterion) {
    let mut service = EscrowService::in_memory();
    let id = service.apply(create("p0".into())).unwrap().id;
    service.apply(Command::Fund { id }).unwrap();
    service.apply(Command::Release { id }).unwrap();

    c.bench_function("rejected_refund", |b| {
        b.iter(|| {
            service
                .apply(Command::Refund { id: black_box(id) })
                .unwrap_err()
        })
    });
}

fn bench_resolver(c: &mut Criterion) {
    let mut service = EscrowService::in_memory();
    let id = service.apply(create("p0".into())).unwrap().id;
    service.apply(Command::Fund { id }).unwrap();
    service
        .apply(Command::MarkDelivered {
            id,
            deliverables: deliverables(),
        })
        .unwrap();
    let record = service.payment(id).unwrap();

    c.bench_function("permitted_actions", |b| {
        b.iter(|| {
            for role in [Role::Client, Role::Developer, Role::Admin] {
                black_box(permitted_actions(black_box(&record), role));
            }
        })
    });
}

fn bench_scan(c: &mut Criterion) {
    let mut service = EscrowService::in_memory();
    for i in 0..10_000u32 {
        service
            .apply(Command::Create {
                project_id: format!("p{i}").into(),
                amount: Amount::from_minor(5000),
                client_id: format!("c{}", i % 100).into(),
                developer_id: format!("d{}", i % 50).into(),
            })
            .unwrap();
    }
    let filter = LedgerFilter::Client("c42".into());

    c.bench_function("search_by_client_10k", |b| {
        b.iter(|| service.search(black_box(&filter)))
    });
}

criterion_group!(
    benches,
    bench_lifecycle,
    bench_rejection,
    bench_resolver,
    bench_scan
);
criterion_main!(benches);

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use netabase_orm::prelude::*;

struct Fixture {
    user: Model,
    post: Model,
}

fn fixture(owners: usize) -> Fixture {
    let schema = Schema::memory();
    let user = schema
        .define("User", Properties::new().with("name", PropertyType::String))
        .unwrap();
    let post = schema
        .define("Post", Properties::new().with("title", PropertyType::String))
        .unwrap();
    user.has_many(&post, RelationOptions::default()).unwrap();
    post.belongs_to(&user, RelationOptions::default()).unwrap();

    for n in 0..owners {
        let mut owner = user.create(row! { "name" => format!("user{n}") }).unwrap();
        for p in 0..4 {
            owner
                .scoped("posts")
                .unwrap()
                .create(row! { "title" => format!("post{n}.{p}") })
                .unwrap();
        }
    }
    Fixture { user, post }
}

fn bench_include_has_many(c: &mut Criterion) {
    let mut group = c.benchmark_group("include_has_many");

    for owners in [10, 100, 1000].iter() {
        let f = fixture(*owners);
        group.bench_with_input(BenchmarkId::new("batched", owners), owners, |b, _| {
            b.iter(|| {
                let users = f.user.all(&Filter::new().include("posts")).unwrap();
                black_box(users);
            });
        });
        group.bench_with_input(BenchmarkId::new("per_owner", owners), owners, |b, _| {
            b.iter(|| {
                let mut users = f.user.all(&Filter::new()).unwrap();
                for owner in users.iter_mut() {
                    black_box(owner.scoped("posts").unwrap().get().unwrap());
                }
            });
        });
    }

    group.finish();
}

fn bench_include_belongs_to(c: &mut Criterion) {
    let mut group = c.benchmark_group("include_belongs_to");

    for owners in [10, 100, 1000].iter() {
        let f = fixture(*owners);
        group.bench_with_input(BenchmarkId::new("batched", owners), owners, |b, _| {
            b.iter(|| {
                let posts = f.post.all(&Filter::new().include("user")).unwrap();
                black_box(posts);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_include_has_many, bench_include_belongs_to);
criterion_main!(benches);

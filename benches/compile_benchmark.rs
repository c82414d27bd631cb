use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use gravsearch::query::parser::parse_query;
use gravsearch::{
    CompileRequest, GravsearchCompiler, GravsearchConfig, OntologyCache, OntologyFeed, OntologySnapshot,
    VisibilityFilter,
};
use std::sync::Arc;

const QUERY: &str = r#"
    PREFIX ex: <http://example.org/>
    CONSTRUCT {
        ?book knora-api:isMainResource true .
        ?book ex:title ?title .
    } WHERE {
        ?book a ex:Book .
        ?book ex:title ?title .
        OPTIONAL { ?book ex:hasAuthor ?author . }
        FILTER(regex(?title, "whale", "i"))
    }
    ORDER BY ?title
"#;

/// Ontology with a class hierarchy of `depth` levels below ex:Book, `width` classes per level
fn ontology(depth: usize, width: usize) -> OntologyFeed {
    let mut feed = OntologyFeed::new()
        .with_class("http://example.org/Book", Vec::<String>::new())
        .with_class("http://example.org/Person", Vec::<String>::new())
        .with_property(
            "http://example.org/title",
            Vec::<String>::new(),
            Some("http://example.org/Book"),
            Some("http://www.w3.org/2001/XMLSchema#string"),
        )
        .with_property(
            "http://example.org/hasAuthor",
            Vec::<String>::new(),
            Some("http://example.org/Book"),
            Some("http://example.org/Person"),
        );

    let mut parents = vec!["http://example.org/Book".to_string()];
    for level in 0..depth {
        let mut next = Vec::new();
        for (i, parent) in parents.iter().enumerate() {
            for j in 0..width {
                let iri = format!("http://example.org/Book_{}_{}_{}", level, i, j);
                feed = feed.with_class(iri.clone(), [parent.clone()]);
                next.push(iri);
            }
        }
        parents = next;
    }
    feed
}

fn compiler(feed: &OntologyFeed) -> GravsearchCompiler {
    let cache = OntologyCache::from_feed(feed).unwrap();
    GravsearchCompiler::new(Arc::new(cache), GravsearchConfig::default())
}

/// Benchmark parsing alone
fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_construct", |b| {
        b.iter(|| {
            criterion::black_box(parse_query(QUERY).unwrap());
        });
    });
}

/// Benchmark building ontology snapshots of growing size
fn bench_snapshot_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_build");

    for depth in [1, 2, 3].iter() {
        let feed = ontology(*depth, 5);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &feed, |b, feed| {
            b.iter(|| {
                criterion::black_box(OntologySnapshot::build(feed, 1).unwrap());
            });
        });
    }
    group.finish();
}

/// Benchmark the full pipeline as inference expansion widens
fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    let request = CompileRequest::new(VisibilityFilter::new(
        "$entity <http://example.org/visibleTo> <http://example.org/user1> .",
    ));

    for width in [0, 5, 25].iter() {
        let compiler = compiler(&ontology(1, *width));
        group.bench_with_input(BenchmarkId::from_parameter(width), width, |b, _| {
            b.iter(|| {
                criterion::black_box(compiler.compile(QUERY, &request).unwrap());
            });
        });
    }
    group.finish();
}

/// Benchmark parallel batch compilation
fn bench_compile_batch(c: &mut Criterion) {
    let compiler = compiler(&ontology(1, 5));
    let requests: Vec<(&str, CompileRequest)> = (0..64)
        .map(|page| (QUERY, CompileRequest::default().with_page(gravsearch::PageRequest::page(page))))
        .collect();

    c.bench_function("compile_batch_64", |b| {
        b.iter(|| {
            criterion::black_box(compiler.compile_batch(&requests));
        });
    });
}

criterion_group!(
    benches,
    bench_parse,
    bench_snapshot_build,
    bench_compile,
    bench_compile_batch,
);
criterion_main!(benches);

//! Ontology reloads running concurrently with compilations

use gravsearch::*;
use std::sync::Arc;
use std::thread;

const QUERY: &str = "PREFIX ex: <http://example.org/>
    SELECT ?book WHERE { ?book a ex:Book . ?book ex:title ?title . }";

fn feed(with_rare_books: bool) -> OntologyFeed {
    let mut feed = OntologyFeed::new()
        .with_class("http://example.org/Book", Vec::<String>::new())
        .with_property(
            "http://example.org/title",
            Vec::<String>::new(),
            Some("http://example.org/Book"),
            Some("http://www.w3.org/2001/XMLSchema#string"),
        );
    if with_rare_books {
        feed = feed.with_class("http://example.org/RareBook", ["http://example.org/Book"]);
    }
    feed
}

#[test]
fn test_reload_publishes_new_generation() {
    let cache = OntologyCache::from_feed(&feed(false)).unwrap();
    assert_eq!(cache.generation(), 1);
    assert_eq!(cache.snapshot().class_count(), 1);

    let reloaded = cache.reload(&feed(true)).unwrap();
    assert_eq!(reloaded.generation(), 2);
    assert_eq!(cache.generation(), 2);
    assert_eq!(cache.snapshot().class_count(), 2);
}

#[test]
fn test_held_snapshot_survives_reload() {
    let cache = OntologyCache::from_feed(&feed(false)).unwrap();
    let old = cache.snapshot();

    cache.reload(&feed(true)).unwrap();

    assert_eq!(old.generation(), 1);
    assert_eq!(old.class_count(), 1);
    assert!(old.subclasses_of(oxrdf::NamedNodeRef::new_unchecked("http://example.org/Book")).is_empty());
    assert_eq!(
        cache
            .snapshot()
            .subclasses_of(oxrdf::NamedNodeRef::new_unchecked("http://example.org/Book"))
            .len(),
        1
    );
}

#[test]
fn test_failed_reload_keeps_current_snapshot() {
    let cache = OntologyCache::from_feed(&feed(true)).unwrap();
    let broken = feed(true).with_class("http://example.org/Book", Vec::<String>::new());

    assert!(matches!(cache.reload(&broken), Err(OntologyError::DuplicateClass(_))));
    assert_eq!(cache.generation(), 1);
    assert_eq!(cache.snapshot().class_count(), 2);
}

#[test]
fn test_compilations_see_one_consistent_snapshot() {
    let cache = Arc::new(OntologyCache::from_feed(&feed(false)).unwrap());
    let compiler = Arc::new(GravsearchCompiler::new(Arc::clone(&cache), GravsearchConfig::default()));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let compiler = Arc::clone(&compiler);
            thread::spawn(move || {
                let mut last_generation = 0;
                for _ in 0..50 {
                    let compiled = compiler.compile(QUERY, &CompileRequest::default()).unwrap();
                    assert!(compiled.ontology_generation >= last_generation);
                    last_generation = compiled.ontology_generation;

                    // Odd generations have no RareBook class, even ones do
                    let expanded = compiled.prequery.contains("UNION");
                    assert_eq!(expanded, compiled.ontology_generation % 2 == 0);
                }
            })
        })
        .collect();

    let writer = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || {
            for i in 0..20 {
                cache.reload(&feed(i % 2 == 0)).unwrap();
            }
        })
    };

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(cache.generation(), 21);
}

use gravsearch::{
    CompileRequest, GravsearchCompiler, GravsearchConfig, OntologyCache, OntologyFeed, PageRequest,
    VisibilityFilter,
};
use oxrdf::NamedNode;
use std::sync::Arc;

const EX: &str = "http://example.org/library#";

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("Gravsearch Query Compiler v{}", gravsearch::version());
    println!("==========================================");
    println!();

    let cache = Arc::new(OntologyCache::from_feed(&library_ontology())?);
    let mut config = GravsearchConfig::default();
    config.extra_prefixes.insert("lib".to_string(), EX.to_string());
    let compiler = GravsearchCompiler::new(Arc::clone(&cache), config);

    // Demo 1: Type inspection
    let query = r#"
        CONSTRUCT {
            ?book knora-api:isMainResource true .
            ?book lib:title ?title .
            ?book lib:hasAuthor ?author .
        } WHERE {
            ?book a lib:Book .
            ?book lib:title ?title .
            OPTIONAL { ?book lib:hasAuthor ?author . }
            FILTER(regex(?title, "whale", "i"))
        }
        ORDER BY ?title
    "#;

    println!("=== Demo 1: Type Inspection ===");
    let annotated = compiler.inspect_types(query)?;
    for (entity, inferred) in &annotated.types.entities {
        println!("  {} -> {:?}", entity, inferred);
    }

    // Demo 2: Prequery and main query
    println!("\n=== Demo 2: Compilation ===");
    let visibility = VisibilityFilter::new(format!("$entity <{}visibleTo> <{}user1> .", EX, EX));
    let request = CompileRequest::new(visibility.clone()).with_page(PageRequest::page(1));
    let compiled = compiler.compile(query, &request)?;
    println!("Prequery:\n{}", compiled.prequery);

    let main_query = compiled
        .main_query
        .instantiate(&[NamedNode::new(format!("{}moby-dick", EX))?]);
    println!("Main query:\n{}", main_query);

    // Demo 3: Count query
    println!("=== Demo 3: Count Query ===");
    println!("{}", compiler.compile_count(query, &visibility)?);

    // Demo 4: Ontology reload
    println!("=== Demo 4: Ontology Reload ===");
    let reloaded = cache.reload(
        &library_ontology().with_class(format!("{}Incunabulum", EX), [format!("{}Book", EX)]),
    )?;
    println!("Ontology generation {} with {} classes", reloaded.generation(), reloaded.class_count());
    let compiled = compiler.compile(query, &request)?;
    println!("Prequery after reload:\n{}", compiled.prequery);

    Ok(())
}

fn library_ontology() -> OntologyFeed {
    let iri = |local: &str| format!("{}{}", EX, local);
    let book = iri("Book");
    let person = iri("Person");
    let string = "http://www.w3.org/2001/XMLSchema#string";

    OntologyFeed::new()
        .with_class(iri("Resource"), Vec::<String>::new())
        .with_class(iri("Book"), [iri("Resource")])
        .with_class(iri("RareBook"), [iri("Book")])
        .with_class(iri("Person"), [iri("Resource")])
        .with_property(iri("title"), Vec::<String>::new(), Some(book.as_str()), Some(string))
        .with_property(iri("hasAuthor"), Vec::<String>::new(), Some(book.as_str()), Some(person.as_str()))
}

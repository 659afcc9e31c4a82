//! End-to-end renders through the parser.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use folio_render::extension::{Extension, InstalledExtension, Registry};
use folio_render::memory::{MemoryController, MemoryStore, Record};
use folio_render::{
    ConfigError, Converters, LoaderError, MarkupConverter, Parser, ParserBuilder, ParserConfig,
    PrimaryFormat, TextileConverter, Topic, WikiError, MAX_RENDER_DEPTH,
};
use minijinja::Value;
use proptest::prelude::*;

fn store() -> MemoryStore {
    let store = MemoryStore::new();
    store.insert_category(Record::new("guide", "Guide").include("nav", "NAV[{{ this.topic.ident }}]"));
    store
}

fn plain_config() -> ParserConfig {
    ParserConfig {
        primary_format: PrimaryFormat::None,
        ..ParserConfig::default()
    }
}

fn parser(config: ParserConfig, store: &MemoryStore) -> Parser {
    ParserBuilder::new(config)
        .controller(MemoryController::new())
        .categories(store.clone())
        .build()
        .unwrap()
}

fn page(store: &MemoryStore, ident: &str, text: &str) -> Arc<dyn Topic> {
    store.insert_topic("guide", Record::new(ident, ident.to_uppercase()).text(text))
}

/// Counts conversions and wraps text in a paragraph.
#[derive(Default)]
struct CountingConverter {
    calls: AtomicUsize,
}

impl MarkupConverter for CountingConverter {
    fn name(&self) -> &str {
        "counting"
    }

    fn convert(&self, text: &str) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        format!("<p>{}</p>", text)
    }
}

/// Registers `tick()`, which counts template evaluations.
struct Ticker {
    ticks: Arc<AtomicUsize>,
}

impl Extension for Ticker {
    fn name(&self) -> &str {
        "ticker"
    }

    fn setup(&self, registry: &mut Registry<Self>) -> Result<(), ConfigError> {
        let ticks = Arc::clone(&self.ticks);
        registry
            .function("tick")
            .handler(move |_, _| Ok(Value::from(ticks.fetch_add(1, Ordering::SeqCst) + 1)))
            .add()?;
        Ok(())
    }
}

#[test]
fn test_output_cache_skips_template_and_markup() {
    let store = store();
    let ticks = Arc::new(AtomicUsize::new(0));
    let markdown = Arc::new(CountingConverter::default());
    let parser = ParserBuilder::new(ParserConfig::default())
        .controller(MemoryController::new())
        .categories(store.clone())
        .converters(Converters {
            markdown: markdown.clone(),
            textile: Arc::new(TextileConverter::default()),
        })
        .extension(InstalledExtension::new(Ticker { ticks: Arc::clone(&ticks) }).unwrap())
        .build()
        .unwrap();

    let topic = page(&store, "intro", "tick {{ tick() }}");
    let first = parser.render(Arc::clone(&topic)).unwrap();
    let second = parser.render(topic).unwrap();

    assert_eq!(first, "<p>tick 1</p>");
    assert_eq!(second, first);
    assert_eq!(ticks.load(Ordering::SeqCst), 1);
    assert_eq!(markdown.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_tagged_markdown_is_isolated() {
    let store = store();
    let parser = parser(plain_config(), &store);
    parser.with_markdown("markdown");
    let topic = page(&store, "intro", "a<markdown>**b**</markdown>c");
    assert_eq!(parser.render(topic).unwrap(), "a<strong>b</strong>c");
}

#[test]
fn test_tagged_blocks_convert_before_primary_format() {
    let store = store();
    let config = ParserConfig {
        primary_format: PrimaryFormat::Textile,
        markdown_tag: Some("md".into()),
        ..ParserConfig::default()
    };
    let parser = parser(config, &store);
    let topic = page(
        &store,
        "intro",
        "h1. Title\n\n<md>\n* one\n* _two_\n</md>\n\nSome _text_",
    );
    let html = parser.render(topic).unwrap();
    assert!(html.starts_with("<h1>Title</h1>"), "{}", html);
    assert!(
        html.contains("<ul>\n<li>one</li>\n<li><em>two</em></li>\n</ul>"),
        "{}",
        html
    );
    assert!(html.ends_with("<p>Some <em>text</em></p>"), "{}", html);
}

#[test]
fn test_tagged_textile_inside_markdown() {
    let store = store();
    let parser = parser(ParserConfig::default(), &store);
    parser.with_textile("tx");
    let topic = page(&store, "intro", "Hello <tx>*bold*</tx> world");
    assert_eq!(
        parser.render(topic).unwrap(),
        "<p>Hello <strong>bold</strong> world</p>\n"
    );
}

#[test]
fn test_strip_blanks_only_trims_leading_run() {
    let store = store();
    let parser = parser(plain_config(), &store);

    let leading = page(&store, "leading", "<p></p><p>x</p>");
    assert_eq!(parser.render(leading).unwrap(), "<p>x</p>");

    let trailing = page(&store, "trailing", "<p>x</p><p></p>");
    assert_eq!(parser.render(trailing).unwrap(), "<p>x</p><p></p>");

    parser.allow_blanks(true);
    let kept = page(&store, "kept", "<p></p><p>y</p>");
    assert_eq!(parser.render(kept).unwrap(), "<p></p><p>y</p>");
}

#[test]
fn test_category_text_prefixes_every_topic() {
    let store = MemoryStore::new();
    store.insert_category(Record::new("guide", "Guide").text("{% set site = 'Folio' %}\n"));
    let parser = parser(plain_config(), &store);
    let topic = page(&store, "intro", "{{ site }}: {{ this.topic.name }}");
    assert_eq!(parser.render(topic).unwrap(), "Folio: INTRO");
}

#[test]
fn test_includes_resolve_through_loader() {
    let store = store();
    let parser = parser(plain_config(), &store);
    let topic = page(&store, "intro", "{% include 'guide::nav' %}");
    assert_eq!(parser.render(topic).unwrap(), "NAV[intro]");
}

#[test]
fn test_unknown_include_category_propagates() {
    let store = store();
    let parser = parser(plain_config(), &store);
    let topic = page(&store, "intro", "{% include 'nope::nav' %}");
    let err = parser.render(topic).unwrap_err();
    assert!(
        matches!(err, WikiError::Loader(LoaderError::UnknownCategory(ref name)) if name == "nope::nav"),
        "{:?}",
        err
    );
}

#[test]
fn test_template_errors_propagate() {
    let store = store();
    let parser = parser(plain_config(), &store);
    let topic = page(&store, "intro", "{{ broken(");
    assert!(matches!(parser.render(topic), Err(WikiError::Template(_))));
}

#[test]
fn test_nested_render_from_template() {
    let store = store();
    let parser = parser(plain_config(), &store);
    page(&store, "inner", "inner of {{ this.topic.ident }}");
    let outer = page(
        &store,
        "outer",
        "[{{ this.parser.render('guide', 'inner') }}] {{ this.topic.ident }}",
    );
    assert_eq!(parser.render(outer).unwrap(), "[inner of inner] outer");
}

#[test]
fn test_topic_rendering_itself_is_a_cycle() {
    let store = store();
    let parser = parser(plain_config(), &store);
    let topic = page(&store, "loop", "x{{ this.topic.content() }}");
    let err = parser.render(topic).unwrap_err();
    assert!(
        matches!(err, WikiError::RenderCycle { ref name } if name == "guide::loop"),
        "{:?}",
        err
    );
}

#[test]
fn test_mutual_renders_are_a_cycle() {
    let store = store();
    let parser = parser(plain_config(), &store);
    page(&store, "b", "b{{ this.parser.render('guide', 'a') }}");
    let a = page(&store, "a", "a{{ this.parser.render('guide', 'b') }}");
    let err = parser.render(a).unwrap_err();
    assert!(
        matches!(err, WikiError::RenderCycle { ref name } if name == "guide::a"),
        "{:?}",
        err
    );
    assert!(parser.loader().output("guide::b").is_none());
}

#[test]
fn test_render_chain_stops_at_depth_limit() {
    let store = store();
    let parser = parser(plain_config(), &store);
    for n in 1..=MAX_RENDER_DEPTH + 1 {
        page(
            &store,
            &format!("c{}", n),
            &format!("{{{{ this.parser.render('guide', 'c{}') }}}}", n + 1),
        );
    }
    page(&store, &format!("c{}", MAX_RENDER_DEPTH + 2), "end");
    let err = parser.render(page(&store, "c0", "{{ this.parser.render('guide', 'c1') }}")).unwrap_err();
    assert!(
        matches!(err, WikiError::RenderDepth { limit, .. } if limit == MAX_RENDER_DEPTH),
        "{:?}",
        err
    );
}

#[test]
fn test_same_topic_may_render_twice_side_by_side() {
    let store = store();
    let parser = parser(plain_config(), &store);
    page(&store, "leaf", "leaf");
    let topic = page(
        &store,
        "twice",
        "{{ this.parser.render('guide', 'leaf') }}+{{ this.parser.render('guide', 'leaf') }}",
    );
    assert_eq!(parser.render(topic).unwrap(), "leaf+leaf");
}

#[test]
fn test_renders_from_several_threads() {
    let store = store();
    let parser = parser(plain_config(), &store);
    let handles: Vec<_> = (0..4)
        .map(|n| {
            let topic = page(&store, &format!("t{}", n), "{{ this.topic.ident }}");
            let parser = parser.clone();
            std::thread::spawn(move || parser.render(topic).unwrap())
        })
        .collect();
    let mut outputs: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    outputs.sort();
    assert_eq!(outputs, vec!["t0", "t1", "t2", "t3"]);
}

#[test]
fn test_globals_and_self_references() {
    let store = store();
    let mut config = plain_config();
    config.globals.insert("site".into(), serde_json::json!({"name": "Folio"}));
    config.context = serde_json::from_value(serde_json::json!({
        "this": false,
        "topic": "page",
        "category": true,
    }))
    .unwrap();
    let parser = parser(config, &store);
    let topic = page(
        &store,
        "intro",
        "{{ site.name }}/{{ category.name }}/{{ page.name }}/{{ 'this' if this is defined else 'no this' }}",
    );
    assert_eq!(parser.render(topic).unwrap(), "Folio/Guide/INTRO/no this");
}

proptest! {
    #[test]
    fn test_compound_name_round_trips(
        category in "[a-z0-9][a-z0-9_.:-]{0,15}[a-z0-9]",
        topic in "[a-z0-9:][a-z0-9_.:-]{0,15}",
    ) {
        prop_assume!(!category.contains("::"));
        let name = folio_render::Loader::make_name_from(&category, &topic).unwrap();
        let (c, t) = folio_render::Loader::split_name(&name).unwrap();
        prop_assert_eq!(c, category.as_str());
        prop_assert_eq!(t, topic.as_str());
    }

    #[test]
    fn test_compound_name_is_injective(
        a in ("[a-z]{1,4}", "[a-z:]{1,4}"),
        b in ("[a-z]{1,4}", "[a-z:]{1,4}"),
    ) {
        let first = folio_render::Loader::make_name_from(&a.0, &a.1).unwrap();
        let second = folio_render::Loader::make_name_from(&b.0, &b.1).unwrap();
        prop_assert_eq!(first == second, a == b);
    }
}

//! Built-in and custom extensions, exercised through templates.

use std::sync::Arc;

use folio_render::extension::{Extension, InstalledExtension, Registry, Safety};
use folio_render::memory::{MemoryController, MemoryStore, Record};
use folio_render::template::TagError;
use folio_render::{
    ConfigError, Context, Parser, ParserBuilder, ParserConfig, PrimaryFormat, Topic, WikiError,
};
use minijinja::Value;
use serde_json::json;

fn store() -> MemoryStore {
    let store = MemoryStore::new();
    store.insert_category(Record::new("guide", "Guide"));
    store.insert_category(Record::new("attic", "Attic").published(false));
    store.insert_topic("guide", Record::new("setup", "Setup"));
    store.insert_topic("guide", Record::new("draft", "Draft").published(false));
    store.insert_topic("attic", Record::new("old", "Old Stuff"));
    store
}

fn controller() -> MemoryController {
    MemoryController::new()
        .translation("i.star.char", "★")
        .translation("i.star.desc", "Favourite")
        .translation("greeting", "Hello, {name}!")
}

fn config() -> ParserConfig {
    ParserConfig {
        primary_format: PrimaryFormat::None,
        ..ParserConfig::default()
    }
}

fn build(config: ParserConfig, store: &MemoryStore) -> Parser {
    ParserBuilder::new(config)
        .controller(controller())
        .categories(store.clone())
        .build()
        .unwrap()
}

fn render_with(parser: &Parser, store: &MemoryStore, text: &str) -> Result<String, WikiError> {
    let topic: Arc<dyn Topic> =
        store.insert_topic("guide", Record::new("intro", "Introduction").text(text));
    parser.loader().clear_output(None);
    parser.render(topic)
}

fn render(text: &str) -> String {
    let store = store();
    let parser = build(config(), &store);
    render_with(&parser, &store, text).unwrap()
}

#[test]
fn test_link_filter_mini_language() {
    assert_eq!(
        render("{{ 'guide/setup == Click := Tip .= red bold'|a }}"),
        r#"<a href="/wiki/guide/setup" title="Tip" class="red bold">Click</a>"#
    );
    assert_eq!(
        render("{{ 'setup'|a }}"),
        r#"<a href="/wiki/guide/setup">Setup</a>"#
    );
    assert_eq!(
        render("{{ '/ == Home'|a }}"),
        r#"<a href="/wiki/guide">Home</a>"#
    );
    assert_eq!(render("{{ '   '|a }}"), "<a/>");
    assert_eq!(render("{{ 'guide/'|a }}"), "<a/>");
}

#[test]
fn test_link_filter_object_sigil() {
    assert_eq!(render("{{ ('$setup'|a).href }}"), "/wiki/guide/setup");
    assert_eq!(
        render("{% set l = '$setup'|a %}{{ l.set('class', 'x').html }}"),
        r#"<a href="/wiki/guide/setup" class="x">Setup</a>"#
    );
}

#[test]
fn test_link_functions() {
    assert_eq!(
        render("{{ at('setup', none, 'Go') }}"),
        r#"<a href="/wiki/guide/setup">Go</a>"#
    );
    assert_eq!(
        render("{{ ac('guide') }}|{{ ac('attic', 'old') }}"),
        r#"<a href="/wiki/guide">Guide</a>|<a href="/wiki/attic/old">Old Stuff</a>"#
    );
    assert_eq!(render("{{ ai('Up') }}"), r#"<a href="/wiki/guide">Up</a>"#);
    assert_eq!(
        render("{{ todo('later') }}"),
        r##"<a href="#todo" class="todo">later</a>"##
    );
}

#[test]
fn test_unpublished_targets_render_todo() {
    assert_eq!(
        render("{{ at('draft') }}"),
        r##"<a href="#todo" class="todo">Draft</a>"##
    );
    assert_eq!(
        render("{{ ac('attic') }}"),
        r##"<a href="#todo" class="todo">Attic</a>"##
    );
    assert_eq!(
        render("{{ 'ghost'|a }}"),
        r##"<a href="#todo" class="todo">ghost</a>"##
    );
}

#[test]
fn test_icon_filter_applies_description_segment() {
    assert_eq!(
        render("{{ 'star/Shiny/big gold'|i }}"),
        r#"<i class="big gold star" title="Shiny">★</i>"#
    );
    assert_eq!(
        render("{{ 'star'|i }}"),
        r#"<i class="star" title="Favourite">★</i>"#
    );
    assert_eq!(
        render("{{ i('star', 'Mine', 'small') }}"),
        r#"<i class="small star" title="Mine">★</i>"#
    );
}

#[test]
fn test_document_lookups() {
    assert_eq!(render("{{ topic('setup').name }}"), "Setup");
    assert_eq!(render("{{ topic().ident }}"), "intro");
    assert_eq!(render("{{ 'live' if category('attic').published else 'hidden' }}"), "hidden");
    assert_eq!(render("{{ category().name }}"), "Guide");
    assert_eq!(render("{{ ('attic'|topic('old')).name }}"), "Old Stuff");
    assert_eq!(render("{% if topic('nope') is none %}none{% endif %}"), "none");
}

#[test]
fn test_text_function() {
    assert_eq!(render("{{ text('greeting', {'name': 'Ada'}) }}"), "Hello, Ada!");
    assert_eq!(render("{{ text('missing.key') }}"), "missing.key");
}

#[test]
fn test_home_from_context_hook_overrides_global() {
    let store = store();
    let mut config = config();
    config.globals.insert("home".into(), json!("global"));
    config.globals.insert("site".into(), json!("Folio"));
    let parser = build(config, &store);
    assert_eq!(
        render_with(&parser, &store, "{{ home }} {{ site }}").unwrap(),
        r#"<a href="/wiki/guide">Guide</a> Folio"#
    );
}

#[test]
fn test_formatting_filters() {
    assert_eq!(
        render("{{ '**x**'|markdown }}"),
        "<p><strong>x</strong></p>\n"
    );
    assert_eq!(render("{{ '_y_'|textile }}"), "<p><em>y</em></p>");
}

#[test]
fn test_switch_tag() {
    let text = "{% switch topic().ident %}\
        {% case 'setup', 'intro' %}known\
        {% case 'other' %}other\
        {% default %}unknown\
        {% endswitch %}";
    assert_eq!(render(text), "known");
}

#[test]
fn test_switch_tag_in_include() {
    let store = MemoryStore::new();
    store.insert_category(Record::new("guide", "Guide").include(
        "nav",
        "{% switch 2 %}{% case 1 %}one{% case 2 %}two{% endswitch %}",
    ));
    let parser = build(config(), &store);
    assert_eq!(
        render_with(&parser, &store, "[{% include 'guide::nav' %}]").unwrap(),
        "[two]"
    );
}

#[test]
fn test_malformed_switch_is_tag_error() {
    let store = store();
    let parser = build(config(), &store);
    let err = render_with(
        &parser,
        &store,
        "{% switch 1 %}text{% case 1 %}a{% endswitch %}",
    )
    .unwrap_err();
    assert!(matches!(err, WikiError::Tag(TagError { ref tag, .. }) if tag == "switch"));
}

#[test]
fn test_extensions_can_be_replaced_by_config() {
    let store = store();
    let config = ParserConfig {
        set_extensions: Some(vec![json!("switch")]),
        ..config()
    };
    let parser = build(config, &store);
    assert!(parser.extension("wiki").is_none());
    assert!(render_with(&parser, &store, "{{ 'setup'|a }}").is_err());
    assert_eq!(
        render_with(&parser, &store, "{{ 'home' if home is defined else 'no home' }}").unwrap(),
        "no home"
    );
}

#[test]
fn test_wiki_options_from_config() {
    let store = store();
    let config = ParserConfig {
        set_extensions: Some(vec![json!({"wiki": {"todo_href": "#missing", "todo_class": "gap"}})]),
        ..config()
    };
    let parser = build(config, &store);
    assert_eq!(
        render_with(&parser, &store, "{{ 'draft'|a }}").unwrap(),
        r##"<a href="#missing" class="gap">Draft</a>"##
    );
}

#[test]
fn test_invalid_wiki_options_fail_at_build() {
    let config = ParserConfig {
        set_extensions: Some(vec![json!({"wiki": {"nope": true}})]),
        ..config()
    };
    let err = ParserBuilder::new(config)
        .controller(controller())
        .categories(store())
        .build()
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidOptions { ref extension, .. } if extension == "wiki"));
}

/// A user extension registering the same names twice.
struct Shout;

impl Extension for Shout {
    fn name(&self) -> &str {
        "shout"
    }

    fn setup(&self, registry: &mut Registry<Self>) -> Result<(), ConfigError> {
        registry
            .filter("shout")
            .handler(|_, args| Ok(Value::from(args[0].to_string())))
            .add()?
            .filter("shout")
            .handler(|_, args| Ok(Value::from(format!("{}!", args[0].to_string().to_uppercase()))))
            .safe(Safety::All)
            .add()?
            .function("pair")
            .handler(|_, args| Ok(Value::from(args.len())))
            .max_args(1)
            .variadic()
            .add()?
            .test("loud")
            .handler(|_, args| Ok(Value::from(args[0].to_string().ends_with('!'))))
            .add()?;
        Ok(())
    }

    fn setup_context(&self, context: &mut Context) {
        context.set("volume", 11);
    }
}

#[test]
fn test_custom_extension() {
    let store = store();
    let parser = ParserBuilder::new(config())
        .controller(controller())
        .categories(store.clone())
        .extension(InstalledExtension::new(Shout).unwrap())
        .build()
        .unwrap();
    assert_eq!(
        render_with(&parser, &store, "{{ 'hi'|shout }}").unwrap(),
        "HI!"
    );
    assert_eq!(
        render_with(&parser, &store, "{{ pair(1, 2, 3) }}").unwrap(),
        "2"
    );
    assert_eq!(
        render_with(&parser, &store, "{{ 'loud' if ('a'|shout) is loud else 'quiet' }} {{ volume }}").unwrap(),
        "loud 11"
    );
}

#[test]
fn test_custom_extension_factory_from_config() {
    let store = store();
    let config = ParserConfig {
        add_extensions: Some(vec![json!("shout")]),
        ..config()
    };
    let parser = ParserBuilder::new(config)
        .controller(controller())
        .categories(store.clone())
        .register_extension("shout", |_| InstalledExtension::new(Shout))
        .build()
        .unwrap();
    assert_eq!(parser.extensions().len(), 4);
    assert_eq!(
        render_with(&parser, &store, "{{ 'x'|shout }}").unwrap(),
        "X!"
    );
}

struct Spaceship;

impl Extension for Spaceship {
    fn name(&self) -> &str {
        "spaceship"
    }

    fn setup(&self, registry: &mut Registry<Self>) -> Result<(), ConfigError> {
        registry
            .operator("<=>")
            .precedence(20)
            .left()
            .handler(|args| Ok(Value::from(args[0] == args[1])))
            .add()?;
        Ok(())
    }
}

#[test]
fn test_operators_are_rejected_at_build() {
    let err = ParserBuilder::new(config())
        .controller(controller())
        .categories(store())
        .extension(InstalledExtension::new(Spaceship).unwrap())
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Unsupported { feature: "operators", ref name } if name == "<=>"
    ));
}

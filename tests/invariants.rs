//! Contract Invariant Tests
//!
//! These tests verify the non-negotiable guarantees through the public API.

use folio_core::{
    content::{BoundValue, ContentPath},
    nodes::{create_container, create_grid, create_heading, create_image, create_text},
    AssetLibrary, Category, CompatibilityEngine, CompatibilityRule, ContentInstance, DataBinder,
    Document, Price, Product, Props, RuleSet, ScoringPolicy, Template, TemplateBuilder,
    TemplateRegistry, Theme, ThemeRegistry, ROOT_NODE_ID,
};
use serde_json::{json, Value};

fn content() -> ContentInstance {
    let raw = json!({
        "catalogue": {
            "id": "cat-1",
            "name": "Spring Range",
            "tagline": "Made to last",
            "year": 2025,
            "settings": {
                "footerText": "Thank you",
                "gallery": ["g1.jpg", "g2.jpg"],
                "contactDetails": { "phone": "+44 20 7946 0000" }
            }
        },
        "profile": {
            "companyName": "Acme & Sons",
            "email": "hello@acme.test",
            "logoUrl": "https://cdn.acme.test/logo.png",
            "socialLinks": { "instagram": "@acme" }
        },
        "products": [
            { "id": "p1", "name": "Oak Chair", "price": "149.00", "currency": "GBP", "sku": "OC-1", "images": ["chair.jpg"] },
            { "id": "p2", "name": "Brass Lamp", "description": "Warm light", "price": 89, "isActive": false }
        ],
        "categories": []
    });
    folio_core::validate(&raw).unwrap()
}

const MARKUP_PAGE: &str = concat!(
    r#"<article class="page">"#,
    r#"<header><img data-content="profile.logoUrl" src="logo-placeholder.svg"/>"#,
    r#"<h1 data-content="catalogue.name">Catalogue title</h1>"#,
    r#"<p data-content="catalogue.tagline">Tagline</p>"#,
    r#"<span data-content="catalogue.year">Year</span></header>"#,
    r#"<figure><img data-content="catalogue.settings.gallery" src=""/></figure>"#,
    r#"<section data-content="products"><div class="placeholder">Products appear here</div></section>"#,
    r#"<footer><p data-content="catalogue.settings.footerText">Footer</p>"#,
    r#"<span data-content="catalogue.settings.contactDetails.phone">Phone</span>"#,
    r#"<strong data-content="profile.companyName">Company</strong>"#,
    r#"<input data-content="profile.email" value=""/>"#,
    r#"<a data-content="profile.socialLinks.instagram">Instagram</a></footer>"#,
    r#"</article>"#,
);

fn slot_paths() -> Vec<ContentPath> {
    [
        "profile.logoUrl",
        "catalogue.name",
        "catalogue.tagline",
        "catalogue.year",
        "catalogue.settings.gallery",
        "catalogue.settings.footerText",
        "catalogue.settings.contactDetails.phone",
        "profile.companyName",
        "profile.email",
        "profile.socialLinks.instagram",
    ]
    .iter()
    .map(|p| ContentPath::parse(p).unwrap())
    .collect()
}

fn node_page() -> Document {
    let mut doc = Document::new(create_container(Props::new(), vec![]));
    let nodes = vec![
        ("logo", create_image("logo.svg", "Logo", Props::new()).bound_to("profile.logoUrl")),
        ("title", create_heading("Title", 1, Props::new()).bound_to("catalogue.name")),
        ("tagline", create_text("Tagline", Props::new()).bound_to("catalogue.tagline")),
        ("company", create_text("Company", Props::new()).bound_to("profile.companyName")),
        ("products", create_grid(3, 16, Props::new(), vec![]).bound_to("products")),
    ];
    for (id, mut node) in nodes {
        node.id = id.to_string();
        doc.append_child(ROOT_NODE_ID, node).unwrap();
    }
    doc
}

// --- Binding ---

#[test]
fn invariant_populate_is_idempotent() {
    let markup = DataBinder::markup();
    let once = markup.populate(&MARKUP_PAGE.to_string(), &content());
    assert_eq!(markup.populate(&once, &content()), once);

    let nodes = DataBinder::nodes();
    let once = nodes.populate(&node_page(), &content());
    let twice = nodes.populate(&once, &content());
    assert_eq!(twice, once);
    assert_eq!(twice.get("products").unwrap().children.len(), 2);
}

#[test]
fn invariant_populate_with_empty_content_is_identity() {
    let empty = ContentInstance::default();
    let source = MARKUP_PAGE.to_string();
    assert_eq!(DataBinder::markup().populate(&source, &empty), source);
    assert_eq!(DataBinder::nodes().populate(&node_page(), &empty), node_page());
}

#[test]
fn invariant_populate_never_mutates_input() {
    let doc = node_page();
    let before = doc.clone();
    let _ = DataBinder::nodes().populate(&doc, &content());
    assert_eq!(doc, before);
}

#[test]
fn invariant_malformed_document_returns_input() {
    let broken = r#"<section data-content="catalogue.name"><p>no close</section>"#.to_string();
    assert_eq!(DataBinder::markup().populate(&broken, &content()), broken);

    let mut cyclic = node_page();
    cyclic.get_mut("title").unwrap().parent = Some("company".into());
    assert_eq!(DataBinder::nodes().populate(&cyclic, &content()), cyclic);
}

#[test]
fn invariant_extract_reproduces_populated_fields_for_any_baseline() {
    let source = content();
    let markup = DataBinder::markup();
    let populated = markup.populate(&MARKUP_PAGE.to_string(), &source);

    let mut other = ContentInstance::default();
    other.catalogue.name = "Something else".into();
    other.profile.email = Some("other@example.test".into());
    other.products = vec![Product {
        id: "zz".into(),
        name: "Unrelated".into(),
        ..Default::default()
    }];

    for baseline in [ContentInstance::default(), other] {
        let extracted = markup.extract(&populated, &baseline).unwrap();
        for path in slot_paths() {
            assert_eq!(extracted.resolve(&path), source.resolve(&path), "path {}", path);
        }
        assert_eq!(extracted.products, source.products);
        assert!(!extracted.products[1].is_active);
        assert_eq!(extracted.products[0].price, Some(Price::Decimal("149.00".into())));
        assert_eq!(extracted.products[0].sku.as_deref(), Some("OC-1"));
        assert_eq!(extracted.products[1].description.as_deref(), Some("Warm light"));
    }
}

#[test]
fn invariant_list_setting_extracts_as_list() {
    let populated = DataBinder::markup().populate(&MARKUP_PAGE.to_string(), &content());
    assert!(populated.contains(r#"src="g1.jpg""#));
    let extracted = DataBinder::markup()
        .extract(&populated, &ContentInstance::default())
        .unwrap();
    assert_eq!(extracted.catalogue.settings["gallery"], json!(["g1.jpg", "g2.jpg"]));
}

#[test]
fn invariant_populate_accepts_plain_html() {
    let page = r#"<div><h1 data-content="catalogue.name">Title</h1><img src="hero.png"><br>&nbsp;</div>"#.to_string();
    let populated = DataBinder::markup().populate(&page, &content());
    assert!(populated.contains("Spring Range"));
    assert!(populated.contains(r#"<img src="hero.png"><br>"#));
    assert_eq!(DataBinder::markup().populate(&populated, &content()), populated);
}

#[test]
fn invariant_extract_keeps_unslotted_baseline_fields() {
    let mut baseline = content();
    baseline.profile.phone = Some("555-0100".into());
    let populated = DataBinder::nodes().populate(&node_page(), &content());
    let extracted = DataBinder::nodes().extract(&populated, &baseline).unwrap();
    assert_eq!(extracted.profile.phone.as_deref(), Some("555-0100"));
    assert_eq!(
        extracted.resolve(&ContentPath::parse("profile.companyName").unwrap()),
        Some(BoundValue::Text("Acme & Sons".into()))
    );
}

#[test]
fn invariant_products_expand_in_order_including_inactive() {
    let populated = DataBinder::nodes().populate(&node_page(), &content());
    let cards: Vec<&str> = populated
        .get("products")
        .unwrap()
        .children
        .iter()
        .map(|id| populated.get(id).unwrap().prop_str("productId").unwrap())
        .collect();
    assert_eq!(cards, vec!["p1", "p2"]);
    assert_eq!(populated.check_graph(), Ok(()));
}

#[test]
fn invariant_unknown_paths_fail_fast() {
    let doc = r#"<div><h1 data-content="catalogue.nmae">x</h1></div>"#.to_string();
    assert!(DataBinder::markup().check_paths(&doc).is_err());
    assert!(DataBinder::markup().check_paths(&MARKUP_PAGE.to_string()).is_ok());
}

// --- Schema ---

#[test]
fn invariant_schema_reports_every_violation() {
    let raw = json!({
        "catalogue": { "id": 7, "name": "", "year": "soon" },
        "profile": {},
        "products": [
            { "id": "p1", "name": "Chair", "price": "cheap", "tags": ["ok", 3] },
            { "name": "No id" }
        ],
        "categories": [{ "id": "c1" }]
    });
    let err = folio_core::validate(&raw).unwrap_err();
    let paths: Vec<&str> = err.violations.iter().map(|v| v.path.as_str()).collect();
    for expected in [
        "catalogue.id",
        "catalogue.year",
        "products[0].price",
        "products[0].tags[1]",
        "products[1].id",
        "categories[0].name",
    ] {
        assert!(paths.contains(&expected), "missing violation at {}: {:?}", expected, paths);
    }
    assert!(!folio_core::is_valid(&raw));
}

// --- Builder ---

#[test]
fn invariant_build_does_not_check_graph() {
    let mut orphan = create_text("Loose", Props::new());
    orphan.parent = Some("missing".into());
    let template = TemplateBuilder::new()
        .id("hand-made")
        .name("Hand made")
        .description("Authored by hand")
        .category(Category::Creative)
        .root(create_container(Props::new(), vec![]))
        .node("loose", orphan)
        .build()
        .unwrap();

    assert!(template.document.unwrap().check_graph().is_err());
}

// --- Registries ---

fn template(id: &str, category: Category, features: &[&str]) -> Template {
    let mut builder = TemplateBuilder::new()
        .id(id)
        .name(id)
        .description(format!("{} layout", id))
        .category(category)
        .root(create_container(Props::new(), vec![]));
    for feature in features {
        builder = builder.requires_feature(*feature);
    }
    builder.build().unwrap()
}

fn theme(id: &str, category: Category, features: &[&str]) -> Theme {
    serde_json::from_value(json!({
        "id": id,
        "name": id,
        "category": category,
        "features": features,
    }))
    .unwrap()
}

fn assert_index_consistent(registry: &TemplateRegistry) {
    for category in Category::ALL {
        let mut indexed: Vec<&str> = registry.by_category(category).iter().map(|t| t.id.as_str()).collect();
        let mut expected: Vec<&str> = registry
            .all()
            .iter()
            .filter(|t| t.category == category)
            .map(|t| t.id.as_str())
            .collect();
        indexed.sort();
        expected.sort();
        assert_eq!(indexed, expected, "category {}", category);
    }
    assert!(registry.categories().iter().all(|(_, count)| *count > 0));
}

#[test]
fn invariant_category_index_tracks_every_mutation() {
    let mut registry = TemplateRegistry::new();
    let ids = ["a", "b", "c", "d", "e"];
    let mut seed: u64 = 0x5eed;
    for _ in 0..200 {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let id = ids[(seed >> 33) as usize % ids.len()];
        let category = Category::ALL[(seed >> 40) as usize % 3];
        if (seed >> 50) % 3 == 0 {
            registry.unregister(id);
        } else {
            registry.register(template(id, category, &[]));
        }
        assert_index_consistent(&registry);
    }
}

#[test]
fn invariant_register_many_last_write_wins() {
    let mut registry = TemplateRegistry::new();
    registry.register_many(vec![
        template("x", Category::Bold, &[]),
        template("y", Category::Bold, &[]),
        template("x", Category::Minimal, &[]),
    ]);
    assert_eq!(registry.get("x").unwrap().category, Category::Minimal);
    assert_eq!(registry.by_category(Category::Bold).len(), 1);
    assert_index_consistent(&registry);

    registry.unregister("y");
    assert!(registry.by_category(Category::Bold).is_empty());
    assert!(!registry.categories().iter().any(|(c, _)| *c == Category::Bold));
}

// --- Compatibility ---

fn registries(templates: Vec<Template>, themes: Vec<Theme>) -> (TemplateRegistry, ThemeRegistry) {
    let mut t = TemplateRegistry::new();
    t.register_many(templates);
    let mut h = ThemeRegistry::new();
    h.register_many(themes);
    (t, h)
}

#[test]
fn invariant_scenario_category_match_scores_full() {
    let (t, h) = registries(
        vec![template("poster-basic", Category::Modern, &[])],
        vec![theme("mono", Category::Modern, &[])],
    );
    let result = CompatibilityEngine::default().test(&t, &h, "poster-basic", "mono");
    assert_eq!(result.score, 100);
    assert!(result.compatible);
}

#[test]
fn invariant_scenario_two_missing_features() {
    let (t, h) = registries(
        vec![template("showcase", Category::Modern, &["gallery", "video"])],
        vec![theme("mono", Category::Modern, &[])],
    );
    let result = CompatibilityEngine::default().test(&t, &h, "showcase", "mono");
    assert_eq!(result.score, 60);
    assert!(result.compatible);
    assert_eq!(result.missing_features, vec!["gallery", "video"]);
    assert_eq!(result.warnings.len(), 2);
}

#[test]
fn invariant_scenario_below_threshold_is_incompatible() {
    let (t, h) = registries(
        vec![template("heavy", Category::Modern, &["a", "b", "c", "d"])],
        vec![theme("mono", Category::Modern, &[])],
    );
    let result = CompatibilityEngine::default().test(&t, &h, "heavy", "mono");
    assert_eq!(result.score, 20);
    assert!(!result.compatible);
}

#[test]
fn invariant_scenario_deny_rule_wins() {
    let (t, h) = registries(
        vec![template("x", Category::Modern, &["gallery"])],
        vec![theme("y", Category::Modern, &["gallery"])],
    );
    let mut rules = RuleSet::new();
    rules.insert(CompatibilityRule::deny("x", "y", "Layout clash"));
    let result = CompatibilityEngine::new(rules, ScoringPolicy::default()).test(&t, &h, "x", "y");
    assert_eq!(result.score, 0);
    assert!(!result.compatible);
}

#[test]
fn invariant_scoring_is_deterministic() {
    let (t, h) = registries(
        vec![template("t1", Category::Bold, &["gallery"]), template("t2", Category::Classic, &[])],
        vec![theme("h1", Category::Bold, &[]), theme("h2", Category::Classic, &["gallery"])],
    );
    let mut rules = RuleSet::new();
    let mut limited = CompatibilityRule::allow("any", "h2");
    limited.limitations = vec!["No dark mode".into()];
    rules.insert(limited);
    let engine = CompatibilityEngine::new(rules, ScoringPolicy::default());

    for (tid, hid) in [("t1", "h1"), ("t1", "h2"), ("t2", "h1"), ("t2", "h2")] {
        assert_eq!(engine.test(&t, &h, tid, hid), engine.test(&t, &h, tid, hid));
    }
    assert_eq!(engine.matrix(&t, &h).unwrap(), engine.matrix(&t, &h).unwrap());
}

#[test]
fn invariant_closing_feature_gap_never_lowers_score() {
    let wanted = ["gallery", "video", "forms", "maps", "print"];
    for category in [Category::Modern, Category::Elegant] {
        let mut provided: Vec<&str> = Vec::new();
        let mut last = 0;
        for feature in wanted.iter().copied().chain(std::iter::once("")) {
            let (t, h) = registries(
                vec![template("t", Category::Modern, &wanted)],
                vec![theme("h", category, &provided)],
            );
            let score = CompatibilityEngine::default().test(&t, &h, "t", "h").score;
            assert!(score >= last, "score dropped from {} to {} after adding features", last, score);
            last = score;
            provided.push(feature);
        }
    }
}

#[test]
fn invariant_library_matrix_follows_mutations() {
    let mut library = AssetLibrary::default();
    library.register_template(template("t", Category::Modern, &[]));
    library.register_theme(theme("h", Category::Modern, &[]));
    let before = library.matrix().unwrap().clone();
    assert!(before.get("t", "h").unwrap().compatible);

    library.add_rule(CompatibilityRule::deny("t", "any", "retired"));
    let after = library.matrix().unwrap();
    assert_ne!(after.fingerprint, before.fingerprint);
    assert!(!after.get("t", "h").unwrap().compatible);
}

#[test]
fn invariant_document_json_round_trips_through_root_key() {
    let doc = node_page();
    let value: Value = doc.to_json().unwrap();
    assert!(value.get(ROOT_NODE_ID).is_some());
    assert_eq!(value["title"]["type"], json!("Heading"));
    assert_eq!(Document::from_json(&value).unwrap(), doc);
}

#[test]
fn invariant_bundled_assets_load_and_pass_graph_checks() {
    let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("assets");
    let library = AssetLibrary::load_from_dir(&root).unwrap();
    assert_eq!(library.templates().len(), 2);
    assert_eq!(library.themes().len(), 2);

    let orchestrator = folio_core::Orchestrator::in_memory(library);
    for template in orchestrator.library().templates().all() {
        let loaded = orchestrator.load_template(&template.id).unwrap();
        assert_eq!(loaded.page_count(), template.page_count);
    }

    let best = orchestrator.library().best_themes("gallery-showcase", 5).unwrap();
    assert_eq!(best[0].theme_id, "velvet");
    assert_eq!(best[0].score, 100);
}

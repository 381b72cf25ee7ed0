pub mod html;
pub mod wikitext;

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::items::ItemDb;

/// One drop of a page. `id` is `None` when the name is not in the item catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DropRecord {
    pub name: String,
    pub id: Option<u32>,
}

/// A source of drop names for a page.
pub trait Extractor {
    fn extract(&self, markup: &str) -> BTreeSet<String>;
}

pub struct HtmlTables;

impl Extractor for HtmlTables {
    fn extract(&self, markup: &str) -> BTreeSet<String> {
        html::extract(markup)
    }
}

pub struct WikitextTemplates;

impl Extractor for WikitextTemplates {
    fn extract(&self, markup: &str) -> BTreeSet<String> {
        wikitext::extract(markup)
    }
}

/// "Nothing" rows mark an empty roll, not an item.
pub fn is_nothing(name: &str) -> bool {
    name.eq_ignore_ascii_case("nothing")
}

/// Drop names for a page: the rendered tables if they yield anything,
/// otherwise the source templates. The two are never merged.
pub fn drop_names(rendered: &str, source: &str) -> BTreeSet<String> {
    drop_names_with(&HtmlTables, &WikitextTemplates, rendered, source)
}

pub fn drop_names_with(
    primary: &impl Extractor,
    fallback: &impl Extractor,
    rendered: &str,
    source: &str,
) -> BTreeSet<String> {
    let names = primary.extract(rendered);
    if !names.is_empty() {
        debug!("{} drops from rendered tables", names.len());
        return names;
    }
    let names = fallback.extract(source);
    debug!("{} drops from source templates", names.len());
    names
}

/// Resolve every name against the catalog, in name order.
pub fn resolve_all(names: BTreeSet<String>, items: &ItemDb) -> Vec<DropRecord> {
    names
        .into_iter()
        .map(|name| {
            let id = items.resolve(&name);
            DropRecord { name, id }
        })
        .collect()
}

pub fn extract_drops(rendered: &str, source: &str, items: &ItemDb) -> Vec<DropRecord> {
    resolve_all(drop_names(rendered, source), items)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::items::ItemRecord;

    struct Counting<E> {
        inner: E,
        calls: Cell<usize>,
    }

    impl<E: Extractor> Counting<E> {
        fn new(inner: E) -> Self {
            Self { inner, calls: Cell::new(0) }
        }
    }

    impl<E: Extractor> Extractor for Counting<E> {
        fn extract(&self, markup: &str) -> BTreeSet<String> {
            self.calls.set(self.calls.get() + 1);
            self.inner.extract(markup)
        }
    }

    const DROPS_HTML: &str = r#"<table class="item-drops">
        <tr><th>Header</th></tr>
        <tr><td>1/1</td><td>Bones</td></tr>
        <tr><td>1/5</td><td>Coins</td></tr>
    </table>"#;

    fn items() -> ItemDb {
        ItemDb::from_records([
            ItemRecord { id: 526, name: "Bones".into() },
            ItemRecord { id: 995, name: "Coins".into() },
        ])
    }

    #[test]
    fn html_tables_end_to_end() {
        let drops = extract_drops(DROPS_HTML, "", &items());
        assert_eq!(
            drops,
            vec![
                DropRecord { name: "Bones".into(), id: Some(526) },
                DropRecord { name: "Coins".into(), id: Some(995) },
            ]
        );
    }

    #[test]
    fn fallback_not_invoked_when_html_has_drops() {
        let primary = Counting::new(HtmlTables);
        let fallback = Counting::new(WikitextTemplates);
        let names = drop_names_with(&primary, &fallback, DROPS_HTML, "{{DropTable|item1=Other}}");
        assert_eq!(primary.calls.get(), 1);
        assert_eq!(fallback.calls.get(), 0);
        assert!(!names.contains("Other"));
    }

    #[test]
    fn falls_back_to_templates() {
        let primary = Counting::new(HtmlTables);
        let fallback = Counting::new(WikitextTemplates);
        let names = drop_names_with(
            &primary,
            &fallback,
            "<p>No tables here</p>",
            "{{DropTable|item1=Coins (m)|item2=Mystery box}}",
        );
        assert_eq!(fallback.calls.get(), 1);

        let drops = resolve_all(names, &items());
        assert_eq!(
            drops,
            vec![
                DropRecord { name: "Coins (m)".into(), id: Some(995) },
                DropRecord { name: "Mystery box".into(), id: None },
            ]
        );
    }

    #[test]
    fn duplicate_names_appear_once() {
        let html = r#"<table class="item-drops"><tr><th>h</th></tr>
            <tr><td>1</td><td>Bones</td></tr><tr><td>2</td><td>Bones</td></tr></table>"#;
        let drops = extract_drops(html, "", &items());
        assert_eq!(drops.len(), 1);
    }

    #[test]
    fn empty_inputs_yield_no_drops() {
        assert!(extract_drops("", "", &items()).is_empty());
        assert!(extract_drops("<html", "{{broken", &ItemDb::default()).is_empty());
    }

    #[test]
    fn callers_can_exclude_nothing() {
        let html = r#"<table class="item-drops"><tr><th>h</th></tr>
            <tr><td>1</td><td>Nothing</td></tr><tr><td>2</td><td>Bones</td></tr></table>"#;
        let mut names = drop_names(html, "");
        names.retain(|n| !is_nothing(n));
        let drops = resolve_all(names, &items());
        assert_eq!(drops, vec![DropRecord { name: "Bones".into(), id: Some(526) }]);
    }

    #[test]
    fn goblin_fixtures_against_item_db() {
        let items = ItemDb::load("tests/fixtures/item-db.json").unwrap();
        let html = std::fs::read_to_string("tests/fixtures/goblin.html").unwrap();
        let wikitext = std::fs::read_to_string("tests/fixtures/goblin.wikitext").unwrap();

        let from_html = extract_drops(&html, &wikitext, &items);
        assert!(from_html.iter().all(|d| d.name != "Uncut sapphire"));
        assert!(from_html.contains(&DropRecord { name: "Coins (m)".into(), id: Some(995) }));
        assert!(from_html.contains(&DropRecord { name: "Nothing".into(), id: None }));

        let from_source = extract_drops("", &wikitext, &items);
        assert!(from_source.contains(&DropRecord { name: "Uncut sapphire".into(), id: Some(1607) }));
        assert!(from_source.contains(&DropRecord { name: "Goblin mail".into(), id: Some(288) }));
    }

    #[test]
    fn unresolved_names_are_kept() {
        let drops = extract_drops(DROPS_HTML, "", &ItemDb::default());
        assert_eq!(drops.len(), 2);
        assert!(drops.iter().all(|d| d.id.is_none()));
    }
}

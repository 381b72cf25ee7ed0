use std::collections::BTreeSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

static DROP_TABLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.item-drops").unwrap());
static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static MONSTER_INFOBOX_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.infobox-monster").unwrap());

/// Item names from the second cell of every body row in `item-drops` tables.
pub fn extract(rendered: &str) -> BTreeSet<String> {
    let document = Html::parse_fragment(rendered);
    let mut names = BTreeSet::new();

    for table in document.select(&DROP_TABLE_SEL) {
        for row in table.select(&ROW_SEL).skip(1) {
            if let Some(cell) = row.select(&CELL_SEL).nth(1) {
                names.insert(cell_text(cell));
            }
        }
    }

    names
}

/// Monster pages carry an `infobox-monster` table in their rendered markup.
pub fn has_monster_infobox(rendered: &str) -> bool {
    Html::parse_fragment(rendered)
        .select(&MONSTER_INFOBOX_SEL)
        .next()
        .is_some()
}

fn cell_text(cell: ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn second_cell_of_each_row() {
        let html = r#"<table class="wikitable item-drops">
            <tr><th>Header</th></tr>
            <tr><td>1/1</td><td> Bones </td><td>1</td></tr>
            <tr><td>1/5</td><td><a href="/w/Coins">Coins</a></td></tr>
        </table>"#;
        assert_eq!(extract(html), set(&["Bones", "Coins"]));
    }

    #[test]
    fn header_row_is_skipped_even_with_cells() {
        let html = r#"<table class="item-drops">
            <tr><td>Icon</td><td>Item</td></tr>
            <tr><td>x</td><td>Bones</td></tr>
        </table>"#;
        assert_eq!(extract(html), set(&["Bones"]));
    }

    #[test]
    fn short_rows_are_skipped() {
        let html = r#"<table class="item-drops">
            <tr><th>Item</th></tr>
            <tr><td>only one</td></tr>
            <tr><td>1/1</td><td>Bones</td></tr>
        </table>"#;
        assert_eq!(extract(html), set(&["Bones"]));
    }

    #[test]
    fn tables_are_unioned_and_deduplicated() {
        let html = r#"
            <table class="item-drops"><tr><th>h</th></tr><tr><td>1</td><td>Bones</td></tr></table>
            <table class="item-drops"><tr><th>h</th></tr><tr><td>1</td><td>Bones</td></tr><tr><td>2</td><td>Coins</td></tr></table>"#;
        assert_eq!(extract(html), set(&["Bones", "Coins"]));
    }

    #[test]
    fn other_tables_are_ignored() {
        let html = r#"<table class="wikitable"><tr><th>h</th></tr><tr><td>1</td><td>Bones</td></tr></table>"#;
        assert!(extract(html).is_empty());
        assert!(extract("").is_empty());
        assert!(extract("<table class=\"item-drops\"><tr><td>").is_empty());
    }

    #[test]
    fn monster_infobox_detection() {
        assert!(has_monster_infobox(r#"<table class="infobox infobox-monster"><tr><td>x</td></tr></table>"#));
        assert!(!has_monster_infobox(r#"<table class="infobox-item"></table>"#));
        assert!(!has_monster_infobox(""));
    }

    #[test]
    fn goblin_fixture() {
        let html = std::fs::read_to_string("tests/fixtures/goblin.html").unwrap();
        assert_eq!(
            extract(&html),
            set(&["Bones", "Bronze sq shield", "Coins (m)", "Goblin mail", "Nothing"])
        );
        assert!(has_monster_infobox(&html));
    }
}

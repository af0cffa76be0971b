use crate::utils::error::{EtlError, Result};
use scraper::{ElementRef, Selector};

/// 編譯 CSS 選擇器，失敗時回傳 ParseError
pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| EtlError::ParseError {
        page: "selector".to_string(),
        message: format!("invalid selector '{}': {}", css, e),
    })
}

/// 元素內所有文字節點 (不做處理)
pub fn raw_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

/// 整段文字去除頭尾空白
pub fn text(element: ElementRef<'_>) -> String {
    raw_text(element).trim().to_string()
}

/// 每個文字節點各自去除空白後直接相連
pub fn stripped_text(element: ElementRef<'_>) -> String {
    element.text().map(str::trim).collect()
}

/// 每個文字節點去除空白後以單一空白相連
pub fn spaced_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// 列的直接子儲存格 (td/th)
pub fn cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    row.child_elements()
        .filter(|el| matches!(el.value().name(), "td" | "th"))
        .collect()
}

/// 列的直接子 td
pub fn data_cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    row.child_elements()
        .filter(|el| el.value().name() == "td")
        .collect()
}

/// 第一個符合選擇器的子孫元素的屬性值
pub fn first_attr<'a>(element: ElementRef<'a>, sel: &Selector, attr: &str) -> Option<&'a str> {
    element.select(sel).find_map(|el| el.value().attr(attr))
}

pub fn has_class(element: ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

/// class 屬性中任一名稱包含指定字串
pub fn class_contains(element: ElementRef<'_>, needle: &str) -> bool {
    element.value().classes().any(|c| c.contains(needle))
}

/// 往前取最多 `limit` 個兄弟元素的文字
pub fn previous_sibling_texts(element: ElementRef<'_>, limit: usize) -> Vec<String> {
    element
        .prev_siblings()
        .filter_map(ElementRef::wrap)
        .take(limit)
        .map(text)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_text_helpers() {
        let doc = Html::parse_fragment("<div id='x'> Seed <b>Pokémon</b>\n </div>");
        let sel = selector("#x").unwrap();
        let div = doc.select(&sel).next().unwrap();
        assert_eq!(text(div), "Seed Pokémon");
        assert_eq!(stripped_text(div), "SeedPokémon");
        assert_eq!(spaced_text(div), "Seed Pokémon");
    }

    #[test]
    fn test_cells_and_siblings() {
        let doc = Html::parse_document(
            "<body><h2>Move Tutor</h2><p>note</p><table class='dextable'><tr><th>a</th><td>b</td></tr></table></body>",
        );
        let table = doc.select(&selector("table").unwrap()).next().unwrap();
        let row = table.select(&selector("tr").unwrap()).next().unwrap();
        assert_eq!(cells(row).len(), 2);
        assert_eq!(data_cells(row).len(), 1);
        assert!(has_class(table, "dextable"));
        assert!(class_contains(table, "dextab"));
        assert_eq!(previous_sibling_texts(table, 10), vec!["note", "Move Tutor"]);
    }

    #[test]
    fn test_invalid_selector() {
        assert!(matches!(selector("td[["), Err(EtlError::ParseError { .. })));
    }
}

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Display width in terminal cells. Tabs count as 4 cells.
pub fn display_width(s: &str) -> usize {
    s.split('\t')
        .enumerate()
        .map(|(i, part)| {
            let w = UnicodeWidthStr::width(part);
            if i > 0 { w + 4 } else { w }
        })
        .sum()
}

/// Truncate a string to fit within `max_cells` terminal cells, appending `…` if truncated.
pub fn truncate_to_width(s: &str, max_cells: usize) -> String {
    if max_cells == 0 {
        return String::new();
    }
    let sw = display_width(s);
    if sw <= max_cells {
        return s.to_string();
    }
    if max_cells <= 1 {
        return "\u{2026}".to_string();
    }
    let budget = max_cells - 1; // reserve 1 cell for '…'
    let mut width = 0;
    let mut result = String::new();
    for grapheme in s.graphemes(true) {
        let gw = grapheme_display_width(grapheme);
        if width + gw > budget {
            break;
        }
        width += gw;
        result.push_str(grapheme);
    }
    result.push('\u{2026}');
    result
}

/// Fit `s` into exactly `cells` columns: truncate, then pad with spaces.
/// Right-aligned when `right` is set (numbers).
pub fn fit(s: &str, cells: usize, right: bool) -> String {
    let text = truncate_to_width(s, cells);
    let pad = cells.saturating_sub(display_width(&text));
    if right {
        format!("{}{}", " ".repeat(pad), text)
    } else {
        format!("{}{}", text, " ".repeat(pad))
    }
}

fn grapheme_display_width(g: &str) -> usize {
    if g == "\t" {
        return 4;
    }
    UnicodeWidthStr::width(g)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── display_width ──────────────────────────────────────────────

    #[test]
    fn display_width_ascii() {
        assert_eq!(display_width("hello"), 5);
    }

    #[test]
    fn display_width_cyrillic() {
        assert_eq!(display_width("Бетон"), 5);
    }

    #[test]
    fn display_width_cjk() {
        assert_eq!(display_width("你好"), 4);
    }

    #[test]
    fn display_width_combining() {
        assert_eq!(display_width("cafe\u{0301}"), 4);
    }

    #[test]
    fn display_width_tab() {
        assert_eq!(display_width("a\tb"), 6);
    }

    // ── truncate_to_width ──────────────────────────────────────────

    #[test]
    fn truncate_fits() {
        assert_eq!(truncate_to_width("m3", 5), "m3");
    }

    #[test]
    fn truncate_adds_ellipsis() {
        assert_eq!(truncate_to_width("Excavation", 5), "Exca\u{2026}");
    }

    #[test]
    fn truncate_wide_chars_do_not_split() {
        // 你 is 2 cells; budget of 2 after the ellipsis fits exactly one
        assert_eq!(truncate_to_width("你好世界", 3), "你\u{2026}");
    }

    #[test]
    fn truncate_keeps_combining_marks() {
        assert_eq!(truncate_to_width("cafe\u{0301}s", 4), "caf\u{2026}");
        assert_eq!(truncate_to_width("cafe\u{0301}", 4), "cafe\u{0301}");
    }

    #[test]
    fn truncate_degenerate_widths() {
        assert_eq!(truncate_to_width("abc", 0), "");
        assert_eq!(truncate_to_width("abc", 1), "\u{2026}");
    }

    // ── fit ────────────────────────────────────────────────────────

    #[test]
    fn fit_pads_left_aligned() {
        assert_eq!(fit("Бетон", 7, false), "Бетон  ");
    }

    #[test]
    fn fit_pads_right_aligned() {
        assert_eq!(fit("35", 5, true), "   35");
    }

    #[test]
    fn fit_truncates_then_pads() {
        assert_eq!(fit("你好世界", 4, false), "你\u{2026} ");
    }
}

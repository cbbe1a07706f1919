//! Natural (human) ordering of archive entry names.

use std::cmp::Ordering;

/// Case-insensitive, numeric-aware comparison: `page2.jpg` < `page10.jpg`.
/// Names that only differ by case fall back to a byte comparison so the
/// ordering stays total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natord::compare_ignore_case(a, b).then_with(|| a.cmp(b))
}

/// Sort names in place in natural order.
pub fn sort_natural<T>(items: &mut [T], key: impl Fn(&T) -> &str) {
    items.sort_by(|a, b| natural_cmp(key(a), key(b)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn numbers_compare_by_value() {
        let mut names = vec!["page10.jpg", "page2.jpg", "page1.jpg"];
        sort_natural(&mut names, |s| s);
        assert_eq!(names, vec!["page1.jpg", "page2.jpg", "page10.jpg"]);
    }

    #[test]
    fn ignores_case() {
        assert_eq!(natural_cmp("Page2.jpg", "page10.jpg"), Ordering::Less);
        assert_eq!(natural_cmp("a.jpg", "B.jpg"), Ordering::Less);
    }

    #[test]
    fn nested_folders() {
        let mut names = vec!["ch10/01.png", "ch2/10.png", "ch2/9.png"];
        sort_natural(&mut names, |s| s);
        assert_eq!(names, vec!["ch2/9.png", "ch2/10.png", "ch10/01.png"]);
    }

    proptest! {
        #[test]
        fn numeric_suffix_orders_by_value(a in 0u32..100_000, b in 0u32..100_000) {
            let left = format!("page{a}.jpg");
            let right = format!("page{b}.jpg");
            prop_assert_eq!(natural_cmp(&left, &right), a.cmp(&b));
        }
    }
}

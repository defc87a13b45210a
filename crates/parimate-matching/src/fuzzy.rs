use std::collections::HashSet;

/// Indel similarity on a 0-100 scale: `2 · LCS / (len_a + len_b) · 100`.
/// Two empty strings are identical.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut row = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            row[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                row[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut row);
    }
    let lcs = prev[b.len()];
    200.0 * lcs as f64 / total as f64
}

/// Distinct character bigrams.
pub fn char_bigrams(s: &str) -> HashSet<(char, char)> {
    let chars: Vec<char> = s.chars().collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}

/// Jaccard index of the two strings' character bigram sets. Strings too
/// short to have bigrams only match themselves.
pub fn bigram_jaccard(a: &str, b: &str) -> f64 {
    let (x, y) = (char_bigrams(a), char_bigrams(b));
    if x.is_empty() && y.is_empty() {
        return if a == b { 1.0 } else { 0.0 };
    }
    let shared = x.intersection(&y).count();
    let union = x.union(&y).count();
    shared as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ratio_known_values() {
        assert_eq!(ratio("", ""), 100.0);
        assert_eq!(ratio("abc", ""), 0.0);
        assert_eq!(ratio("харизма", "харизма"), 100.0);
        // LCS("kitten", "sitting") = 4 → 2·4/13.
        assert!((ratio("kitten", "sitting") - 800.0 / 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_jaccard() {
        assert_eq!(bigram_jaccard("night", "night"), 1.0);
        // {ni, ig, gh, ht} vs {na, ac, ch, ht}: one shared of seven.
        assert!((bigram_jaccard("night", "nacht") - 1.0 / 7.0).abs() < 1e-9);
        assert_eq!(bigram_jaccard("a", "a"), 1.0);
        assert_eq!(bigram_jaccard("a", "b"), 0.0);
    }

    proptest! {
        #[test]
        fn prop_ratio_symmetric_and_bounded(a in "\\PC{0,12}", b in "\\PC{0,12}") {
            let r = ratio(&a, &b);
            prop_assert!((0.0..=100.0).contains(&r));
            prop_assert!((r - ratio(&b, &a)).abs() < 1e-9);
            prop_assert_eq!(ratio(&a, &a), 100.0);
        }
    }
}

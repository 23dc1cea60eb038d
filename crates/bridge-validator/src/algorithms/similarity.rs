//! String similarity measures used by the consensus scorer.
//!
//! All measures return a value in `[0.0, 1.0]`, 1.0 meaning identical.

use std::collections::HashSet;

/// Longer inputs are truncated before the quadratic measures run.
pub const MAX_COMPARE_CHARS: usize = 2_000;

fn chars(s: &str) -> Vec<char> {
    s.chars().take(MAX_COMPARE_CHARS).collect()
}

/// Jaro-Winkler similarity with the standard 0.1 prefix scale (max prefix 4).
///
/// The prefix boost only applies once the plain Jaro score exceeds 0.7.
pub fn jaro_winkler(a: &str, b: &str) -> f64 {
    let a = chars(a);
    let b = chars(b);
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let window = (a.len().max(b.len()) / 2).saturating_sub(1);
    let mut a_matched = vec![false; a.len()];
    let mut b_matched = vec![false; b.len()];
    let mut matches = 0usize;

    for (i, ca) in a.iter().enumerate() {
        let lo = i.saturating_sub(window);
        let hi = (i + window + 1).min(b.len());
        for j in lo..hi {
            if !b_matched[j] && b[j] == *ca {
                a_matched[i] = true;
                b_matched[j] = true;
                matches += 1;
                break;
            }
        }
    }
    if matches == 0 {
        return 0.0;
    }

    let a_seq = a.iter().zip(&a_matched).filter(|(_, m)| **m).map(|(c, _)| c);
    let b_seq = b.iter().zip(&b_matched).filter(|(_, m)| **m).map(|(c, _)| c);
    let transpositions = a_seq.zip(b_seq).filter(|(x, y)| x != y).count() / 2;

    let m = matches as f64;
    let jaro = (m / a.len() as f64 + m / b.len() as f64 + (m - transpositions as f64) / m) / 3.0;

    if jaro <= 0.7 {
        return jaro;
    }
    let prefix = a
        .iter()
        .zip(&b)
        .take(4)
        .take_while(|(x, y)| x == y)
        .count() as f64;
    jaro + prefix * 0.1 * (1.0 - jaro)
}

fn bigrams(s: &str) -> HashSet<(char, char)> {
    let lowered: Vec<char> = s.to_lowercase().chars().take(MAX_COMPARE_CHARS).collect();
    lowered.windows(2).map(|w| (w[0], w[1])).collect()
}

/// Dice coefficient over the sets of character bigrams (case-insensitive).
pub fn bigram_dice(a: &str, b: &str) -> f64 {
    let x = bigrams(a);
    let y = bigrams(b);
    if x.is_empty() && y.is_empty() {
        return if a.to_lowercase() == b.to_lowercase() { 1.0 } else { 0.0 };
    }
    let shared = x.intersection(&y).count() as f64;
    2.0 * shared / (x.len() + y.len()) as f64
}

/// Longest common substring of `a[a_lo..a_hi]` and `b[b_lo..b_hi]`.
///
/// Returns `(start_a, start_b, len)`, preferring the earliest match in `a`.
fn longest_match(
    a: &[char],
    b: &[char],
    (a_lo, a_hi): (usize, usize),
    (b_lo, b_hi): (usize, usize),
) -> (usize, usize, usize) {
    let width = b_hi - b_lo;
    let mut prev = vec![0usize; width + 1];
    let mut curr = vec![0usize; width + 1];
    let mut best = (a_lo, b_lo, 0);

    for i in a_lo..a_hi {
        for j in b_lo..b_hi {
            let k = j - b_lo + 1;
            curr[k] = if a[i] == b[j] { prev[k - 1] + 1 } else { 0 };
            if curr[k] > best.2 {
                best = (i + 1 - curr[k], j + 1 - curr[k], curr[k]);
            }
        }
        std::mem::swap(&mut prev, &mut curr);
        curr.iter_mut().for_each(|c| *c = 0);
    }
    best
}

/// Ratcliff/Obershelp "gestalt" similarity: `2 * matched / total`.
pub fn ratcliff_obershelp(a: &str, b: &str) -> f64 {
    let a = chars(a);
    let b = chars(b);
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let mut matched = 0usize;
    let mut stack = vec![((0, a.len()), (0, b.len()))];
    while let Some((ra, rb)) = stack.pop() {
        if ra.0 >= ra.1 || rb.0 >= rb.1 {
            continue;
        }
        let (ia, ib, len) = longest_match(&a, &b, ra, rb);
        if len == 0 {
            continue;
        }
        matched += len;
        stack.push(((ra.0, ia), (rb.0, ib)));
        stack.push(((ia + len, ra.1), (ib + len, rb.1)));
    }
    2.0 * matched as f64 / total as f64
}

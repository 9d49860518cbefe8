//! Random passwords drawn from named character sets.

use rand::seq::{IndexedRandom, SliceRandom};
use zeroize::Zeroizing;

use crate::error::DaemonError;

/// Generate `length` characters with at least one from every distinct set
/// in `sets`; the rest come from their union.
pub fn generate(sets: &[String], length: usize) -> Result<Zeroizing<String>, DaemonError> {
    let mut distinct: Vec<Vec<char>> = Vec::new();
    for set in sets {
        let chars: Vec<char> = set.chars().collect();
        if !chars.is_empty() && !distinct.contains(&chars) {
            distinct.push(chars);
        }
    }
    if distinct.is_empty() {
        return Err(DaemonError::EmptyCharset);
    }
    if length < distinct.len() {
        return Err(DaemonError::PasswordTooShort {
            length,
            sets: distinct.len(),
        });
    }

    let mut alphabet: Vec<char> = distinct.iter().flatten().copied().collect();
    alphabet.sort_unstable();
    alphabet.dedup();

    let mut rng = rand::rng();
    let mut picked: Zeroizing<Vec<char>> = Zeroizing::new(Vec::with_capacity(length));
    for set in &distinct {
        picked.extend(set.choose(&mut rng));
    }
    while picked.len() < length {
        picked.extend(alphabet.choose(&mut rng));
    }
    picked.shuffle(&mut rng);
    Ok(Zeroizing::new(picked.iter().collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sets(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn every_set_is_represented() {
        let sets = sets(&["ab", "01", "#"]);
        for _ in 0..50 {
            let password = generate(&sets, 4).expect("generate");
            assert_eq!(password.chars().count(), 4);
            assert!(password.chars().any(|c| "ab".contains(c)));
            assert!(password.chars().any(|c| "01".contains(c)));
            assert!(password.contains('#'));
            assert!(password.chars().all(|c| "ab01#".contains(c)));
        }
    }

    #[test]
    fn duplicate_sets_count_once() {
        let password = generate(&sets(&["xyz", "xyz"]), 1).expect("generate");
        assert_eq!(password.chars().count(), 1);
    }

    #[test]
    fn too_short_for_the_sets() {
        assert!(matches!(
            generate(&sets(&["a", "b", "c"]), 2),
            Err(DaemonError::PasswordTooShort { length: 2, sets: 3 })
        ));
    }

    #[test]
    fn no_characters_to_draw_from() {
        assert!(matches!(generate(&sets(&[""]), 8), Err(DaemonError::EmptyCharset)));
        assert!(matches!(generate(&[], 8), Err(DaemonError::EmptyCharset)));
    }
}

//! Slug minting for families and documents.
//!
//! # Responsibility
//! - Turn a title into a URL-safe base.
//! - Append a short random suffix until the result is unused.
//!
//! # Invariants
//! - A minted slug is absent from storage and from this batch's reservations.
//! - Every minted slug is recorded in the reservations before it is returned.

use crate::import::error::ImportError;
use crate::repo::slug_repo::SlugRepository;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

pub const DEFAULT_SUFFIX_LENGTH: usize = 4;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 100;
const FALLBACK_BASE: &str = "untitled";
const MAX_SUFFIX_LENGTH: usize = 32;

static NON_SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug separator regex"));

/// Lowercase ASCII base with runs of other characters collapsed to `-`.
///
/// Accented letters are transliterated (`é` -> `e`, `ß` -> `ss`); anything
/// without an ASCII spelling becomes a separator.
pub fn slugify(title: &str) -> String {
    let lowered = transliterate(title).to_ascii_lowercase();
    let base = NON_SLUG_RE.replace_all(&lowered, "-");
    let base = base.trim_matches('-');
    if base.is_empty() {
        FALLBACK_BASE.to_string()
    } else {
        base.to_string()
    }
}

fn transliterate(title: &str) -> String {
    let mut ascii = String::with_capacity(title.len());
    for c in title.nfkd().filter(|c| !is_combining_mark(*c)) {
        match c {
            'ß' => ascii.push_str("ss"),
            'Æ' | 'æ' => ascii.push_str("ae"),
            'Œ' | 'œ' => ascii.push_str("oe"),
            'Þ' | 'þ' => ascii.push_str("th"),
            'Ø' | 'ø' => ascii.push('o'),
            'Đ' | 'đ' | 'Ð' | 'ð' => ascii.push('d'),
            'Ł' | 'ł' => ascii.push('l'),
            'ı' => ascii.push('i'),
            c => ascii.push(c),
        }
    }
    ascii
}

/// Slugs minted earlier in the current batch.
#[derive(Debug, Default)]
pub struct SlugReservations {
    minted: HashSet<String>,
}

impl SlugReservations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.minted.contains(slug)
    }

    pub fn reserve(&mut self, slug: impl Into<String>) -> bool {
        self.minted.insert(slug.into())
    }

    pub fn len(&self) -> usize {
        self.minted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.minted.is_empty()
    }
}

/// Candidates left for one title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlugBudget {
    remaining: u32,
}

impl SlugBudget {
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_spent(&self) -> bool {
        self.remaining == 0
    }

    fn take(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

/// Suffix length and retry budget for slug minting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlugGenerator {
    suffix_length: usize,
    max_attempts: u32,
}

impl Default for SlugGenerator {
    fn default() -> Self {
        Self {
            suffix_length: DEFAULT_SUFFIX_LENGTH,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl SlugGenerator {
    /// Suffix length is clamped to `1..=32` and attempts to at least one.
    pub fn new(suffix_length: usize, max_attempts: u32) -> Self {
        Self {
            suffix_length: suffix_length.clamp(1, MAX_SUFFIX_LENGTH),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Starts a fresh attempt budget for one title.
    pub fn budget(&self) -> SlugBudget {
        SlugBudget {
            remaining: self.max_attempts,
        }
    }

    /// Mints one unused slug for `title` and reserves it.
    pub fn generate<R: SlugRepository + ?Sized>(
        &self,
        title: &str,
        repo: &R,
        reservations: &mut SlugReservations,
    ) -> Result<String, ImportError> {
        self.generate_within(title, repo, reservations, &mut self.budget())
    }

    /// Like [`SlugGenerator::generate`], drawing candidates from `budget`.
    ///
    /// Callers that retry a rejected slug pass the same budget again, so the
    /// total number of candidates per title never exceeds `max_attempts`.
    pub fn generate_within<R: SlugRepository + ?Sized>(
        &self,
        title: &str,
        repo: &R,
        reservations: &mut SlugReservations,
        budget: &mut SlugBudget,
    ) -> Result<String, ImportError> {
        let base = slugify(title);
        while budget.take() {
            let candidate = format!("{base}_{}", self.suffix());
            if reservations.contains(&candidate) || repo.slug_exists(&candidate)? {
                debug!(
                    "event=slug_collision module=import remaining={}",
                    budget.remaining()
                );
                continue;
            }
            reservations.reserve(candidate.clone());
            return Ok(candidate);
        }

        Err(self.exhausted(title))
    }

    pub(crate) fn exhausted(&self, title: &str) -> ImportError {
        ImportError::SlugExhausted {
            title: title.to_string(),
            attempts: self.max_attempts,
        }
    }

    fn suffix(&self) -> String {
        let mut suffix = Uuid::new_v4().simple().to_string();
        suffix.truncate(self.suffix_length);
        suffix
    }
}

#[cfg(test)]
mod tests {
    use super::{slugify, SlugGenerator, SlugReservations};
    use std::cell::Cell;
    use crate::import::error::ImportError;
    use crate::repo::slug_repo::SlugRepository;
    use crate::repo::store::RepoResult;
    use std::collections::HashSet;

    struct TakenSlugs(HashSet<String>);

    impl SlugRepository for TakenSlugs {
        fn slug_exists(&self, name: &str) -> RepoResult<bool> {
            Ok(self.0.contains(name))
        }
    }

    struct EverythingTaken;

    impl SlugRepository for EverythingTaken {
        fn slug_exists(&self, _name: &str) -> RepoResult<bool> {
            Ok(true)
        }
    }

    #[test]
    fn slugify_lowercases_and_hyphenates() {
        assert_eq!(slugify("Climate Change Act 2008"), "climate-change-act-2008");
        assert_eq!(slugify("  Paris -- Agreement!! "), "paris-agreement");
        assert_eq!(slugify("Loi n° 2019-1147"), "loi-n-2019-1147");
        assert_eq!(
            slugify("Loi relative à la transition énergétique"),
            "loi-relative-a-la-transition-energetique"
        );
        assert_eq!(
            slugify("Política Nacional de Mudança do Clima"),
            "politica-nacional-de-mudanca-do-clima"
        );
        assert_eq!(slugify("Straßenverkehrsgesetz Œuvre"), "strassenverkehrsgesetz-oeuvre");
    }

    #[test]
    fn slugify_drops_scripts_without_ascii_spelling() {
        assert_eq!(slugify("气候变化 Act"), "act");
        assert_eq!(slugify("ｆｕｌｌ ｗｉｄｔｈ"), "full-width");
    }

    #[test]
    fn slugify_falls_back_for_empty_titles() {
        assert_eq!(slugify("???"), "untitled");
        assert_eq!(slugify(""), "untitled");
    }

    #[test]
    fn generated_slug_has_base_and_suffix() {
        let generator = SlugGenerator::default();
        let mut reservations = SlugReservations::new();
        let slug = generator
            .generate("National Energy Plan", &TakenSlugs(HashSet::new()), &mut reservations)
            .unwrap();

        let (base, suffix) = slug.rsplit_once('_').unwrap();
        assert_eq!(base, "national-energy-plan");
        assert_eq!(suffix.len(), 4);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(reservations.contains(&slug));
    }

    #[test]
    fn same_title_in_one_batch_gets_distinct_slugs() {
        let generator = SlugGenerator::default();
        let mut reservations = SlugReservations::new();
        let repo = TakenSlugs(HashSet::new());
        let mut seen = HashSet::new();
        for _ in 0..200 {
            let slug = generator
                .generate("Same Title", &repo, &mut reservations)
                .unwrap();
            assert!(seen.insert(slug));
        }
        assert_eq!(reservations.len(), 200);
    }

    #[test]
    fn exhausted_budget_is_an_error() {
        let generator = SlugGenerator::new(4, 3);
        let mut reservations = SlugReservations::new();
        let err = generator
            .generate("Taken", &EverythingTaken, &mut reservations)
            .unwrap_err();
        assert!(matches!(err, ImportError::SlugExhausted { attempts: 3, .. }));
        assert!(reservations.is_empty());
    }

    /// Reports the first `taken` lookups as existing slugs.
    struct TakenFirst {
        taken: u32,
        lookups: Cell<u32>,
    }

    impl SlugRepository for TakenFirst {
        fn slug_exists(&self, _name: &str) -> RepoResult<bool> {
            let seen = self.lookups.get();
            self.lookups.set(seen + 1);
            Ok(seen < self.taken)
        }
    }

    #[test]
    fn retries_share_one_budget_per_title() {
        let generator = SlugGenerator::new(4, 5);
        let repo = TakenFirst {
            taken: 3,
            lookups: Cell::new(0),
        };
        let mut reservations = SlugReservations::new();
        let mut budget = generator.budget();

        generator
            .generate_within("Act", &repo, &mut reservations, &mut budget)
            .unwrap();
        assert_eq!(budget.remaining(), 1);

        let err = generator
            .generate_within("Act", &EverythingTaken, &mut reservations, &mut budget)
            .unwrap_err();
        assert!(matches!(err, ImportError::SlugExhausted { attempts: 5, .. }));
        assert!(budget.is_spent());
        assert_eq!(repo.lookups.get(), 4);
    }

    #[test]
    fn new_clamps_settings() {
        let generator = SlugGenerator::new(0, 0);
        assert_eq!(generator.max_attempts(), 1);
        assert_eq!(generator, SlugGenerator::new(1, 1));
    }
}
